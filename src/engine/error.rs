use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::LeaveStatus;

/// Engine failure taxonomy. Everything except `Unavailable` is a
/// business-rule rejection: a typed, non-retryable answer the caller maps
/// to a specific message. `Unavailable` is the infrastructure side — the
/// durable store could not be written — and retry is the caller's call.
#[derive(Debug)]
pub enum EngineError {
    /// The target day is a public holiday.
    Holiday(NaiveDate),
    /// The employee already has a shift on that calendar day.
    DuplicateAssignment { employee_id: Ulid, day: NaiveDate },
    /// The day falls inside a pending or approved leave request.
    OnLeave { leave_id: Ulid, day: NaiveDate },
    /// The requested range overlaps an existing pending/approved request.
    OverlappingLeave { leave_id: Ulid },
    InvalidTimeRange(&'static str),
    NotFound(Ulid),
    AlreadyRegistered(Ulid),
    /// Illegal leave status transition (e.g. deciding a non-pending request).
    InvalidTransition { from: LeaveStatus, to: LeaveStatus },
    LimitExceeded(&'static str),
    /// Durable store failure; state was not modified.
    Unavailable(String),
}

impl EngineError {
    /// Short label for the conflict counter; `None` for non-business errors.
    pub fn conflict_label(&self) -> Option<&'static str> {
        match self {
            EngineError::Holiday(_) => Some("holiday"),
            EngineError::DuplicateAssignment { .. } => Some("duplicate_assignment"),
            EngineError::OnLeave { .. } => Some("on_leave"),
            EngineError::OverlappingLeave { .. } => Some("overlapping_leave"),
            EngineError::InvalidTimeRange(_) => Some("invalid_time_range"),
            EngineError::InvalidTransition { .. } => Some("invalid_transition"),
            _ => None,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Holiday(day) => write!(f, "{day} is a public holiday"),
            EngineError::DuplicateAssignment { employee_id, day } => {
                write!(f, "employee {employee_id} already has a shift on {day}")
            }
            EngineError::OnLeave { leave_id, day } => {
                write!(f, "employee is on leave on {day} (request {leave_id})")
            }
            EngineError::OverlappingLeave { leave_id } => {
                write!(f, "overlaps existing leave request {leave_id}")
            }
            EngineError::InvalidTimeRange(msg) => write!(f, "invalid time range: {msg}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyRegistered(id) => write!(f, "employee already registered: {id}"),
            EngineError::InvalidTransition { from, to } => {
                write!(f, "cannot transition leave request from {from} to {to}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Unavailable(e) => write!(f, "store unavailable: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
