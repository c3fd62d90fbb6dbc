//! The shared conflict primitives. This module is the only place
//! range-overlap and assignment-on-day comparisons are written down; both
//! the shift placement path and the leave ledger call in here, so the
//! per-day and per-range invariants cannot drift apart.

use chrono::NaiveDate;
use ulid::Ulid;

use crate::holidays::HolidayCalendar;
use crate::model::{EmployeeSchedule, LeaveRequest};

use super::EngineError;

/// Inclusive civil-date overlap: `[a_start, a_end]` touches `[b_start, b_end]`.
pub fn date_ranges_overlap(
    a_start: NaiveDate,
    a_end: NaiveDate,
    b_start: NaiveDate,
    b_end: NaiveDate,
) -> bool {
    a_start <= b_end && b_start <= a_end
}

/// `[inner_start, inner_end]` lies entirely within `[outer_start, outer_end]`.
/// Used by balance accounting: a request straddling the period boundary is
/// not charged to the period.
pub fn date_range_contains(
    outer_start: NaiveDate,
    outer_end: NaiveDate,
    inner_start: NaiveDate,
    inner_end: NaiveDate,
) -> bool {
    outer_start <= inner_start && inner_end <= outer_end
}

/// Does the employee already have a shift on `day`? `exclude` skips one
/// shift id, so a move does not collide with the record being moved.
pub fn has_assignment_on_day(
    schedule: &EmployeeSchedule,
    day: NaiveDate,
    exclude: Option<Ulid>,
) -> bool {
    match schedule.shift_on_day(day) {
        Some(s) => exclude != Some(s.id),
        None => false,
    }
}

/// The pending/approved leave request covering `day`, if any.
pub fn active_leave_covering(schedule: &EmployeeSchedule, day: NaiveDate) -> Option<&LeaveRequest> {
    schedule
        .leaves
        .iter()
        .filter(|l| l.is_active())
        .find(|l| date_ranges_overlap(day, day, l.start_date, l.end_date))
}

/// The first pending/approved request overlapping `[start, end]`,
/// excluding one request id (a request never conflicts with itself on edit).
pub fn overlapping_active_leave(
    schedule: &EmployeeSchedule,
    start: NaiveDate,
    end: NaiveDate,
    exclude: Option<Ulid>,
) -> Option<&LeaveRequest> {
    schedule
        .leaves
        .iter()
        .filter(|l| l.is_active() && exclude != Some(l.id))
        .find(|l| date_ranges_overlap(start, end, l.start_date, l.end_date))
}

/// The full placement gate for putting a shift on `day` — first failure
/// wins: holiday, then duplicate assignment, then leave.
pub fn check_placement(
    schedule: &EmployeeSchedule,
    holidays: &HolidayCalendar,
    day: NaiveDate,
    exclude_shift: Option<Ulid>,
) -> Result<(), EngineError> {
    if holidays.is_holiday(day) {
        return Err(EngineError::Holiday(day));
    }
    if has_assignment_on_day(schedule, day, exclude_shift) {
        return Err(EngineError::DuplicateAssignment {
            employee_id: schedule.id,
            day,
        });
    }
    if let Some(leave) = active_leave_covering(schedule, day) {
        return Err(EngineError::OnLeave {
            leave_id: leave.id,
            day,
        });
    }
    Ok(())
}

/// An unpaid break longer than the shift itself is a malformed record.
pub fn validate_break(
    start: chrono::NaiveDateTime,
    end: chrono::NaiveDateTime,
    break_minutes: u32,
) -> Result<(), EngineError> {
    if i64::from(break_minutes) >= (end - start).num_minutes() {
        return Err(EngineError::InvalidTimeRange("break longer than shift"));
    }
    Ok(())
}
