use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Inclusive day count of a civil-date range. A request spanning a weekend
/// still counts every day — entitlement is consumed in raw calendar days.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
    Annual,
    Sick,
    Maternity,
    Paternity,
    Parental,
    Bereavement,
    Unpaid,
    Study,
    Compassionate,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Declined,
    Cancelled,
}

impl LeaveStatus {
    /// Pending and approved requests block shift placement and other leave.
    pub fn is_active(self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::Approved)
    }
}

impl std::fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Declined => "declined",
            LeaveStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Outcome of an admin ruling on a pending leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Declined,
}

impl Decision {
    pub fn status(self) -> LeaveStatus {
        match self {
            Decision::Approved => LeaveStatus::Approved,
            Decision::Declined => LeaveStatus::Declined,
        }
    }
}

/// A single scheduled work period for one employee on one calendar day.
///
/// `end` is always a real timestamp: the overnight rule (`end_time <=
/// start_time`) is resolved to `day + 1` before the record is committed, so
/// `end - start` is positive and never needs re-deriving from display times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    pub id: Ulid,
    pub employee_id: Ulid,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Unpaid break, subtracted from paid duration.
    pub break_minutes: u32,
    pub department: Option<String>,
    pub published: bool,
}

impl Shift {
    /// The calendar day a shift occupies: its start date. An overnight
    /// shift still counts against its start day only.
    pub fn day(&self) -> NaiveDate {
        self.start.date()
    }

    /// Worked span from the stored timestamps, with a 24h correction if a
    /// record was stored with a non-positive span (legacy wrapped form).
    pub fn duration(&self) -> Duration {
        let d = self.end - self.start;
        if d <= Duration::zero() { d + Duration::hours(24) } else { d }
    }

    pub fn paid_minutes(&self) -> i64 {
        self.duration().num_minutes() - i64::from(self.break_minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveRequest {
    pub id: Ulid,
    pub employee_id: Ulid,
    pub leave_type: LeaveType,
    /// Inclusive civil-date range; no time-of-day component.
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_days: i64,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub decided_by: Option<Ulid>,
    pub decided_at: Option<NaiveDateTime>,
}

impl LeaveRequest {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Per-employee scheduling state: identity, shifts, leave ledger entries and
/// leave entitlements. One of these sits behind each engine lock entry.
#[derive(Debug, Clone)]
pub struct EmployeeSchedule {
    pub id: Ulid,
    pub name: String,
    pub department: Option<String>,
    pub started_on: NaiveDate,
    /// Sorted by `start`; at most one shift per calendar day.
    pub shifts: Vec<Shift>,
    /// Sorted by `start_date`.
    pub leaves: Vec<LeaveRequest>,
    /// Entitled days per leave type for the balance period. Absent = 0.
    pub entitlements: HashMap<LeaveType, u32>,
}

impl EmployeeSchedule {
    pub fn new(id: Ulid, name: String, department: Option<String>, started_on: NaiveDate) -> Self {
        Self {
            id,
            name,
            department,
            started_on,
            shifts: Vec::new(),
            leaves: Vec::new(),
            entitlements: HashMap::new(),
        }
    }

    /// Insert a shift maintaining sort order by start timestamp.
    pub fn insert_shift(&mut self, shift: Shift) {
        let pos = self
            .shifts
            .binary_search_by_key(&shift.start, |s| s.start)
            .unwrap_or_else(|e| e);
        self.shifts.insert(pos, shift);
    }

    pub fn remove_shift(&mut self, id: Ulid) -> Option<Shift> {
        let pos = self.shifts.iter().position(|s| s.id == id)?;
        Some(self.shifts.remove(pos))
    }

    pub fn shift(&self, id: Ulid) -> Option<&Shift> {
        self.shifts.iter().find(|s| s.id == id)
    }

    /// The shift occupying `day`, if any. Shifts are sorted by start, so a
    /// partition point skips everything before that day.
    pub fn shift_on_day(&self, day: NaiveDate) -> Option<&Shift> {
        let from = self.shifts.partition_point(|s| s.start.date() < day);
        self.shifts[from..].iter().find(|s| s.start.date() == day)
    }

    /// Insert a leave request maintaining sort order by start date.
    pub fn insert_leave(&mut self, leave: LeaveRequest) {
        let pos = self
            .leaves
            .binary_search_by_key(&leave.start_date, |l| l.start_date)
            .unwrap_or_else(|e| e);
        self.leaves.insert(pos, leave);
    }

    pub fn remove_leave(&mut self, id: Ulid) -> Option<LeaveRequest> {
        let pos = self.leaves.iter().position(|l| l.id == id)?;
        Some(self.leaves.remove(pos))
    }

    pub fn leave(&self, id: Ulid) -> Option<&LeaveRequest> {
        self.leaves.iter().find(|l| l.id == id)
    }

    pub fn leave_mut(&mut self, id: Ulid) -> Option<&mut LeaveRequest> {
        self.leaves.iter_mut().find(|l| l.id == id)
    }
}

/// The event types — flat, no nesting. This is the WAL record format; the
/// engine state is always reproducible by replaying these in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    EmployeeRegistered {
        id: Ulid,
        name: String,
        department: Option<String>,
        started_on: NaiveDate,
    },
    EmployeeRemoved {
        id: Ulid,
    },
    EntitlementSet {
        employee_id: Ulid,
        leave_type: LeaveType,
        days: u32,
    },
    ShiftCreated {
        id: Ulid,
        employee_id: Ulid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        break_minutes: u32,
        department: Option<String>,
        published: bool,
    },
    ShiftMoved {
        id: Ulid,
        employee_id: Ulid,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    ShiftTimeEdited {
        id: Ulid,
        employee_id: Ulid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        break_minutes: u32,
    },
    ShiftPublished {
        id: Ulid,
        employee_id: Ulid,
    },
    ShiftDeleted {
        id: Ulid,
        employee_id: Ulid,
    },
    LeaveRequested {
        id: Ulid,
        employee_id: Ulid,
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        duration_days: i64,
        reason: Option<String>,
    },
    LeaveEdited {
        id: Ulid,
        employee_id: Ulid,
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        duration_days: i64,
        reason: Option<String>,
    },
    LeaveDecided {
        id: Ulid,
        employee_id: Ulid,
        decision: Decision,
        decided_by: Ulid,
        decided_at: NaiveDateTime,
    },
    LeaveCancelled {
        id: Ulid,
        employee_id: Ulid,
    },
    LeaveDeleted {
        id: Ulid,
        employee_id: Ulid,
    },
}

impl Event {
    /// The employee whose schedule this event mutates. `None` for events
    /// handled at the engine map level (register/remove).
    pub fn employee_id(&self) -> Option<Ulid> {
        match self {
            Event::EmployeeRegistered { .. } | Event::EmployeeRemoved { .. } => None,
            Event::EntitlementSet { employee_id, .. }
            | Event::ShiftCreated { employee_id, .. }
            | Event::ShiftMoved { employee_id, .. }
            | Event::ShiftTimeEdited { employee_id, .. }
            | Event::ShiftPublished { employee_id, .. }
            | Event::ShiftDeleted { employee_id, .. }
            | Event::LeaveRequested { employee_id, .. }
            | Event::LeaveEdited { employee_id, .. }
            | Event::LeaveDecided { employee_id, .. }
            | Event::LeaveCancelled { employee_id, .. }
            | Event::LeaveDeleted { employee_id, .. } => Some(*employee_id),
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeInfo {
    pub id: Ulid,
    pub name: String,
    pub department: Option<String>,
    pub started_on: NaiveDate,
}

/// Derived on read; never stored. `balance` may go negative if entitlement
/// is retroactively reduced — surfaced as-is, not clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveBalance {
    pub entitled: i64,
    pub taken: i64,
    pub balance: i64,
}

/// Anchor `start_time`/`end_time` to `day`, rolling the end to the next day
/// when `end_time <= start_time` (overnight shift). This is the only
/// automatic day rollover; shifts longer than 24h are unrepresentable.
pub fn resolve_shift_times(
    day: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
) -> (NaiveDateTime, NaiveDateTime) {
    let start = day.and_time(start_time);
    let end = if end_time <= start_time {
        (day + Duration::days(1)).and_time(end_time)
    } else {
        day.and_time(end_time)
    };
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn shift_on(day: NaiveDate) -> Shift {
        let (start, end) = resolve_shift_times(day, t(9, 0), t(17, 0));
        Shift {
            id: Ulid::new(),
            employee_id: Ulid::new(),
            start,
            end,
            break_minutes: 0,
            department: None,
            published: false,
        }
    }

    #[test]
    fn inclusive_day_counts() {
        assert_eq!(inclusive_days(d(2025, 7, 1), d(2025, 7, 1)), 1);
        assert_eq!(inclusive_days(d(2025, 7, 1), d(2025, 7, 5)), 5);
        // Spans a weekend: still raw calendar days
        assert_eq!(inclusive_days(d(2025, 7, 4), d(2025, 7, 8)), 5);
        // Month boundary
        assert_eq!(inclusive_days(d(2025, 1, 30), d(2025, 2, 2)), 4);
    }

    #[test]
    fn overnight_rolls_end_to_next_day() {
        let (start, end) = resolve_shift_times(d(2025, 6, 1), t(22, 0), t(6, 0));
        assert_eq!(start, d(2025, 6, 1).and_time(t(22, 0)));
        assert_eq!(end, d(2025, 6, 2).and_time(t(6, 0)));
    }

    #[test]
    fn equal_times_mean_a_full_day() {
        let (start, end) = resolve_shift_times(d(2025, 6, 1), t(8, 0), t(8, 0));
        assert_eq!(end - start, Duration::hours(24));
    }

    #[test]
    fn day_shift_stays_on_day() {
        let (start, end) = resolve_shift_times(d(2025, 6, 1), t(9, 0), t(17, 30));
        assert_eq!(start.date(), end.date());
        assert_eq!(end - start, Duration::hours(8) + Duration::minutes(30));
    }

    #[test]
    fn paid_minutes_subtract_break() {
        let (start, end) = resolve_shift_times(d(2025, 6, 1), t(22, 0), t(6, 0));
        let s = Shift {
            id: Ulid::new(),
            employee_id: Ulid::new(),
            start,
            end,
            break_minutes: 30,
            department: None,
            published: false,
        };
        assert_eq!(s.paid_minutes(), 7 * 60 + 30);
        assert_eq!(s.day(), d(2025, 6, 1)); // overnight counts against its start day
    }

    #[test]
    fn duration_corrects_nonpositive_span() {
        let s = Shift {
            id: Ulid::new(),
            employee_id: Ulid::new(),
            start: d(2025, 6, 1).and_time(t(22, 0)),
            end: d(2025, 6, 1).and_time(t(6, 0)),
            break_minutes: 0,
            department: None,
            published: false,
        };
        assert_eq!(s.duration(), Duration::hours(8));
    }

    #[test]
    fn shifts_stay_sorted_by_start() {
        let mut es = EmployeeSchedule::new(Ulid::new(), "A".into(), None, d(2024, 1, 1));
        es.insert_shift(shift_on(d(2025, 6, 3)));
        es.insert_shift(shift_on(d(2025, 6, 1)));
        es.insert_shift(shift_on(d(2025, 6, 2)));
        let days: Vec<_> = es.shifts.iter().map(|s| s.day()).collect();
        assert_eq!(days, vec![d(2025, 6, 1), d(2025, 6, 2), d(2025, 6, 3)]);
    }

    #[test]
    fn shift_on_day_finds_only_that_day() {
        let mut es = EmployeeSchedule::new(Ulid::new(), "A".into(), None, d(2024, 1, 1));
        es.insert_shift(shift_on(d(2025, 6, 1)));
        es.insert_shift(shift_on(d(2025, 6, 3)));
        assert!(es.shift_on_day(d(2025, 6, 1)).is_some());
        assert!(es.shift_on_day(d(2025, 6, 2)).is_none());
        assert!(es.shift_on_day(d(2025, 6, 3)).is_some());
        assert!(es.shift_on_day(d(2025, 6, 4)).is_none());
    }

    #[test]
    fn remove_shift_nonexistent_returns_none() {
        let mut es = EmployeeSchedule::new(Ulid::new(), "A".into(), None, d(2024, 1, 1));
        es.insert_shift(shift_on(d(2025, 6, 1)));
        assert!(es.remove_shift(Ulid::new()).is_none());
        assert_eq!(es.shifts.len(), 1);
    }

    #[test]
    fn leaves_stay_sorted_by_start_date() {
        let mut es = EmployeeSchedule::new(Ulid::new(), "A".into(), None, d(2024, 1, 1));
        for (from, to) in [(d(2025, 8, 1), d(2025, 8, 2)), (d(2025, 7, 1), d(2025, 7, 5))] {
            es.insert_leave(LeaveRequest {
                id: Ulid::new(),
                employee_id: es.id,
                leave_type: LeaveType::Annual,
                start_date: from,
                end_date: to,
                duration_days: inclusive_days(from, to),
                reason: None,
                status: LeaveStatus::Pending,
                decided_by: None,
                decided_at: None,
            });
        }
        assert_eq!(es.leaves[0].start_date, d(2025, 7, 1));
        assert_eq!(es.leaves[1].start_date, d(2025, 8, 1));
    }

    #[test]
    fn active_statuses() {
        assert!(LeaveStatus::Pending.is_active());
        assert!(LeaveStatus::Approved.is_active());
        assert!(!LeaveStatus::Declined.is_active());
        assert!(!LeaveStatus::Cancelled.is_active());
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::ShiftCreated {
            id: Ulid::new(),
            employee_id: Ulid::new(),
            start: d(2025, 6, 1).and_time(t(22, 0)),
            end: d(2025, 6, 2).and_time(t(6, 0)),
            break_minutes: 30,
            department: Some("Kitchen".into()),
            published: false,
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
