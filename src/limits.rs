//! Hard caps enforced by the engine. Exceeding any of these is a
//! `LimitExceeded` rejection, never a panic.

pub const MAX_EMPLOYEES_PER_COMPANY: usize = 10_000;

pub const MAX_SHIFTS_PER_EMPLOYEE: usize = 4_096;

pub const MAX_LEAVES_PER_EMPLOYEE: usize = 1_024;

/// Longest single leave request, in inclusive calendar days.
pub const MAX_LEAVE_SPAN_DAYS: i64 = 366;

pub const MAX_NAME_LEN: usize = 256;

pub const MAX_DEPARTMENT_LEN: usize = 128;

pub const MAX_REASON_LEN: usize = 1_024;

/// Widest date window accepted by range queries.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 400;

pub const MAX_COMPANIES: usize = 1_024;

pub const MAX_COMPANY_NAME_LEN: usize = 256;
