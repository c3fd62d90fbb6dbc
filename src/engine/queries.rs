use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::date_range_contains;
use super::{Engine, EngineError};

impl Engine {
    /// Derive an employee's balance for one leave type and period.
    ///
    /// `taken` sums the duration of approved requests of that type whose
    /// whole range falls inside the period — pending, declined and
    /// cancelled requests never contribute. Pure projection over the
    /// ledger: repeated calls without intervening writes return identical
    /// results, and a negative balance is surfaced as-is.
    pub async fn compute_balance(
        &self,
        employee_id: Ulid,
        leave_type: LeaveType,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<LeaveBalance, EngineError> {
        if period_start > period_end {
            return Err(EngineError::InvalidTimeRange("period start after end"));
        }
        let es = self
            .get_schedule(&employee_id)
            .ok_or(EngineError::NotFound(employee_id))?;
        let guard = es.read().await;

        let entitled = i64::from(guard.entitlements.get(&leave_type).copied().unwrap_or(0));
        let taken: i64 = guard
            .leaves
            .iter()
            .filter(|l| {
                l.status == LeaveStatus::Approved
                    && l.leave_type == leave_type
                    && date_range_contains(period_start, period_end, l.start_date, l.end_date)
            })
            .map(|l| l.duration_days)
            .sum();

        Ok(LeaveBalance { entitled, taken, balance: entitled - taken })
    }

    /// One employee's shifts whose calendar day falls in `[from, to]`.
    pub async fn shifts_in_range(
        &self,
        employee_id: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Shift>, EngineError> {
        if (to - from).num_days() > MAX_QUERY_WINDOW_DAYS {
            return Err(EngineError::LimitExceeded("query window too wide"));
        }
        let es = self
            .get_schedule(&employee_id)
            .ok_or(EngineError::NotFound(employee_id))?;
        let guard = es.read().await;
        Ok(guard
            .shifts
            .iter()
            .filter(|s| s.day() >= from && s.day() <= to)
            .cloned()
            .collect())
    }

    /// Every shift in the company on one calendar day, across employees.
    pub async fn company_shifts_on(&self, day: NaiveDate) -> Vec<Shift> {
        let schedules: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for es in schedules {
            let guard = es.read().await;
            if let Some(shift) = guard.shift_on_day(day) {
                out.push(shift.clone());
            }
        }
        out
    }

    /// One employee's full leave ledger, newest range last.
    pub async fn leave_requests(&self, employee_id: Ulid) -> Result<Vec<LeaveRequest>, EngineError> {
        let es = self
            .get_schedule(&employee_id)
            .ok_or(EngineError::NotFound(employee_id))?;
        let guard = es.read().await;
        Ok(guard.leaves.clone())
    }

    pub async fn get_shift(&self, id: Ulid) -> Result<Shift, EngineError> {
        let employee_id = self.employee_for_entity(&id).ok_or(EngineError::NotFound(id))?;
        let es = self
            .get_schedule(&employee_id)
            .ok_or(EngineError::NotFound(employee_id))?;
        let guard = es.read().await;
        guard.shift(id).cloned().ok_or(EngineError::NotFound(id))
    }

    pub async fn get_leave(&self, id: Ulid) -> Result<LeaveRequest, EngineError> {
        let employee_id = self.employee_for_entity(&id).ok_or(EngineError::NotFound(id))?;
        let es = self
            .get_schedule(&employee_id)
            .ok_or(EngineError::NotFound(employee_id))?;
        let guard = es.read().await;
        guard.leave(id).cloned().ok_or(EngineError::NotFound(id))
    }

    pub async fn list_employees(&self) -> Vec<EmployeeInfo> {
        let schedules: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(schedules.len());
        for es in schedules {
            let guard = es.read().await;
            out.push(EmployeeInfo {
                id: guard.id,
                name: guard.name.clone(),
                department: guard.department.clone(),
                started_on: guard.started_on,
            });
        }
        out.sort_by_key(|e| e.id);
        out
    }
}
