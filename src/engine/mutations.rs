use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use tokio::sync::{RwLock, oneshot};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{check_placement, overlapping_active_leave, validate_break};
use super::{Engine, EngineError, WalCommand};

fn count_mutation(op: &'static str) {
    metrics::counter!(observability::MUTATIONS_TOTAL, "op" => op).increment(1);
}

fn count_conflict(op: &'static str, err: &EngineError) {
    if let Some(reason) = err.conflict_label() {
        metrics::counter!(observability::CONFLICTS_TOTAL, "op" => op, "reason" => reason)
            .increment(1);
    }
}

impl Engine {
    // ── Employee directory sync ──────────────────────────────

    pub async fn register_employee(
        &self,
        id: Ulid,
        name: String,
        department: Option<String>,
        started_on: NaiveDate,
    ) -> Result<(), EngineError> {
        if self.state.len() >= MAX_EMPLOYEES_PER_COMPANY {
            return Err(EngineError::LimitExceeded("too many employees"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("employee name too long"));
        }
        if let Some(ref d) = department
            && d.len() > MAX_DEPARTMENT_LEN
        {
            return Err(EngineError::LimitExceeded("department name too long"));
        }
        if self.state.contains_key(&id) {
            return Err(EngineError::AlreadyRegistered(id));
        }

        let event = Event::EmployeeRegistered {
            id,
            name: name.clone(),
            department: department.clone(),
            started_on,
        };
        self.wal_append(&event).await?;
        let es = EmployeeSchedule::new(id, name, department, started_on);
        self.state.insert(id, Arc::new(RwLock::new(es)));
        self.notify.send(&event);
        count_mutation("register_employee");
        Ok(())
    }

    pub async fn remove_employee(&self, id: Ulid) -> Result<(), EngineError> {
        if !self.state.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::EmployeeRemoved { id };
        self.wal_append(&event).await?;
        self.state.remove(&id);
        self.entity_to_employee.retain(|_, emp| *emp != id);
        self.notify.send(&event);
        count_mutation("remove_employee");
        Ok(())
    }

    pub async fn set_entitlement(
        &self,
        employee_id: Ulid,
        leave_type: LeaveType,
        days: u32,
    ) -> Result<(), EngineError> {
        let es = self
            .get_schedule(&employee_id)
            .ok_or(EngineError::NotFound(employee_id))?;
        let mut guard = es.write().await;

        let event = Event::EntitlementSet { employee_id, leave_type, days };
        self.persist_and_apply(&mut guard, &event).await?;
        count_mutation("set_entitlement");
        Ok(())
    }

    // ── Shift placement ──────────────────────────────────────

    /// Place a shift on `day`. Validation order, first failure wins:
    /// holiday → duplicate assignment → active leave → time-range shape.
    /// The commit is the last step; a rejection never mutates state.
    pub async fn create_shift(
        &self,
        id: Ulid,
        employee_id: Ulid,
        day: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        break_minutes: u32,
        department: Option<String>,
    ) -> Result<Shift, EngineError> {
        if let Some(ref d) = department
            && d.len() > MAX_DEPARTMENT_LEN
        {
            return Err(EngineError::LimitExceeded("department name too long"));
        }
        let es = self
            .get_schedule(&employee_id)
            .ok_or(EngineError::NotFound(employee_id))?;
        let mut guard = es.write().await;
        if guard.shifts.len() >= MAX_SHIFTS_PER_EMPLOYEE {
            return Err(EngineError::LimitExceeded("too many shifts for employee"));
        }

        check_placement(&guard, &self.holidays, day, None)
            .inspect_err(|e| count_conflict("create_shift", e))?;

        let (start, end) = resolve_shift_times(day, start_time, end_time);
        validate_break(start, end, break_minutes)
            .inspect_err(|e| count_conflict("create_shift", e))?;

        let event = Event::ShiftCreated {
            id,
            employee_id,
            start,
            end,
            break_minutes,
            department,
            published: false,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        count_mutation("create_shift");
        Ok(guard.shift(id).cloned().expect("shift just applied"))
    }

    /// Move a shift to another calendar day, preserving its duration
    /// exactly. Duration is derived from the stored timestamps — never
    /// recomputed from display times — with a 24h correction if the stored
    /// span is non-positive, so an overnight shift stays
    /// overnight-equivalent after the move.
    pub async fn move_shift(&self, id: Ulid, new_day: NaiveDate) -> Result<Shift, EngineError> {
        let (_, mut guard) = self.resolve_entity_write(&id).await?;
        let shift = guard.shift(id).ok_or(EngineError::NotFound(id))?;

        let mut duration = shift.end - shift.start;
        if duration <= Duration::zero() {
            duration = duration + Duration::hours(24);
        }
        let new_start = new_day.and_time(shift.start.time());
        let new_end = new_start + duration;
        let employee_id = shift.employee_id;

        check_placement(&guard, &self.holidays, new_day, Some(id))
            .inspect_err(|e| count_conflict("move_shift", e))?;

        let event = Event::ShiftMoved { id, employee_id, start: new_start, end: new_end };
        self.persist_and_apply(&mut guard, &event).await?;
        count_mutation("move_shift");
        Ok(guard.shift(id).cloned().expect("shift just applied"))
    }

    /// Change a shift's times on its existing day. The day is not changing,
    /// so the holiday/duplicate/leave gates hold by construction and are
    /// not re-run; only the time-range shape is validated.
    pub async fn edit_shift_time(
        &self,
        id: Ulid,
        new_start_time: NaiveTime,
        new_end_time: NaiveTime,
        new_break_minutes: u32,
    ) -> Result<Shift, EngineError> {
        let (_, mut guard) = self.resolve_entity_write(&id).await?;
        let shift = guard.shift(id).ok_or(EngineError::NotFound(id))?;
        let employee_id = shift.employee_id;

        let (start, end) = resolve_shift_times(shift.day(), new_start_time, new_end_time);
        validate_break(start, end, new_break_minutes)
            .inspect_err(|e| count_conflict("edit_shift_time", e))?;

        let event = Event::ShiftTimeEdited {
            id,
            employee_id,
            start,
            end,
            break_minutes: new_break_minutes,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        count_mutation("edit_shift_time");
        Ok(guard.shift(id).cloned().expect("shift just applied"))
    }

    pub async fn publish_shift(&self, id: Ulid) -> Result<(), EngineError> {
        let (employee_id, mut guard) = self.resolve_entity_write(&id).await?;
        if guard.shift(id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::ShiftPublished { id, employee_id };
        self.persist_and_apply(&mut guard, &event).await?;
        count_mutation("publish_shift");
        Ok(())
    }

    /// Unconditional beyond existence.
    pub async fn delete_shift(&self, id: Ulid) -> Result<(), EngineError> {
        let (employee_id, mut guard) = self.resolve_entity_write(&id).await?;
        if guard.shift(id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::ShiftDeleted { id, employee_id };
        self.persist_and_apply(&mut guard, &event).await?;
        count_mutation("delete_shift");
        Ok(())
    }

    // ── Leave ledger ─────────────────────────────────────────

    pub async fn create_leave_request(
        &self,
        id: Ulid,
        employee_id: Ulid,
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: Option<String>,
    ) -> Result<LeaveRequest, EngineError> {
        if start_date > end_date {
            let err = EngineError::InvalidTimeRange("leave start after end");
            count_conflict("create_leave_request", &err);
            return Err(err);
        }
        let duration_days = inclusive_days(start_date, end_date);
        if duration_days > MAX_LEAVE_SPAN_DAYS {
            return Err(EngineError::LimitExceeded("leave request too long"));
        }
        if let Some(ref r) = reason
            && r.len() > MAX_REASON_LEN
        {
            return Err(EngineError::LimitExceeded("reason too long"));
        }
        let es = self
            .get_schedule(&employee_id)
            .ok_or(EngineError::NotFound(employee_id))?;
        let mut guard = es.write().await;
        if guard.leaves.len() >= MAX_LEAVES_PER_EMPLOYEE {
            return Err(EngineError::LimitExceeded("too many leave requests"));
        }

        if let Some(existing) = overlapping_active_leave(&guard, start_date, end_date, None) {
            let err = EngineError::OverlappingLeave { leave_id: existing.id };
            count_conflict("create_leave_request", &err);
            return Err(err);
        }

        let event = Event::LeaveRequested {
            id,
            employee_id,
            leave_type,
            start_date,
            end_date,
            duration_days,
            reason,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        count_mutation("create_leave_request");
        Ok(guard.leave(id).cloned().expect("leave just applied"))
    }

    /// Admin whole-record edit. Re-runs the overlap check excluding the
    /// request itself; allowed on any status and never changes status.
    pub async fn edit_leave_request(
        &self,
        id: Ulid,
        leave_type: LeaveType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: Option<String>,
    ) -> Result<LeaveRequest, EngineError> {
        if start_date > end_date {
            let err = EngineError::InvalidTimeRange("leave start after end");
            count_conflict("edit_leave_request", &err);
            return Err(err);
        }
        let duration_days = inclusive_days(start_date, end_date);
        if duration_days > MAX_LEAVE_SPAN_DAYS {
            return Err(EngineError::LimitExceeded("leave request too long"));
        }
        if let Some(ref r) = reason
            && r.len() > MAX_REASON_LEN
        {
            return Err(EngineError::LimitExceeded("reason too long"));
        }
        let (employee_id, mut guard) = self.resolve_entity_write(&id).await?;
        if guard.leave(id).is_none() {
            return Err(EngineError::NotFound(id));
        }

        if let Some(existing) = overlapping_active_leave(&guard, start_date, end_date, Some(id)) {
            let err = EngineError::OverlappingLeave { leave_id: existing.id };
            count_conflict("edit_leave_request", &err);
            return Err(err);
        }

        let event = Event::LeaveEdited {
            id,
            employee_id,
            leave_type,
            start_date,
            end_date,
            duration_days,
            reason,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        count_mutation("edit_leave_request");
        Ok(guard.leave(id).cloned().expect("leave just applied"))
    }

    /// Rule on a pending request. Approved and declined never transition
    /// into each other — a wrong decision is cancelled and recreated.
    pub async fn decide_leave(
        &self,
        id: Ulid,
        decision: Decision,
        decided_by: Ulid,
    ) -> Result<LeaveRequest, EngineError> {
        let (employee_id, mut guard) = self.resolve_entity_write(&id).await?;
        let leave = guard.leave(id).ok_or(EngineError::NotFound(id))?;
        if leave.status != LeaveStatus::Pending {
            let err = EngineError::InvalidTransition {
                from: leave.status,
                to: decision.status(),
            };
            count_conflict("decide_leave", &err);
            return Err(err);
        }

        let event = Event::LeaveDecided {
            id,
            employee_id,
            decision,
            decided_by,
            decided_at: Utc::now().naive_utc(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        count_mutation("decide_leave");
        Ok(guard.leave(id).cloned().expect("leave just applied"))
    }

    /// Terminal: no further transitions afterwards.
    pub async fn cancel_leave(&self, id: Ulid) -> Result<(), EngineError> {
        let (employee_id, mut guard) = self.resolve_entity_write(&id).await?;
        let leave = guard.leave(id).ok_or(EngineError::NotFound(id))?;
        if leave.status == LeaveStatus::Cancelled {
            let err = EngineError::InvalidTransition {
                from: LeaveStatus::Cancelled,
                to: LeaveStatus::Cancelled,
            };
            count_conflict("cancel_leave", &err);
            return Err(err);
        }

        let event = Event::LeaveCancelled { id, employee_id };
        self.persist_and_apply(&mut guard, &event).await?;
        count_mutation("cancel_leave");
        Ok(())
    }

    /// Hard delete, out-of-band of the state machine: legal from any status.
    pub async fn delete_leave(&self, id: Ulid) -> Result<(), EngineError> {
        let (employee_id, mut guard) = self.resolve_entity_write(&id).await?;
        if guard.leave(id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::LeaveDeleted { id, employee_id };
        self.persist_and_apply(&mut guard, &event).await?;
        count_mutation("delete_leave");
        Ok(())
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        let schedules: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        for es in schedules {
            let guard = es.read().await;
            events.push(Event::EmployeeRegistered {
                id: guard.id,
                name: guard.name.clone(),
                department: guard.department.clone(),
                started_on: guard.started_on,
            });
            for (leave_type, days) in &guard.entitlements {
                events.push(Event::EntitlementSet {
                    employee_id: guard.id,
                    leave_type: *leave_type,
                    days: *days,
                });
            }
            for shift in &guard.shifts {
                events.push(Event::ShiftCreated {
                    id: shift.id,
                    employee_id: guard.id,
                    start: shift.start,
                    end: shift.end,
                    break_minutes: shift.break_minutes,
                    department: shift.department.clone(),
                    published: shift.published,
                });
            }
            for leave in &guard.leaves {
                events.push(Event::LeaveRequested {
                    id: leave.id,
                    employee_id: guard.id,
                    leave_type: leave.leave_type,
                    start_date: leave.start_date,
                    end_date: leave.end_date,
                    duration_days: leave.duration_days,
                    reason: leave.reason.clone(),
                });
                match leave.status {
                    LeaveStatus::Pending => {}
                    LeaveStatus::Approved | LeaveStatus::Declined => {
                        if let (Some(by), Some(at)) = (leave.decided_by, leave.decided_at) {
                            let decision = if leave.status == LeaveStatus::Approved {
                                Decision::Approved
                            } else {
                                Decision::Declined
                            };
                            events.push(Event::LeaveDecided {
                                id: leave.id,
                                employee_id: guard.id,
                                decision,
                                decided_by: by,
                                decided_at: at,
                            });
                        }
                    }
                    LeaveStatus::Cancelled => {
                        // Prior decision metadata, if any, is re-emitted so
                        // decided_by/decided_at survive compaction.
                        if let (Some(by), Some(at)) = (leave.decided_by, leave.decided_at) {
                            events.push(Event::LeaveDecided {
                                id: leave.id,
                                employee_id: guard.id,
                                decision: Decision::Approved,
                                decided_by: by,
                                decided_at: at,
                            });
                        }
                        events.push(Event::LeaveCancelled { id: leave.id, employee_id: guard.id });
                    }
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Unavailable(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
