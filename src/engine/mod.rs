mod conflict;
mod error;
mod mutations;
mod queries;

pub use conflict::{
    check_placement, date_range_contains, date_ranges_overlap, has_assignment_on_day,
    overlapping_active_leave,
};
pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::holidays::HolidayCalendar;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedSchedule = Arc<RwLock<EmployeeSchedule>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// One company's rota engine: per-employee schedules behind individual
/// write locks, a WAL for durability, and a change feed for viewers.
/// Every mutation is validate-then-single-write; a rejected call never
/// touches the store.
#[derive(Debug)]
pub struct Engine {
    pub state: DashMap<Ulid, SharedSchedule>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    pub(super) holidays: Arc<HolidayCalendar>,
    /// Reverse lookup: entity (shift/leave) id → employee id
    pub(super) entity_to_employee: DashMap<Ulid, Ulid>,
}

/// Apply an event directly to an EmployeeSchedule (no locking — caller
/// holds the lock).
fn apply_to_schedule(es: &mut EmployeeSchedule, event: &Event, entity_map: &DashMap<Ulid, Ulid>) {
    match event {
        Event::EntitlementSet { leave_type, days, .. } => {
            es.entitlements.insert(*leave_type, *days);
        }
        Event::ShiftCreated {
            id,
            employee_id,
            start,
            end,
            break_minutes,
            department,
            published,
        } => {
            es.insert_shift(Shift {
                id: *id,
                employee_id: *employee_id,
                start: *start,
                end: *end,
                break_minutes: *break_minutes,
                department: department.clone(),
                published: *published,
            });
            entity_map.insert(*id, *employee_id);
        }
        Event::ShiftMoved { id, start, end, .. } => {
            if let Some(mut shift) = es.remove_shift(*id) {
                shift.start = *start;
                shift.end = *end;
                es.insert_shift(shift);
            }
        }
        Event::ShiftTimeEdited {
            id,
            start,
            end,
            break_minutes,
            ..
        } => {
            if let Some(mut shift) = es.remove_shift(*id) {
                shift.start = *start;
                shift.end = *end;
                shift.break_minutes = *break_minutes;
                es.insert_shift(shift);
            }
        }
        Event::ShiftPublished { id, .. } => {
            if let Some(pos) = es.shifts.iter().position(|s| s.id == *id) {
                es.shifts[pos].published = true;
            }
        }
        Event::ShiftDeleted { id, .. } => {
            es.remove_shift(*id);
            entity_map.remove(id);
        }
        Event::LeaveRequested {
            id,
            employee_id,
            leave_type,
            start_date,
            end_date,
            duration_days,
            reason,
        } => {
            es.insert_leave(LeaveRequest {
                id: *id,
                employee_id: *employee_id,
                leave_type: *leave_type,
                start_date: *start_date,
                end_date: *end_date,
                duration_days: *duration_days,
                reason: reason.clone(),
                status: LeaveStatus::Pending,
                decided_by: None,
                decided_at: None,
            });
            entity_map.insert(*id, *employee_id);
        }
        Event::LeaveEdited {
            id,
            leave_type,
            start_date,
            end_date,
            duration_days,
            reason,
            ..
        } => {
            // Remove + reinsert keeps the start-date sort order intact.
            if let Some(mut leave) = es.remove_leave(*id) {
                leave.leave_type = *leave_type;
                leave.start_date = *start_date;
                leave.end_date = *end_date;
                leave.duration_days = *duration_days;
                leave.reason = reason.clone();
                es.insert_leave(leave);
            }
        }
        Event::LeaveDecided {
            id,
            decision,
            decided_by,
            decided_at,
            ..
        } => {
            if let Some(leave) = es.leave_mut(*id) {
                leave.status = decision.status();
                leave.decided_by = Some(*decided_by);
                leave.decided_at = Some(*decided_at);
            }
        }
        Event::LeaveCancelled { id, .. } => {
            if let Some(leave) = es.leave_mut(*id) {
                leave.status = LeaveStatus::Cancelled;
            }
        }
        Event::LeaveDeleted { id, .. } => {
            es.remove_leave(*id);
            entity_map.remove(id);
        }
        // Register/remove are handled at the DashMap level, not here
        Event::EmployeeRegistered { .. } | Event::EmployeeRemoved { .. } => {}
    }
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        holidays: Arc<HolidayCalendar>,
        notify: Arc<NotifyHub>,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            state: DashMap::new(),
            wal_tx,
            notify,
            holidays,
            entity_to_employee: DashMap::new(),
        };

        // Replay — we're the sole owner of these Arcs, so try_write always
        // succeeds instantly. Never use blocking_write here because this may
        // run inside an async context (e.g. lazy company creation).
        for event in &events {
            match event {
                Event::EmployeeRegistered { id, name, department, started_on } => {
                    let es =
                        EmployeeSchedule::new(*id, name.clone(), department.clone(), *started_on);
                    engine.state.insert(*id, Arc::new(RwLock::new(es)));
                }
                Event::EmployeeRemoved { id } => {
                    engine.state.remove(id);
                    engine.entity_to_employee.retain(|_, emp| emp != id);
                }
                other => {
                    if let Some(employee_id) = other.employee_id()
                        && let Some(entry) = engine.state.get(&employee_id)
                    {
                        let es_arc = entry.clone();
                        let mut guard = es_arc.try_write().expect("replay: uncontended write");
                        apply_to_schedule(&mut guard, other, &engine.entity_to_employee);
                    }
                }
            }
        }

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Unavailable(e.to_string()))
    }

    pub fn get_schedule(&self, employee_id: &Ulid) -> Option<SharedSchedule> {
        self.state.get(employee_id).map(|e| e.value().clone())
    }

    pub fn employee_for_entity(&self, entity_id: &Ulid) -> Option<Ulid> {
        self.entity_to_employee.get(entity_id).map(|e| *e.value())
    }

    /// WAL-append + apply + notify in one call: the single commit point of
    /// every per-employee mutation.
    pub(super) async fn persist_and_apply(
        &self,
        es: &mut EmployeeSchedule,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_schedule(es, event, &self.entity_to_employee);
        self.notify.send(event);
        Ok(())
    }

    /// Lookup entity → employee, get schedule, acquire write lock.
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<EmployeeSchedule>), EngineError> {
        let employee_id = self
            .employee_for_entity(entity_id)
            .ok_or(EngineError::NotFound(*entity_id))?;
        let es = self
            .get_schedule(&employee_id)
            .ok_or(EngineError::NotFound(employee_id))?;
        let guard = es.write_owned().await;
        Ok((employee_id, guard))
    }
}
