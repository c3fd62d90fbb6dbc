//! Rota scheduling and leave-conflict engine.
//!
//! The core of a workforce HR platform: calendar-grid construction, shift
//! placement and move validation, and the leave ledger the rota consults
//! before committing any change. Library-level — no wire protocol or CLI;
//! the surrounding application calls the typed engine operations and
//! re-fetches views when the change feed fires.

pub mod calendar;
pub mod company;
pub mod engine;
pub mod holidays;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod wal;
