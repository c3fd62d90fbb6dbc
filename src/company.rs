use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::engine::Engine;
use crate::holidays::HolidayCalendar;
use crate::limits::*;
use crate::notify::NotifyHub;

/// Manages per-company engines. Each company gets its own engine, WAL file,
/// notify hub and background compactor; there is no process-wide "current
/// company" — callers always address a company by name.
pub struct CompanyManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
    holidays: Arc<HolidayCalendar>,
}

impl CompanyManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64, holidays: Arc<HolidayCalendar>) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
            holidays,
        }
    }

    /// Get or lazily create an engine for the given company.
    pub fn get_or_create(&self, company: &str) -> std::io::Result<Arc<Engine>> {
        if let Some(engine) = self.engines.get(company) {
            return Ok(engine.value().clone());
        }
        if company.len() > MAX_COMPANY_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "company name too long",
            ));
        }
        if self.engines.len() >= MAX_COMPANIES {
            return Err(std::io::Error::other("too many companies"));
        }

        // Sanitize company name to prevent path traversal
        let safe_name: String = company
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty company name",
            ));
        }

        let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
        let notify = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::new(wal_path, self.holidays.clone(), notify)?);

        let compactor_engine = engine.clone();
        let threshold = self.compact_threshold;
        tokio::spawn(async move {
            run_compactor(compactor_engine, threshold).await;
        });

        self.engines.insert(company.to_string(), engine.clone());
        metrics::gauge!(crate::observability::COMPANIES_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }

    /// Subscribe to a company's change feed without forcing engine creation.
    pub fn subscribe(&self, company: &str) -> Option<tokio::sync::broadcast::Receiver<crate::model::Event>> {
        self.engines.get(company).map(|e| e.notify.subscribe())
    }
}

/// Background task that rewrites a company's WAL once enough appends have
/// accumulated since the last compaction.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        if engine.wal_appends_since_compact().await >= threshold {
            match engine.compact_wal().await {
                Ok(()) => info!("compacted rota WAL"),
                Err(e) => warn!("WAL compaction failed: {e}"),
            }
        }
    }
}
