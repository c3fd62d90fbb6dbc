use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: committed engine mutations. Labels: op.
pub const MUTATIONS_TOTAL: &str = "rota_mutations_total";

/// Counter: business-rule rejections. Labels: op, reason.
pub const CONFLICTS_TOTAL: &str = "rota_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of active companies (loaded engines).
pub const COMPANIES_ACTIVE: &str = "rota_companies_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "rota_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "rota_wal_flush_batch_size";

/// Install the Prometheus metrics exporter on the given port. No-op if
/// port is None. Call once from the embedding application.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Default tracing subscriber for embedding applications that don't bring
/// their own.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}
