use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use tracing::error;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref QUERIES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("battery_queries_total", "Total store operations requested"),
        &["operation"]
    )
    .unwrap();
    pub static ref SAMPLES_INSERTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "battery_samples_inserted_total",
        "Total telemetry samples stored"
    ))
    .unwrap();
    pub static ref INVALID_REQUESTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "battery_invalid_requests_total",
        "Total operations rejected for invalid client input"
    ))
    .unwrap();
    pub static ref STORAGE_ERRORS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "battery_storage_errors_total",
        "Total statements that failed or timed out in the store"
    ))
    .unwrap();
    pub static ref DB_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "battery_db_connection_failures_total",
        "Total connection-level database failures"
    ))
    .unwrap();
    pub static ref QUERY_LATENCY_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "battery_query_latency_seconds",
            "Time taken to execute one statement"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ]),
        &["operation"]
    )
    .unwrap();
    pub static ref POOL_AVAILABLE: Gauge = Gauge::with_opts(Opts::new(
        "battery_pool_available",
        "1 when the database pool is ready, 0 otherwise"
    ))
    .unwrap();
}

pub fn init_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(QUERIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SAMPLES_INSERTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INVALID_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORAGE_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DB_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUERY_LATENCY_SECONDS.clone()))?;
    REGISTRY.register(Box::new(POOL_AVAILABLE.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
