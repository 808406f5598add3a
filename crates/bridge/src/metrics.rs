use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref WEBHOOKS_RECEIVED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "alertmanager_bridge_webhooks_received_total",
            "Alertmanager notifications received, by outcome."
        ),
        &["outcome"]
    )
    .expect("valid metric definition");
    pub static ref BACKEND_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "alertmanager_bridge_backend_requests_total",
            "Logical requests to Alertmanager instances, by method and outcome."
        ),
        &["method", "outcome"]
    )
    .expect("valid metric definition");
    pub static ref BACKEND_RETRIES_TOTAL: IntCounter = IntCounter::new(
        "alertmanager_bridge_backend_retries_total",
        "Retried attempts against Alertmanager instances."
    )
    .expect("valid metric definition");
    pub static ref POSTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "alertmanager_bridge_posts_total",
            "Posts created or updated on the message platform, by operation and outcome."
        ),
        &["operation", "outcome"]
    )
    .expect("valid metric definition");
    pub static ref SILENCES_EXPIRED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "alertmanager_bridge_silences_expired_total",
            "Silence expirations requested from chat, by outcome."
        ),
        &["outcome"]
    )
    .expect("valid metric definition");
}

/// Register all collectors with [`REGISTRY`]. Call once at startup.
pub fn register_metrics() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(WEBHOOKS_RECEIVED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BACKEND_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BACKEND_RETRIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(POSTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SILENCES_EXPIRED_TOTAL.clone()))?;
    Ok(())
}

// Function to gather metrics for exposition
pub fn gather_metrics() -> String {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
