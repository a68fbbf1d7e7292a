//! Observability infrastructure - Metrics

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use metrics::{
    create_metrics_router, init_metrics, record_audit_event, record_audit_failure,
    record_auth_outcome, record_http_request, record_rate_limited, PrometheusMetrics,
};
