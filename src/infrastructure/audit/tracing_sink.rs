//! Audit sink writing structured tracing events

use tracing::{info, warn};

use crate::domain::audit::{AuditEvent, AuditSink};
use crate::domain::DomainError;

/// Tracing target of every audit line
pub const AUDIT_TARGET: &str = "api_key_audit";

/// Production sink: one structured log line per event
///
/// Failure events are logged at WARN, everything else at INFO.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), DomainError> {
        let key_id = event.key_id().map(|k| k.as_str()).unwrap_or("");
        let key_name = event.key_name().unwrap_or("");
        let scope_id = event.scope_id().map(|s| s.as_str()).unwrap_or("");
        let reason = event.reason().map(|r| r.as_str()).unwrap_or("");
        let timestamp = event.timestamp().to_rfc3339();

        if event.kind().is_failure() {
            warn!(
                target: AUDIT_TARGET,
                event = event.kind().as_str(),
                user_id = %event.user_id(),
                key_id,
                key_name,
                scope_id,
                reason,
                ip_address = %event.request().ip_address,
                user_agent = %event.request().user_agent,
                timestamp = %timestamp,
            );
        } else {
            info!(
                target: AUDIT_TARGET,
                event = event.kind().as_str(),
                user_id = %event.user_id(),
                key_id,
                key_name,
                scope_id,
                ip_address = %event.request().ip_address,
                user_agent = %event.request().user_agent,
                timestamp = %timestamp,
            );
        }

        Ok(())
    }
}
