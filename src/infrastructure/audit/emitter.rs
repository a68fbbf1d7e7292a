//! Audit emitter
//!
//! Wraps a sink so that a failing sink never fails the caller.

use std::sync::Arc;

use tracing::error;

use crate::domain::audit::{AuditEvent, AuditSink};
use crate::infrastructure::observability::{record_audit_event, record_audit_failure};

use super::tracing_sink::TracingAuditSink;

#[derive(Debug, Clone)]
pub struct AuditEmitter {
    sink: Arc<dyn AuditSink>,
}

impl AuditEmitter {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Record an event; sink errors are logged and dropped
    pub fn emit(&self, event: AuditEvent) {
        let kind = event.kind().as_str();

        match self.sink.record(&event) {
            Ok(()) => record_audit_event(kind),
            Err(e) => {
                record_audit_failure(kind);
                error!(event = kind, error = %e, "Failed to record audit event");
            }
        }
    }
}

impl Default for AuditEmitter {
    fn default() -> Self {
        Self::new(Arc::new(TracingAuditSink::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::{AuditEventKind, AuthFailureReason, RequestMetadata};
    use crate::domain::DomainError;
    use crate::infrastructure::audit::InMemoryAuditSink;
    use chrono::Utc;

    #[derive(Debug)]
    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _event: &AuditEvent) -> Result<(), DomainError> {
            Err(DomainError::storage("disk full"))
        }
    }

    fn failure_event() -> AuditEvent {
        AuditEvent::auth_failed(
            AuthFailureReason::HashMismatch,
            Utc::now(),
            RequestMetadata::unknown(),
        )
    }

    #[test]
    fn test_emit_forwards_to_sink() {
        let sink = InMemoryAuditSink::new();
        let emitter = AuditEmitter::new(Arc::new(sink.clone()));

        emitter.emit(failure_event());

        assert_eq!(sink.events_of(AuditEventKind::KeyAuthFailed).len(), 1);
    }

    #[test]
    fn test_emit_swallows_sink_errors() {
        let emitter = AuditEmitter::new(Arc::new(FailingSink));

        // Must not panic or propagate
        emitter.emit(failure_event());
    }
}
