//! Audit domain
//!
//! Append-only records of authentication and key lifecycle events.

mod event;

use std::fmt::Debug;

pub use event::{AuditEvent, AuditEventKind, AuthFailureReason, RequestMetadata};

use crate::domain::DomainError;

/// Destination for audit events
///
/// Write-once: there is no way to update or remove a recorded event.
pub trait AuditSink: Send + Sync + Debug {
    fn record(&self, event: &AuditEvent) -> Result<(), DomainError>;
}
