//! Audit infrastructure
//!
//! Sinks that persist audit events, and the emitter the services call.

mod emitter;
mod memory;
mod tracing_sink;

pub use emitter::AuditEmitter;
pub use memory::InMemoryAuditSink;
pub use tracing_sink::{TracingAuditSink, AUDIT_TARGET};
