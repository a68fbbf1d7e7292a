//! Scope directory implementations

mod in_memory;
mod postgres;

pub use in_memory::InMemoryScopeDirectory;
pub use postgres::PostgresScopeDirectory;
