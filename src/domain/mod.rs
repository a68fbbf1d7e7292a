//! Domain layer - entities, traits and pure rules

pub mod api_key;
pub mod audit;
pub mod clock;
pub mod error;
pub mod rate_limit;

pub use error::DomainError;
