//! Infrastructure layer - implementations of the domain seams

pub mod api_key;
pub mod audit;
pub mod logging;
pub mod observability;
pub mod rate_limit;
pub mod scope;
