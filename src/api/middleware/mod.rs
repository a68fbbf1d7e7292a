//! Extractors and middleware for the HTTP surface

pub mod auth;
pub mod client_info;
pub mod logging;
pub mod metrics;
pub mod owner;

pub use auth::RequireApiKey;
pub use client_info::{request_metadata, ClientInfo};
pub use logging::logging_middleware;
pub use metrics::metrics_middleware;
pub use owner::RequireOwner;
