//! Client metadata extractor for audit records

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::domain::audit::RequestMetadata;

/// Caller IP and user agent, as seen through the proxy chain
///
/// Never rejects; absent values become `"unknown"`.
#[derive(Debug, Clone)]
pub struct ClientInfo(pub RequestMetadata);

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientInfo(request_metadata(&parts.headers)))
    }
}

/// Build request metadata from proxy and user agent headers
pub fn request_metadata(headers: &HeaderMap) -> RequestMetadata {
    RequestMetadata::new(client_ip(headers), header_str(headers, header::USER_AGENT.as_str()))
}

// First hop of X-Forwarded-For is the originating client
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|value| {
            value
                .split(',')
                .map(str::trim)
                .find(|hop| !hop.is_empty())
                .map(str::to_string)
        })
        .or_else(|| header_str(headers, "x-real-ip"))
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
