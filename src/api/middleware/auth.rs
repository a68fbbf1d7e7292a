//! API key authentication extractor

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use super::client_info::request_metadata;
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::AuthenticatedPrincipal;

/// Extractor that requires a valid `Authorization: Bearer <key>` header
///
/// The resolved principal is also stored in the request extensions.
#[derive(Debug, Clone)]
pub struct RequireApiKey(pub AuthenticatedPrincipal);

impl FromRequestParts<AppState> for RequireApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let metadata = request_metadata(&parts.headers);

        let principal = state
            .authenticator
            .authenticate(authorization_header(&parts.headers), &metadata)
            .await?;

        parts.extensions.insert(principal.clone());

        Ok(RequireApiKey(principal))
    }
}

// A header that is not valid UTF-8 is treated as present but malformed
fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default())
}
