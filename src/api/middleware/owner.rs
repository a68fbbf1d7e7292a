//! Owner identity extractor for key management routes
//!
//! Interactive sessions are handled by the fronting gateway, which forwards
//! the signed-in user as `X-Owner-*` headers. They are honored only when
//! `auth.trust_owner_headers` is enabled.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::api_key::{KeyOwner, OwnerId};

pub const OWNER_ID_HEADER: &str = "x-owner-id";
pub const OWNER_EMAIL_HEADER: &str = "x-owner-email";
pub const OWNER_NAME_HEADER: &str = "x-owner-name";

/// Extractor that requires a signed-in key owner
#[derive(Debug, Clone)]
pub struct RequireOwner(pub KeyOwner);

impl FromRequestParts<AppState> for RequireOwner {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if !state.trust_owner_headers {
            return Err(session_required());
        }

        let owner = extract_owner_from_headers(&parts.headers)?;

        if let Some(local) = &state.local_owners {
            local.upsert_owner(owner.clone()).await;
        }

        debug!(owner_id = %owner.id, "Owner resolved from session headers");

        Ok(RequireOwner(owner))
    }
}

fn extract_owner_from_headers(headers: &HeaderMap) -> Result<KeyOwner, ApiError> {
    let id = header_value(headers, OWNER_ID_HEADER).ok_or_else(session_required)?;
    let id = OwnerId::new(id).map_err(|_| session_required())?;

    Ok(KeyOwner::new(
        id,
        header_value(headers, OWNER_EMAIL_HEADER).unwrap_or_default(),
        header_value(headers, OWNER_NAME_HEADER).unwrap_or_default(),
    ))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn session_required() -> ApiError {
    ApiError::unauthorized("Authentication required").with_code("session_required")
}
