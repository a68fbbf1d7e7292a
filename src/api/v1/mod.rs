//! Endpoints authenticated with an API key

use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use serde::Serialize;

use crate::api::middleware::{ClientInfo, RequireApiKey};
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::api_key::{ApiKeyError, AuthenticatedPrincipal, ScopeId};

pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(whoami))
        .route("/scopes/{scope_id}", get(check_scope))
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeAccessResponse {
    pub scope_id: String,
    pub allowed: bool,
}

/// GET /v1/me
pub async fn whoami(RequireApiKey(principal): RequireApiKey) -> Json<AuthenticatedPrincipal> {
    Json(principal)
}

/// GET /v1/scopes/{scope_id}
pub async fn check_scope(
    State(state): State<AppState>,
    RequireApiKey(principal): RequireApiKey,
    ClientInfo(client): ClientInfo,
    Path(scope_id): Path<String>,
) -> Result<Json<ScopeAccessResponse>, ApiError> {
    let scope = ScopeId::new(scope_id).map_err(ApiKeyError::from)?;

    state
        .authenticator
        .authorize_scope(&principal, &scope, &client)
        .await?;

    Ok(Json(ScopeAccessResponse {
        scope_id: scope.as_str().to_string(),
        allowed: true,
    }))
}
