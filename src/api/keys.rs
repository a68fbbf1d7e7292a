//! API key management endpoints for signed-in owners

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::middleware::{ClientInfo, RequireOwner};
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::api_key::{ApiKey, ApiKeyError, ApiKeyId, ScopeId};
use crate::infrastructure::api_key::CreateApiKeyRequest;

pub fn create_keys_router() -> Router<AppState> {
    Router::new()
        .route("/api-keys", get(list_api_keys).post(create_api_key))
        .route("/api-keys/{key_id}", delete(delete_api_key))
}

/// Request body for key creation
///
/// Accepts the camelCase field names used by the dashboard client.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateApiKeyBody {
    pub name: String,
    #[serde(default, alias = "subAgencyId", alias = "sub_agency_id")]
    pub scope_id: Option<String>,
    #[serde(default, alias = "expiresInDays")]
    pub expires_in_days: Option<u32>,
}

impl TryFrom<CreateApiKeyBody> for CreateApiKeyRequest {
    type Error = ApiKeyError;

    fn try_from(body: CreateApiKeyBody) -> Result<Self, Self::Error> {
        let mut request = CreateApiKeyRequest::new(body.name);

        if let Some(scope) = body.scope_id.filter(|s| !s.is_empty()) {
            request = request.with_scope(ScopeId::new(scope)?);
        }
        if let Some(days) = body.expires_in_days {
            request = request.with_expiry_days(days);
        }

        Ok(request)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListApiKeysQuery {
    #[serde(default)]
    pub scope_id: Option<String>,
}

/// Listing view of a key; never carries secret material
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyResponse {
    pub id: String,
    pub name: String,
    pub prefix: String,
    pub owner_id: String,
    pub scope_id: Option<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&ApiKey> for ApiKeyResponse {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id().as_str().to_string(),
            name: key.name().to_string(),
            prefix: key.display_prefix().to_string(),
            owner_id: key.owner_id().as_str().to_string(),
            scope_id: key.scope_id().map(|s| s.as_str().to_string()),
            last_used_at: key.last_used_at(),
            created_at: key.created_at(),
            expires_at: key.expires_at(),
        }
    }
}

/// Creation output, the only response that contains the plaintext key
#[derive(Clone, Serialize)]
pub struct CreatedApiKeyResponse {
    pub api_key: String,
    pub id: String,
    pub name: String,
    pub prefix: String,
    pub scope_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListApiKeysResponse {
    pub api_keys: Vec<ApiKeyResponse>,
    pub total: usize,
}

/// GET /api/api-keys
pub async fn list_api_keys(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
    ClientInfo(client): ClientInfo,
    Query(query): Query<ListApiKeysQuery>,
) -> Result<Json<ListApiKeysResponse>, ApiError> {
    debug!(owner_id = %owner.id, scope_id = ?query.scope_id, "Listing API keys");

    let scope_id = query
        .scope_id
        .filter(|s| !s.is_empty())
        .map(ScopeId::new)
        .transpose()
        .map_err(ApiKeyError::from)?;

    let keys = state
        .api_key_service
        .list(&owner.id, scope_id, &client)
        .await?;

    let api_keys: Vec<ApiKeyResponse> = keys.iter().map(ApiKeyResponse::from).collect();
    let total = api_keys.len();

    Ok(Json(ListApiKeysResponse { api_keys, total }))
}

/// POST /api/api-keys
pub async fn create_api_key(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
    ClientInfo(client): ClientInfo,
    Json(body): Json<CreateApiKeyBody>,
) -> Result<(StatusCode, Json<CreatedApiKeyResponse>), ApiError> {
    debug!(owner_id = %owner.id, name = %body.name, "Creating API key");

    let request = CreateApiKeyRequest::try_from(body)?;
    let created = state
        .api_key_service
        .create(&owner.id, request, &client)
        .await?;

    let key = &created.key;
    Ok((
        StatusCode::CREATED,
        Json(CreatedApiKeyResponse {
            api_key: created.secret.clone(),
            id: key.id().as_str().to_string(),
            name: key.name().to_string(),
            prefix: key.display_prefix().to_string(),
            scope_id: key.scope_id().map(|s| s.as_str().to_string()),
            created_at: key.created_at(),
            expires_at: key.expires_at(),
        }),
    ))
}

/// DELETE /api/api-keys/{key_id}
pub async fn delete_api_key(
    State(state): State<AppState>,
    RequireOwner(owner): RequireOwner,
    ClientInfo(client): ClientInfo,
    Path(key_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    debug!(owner_id = %owner.id, key_id = %key_id, "Deleting API key");

    // An id that cannot exist is reported like one that does not
    let id = ApiKeyId::new(key_id).map_err(|_| ApiKeyError::NotFound)?;

    let deleted = state
        .api_key_service
        .delete(&owner.id, &id, &client)
        .await?;

    Ok(Json(serde_json::json!({
        "deleted": true,
        "id": deleted.id().as_str()
    })))
}
