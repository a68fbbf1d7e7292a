//! PostgreSQL API key repository implementation
//!
//! Reads and writes the `api_key` table, joined with `"user"` for owner
//! identity. Deleting a user cascades to their keys at the database level.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::domain::api_key::{
    ApiKey, ApiKeyId, ApiKeyRepository, KeyLookup, KeyOwner, OwnerId, ScopeId,
};
use crate::domain::DomainError;

const KEY_COLUMNS: &str = "k.id, k.name, k.hashed_key, k.lookup_hash, k.prefix, k.user_id, \
     k.sub_agency_id, k.last_used_at, k.created_at, k.expires_at";

/// PostgreSQL implementation of ApiKeyRepository
#[derive(Debug, Clone)]
pub struct PostgresApiKeyRepository {
    pool: PgPool,
}

impl PostgresApiKeyRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyRepository for PostgresApiKeyRepository {
    async fn find_by_lookup_hash(
        &self,
        lookup_hash: &str,
    ) -> Result<Option<KeyLookup>, DomainError> {
        let query = format!(
            r#"
            SELECT {KEY_COLUMNS}, u.email AS owner_email, u.name AS owner_name
            FROM api_key k
            INNER JOIN "user" u ON u.id = k.user_id
            WHERE k.lookup_hash = $1
            "#
        );

        let row = sqlx::query(&query)
            .bind(lookup_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to look up API key: {}", e)))?;

        match row {
            Some(row) => {
                let key = row_to_api_key(&row)?;
                let email: Option<String> = row.get("owner_email");
                let name: Option<String> = row.get("owner_name");
                let owner = KeyOwner::new(
                    key.owner_id().clone(),
                    email.unwrap_or_default(),
                    name.unwrap_or_default(),
                );

                Ok(Some(KeyLookup { key, owner }))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, key: &ApiKey) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO api_key (id, name, hashed_key, lookup_hash, prefix, user_id,
                                 sub_agency_id, last_used_at, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(key.id().as_str())
        .bind(key.name())
        .bind(key.secret_hash())
        .bind(key.lookup_hash())
        .bind(key.display_prefix())
        .bind(key.owner_id().as_str())
        .bind(key.scope_id().map(|s| s.as_str()))
        .bind(key.last_used_at())
        .bind(key.created_at())
        .bind(key.expires_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();

            if msg.contains("duplicate key") || msg.contains("unique constraint") {
                DomainError::conflict(format!(
                    "API key '{}' or its hash already exists",
                    key.id()
                ))
            } else {
                DomainError::storage(format!("Failed to insert API key: {}", e))
            }
        })?;

        Ok(())
    }

    async fn delete_owned(
        &self,
        id: &ApiKeyId,
        owner_id: &OwnerId,
    ) -> Result<Option<ApiKey>, DomainError> {
        let query = format!(
            r#"
            DELETE FROM api_key k
            WHERE k.id = $1 AND k.user_id = $2
            RETURNING {KEY_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(id.as_str())
            .bind(owner_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete API key: {}", e)))?;

        row.as_ref().map(row_to_api_key).transpose()
    }

    async fn touch_last_used(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<(), DomainError> {
        sqlx::query("UPDATE api_key SET last_used_at = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to touch API key: {}", e)))?;

        Ok(())
    }

    async fn list_by_owner(
        &self,
        owner_id: &OwnerId,
        scope_id: Option<ScopeId>,
    ) -> Result<Vec<ApiKey>, DomainError> {
        let rows = match scope_id {
            Some(scope) => {
                let query = format!(
                    r#"
                    SELECT {KEY_COLUMNS}
                    FROM api_key k
                    WHERE k.user_id = $1 AND k.sub_agency_id = $2
                    ORDER BY k.created_at, k.id
                    "#
                );
                sqlx::query(&query)
                    .bind(owner_id.as_str())
                    .bind(scope.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let query = format!(
                    r#"
                    SELECT {KEY_COLUMNS}
                    FROM api_key k
                    WHERE k.user_id = $1
                    ORDER BY k.created_at, k.id
                    "#
                );
                sqlx::query(&query)
                    .bind(owner_id.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| DomainError::storage(format!("Failed to list API keys: {}", e)))?;

        rows.iter().map(row_to_api_key).collect()
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM api_key WHERE expires_at IS NOT NULL AND expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::storage(format!("Failed to delete expired API keys: {}", e))
            })?;

        Ok(result.rows_affected())
    }
}

fn row_to_api_key(row: &sqlx::postgres::PgRow) -> Result<ApiKey, DomainError> {
    let id: String = row.get("id");
    let name: String = row.get("name");
    let hashed_key: String = row.get("hashed_key");
    let lookup_hash: String = row.get("lookup_hash");
    let prefix: String = row.get("prefix");
    let user_id: String = row.get("user_id");
    let sub_agency_id: Option<String> = row.get("sub_agency_id");
    let last_used_at: Option<DateTime<Utc>> = row.get("last_used_at");
    let created_at: DateTime<Utc> = row.get("created_at");
    let expires_at: Option<DateTime<Utc>> = row.get("expires_at");

    let key_id = ApiKeyId::new(id)
        .map_err(|e| DomainError::storage(format!("Invalid API key ID in database: {}", e)))?;
    let owner_id = OwnerId::new(user_id)
        .map_err(|e| DomainError::storage(format!("Invalid user ID in database: {}", e)))?;

    let mut key = ApiKey::new(
        key_id,
        name,
        hashed_key,
        lookup_hash,
        prefix,
        owner_id,
        created_at,
    );

    if let Some(scope) = sub_agency_id {
        let scope_id = ScopeId::new(scope)
            .map_err(|e| DomainError::storage(format!("Invalid scope ID in database: {}", e)))?;
        key = key.with_scope(scope_id);
    }

    if let Some(expires_at) = expires_at {
        key = key.with_expiration(expires_at);
    }

    if let Some(last_used_at) = last_used_at {
        key = key.with_last_used_at(last_used_at);
    }

    Ok(key)
}
