//! PostgreSQL scope directory backed by the agency tables

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::api_key::{OwnerId, ScopeDirectory, ScopeId};
use crate::domain::DomainError;

#[derive(Debug, Clone)]
pub struct PostgresScopeDirectory {
    pool: PgPool,
}

impl PostgresScopeDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScopeDirectory for PostgresScopeDirectory {
    async fn can_manage(
        &self,
        owner_id: &OwnerId,
        scope_id: &ScopeId,
    ) -> Result<bool, DomainError> {
        let allowed: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sub_agency s
                WHERE s.id = $1 AND s.owner_id = $2
            ) OR EXISTS(
                SELECT 1 FROM agency_user au
                WHERE au.sub_agency_id = $1 AND au.user_id = $2 AND au.role = 'admin'
            )
            "#,
        )
        .bind(scope_id.as_str())
        .bind(owner_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check scope rights: {}", e)))?;

        Ok(allowed)
    }
}
