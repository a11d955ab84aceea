//! # API Key Repository
//!
//! Data access port for [`ApiKey`] persistence (§6). Looked up by the
//! public `key_id` prefix; the secret half is verified by the service layer
//! against `secret_hash` after the row is fetched.

use async_trait::async_trait;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{ApiKey, NewApiKey};

#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    async fn create(&self, new_key: NewApiKey) -> Result<ApiKey, ApiError>;
    async fn find_by_key_id(&self, key_id: &str) -> Result<Option<ApiKey>, ApiError>;
    async fn revoke(&self, api_key_id: Uuid) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct PgApiKeyRepository {
    pool: PgPool,
}

impl PgApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyRepository for PgApiKeyRepository {
    async fn create(&self, new_key: NewApiKey) -> Result<ApiKey, ApiError> {
        sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (
                key_id, secret_hash, user_id, organization_id, scopes, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&new_key.key_id)
        .bind(&new_key.secret_hash)
        .bind(new_key.user_id)
        .bind(new_key.organization_id)
        .bind(&new_key.scopes)
        .bind(new_key.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn find_by_key_id(&self, key_id: &str) -> Result<Option<ApiKey>, ApiError> {
        sqlx::query_as::<_, ApiKey>(
            "SELECT * FROM api_keys WHERE key_id = $1 AND revoked = false",
        )
        .bind(key_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn revoke(&self, api_key_id: Uuid) -> Result<(), ApiError> {
        sqlx::query("UPDATE api_keys SET revoked = true WHERE api_key_id = $1")
            .bind(api_key_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(())
    }
}
