//! # OAuth2 Repository
//!
//! Data access ports for [`AuthorizationCode`] and [`OAuthClient`] (§4.8).

use async_trait::async_trait;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{AuthorizationCode, NewAuthorizationCode, NewOAuthClient, OAuthClient};

#[async_trait]
pub trait AuthorizationCodeRepository: Send + Sync {
    async fn create(&self, new_code: NewAuthorizationCode) -> Result<AuthorizationCode, ApiError>;

    /// Atomically consumes an authorization code: locks the row, verifies it
    /// is unused and unexpired, and marks it used in the same transaction so
    /// two concurrent `/token` calls with the same code can't both succeed
    /// (§4.8 step 3).
    async fn consume(&self, code_tag: &str) -> Result<Option<AuthorizationCode>, ApiError>;
}

#[async_trait]
pub trait OAuthClientRepository: Send + Sync {
    async fn create(&self, new_client: NewOAuthClient) -> Result<OAuthClient, ApiError>;
    async fn find_by_id(&self, client_id: Uuid) -> Result<Option<OAuthClient>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct PgAuthorizationCodeRepository {
    pool: PgPool,
}

impl PgAuthorizationCodeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthorizationCodeRepository for PgAuthorizationCodeRepository {
    async fn create(&self, new_code: NewAuthorizationCode) -> Result<AuthorizationCode, ApiError> {
        sqlx::query_as::<_, AuthorizationCode>(
            r#"
            INSERT INTO authorization_codes (
                code_tag, client_id, user_id, redirect_uri, code_challenge,
                code_challenge_method, scope, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&new_code.code_tag)
        .bind(new_code.client_id)
        .bind(new_code.user_id)
        .bind(&new_code.redirect_uri)
        .bind(&new_code.code_challenge)
        .bind(&new_code.code_challenge_method)
        .bind(&new_code.scope)
        .bind(new_code.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn consume(&self, code_tag: &str) -> Result<Option<AuthorizationCode>, ApiError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        let code = sqlx::query_as::<_, AuthorizationCode>(
            r#"
            SELECT * FROM authorization_codes
            WHERE code_tag = $1 AND used = false AND expires_at > NOW()
            FOR UPDATE
            "#,
        )
        .bind(code_tag)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        let Some(code) = code else {
            tx.commit()
                .await
                .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
            return Ok(None);
        };

        sqlx::query("UPDATE authorization_codes SET used = true WHERE authorization_code_id = $1")
            .bind(code.authorization_code_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        tx.commit()
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        Ok(Some(code))
    }
}

#[derive(Debug, Clone)]
pub struct PgOAuthClientRepository {
    pool: PgPool,
}

impl PgOAuthClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OAuthClientRepository for PgOAuthClientRepository {
    async fn create(&self, new_client: NewOAuthClient) -> Result<OAuthClient, ApiError> {
        sqlx::query_as::<_, OAuthClient>(
            r#"
            INSERT INTO oauth_clients (
                name, secret_hash, redirect_uris, allowed_origins, allowed_scopes, is_public
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&new_client.name)
        .bind(&new_client.secret_hash)
        .bind(&new_client.redirect_uris)
        .bind(&new_client.allowed_origins)
        .bind(&new_client.allowed_scopes)
        .bind(new_client.is_public)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn find_by_id(&self, client_id: Uuid) -> Result<Option<OAuthClient>, ApiError> {
        sqlx::query_as::<_, OAuthClient>("SELECT * FROM oauth_clients WHERE client_id = $1")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }
}
