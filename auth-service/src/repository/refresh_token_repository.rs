//! # Refresh Token Repository
//!
//! Data access port for [`RefreshToken`] persistence and rotation (§4.5).
//!
//! [`RefreshTokenRepository::rotate`] is the load-bearing method: it must
//! look up the presented token, check whether it was already consumed, mark
//! it used, and insert its successor — or, on reuse, revoke the whole
//! family — as one atomic unit. A `SELECT ... FOR UPDATE` inside a
//! transaction prevents two concurrent rotations of the same token from
//! both succeeding (I4).

use async_trait::async_trait;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{NewRefreshToken, RefreshToken, RotationOutcome};

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn create(&self, new_token: NewRefreshToken) -> Result<RefreshToken, ApiError>;
    async fn find_by_tag(&self, token_tag: &str) -> Result<Option<RefreshToken>, ApiError>;

    /// Atomically consumes `old_token_tag` and inserts its successor.
    ///
    /// Checked in spec order (§4.5 steps 2-4):
    ///
    /// - Missing row: `Err(ApiError::NotFound)`.
    /// - `revoked` (and never consumed): `Ok(RotationOutcome::Revoked { .. })`,
    ///   no family-wide side effect — this is the benign post-logout case.
    /// - `used_at.is_some()`: reuse. The whole family is revoked and
    ///   `Ok(RotationOutcome::ReuseDetected { .. })` is returned (§8 P2).
    /// - `expires_at` in the past: `Err(ApiError::TokenExpired)`.
    /// - Otherwise the row is marked used, the successor is inserted with
    ///   the same `family_id`, `replaced_by` is backfilled on the old row,
    ///   and `Ok(RotationOutcome::Rotated(successor))` is returned.
    async fn rotate(
        &self,
        old_token_tag: &str,
        successor: NewRefreshToken,
    ) -> Result<RotationOutcome, ApiError>;

    async fn revoke_family(&self, family_id: Uuid) -> Result<(), ApiError>;
    async fn revoke_all_for_session(&self, session_id: Uuid) -> Result<(), ApiError>;

    /// Deletes rows past `expires_at` (§4.5 "Cleanup"). Expired tokens carry
    /// no reuse-detection value once gone, so they're removed outright
    /// rather than flagged, unlike sessions. Returns the number evicted.
    async fn evict_expired(&self) -> Result<u64, ApiError>;
}

#[derive(Debug, Clone)]
pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn create(&self, new_token: NewRefreshToken) -> Result<RefreshToken, ApiError> {
        let family_id = new_token.family_id.unwrap_or_else(Uuid::new_v4);
        sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (
                token_tag, user_id, organization_id, session_id, family_id, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&new_token.token_tag)
        .bind(new_token.user_id)
        .bind(new_token.organization_id)
        .bind(new_token.session_id)
        .bind(family_id)
        .bind(new_token.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn find_by_tag(&self, token_tag: &str) -> Result<Option<RefreshToken>, ApiError> {
        sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE token_tag = $1")
            .bind(token_tag)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn rotate(
        &self,
        old_token_tag: &str,
        successor: NewRefreshToken,
    ) -> Result<RotationOutcome, ApiError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        let old = sqlx::query_as::<_, RefreshToken>(
            "SELECT * FROM refresh_tokens WHERE token_tag = $1 FOR UPDATE",
        )
        .bind(old_token_tag)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?
        .ok_or(ApiError::NotFound { resource: "refresh_token".to_string() })?;

        if old.revoked {
            tx.commit()
                .await
                .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

            return Ok(RotationOutcome::Revoked { session_id: old.session_id, user_id: old.user_id });
        }

        if old.used_at.is_some() {
            sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE family_id = $1")
                .bind(old.family_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

            tx.commit()
                .await
                .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

            return Ok(RotationOutcome::ReuseDetected {
                family_id: old.family_id,
                session_id: old.session_id,
                user_id: old.user_id,
            });
        }

        if old.expires_at <= chrono::Utc::now() {
            tx.rollback()
                .await
                .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

            return Err(ApiError::TokenExpired);
        }

        let new_row = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (
                token_tag, user_id, organization_id, session_id, family_id, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&successor.token_tag)
        .bind(successor.user_id)
        .bind(successor.organization_id)
        .bind(successor.session_id)
        .bind(old.family_id)
        .bind(successor.expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET used_at = NOW(), replaced_by = $1
            WHERE refresh_token_id = $2
            "#,
        )
        .bind(new_row.refresh_token_id)
        .bind(old.refresh_token_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        tx.commit()
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        Ok(RotationOutcome::Rotated(new_row))
    }

    async fn revoke_family(&self, family_id: Uuid) -> Result<(), ApiError> {
        sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE family_id = $1")
            .bind(family_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(())
    }

    async fn revoke_all_for_session(&self, session_id: Uuid) -> Result<(), ApiError> {
        sqlx::query("UPDATE refresh_tokens SET revoked = true WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(())
    }

    async fn evict_expired(&self) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(result.rows_affected())
    }
}
