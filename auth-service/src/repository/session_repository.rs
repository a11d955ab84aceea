//! # Session Repository
//!
//! Data access port for [`Session`] persistence (§4.5). Lookups are by
//! `session_tag`, the HMAC tag of the opaque session id (I5).

use async_trait::async_trait;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{NewSession, Session};

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, new_session: NewSession) -> Result<Session, ApiError>;
    async fn find_by_tag(&self, session_tag: &str) -> Result<Option<Session>, ApiError>;
    async fn find_by_id(&self, session_id: Uuid) -> Result<Option<Session>, ApiError>;
    async fn touch_activity(&self, session_id: Uuid) -> Result<(), ApiError>;
    async fn revoke(&self, session_id: Uuid, reason: &str) -> Result<(), ApiError>;
    async fn revoke_all_for_user(&self, user_id: Uuid, reason: &str) -> Result<u64, ApiError>;

    /// Marks every session past `expires_at` inactive (§4.5 "Cleanup").
    /// Returns the number of sessions evicted.
    async fn evict_expired(&self) -> Result<u64, ApiError>;

    /// Marks every still-active session whose `last_activity_at` is older
    /// than `max_inactive_seconds` inactive (§4.5 "Cleanup"). Distinct from
    /// `evict_expired`: this catches sessions abandoned well before their
    /// TTL elapses.
    async fn evict_inactive(&self, max_inactive_seconds: i64) -> Result<u64, ApiError>;
}

#[derive(Debug, Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create(&self, new_session: NewSession) -> Result<Session, ApiError> {
        sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (
                session_tag, user_id, organization_id, ip_address, user_agent,
                device_fingerprint, last_activity_at, expires_at, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), $7, true)
            RETURNING *
            "#,
        )
        .bind(&new_session.session_tag)
        .bind(new_session.user_id)
        .bind(new_session.organization_id)
        .bind(&new_session.ip_address)
        .bind(&new_session.user_agent)
        .bind(&new_session.device_fingerprint)
        .bind(new_session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn find_by_tag(&self, session_tag: &str) -> Result<Option<Session>, ApiError> {
        sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions
            WHERE session_tag = $1 AND is_active = true AND expires_at > NOW()
            "#,
        )
        .bind(session_tag)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn find_by_id(&self, session_id: Uuid) -> Result<Option<Session>, ApiError> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn touch_activity(&self, session_id: Uuid) -> Result<(), ApiError> {
        sqlx::query("UPDATE sessions SET last_activity_at = NOW() WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(())
    }

    async fn revoke(&self, session_id: Uuid, reason: &str) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET is_active = false, revoked_reason = $1
            WHERE session_id = $2 AND is_active = true
            "#,
        )
        .bind(reason)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, reason: &str) -> Result<u64, ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_active = false, revoked_reason = $1
            WHERE user_id = $2 AND is_active = true
            "#,
        )
        .bind(reason)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(result.rows_affected())
    }

    async fn evict_expired(&self) -> Result<u64, ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_active = false, revoked_reason = 'expired'
            WHERE is_active = true AND expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(result.rows_affected())
    }

    async fn evict_inactive(&self, max_inactive_seconds: i64) -> Result<u64, ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_active = false, revoked_reason = 'inactive'
            WHERE is_active = true
              AND last_activity_at <= NOW() - make_interval(secs => $1)
            "#,
        )
        .bind(max_inactive_seconds as f64)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(result.rows_affected())
    }
}
