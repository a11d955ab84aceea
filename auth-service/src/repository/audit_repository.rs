//! # Failed Login & Audit Repositories
//!
//! Data access ports for [`FailedLoginAttempt`] (§4.6 lockout window) and
//! [`AuditRecord`] (§3, append-only).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::errors::ApiError;
use sqlx::PgPool;

use crate::domain::{AuditRecord, FailedLoginAttempt, NewAuditRecord, NewFailedLoginAttempt};

#[async_trait]
pub trait FailedLoginRepository: Send + Sync {
    async fn record(&self, attempt: NewFailedLoginAttempt) -> Result<(), ApiError>;

    /// Count of failed attempts for `email` since `window_start`, used to
    /// evaluate the lockout threshold (§4.6 step 2).
    async fn count_since(
        &self,
        email: &str,
        window_start: DateTime<Utc>,
    ) -> Result<i64, ApiError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn record(&self, record: NewAuditRecord) -> Result<AuditRecord, ApiError>;
}

#[derive(Debug, Clone)]
pub struct PgFailedLoginRepository {
    pool: PgPool,
}

impl PgFailedLoginRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FailedLoginRepository for PgFailedLoginRepository {
    async fn record(&self, attempt: NewFailedLoginAttempt) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO failed_login_attempts (email, ip_address, user_agent)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&attempt.email)
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(())
    }

    async fn count_since(
        &self,
        email: &str,
        window_start: DateTime<Utc>,
    ) -> Result<i64, ApiError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM failed_login_attempts
            WHERE email = $1 AND occurred_at >= $2
            "#,
        )
        .bind(email)
        .bind(window_start)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(count.0)
    }
}

#[derive(Debug, Clone)]
pub struct PgAuditRepository {
    pool: PgPool,
}

impl PgAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn record(&self, record: NewAuditRecord) -> Result<AuditRecord, ApiError> {
        sqlx::query_as::<_, AuditRecord>(
            r#"
            INSERT INTO audit_records (
                actor_user_id, action, resource, outcome, request_id, details
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(record.actor_user_id)
        .bind(&record.action)
        .bind(&record.resource)
        .bind(&record.outcome)
        .bind(&record.request_id)
        .bind(&record.details)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }
}
