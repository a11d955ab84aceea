//! # User Repository
//!
//! Data access port for [`User`] persistence (§3, §4.6).
//!
//! ## Query Patterns
//!
//! | Pattern       | Example                                          |
//! |---------------|---------------------------------------------------|
//! | Normalization | email is trimmed + lowercased before every query   |
//! | Status filter | active lookups never return `Deactivated` users    |
//! | Returning     | `INSERT ... RETURNING *` to get generated fields   |
//! | Parameterized | always `$1`, `$2`, never string interpolation      |
//!
//! ## Error Handling
//!
//! | sqlx Error         | ApiError Variant | HTTP Status |
//! |---------------------|-------------------|-------------|
//! | Unique violation    | `Conflict`        | 409         |
//! | Other               | `InternalError`   | 500         |

use async_trait::async_trait;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{NewUser, User, UserStatus};

/// Port for user persistence. Implementations must normalize email lookups
/// to the same casing/trimming the service layer applies before calling in.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, new_user: NewUser) -> Result<User, ApiError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, ApiError>;
    async fn update_password(
        &self,
        user_id: Uuid,
        new_password_verifier: &str,
    ) -> Result<(), ApiError>;
    async fn update_status(&self, user_id: Uuid, status: UserStatus) -> Result<(), ApiError>;
    async fn email_exists(&self, email: &str) -> Result<bool, ApiError>;
}

/// PostgreSQL-backed [`UserRepository`].
#[derive(Debug, Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, new_user: NewUser) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_verifier, display_name)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.password_verifier)
        .bind(&new_user.display_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("users_email_key") {
                    return ApiError::Conflict { resource: "email".to_string() };
                }
            }
            ApiError::InternalError { message: format!("Database error: {}", e) }
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, ApiError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn update_password(
        &self,
        user_id: Uuid,
        new_password_verifier: &str,
    ) -> Result<(), ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_verifier = $1, updated_at = NOW()
            WHERE user_id = $2
            "#,
        )
        .bind(new_password_verifier)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound { resource: "user".to_string() });
        }
        Ok(())
    }

    async fn update_status(&self, user_id: Uuid, status: UserStatus) -> Result<(), ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET status = $1, updated_at = NOW()
            WHERE user_id = $2
            "#,
        )
        .bind(status)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound { resource: "user".to_string() });
        }
        Ok(())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, ApiError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        Ok(count.0 > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_struct() {
        let new_user = NewUser {
            email: "test@example.com".to_string(),
            password_verifier: "$argon2id$...".to_string(),
            display_name: Some("Test User".to_string()),
        };

        assert_eq!(new_user.email, "test@example.com");
        assert!(new_user.display_name.is_some());
    }
}
