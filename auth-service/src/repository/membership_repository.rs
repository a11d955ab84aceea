//! # Membership Repository
//!
//! Data access port for [`Membership`] persistence (§3, §4.7, §4.9).

use async_trait::async_trait;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Membership, MembershipStatus, NewMembership};

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn create(&self, new_membership: NewMembership) -> Result<Membership, ApiError>;
    async fn find(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, ApiError>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Membership>, ApiError>;
    async fn list_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Membership>, ApiError>;
    async fn update_role(&self, membership_id: Uuid, role_id: Uuid) -> Result<(), ApiError>;
    async fn update_status(
        &self,
        membership_id: Uuid,
        status: MembershipStatus,
    ) -> Result<(), ApiError>;
    async fn touch_last_active(&self, membership_id: Uuid) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    async fn create(&self, new_membership: NewMembership) -> Result<Membership, ApiError> {
        sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (organization_id, user_id, role_id, status)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(new_membership.organization_id)
        .bind(new_membership.user_id)
        .bind(new_membership.role_id)
        .bind(new_membership.status)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("memberships_organization_id_user_id_key") {
                    return ApiError::Conflict { resource: "membership".to_string() };
                }
            }
            ApiError::InternalError { message: format!("Database error: {}", e) }
        })
    }

    async fn find(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, ApiError> {
        sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships WHERE organization_id = $1 AND user_id = $2",
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Membership>, ApiError> {
        sqlx::query_as::<_, Membership>("SELECT * FROM memberships WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn list_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Membership>, ApiError> {
        sqlx::query_as::<_, Membership>("SELECT * FROM memberships WHERE organization_id = $1")
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn update_role(&self, membership_id: Uuid, role_id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE memberships SET role_id = $1 WHERE membership_id = $2")
            .bind(role_id)
            .bind(membership_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound { resource: "membership".to_string() });
        }
        Ok(())
    }

    async fn update_status(
        &self,
        membership_id: Uuid,
        status: MembershipStatus,
    ) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE memberships SET status = $1 WHERE membership_id = $2")
            .bind(status)
            .bind(membership_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound { resource: "membership".to_string() });
        }
        Ok(())
    }

    async fn touch_last_active(&self, membership_id: Uuid) -> Result<(), ApiError> {
        sqlx::query("UPDATE memberships SET last_active_at = NOW() WHERE membership_id = $1")
            .bind(membership_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;
        Ok(())
    }
}
