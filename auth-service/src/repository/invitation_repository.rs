//! # Invitation Repository
//!
//! Data access port for [`Invitation`] persistence (§4.9). Lookups are by
//! `token_tag` (the HMAC tag of the opaque invitation token, I5) — the
//! plaintext token itself is never persisted.

use async_trait::async_trait;
use shared::errors::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Invitation, InvitationStatus, NewInvitation};

#[async_trait]
pub trait InvitationRepository: Send + Sync {
    async fn create(&self, new_invitation: NewInvitation) -> Result<Invitation, ApiError>;
    async fn find_by_token_tag(&self, token_tag: &str) -> Result<Option<Invitation>, ApiError>;
    async fn find_by_id(&self, invitation_id: Uuid) -> Result<Option<Invitation>, ApiError>;
    async fn list_pending_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Invitation>, ApiError>;
    async fn update_status(
        &self,
        invitation_id: Uuid,
        status: InvitationStatus,
    ) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct PgInvitationRepository {
    pool: PgPool,
}

impl PgInvitationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvitationRepository for PgInvitationRepository {
    async fn create(&self, new_invitation: NewInvitation) -> Result<Invitation, ApiError> {
        sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitations (
                organization_id, token_tag, invited_email, role_id, invited_by, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new_invitation.organization_id)
        .bind(&new_invitation.token_tag)
        .bind(&new_invitation.invited_email)
        .bind(new_invitation.role_id)
        .bind(new_invitation.invited_by)
        .bind(new_invitation.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn find_by_token_tag(&self, token_tag: &str) -> Result<Option<Invitation>, ApiError> {
        sqlx::query_as::<_, Invitation>(
            r#"
            SELECT * FROM invitations
            WHERE token_tag = $1 AND status = 'pending' AND expires_at > NOW()
            "#,
        )
        .bind(token_tag)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn find_by_id(&self, invitation_id: Uuid) -> Result<Option<Invitation>, ApiError> {
        sqlx::query_as::<_, Invitation>("SELECT * FROM invitations WHERE invitation_id = $1")
            .bind(invitation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn list_pending_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Invitation>, ApiError> {
        sqlx::query_as::<_, Invitation>(
            "SELECT * FROM invitations WHERE organization_id = $1 AND status = 'pending'",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })
    }

    async fn update_status(
        &self,
        invitation_id: Uuid,
        status: InvitationStatus,
    ) -> Result<(), ApiError> {
        let result = sqlx::query("UPDATE invitations SET status = $1 WHERE invitation_id = $2")
            .bind(status)
            .bind(invitation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::InternalError { message: format!("Database error: {}", e) })?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound { resource: "invitation".to_string() });
        }
        Ok(())
    }
}
