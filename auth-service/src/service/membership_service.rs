//! # Membership & Invitation Service (C9)
//!
//! Organization lifecycle, invitation issuance/acceptance/cancellation, and
//! role/permission CRUD — all gated by the caller's [`RbacContext`] and the
//! cross-organization isolation invariant (I2).

use chrono::{Duration, Utc};
use serde::Serialize;
use shared::auth::rbac::RbacContext;
use shared::config::SecurityConfig;
use shared::crypto::hmac::hmac_tag;
use shared::crypto::token::generate_default_token;
use shared::errors::ApiError;
use shared::validation::validators::valid_slug;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::domain::events::{
    DomainEvent, InvitationAccepted, InvitationCancelled, InvitationSent, OrganizationCreated,
};
use crate::domain::{
    Invitation, InvitationStatus, Membership, MembershipStatus, NewAuditRecord, NewInvitation,
    NewMembership, NewOrganization, NewPermission, NewRole, Organization, Permission, Role,
};
use crate::repository::{
    AuditRepository, InvitationRepository, MembershipRepository, OrganizationRepository,
    PermissionRepository, RoleRepository,
};
use crate::service::auth_service::AuthService;

/// Invitations are valid for 7 days (§4.9).
const INVITATION_TTL: Duration = Duration::days(7);

const OWNER_ROLE_NAME: &str = "owner";

/// An invitation together with the one-time plaintext token the invitee
/// must present to accept. Only the [`Invitation`]'s `token_tag` (the HMAC
/// of this token) is ever persisted — delivering `token` to the invitee is
/// the caller's responsibility (email, out of scope here).
#[derive(Debug, Clone)]
pub struct IssuedInvitation {
    pub invitation: Invitation,
    pub token: String,
}

pub struct MembershipService {
    organization_repository: Arc<dyn OrganizationRepository>,
    membership_repository: Arc<dyn MembershipRepository>,
    invitation_repository: Arc<dyn InvitationRepository>,
    role_repository: Arc<dyn RoleRepository>,
    permission_repository: Arc<dyn PermissionRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    security: SecurityConfig,
}

impl MembershipService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        organization_repository: Arc<dyn OrganizationRepository>,
        membership_repository: Arc<dyn MembershipRepository>,
        invitation_repository: Arc<dyn InvitationRepository>,
        role_repository: Arc<dyn RoleRepository>,
        permission_repository: Arc<dyn PermissionRepository>,
        audit_repository: Arc<dyn AuditRepository>,
        security: SecurityConfig,
    ) -> Self {
        Self {
            organization_repository,
            membership_repository,
            invitation_repository,
            role_repository,
            permission_repository,
            audit_repository,
            security,
        }
    }

    fn tag(&self, plaintext: &str) -> String {
        hmac_tag(self.security.server_secret.as_bytes(), plaintext)
    }

    /// Persists a domain event to the audit log (§3 "Audit trail"). Mirrors
    /// `AuthService::audit` — failures are logged, never propagated.
    async fn audit<E: DomainEvent + Serialize>(&self, event: &E, actor_user_id: Option<Uuid>, resource: String, outcome: &str) {
        let record = NewAuditRecord {
            actor_user_id,
            action: event.event_type().to_string(),
            resource,
            outcome: outcome.to_string(),
            request_id: None,
            details: serde_json::to_value(event).ok(),
        };
        if let Err(err) = self.audit_repository.record(record).await {
            warn!(error = %err, action = event.event_type(), "failed to persist audit record");
        }
    }

    /// Creates an organization, validates the slug, and grants the creator
    /// the seeded `owner` system role (§4.9 "Create organization").
    pub async fn create_organization(
        &self,
        creator_user_id: Uuid,
        slug: &str,
        name: &str,
    ) -> Result<Organization, ApiError> {
        valid_slug(slug).map_err(|_| ApiError::BadRequest {
            message: "slug must be lowercase, hyphen-separated, and contain no leading, \
                      trailing, or consecutive hyphens"
                .to_string(),
        })?;

        if self.organization_repository.slug_exists(slug).await? {
            return Err(ApiError::Conflict { resource: format!("organization slug {slug}") });
        }

        let organization = self
            .organization_repository
            .create(NewOrganization {
                slug: slug.to_string(),
                name: name.to_string(),
                created_by: creator_user_id,
            })
            .await?;

        let owner_role = self
            .role_repository
            .find_system_role_by_name(OWNER_ROLE_NAME)
            .await?
            .ok_or_else(|| ApiError::InternalError {
                message: "owner system role is not seeded".to_string(),
            })?;

        self.membership_repository
            .create(NewMembership {
                organization_id: organization.organization_id,
                user_id: creator_user_id,
                role_id: owner_role.role_id,
                status: MembershipStatus::Active,
            })
            .await?;

        let event = OrganizationCreated {
            organization_id: organization.organization_id,
            slug: organization.slug.clone(),
            created_by: creator_user_id,
            occurred_at: Utc::now(),
        };
        self.audit(&event, Some(creator_user_id), format!("organization:{}", organization.organization_id), "success")
            .await;

        Ok(organization)
    }

    /// Validates that `role_id` is a role visible to `organization_id`: a
    /// system role, or a role owned by this organization (§4.9 "Invite";
    /// reused by role assignment since the visibility rule is identical).
    async fn assert_role_visible(&self, organization_id: Uuid, role_id: Uuid) -> Result<Role, ApiError> {
        let role = self
            .role_repository
            .find_by_id(role_id)
            .await?
            .ok_or_else(|| ApiError::NotFound { resource: format!("role:{role_id}") })?;

        match role.organization_id {
            None => Ok(role),
            Some(owner) if owner == organization_id => Ok(role),
            Some(_) => Err(ApiError::CrossOrgPermissionAssignment),
        }
    }

    /// Issues an invitation. The actor must hold `member:invite` (§4.9).
    pub async fn invite(
        &self,
        ctx: &RbacContext<'_>,
        organization_id: Uuid,
        inviter_user_id: Uuid,
        invited_email: &str,
        role_id: Uuid,
    ) -> Result<IssuedInvitation, ApiError> {
        AuthService::authorize(ctx, "member:invite")?;
        self.assert_role_visible(organization_id, role_id).await?;

        let invited_email = invited_email.trim().to_lowercase();
        let token = generate_default_token();
        let token_tag = self.tag(&token);

        let invitation = self
            .invitation_repository
            .create(NewInvitation {
                organization_id,
                token_tag,
                invited_email: invited_email.clone(),
                role_id,
                invited_by: inviter_user_id,
                expires_at: Utc::now() + INVITATION_TTL,
            })
            .await?;

        let event = InvitationSent {
            invitation_id: invitation.invitation_id,
            organization_id,
            invited_email,
            invited_by: inviter_user_id,
            occurred_at: Utc::now(),
        };
        self.audit(&event, Some(inviter_user_id), format!("invitation:{}", invitation.invitation_id), "success").await;

        Ok(IssuedInvitation { invitation, token })
    }

    /// Re-issues an invitation's expiry, rotating the opaque token (§4.9
    /// "Allow resending"). The underlying invitation row and its role stay
    /// the same; only `expires_at` and the token (and its tag) change.
    pub async fn resend(
        &self,
        ctx: &RbacContext<'_>,
        invitation_id: Uuid,
    ) -> Result<IssuedInvitation, ApiError> {
        AuthService::authorize(ctx, "member:invite")?;

        let invitation = self
            .invitation_repository
            .find_by_id(invitation_id)
            .await?
            .ok_or_else(|| ApiError::NotFound { resource: format!("invitation:{invitation_id}") })?;

        if invitation.status != InvitationStatus::Pending {
            return Err(ApiError::Conflict { resource: "invitation is no longer pending".to_string() });
        }

        let token = generate_default_token();
        let token_tag = self.tag(&token);
        let reissued = self
            .invitation_repository
            .create(NewInvitation {
                organization_id: invitation.organization_id,
                token_tag,
                invited_email: invitation.invited_email.clone(),
                role_id: invitation.role_id,
                invited_by: invitation.invited_by,
                expires_at: Utc::now() + INVITATION_TTL,
            })
            .await?;
        self.invitation_repository
            .update_status(invitation.invitation_id, InvitationStatus::Cancelled)
            .await?;

        Ok(IssuedInvitation { invitation: reissued, token })
    }

    /// Accepts an invitation: looks it up by the HMAC tag of the presented
    /// token, rejects expired/cancelled/already-accepted invitations,
    /// creates (or reactivates) the membership, and marks the invitation
    /// accepted (§4.9 "Accept").
    pub async fn accept(&self, token: &str, accepting_user_id: Uuid) -> Result<Membership, ApiError> {
        let tag = self.tag(token);
        let invitation = self
            .invitation_repository
            .find_by_token_tag(&tag)
            .await?
            .ok_or(ApiError::InvalidToken)?;

        if invitation.status != InvitationStatus::Pending {
            return Err(ApiError::Conflict { resource: "invitation is no longer pending".to_string() });
        }
        if invitation.expires_at < Utc::now() {
            self.invitation_repository
                .update_status(invitation.invitation_id, InvitationStatus::Expired)
                .await?;
            return Err(ApiError::Conflict { resource: "invitation has expired".to_string() });
        }

        let existing = self
            .membership_repository
            .find(invitation.organization_id, accepting_user_id)
            .await?;

        let membership = match existing {
            Some(m) => {
                self.membership_repository
                    .update_role(m.membership_id, invitation.role_id)
                    .await?;
                self.membership_repository
                    .update_status(m.membership_id, MembershipStatus::Active)
                    .await?;
                m
            }
            None => {
                self.membership_repository
                    .create(NewMembership {
                        organization_id: invitation.organization_id,
                        user_id: accepting_user_id,
                        role_id: invitation.role_id,
                        status: MembershipStatus::Active,
                    })
                    .await?
            }
        };

        self.invitation_repository
            .update_status(invitation.invitation_id, InvitationStatus::Accepted)
            .await?;

        let event = InvitationAccepted {
            invitation_id: invitation.invitation_id,
            organization_id: invitation.organization_id,
            user_id: accepting_user_id,
            occurred_at: Utc::now(),
        };
        self.audit(&event, Some(accepting_user_id), format!("invitation:{}", invitation.invitation_id), "success").await;

        Ok(membership)
    }

    /// Cancels a pending invitation. The actor must hold `invitation:cancel`
    /// (§4.9 "Cancel").
    pub async fn cancel(&self, ctx: &RbacContext<'_>, cancelling_user_id: Uuid, invitation_id: Uuid) -> Result<(), ApiError> {
        AuthService::authorize(ctx, "invitation:cancel")?;

        let invitation = self
            .invitation_repository
            .find_by_id(invitation_id)
            .await?
            .ok_or_else(|| ApiError::NotFound { resource: format!("invitation:{invitation_id}") })?;

        if invitation.status != InvitationStatus::Pending {
            return Err(ApiError::Conflict { resource: "invitation is no longer pending".to_string() });
        }

        self.invitation_repository
            .update_status(invitation.invitation_id, InvitationStatus::Cancelled)
            .await?;

        let event = InvitationCancelled {
            invitation_id: invitation.invitation_id,
            organization_id: invitation.organization_id,
            cancelled_by: cancelling_user_id,
            occurred_at: Utc::now(),
        };
        self.audit(&event, Some(cancelling_user_id), format!("invitation:{invitation_id}"), "success").await;

        Ok(())
    }

    /// Creates a custom role owned by `organization_id`. The actor must
    /// hold `role:create`; system roles can't be created through this path
    /// (§4.9 "Role/permission CRUD").
    pub async fn create_role(
        &self,
        ctx: &RbacContext<'_>,
        organization_id: Uuid,
        name: &str,
    ) -> Result<Role, ApiError> {
        AuthService::authorize(ctx, "role:create")?;
        self.role_repository
            .create(NewRole { name: name.to_string(), organization_id: Some(organization_id) })
            .await
    }

    /// Creates a custom permission owned by `organization_id`. The actor
    /// must hold `permissions:create`.
    pub async fn create_permission(
        &self,
        ctx: &RbacContext<'_>,
        organization_id: Uuid,
        name: &str,
        description: Option<String>,
    ) -> Result<Permission, ApiError> {
        AuthService::authorize(ctx, "permissions:create")?;
        self.permission_repository
            .create(NewPermission { name: name.to_string(), organization_id: Some(organization_id), description })
            .await
    }

    /// Links a permission to a role, enforcing the cross-organization
    /// isolation invariant (I2): a custom role may only link permissions
    /// that are system permissions or owned by the same organization.
    /// Rejects attempts to modify system roles (§4.9 "Role/permission CRUD").
    pub async fn link_permission(
        &self,
        ctx: &RbacContext<'_>,
        organization_id: Uuid,
        role_id: Uuid,
        permission_id: Uuid,
    ) -> Result<(), ApiError> {
        AuthService::authorize(ctx, "role:create")?;

        let role = self
            .role_repository
            .find_by_id(role_id)
            .await?
            .ok_or_else(|| ApiError::NotFound { resource: format!("role:{role_id}") })?;
        if role.is_system || role.organization_id != Some(organization_id) {
            return Err(ApiError::CrossOrgPermissionAssignment);
        }

        let permission = self
            .permission_repository
            .find_by_id(permission_id)
            .await?
            .ok_or_else(|| ApiError::NotFound { resource: format!("permission:{permission_id}") })?;
        if !permission.is_system && permission.organization_id != Some(organization_id) {
            return Err(ApiError::CrossOrgPermissionAssignment);
        }

        self.role_repository.link_permission(role_id, permission_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fake::{
        FakeAuditRepository, FakeInvitationRepository, FakeMembershipRepository,
        FakeOrganizationRepository, FakeRbacRepository,
    };

    fn test_security() -> SecurityConfig {
        SecurityConfig {
            server_secret: "test-secret-at-least-32-bytes-long!".to_string(),
            session_ttl_seconds: 2_592_000,
            refresh_token_ttl_seconds: 604_800,
            max_inactive_seconds: 1_209_600,
            lockout_max_attempts: 5,
            lockout_window_seconds: 900,
        }
    }

    fn build_service() -> (MembershipService, Arc<FakeRbacRepository>) {
        let organization_repository = Arc::new(FakeOrganizationRepository::default());
        let membership_repository = Arc::new(FakeMembershipRepository::default());
        let invitation_repository = Arc::new(FakeInvitationRepository::default());
        let rbac_repository = Arc::new(FakeRbacRepository::default());
        let audit_repository = Arc::new(FakeAuditRepository::default());

        let service = MembershipService::new(
            organization_repository,
            membership_repository,
            invitation_repository,
            rbac_repository.clone(),
            rbac_repository.clone(),
            audit_repository,
            test_security(),
        );
        (service, rbac_repository)
    }

    #[tokio::test]
    async fn test_create_organization_rejects_invalid_slug() {
        let (service, rbac_repo) = build_service();
        rbac_repo
            .create(NewRole { name: OWNER_ROLE_NAME.to_string(), organization_id: None })
            .await
            .unwrap();

        let result = service.create_organization(Uuid::new_v4(), "Invalid_Slug", "Acme").await;
        assert!(matches!(result, Err(ApiError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn test_create_organization_grants_owner_role() {
        let (service, rbac_repo) = build_service();
        rbac_repo
            .create(NewRole { name: OWNER_ROLE_NAME.to_string(), organization_id: None })
            .await
            .unwrap();

        let creator = Uuid::new_v4();
        let organization = service.create_organization(creator, "acme-corp", "Acme Corp").await.unwrap();
        assert_eq!(organization.slug, "acme-corp");
    }

    #[tokio::test]
    async fn test_invite_requires_permission() {
        let (service, rbac_repo) = build_service();
        let role = rbac_repo
            .create(NewRole { name: "member".to_string(), organization_id: None })
            .await
            .unwrap();

        let ctx = RbacContext { is_superadmin: false, roles: &[], permissions: &[] };
        let result = service
            .invite(&ctx, Uuid::new_v4(), Uuid::new_v4(), "invitee@example.com", role.role_id)
            .await;
        assert!(matches!(result, Err(ApiError::AccessDenied)));
    }

    #[tokio::test]
    async fn test_invite_and_accept_creates_membership() {
        let (service, rbac_repo) = build_service();
        let role = rbac_repo
            .create(NewRole { name: "member".to_string(), organization_id: None })
            .await
            .unwrap();

        let permissions = vec!["member:invite".to_string()];
        let ctx = RbacContext { is_superadmin: false, roles: &[], permissions: &permissions };
        let organization_id = Uuid::new_v4();
        let invited = service
            .invite(&ctx, organization_id, Uuid::new_v4(), "invitee@example.com", role.role_id)
            .await
            .unwrap();

        let accepting_user_id = Uuid::new_v4();
        let membership = service.accept(&invited.token, accepting_user_id).await.unwrap();
        assert_eq!(membership.organization_id, organization_id);
        assert_eq!(membership.status, MembershipStatus::Active);

        let result = service.accept(&invited.token, accepting_user_id).await;
        assert!(matches!(result, Err(ApiError::Conflict { .. })));
    }
}
