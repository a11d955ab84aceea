//! # In-Memory Repository Fakes
//!
//! `Mutex<HashMap<..>>`-backed implementations of every repository port,
//! for service-level tests that exercise C5/C6/C7/C8/C9 logic without a
//! database. Mirrors [`shared::kv::fake::FakeKvStore`]'s approach: exposed
//! unconditionally (not `#[cfg(test)]`-gated) so downstream test modules can
//! build `Arc<dyn Trait>` fleets directly.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::errors::ApiError;
use uuid::Uuid;

use crate::domain::{
    ApiKey, AuditRecord, AuthorizationCode, FailedLoginAttempt, Invitation, InvitationStatus,
    Membership, MembershipStatus, NewApiKey, NewAuditRecord, NewAuthorizationCode,
    NewFailedLoginAttempt, NewInvitation, NewMembership, NewOAuthClient, NewOrganization,
    NewPermission, NewRefreshToken, NewRole, NewSession, NewUser, OAuthClient, Organization,
    OrganizationStatus, Permission, RefreshToken, Role, RotationOutcome, Session, User,
    UserStatus,
};

use super::{
    ApiKeyRepository, AuditRepository, AuthorizationCodeRepository, FailedLoginRepository,
    InvitationRepository, MembershipRepository, OAuthClientRepository, OrganizationRepository,
    PermissionRepository, RefreshTokenRepository, RoleRepository, SessionRepository,
    UserRepository,
};

/// In-memory [`UserRepository`].
#[derive(Debug, Default)]
pub struct FakeUserRepository {
    users: Mutex<HashMap<Uuid, User>>,
}

#[async_trait]
impl UserRepository for FakeUserRepository {
    async fn create(&self, new_user: NewUser) -> Result<User, ApiError> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == new_user.email) {
            return Err(ApiError::Conflict { resource: "email".to_string() });
        }
        let now = Utc::now();
        let user = User {
            user_id: Uuid::new_v4(),
            email: new_user.email,
            password_verifier: new_user.password_verifier,
            status: UserStatus::Active,
            is_superadmin: false,
            display_name: new_user.display_name,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.user_id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        Ok(self.users.lock().unwrap().values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, ApiError> {
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }

    async fn update_password(
        &self,
        user_id: Uuid,
        new_password_verifier: &str,
    ) -> Result<(), ApiError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(ApiError::NotFound { resource: "user".to_string() })?;
        user.password_verifier = new_password_verifier.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_status(&self, user_id: Uuid, status: UserStatus) -> Result<(), ApiError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(ApiError::NotFound { resource: "user".to_string() })?;
        user.status = status;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, ApiError> {
        Ok(self.users.lock().unwrap().values().any(|u| u.email == email))
    }
}

/// In-memory [`OrganizationRepository`].
#[derive(Debug, Default)]
pub struct FakeOrganizationRepository {
    orgs: Mutex<HashMap<Uuid, Organization>>,
}

#[async_trait]
impl OrganizationRepository for FakeOrganizationRepository {
    async fn create(&self, new_org: NewOrganization) -> Result<Organization, ApiError> {
        let mut orgs = self.orgs.lock().unwrap();
        if orgs.values().any(|o| o.slug == new_org.slug) {
            return Err(ApiError::Conflict { resource: "slug".to_string() });
        }
        let now = Utc::now();
        let org = Organization {
            organization_id: Uuid::new_v4(),
            slug: new_org.slug,
            name: new_org.name,
            status: OrganizationStatus::Active,
            created_by: new_org.created_by,
            created_at: now,
            updated_at: now,
        };
        orgs.insert(org.organization_id, org.clone());
        Ok(org)
    }

    async fn find_by_id(&self, organization_id: Uuid) -> Result<Option<Organization>, ApiError> {
        Ok(self.orgs.lock().unwrap().get(&organization_id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Organization>, ApiError> {
        Ok(self.orgs.lock().unwrap().values().find(|o| o.slug == slug).cloned())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, ApiError> {
        Ok(self.orgs.lock().unwrap().values().any(|o| o.slug == slug))
    }

    async fn update_status(
        &self,
        organization_id: Uuid,
        status: OrganizationStatus,
    ) -> Result<(), ApiError> {
        let mut orgs = self.orgs.lock().unwrap();
        let org = orgs
            .get_mut(&organization_id)
            .ok_or(ApiError::NotFound { resource: "organization".to_string() })?;
        org.status = status;
        org.updated_at = Utc::now();
        Ok(())
    }
}

/// In-memory [`MembershipRepository`].
#[derive(Debug, Default)]
pub struct FakeMembershipRepository {
    memberships: Mutex<HashMap<Uuid, Membership>>,
}

#[async_trait]
impl MembershipRepository for FakeMembershipRepository {
    async fn create(&self, new_membership: NewMembership) -> Result<Membership, ApiError> {
        let mut memberships = self.memberships.lock().unwrap();
        if memberships.values().any(|m| {
            m.organization_id == new_membership.organization_id
                && m.user_id == new_membership.user_id
        }) {
            return Err(ApiError::Conflict { resource: "membership".to_string() });
        }
        let membership = Membership {
            membership_id: Uuid::new_v4(),
            organization_id: new_membership.organization_id,
            user_id: new_membership.user_id,
            role_id: new_membership.role_id,
            status: new_membership.status,
            created_at: Utc::now(),
            last_active_at: None,
        };
        memberships.insert(membership.membership_id, membership.clone());
        Ok(membership)
    }

    async fn find(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, ApiError> {
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .values()
            .find(|m| m.organization_id == organization_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Membership>, ApiError> {
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Membership>, ApiError> {
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn update_role(&self, membership_id: Uuid, role_id: Uuid) -> Result<(), ApiError> {
        let mut memberships = self.memberships.lock().unwrap();
        let membership = memberships
            .get_mut(&membership_id)
            .ok_or(ApiError::NotFound { resource: "membership".to_string() })?;
        membership.role_id = role_id;
        Ok(())
    }

    async fn update_status(
        &self,
        membership_id: Uuid,
        status: MembershipStatus,
    ) -> Result<(), ApiError> {
        let mut memberships = self.memberships.lock().unwrap();
        let membership = memberships
            .get_mut(&membership_id)
            .ok_or(ApiError::NotFound { resource: "membership".to_string() })?;
        membership.status = status;
        Ok(())
    }

    async fn touch_last_active(&self, membership_id: Uuid) -> Result<(), ApiError> {
        let mut memberships = self.memberships.lock().unwrap();
        if let Some(membership) = memberships.get_mut(&membership_id) {
            membership.last_active_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// In-memory [`InvitationRepository`].
#[derive(Debug, Default)]
pub struct FakeInvitationRepository {
    invitations: Mutex<HashMap<Uuid, Invitation>>,
}

#[async_trait]
impl InvitationRepository for FakeInvitationRepository {
    async fn create(&self, new_invitation: NewInvitation) -> Result<Invitation, ApiError> {
        let mut invitations = self.invitations.lock().unwrap();
        let invitation = Invitation {
            invitation_id: Uuid::new_v4(),
            organization_id: new_invitation.organization_id,
            token_tag: new_invitation.token_tag,
            invited_email: new_invitation.invited_email,
            role_id: new_invitation.role_id,
            invited_by: new_invitation.invited_by,
            status: InvitationStatus::Pending,
            expires_at: new_invitation.expires_at,
            created_at: Utc::now(),
        };
        invitations.insert(invitation.invitation_id, invitation.clone());
        Ok(invitation)
    }

    async fn find_by_token_tag(&self, token_tag: &str) -> Result<Option<Invitation>, ApiError> {
        Ok(self
            .invitations
            .lock()
            .unwrap()
            .values()
            .find(|i| {
                i.token_tag == token_tag
                    && i.status == InvitationStatus::Pending
                    && i.expires_at > Utc::now()
            })
            .cloned())
    }

    async fn find_by_id(&self, invitation_id: Uuid) -> Result<Option<Invitation>, ApiError> {
        Ok(self.invitations.lock().unwrap().get(&invitation_id).cloned())
    }

    async fn list_pending_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Invitation>, ApiError> {
        Ok(self
            .invitations
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.organization_id == organization_id && i.status == InvitationStatus::Pending)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        invitation_id: Uuid,
        status: InvitationStatus,
    ) -> Result<(), ApiError> {
        let mut invitations = self.invitations.lock().unwrap();
        let invitation = invitations
            .get_mut(&invitation_id)
            .ok_or(ApiError::NotFound { resource: "invitation".to_string() })?;
        invitation.status = status;
        Ok(())
    }
}

/// In-memory [`RoleRepository`] + [`PermissionRepository`], sharing one
/// store since role-permission edges reference both.
#[derive(Debug, Default)]
pub struct FakeRbacRepository {
    roles: Mutex<HashMap<Uuid, Role>>,
    permissions: Mutex<HashMap<Uuid, Permission>>,
    edges: Mutex<Vec<(Uuid, Uuid)>>,
}

#[async_trait]
impl RoleRepository for FakeRbacRepository {
    async fn create(&self, new_role: NewRole) -> Result<Role, ApiError> {
        let now = Utc::now();
        let role = Role {
            role_id: Uuid::new_v4(),
            name: new_role.name,
            organization_id: new_role.organization_id,
            is_system: new_role.organization_id.is_none(),
            created_at: now,
            updated_at: now,
        };
        self.roles.lock().unwrap().insert(role.role_id, role.clone());
        Ok(role)
    }

    async fn find_by_id(&self, role_id: Uuid) -> Result<Option<Role>, ApiError> {
        Ok(self.roles.lock().unwrap().get(&role_id).cloned())
    }

    async fn find_system_role_by_name(&self, name: &str) -> Result<Option<Role>, ApiError> {
        Ok(self
            .roles
            .lock()
            .unwrap()
            .values()
            .find(|r| r.name == name && r.organization_id.is_none())
            .cloned())
    }

    async fn list_for_organization(&self, organization_id: Uuid) -> Result<Vec<Role>, ApiError> {
        Ok(self
            .roles
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.organization_id == Some(organization_id) || r.organization_id.is_none())
            .cloned()
            .collect())
    }

    async fn link_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<(), ApiError> {
        let mut edges = self.edges.lock().unwrap();
        if !edges.contains(&(role_id, permission_id)) {
            edges.push((role_id, permission_id));
        }
        Ok(())
    }

    async fn unlink_permission(&self, role_id: Uuid, permission_id: Uuid) -> Result<(), ApiError> {
        self.edges.lock().unwrap().retain(|e| *e != (role_id, permission_id));
        Ok(())
    }

    async fn permissions_for_role(&self, role_id: Uuid) -> Result<Vec<Permission>, ApiError> {
        let edges = self.edges.lock().unwrap();
        let permissions = self.permissions.lock().unwrap();
        Ok(edges
            .iter()
            .filter(|(r, _)| *r == role_id)
            .filter_map(|(_, p)| permissions.get(p).cloned())
            .collect())
    }
}

#[async_trait]
impl PermissionRepository for FakeRbacRepository {
    async fn create(&self, new_permission: NewPermission) -> Result<Permission, ApiError> {
        let permission = Permission {
            permission_id: Uuid::new_v4(),
            name: new_permission.name,
            organization_id: new_permission.organization_id,
            is_system: new_permission.organization_id.is_none(),
            description: new_permission.description,
            created_at: Utc::now(),
        };
        self.permissions.lock().unwrap().insert(permission.permission_id, permission.clone());
        Ok(permission)
    }

    async fn find_by_id(&self, permission_id: Uuid) -> Result<Option<Permission>, ApiError> {
        Ok(self.permissions.lock().unwrap().get(&permission_id).cloned())
    }

    async fn find_by_name(
        &self,
        name: &str,
        organization_id: Option<Uuid>,
    ) -> Result<Option<Permission>, ApiError> {
        Ok(self
            .permissions
            .lock()
            .unwrap()
            .values()
            .find(|p| p.name == name && p.organization_id == organization_id)
            .cloned())
    }

    async fn list_system(&self) -> Result<Vec<Permission>, ApiError> {
        Ok(self
            .permissions
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.organization_id.is_none())
            .cloned()
            .collect())
    }

    async fn list_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Permission>, ApiError> {
        Ok(self
            .permissions
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.organization_id == Some(organization_id) || p.organization_id.is_none())
            .cloned()
            .collect())
    }
}

/// In-memory [`SessionRepository`].
#[derive(Debug, Default)]
pub struct FakeSessionRepository {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

#[async_trait]
impl SessionRepository for FakeSessionRepository {
    async fn create(&self, new_session: NewSession) -> Result<Session, ApiError> {
        let session = Session {
            session_id: Uuid::new_v4(),
            session_tag: new_session.session_tag,
            user_id: new_session.user_id,
            organization_id: new_session.organization_id,
            ip_address: new_session.ip_address,
            user_agent: new_session.user_agent,
            device_fingerprint: new_session.device_fingerprint,
            last_activity_at: Utc::now(),
            expires_at: new_session.expires_at,
            is_active: true,
            revoked_reason: None,
            created_at: Utc::now(),
        };
        self.sessions.lock().unwrap().insert(session.session_id, session.clone());
        Ok(session)
    }

    async fn find_by_tag(&self, session_tag: &str) -> Result<Option<Session>, ApiError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .find(|s| s.session_tag == session_tag && s.is_active && s.expires_at > Utc::now())
            .cloned())
    }

    async fn find_by_id(&self, session_id: Uuid) -> Result<Option<Session>, ApiError> {
        Ok(self.sessions.lock().unwrap().get(&session_id).cloned())
    }

    async fn touch_activity(&self, session_id: Uuid) -> Result<(), ApiError> {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&session_id) {
            session.last_activity_at = Utc::now();
        }
        Ok(())
    }

    async fn revoke(&self, session_id: Uuid, reason: &str) -> Result<(), ApiError> {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&session_id) {
            session.is_active = false;
            session.revoked_reason = Some(reason.to_string());
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, reason: &str) -> Result<u64, ApiError> {
        let mut sessions = self.sessions.lock().unwrap();
        let mut count = 0;
        for session in sessions.values_mut() {
            if session.user_id == user_id && session.is_active {
                session.is_active = false;
                session.revoked_reason = Some(reason.to_string());
                count += 1;
            }
        }
        Ok(count)
    }

    async fn evict_expired(&self) -> Result<u64, ApiError> {
        let mut sessions = self.sessions.lock().unwrap();
        let mut count = 0;
        let now = Utc::now();
        for session in sessions.values_mut() {
            if session.is_active && session.expires_at <= now {
                session.is_active = false;
                session.revoked_reason = Some("expired".to_string());
                count += 1;
            }
        }
        Ok(count)
    }

    async fn evict_inactive(&self, max_inactive_seconds: i64) -> Result<u64, ApiError> {
        let mut sessions = self.sessions.lock().unwrap();
        let mut count = 0;
        let cutoff = Utc::now() - chrono::Duration::seconds(max_inactive_seconds);
        for session in sessions.values_mut() {
            if session.is_active && session.last_activity_at <= cutoff {
                session.is_active = false;
                session.revoked_reason = Some("inactive".to_string());
                count += 1;
            }
        }
        Ok(count)
    }
}

/// In-memory [`RefreshTokenRepository`], including the transactional
/// `rotate` semantics (single-threaded since the store is behind one
/// `Mutex`, which is sufficient to exercise the reuse-detection logic in
/// tests).
#[derive(Debug, Default)]
pub struct FakeRefreshTokenRepository {
    tokens: Mutex<HashMap<Uuid, RefreshToken>>,
}

#[async_trait]
impl RefreshTokenRepository for FakeRefreshTokenRepository {
    async fn create(&self, new_token: NewRefreshToken) -> Result<RefreshToken, ApiError> {
        let token = RefreshToken {
            refresh_token_id: Uuid::new_v4(),
            token_tag: new_token.token_tag,
            user_id: new_token.user_id,
            organization_id: new_token.organization_id,
            session_id: new_token.session_id,
            family_id: new_token.family_id.unwrap_or_else(Uuid::new_v4),
            replaced_by: None,
            expires_at: new_token.expires_at,
            used_at: None,
            revoked: false,
            created_at: Utc::now(),
        };
        self.tokens.lock().unwrap().insert(token.refresh_token_id, token.clone());
        Ok(token)
    }

    async fn find_by_tag(&self, token_tag: &str) -> Result<Option<RefreshToken>, ApiError> {
        Ok(self.tokens.lock().unwrap().values().find(|t| t.token_tag == token_tag).cloned())
    }

    async fn rotate(
        &self,
        old_token_tag: &str,
        successor: NewRefreshToken,
    ) -> Result<RotationOutcome, ApiError> {
        let mut tokens = self.tokens.lock().unwrap();
        let old_id = tokens
            .values()
            .find(|t| t.token_tag == old_token_tag)
            .map(|t| t.refresh_token_id)
            .ok_or(ApiError::NotFound { resource: "refresh_token".to_string() })?;

        let (family_id, session_id, user_id, revoked, reused, expires_at) = {
            let old = tokens.get(&old_id).unwrap();
            (old.family_id, old.session_id, old.user_id, old.revoked, old.used_at.is_some(), old.expires_at)
        };

        if revoked {
            return Ok(RotationOutcome::Revoked { session_id, user_id });
        }

        if reused {
            for token in tokens.values_mut() {
                if token.family_id == family_id {
                    token.revoked = true;
                }
            }
            return Ok(RotationOutcome::ReuseDetected { family_id, session_id, user_id });
        }

        if expires_at <= Utc::now() {
            return Err(ApiError::TokenExpired);
        }

        let new_token = RefreshToken {
            refresh_token_id: Uuid::new_v4(),
            token_tag: successor.token_tag,
            user_id: successor.user_id,
            organization_id: successor.organization_id,
            session_id: successor.session_id,
            family_id,
            replaced_by: None,
            expires_at: successor.expires_at,
            used_at: None,
            revoked: false,
            created_at: Utc::now(),
        };
        let new_id = new_token.refresh_token_id;
        tokens.insert(new_id, new_token.clone());

        let old = tokens.get_mut(&old_id).unwrap();
        old.used_at = Some(Utc::now());
        old.replaced_by = Some(new_id);

        Ok(RotationOutcome::Rotated(new_token))
    }

    async fn revoke_family(&self, family_id: Uuid) -> Result<(), ApiError> {
        for token in self.tokens.lock().unwrap().values_mut() {
            if token.family_id == family_id {
                token.revoked = true;
            }
        }
        Ok(())
    }

    async fn revoke_all_for_session(&self, session_id: Uuid) -> Result<(), ApiError> {
        for token in self.tokens.lock().unwrap().values_mut() {
            if token.session_id == session_id {
                token.revoked = true;
            }
        }
        Ok(())
    }

    async fn evict_expired(&self) -> Result<u64, ApiError> {
        let mut tokens = self.tokens.lock().unwrap();
        let now = Utc::now();
        let expired: Vec<Uuid> =
            tokens.values().filter(|t| t.expires_at <= now).map(|t| t.refresh_token_id).collect();
        let count = expired.len() as u64;
        for id in expired {
            tokens.remove(&id);
        }
        Ok(count)
    }
}

/// In-memory [`AuthorizationCodeRepository`] + [`OAuthClientRepository`].
#[derive(Debug, Default)]
pub struct FakeOAuthRepository {
    codes: Mutex<HashMap<Uuid, AuthorizationCode>>,
    clients: Mutex<HashMap<Uuid, OAuthClient>>,
}

#[async_trait]
impl AuthorizationCodeRepository for FakeOAuthRepository {
    async fn create(&self, new_code: NewAuthorizationCode) -> Result<AuthorizationCode, ApiError> {
        let code = AuthorizationCode {
            authorization_code_id: Uuid::new_v4(),
            code_tag: new_code.code_tag,
            client_id: new_code.client_id,
            user_id: new_code.user_id,
            redirect_uri: new_code.redirect_uri,
            code_challenge: new_code.code_challenge,
            code_challenge_method: new_code.code_challenge_method,
            scope: new_code.scope,
            used: false,
            expires_at: new_code.expires_at,
            created_at: Utc::now(),
        };
        self.codes.lock().unwrap().insert(code.authorization_code_id, code.clone());
        Ok(code)
    }

    async fn consume(&self, code_tag: &str) -> Result<Option<AuthorizationCode>, ApiError> {
        let mut codes = self.codes.lock().unwrap();
        let id = codes
            .values()
            .find(|c| c.code_tag == code_tag && !c.used && c.expires_at > Utc::now())
            .map(|c| c.authorization_code_id);
        let Some(id) = id else { return Ok(None) };
        let code = codes.get_mut(&id).unwrap();
        code.used = true;
        Ok(Some(code.clone()))
    }
}

#[async_trait]
impl OAuthClientRepository for FakeOAuthRepository {
    async fn create(&self, new_client: NewOAuthClient) -> Result<OAuthClient, ApiError> {
        let client = OAuthClient {
            client_id: Uuid::new_v4(),
            name: new_client.name,
            secret_hash: new_client.secret_hash,
            redirect_uris: new_client.redirect_uris,
            allowed_origins: new_client.allowed_origins,
            allowed_scopes: new_client.allowed_scopes,
            is_public: new_client.is_public,
            created_at: Utc::now(),
        };
        self.clients.lock().unwrap().insert(client.client_id, client.clone());
        Ok(client)
    }

    async fn find_by_id(&self, client_id: Uuid) -> Result<Option<OAuthClient>, ApiError> {
        Ok(self.clients.lock().unwrap().get(&client_id).cloned())
    }
}

/// In-memory [`ApiKeyRepository`].
#[derive(Debug, Default)]
pub struct FakeApiKeyRepository {
    keys: Mutex<HashMap<Uuid, ApiKey>>,
}

#[async_trait]
impl ApiKeyRepository for FakeApiKeyRepository {
    async fn create(&self, new_key: NewApiKey) -> Result<ApiKey, ApiError> {
        let key = ApiKey {
            api_key_id: Uuid::new_v4(),
            key_id: new_key.key_id,
            secret_hash: new_key.secret_hash,
            user_id: new_key.user_id,
            organization_id: new_key.organization_id,
            scopes: new_key.scopes,
            expires_at: new_key.expires_at,
            revoked: false,
            created_at: Utc::now(),
        };
        self.keys.lock().unwrap().insert(key.api_key_id, key.clone());
        Ok(key)
    }

    async fn find_by_key_id(&self, key_id: &str) -> Result<Option<ApiKey>, ApiError> {
        Ok(self
            .keys
            .lock()
            .unwrap()
            .values()
            .find(|k| k.key_id == key_id && !k.revoked)
            .cloned())
    }

    async fn revoke(&self, api_key_id: Uuid) -> Result<(), ApiError> {
        if let Some(key) = self.keys.lock().unwrap().get_mut(&api_key_id) {
            key.revoked = true;
        }
        Ok(())
    }
}

/// In-memory [`FailedLoginRepository`] + [`AuditRepository`].
#[derive(Debug, Default)]
pub struct FakeAuditRepository {
    failed_logins: Mutex<Vec<FailedLoginAttempt>>,
    records: Mutex<Vec<AuditRecord>>,
}

#[async_trait]
impl FailedLoginRepository for FakeAuditRepository {
    async fn record(&self, attempt: NewFailedLoginAttempt) -> Result<(), ApiError> {
        self.failed_logins.lock().unwrap().push(FailedLoginAttempt {
            failed_login_id: Uuid::new_v4(),
            email: attempt.email,
            ip_address: attempt.ip_address,
            user_agent: attempt.user_agent,
            occurred_at: Utc::now(),
        });
        Ok(())
    }

    async fn count_since(
        &self,
        email: &str,
        window_start: DateTime<Utc>,
    ) -> Result<i64, ApiError> {
        Ok(self
            .failed_logins
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.email == email && a.occurred_at >= window_start)
            .count() as i64)
    }
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn record(&self, record: NewAuditRecord) -> Result<AuditRecord, ApiError> {
        let record = AuditRecord {
            audit_record_id: Uuid::new_v4(),
            actor_user_id: record.actor_user_id,
            action: record.action,
            resource: record.resource,
            outcome: record.outcome,
            request_id: record.request_id,
            details: record.details,
            occurred_at: Utc::now(),
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refresh_token_rotation_single_use() {
        let repo = FakeRefreshTokenRepository::default();
        let session_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let original = repo
            .create(NewRefreshToken {
                token_tag: "tag-1".to_string(),
                user_id,
                organization_id: None,
                session_id,
                family_id: None,
                expires_at: Utc::now() + chrono::Duration::days(30),
            })
            .await
            .unwrap();

        let outcome = repo
            .rotate(
                "tag-1",
                NewRefreshToken {
                    token_tag: "tag-2".to_string(),
                    user_id,
                    organization_id: None,
                    session_id,
                    family_id: Some(original.family_id),
                    expires_at: Utc::now() + chrono::Duration::days(30),
                },
            )
            .await
            .unwrap();

        assert!(matches!(outcome, RotationOutcome::Rotated(ref t) if t.token_tag == "tag-2"));
    }

    #[tokio::test]
    async fn test_refresh_token_reuse_detected_and_family_revoked() {
        let repo = FakeRefreshTokenRepository::default();
        let session_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let original = repo
            .create(NewRefreshToken {
                token_tag: "tag-1".to_string(),
                user_id,
                organization_id: None,
                session_id,
                family_id: None,
                expires_at: Utc::now() + chrono::Duration::days(30),
            })
            .await
            .unwrap();

        repo.rotate(
            "tag-1",
            NewRefreshToken {
                token_tag: "tag-2".to_string(),
                user_id,
                organization_id: None,
                session_id,
                family_id: Some(original.family_id),
                expires_at: Utc::now() + chrono::Duration::days(30),
            },
        )
        .await
        .unwrap();

        // Reusing the already-consumed "tag-1" must be flagged.
        let outcome = repo
            .rotate(
                "tag-1",
                NewRefreshToken {
                    token_tag: "tag-3".to_string(),
                    user_id,
                    organization_id: None,
                    session_id,
                    family_id: Some(original.family_id),
                    expires_at: Utc::now() + chrono::Duration::days(30),
                },
            )
            .await
            .unwrap();

        assert!(matches!(outcome, RotationOutcome::ReuseDetected { .. }));

        // The whole family, including the still-unused successor, is revoked.
        let successor = repo.find_by_tag("tag-2").await.unwrap().unwrap();
        assert!(successor.revoked);
    }

    #[tokio::test]
    async fn test_refresh_token_rotate_revoked_row_is_not_reuse() {
        let repo = FakeRefreshTokenRepository::default();
        let session_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let original = repo
            .create(NewRefreshToken {
                token_tag: "tag-1".to_string(),
                user_id,
                organization_id: None,
                session_id,
                family_id: None,
                expires_at: Utc::now() + chrono::Duration::days(30),
            })
            .await
            .unwrap();

        // Revoked by logout, never consumed.
        repo.revoke_family(original.family_id).await.unwrap();

        let outcome = repo
            .rotate(
                "tag-1",
                NewRefreshToken {
                    token_tag: "tag-2".to_string(),
                    user_id,
                    organization_id: None,
                    session_id,
                    family_id: Some(original.family_id),
                    expires_at: Utc::now() + chrono::Duration::days(30),
                },
            )
            .await
            .unwrap();

        assert!(matches!(outcome, RotationOutcome::Revoked { .. }));
        assert!(repo.find_by_tag("tag-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_repository_duplicate_email_conflict() {
        let repo = FakeUserRepository::default();
        repo.create(NewUser {
            email: "dup@example.com".to_string(),
            password_verifier: "hash".to_string(),
            display_name: None,
        })
        .await
        .unwrap();

        let result = repo
            .create(NewUser {
                email: "dup@example.com".to_string(),
                password_verifier: "hash2".to_string(),
                display_name: None,
            })
            .await;

        assert!(matches!(result, Err(ApiError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_authorization_code_single_use() {
        let repo = FakeOAuthRepository::default();
        let code = repo
            .create(NewAuthorizationCode {
                code_tag: "code-tag".to_string(),
                client_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                redirect_uri: "https://example.com/cb".to_string(),
                code_challenge: None,
                code_challenge_method: None,
                scope: "profile".to_string(),
                expires_at: Utc::now() + chrono::Duration::minutes(5),
            })
            .await
            .unwrap();

        let first = repo.consume(&code.code_tag).await.unwrap();
        assert!(first.is_some());

        let second = repo.consume(&code.code_tag).await.unwrap();
        assert!(second.is_none());
    }
}
