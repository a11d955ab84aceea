//! # RBAC Service (C7)
//!
//! Resolves a principal's effective roles/permissions for a given
//! organization scope at token-issuance time (§4.7 steps 1-2), so that
//! request-time checks (`shared::auth::rbac::RbacContext`) never touch the
//! database — they read the cached `roles[]`/`permissions[]` claims instead.

use shared::errors::ApiError;
use std::sync::Arc;
use uuid::Uuid;

use crate::repository::{MembershipRepository, MembershipStatus, RoleRepository};

/// Effective roles/permissions for a principal in an (optional)
/// organization scope.
#[derive(Debug, Clone)]
pub struct EffectiveGrants {
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

pub struct RbacService {
    membership_repository: Arc<dyn MembershipRepository>,
    role_repository: Arc<dyn RoleRepository>,
}

impl RbacService {
    pub fn new(
        membership_repository: Arc<dyn MembershipRepository>,
        role_repository: Arc<dyn RoleRepository>,
    ) -> Self {
        Self { membership_repository, role_repository }
    }

    /// Resolves the roles/permissions to cache in an access token (§4.7
    /// step 3).
    ///
    /// - No organization scope: superadmins get the bare `superadmin` role
    ///   and no permissions (administrative-band checks bypass on the
    ///   `is_superadmin` claim regardless); everyone else gets nothing.
    /// - Organization scope, no active membership: superadmins still
    ///   resolve (to an empty grant plus the `superadmin` role); anyone
    ///   else is rejected with [`ApiError::NotAMember`].
    /// - Organization scope, active membership: the member's role and its
    ///   permissions (already isolation-checked at assignment time, §4.9).
    pub async fn resolve(
        &self,
        user_id: Uuid,
        organization_id: Option<Uuid>,
        is_superadmin: bool,
    ) -> Result<EffectiveGrants, ApiError> {
        let Some(organization_id) = organization_id else {
            return Ok(EffectiveGrants {
                roles: if is_superadmin { vec!["superadmin".to_string()] } else { vec![] },
                permissions: vec![],
            });
        };

        let membership = self.membership_repository.find(organization_id, user_id).await?;

        let membership = match membership {
            Some(m) if m.status == MembershipStatus::Active => m,
            _ if is_superadmin => {
                return Ok(EffectiveGrants {
                    roles: vec!["superadmin".to_string()],
                    permissions: vec![],
                });
            }
            _ => return Err(ApiError::NotAMember),
        };

        let role = self
            .role_repository
            .find_by_id(membership.role_id)
            .await?
            .ok_or_else(|| ApiError::InternalError {
                message: format!("membership {} references missing role", membership.membership_id),
            })?;

        let permissions = self.role_repository.permissions_for_role(role.role_id).await?;

        let mut roles = vec![role.name];
        if is_superadmin {
            roles.push("superadmin".to_string());
        }

        Ok(EffectiveGrants {
            roles,
            permissions: permissions.into_iter().map(|p| p.name).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewMembership, NewRole};
    use crate::repository::fake::{FakeMembershipRepository, FakeRbacRepository};

    async fn seed(
        membership_repo: &FakeMembershipRepository,
        role_repo: &Arc<FakeRbacRepository>,
        organization_id: Uuid,
        user_id: Uuid,
        role_name: &str,
    ) {
        let role = role_repo
            .create(NewRole { name: role_name.to_string(), organization_id: Some(organization_id) })
            .await
            .unwrap();
        membership_repo
            .create(NewMembership {
                organization_id,
                user_id,
                role_id: role.role_id,
                status: MembershipStatus::Active,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_resolve_without_organization_non_superadmin_is_empty() {
        let membership_repo = Arc::new(FakeMembershipRepository::default());
        let rbac_repo = Arc::new(FakeRbacRepository::default());
        let service = RbacService::new(membership_repo, rbac_repo);

        let grants = service.resolve(Uuid::new_v4(), None, false).await.unwrap();
        assert!(grants.roles.is_empty());
        assert!(grants.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_without_organization_superadmin_gets_role() {
        let membership_repo = Arc::new(FakeMembershipRepository::default());
        let rbac_repo = Arc::new(FakeRbacRepository::default());
        let service = RbacService::new(membership_repo, rbac_repo);

        let grants = service.resolve(Uuid::new_v4(), None, true).await.unwrap();
        assert_eq!(grants.roles, vec!["superadmin".to_string()]);
    }

    #[tokio::test]
    async fn test_resolve_non_member_is_rejected() {
        let membership_repo = Arc::new(FakeMembershipRepository::default());
        let rbac_repo = Arc::new(FakeRbacRepository::default());
        let service = RbacService::new(membership_repo, rbac_repo);

        let result = service.resolve(Uuid::new_v4(), Some(Uuid::new_v4()), false).await;
        assert!(matches!(result, Err(ApiError::NotAMember)));
    }

    #[tokio::test]
    async fn test_resolve_member_gets_role_and_permissions() {
        let membership_repo = Arc::new(FakeMembershipRepository::default());
        let rbac_repo = Arc::new(FakeRbacRepository::default());
        let organization_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        seed(&membership_repo, &rbac_repo, organization_id, user_id, "member").await;

        let service = RbacService::new(membership_repo, rbac_repo.clone());
        let roles = rbac_repo.list_for_organization(organization_id).await.unwrap();
        let role = roles.into_iter().find(|r| r.name == "member").unwrap();
        let permission = rbac_repo
            .create(crate::domain::NewPermission {
                name: "profile:view".to_string(),
                organization_id: Some(organization_id),
                description: None,
            })
            .await
            .unwrap();
        rbac_repo.link_permission(role.role_id, permission.permission_id).await.unwrap();

        let grants = service.resolve(user_id, Some(organization_id), false).await.unwrap();
        assert_eq!(grants.roles, vec!["member".to_string()]);
        assert_eq!(grants.permissions, vec!["profile:view".to_string()]);
    }
}
