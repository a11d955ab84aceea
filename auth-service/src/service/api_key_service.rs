//! # API key principal resolution (C4 `ApiKeyLookup` port)
//!
//! Implements [`shared::auth::principal::ApiKeyLookup`] against the
//! API-key (§6) and membership (C9) stores. Bridges the credential-agnostic
//! principal resolver to this service's repositories so `shared` never
//! depends on a database.
//!
//! A full key presents as `<key_id>.<secret>` (§6); the resolver is handed
//! the two halves already split. Resolution:
//!
//! 1. Look up `key_id` (unrevoked rows only, per the repository's own
//!    filter) and reject if absent, revoked, or past `expires_at`.
//! 2. Verify `secret` against `secret_hash` in constant time.
//! 3. Resolve the owning user's effective grants for the key's organization
//!    (C7) and intersect them with the key's own `scopes` — the echoed
//!    principal can never exceed what the membership itself grants (§4.4
//!    "API-key shape").
//!
//! Every rejection — unknown prefix, hash mismatch, revoked, expired, or a
//! membership that's since lapsed — collapses to `Ok(None)` so the caller
//! can't distinguish them (the trait's own contract).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use shared::auth::jwt::{Claims, TokenType};
use shared::auth::principal::ApiKeyLookup;
use shared::crypto::password::PasswordHasher;
use shared::errors::ApiError;
use uuid::Uuid;

use crate::repository::ApiKeyRepository;
use crate::service::rbac_service::RbacService;

pub struct ApiKeyPrincipalResolver {
    api_key_repository: Arc<dyn ApiKeyRepository>,
    rbac_service: Arc<RbacService>,
    password_hasher: Arc<PasswordHasher>,
    issuer: String,
    audience: String,
}

impl ApiKeyPrincipalResolver {
    pub fn new(
        api_key_repository: Arc<dyn ApiKeyRepository>,
        rbac_service: Arc<RbacService>,
        password_hasher: Arc<PasswordHasher>,
        issuer: String,
        audience: String,
    ) -> Self {
        Self { api_key_repository, rbac_service, password_hasher, issuer, audience }
    }
}

#[async_trait]
impl ApiKeyLookup for ApiKeyPrincipalResolver {
    async fn resolve(&self, prefix: &str, secret: &str) -> Result<Option<Claims>, ApiError> {
        let Some(key) = self.api_key_repository.find_by_key_id(prefix).await? else {
            return Ok(None);
        };

        if key.revoked {
            return Ok(None);
        }
        if let Some(expires_at) = key.expires_at {
            if expires_at <= Utc::now() {
                return Ok(None);
            }
        }
        if !self.password_hasher.verify(secret, &key.secret_hash)? {
            return Ok(None);
        }

        let grants = match self.rbac_service.resolve(key.user_id, Some(key.organization_id), false).await {
            Ok(grants) => grants,
            Err(ApiError::NotAMember) => return Ok(None),
            Err(e) => return Err(e),
        };

        let permissions: Vec<String> =
            grants.permissions.into_iter().filter(|p| key.scopes.iter().any(|s| s == p)).collect();

        Ok(Some(Claims {
            sub: key.user_id,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: key.expires_at.map(|e| e.timestamp()).unwrap_or_else(|| (Utc::now() + chrono::Duration::hours(1)).timestamp()),
            iat: Utc::now().timestamp(),
            jti: Uuid::new_v4(),
            sid: key.api_key_id,
            org: Some(key.organization_id),
            is_superadmin: false,
            roles: grants.roles,
            permissions,
            token_type: TokenType::ApiKeyEcho,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MembershipStatus, NewApiKey, NewMembership, NewPermission, NewRole};
    use crate::repository::fake::{FakeApiKeyRepository, FakeMembershipRepository, FakeRbacRepository};
    use crate::repository::{ApiKeyRepository as _, MembershipRepository, PermissionRepository, RoleRepository};

    async fn issue_key(
        api_keys: &dyn ApiKeyRepository,
        hasher: &PasswordHasher,
        user_id: Uuid,
        organization_id: Uuid,
        scopes: Vec<String>,
    ) -> (String, String) {
        let secret = "s3cret-value-long-enough";
        let key = api_keys
            .create(NewApiKey {
                key_id: "ak_0123456789abcdef0123456789abcdef".to_string(),
                secret_hash: hasher.hash(secret).unwrap(),
                user_id,
                organization_id,
                scopes,
                expires_at: None,
            })
            .await
            .unwrap();
        (key.key_id, secret.to_string())
    }

    #[tokio::test]
    async fn test_resolve_intersects_scopes_with_membership_permissions() {
        let api_keys: Arc<dyn ApiKeyRepository> = Arc::new(FakeApiKeyRepository::default());
        let memberships: Arc<dyn MembershipRepository> = Arc::new(FakeMembershipRepository::default());
        let rbac_repo = Arc::new(FakeRbacRepository::default());
        let hasher = Arc::new(PasswordHasher::new());

        let user_id = Uuid::new_v4();
        let organization_id = Uuid::new_v4();
        let role = RoleRepository::create(
            &*rbac_repo,
            NewRole { name: "member".to_string(), organization_id: Some(organization_id) },
        )
        .await
        .unwrap();
        let read_permission = PermissionRepository::create(
            &*rbac_repo,
            NewPermission {
                name: "docs:read".to_string(),
                organization_id: Some(organization_id),
                description: None,
            },
        )
        .await
        .unwrap();
        let write_permission = PermissionRepository::create(
            &*rbac_repo,
            NewPermission {
                name: "docs:write".to_string(),
                organization_id: Some(organization_id),
                description: None,
            },
        )
        .await
        .unwrap();
        rbac_repo.link_permission(role.role_id, read_permission.permission_id).await.unwrap();
        rbac_repo.link_permission(role.role_id, write_permission.permission_id).await.unwrap();
        memberships
            .create(NewMembership {
                organization_id,
                user_id,
                role_id: role.role_id,
                status: MembershipStatus::Active,
            })
            .await
            .unwrap();

        let (key_id, secret) =
            issue_key(&*api_keys, &hasher, user_id, organization_id, vec!["docs:read".to_string()]).await;

        let rbac_service = Arc::new(RbacService::new(memberships, rbac_repo));
        let resolver = ApiKeyPrincipalResolver::new(
            api_keys,
            rbac_service,
            hasher,
            "test-issuer".to_string(),
            "test-audience".to_string(),
        );

        let claims = resolver.resolve(&key_id, &secret).await.unwrap().expect("key resolves");
        assert_eq!(claims.permissions, vec!["docs:read".to_string()]);
        assert_eq!(claims.org, Some(organization_id));
        assert!(!claims.is_superadmin);
    }

    #[tokio::test]
    async fn test_resolve_rejects_wrong_secret() {
        let api_keys: Arc<dyn ApiKeyRepository> = Arc::new(FakeApiKeyRepository::default());
        let memberships: Arc<dyn MembershipRepository> = Arc::new(FakeMembershipRepository::default());
        let rbac_repo = Arc::new(FakeRbacRepository::default());
        let hasher = Arc::new(PasswordHasher::new());

        let (key_id, _) =
            issue_key(&*api_keys, &hasher, Uuid::new_v4(), Uuid::new_v4(), vec![]).await;

        let rbac_service = Arc::new(RbacService::new(memberships, rbac_repo));
        let resolver = ApiKeyPrincipalResolver::new(
            api_keys,
            rbac_service,
            hasher,
            "test-issuer".to_string(),
            "test-audience".to_string(),
        );

        let result = resolver.resolve(&key_id, "wrong-secret").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_resolve_rejects_unknown_prefix() {
        let api_keys: Arc<dyn ApiKeyRepository> = Arc::new(FakeApiKeyRepository::default());
        let memberships: Arc<dyn MembershipRepository> = Arc::new(FakeMembershipRepository::default());
        let rbac_repo = Arc::new(FakeRbacRepository::default());
        let hasher = Arc::new(PasswordHasher::new());
        let rbac_service = Arc::new(RbacService::new(memberships, rbac_repo));
        let resolver = ApiKeyPrincipalResolver::new(
            api_keys,
            rbac_service,
            hasher,
            "test-issuer".to_string(),
            "test-audience".to_string(),
        );

        let result = resolver.resolve("ak_deadbeefdeadbeefdeadbeefdeadbeef", "whatever").await.unwrap();
        assert!(result.is_none());
    }
}
