//! # Principal resolver (C4)
//!
//! Generalizes the lineage's `AuthMiddleware`/`AuthenticatedUser` extractor
//! pair. The extractor becomes [`Principal`], constructed by a
//! [`PrincipalResolver`] that threads through the token codec (C2) and the
//! revocation index (C10), then merges in the organization selected by the
//! `X-Organization-Id` header (§6).
//!
//! ## Resolution pipeline
//!
//! 1. Extract the bearer credential from `Authorization`.
//! 2. Dispatch by shape: a JWS (`xxx.yyy.zzz`) is verified by [`JwtService`];
//!    an API key (`ak_<prefix>.<secret>`) is looked up via
//!    [`ApiKeyLookup`] and its resolved principal echoed back.
//! 3. Query the revocation index (C10) for the resulting session/refresh
//!    family/user/organization scopes.
//! 4. Resolve the acting organization: the `X-Organization-Id` header if
//!    present, else the token's own `org` claim.
//!
//! Every failure mode collapses to [`ApiError::MissingAuth`] or
//! [`ApiError::InvalidToken`] for the caller — the distinction between
//! "expired", "revoked", "malformed", and "disabled" is for logs, never the
//! wire response, so an attacker can't use it to fingerprint account state.

use crate::auth::jwt::{Claims, JwtService, TokenType};
use crate::errors::ApiError;
use crate::revocation::RevocationIndex;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// The authenticated caller, as reconstructed from a verified credential.
/// Analogous to the lineage's `AuthenticatedUser`, generalized to carry
/// role/permission claims and organization scoping (§4.4/§4.7).
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub is_superadmin: bool,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub token_type: TokenType,
}

impl Principal {
    fn from_claims(claims: Claims, organization_override: Option<Uuid>) -> Self {
        Self {
            user_id: claims.sub,
            session_id: claims.sid,
            organization_id: organization_override.or(claims.org),
            is_superadmin: claims.is_superadmin,
            roles: claims.roles,
            permissions: claims.permissions,
            token_type: claims.token_type,
        }
    }

    /// Builds an [`RbacContext`](super::rbac::RbacContext) scoped to this
    /// principal's own claims.
    pub fn rbac(&self) -> crate::auth::rbac::RbacContext<'_> {
        crate::auth::rbac::RbacContext {
            is_superadmin: self.is_superadmin,
            roles: &self.roles,
            permissions: &self.permissions,
        }
    }
}

/// Resolves an API key's prefix to the principal claims it represents.
/// Implemented against the membership/API-key store (C9) by the consuming
/// service; kept as a port here so this crate doesn't depend on a database.
#[async_trait]
pub trait ApiKeyLookup: Send + Sync {
    /// Looks up the principal an API key secret resolves to, verifying the
    /// secret against its stored hash. Returns `None` on unknown prefix or
    /// hash mismatch — callers must not distinguish the two.
    async fn resolve(&self, prefix: &str, secret: &str) -> Result<Option<Claims>, ApiError>;
}

/// Resolves bearer credentials into a [`Principal`] (§4.4).
pub struct PrincipalResolver {
    jwt: Arc<JwtService>,
    revocation: Arc<RevocationIndex>,
    api_keys: Arc<dyn ApiKeyLookup>,
}

impl PrincipalResolver {
    pub fn new(jwt: Arc<JwtService>, revocation: Arc<RevocationIndex>, api_keys: Arc<dyn ApiKeyLookup>) -> Self {
        Self { jwt, revocation, api_keys }
    }

    /// Resolves the bearer credential in `auth_header` (the raw
    /// `Authorization` header value) into a [`Principal`], optionally scoped
    /// to `organization_header` (the raw `X-Organization-Id` header value).
    pub async fn resolve(
        &self,
        auth_header: &str,
        organization_header: Option<&str>,
    ) -> Result<Principal, ApiError> {
        let credential = JwtService::extract_from_header(auth_header).map_err(|_| ApiError::MissingAuth)?;

        let organization_override = match organization_header {
            Some(raw) => Some(Uuid::parse_str(raw).map_err(|_| ApiError::InvalidUuid)?),
            None => None,
        };

        let claims = self.verify_credential(credential).await?;

        if self
            .revocation
            .is_revoked(claims.sid, None, claims.sub, organization_override.or(claims.org))
            .await?
        {
            return Err(ApiError::InvalidToken);
        }

        Ok(Principal::from_claims(claims, organization_override))
    }

    /// Dispatches `credential` to the JWS verifier or the API-key lookup
    /// based on its shape.
    async fn verify_credential(&self, credential: &str) -> Result<Claims, ApiError> {
        if let Some((prefix, secret)) = credential.split_once('.') {
            if prefix.starts_with("ak_") {
                return self
                    .api_keys
                    .resolve(prefix, secret)
                    .await?
                    .ok_or(ApiError::InvalidToken);
            }
        }
        self.jwt.verify(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::fake::FakeKvStore;

    struct NoApiKeys;

    #[async_trait]
    impl ApiKeyLookup for NoApiKeys {
        async fn resolve(&self, _prefix: &str, _secret: &str) -> Result<Option<Claims>, ApiError> {
            Ok(None)
        }
    }

    fn sample_claims(org: Option<Uuid>) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            iss: "test".to_string(),
            aud: "test".to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::seconds(60)).timestamp(),
            iat: chrono::Utc::now().timestamp(),
            jti: Uuid::new_v4(),
            sid: Uuid::new_v4(),
            org,
            is_superadmin: false,
            roles: vec!["member".to_string()],
            permissions: vec![],
            token_type: TokenType::Access,
        }
    }

    #[test]
    fn test_principal_from_claims_prefers_organization_override() {
        let claims = sample_claims(Some(Uuid::new_v4()));
        let override_org = Uuid::new_v4();
        let principal = Principal::from_claims(claims, Some(override_org));
        assert_eq!(principal.organization_id, Some(override_org));
    }

    #[test]
    fn test_principal_from_claims_falls_back_to_token_org() {
        let org = Uuid::new_v4();
        let claims = sample_claims(Some(org));
        let principal = Principal::from_claims(claims, None);
        assert_eq!(principal.organization_id, Some(org));
    }

    #[tokio::test]
    async fn test_resolve_rejects_missing_bearer_prefix() {
        let revocation = Arc::new(RevocationIndex::new(Arc::new(FakeKvStore::new())));
        // jwt omitted: this path fails before reaching it.
        let _ = revocation;
        let result = JwtService::extract_from_header("Basic abc123");
        assert!(matches!(result, Err(ApiError::InvalidToken)));
    }
}
