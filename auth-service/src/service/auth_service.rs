//! # Auth Service (C5, C6)
//!
//! Orchestrates the password authentication engine (C6 — lockout, dummy
//! verification, timing equalization) and the session/refresh-token store
//! (C5 — issuance, rotation, reuse detection) on top of the repository
//! ports and `shared::crypto`/`shared::auth` primitives.
//!
//! This is the direct successor of the lineage's `AuthService`, which held
//! a single `UserRepository` and hand-rolled `hash_token`/
//! `generate_random_token` helpers around a plain `sha2` digest. Those are
//! replaced here by [`shared::crypto::hmac::hmac_tag`] (consistently applied
//! to every opaque credential, per I5) and [`shared::crypto::token`]'s opaque
//! token generators, and the single refresh-token row is replaced by the
//! session/refresh-token lineage described in [`crate::repository`].

use chrono::{Duration, Utc};
use serde::Serialize;
use shared::auth::jwt::{IssueClaims, JwtService, TokenType};
use shared::auth::rbac::RbacContext;
use shared::config::SecurityConfig;
use shared::crypto::hmac::hmac_tag;
use shared::crypto::password::PasswordHasher;
use shared::crypto::token::generate_default_token;
use shared::errors::ApiError;
use shared::rate_limit::{Policy, RateLimitScope, RateLimiter};
use shared::revocation::RevocationIndex;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::domain::events::{DomainEvent, LoginFailed, LoginFailureReason, RefreshTokenReused, UserLoggedIn, UserLoggedOut};
use crate::domain::{
    NewAuditRecord, NewFailedLoginAttempt, NewRefreshToken, NewSession, NewUser, RotationOutcome, User, UserStatus,
};
use crate::repository::{
    AuditRepository, FailedLoginRepository, RefreshTokenRepository, SessionRepository, UserRepository,
};
use crate::service::rbac_service::RbacService;

/// Bearer/session bundle handed back after a successful login, refresh, or
/// OAuth2 code exchange.
#[derive(Debug, Clone)]
pub struct TokenBundle {
    pub access_token: String,
    pub access_token_expires_in: i64,
    pub refresh_token: String,
    pub session_id: Uuid,
}

/// Outcome of [`AuthService::login`].
pub enum LoginOutcome {
    Authenticated(TokenBundle),
    /// Credentials were valid but the principal belongs to more than one
    /// organization and didn't supply a hint (§4.6 step 6).
    OrganizationChoiceRequired { organization_ids: Vec<Uuid> },
}

pub struct AuthService {
    user_repository: Arc<dyn UserRepository>,
    session_repository: Arc<dyn SessionRepository>,
    refresh_token_repository: Arc<dyn RefreshTokenRepository>,
    failed_login_repository: Arc<dyn FailedLoginRepository>,
    membership_repository: Arc<dyn crate::repository::MembershipRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    rbac_service: Arc<RbacService>,
    jwt_service: Arc<JwtService>,
    password_hasher: Arc<PasswordHasher>,
    rate_limiter: Arc<RateLimiter>,
    revocation_index: Arc<RevocationIndex>,
    security: SecurityConfig,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        session_repository: Arc<dyn SessionRepository>,
        refresh_token_repository: Arc<dyn RefreshTokenRepository>,
        failed_login_repository: Arc<dyn FailedLoginRepository>,
        membership_repository: Arc<dyn crate::repository::MembershipRepository>,
        audit_repository: Arc<dyn AuditRepository>,
        rbac_service: Arc<RbacService>,
        jwt_service: Arc<JwtService>,
        password_hasher: Arc<PasswordHasher>,
        rate_limiter: Arc<RateLimiter>,
        revocation_index: Arc<RevocationIndex>,
        security: SecurityConfig,
    ) -> Self {
        Self {
            user_repository,
            session_repository,
            refresh_token_repository,
            failed_login_repository,
            membership_repository,
            audit_repository,
            rbac_service,
            jwt_service,
            password_hasher,
            rate_limiter,
            revocation_index,
            security,
        }
    }

    fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Persists a domain event to the audit log (§3 "Audit trail"). Audit
    /// persistence failures are logged but never fail the caller's request —
    /// the primary action (login, refresh, logout) has already succeeded.
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

    /// Registers a new user. The caller is responsible for any organization
    /// membership / invitation acceptance that follows (C9).
    pub async fn register(&self, email: &str, password: &str, display_name: Option<String>) -> Result<User, ApiError> {
        let email = Self::normalize_email(email);
        let password_verifier = self.password_hasher.hash(password)?;

        self.user_repository
            .create(NewUser { email, password_verifier, display_name })
            .await
    }

    /// Authenticates by email/password (§4.6). `organization_hint` lets a
    /// caller that already knows which organization to scope the session to
    /// skip the membership-enumeration step.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        organization_hint: Option<Uuid>,
        ip_address: Option<String>,
        user_agent: Option<String>,
        device_fingerprint: Option<String>,
    ) -> Result<LoginOutcome, ApiError> {
        let email = Self::normalize_email(email);

        // Step 1: rate-limit on (login, ip) and (login, email).
        let mut policies = Vec::new();
        if let Some(ip) = &ip_address {
            policies.push(Policy {
                scope: RateLimitScope::Login,
                identifier: ip.clone(),
                limit: 10,
                window: std::time::Duration::from_secs(60),
                enabled: true,
            });
        }
        policies.push(Policy {
            scope: RateLimitScope::Login,
            identifier: email.clone(),
            limit: 10,
            window: std::time::Duration::from_secs(60),
            enabled: true,
        });
        let decision = self.rate_limiter.check_combined(&policies).await?;
        if !decision.allowed {
            return Err(ApiError::TooManyRequests {
                retry_after_seconds: (decision.reset_at - Utc::now().timestamp()).max(0) as u64,
            });
        }

        // Step 2: lockout window.
        let window_start = Utc::now() - Duration::seconds(self.security.lockout_window_seconds as i64);
        let failed_count = self.failed_login_repository.count_since(&email, window_start).await?;
        if failed_count >= self.security.lockout_max_attempts as i64 {
            return Err(ApiError::LockedOut {
                retry_after_seconds: self.security.lockout_window_seconds,
            });
        }

        // Step 3: load user; dummy-verify on absence to equalize timing.
        let user = self.user_repository.find_by_email(&email).await?;
        let Some(user) = user.filter(|u| u.status == UserStatus::Active) else {
            self.password_hasher.dummy_verify(password);
            self.record_failed_login(&email, ip_address.clone(), user_agent.clone(), LoginFailureReason::InvalidCredentials).await?;
            return Err(ApiError::InvalidCredentials);
        };

        // Step 4: verify password.
        if !self.password_hasher.verify(password, &user.password_verifier)? {
            self.record_failed_login(&email, ip_address.clone(), user_agent.clone(), LoginFailureReason::InvalidCredentials).await?;
            return Err(ApiError::InvalidCredentials);
        }

        // Step 5: opportunistic rehash.
        if self.password_hasher.needs_rehash(&user.password_verifier) {
            if let Ok(rehashed) = self.password_hasher.hash(password) {
                let _ = self.user_repository.update_password(user.user_id, &rehashed).await;
            }
        }

        // Step 6: resolve organization scope.
        let organization_id = match organization_hint {
            Some(org_id) => {
                let membership = self.membership_repository.find(org_id, user.user_id).await?;
                match membership {
                    Some(m) if m.status == crate::domain::MembershipStatus::Active => Some(org_id),
                    _ => return Err(ApiError::NotAMember),
                }
            }
            None => {
                let memberships: Vec<_> = self
                    .membership_repository
                    .list_for_user(user.user_id)
                    .await?
                    .into_iter()
                    .filter(|m| m.status == crate::domain::MembershipStatus::Active)
                    .collect();
                match memberships.len() {
                    0 => None,
                    1 => Some(memberships[0].organization_id),
                    _ => {
                        return Ok(LoginOutcome::OrganizationChoiceRequired {
                            organization_ids: memberships.into_iter().map(|m| m.organization_id).collect(),
                        });
                    }
                }
            }
        };

        // Step 7: hand off to C5.
        let bundle = self
            .issue_session(user.user_id, organization_id, user.is_superadmin, ip_address.clone(), user_agent.clone(), device_fingerprint)
            .await?;

        // Step 8: audit event.
        let event = UserLoggedIn {
            user_id: user.user_id,
            session_id: bundle.session_id,
            organization_id,
            ip_address,
            user_agent,
            occurred_at: Utc::now(),
        };
        self.audit(&event, Some(user.user_id), format!("session:{}", bundle.session_id), "success").await;

        Ok(LoginOutcome::Authenticated(bundle))
    }

    async fn record_failed_login(
        &self,
        email: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
        reason: LoginFailureReason,
    ) -> Result<(), ApiError> {
        self.failed_login_repository
            .record(NewFailedLoginAttempt { email: email.to_string(), ip_address: ip_address.clone(), user_agent: user_agent.clone() })
            .await?;
        let event = LoginFailed { attempted_email: email.to_string(), reason, ip_address, user_agent, occurred_at: Utc::now() };
        self.audit(&event, None, format!("email:{}", email), "failure").await;
        Ok(())
    }

    /// Creates a brand-new session + refresh-token family and mints the
    /// first access token (§4.5 "Create session").
    /// Mints a new session + refresh-token pair and the access token that
    /// caches its effective grants (§4.5 "Create session"). Crate-visible
    /// so the OAuth2 engine (C8) can reuse it for the code-exchange grant
    /// instead of re-implementing session issuance.
    pub(crate) async fn issue_session(
        &self,
        user_id: Uuid,
        organization_id: Option<Uuid>,
        is_superadmin: bool,
        ip_address: Option<String>,
        user_agent: Option<String>,
        device_fingerprint: Option<String>,
    ) -> Result<TokenBundle, ApiError> {
        let session_token = generate_default_token();
        let session_tag = hmac_tag(self.security.server_secret.as_bytes(), &session_token);
        let session_expires_at = Utc::now() + Duration::seconds(self.security.session_ttl_seconds as i64);

        let session = self
            .session_repository
            .create(NewSession {
                session_tag,
                user_id,
                organization_id,
                ip_address,
                user_agent,
                device_fingerprint,
                expires_at: session_expires_at,
            })
            .await?;

        let refresh_token = generate_default_token();
        let refresh_tag = hmac_tag(self.security.server_secret.as_bytes(), &refresh_token);
        let refresh_expires_at = Utc::now() + Duration::seconds(self.security.refresh_token_ttl_seconds as i64);

        self.refresh_token_repository
            .create(NewRefreshToken {
                token_tag: refresh_tag,
                user_id,
                organization_id,
                session_id: session.session_id,
                family_id: None,
                expires_at: refresh_expires_at,
            })
            .await?;

        let grants = self.rbac_service.resolve(user_id, organization_id, is_superadmin).await?;
        let access_token = self.jwt_service.issue(IssueClaims {
            user_id,
            session_id: session.session_id,
            organization_id,
            is_superadmin,
            roles: grants.roles,
            permissions: grants.permissions,
            token_type: TokenType::Access,
        })?;

        Ok(TokenBundle {
            access_token,
            access_token_expires_in: self.jwt_service.access_token_ttl_seconds(),
            refresh_token,
            session_id: session.session_id,
        })
    }

    /// Rotates a refresh token (§4.5 "Rotate refresh"). On reuse, the whole
    /// family is already revoked by the repository layer; this method also
    /// stamps [`RevocationIndex`] so in-flight access tokens minted under
    /// the burned session fail closed immediately rather than waiting for
    /// their own expiry.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenBundle, ApiError> {
        let old_tag = hmac_tag(self.security.server_secret.as_bytes(), refresh_token);
        let old = self
            .refresh_token_repository
            .find_by_tag(&old_tag)
            .await?
            .ok_or(ApiError::InvalidToken)?;

        // Revoked/reuse/expired are checked inside `rotate`'s atomic row-lock
        // sequence, in that order (§4.5 steps 2-4) — not here, ahead of it.
        let new_token = generate_default_token();
        let new_tag = hmac_tag(self.security.server_secret.as_bytes(), &new_token);
        let successor_expires_at = Utc::now() + Duration::seconds(self.security.refresh_token_ttl_seconds as i64);

        let outcome = self
            .refresh_token_repository
            .rotate(
                &old_tag,
                NewRefreshToken {
                    token_tag: new_tag,
                    user_id: old.user_id,
                    organization_id: old.organization_id,
                    session_id: old.session_id,
                    family_id: Some(old.family_id),
                    expires_at: successor_expires_at,
                },
            )
            .await?;

        match outcome {
            RotationOutcome::Rotated(successor) => {
                self.session_repository.touch_activity(successor.session_id).await?;

                let session = self
                    .session_repository
                    .find_by_id(successor.session_id)
                    .await?
                    .ok_or(ApiError::NotFound { resource: "session".to_string() })?;

                let user = self
                    .user_repository
                    .find_by_id(successor.user_id)
                    .await?
                    .ok_or(ApiError::NotFound { resource: "user".to_string() })?;

                let grants = self
                    .rbac_service
                    .resolve(successor.user_id, successor.organization_id, user.is_superadmin)
                    .await?;

                let access_token = self.jwt_service.issue(IssueClaims {
                    user_id: successor.user_id,
                    session_id: session.session_id,
                    organization_id: successor.organization_id,
                    is_superadmin: user.is_superadmin,
                    roles: grants.roles,
                    permissions: grants.permissions,
                    token_type: TokenType::Access,
                })?;

                Ok(TokenBundle {
                    access_token,
                    access_token_expires_in: self.jwt_service.access_token_ttl_seconds(),
                    refresh_token: new_token,
                    session_id: session.session_id,
                })
            }
            RotationOutcome::ReuseDetected { family_id, session_id, user_id } => {
                self.session_repository.revoke(session_id, "refresh_token_reuse").await?;
                self.revocation_index.revoke_session(session_id).await?;
                self.revocation_index.revoke_refresh_family(family_id).await?;

                let event = RefreshTokenReused { user_id, session_id, family_id, ip_address: None, occurred_at: Utc::now() };
                self.audit(&event, Some(user_id), format!("session:{session_id}"), "reuse_detected").await;

                Err(ApiError::RefreshReused)
            }
            RotationOutcome::Revoked { .. } => Err(ApiError::RefreshRevoked),
        }
    }

    /// Revokes a single session and its refresh-token lineage (§4.5
    /// "Revoke session").
    pub async fn logout(&self, user_id: Uuid, session_id: Uuid) -> Result<(), ApiError> {
        self.session_repository.revoke(session_id, "logout").await?;
        self.refresh_token_repository.revoke_all_for_session(session_id).await?;
        self.revocation_index.revoke_session(session_id).await?;

        let event = UserLoggedOut { user_id, session_id: Some(session_id), all_sessions: false, occurred_at: Utc::now() };
        self.audit(&event, Some(user_id), format!("session:{session_id}"), "success").await;
        Ok(())
    }

    /// Revokes every session for a user (§4.5 "Revoke user / organization").
    pub async fn logout_all(&self, user_id: Uuid) -> Result<(), ApiError> {
        self.session_repository.revoke_all_for_user(user_id, "logout_all").await?;
        self.revocation_index.revoke_user(user_id).await?;

        let event = UserLoggedOut { user_id, session_id: None, all_sessions: true, occurred_at: Utc::now() };
        self.audit(&event, Some(user_id), format!("user:{user_id}"), "success").await;
        Ok(())
    }

    /// Evaluates a single RBAC check against a fully-resolved
    /// [`RbacContext`], built from the claims cached in an access token.
    pub fn authorize(ctx: &RbacContext<'_>, permission: &str) -> Result<(), ApiError> {
        if ctx.check(permission) {
            Ok(())
        } else {
            Err(ApiError::AccessDenied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fake::{
        FakeAuditRepository, FakeMembershipRepository, FakeRbacRepository, FakeRefreshTokenRepository,
        FakeSessionRepository, FakeUserRepository,
    };
    use std::path::Path;
    use tempfile::tempdir;

    fn write_test_keypair(dir: &Path, kid: &str) {
        use rsa::pkcs1::EncodeRsaPrivateKey;
        use rsa::pkcs8::EncodePublicKey;
        use rsa::RsaPrivateKey;

        let mut rng = rand::thread_rng();
        let priv_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pub_key = priv_key.to_public_key();
        std::fs::write(dir.join(format!("{kid}.priv.pem")), priv_key.to_pkcs1_pem(Default::default()).unwrap().as_bytes()).unwrap();
        std::fs::write(dir.join(format!("{kid}.pub.pem")), pub_key.to_public_key_pem(Default::default()).unwrap()).unwrap();
    }

    fn test_security() -> SecurityConfig {
        SecurityConfig {
            server_secret: "test-server-secret-at-least-32-bytes-long".to_string(),
            session_ttl_seconds: 2_592_000,
            refresh_token_ttl_seconds: 604_800,
            max_inactive_seconds: 1_209_600,
            lockout_max_attempts: 5,
            lockout_window_seconds: 900,
        }
    }

    fn build_service(dir: &Path) -> AuthService {
        write_test_keypair(dir, "k1");
        let jwt_service = Arc::new(
            JwtService::new(shared::config::JwtConfig {
                keys_dir: dir.to_string_lossy().to_string(),
                active_kid: "k1".to_string(),
                algorithm: shared::config::JwtAlgorithm::Rs256,
                access_token_ttl_seconds: 900,
                issuer: "test-issuer".to_string(),
                audience: "test-audience".to_string(),
            })
            .unwrap(),
        );

        let user_repository = Arc::new(FakeUserRepository::default());
        let session_repository = Arc::new(FakeSessionRepository::default());
        let refresh_token_repository = Arc::new(FakeRefreshTokenRepository::default());
        let failed_login_repository = Arc::new(FakeAuditRepository::default());
        let audit_repository = Arc::new(FakeAuditRepository::default());
        let membership_repository = Arc::new(FakeMembershipRepository::default());
        let rbac_repository = Arc::new(FakeRbacRepository::default());
        let rbac_service = Arc::new(RbacService::new(membership_repository.clone(), rbac_repository));
        let kv = Arc::new(shared::kv::fake::FakeKvStore::new());

        AuthService::new(
            user_repository,
            session_repository,
            refresh_token_repository,
            failed_login_repository,
            membership_repository,
            audit_repository,
            rbac_service,
            jwt_service,
            Arc::new(PasswordHasher::new()),
            Arc::new(RateLimiter::new(kv.clone(), true)),
            Arc::new(RevocationIndex::new(kv)),
            test_security(),
        )
    }

    #[tokio::test]
    async fn test_register_and_login_succeeds() {
        let dir = tempdir().unwrap();
        let service = build_service(dir.path());

        service.register("Test@Example.com", "Sup3r$ecretPass", Some("Test".to_string())).await.unwrap();

        let outcome = service
            .login("test@example.com", "Sup3r$ecretPass", None, Some("127.0.0.1".to_string()), None, None)
            .await
            .unwrap();

        assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
    }

    #[tokio::test]
    async fn test_login_wrong_password_fails() {
        let dir = tempdir().unwrap();
        let service = build_service(dir.path());
        service.register("test@example.com", "Sup3r$ecretPass", None).await.unwrap();

        let result = service.login("test@example.com", "wrong-password", None, None, None, None).await;
        assert!(matches!(result, Err(ApiError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_unknown_user_takes_dummy_verify_path() {
        let dir = tempdir().unwrap();
        let service = build_service(dir.path());

        let result = service.login("nobody@example.com", "whatever", None, None, None, None).await;
        assert!(matches!(result, Err(ApiError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let dir = tempdir().unwrap();
        let service = build_service(dir.path());
        service.register("test@example.com", "Sup3r$ecretPass", None).await.unwrap();
        let outcome = service
            .login("test@example.com", "Sup3r$ecretPass", None, None, None, None)
            .await
            .unwrap();
        let LoginOutcome::Authenticated(bundle) = outcome else { panic!("expected authenticated") };

        let rotated = service.refresh(&bundle.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, bundle.refresh_token);
    }

    #[tokio::test]
    async fn test_refresh_reuse_is_rejected() {
        let dir = tempdir().unwrap();
        let service = build_service(dir.path());
        service.register("test@example.com", "Sup3r$ecretPass", None).await.unwrap();
        let outcome = service
            .login("test@example.com", "Sup3r$ecretPass", None, None, None, None)
            .await
            .unwrap();
        let LoginOutcome::Authenticated(bundle) = outcome else { panic!("expected authenticated") };

        service.refresh(&bundle.refresh_token).await.unwrap();
        let result = service.refresh(&bundle.refresh_token).await;
        assert!(matches!(result, Err(ApiError::RefreshReused)));
    }

    #[tokio::test]
    async fn test_refresh_after_logout_is_revoked_not_reused() {
        let dir = tempdir().unwrap();
        let service = build_service(dir.path());
        service.register("test@example.com", "Sup3r$ecretPass", None).await.unwrap();
        let outcome = service
            .login("test@example.com", "Sup3r$ecretPass", None, None, None, None)
            .await
            .unwrap();
        let LoginOutcome::Authenticated(bundle) = outcome else { panic!("expected authenticated") };

        service.logout(Uuid::new_v4(), bundle.session_id).await.unwrap();

        // A refresh attempt against an already-revoked (never reused) family
        // must be distinguished from genuine reuse (R3).
        let result = service.refresh(&bundle.refresh_token).await;
        assert!(matches!(result, Err(ApiError::RefreshRevoked)));
    }

    #[tokio::test]
    async fn test_logout_revokes_session() {
        let dir = tempdir().unwrap();
        let service = build_service(dir.path());
        service.register("test@example.com", "Sup3r$ecretPass", None).await.unwrap();
        let outcome = service
            .login("test@example.com", "Sup3r$ecretPass", None, None, None, None)
            .await
            .unwrap();
        let LoginOutcome::Authenticated(bundle) = outcome else { panic!("expected authenticated") };

        service.logout(Uuid::new_v4(), bundle.session_id).await.unwrap();
        assert!(service.revocation_index.is_revoked(bundle.session_id, None, Uuid::new_v4(), None).await.unwrap());
    }
}
