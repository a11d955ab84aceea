//! # OAuth2 Engine (C8)
//!
//! Authorization-code flow with PKCE. Entirely new relative to the
//! lineage's `AuthService` (no authorization-server code existed before);
//! grounded in the same service/repository layering as [`AuthService`],
//! reusing its session/refresh-token issuance (C5) for the code-exchange
//! grant rather than re-implementing it here.

use chrono::{Duration, Utc};
use shared::crypto::hmac::{constant_time_eq, hmac_tag};
use shared::crypto::password::PasswordHasher;
use shared::crypto::token::{generate_default_token, pkce_challenge_s256};
use shared::config::SecurityConfig;
use shared::errors::ApiError;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{AuthorizationCode, NewAuthorizationCode, OAuthClient};
use crate::repository::{AuthorizationCodeRepository, OAuthClientRepository};
use crate::service::auth_service::{AuthService, TokenBundle};

/// Authorization codes are valid for 10 minutes (§4.8).
const CODE_TTL: Duration = Duration::minutes(10);

const PKCE_METHOD_S256: &str = "S256";

/// Result of a successful `/authorize` call: the opaque code to redirect
/// back with, alongside the client's own redirect URI. The `state`
/// parameter is not touched by this layer — the API handler echoes the
/// caller-supplied value back verbatim, unmodified and unstored.
#[derive(Debug, Clone)]
pub struct IssuedAuthorizationCode {
    pub code: String,
    pub redirect_uri: String,
}

pub struct OAuthService {
    client_repository: Arc<dyn OAuthClientRepository>,
    code_repository: Arc<dyn AuthorizationCodeRepository>,
    auth_service: Arc<AuthService>,
    password_hasher: Arc<PasswordHasher>,
    security: SecurityConfig,
}

impl OAuthService {
    pub fn new(
        client_repository: Arc<dyn OAuthClientRepository>,
        code_repository: Arc<dyn AuthorizationCodeRepository>,
        auth_service: Arc<AuthService>,
        password_hasher: Arc<PasswordHasher>,
        security: SecurityConfig,
    ) -> Self {
        Self { client_repository, code_repository, auth_service, password_hasher, security }
    }

    fn tag(&self, plaintext: &str) -> String {
        hmac_tag(self.security.server_secret.as_bytes(), plaintext)
    }

    async fn load_client(&self, client_id: Uuid) -> Result<OAuthClient, ApiError> {
        self.client_repository
            .find_by_id(client_id)
            .await?
            .ok_or_else(|| ApiError::NotFound { resource: format!("oauth_client:{client_id}") })
    }

    /// `/authorize` (§4.8): validates the client, its redirect URI, and the
    /// requested scope, then mints a single-use authorization code. Consent
    /// collection happens upstream of this call (out of scope here) — by
    /// the time this is invoked the user has already consented.
    pub async fn authorize(
        &self,
        client_id: Uuid,
        user_id: Uuid,
        redirect_uri: &str,
        requested_scope: &str,
        code_challenge: Option<String>,
        code_challenge_method: Option<String>,
    ) -> Result<IssuedAuthorizationCode, ApiError> {
        let client = self.load_client(client_id).await?;

        if !client.redirect_uris.iter().any(|u| u == redirect_uri) {
            return Err(ApiError::BadRequest { message: "redirect_uri is not registered for this client".to_string() });
        }

        let requested: Vec<&str> = requested_scope.split_whitespace().collect();
        if !requested.iter().all(|s| client.allowed_scopes.iter().any(|a| a == s)) {
            return Err(ApiError::BadRequest { message: "requested scope exceeds client's allowed scope".to_string() });
        }

        if client.is_public
            && !(code_challenge.is_some() && code_challenge_method.as_deref() == Some(PKCE_METHOD_S256))
        {
            return Err(ApiError::BadRequest { message: "PKCE with S256 is required for public clients".to_string() });
        }

        let code = generate_default_token();
        let code_tag = self.tag(&code);

        self.code_repository
            .create(NewAuthorizationCode {
                code_tag,
                client_id,
                user_id,
                redirect_uri: redirect_uri.to_string(),
                code_challenge,
                code_challenge_method,
                scope: requested_scope.to_string(),
                expires_at: Utc::now() + CODE_TTL,
            })
            .await?;

        Ok(IssuedAuthorizationCode { code, redirect_uri: redirect_uri.to_string() })
    }

    /// `/token` code-exchange grant (§4.8). The code is consumed
    /// atomically under a row-level lock by [`AuthorizationCodeRepository::consume`]
    /// before any further validation runs, so a code is single-use even if
    /// client-credential or PKCE validation subsequently fails.
    pub async fn exchange_code(
        &self,
        client_id: Uuid,
        client_secret: Option<&str>,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<TokenBundle, ApiError> {
        let code_tag = self.tag(code);
        let authorization_code: AuthorizationCode =
            self.code_repository.consume(&code_tag).await?.ok_or(ApiError::InvalidToken)?;

        let client = self.load_client(client_id).await?;
        self.validate_client_credentials(&client, client_secret)?;
        self.validate_pkce(&authorization_code, code_verifier)?;

        if authorization_code.redirect_uri != redirect_uri {
            return Err(ApiError::BadRequest { message: "redirect_uri does not match the authorization request".to_string() });
        }

        self.auth_service
            .issue_session(authorization_code.user_id, None, false, ip_address, user_agent, None)
            .await
    }

    /// `/token` refresh grant (§4.8): identical to C5 rotation.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenBundle, ApiError> {
        self.auth_service.refresh(refresh_token).await
    }

    fn validate_client_credentials(&self, client: &OAuthClient, client_secret: Option<&str>) -> Result<(), ApiError> {
        if client.is_public {
            return Ok(());
        }
        let secret_hash = client
            .secret_hash
            .as_deref()
            .ok_or_else(|| ApiError::InternalError { message: "confidential client has no secret hash".to_string() })?;
        let provided = client_secret.ok_or(ApiError::InvalidCredentials)?;
        if self.password_hasher.verify(provided, secret_hash)? {
            Ok(())
        } else {
            Err(ApiError::InvalidCredentials)
        }
    }

    fn validate_pkce(&self, code: &AuthorizationCode, verifier: Option<&str>) -> Result<(), ApiError> {
        let (Some(challenge), Some(method)) = (&code.code_challenge, &code.code_challenge_method) else {
            return Ok(());
        };
        if method != PKCE_METHOD_S256 {
            return Err(ApiError::BadRequest { message: "unsupported code_challenge_method".to_string() });
        }
        let verifier = verifier.ok_or_else(|| ApiError::BadRequest { message: "code_verifier is required".to_string() })?;
        let computed = pkce_challenge_s256(verifier);
        if constant_time_eq(computed.as_bytes(), challenge.as_bytes()) {
            Ok(())
        } else {
            Err(ApiError::BadRequest { message: "code_verifier does not match code_challenge".to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewOAuthClient;
    use crate::repository::fake::{FakeOAuthRepository, FakeRefreshTokenRepository, FakeSessionRepository};
    use crate::repository::fake::{
        FakeAuditRepository, FakeMembershipRepository, FakeRbacRepository, FakeUserRepository,
    };
    use crate::service::rbac_service::RbacService;
    use shared::auth::jwt::{JwtConfig, JwtService};
    use shared::config::JwtAlgorithm;
    use std::path::Path;

    fn write_test_keypair(dir: &Path, kid: &str) {
        use rsa::pkcs1::EncodeRsaPrivateKey;
        use rsa::pkcs8::EncodePublicKey;
        use rsa::RsaPrivateKey;

        let mut rng = rand::thread_rng();
        let priv_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pub_key = priv_key.to_public_key();

        let priv_pem = priv_key.to_pkcs1_pem(Default::default()).unwrap();
        let pub_pem = pub_key.to_public_key_pem(Default::default()).unwrap();

        std::fs::write(dir.join(format!("{kid}.priv.pem")), priv_pem.as_bytes()).unwrap();
        std::fs::write(dir.join(format!("{kid}.pub.pem")), pub_pem.as_bytes()).unwrap();
    }

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

    fn build_service(dir: &Path) -> (OAuthService, Arc<FakeOAuthRepository>, Uuid) {
        write_test_keypair(dir, "k1");
        let jwt_service = Arc::new(
            JwtService::new(JwtConfig {
                algorithm: JwtAlgorithm::Rs256,
                active_kid: "k1".to_string(),
                keys_dir: dir.to_string_lossy().to_string(),
                issuer: "test-issuer".to_string(),
                audience: "test-audience".to_string(),
                access_token_ttl_seconds: 900,
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
        let rate_limiter = Arc::new(shared::rate_limit::RateLimiter::new(kv.clone(), true));
        let revocation_index = Arc::new(shared::revocation::RevocationIndex::new(kv));

        let auth_service = Arc::new(AuthService::new(
            user_repository,
            session_repository,
            refresh_token_repository,
            failed_login_repository,
            membership_repository,
            audit_repository,
            rbac_service,
            jwt_service,
            Arc::new(PasswordHasher::new()),
            rate_limiter,
            revocation_index,
            test_security(),
        ));

        let client_repository = Arc::new(FakeOAuthRepository::default());
        let code_repository = client_repository.clone();

        let service = OAuthService::new(
            client_repository.clone(),
            code_repository,
            auth_service,
            Arc::new(PasswordHasher::new()),
            test_security(),
        );
        (service, client_repository, Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_authorize_rejects_unregistered_redirect_uri() {
        let dir = tempfile::tempdir().unwrap();
        let (service, clients, user_id) = build_service(dir.path());
        let client = OAuthClientRepository::create(
            &*clients,
            NewOAuthClient {
                name: "public-client".to_string(),
                secret_hash: None,
                redirect_uris: vec!["https://app.example.com/callback".to_string()],
                allowed_origins: vec![],
                allowed_scopes: vec!["profile:view".to_string()],
                is_public: true,
            },
        )
        .await
        .unwrap();

        let result = service
            .authorize(
                client.client_id,
                user_id,
                "https://evil.example.com/callback",
                "profile:view",
                Some("challenge".to_string()),
                Some(PKCE_METHOD_S256.to_string()),
            )
            .await;
        assert!(matches!(result, Err(ApiError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn test_authorize_requires_pkce_for_public_client() {
        let dir = tempfile::tempdir().unwrap();
        let (service, clients, user_id) = build_service(dir.path());
        let client = OAuthClientRepository::create(
            &*clients,
            NewOAuthClient {
                name: "public-client".to_string(),
                secret_hash: None,
                redirect_uris: vec!["https://app.example.com/callback".to_string()],
                allowed_origins: vec![],
                allowed_scopes: vec!["profile:view".to_string()],
                is_public: true,
            },
        )
        .await
        .unwrap();

        let result = service
            .authorize(client.client_id, user_id, "https://app.example.com/callback", "profile:view", None, None)
            .await;
        assert!(matches!(result, Err(ApiError::BadRequest { .. })));
    }

    #[tokio::test]
    async fn test_full_code_exchange_with_pkce_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let (service, clients, user_id) = build_service(dir.path());
        let client = OAuthClientRepository::create(
            &*clients,
            NewOAuthClient {
                name: "public-client".to_string(),
                secret_hash: None,
                redirect_uris: vec!["https://app.example.com/callback".to_string()],
                allowed_origins: vec![],
                allowed_scopes: vec!["profile:view".to_string()],
                is_public: true,
            },
        )
        .await
        .unwrap();

        let verifier = shared::crypto::token::generate_pkce_verifier();
        let challenge = pkce_challenge_s256(&verifier);

        let issued = service
            .authorize(
                client.client_id,
                user_id,
                "https://app.example.com/callback",
                "profile:view",
                Some(challenge),
                Some(PKCE_METHOD_S256.to_string()),
            )
            .await
            .unwrap();

        let bundle = service
            .exchange_code(
                client.client_id,
                None,
                &issued.code,
                "https://app.example.com/callback",
                Some(&verifier),
                None,
                None,
            )
            .await
            .unwrap();
        assert!(!bundle.access_token.is_empty());

        let replay = service
            .exchange_code(
                client.client_id,
                None,
                &issued.code,
                "https://app.example.com/callback",
                Some(&verifier),
                None,
                None,
            )
            .await;
        assert!(matches!(replay, Err(ApiError::InvalidToken)));
    }
}
