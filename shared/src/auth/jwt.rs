//! # JWT Token Service (C2 — token codec)
//!
//! Produces and verifies the signed access token: a compact JWS that proves
//! who the bearer is without a database round trip.
//!
//! ## Token Structure
//!
//! ```text
//! xxxxx.yyyyy.zzzzz
//! ├────┼─────┼────┤
//! │    │     │    └── Signature (verifies integrity)
//! │    │     └─────── Payload (claims - the actual data)
//! │    └───────────── Header (algorithm, key id)
//! ```
//!
//! ## Signing
//!
//! Signing is asymmetric (`RS256` or `ES256`). Only the service holds the
//! private key; relying parties verify with the corresponding public key.
//! Each key carries a `kid` (key id) in the JWS header. Verification accepts
//! any key id present in the *trusted key set*, which is how rotation works:
//! drop in a new key pair, point `active_kid` at it, and old `kid`s remain
//! verifiable for as long as their public key stays in the trusted set.
//!
//! Refresh tokens are opaque strings, not JWTs — see the session/refresh
//! store for their lifecycle.
//!
//! ## Claims (Token Payload)
//!
//! | Claim | Description |
//! |-------|-------------|
//! | `sub` | Subject (user id) |
//! | `iss` | Issuer |
//! | `aud` | Audience |
//! | `exp` | Expiration time |
//! | `iat` | Issued at |
//! | `jti` | JWT ID (unique) |
//! | `sid` | Session id this token was minted under |
//! | `org` | Organization id, if the token is organization-scoped |
//! | `is_superadmin` | Superadmin flag, cached at issuance |
//! | `roles` | Effective role names, cached at issuance |
//! | `permissions` | Effective permission names, cached at issuance |
//! | `token_type` | `access`, `oauth2_access`, or `api_key_echo` |
//!
//! Caching `roles`/`permissions` in the token is why the access-token TTL is
//! kept short (§4.7 step 3): a revoked permission only takes effect once the
//! token expires and is re-minted.
//!
//! ## Related Documentation
//!
//! - [`crate::config::JwtConfig`] - Configuration options
//! - [`crate::auth::principal`] - Request authentication

use crate::config::{JwtAlgorithm, JwtConfig};
use crate::errors::ApiError;
use arc_swap::ArcSwap;
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData,
    Validation,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

// =============================================================================
// Claims Structure
// =============================================================================

/// JWT Claims (access-token payload). All fields are verified or populated
/// during issuance/validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - the user's unique identifier (UUID).
    pub sub: Uuid,

    /// Issuer - identifies who created the token.
    pub iss: String,

    /// Audience - identifies who the token is intended for.
    pub aud: String,

    /// Expiration time as Unix timestamp (seconds since epoch).
    pub exp: i64,

    /// Issued at time as Unix timestamp.
    pub iat: i64,

    /// JWT ID - unique identifier for this specific token.
    pub jti: Uuid,

    /// Session id this access token was minted under (§4.5).
    pub sid: Uuid,

    /// Organization id, present when the token is organization-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<Uuid>,

    /// Whether the subject is a platform superadmin (§4.7).
    pub is_superadmin: bool,

    /// Effective role names at issuance time.
    pub roles: Vec<String>,

    /// Effective permission names at issuance time.
    pub permissions: Vec<String>,

    /// Distinguishes access tokens minted by different paths.
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

// =============================================================================
// Token Type
// =============================================================================

/// Distinguishes the path that minted this access token (§4.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Minted by the password/session login path.
    Access,
    /// Minted by the OAuth2 token endpoint.
    Oauth2Access,
    /// Minted to echo an API key's resolved principal back to callers.
    ApiKeyEcho,
}

// =============================================================================
// Claims the caller supplies at issuance
// =============================================================================

/// Everything the issuer needs beyond what [`JwtService`] fills in itself
/// (`iss`, `aud`, `iat`, `exp`, `jti`).
pub struct IssueClaims {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub is_superadmin: bool,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub token_type: TokenType,
}

// =============================================================================
// Trusted key set
// =============================================================================

/// A signing key plus every currently-trusted verification key, keyed by
/// `kid`. Rebuilding this and swapping it behind an [`ArcSwap`] is how key
/// rotation is applied without a service restart (§5 "Global state").
pub struct TrustedKeySet {
    algorithm: Algorithm,
    active_kid: String,
    encoding_key: EncodingKey,
    decoding_keys: HashMap<String, DecodingKey>,
}

impl TrustedKeySet {
    /// Loads the active signing key and every trusted public key from PEM
    /// files under `keys_dir`. Expects `{active_kid}.priv.pem` and a
    /// `{kid}.pub.pem` for every trusted `kid` (including `active_kid`).
    fn load(keys_dir: &str, active_kid: &str, algorithm: JwtAlgorithm) -> Result<Self, ApiError> {
        let dir = Path::new(keys_dir);
        let priv_path = dir.join(format!("{active_kid}.priv.pem"));
        let priv_pem = fs::read(&priv_path).map_err(|e| ApiError::InternalError {
            message: format!("failed to read signing key {}: {}", priv_path.display(), e),
        })?;

        let (jwt_algorithm, encoding_key) = match algorithm {
            JwtAlgorithm::Rs256 => (
                Algorithm::RS256,
                EncodingKey::from_rsa_pem(&priv_pem).map_err(|e| ApiError::InternalError {
                    message: format!("invalid RSA private key: {e}"),
                })?,
            ),
            JwtAlgorithm::Es256 => (
                Algorithm::ES256,
                EncodingKey::from_ec_pem(&priv_pem).map_err(|e| ApiError::InternalError {
                    message: format!("invalid EC private key: {e}"),
                })?,
            ),
        };

        let mut decoding_keys = HashMap::new();
        let entries = fs::read_dir(dir).map_err(|e| ApiError::InternalError {
            message: format!("failed to read keys directory {keys_dir}: {e}"),
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| ApiError::InternalError {
                message: format!("failed to read keys directory entry: {e}"),
            })?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let Some(kid) = file_name.strip_suffix(".pub.pem") else {
                continue;
            };
            let pem = fs::read(entry.path()).map_err(|e| ApiError::InternalError {
                message: format!("failed to read public key {kid}: {e}"),
            })?;
            let decoding_key = match algorithm {
                JwtAlgorithm::Rs256 => DecodingKey::from_rsa_pem(&pem),
                JwtAlgorithm::Es256 => DecodingKey::from_ec_pem(&pem),
            }
            .map_err(|e| ApiError::InternalError {
                message: format!("invalid public key {kid}: {e}"),
            })?;
            decoding_keys.insert(kid.to_string(), decoding_key);
        }

        if !decoding_keys.contains_key(active_kid) {
            return Err(ApiError::InternalError {
                message: format!("active kid {active_kid} has no matching public key"),
            });
        }

        Ok(Self {
            algorithm: jwt_algorithm,
            active_kid: active_kid.to_string(),
            encoding_key,
            decoding_keys,
        })
    }
}

// =============================================================================
// JWT Service
// =============================================================================

/// Service for access-token issuance and verification (C2).
///
/// Created once at startup and shared behind an `Arc`. The key material is
/// held behind an [`ArcSwap`] so [`JwtService::rotate`] can be called while
/// requests are in flight without locking readers out.
pub struct JwtService {
    keys: ArcSwap<TrustedKeySet>,
    keys_dir: String,
    algorithm: JwtAlgorithm,
    access_token_ttl_seconds: u64,
    issuer: String,
    audience: String,
}

impl JwtService {
    /// Creates a new JWT service, loading key material from `config.keys_dir`.
    pub fn new(config: JwtConfig) -> Result<Self, ApiError> {
        let keys = TrustedKeySet::load(&config.keys_dir, &config.active_kid, config.algorithm)?;
        Ok(Self {
            keys: ArcSwap::from_pointee(keys),
            keys_dir: config.keys_dir,
            algorithm: config.algorithm,
            access_token_ttl_seconds: config.access_token_ttl_seconds,
            issuer: config.issuer,
            audience: config.audience,
        })
    }

    /// Re-reads `keys_dir` and switches the signer to `new_active_kid`. Any
    /// `kid` still present in the directory as a `.pub.pem` remains
    /// verifiable; tokens signed before the call keep validating as long as
    /// their `kid`'s public key isn't removed.
    pub fn rotate(&self, new_active_kid: &str) -> Result<(), ApiError> {
        let keys = TrustedKeySet::load(&self.keys_dir, new_active_kid, self.algorithm)?;
        self.keys.store(Arc::new(keys));
        Ok(())
    }

    /// Issues a new access token.
    pub fn issue(&self, claims: IssueClaims) -> Result<String, ApiError> {
        let now = Utc::now();
        let ttl = Duration::seconds(self.access_token_ttl_seconds as i64);

        let payload = Claims {
            sub: claims.user_id,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4(),
            sid: claims.session_id,
            org: claims.organization_id,
            is_superadmin: claims.is_superadmin,
            roles: claims.roles,
            permissions: claims.permissions,
            token_type: claims.token_type,
        };

        let keys = self.keys.load();
        let mut header = Header::new(keys.algorithm);
        header.kid = Some(keys.active_kid.clone());

        encode(&header, &payload, &keys.encoding_key).map_err(|e| ApiError::InternalError {
            message: format!("failed to sign access token: {e}"),
        })
    }

    /// Seconds until a freshly issued access token expires.
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds as i64
    }

    /// Verifies and decodes an access token.
    ///
    /// Fails closed on: signature invalid, expiry past, issuer/audience
    /// mismatch, unknown key id, malformed payload (§4.2).
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        let header = decode_header(token).map_err(|_| ApiError::InvalidToken)?;
        let kid = header.kid.as_deref().ok_or(ApiError::InvalidToken)?;

        let keys = self.keys.load();
        let decoding_key = keys.decoding_keys.get(kid).ok_or(ApiError::InvalidToken)?;

        let mut validation = Validation::new(keys.algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let token_data: TokenData<Claims> = decode(token, decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => ApiError::TokenExpired,
                _ => ApiError::InvalidToken,
            })?;

        Ok(token_data.claims)
    }

    /// Extracts the bearer credential from an `Authorization` header value.
    /// Expects the format: `Bearer <token>`.
    pub fn extract_from_header(auth_header: &str) -> Result<&str, ApiError> {
        auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::InvalidToken)
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::EncodeRsaPrivateKey;
    use rsa::pkcs8::EncodePublicKey;
    use rsa::RsaPrivateKey;

    /// Generates a throwaway RSA key pair and writes it into a fresh temp
    /// directory as `{kid}.priv.pem` / `{kid}.pub.pem`.
    fn write_test_keypair(dir: &Path, kid: &str) {
        let mut rng = rand::thread_rng();
        let priv_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pub_key = priv_key.to_public_key();

        let priv_pem = priv_key.to_pkcs1_pem(Default::default()).unwrap();
        let pub_pem = pub_key.to_public_key_pem(Default::default()).unwrap();

        fs::write(dir.join(format!("{kid}.priv.pem")), priv_pem.as_bytes()).unwrap();
        fs::write(dir.join(format!("{kid}.pub.pem")), pub_pem.as_bytes()).unwrap();
    }

    fn test_config(keys_dir: &Path, active_kid: &str) -> JwtConfig {
        JwtConfig {
            keys_dir: keys_dir.to_string_lossy().to_string(),
            active_kid: active_kid.to_string(),
            algorithm: JwtAlgorithm::Rs256,
            access_token_ttl_seconds: 900,
            issuer: "test-issuer".to_string(),
            audience: "test-audience".to_string(),
        }
    }

    fn issue_claims(user_id: Uuid) -> IssueClaims {
        IssueClaims {
            user_id,
            session_id: Uuid::new_v4(),
            organization_id: None,
            is_superadmin: false,
            roles: vec!["member".to_string()],
            permissions: vec!["profile:view".to_string()],
            token_type: TokenType::Access,
        }
    }

    #[test]
    fn test_issue_and_verify_access_token() {
        let dir = tempfile::tempdir().unwrap();
        write_test_keypair(dir.path(), "k1");
        let service = JwtService::new(test_config(dir.path(), "k1")).unwrap();
        let user_id = Uuid::new_v4();

        let token = service.issue(issue_claims(user_id)).unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.roles, vec!["member".to_string()]);
    }

    #[test]
    fn test_verify_rejects_unknown_kid() {
        let dir = tempfile::tempdir().unwrap();
        write_test_keypair(dir.path(), "k1");
        write_test_keypair(dir.path(), "k2");
        let service = JwtService::new(test_config(dir.path(), "k1")).unwrap();
        let token = service.issue(issue_claims(Uuid::new_v4())).unwrap();

        // Tamper: drop k1's public key so verification can't find it.
        fs::remove_file(dir.path().join("k1.pub.pem")).unwrap();
        let service2 = JwtService::new(test_config(dir.path(), "k2")).unwrap();
        assert!(matches!(service2.verify(&token), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn test_rotate_keeps_old_kid_verifiable() {
        let dir = tempfile::tempdir().unwrap();
        write_test_keypair(dir.path(), "k1");
        let service = JwtService::new(test_config(dir.path(), "k1")).unwrap();
        let old_token = service.issue(issue_claims(Uuid::new_v4())).unwrap();

        write_test_keypair(dir.path(), "k2");
        service.rotate("k2").unwrap();

        // k1's public key is still on disk, so the old token still verifies.
        assert!(service.verify(&old_token).is_ok());

        let new_token = service.issue(issue_claims(Uuid::new_v4())).unwrap();
        assert!(service.verify(&new_token).is_ok());
    }

    #[test]
    fn test_extract_from_header_valid() {
        let token = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9";
        let header = format!("Bearer {}", token);

        let extracted = JwtService::extract_from_header(&header).unwrap();
        assert_eq!(extracted, token);
    }

    #[test]
    fn test_extract_from_header_invalid() {
        let result = JwtService::extract_from_header("InvalidHeader token");
        assert!(matches!(result, Err(ApiError::InvalidToken)));
    }
}
