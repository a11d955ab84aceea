//! # Opaque token generation
//!
//! Sessions, refresh tokens, invitations, authorization codes, password-reset
//! tokens, and API-key secrets are all represented to callers as a random
//! opaque string and persisted only as an HMAC tag (see [`crate::crypto::hmac`]).
//! This module generates the pre-image (§4.1, §6 "Persisted token tags").

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

/// Minimum entropy, in bytes, for any opaque token this service issues.
pub const MIN_TOKEN_BYTES: usize = 32;

/// Generates a CSPRNG opaque token of `bytes` random bytes, URL-safe
/// base64 encoded. Panics if `bytes < MIN_TOKEN_BYTES`; every call site in
/// this codebase is expected to pass a fixed, compile-time constant.
pub fn generate_opaque_token(bytes: usize) -> String {
    assert!(
        bytes >= MIN_TOKEN_BYTES,
        "opaque tokens must carry at least {MIN_TOKEN_BYTES} bytes of entropy"
    );
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Generates a 32-byte opaque token, the default used for sessions, refresh
/// tokens, invitations, authorization codes, and password-reset tokens.
pub fn generate_default_token() -> String {
    generate_opaque_token(MIN_TOKEN_BYTES)
}

/// Generates a PKCE code verifier: 32 random bytes, URL-safe base64, which
/// yields the 43-character length RFC 7636 recommends.
pub fn generate_pkce_verifier() -> String {
    generate_opaque_token(MIN_TOKEN_BYTES)
}

/// Computes the S256 PKCE code challenge for a given verifier:
/// `BASE64URL-ENCODE(SHA256(verifier))`.
pub fn pkce_challenge_s256(verifier: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_default_token_length_and_charset() {
        let token = generate_default_token();
        assert!(URL_SAFE_NO_PAD.decode(&token).unwrap().len() == MIN_TOKEN_BYTES);
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
        assert!(!token.contains('='));
    }

    #[test]
    fn test_generate_default_token_is_random() {
        assert_ne!(generate_default_token(), generate_default_token());
    }

    #[test]
    #[should_panic]
    fn test_generate_opaque_token_rejects_low_entropy() {
        generate_opaque_token(8);
    }

    #[test]
    fn test_pkce_challenge_is_deterministic() {
        let verifier = generate_pkce_verifier();
        assert_eq!(pkce_challenge_s256(&verifier), pkce_challenge_s256(&verifier));
    }

    #[test]
    fn test_pkce_challenge_differs_from_verifier() {
        let verifier = generate_pkce_verifier();
        assert_ne!(pkce_challenge_s256(&verifier), verifier);
    }
}
