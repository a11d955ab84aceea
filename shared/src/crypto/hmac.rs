//! # HMAC tagging of opaque tokens
//!
//! Every opaque token this service hands out (session id, refresh token,
//! invitation token, authorization code, password-reset token, API-key
//! secret) is persisted only as `HMAC-SHA256(server_secret, token)`,
//! URL-safe base64 encoded (§6 "Persisted token tags"). The pre-image is
//! returned to the caller exactly once and never stored (§3 I5).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Computes the persisted tag for an opaque token under the configured server
/// secret. Returns URL-safe, unpadded base64.
pub fn hmac_tag(server_secret: &[u8], plaintext: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(server_secret).expect("HMAC accepts any key length");
    mac.update(plaintext.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

/// Constant-time equality check over two byte strings. Used for PKCE
/// verifier comparison, API-key secret comparison, and anywhere else a
/// secret-dependent branch would otherwise leak timing information.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_tag_deterministic() {
        let secret = b"server-secret";
        let tag1 = hmac_tag(secret, "opaque-token-value");
        let tag2 = hmac_tag(secret, "opaque-token-value");
        assert_eq!(tag1, tag2);
    }

    #[test]
    fn test_hmac_tag_differs_by_secret() {
        let tag1 = hmac_tag(b"secret-a", "same-token");
        let tag2 = hmac_tag(b"secret-b", "same-token");
        assert_ne!(tag1, tag2);
    }

    #[test]
    fn test_hmac_tag_differs_by_plaintext() {
        let secret = b"server-secret";
        assert_ne!(hmac_tag(secret, "token-one"), hmac_tag(secret, "token-two"));
    }

    #[test]
    fn test_hmac_tag_is_url_safe_no_pad() {
        let tag = hmac_tag(b"secret", "value");
        assert!(!tag.contains('+'));
        assert!(!tag.contains('/'));
        assert!(!tag.contains('='));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
