//! # Password Hashing with Argon2id
//!
//! Secure password storage using the Argon2id algorithm.
//!
//! ## Security Parameters (OWASP Recommended)
//!
//! | Parameter | Value | Purpose |
//! |-----------|-------|---------|
//! | Memory | 64 MiB | Makes attacks expensive (GPU memory) |
//! | Iterations | 3 | Time cost (slows brute force) |
//! | Parallelism | 4 | CPU lanes (matches typical cores) |
//! | Output | 32 bytes | Hash length |
//!
//! The PHC string produced by [`PasswordHasher::hash`] is self-describing
//! (`$argon2id$v=19$m=...,t=...,p=...$<salt>$<hash>`), which lets
//! [`PasswordHasher::needs_rehash`] detect verifiers minted under stale
//! parameters so the login path can opportunistically re-hash (§4.6 step 5).

use crate::errors::ApiError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

const MEMORY_COST_KIB: u32 = 64 * 1024;
const TIME_COST: u32 = 3;
const PARALLELISM: u32 = 4;

/// Fixed salt used only by [`PasswordHasher::dummy_verify`]. Never used for a
/// real verifier; its sole purpose is to make the "user absent" code path pay
/// the same Argon2id cost as a genuine mismatch (§4.6 step 3, §8 P5).
const DUMMY_SALT: &str = "ZHVtbXl2ZXJpZmllcnNhbHQ";

/// Secure password hashing service using Argon2id.
///
/// `Clone + Send + Sync`; each hash operation generates a fresh random salt.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher {
    /// Creates a new hasher with the current OWASP-recommended parameters.
    pub fn new() -> Self {
        let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
            .expect("Invalid Argon2 params");
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Self { argon2 }
    }

    /// Hashes a password for secure storage, returning a PHC-formatted string.
    pub fn hash(&self, password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::InternalError {
                message: format!("Password hashing failed: {}", e),
            })
    }

    /// Verifies a password against a stored PHC hash, constant-time.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, ApiError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| ApiError::InternalError {
            message: format!("Invalid password hash format: {}", e),
        })?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(ApiError::InternalError {
                message: format!("Password verification failed: {}", e),
            }),
        }
    }

    /// Runs a full Argon2id hash computation against a fixed salt and discards
    /// the result. Call this on the "user not found" / "user inactive" paths so
    /// the absent-user branch costs the same wall-clock time as a real mismatch
    /// (§4.6 step 3, §8 P5).
    pub fn dummy_verify(&self, password: &str) {
        let salt = SaltString::from_b64(DUMMY_SALT).expect("static dummy salt is valid base64");
        let _ = self.argon2.hash_password(password.as_bytes(), &salt);
    }

    /// Returns true if `hash` was produced with parameters weaker than the
    /// hasher's current configuration, signalling the caller should re-hash and
    /// persist a fresh verifier on next successful login (§4.6 step 5).
    pub fn needs_rehash(&self, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return true;
        };
        let Some(current) = parsed.params.get("m").and_then(|v| v.decimal().ok()) else {
            return true;
        };
        let Some(time) = parsed.params.get("t").and_then(|v| v.decimal().ok()) else {
            return true;
        };
        (current as u32) < MEMORY_COST_KIB || (time as u32) < TIME_COST
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

/// Validates password strength before hashing (registration, password reset).
pub struct PasswordValidator;

impl PasswordValidator {
    /// Requirements: 10+ chars, 1+ uppercase, 1+ lowercase, 1+ digit, 1+ symbol.
    pub fn validate(password: &str) -> Result<(), Vec<&'static str>> {
        let mut errors = Vec::new();

        if password.len() < 10 {
            errors.push("Password must be at least 10 characters long");
        }
        if !password.chars().any(|c| c.is_uppercase()) {
            errors.push("Password must contain at least one uppercase letter");
        }
        if !password.chars().any(|c| c.is_lowercase()) {
            errors.push("Password must contain at least one lowercase letter");
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Password must contain at least one digit");
        }
        if !password.chars().any(|c| "!@#$%^&*".contains(c)) {
            errors.push("Password must contain at least one special character (!@#$%^&*)");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_correct_password() {
        let hasher = PasswordHasher::new();
        let password = "MySecureP@ssw0rd!";
        let hash = hasher.hash(password).unwrap();
        assert_ne!(hash, password);
        assert!(hasher.verify(password, &hash).unwrap());
    }

    #[test]
    fn test_verify_wrong_password() {
        let hasher = PasswordHasher::new();
        let hash = hasher.hash("MySecureP@ssw0rd!").unwrap();
        assert!(!hasher.verify("WrongP@ssw0rd!", &hash).unwrap());
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let hasher = PasswordHasher::new();
        let password = "MySecureP@ssw0rd!";
        let hash1 = hasher.hash(password).unwrap();
        let hash2 = hasher.hash(password).unwrap();
        assert_ne!(hash1, hash2);
        assert!(hasher.verify(password, &hash1).unwrap());
        assert!(hasher.verify(password, &hash2).unwrap());
    }

    #[test]
    fn test_dummy_verify_does_not_panic_and_reports_false_ish() {
        let hasher = PasswordHasher::new();
        // Must not panic regardless of input; the result is intentionally discarded
        // by callers, so we only assert it runs to completion.
        hasher.dummy_verify("whatever the visitor typed");
    }

    #[test]
    fn test_needs_rehash_false_for_current_params() {
        let hasher = PasswordHasher::new();
        let hash = hasher.hash("TestP@ssw0rd!").unwrap();
        assert!(!hasher.needs_rehash(&hash));
    }

    #[test]
    fn test_needs_rehash_true_for_malformed_hash() {
        let hasher = PasswordHasher::new();
        assert!(hasher.needs_rehash("not-a-real-hash"));
    }

    #[test]
    fn test_password_validator_valid_password() {
        assert!(PasswordValidator::validate("MyP@ssw0rd!").is_ok());
        assert!(PasswordValidator::validate("Str0ng&Pass").is_ok());
    }

    #[test]
    fn test_password_validator_too_short() {
        let result = PasswordValidator::validate("Short1!");
        assert!(result.is_err());
        assert!(result.unwrap_err().contains(&"Password must be at least 10 characters long"));
    }

    #[test]
    fn test_password_validator_missing_uppercase() {
        let result = PasswordValidator::validate("myp@ssw0rd!");
        assert!(result.unwrap_err().contains(&"Password must contain at least one uppercase letter"));
    }

    #[test]
    fn test_password_validator_multiple_errors() {
        let result = PasswordValidator::validate("short");
        assert!(result.unwrap_err().len() > 1);
    }
}
