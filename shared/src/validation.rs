//! # Request Validation Helpers
//!
//! Utilities for validating incoming request data using the `validator` crate.
//!
//! ## Overview
//!
//! This module provides:
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`validate_request`] | Validate a struct implementing `Validate` |
//! | [`parse_and_validate`] | Parse JSON and validate in one step |
//! | [`validators`] | Custom validation functions |
//!
//! ## How Validation Works
//!
//! We use the [`validator`](https://docs.rs/validator/) crate which provides
//! derive macros for declarative validation:
//!
//! ```rust,ignore
//! use validator::Validate;
//!
//! #[derive(Validate)]
//! struct CreateUser {
//!     #[validate(email)]
//!     email: String,
//!     
//!     #[validate(length(min = 10))]
//!     password: String,
//!     
//!     #[validate(custom(function = "validators::not_blank"))]
//!     name: String,
//! }
//! ```
//!
//! ## Validation Flow
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌──────────────┐
//! │ JSON Request │────►│ Deserialize   │────►│   Validate   │
//! │              │     │ (serde)       │     │  (validator) │
//! └──────────────┘     └───────────────┘     └──────┬───────┘
//!                                                   │
//!         ┌─────────────────────────────────────────┴───────┐
//!         │                                                 │
//!         ▼                                                 ▼
//! ┌───────────────┐                               ┌─────────────────┐
//! │   Success     │                               │ ValidationError │
//! │ (continue)    │                               │   (400 + details)│
//! └───────────────┘                               └─────────────────┘
//! ```
//!
//! ## Error Response Format
//!
//! When validation fails, the API returns a 400 Bad Request with details:
//!
//! ```json
//! {
//!   "code": "VALIDATION_ERROR",
//!   "message": "Validation error",
//!   "details": {
//!     "email": [
//!       { "code": "email", "message": "Invalid email format" }
//!     ],
//!     "password": [
//!       { "code": "length", "message": "Must be at least 10 characters" }
//!     ]
//!   }
//! }
//! ```
//!
//! ## Custom Validators
//!
//! The [`validators`] module provides common validation functions:
//!
//! | Validator | Purpose |
//! |-----------|---------|
//! | `not_blank` | String is not empty after trimming |
//! | `valid_slug` | Lowercase, hyphen-separated identifier (organization slugs) |
//! | `valid_permission_name` | `resource:action` shape used by RBAC (C7) |
//! | `valid_api_key_prefix` | `ak_` + 32 lowercase hex chars (§6) |
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use shared::validation::{validate_request, validators};
//! use validator::Validate;
//!
//! #[derive(Validate)]
//! struct CreatePermission {
//!     #[validate(custom(function = "validators::valid_permission_name"))]
//!     name: String,
//! }
//!
//! #[derive(Validate)]
//! struct CreateOrganization {
//!     #[validate(custom(function = "validators::valid_slug"))]
//!     slug: String,
//! }
//!
//! async fn handler(body: Json<CreatePermission>) -> Result<impl Responder, ApiError> {
//!     validate_request(&body)?;
//!     // Validation passed, continue...
//! }
//! ```
//!
//! ## Related Documentation
//!
//! - [`validator` crate](https://docs.rs/validator/)
//! - [`crate::errors::ApiError`] - Error handling
//! - [`_docs/development/development-standards.md`] - Validation guidelines

use crate::errors::ApiError;
use serde::de::DeserializeOwned;
use validator::Validate;

// =============================================================================
// Core Validation Functions
// =============================================================================

/// Validates a request DTO that implements `Validate`.
///
/// This is the primary validation function. Use it in handlers to
/// validate incoming data.
///
/// ## Example
///
/// ```rust,ignore
/// async fn create_user(body: Json<CreateUserDto>) -> Result<impl Responder, ApiError> {
///     validate_request(&body)?;  // Returns early if invalid
///     
///     // Continue with validated data
/// }
/// ```
///
/// ## Errors
///
/// Returns `ApiError::ValidationError` with field-level details if validation fails.
pub fn validate_request<T: Validate>(data: &T) -> Result<(), ApiError> {
    data.validate().map_err(ApiError::ValidationError)
}

/// Parses JSON string and validates in a single step.
///
/// Useful when you have raw JSON and need to parse + validate.
///
/// ## Example
///
/// ```rust,ignore
/// let json = r#"{"email": "user@example.com", "password": "secret"}"#;
/// let user: CreateUserDto = parse_and_validate(json)?;
/// ```
///
/// ## Errors
///
/// - `ApiError::BadRequest` if JSON parsing fails
/// - `ApiError::ValidationError` if validation fails
pub fn parse_and_validate<T: DeserializeOwned + Validate>(json: &str) -> Result<T, ApiError> {
    // Parse JSON
    let data: T = serde_json::from_str(json)
        .map_err(|e| ApiError::BadRequest { message: e.to_string() })?;

    // Validate
    validate_request(&data)?;

    Ok(data)
}

// =============================================================================
// Custom Validators
// =============================================================================

/// Custom validation functions for use with `#[validate(custom)]`.
///
/// These functions follow the validator crate's signature:
/// `fn(&T) -> Result<(), ValidationError>`
///
/// ## Usage
///
/// ```rust,ignore
/// use validator::Validate;
/// use shared::validation::validators;
///
/// #[derive(Validate)]
/// struct MyStruct {
///     #[validate(custom(function = "validators::not_blank"))]
///     name: String,
/// }
/// ```
pub mod validators {
    use validator::ValidationError;

    /// Validates that a string is not blank (empty or whitespace-only).
    ///
    /// ## Valid Values
    ///
    /// - `"hello"` ✓
    /// - `"  hello  "` ✓ (has content)
    ///
    /// ## Invalid Values
    ///
    /// - `""` ✗
    /// - `"   "` ✗ (whitespace only)
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new("blank"));
        }
        Ok(())
    }

    /// Validates a URL-safe slug format.
    ///
    /// ## Rules
    ///
    /// - Only lowercase letters, digits, and hyphens
    /// - Cannot start or end with hyphen
    /// - No consecutive hyphens
    ///
    /// ## Valid Examples
    ///
    /// - `"my-org"` ✓
    /// - `"acme-corp-2024"` ✓
    /// - `"a-b-c"` ✓
    ///
    /// ## Invalid Examples
    ///
    /// - `"My-Org"` ✗ (uppercase)
    /// - `"-invalid"` ✗ (starts with hyphen)
    /// - `"invalid-"` ✗ (ends with hyphen)
    /// - `"in--valid"` ✗ (double hyphen)
    /// - `"my_org"` ✗ (underscore not allowed)
    pub fn valid_slug(value: &str) -> Result<(), ValidationError> {
        // Check for valid characters
        if !value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            return Err(ValidationError::new("invalid_slug"));
        }

        // Cannot start or end with hyphen
        if value.starts_with('-') || value.ends_with('-') {
            return Err(ValidationError::new("invalid_slug"));
        }

        // No consecutive hyphens
        if value.contains("--") {
            return Err(ValidationError::new("invalid_slug"));
        }

        Ok(())
    }

    /// Validates a permission name's `resource:action` shape (§4.7, §6).
    ///
    /// Both halves must be non-empty, lowercase ASCII, digits, or
    /// underscores, with exactly one colon separating them.
    ///
    /// ## Valid Examples
    ///
    /// - `"profile:view"` ✓
    /// - `"organizations:delete"` ✓
    /// - `"admin:dashboard"` ✓
    ///
    /// ## Invalid Examples
    ///
    /// - `"profileview"` ✗ (no colon)
    /// - `"profile:view:extra"` ✗ (more than one colon)
    /// - `"Profile:View"` ✗ (uppercase)
    /// - `":view"` ✗ (empty resource)
    pub fn valid_permission_name(value: &str) -> Result<(), ValidationError> {
        let Some((resource, action)) = value.split_once(':') else {
            return Err(ValidationError::new("invalid_permission_name"));
        };
        if action.contains(':') {
            return Err(ValidationError::new("invalid_permission_name"));
        }
        let is_valid_segment = |s: &str| {
            !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        };
        if !is_valid_segment(resource) || !is_valid_segment(action) {
            return Err(ValidationError::new("invalid_permission_name"));
        }
        Ok(())
    }

    /// Validates an API key's public prefix shape: `ak_` followed by 32
    /// lowercase hex characters (§6). Only the prefix is ever stored or
    /// logged in cleartext; the secret half is hashed (C1 `hmac_tag`).
    ///
    /// ## Valid Examples
    ///
    /// - `"ak_0123456789abcdef0123456789abcdef"` ✓
    ///
    /// ## Invalid Examples
    ///
    /// - `"0123456789abcdef0123456789abcdef"` ✗ (missing `ak_` prefix)
    /// - `"ak_ABCDEF0123456789ABCDEF0123456789"` ✗ (uppercase hex)
    /// - `"ak_tooshort"` ✗ (wrong length)
    pub fn valid_api_key_prefix(value: &str) -> Result<(), ValidationError> {
        let Some(hex) = value.strip_prefix("ak_") else {
            return Err(ValidationError::new("invalid_api_key_prefix"));
        };
        if hex.len() != 32 || !hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
            return Err(ValidationError::new("invalid_api_key_prefix"));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::validators::*;

    #[test]
    fn test_not_blank_valid() {
        assert!(not_blank("hello").is_ok());
        assert!(not_blank("  hello  ").is_ok());
        assert!(not_blank("a").is_ok());
    }

    #[test]
    fn test_not_blank_invalid() {
        assert!(not_blank("").is_err());
        assert!(not_blank("   ").is_err());
        assert!(not_blank("\t\n").is_err());
    }

    #[test]
    fn test_valid_slug_valid() {
        assert!(valid_slug("my-org").is_ok());
        assert!(valid_slug("acme-corp-2024").is_ok());
        assert!(valid_slug("a-b-c").is_ok());
        assert!(valid_slug("plainslug").is_ok());
    }

    #[test]
    fn test_valid_slug_invalid() {
        assert!(valid_slug("My-Org").is_err());
        assert!(valid_slug("-invalid").is_err());
        assert!(valid_slug("invalid-").is_err());
        assert!(valid_slug("in--valid").is_err());
        assert!(valid_slug("my_org").is_err());
    }

    #[test]
    fn test_valid_permission_name_valid() {
        assert!(valid_permission_name("profile:view").is_ok());
        assert!(valid_permission_name("organizations:delete").is_ok());
        assert!(valid_permission_name("admin:dashboard").is_ok());
        assert!(valid_permission_name("api_keys:create").is_ok());
    }

    #[test]
    fn test_valid_permission_name_invalid_missing_colon() {
        assert!(valid_permission_name("profileview").is_err());
    }

    #[test]
    fn test_valid_permission_name_invalid_extra_colon() {
        assert!(valid_permission_name("profile:view:extra").is_err());
    }

    #[test]
    fn test_valid_permission_name_invalid_uppercase() {
        assert!(valid_permission_name("Profile:View").is_err());
    }

    #[test]
    fn test_valid_permission_name_invalid_empty_segment() {
        assert!(valid_permission_name(":view").is_err());
        assert!(valid_permission_name("profile:").is_err());
    }

    #[test]
    fn test_valid_api_key_prefix_valid() {
        assert!(valid_api_key_prefix("ak_0123456789abcdef0123456789abcdef").is_ok());
    }

    #[test]
    fn test_valid_api_key_prefix_invalid_missing_prefix() {
        assert!(valid_api_key_prefix("0123456789abcdef0123456789abcdef").is_err());
    }

    #[test]
    fn test_valid_api_key_prefix_invalid_uppercase() {
        assert!(valid_api_key_prefix("ak_ABCDEF0123456789ABCDEF0123456789").is_err());
    }

    #[test]
    fn test_valid_api_key_prefix_invalid_length() {
        assert!(valid_api_key_prefix("ak_tooshort").is_err());
    }
}

