//! # Authentication and Authorization Module
//!
//! This module provides token issuance/verification, principal resolution,
//! and RBAC evaluation for the identity platform's services.
//!
//! ## Module Structure
//!
//! ```text
//! auth/
//! ├── jwt.rs       - Access token codec (C2): issue, verify, key rotation
//! ├── principal.rs - Principal resolver (C4): bearer credential -> Principal
//! └── rbac.rs      - Banded RBAC evaluator (C7)
//! ```
//!
//! Password hashing lives in [`crate::crypto::password`] alongside the other
//! cryptographic primitives (opaque-token generation, HMAC tagging).
//!
//! ## Overview
//!
//! | Component | Purpose | See Also |
//! |-----------|---------|----------|
//! | [`JwtService`] | Issue and verify access tokens | [RFC 7519](https://tools.ietf.org/html/rfc7519) |
//! | [`PasswordHasher`](crate::crypto::PasswordHasher) | Argon2id password hashing | [OWASP Password Storage](https://cheatsheetseries.owasp.org/cheatsheets/Password_Storage_Cheat_Sheet.html) |
//! | [`PrincipalResolver`] | Resolve bearer credentials to a caller | Actix-web extractors |
//! | [`rbac::RbacContext`] | Evaluate banded permission checks | — |
//!
//! ## Security Implementation
//!
//! - **Short-lived access tokens** signed asymmetrically, with `kid`-based rotation
//! - **Opaque refresh tokens** with reuse detection (session/refresh store)
//! - **Argon2id password hashing** (OWASP recommended)
//! - **Banded role-based access control** (administrative / role-specific / user-facing)
//!
//! ## Token Flow
//!
//! ```text
//! ┌────────┐        ┌────────────┐        ┌────────────┐
//! │ Client │        │ Auth API   │        │ Protected  │
//! └───┬────┘        └─────┬──────┘        │    API     │
//!     │                   │               └─────┬──────┘
//!     │ POST /login       │                     │
//!     │ (email, password) │                     │
//!     │──────────────────>│                     │
//!     │                   │                     │
//!     │ {access_token,    │                     │
//!     │  refresh_token}   │                     │
//!     │<──────────────────│                     │
//!     │                   │                     │
//!     │ GET /resource     │                     │
//!     │ Authorization:    │                     │
//!     │ Bearer <access>   │                     │
//!     │────────────────────────────────────────>│
//!     │                   │                     │
//!     │ 200 OK {data}     │                     │
//!     │<────────────────────────────────────────│
//!     │                   │                     │
//!     │ (after TTL)       │                     │
//!     │ POST /token/refresh                     │
//!     │ (refresh_token)   │                     │
//!     │──────────────────>│                     │
//!     │                   │                     │
//!     │ {new access_token,│                     │
//!     │  new refresh}     │                     │
//!     │<──────────────────│                     │
//! ```
//!
//! ## Related Documentation
//!
//! - [`crate::config::JwtConfig`] - Key material and algorithm configuration
//! - [`crate::revocation`] - Revocation index consulted by [`PrincipalResolver`]

pub mod jwt;
pub mod principal;
pub mod rbac;

// Re-export main types for convenient access
pub use jwt::{Claims, IssueClaims, JwtService, TokenType};
pub use principal::{ApiKeyLookup, Principal, PrincipalResolver};
pub use rbac::{PermissionBand, RbacContext};
