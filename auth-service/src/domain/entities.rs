//! # Domain Entities
//!
//! Core persistent business objects (§3). Entities map directly to database
//! tables; DTOs for creation carry only the fields a caller supplies, with
//! generated fields (ids, HMAC tags, timestamps) filled in by the service
//! layer before handing off to a repository.
//!
//! ## Security Considerations
//!
//! - **Never expose `password_verifier`**: use [`UserProfile`] for API responses.
//! - **Opaque credentials are never stored in plaintext**: [`Session`],
//!   [`RefreshToken`], [`Invitation`], [`AuthorizationCode`], and [`ApiKey`]
//!   all persist only an HMAC tag (`*_tag` fields) of the credential the
//!   caller holds. The pre-image is returned to the caller exactly once, at
//!   issuance, and never again (I5).
//! - **Soft deletes / status transitions**: entities are disabled via a
//!   status enum, never physically deleted, so audit history and
//!   foreign-key references remain intact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// USER
// =============================================================================

/// Account status (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Suspended,
    Deactivated,
}

/// Complete user entity as stored in the database. Globally unique by
/// lowercased email (normalized on every write). **Never expose this struct
/// directly in API responses** — use [`UserProfile`] instead.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    /// Normalized (trimmed, lowercased) email address.
    pub email: String,
    /// Argon2id PHC-format verifier. See [`shared::crypto::PasswordHasher`].
    pub password_verifier: String,
    pub status: UserStatus,
    /// Platform-wide superadmin flag (§4.7).
    pub is_superadmin: bool,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public user profile without sensitive data. Use for API responses
/// instead of [`User`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: Uuid,
    pub email: String,
    pub status: UserStatus,
    pub is_superadmin: bool,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            status: user.status,
            is_superadmin: user.is_superadmin,
            display_name: user.display_name,
            created_at: user.created_at,
        }
    }
}

/// Data required to create a new user. `password_verifier` must already be
/// hashed — never store plain passwords.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_verifier: String,
    pub display_name: Option<String>,
}

// =============================================================================
// ORGANIZATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrganizationStatus {
    Active,
    Suspended,
    Archived,
}

/// A tenant boundary. Created by a user who is immediately granted the
/// seeded *owner* role (§4.9).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Organization {
    pub organization_id: Uuid,
    /// Unique, URL-safe (validated by `valid_slug`).
    pub slug: String,
    pub name: String,
    pub status: OrganizationStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub slug: String,
    pub name: String,
    pub created_by: Uuid,
}

// =============================================================================
// PERMISSION
// =============================================================================

/// Identified by `resource:action` (I1: system permissions have
/// `organization_id = NULL`; custom permissions are owned by exactly one
/// organization). Unique by (name, organization_id).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Permission {
    pub permission_id: Uuid,
    pub name: String,
    /// `None` for system permissions (I1).
    pub organization_id: Option<Uuid>,
    pub is_system: bool,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPermission {
    pub name: String,
    pub organization_id: Option<Uuid>,
    pub description: Option<String>,
}

// =============================================================================
// ROLE
// =============================================================================

/// Either system (shared, immutable) or custom (owned by one organization).
/// Holds a many-to-many link to permissions via [`RolePermission`]. A custom
/// role may only link permissions that are system or owned by the same
/// organization (I2).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Role {
    pub role_id: Uuid,
    pub name: String,
    /// `None` for system roles (I1), e.g. the seeded `owner` role.
    pub organization_id: Option<Uuid>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub name: String,
    pub organization_id: Option<Uuid>,
}

/// A single role-permission edge (join row). Existence implies the edge
/// already passed the (I2) isolation check at creation time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Invited,
    Pending,
    Suspended,
}

/// One per (organization, user) pair (§3). Activity timestamps are
/// advisory — not used for any access decision.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Membership {
    pub membership_id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub last_active_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewMembership {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub status: MembershipStatus,
}

// =============================================================================
// INVITATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
    Cancelled,
}

/// Pending offer to join an organization at a specific role. Stores only
/// `token_tag`, the HMAC tag of the opaque invitation token (I5) — the
/// plaintext token is emailed to the invitee and never persisted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Invitation {
    pub invitation_id: Uuid,
    pub organization_id: Uuid,
    pub token_tag: String,
    /// Normalized invitee email.
    pub invited_email: String,
    pub role_id: Uuid,
    pub invited_by: Uuid,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub organization_id: Uuid,
    pub token_tag: String,
    pub invited_email: String,
    pub role_id: Uuid,
    pub invited_by: Uuid,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// SESSION
// =============================================================================

/// One logical login in a specific organization (§4.5). Stores only
/// `session_tag`, the HMAC tag of the session id (I5). Marked revoked with
/// a reason rather than deleted.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub session_id: Uuid,
    pub session_tag: String,
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_fingerprint: Option<String>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub revoked_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_tag: String,
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_fingerprint: Option<String>,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// REFRESH TOKEN
// =============================================================================

/// Bound to exactly one session. Stores only `token_tag` (I5). `family_id`
/// is shared by every rotation descended from one original; `replaced_by`
/// points at the successor once rotated. At most one row per family has
/// `used_at IS NULL AND revoked = false` (I4).
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub refresh_token_id: Uuid,
    pub token_tag: String,
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub session_id: Uuid,
    pub family_id: Uuid,
    pub replaced_by: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub token_tag: String,
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub session_id: Uuid,
    /// `None` to start a new family (initial login); `Some(existing)` to
    /// continue the lineage on rotation.
    pub family_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of [`rotate_refresh_token`](crate::repository::RefreshTokenRepository::rotate)
/// — the successor row, or the reuse signal (§4.5 step 3).
#[derive(Debug, Clone)]
pub enum RotationOutcome {
    Rotated(RefreshToken),
    /// A previously-consumed token in this family was presented again; the
    /// whole family has just been revoked as a side effect.
    ReuseDetected { family_id: Uuid, session_id: Uuid, user_id: Uuid },
    /// The presented token's row was already revoked (logout, explicit
    /// session revocation) and had never been consumed. Not a reuse signal:
    /// no further revocation side effect is taken here.
    Revoked { session_id: Uuid, user_id: Uuid },
}

// =============================================================================
// OAUTH2: AUTHORIZATION CODE
// =============================================================================

/// One-shot, short-lived (§4.8). Stores only `code_tag` (I5), plus the PKCE
/// challenge and the exact redirect URI it was issued against.
#[derive(Debug, Clone, FromRow)]
pub struct AuthorizationCode {
    pub authorization_code_id: Uuid,
    pub code_tag: String,
    pub client_id: Uuid,
    pub user_id: Uuid,
    pub redirect_uri: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub scope: String,
    pub used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuthorizationCode {
    pub code_tag: String,
    pub client_id: Uuid,
    pub user_id: Uuid,
    pub redirect_uri: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub scope: String,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// OAUTH2: CLIENT APPLICATION
// =============================================================================

/// Confidential clients hold a bcrypt-hashed secret; public clients hold
/// `None` and must use PKCE (§4.8 step 2).
#[derive(Debug, Clone, FromRow)]
pub struct OAuthClient {
    pub client_id: Uuid,
    pub name: String,
    pub secret_hash: Option<String>,
    pub redirect_uris: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOAuthClient {
    pub name: String,
    pub secret_hash: Option<String>,
    pub redirect_uris: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub allowed_scopes: Vec<String>,
    pub is_public: bool,
}

// =============================================================================
// API KEY
// =============================================================================

/// `key_id` is the public `ak_…` prefix; `secret_hash` is a separately
/// hashed secret (never the HMAC tag scheme used elsewhere, since an API
/// key's secret is re-verified on every call rather than single-shot).
#[derive(Debug, Clone, FromRow)]
pub struct ApiKey {
    pub api_key_id: Uuid,
    /// Public identifier, `ak_` + 32 hex chars (§6).
    pub key_id: String,
    pub secret_hash: String,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub key_id: String,
    pub secret_hash: String,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

// =============================================================================
// FAILED LOGIN RECORD
// =============================================================================

/// (email, IP, ua, timestamp), windowed over the lockout interval (§4.6
/// step 2). Rows older than the lockout window are ignored by the count
/// query, not actively purged.
#[derive(Debug, Clone, FromRow)]
pub struct FailedLoginAttempt {
    pub failed_login_id: Uuid,
    pub email: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFailedLoginAttempt {
    pub email: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// =============================================================================
// AUDIT RECORD
// =============================================================================

/// Append-only. Consumed by out-of-scope collaborators; this service only
/// ever produces records (§3).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_record_id: Uuid,
    pub actor_user_id: Option<Uuid>,
    pub action: String,
    pub resource: String,
    pub outcome: String,
    pub request_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditRecord {
    pub actor_user_id: Option<Uuid>,
    pub action: String,
    pub resource: String,
    pub outcome: String,
    pub request_id: Option<String>,
    pub details: Option<serde_json::Value>,
}
