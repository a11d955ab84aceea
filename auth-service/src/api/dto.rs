//! # Data Transfer Objects (DTOs)
//!
//! DTOs define the structure of data transferred between client and server.
//! They serve as the **API contract** and handle:
//!
//! - **Request validation**: Using the `validator` crate
//! - **Deserialization**: JSON → Rust structs via `serde`
//! - **Serialization**: Rust structs → JSON for responses
//!
//! ## JSON Naming Convention
//!
//! All DTOs use `camelCase` for JSON serialization to match JavaScript
//! conventions on the frontend.
//!
//! ## Related Documentation
//!
//! - Validation module: [`shared::validation`]
//! - API handlers: [`super::handlers`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::{Invitation, Membership, Organization, Permission, Role, User};
use crate::service::auth_service::TokenBundle;
use crate::service::membership_service::IssuedInvitation;
use crate::service::oauth_service::IssuedAuthorizationCode;

// =============================================================================
// REGISTRATION / LOGIN / REFRESH / LOGOUT
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 255, message = "Email too long"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "Display name too long"))]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    /// Scopes the session to this organization directly, skipping
    /// membership enumeration (§4.6 step 6).
    pub organization_id: Option<Uuid>,

    pub device_fingerprint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Bearer/session bundle returned on successful login, refresh, or OAuth2
/// code exchange.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponseDto {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub session_id: Uuid,
}

impl From<TokenBundle> for TokenResponseDto {
    fn from(bundle: TokenBundle) -> Self {
        Self {
            access_token: bundle.access_token,
            refresh_token: bundle.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: bundle.access_token_expires_in,
            session_id: bundle.session_id,
        }
    }
}

/// `POST /login`'s response: either a fresh token bundle, or a prompt to
/// disambiguate the organization when the principal belongs to more than
/// one (§4.6 step 6).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LoginResponseDto {
    Tokens(TokenResponseDto),
    OrganizationChoiceRequired(OrganizationChoiceRequiredDto),
}

/// Returned in place of [`TokenResponseDto`] when a principal belongs to
/// more than one organization and didn't supply `organizationId` (§4.6
/// step 6) — the caller must retry with one of the listed ids.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationChoiceRequiredDto {
    pub organization_ids: Vec<Uuid>,
}

/// Safe user projection (never the password verifier) returned by
/// registration and the `/me` endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub is_superadmin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            display_name: user.display_name,
            is_superadmin: user.is_superadmin,
            created_at: user.created_at,
        }
    }
}

// =============================================================================
// ORGANIZATIONS
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 63, message = "Slug must be 1-63 characters"))]
    pub slug: String,

    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationDto {
    pub organization_id: Uuid,
    pub slug: String,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Organization> for OrganizationDto {
    fn from(org: Organization) -> Self {
        Self {
            organization_id: org.organization_id,
            slug: org.slug,
            name: org.name,
            status: format!("{:?}", org.status).to_lowercase(),
            created_at: org.created_at,
        }
    }
}

// =============================================================================
// MEMBERSHIPS
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipDto {
    pub membership_id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub status: String,
}

impl From<Membership> for MembershipDto {
    fn from(membership: Membership) -> Self {
        Self {
            membership_id: membership.membership_id,
            organization_id: membership.organization_id,
            user_id: membership.user_id,
            role_id: membership.role_id,
            status: format!("{:?}", membership.status).to_lowercase(),
        }
    }
}

// =============================================================================
// INVITATIONS
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    #[validate(email(message = "Invalid email format"))]
    pub invited_email: String,
    pub role_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInvitationRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

/// An invitation together with its one-time plaintext token. Only returned
/// once, at issuance/resend time — subsequent reads of the invitation never
/// include it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedInvitationDto {
    pub invitation_id: Uuid,
    pub organization_id: Uuid,
    pub invited_email: String,
    pub role_id: Uuid,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub token: String,
}

impl From<IssuedInvitation> for IssuedInvitationDto {
    fn from(issued: IssuedInvitation) -> Self {
        let invitation: Invitation = issued.invitation;
        Self {
            invitation_id: invitation.invitation_id,
            organization_id: invitation.organization_id,
            invited_email: invitation.invited_email,
            role_id: invitation.role_id,
            status: format!("{:?}", invitation.status).to_lowercase(),
            expires_at: invitation.expires_at,
            token: issued.token,
        }
    }
}

// =============================================================================
// ROLES / PERMISSIONS
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDto {
    pub role_id: Uuid,
    pub name: String,
    pub organization_id: Option<Uuid>,
    pub is_system: bool,
}

impl From<Role> for RoleDto {
    fn from(role: Role) -> Self {
        Self {
            role_id: role.role_id,
            name: role.name,
            organization_id: role.organization_id,
            is_system: role.is_system,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDto {
    pub permission_id: Uuid,
    pub name: String,
    pub organization_id: Option<Uuid>,
    pub is_system: bool,
}

impl From<Permission> for PermissionDto {
    fn from(permission: Permission) -> Self {
        Self {
            permission_id: permission.permission_id,
            name: permission.name,
            organization_id: permission.organization_id,
            is_system: permission.is_system,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LinkPermissionRequest {
    pub permission_id: Uuid,
}

// =============================================================================
// OAUTH2
// =============================================================================

/// Query string for `GET /oauth2/authorize` (§4.8).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeQuery {
    pub client_id: Uuid,
    pub redirect_uri: String,
    pub scope: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    /// Opaque caller value, echoed back unmodified and never persisted.
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponseDto {
    pub code: String,
    pub redirect_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl AuthorizeResponseDto {
    pub fn from_issued(issued: IssuedAuthorizationCode, state: Option<String>) -> Self {
        Self { code: issued.code, redirect_uri: issued.redirect_uri, state }
    }
}

/// Body for `POST /oauth2/token`. `grant_type` dispatches between the
/// code-exchange and refresh grants (§4.8); form-encoded per RFC 6749.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: Option<Uuid>,
    pub client_secret: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
}

// =============================================================================
// MISC RESPONSES
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_register_request_valid() {
        let request = RegisterRequest {
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
            display_name: Some("Test".to_string()),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_register_request_invalid_email() {
        let request = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "password123".to_string(),
            display_name: None,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_register_request_short_password() {
        let request = RegisterRequest {
            email: "test@example.com".to_string(),
            password: "short".to_string(),
            display_name: None,
        };
        let result = request.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().field_errors().contains_key("password"));
    }

    #[test]
    fn test_create_organization_request_rejects_empty_slug() {
        let request = CreateOrganizationRequest { slug: "".to_string(), name: "Acme".to_string() };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_message_response_new() {
        let response = MessageResponse::new("Test message");
        assert_eq!(response.message, "Test message");
    }

    #[test]
    fn test_json_serialization_camel_case() {
        let response = MessageResponse::new("Hello");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("message"));
    }
}
