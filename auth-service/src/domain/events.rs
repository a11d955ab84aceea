//! # Domain Events
//!
//! Domain events represent significant state changes produced by the
//! service's components. They feed the audit log (C5/C8/C9 "emit an audit
//! event" steps) and are the hook point for out-of-scope collaborators
//! (email, analytics) — this service only ever produces them.
//!
//! ## Available Events
//!
//! | Event                      | Trigger                                    |
//! |-----------------------------|--------------------------------------------|
//! | `UserRegistered`            | New user completes registration            |
//! | `UserLoggedIn`               | Successful password/OAuth2 authentication  |
//! | `UserLoggedOut`              | Session or all-sessions revoked            |
//! | `LoginFailed`                | Failed authentication attempt (C6)         |
//! | `PasswordChanged`            | User updates password                      |
//! | `PasswordResetRequested`     | User requests a password reset             |
//! | `RefreshTokenReused`         | Reuse detected during rotation (C5 step 3) |
//! | `OrganizationCreated`        | New organization created (C9)              |
//! | `InvitationSent`             | Membership invitation issued (C9)          |
//! | `InvitationAccepted`         | Invitation accepted, membership activated  |
//! | `InvitationCancelled`        | Invitation cancelled by an actor           |
//! | `RoleChanged`                | Role created/updated (C9)                  |
//! | `OAuth2CodeExchanged`        | Authorization code exchanged for tokens    |
//!
//! ## Future Integration
//!
//! Events can be published to message queues (RabbitMQ, Kafka) for
//! asynchronous processing by other services. Current implementation
//! uses in-process handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// BASE EVENT TRAIT
// =============================================================================

/// Common interface for all domain events.
pub trait DomainEvent: Serialize + Send + Sync {
    /// Returns the event type name for routing/filtering.
    fn event_type(&self) -> &'static str;

    /// Returns when the event occurred.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Returns the aggregate ID (usually user_id or organization_id) this
    /// event relates to.
    fn aggregate_id(&self) -> Uuid;
}

// =============================================================================
// USER REGISTRATION EVENTS
// =============================================================================

/// Emitted when a new user successfully registers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: Uuid,
    pub email: String,
    pub registration_ip: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for UserRegistered {
    fn event_type(&self) -> &'static str {
        "user.registered"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

// =============================================================================
// AUTHENTICATION EVENTS
// =============================================================================

/// Emitted when a user successfully logs in (§4.6 step 8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLoggedIn {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for UserLoggedIn {
    fn event_type(&self) -> &'static str {
        "user.logged_in"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

/// Emitted when a session (or all of a user's sessions) is revoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLoggedOut {
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub all_sessions: bool,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for UserLoggedOut {
    fn event_type(&self) -> &'static str {
        "user.logged_out"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

/// Emitted when a login attempt fails (§4.6 steps 2-4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginFailed {
    pub attempted_email: String,
    pub reason: LoginFailureReason,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Reasons why a login attempt failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginFailureReason {
    /// No active user for the normalized email, or dummy-verify path taken.
    InvalidCredentials,
    /// Account locked out by the failed-login window (§4.6 step 2).
    LockedOut,
    /// Account status is suspended or deactivated.
    AccountDisabled,
}

impl DomainEvent for LoginFailed {
    fn event_type(&self) -> &'static str {
        "user.login_failed"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    /// No valid user is known in most failure paths, so the aggregate is nil.
    fn aggregate_id(&self) -> Uuid {
        Uuid::nil()
    }
}

// =============================================================================
// PASSWORD EVENTS
// =============================================================================

/// Emitted when a user's password verifier is replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordChanged {
    pub user_id: Uuid,
    pub ip_address: Option<String>,
    pub via_reset: bool,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for PasswordChanged {
    fn event_type(&self) -> &'static str {
        "user.password_changed"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

/// Emitted when a user requests a password reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetRequested {
    pub user_id: Uuid,
    pub email: String,
    pub ip_address: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for PasswordResetRequested {
    fn event_type(&self) -> &'static str {
        "user.password_reset_requested"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

// =============================================================================
// SESSION / REFRESH TOKEN EVENTS (C5, C8)
// =============================================================================

/// Emitted when refresh-token reuse is detected (§4.5 step 3): a refresh
/// token already marked `used_at` is presented again, indicating either a
/// client bug or a stolen token. The entire family is revoked in response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenReused {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub family_id: Uuid,
    pub ip_address: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for RefreshTokenReused {
    fn event_type(&self) -> &'static str {
        "refresh_token.reused"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

// =============================================================================
// ORGANIZATION / MEMBERSHIP EVENTS (C9)
// =============================================================================

/// Emitted when a new organization is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationCreated {
    pub organization_id: Uuid,
    pub slug: String,
    pub created_by: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for OrganizationCreated {
    fn event_type(&self) -> &'static str {
        "organization.created"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.organization_id
    }
}

/// Emitted when a membership invitation is sent (or resent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationSent {
    pub invitation_id: Uuid,
    pub organization_id: Uuid,
    pub invited_email: String,
    pub invited_by: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for InvitationSent {
    fn event_type(&self) -> &'static str {
        "invitation.sent"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.organization_id
    }
}

/// Emitted when an invitation is accepted and a membership activated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationAccepted {
    pub invitation_id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for InvitationAccepted {
    fn event_type(&self) -> &'static str {
        "invitation.accepted"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.organization_id
    }
}

/// Emitted when an invitation is cancelled by an actor holding
/// `invitation:cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationCancelled {
    pub invitation_id: Uuid,
    pub organization_id: Uuid,
    pub cancelled_by: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for InvitationCancelled {
    fn event_type(&self) -> &'static str {
        "invitation.cancelled"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.organization_id
    }
}

/// Emitted when a custom role is created or its permission set updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleChanged {
    pub role_id: Uuid,
    pub organization_id: Uuid,
    pub changed_by: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for RoleChanged {
    fn event_type(&self) -> &'static str {
        "role.changed"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.organization_id
    }
}

// =============================================================================
// OAUTH2 EVENTS (C8)
// =============================================================================

/// Emitted when an authorization code is exchanged for tokens (§4.8 step 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2CodeExchanged {
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub session_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for OAuth2CodeExchanged {
    fn event_type(&self) -> &'static str {
        "oauth2.code_exchanged"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

// =============================================================================
// EVENT ENVELOPE (FOR MESSAGE QUEUES)
// =============================================================================

/// Wrapper for events when publishing to message queues. Adds metadata
/// needed for reliable message delivery and processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T: DomainEvent> {
    pub event_id: Uuid,
    pub event_type: String,
    pub version: u32,
    pub correlation_id: Option<String>,
    pub payload: T,
    pub timestamp: DateTime<Utc>,
}

impl<T: DomainEvent> EventEnvelope<T> {
    pub fn new(event: T) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event.event_type().to_string(),
            version: 1,
            correlation_id: None,
            payload: event,
            timestamp: Utc::now(),
        }
    }

    pub fn with_correlation_id(event: T, correlation_id: String) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event.event_type().to_string(),
            version: 1,
            correlation_id: Some(correlation_id),
            payload: event,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_registered_event_type() {
        let event = UserRegistered {
            user_id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            registration_ip: Some("192.168.1.1".to_string()),
            occurred_at: Utc::now(),
        };

        assert_eq!(event.event_type(), "user.registered");
        assert_eq!(event.aggregate_id(), event.user_id);
    }

    #[test]
    fn test_login_failed_event_nil_aggregate() {
        let event = LoginFailed {
            attempted_email: "unknown@example.com".to_string(),
            reason: LoginFailureReason::InvalidCredentials,
            ip_address: None,
            user_agent: None,
            occurred_at: Utc::now(),
        };

        assert_eq!(event.aggregate_id(), Uuid::nil());
    }

    #[test]
    fn test_refresh_token_reused_event() {
        let event = RefreshTokenReused {
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            family_id: Uuid::new_v4(),
            ip_address: Some("10.0.0.1".to_string()),
            occurred_at: Utc::now(),
        };
        assert_eq!(event.event_type(), "refresh_token.reused");
    }

    #[test]
    fn test_event_envelope_creation() {
        let event = UserLoggedIn {
            user_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            organization_id: None,
            ip_address: Some("10.0.0.1".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
            occurred_at: Utc::now(),
        };

        let envelope = EventEnvelope::new(event.clone());

        assert_eq!(envelope.event_type, "user.logged_in");
        assert_eq!(envelope.version, 1);
        assert!(envelope.correlation_id.is_none());
        assert_eq!(envelope.payload.user_id, event.user_id);
    }

    #[test]
    fn test_event_serialization() {
        let event = PasswordChanged {
            user_id: Uuid::new_v4(),
            ip_address: Some("172.16.0.1".to_string()),
            via_reset: true,
            occurred_at: Utc::now(),
        };

        let json = serde_json::to_string(&event).expect("serialization should succeed");
        assert!(json.contains("via_reset"));
        assert!(json.contains("true"));
    }
}
