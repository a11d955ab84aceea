//! # Service Layer
//!
//! Orchestrates the domain + repository layers into the use cases the API
//! layer calls. Each service owns the repository ports and cross-cutting
//! primitives (JWT, password hashing, rate limiting, revocation) it needs
//! and exposes one method per use case.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          API Layer (Actix)                       │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────▼──────────────────────────────────┐
//! │                          Service Layer                          │
//! │  AuthService        - C5/C6: login, refresh, logout             │
//! │  RbacService        - C7: effective-permission resolution       │
//! │  OAuthService       - C8: authorization-code + PKCE             │
//! │  MembershipService  - C9: organizations, invitations, roles     │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────▼──────────────────────────────────┐
//! │                       Repository Layer (ports)                   │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Service Responsibilities
//!
//! | Service            | Responsibilities                                          |
//! |--------------------|------------------------------------------------------------|
//! | `AuthService`       | register, login (lockout + dummy-verify), refresh, logout |
//! | `RbacService`       | resolve effective roles/permissions for token issuance    |
//! | `OAuthService`       | /authorize, /token (code exchange + refresh grant)        |
//! | `MembershipService` | create organization, invite/accept/cancel, role CRUD      |

pub mod api_key_service;
pub mod auth_service;
pub mod membership_service;
pub mod oauth_service;
pub mod rbac_service;

pub use api_key_service::ApiKeyPrincipalResolver;
pub use auth_service::{AuthService, LoginOutcome};
pub use membership_service::MembershipService;
pub use oauth_service::OAuthService;
pub use rbac_service::RbacService;
