//! # Domain Layer
//!
//! The domain layer contains the core business entities and domain events
//! for the authentication service. This layer is **framework-agnostic** and
//! represents the heart of the business logic.
//!
//! ## Clean Architecture Principles
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                         Domain Layer                              │
//! │  ┌─────────────────────────────────────────────────────────────┐  │
//! │  │                       Entities                              │  │
//! │  │  - User, Organization, Membership, Invitation               │  │
//! │  │  - Role, Permission, RolePermission                         │  │
//! │  │  - Session, RefreshToken (family_id/replaced_by lineage)    │  │
//! │  │  - AuthorizationCode, OAuthClient, ApiKey                   │  │
//! │  │  - FailedLoginAttempt, AuditRecord                          │  │
//! │  └─────────────────────────────────────────────────────────────┘  │
//! │                                                                   │
//! │  ┌─────────────────────────────────────────────────────────────┐  │
//! │  │                     Domain Events                           │  │
//! │  │  - UserRegistered, UserLoggedIn, UserLoggedOut              │  │
//! │  │  - LoginFailed, RefreshTokenReused                          │  │
//! │  │  - OrganizationCreated, InvitationSent/Accepted/Cancelled   │  │
//! │  └─────────────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! | Module     | Purpose                                           |
//! |------------|---------------------------------------------------|
//! | `entities` | Core domain entities mapped to database tables    |
//! | `events`   | Domain events for event-driven architecture       |
//!
//! ## Design Decisions
//!
//! 1. **Entities vs DTOs**: Domain entities contain all database fields,
//!    while separate DTOs in the API layer handle request/response transformation.
//!
//! 2. **`FromRow` Derive**: Entities use sqlx's `FromRow` for automatic
//!    mapping from database rows, reducing boilerplate.
//!
//! 3. **Soft Deletes**: The `deleted_at` field enables soft deletion,
//!    preserving data for audit trails.
//!
//! ## Related Documentation
//!
//! - Database schema: `_docs/architecture/database-architecture.md`
//! - User stories: `_docs/business/user-stories.md`

pub mod entities;
pub mod events;

pub use entities::*;
