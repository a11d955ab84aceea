//! # Repository Layer
//!
//! Data access ports (§6 "Repository port") and their PostgreSQL
//! implementations, plus in-memory fakes for tests that don't need a
//! database.
//!
//! ## Design Decisions
//!
//! 1. **Traits, not concrete structs.** Every entity family is accessed
//!    through an `#[async_trait]` port (`UserRepository`, `SessionRepository`,
//!    ...) rather than a single concrete struct. Services depend on
//!    `Arc<dyn Trait>`. This is a deliberate departure from the upstream
//!    convention of a bare `UserRepository` struct with no trait — the
//!    spec's repository-port requirement and the need for deterministic
//!    in-memory fakes in service-level tests (C5 rotation/reuse, C6 lockout,
//!    C9 membership isolation) both require it. See `DESIGN.md` for the full
//!    rationale.
//! 2. **Atomic single-row CRUD.** Every method maps to one statement or one
//!    `RETURNING` round trip; no method does read-then-write outside of an
//!    explicit transaction.
//! 3. **Row-level locking + transactions where the spec calls for it.**
//!    [`RefreshTokenRepository::rotate`] and the OAuth2 code-exchange path
//!    run their lookup/mark-used/insert sequence inside one
//!    `sqlx::Transaction` with `SELECT ... FOR UPDATE`, per §4.5/§4.8.
//! 4. **Status transitions, not deletes.** Matches the domain layer: rows are
//!    marked revoked/suspended/cancelled, never physically removed.
//!
//! ## Module Structure
//!
//! | Module                     | Entity families                         |
//! |-----------------------------|-----------------------------------------|
//! | `user_repository`           | `User`                                  |
//! | `organization_repository`   | `Organization`                          |
//! | `membership_repository`     | `Membership`                            |
//! | `invitation_repository`     | `Invitation`                            |
//! | `rbac_repository`           | `Role`, `Permission`, `RolePermission`   |
//! | `session_repository`        | `Session`                                |
//! | `refresh_token_repository`  | `RefreshToken`                          |
//! | `oauth_repository`          | `AuthorizationCode`, `OAuthClient`      |
//! | `api_key_repository`        | `ApiKey`                                |
//! | `audit_repository`          | `FailedLoginAttempt`, `AuditRecord`     |
//! | `fake`                      | In-memory implementations of every port |
//!
//! ## Related Documentation
//!
//! - Entity definitions: [`crate::domain::entities`]
//! - Error handling: [`shared::errors`]
//! - Connection pool: [`shared::database`]

pub mod api_key_repository;
pub mod audit_repository;
pub mod fake;
pub mod invitation_repository;
pub mod membership_repository;
pub mod oauth_repository;
pub mod organization_repository;
pub mod rbac_repository;
pub mod refresh_token_repository;
pub mod session_repository;
pub mod user_repository;

pub use api_key_repository::{ApiKeyRepository, PgApiKeyRepository};
pub use audit_repository::{
    AuditRepository, FailedLoginRepository, PgAuditRepository, PgFailedLoginRepository,
};
pub use invitation_repository::{InvitationRepository, PgInvitationRepository};
pub use membership_repository::{MembershipRepository, PgMembershipRepository};
pub use oauth_repository::{
    AuthorizationCodeRepository, OAuthClientRepository, PgAuthorizationCodeRepository,
    PgOAuthClientRepository,
};
pub use organization_repository::{OrganizationRepository, PgOrganizationRepository};
pub use rbac_repository::{
    PermissionRepository, PgPermissionRepository, PgRoleRepository, RoleRepository,
};
pub use refresh_token_repository::{PgRefreshTokenRepository, RefreshTokenRepository};
pub use session_repository::{PgSessionRepository, SessionRepository};
pub use user_repository::{PgUserRepository, UserRepository};
