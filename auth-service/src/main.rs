//! # Auth Service
//!
//! The **auth-service** is the HTTP front door for this workspace's
//! multi-tenant identity and access system: user registration and
//! password login (C6), session/refresh lifecycle (C5), RBAC-scoped
//! organizations/memberships/invitations (C7/C9), and an OAuth2
//! authorization-code + PKCE engine (C8) for third-party clients.
//!
//! ## Architecture Overview
//!
//! This service follows **Clean Architecture** principles with clear
//! separation between layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        HTTP Layer (api/)                        │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐ │
//! │  │   routes    │  │  handlers   │  │    DTOs (Request/Res)   │ │
//! │  └──────┬──────┘  └──────┬──────┘  └────────────┬────────────┘ │
//! └─────────┼────────────────┼─────────────────────┼───────────────┘
//!           │                │                      │
//!           ▼                ▼                      ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Service Layer (service/)                     │
//! │  AuthService (C5/C6) · RbacService (C7) · MembershipService (C9) │
//! │  OAuthService (C8) · ApiKeyPrincipalResolver (C4 port)           │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Repository Layer (repository/)                 │
//! │  One `#[async_trait]` port per entity family, Postgres-backed    │
//! └─────────────────────────────┬───────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Domain Layer (domain/)                       │
//! │  Entities, status enums, domain events                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## API Endpoints
//!
//! See [`api`] for the full route table. Every protected route resolves
//! its caller through [`shared::auth::principal::PrincipalResolver`] inside
//! the handler — there is no separate auth middleware layer (§4.4).
//!
//! ## Security Features
//!
//! - **Password Hashing**: Argon2id via [`shared::crypto::password`]
//! - **Asymmetric JWS**: RS256/ES256 access tokens with `kid` rotation (C2)
//! - **Refresh reuse detection**: lineage tracking burns the whole family
//!   on replay (C5)
//! - **Rate limiting**: per-scope sliding counters backed by Redis (C3)
//! - **Revocation index**: Redis-backed session/family/user/org scoping (C10)
//!
//! ## Configuration
//!
//! Environment variables are loaded via [`shared::config::AppConfig`].
//!
//! ## Related Documentation
//!
//! - Token codec: [`shared::auth::jwt`]
//! - Principal resolution: [`shared::auth::principal`]
//! - RBAC bands: [`shared::auth::rbac`]

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use shared::{
    auth::{jwt::JwtService, principal::PrincipalResolver},
    config::AppConfig,
    crypto::password::PasswordHasher,
    database,
    kv::KvStore,
    rate_limit::RateLimiter,
    redis_client::RedisClient,
    revocation::RevocationIndex,
    tracing_config,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod api;
mod domain;
mod repository;
mod service;

use api::routes;
use repository::{
    ApiKeyRepository, AuditRepository, AuthorizationCodeRepository, FailedLoginRepository,
    InvitationRepository, MembershipRepository, OAuthClientRepository, OrganizationRepository,
    PermissionRepository, PgApiKeyRepository, PgAuditRepository, PgAuthorizationCodeRepository,
    PgFailedLoginRepository, PgInvitationRepository, PgMembershipRepository,
    PgOAuthClientRepository, PgOrganizationRepository, PgPermissionRepository,
    PgRefreshTokenRepository, PgRoleRepository, PgSessionRepository, PgUserRepository,
    RefreshTokenRepository, RoleRepository, SessionRepository, UserRepository,
};
use service::{ApiKeyPrincipalResolver, AuthService, MembershipService, OAuthService, RbacService};

/// Cleanup cadence for expired/inactive session and refresh-token eviction
/// (§4.5 "Cleanup"). Runs independently of request traffic.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Spawns the background job that evicts expired sessions/refresh tokens
/// and sessions idle past `max_inactive_seconds` (§4.5 "Cleanup"). Detached:
/// the service's liveness doesn't depend on this loop, so failures are
/// logged and the loop continues rather than panicking the process.
fn spawn_cleanup_job(
    session_repository: Arc<dyn SessionRepository>,
    refresh_token_repository: Arc<dyn RefreshTokenRepository>,
    max_inactive_seconds: u64,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;

            match session_repository.evict_expired().await {
                Ok(n) => info!(evicted = n, "cleanup: evicted expired sessions"),
                Err(err) => warn!(error = %err, "cleanup: failed to evict expired sessions"),
            }

            match session_repository.evict_inactive(max_inactive_seconds as i64).await {
                Ok(n) => info!(evicted = n, "cleanup: evicted inactive sessions"),
                Err(err) => warn!(error = %err, "cleanup: failed to evict inactive sessions"),
            }

            match refresh_token_repository.evict_expired().await {
                Ok(n) => info!(evicted = n, "cleanup: evicted expired refresh tokens"),
                Err(err) => warn!(error = %err, "cleanup: failed to evict expired refresh tokens"),
            }
        }
    });
}

/// Shared application state injected into all request handlers.
///
/// Wrapped in [`actix_web::web::Data`] and made available to every handler
/// via extractor pattern. Each field is `Arc`-wrapped for cheap cloning
/// across worker threads.
pub struct AppState {
    pub principal_resolver: Arc<PrincipalResolver>,
    pub auth_service: Arc<AuthService>,
    pub membership_service: Arc<MembershipService>,
    pub oauth_service: Arc<OAuthService>,
    pub user_repository: Arc<dyn UserRepository>,
}

/// Application entry point and server initialization.
///
/// # Initialization Sequence
///
/// 1. Load configuration from environment variables
/// 2. Initialize structured logging/tracing
/// 3. Create PostgreSQL connection pool and Redis client
/// 4. Construct repositories, then the services that depend on them
/// 5. Configure and start the HTTP server
///
/// # Error Handling
///
/// Uses `expect()` for initialization errors that should prevent the
/// service from starting (fail-fast).
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // ─────────────────────────────────────────────────────────────────────
    // Step 1: Load configuration from environment
    // ─────────────────────────────────────────────────────────────────────
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // ─────────────────────────────────────────────────────────────────────
    // Step 2: Initialize structured logging
    // ─────────────────────────────────────────────────────────────────────
    tracing_config::init_tracing(&config.service_name, config.is_production());

    info!(
        service = %config.service_name,
        host = %config.server.host,
        port = %config.server.port,
        "Starting auth-service"
    );

    // ─────────────────────────────────────────────────────────────────────
    // Step 3: Create PostgreSQL connection pool and Redis client
    // ─────────────────────────────────────────────────────────────────────
    let db_pool = database::create_pool(&config.database)
        .await
        .expect("Failed to create database pool");

    let redis_client: Arc<dyn KvStore> = Arc::new(
        RedisClient::new(&config.redis)
            .await
            .expect("Failed to connect to Redis"),
    );

    // ─────────────────────────────────────────────────────────────────────
    // Step 4: Construct repositories
    // ─────────────────────────────────────────────────────────────────────
    let user_repository: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(db_pool.clone()));
    let session_repository: Arc<dyn SessionRepository> = Arc::new(PgSessionRepository::new(db_pool.clone()));
    let refresh_token_repository: Arc<dyn RefreshTokenRepository> =
        Arc::new(PgRefreshTokenRepository::new(db_pool.clone()));
    let failed_login_repository: Arc<dyn FailedLoginRepository> =
        Arc::new(PgFailedLoginRepository::new(db_pool.clone()));
    let audit_repository: Arc<dyn AuditRepository> = Arc::new(PgAuditRepository::new(db_pool.clone()));
    let organization_repository: Arc<dyn OrganizationRepository> =
        Arc::new(PgOrganizationRepository::new(db_pool.clone()));
    let membership_repository: Arc<dyn MembershipRepository> =
        Arc::new(PgMembershipRepository::new(db_pool.clone()));
    let invitation_repository: Arc<dyn InvitationRepository> =
        Arc::new(PgInvitationRepository::new(db_pool.clone()));
    let role_repository: Arc<dyn RoleRepository> = Arc::new(PgRoleRepository::new(db_pool.clone()));
    let permission_repository: Arc<dyn PermissionRepository> =
        Arc::new(PgPermissionRepository::new(db_pool.clone()));
    let oauth_client_repository: Arc<dyn OAuthClientRepository> =
        Arc::new(PgOAuthClientRepository::new(db_pool.clone()));
    let authorization_code_repository: Arc<dyn AuthorizationCodeRepository> =
        Arc::new(PgAuthorizationCodeRepository::new(db_pool.clone()));
    let api_key_repository: Arc<dyn ApiKeyRepository> = Arc::new(PgApiKeyRepository::new(db_pool.clone()));

    // ─────────────────────────────────────────────────────────────────────
    // Step 5: Construct cross-cutting primitives and services
    // ─────────────────────────────────────────────────────────────────────
    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()).expect("Failed to load JWT key material"));
    let password_hasher = Arc::new(PasswordHasher::new());
    let rate_limiter = Arc::new(RateLimiter::new(redis_client.clone(), config.rate_limit.fail_open));
    let revocation_index = Arc::new(RevocationIndex::new(redis_client.clone()));

    let rbac_service = Arc::new(RbacService::new(membership_repository.clone(), role_repository.clone()));

    spawn_cleanup_job(session_repository.clone(), refresh_token_repository.clone(), config.security.max_inactive_seconds);

    let auth_service = Arc::new(AuthService::new(
        user_repository.clone(),
        session_repository,
        refresh_token_repository,
        failed_login_repository,
        membership_repository.clone(),
        audit_repository.clone(),
        rbac_service.clone(),
        jwt_service.clone(),
        password_hasher.clone(),
        rate_limiter,
        revocation_index.clone(),
        config.security.clone(),
    ));

    let membership_service = Arc::new(MembershipService::new(
        organization_repository,
        membership_repository.clone(),
        invitation_repository,
        role_repository.clone(),
        permission_repository,
        audit_repository,
        config.security.clone(),
    ));

    let oauth_service = Arc::new(OAuthService::new(
        oauth_client_repository,
        authorization_code_repository,
        auth_service.clone(),
        password_hasher.clone(),
        config.security.clone(),
    ));

    let api_key_lookup = Arc::new(ApiKeyPrincipalResolver::new(
        api_key_repository,
        rbac_service,
        password_hasher,
        config.jwt.issuer.clone(),
        config.jwt.audience.clone(),
    ));

    let principal_resolver = Arc::new(PrincipalResolver::new(jwt_service, revocation_index, api_key_lookup));

    let app_state = web::Data::new(AppState {
        principal_resolver,
        auth_service,
        membership_service,
        oauth_service,
        user_repository,
    });

    // Database pool is also shared for health checks and direct queries.
    let db_pool = web::Data::new(db_pool);

    // ─────────────────────────────────────────────────────────────────────
    // Step 6: Configure and start HTTP server
    // ─────────────────────────────────────────────────────────────────────
    let server_host = config.server.host.clone();
    let server_port = config.server.port;
    let allowed_origins = config.cors.allowed_origins.clone();

    info!("Server listening on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        let mut cors = Cors::default().allow_any_method().allow_any_header().max_age(3600);
        cors = if allowed_origins.iter().any(|origin| origin == "*") {
            cors.allow_any_origin()
        } else {
            allowed_origins.iter().fold(cors, |cors, origin| cors.allowed_origin(origin))
        };

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(app_state.clone())
            .app_data(db_pool.clone())
            .configure(routes::configure)
    })
    .bind((server_host, server_port))?
    .run()
    .await
}
