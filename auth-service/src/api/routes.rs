//! # Route Configuration
//!
//! Defines URL patterns and maps them to handler functions, organized by
//! resource.
//!
//! ```text
//! /health
//! /api/v1/auth/{register,login,refresh,logout,logout-all,me}
//! /api/v1/organizations                                          POST
//! /api/v1/organizations/{organization_id}/invitations            POST
//! /api/v1/organizations/{organization_id}/invitations/{id}/resend   POST
//! /api/v1/organizations/{organization_id}/invitations/{id}/cancel   POST
//! /api/v1/invitations/accept                                     POST
//! /api/v1/organizations/{organization_id}/roles                  POST
//! /api/v1/organizations/{organization_id}/permissions             POST
//! /api/v1/organizations/{organization_id}/roles/{role_id}/permissions  POST
//! /oauth2/authorize                                              GET
//! /oauth2/token                                                  POST
//! ```
//!
//! Every route under `/api/v1` and `/oauth2/authorize` except
//! registration/login/refresh/accept-invitation requires a bearer
//! credential resolved by [`super::handlers::resolve_principal`] inside
//! the handler itself — there is no separate auth middleware layer (§4.4).
//!
//! ## Related Documentation
//!
//! - Handler implementations: [`super::handlers`]
//! - Principal resolution: [`shared::auth::principal::PrincipalResolver`]

use actix_web::web;

use super::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health_check))
        .service(
            web::scope("/api/v1/auth")
                .route("/register", web::post().to(handlers::register))
                .route("/login", web::post().to(handlers::login))
                .route("/refresh", web::post().to(handlers::refresh_token))
                .route("/logout", web::post().to(handlers::logout))
                .route("/logout-all", web::post().to(handlers::logout_all))
                .route("/me", web::get().to(handlers::get_profile)),
        )
        .service(
            web::scope("/api/v1/organizations")
                .route("", web::post().to(handlers::create_organization))
                .route("/{organization_id}/invitations", web::post().to(handlers::invite_member))
                .route(
                    "/{organization_id}/invitations/{invitation_id}/resend",
                    web::post().to(handlers::resend_invitation),
                )
                .route(
                    "/{organization_id}/invitations/{invitation_id}/cancel",
                    web::post().to(handlers::cancel_invitation),
                )
                .route("/{organization_id}/roles", web::post().to(handlers::create_role))
                .route("/{organization_id}/permissions", web::post().to(handlers::create_permission))
                .route(
                    "/{organization_id}/roles/{role_id}/permissions",
                    web::post().to(handlers::link_permission),
                ),
        )
        .service(
            web::scope("/api/v1/invitations")
                .route("/accept", web::post().to(handlers::accept_invitation)),
        )
        .service(
            web::scope("/oauth2")
                .route("/authorize", web::get().to(handlers::oauth_authorize))
                .route("/token", web::post().to(handlers::oauth_token)),
        );
}

#[cfg(test)]
mod tests {
    use actix_web::{test, App};

    use super::configure;

    #[actix_web::test]
    async fn test_health_route_is_wired_through_configure() {
        let app = test::init_service(App::new().configure(configure)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
