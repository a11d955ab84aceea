//! # Request Handlers
//!
//! HTTP request handlers that bridge the API layer with the service layer.
//! Each handler follows this pattern:
//!
//! 1. **Extract** request data using Actix extractors
//! 2. **Validate** input using the `validator` crate
//! 3. **Resolve** the caller's [`Principal`] where the route requires one
//! 4. **Call** service layer methods
//! 5. **Transform** and return HTTP response
//!
//! ## Error Handling
//!
//! All handlers return `Result<HttpResponse, ApiError>`. The `ApiError` type
//! automatically converts to appropriate HTTP status codes via the
//! `ResponseError` trait implementation.
//!
//! ## Authentication
//!
//! Protected endpoints resolve the caller through [`resolve_principal`],
//! which delegates to [`shared::auth::principal::PrincipalResolver`] (C4).
//! There is no separate middleware layer — every handler that needs a
//! principal calls this helper itself, mirroring how thinly
//! `extract_bearer_token` wrapped token extraction in the lineage.
//!
//! ## Related Documentation
//!
//! - DTOs: [`super::dto`]
//! - Routes: [`super::routes`]
//! - Service layer: [`crate::service`]
//! - Errors: [`shared::errors::ApiError`]

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use shared::auth::principal::Principal;
use shared::{errors::ApiError, validation};
use uuid::Uuid;

use crate::AppState;

use super::dto::{
    AcceptInvitationRequest, AuthorizeQuery, AuthorizeResponseDto, CreateOrganizationRequest,
    CreatePermissionRequest, CreateRoleRequest, HealthResponse, InviteRequest,
    IssuedInvitationDto, LinkPermissionRequest, LoginRequest, LoginResponseDto, MembershipDto,
    MessageResponse, OrganizationChoiceRequiredDto, OrganizationDto, PermissionDto,
    RefreshTokenRequest, RegisterRequest, RoleDto, TokenRequest, TokenResponseDto, UserDto,
};
use crate::service::auth_service::LoginOutcome;

/// Resolves the caller's [`Principal`] from the `Authorization` and
/// `X-Organization-Id` headers (§4.4, §6).
async fn resolve_principal(req: &HttpRequest, state: &AppState) -> Result<Principal, ApiError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingAuth)?;
    let organization_header = req.headers().get("X-Organization-Id").and_then(|v| v.to_str().ok());
    state.principal_resolver.resolve(auth_header, organization_header).await
}

/// Asserts the principal is scoped to exactly `organization_id` — used by
/// every organization-nested route to keep one organization's membership
/// manager from acting on another's (§3 I2).
fn require_organization_scope(principal: &Principal, organization_id: Uuid) -> Result<(), ApiError> {
    if principal.organization_id == Some(organization_id) {
        Ok(())
    } else {
        Err(ApiError::NotAMember)
    }
}

fn client_ip(req: &HttpRequest) -> Option<String> {
    req.connection_info().peer_addr().map(String::from)
}

fn user_agent(req: &HttpRequest) -> Option<String> {
    req.headers().get("User-Agent").and_then(|v| v.to_str().ok()).map(String::from)
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

/// `GET /health` — liveness probe for load balancers and orchestrators.
pub async fn health_check() -> HttpResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        service: "auth-service".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    };
    HttpResponse::Ok().json(response)
}

// =============================================================================
// REGISTRATION / LOGIN / REFRESH / LOGOUT
// =============================================================================

/// `POST /api/v1/auth/register` — creates a user account. Does not itself
/// establish a session; callers log in separately (C6/C9 are deliberately
/// decoupled so registration never implies organization membership).
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let user = state.auth_service.register(&body.email, &body.password, body.display_name).await?;

    Ok(HttpResponse::Created().json(UserDto::from(user)))
}

/// `POST /api/v1/auth/login` — authenticates by email/password (§4.6).
/// Returns either a token bundle or, when the principal belongs to more
/// than one organization and `organizationId` wasn't supplied, a
/// disambiguation prompt.
pub async fn login(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let outcome = state
        .auth_service
        .login(
            &body.email,
            &body.password,
            body.organization_id,
            client_ip(&req),
            user_agent(&req),
            body.device_fingerprint,
        )
        .await?;

    let dto = match outcome {
        LoginOutcome::Authenticated(bundle) => LoginResponseDto::Tokens(bundle.into()),
        LoginOutcome::OrganizationChoiceRequired { organization_ids } => {
            LoginResponseDto::OrganizationChoiceRequired(OrganizationChoiceRequiredDto { organization_ids })
        }
    };

    Ok(HttpResponse::Ok().json(dto))
}

/// `POST /api/v1/auth/refresh` — rotates a refresh token (§4.5). Reuse of
/// an already-rotated token burns the whole session/refresh family and
/// responds `401 refresh_reused`.
pub async fn refresh_token(
    state: web::Data<AppState>,
    body: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let bundle = state.auth_service.refresh(&body.refresh_token).await?;
    Ok(HttpResponse::Ok().json(TokenResponseDto::from(bundle)))
}

/// `POST /api/v1/auth/logout` — revokes the caller's own session.
pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let principal = resolve_principal(&req, &state).await?;
    state.auth_service.logout(principal.user_id, principal.session_id).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Logged out")))
}

/// `POST /api/v1/auth/logout-all` — revokes every session for the caller.
pub async fn logout_all(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let principal = resolve_principal(&req, &state).await?;
    state.auth_service.logout_all(principal.user_id).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Logged out of all sessions")))
}

/// `GET /api/v1/auth/me` — returns the caller's own profile.
pub async fn get_profile(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let principal = resolve_principal(&req, &state).await?;
    let user = state
        .user_repository
        .find_by_id(principal.user_id)
        .await?
        .ok_or(ApiError::NotFound { resource: "user".to_string() })?;
    Ok(HttpResponse::Ok().json(UserDto::from(user)))
}

// =============================================================================
// ORGANIZATIONS
// =============================================================================

/// `POST /api/v1/organizations` — creates an organization and grants the
/// caller its seeded `owner` role (§4.9).
pub async fn create_organization(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateOrganizationRequest>,
) -> Result<HttpResponse, ApiError> {
    let principal = resolve_principal(&req, &state).await?;
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let organization = state
        .membership_service
        .create_organization(principal.user_id, &body.slug, &body.name)
        .await?;

    Ok(HttpResponse::Created().json(OrganizationDto::from(organization)))
}

// =============================================================================
// INVITATIONS
// =============================================================================

/// `POST /api/v1/organizations/{organization_id}/invitations` — issues an
/// invitation. The caller must hold `member:invite` in this organization.
pub async fn invite_member(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<InviteRequest>,
) -> Result<HttpResponse, ApiError> {
    let organization_id = path.into_inner();
    let principal = resolve_principal(&req, &state).await?;
    require_organization_scope(&principal, organization_id)?;
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let issued = state
        .membership_service
        .invite(&principal.rbac(), organization_id, principal.user_id, &body.invited_email, body.role_id)
        .await?;

    Ok(HttpResponse::Created().json(IssuedInvitationDto::from(issued)))
}

/// `POST /api/v1/organizations/{organization_id}/invitations/{invitation_id}/resend`
/// — re-issues an invitation's expiry and token.
pub async fn resend_invitation(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, ApiError> {
    let (organization_id, invitation_id) = path.into_inner();
    let principal = resolve_principal(&req, &state).await?;
    require_organization_scope(&principal, organization_id)?;

    let issued = state.membership_service.resend(&principal.rbac(), invitation_id).await?;
    Ok(HttpResponse::Ok().json(IssuedInvitationDto::from(issued)))
}

/// `POST /api/v1/organizations/{organization_id}/invitations/{invitation_id}/cancel`
/// — cancels a pending invitation.
pub async fn cancel_invitation(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, ApiError> {
    let (organization_id, invitation_id) = path.into_inner();
    let principal = resolve_principal(&req, &state).await?;
    require_organization_scope(&principal, organization_id)?;

    state.membership_service.cancel(&principal.rbac(), principal.user_id, invitation_id).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Invitation cancelled")))
}

/// `POST /api/v1/invitations/accept` — accepts an invitation by its opaque
/// token. The only invitation endpoint that doesn't require organization
/// scope, since accepting is how a principal acquires it.
pub async fn accept_invitation(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<AcceptInvitationRequest>,
) -> Result<HttpResponse, ApiError> {
    let principal = resolve_principal(&req, &state).await?;
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let membership = state.membership_service.accept(&body.token, principal.user_id).await?;
    Ok(HttpResponse::Ok().json(MembershipDto::from(membership)))
}

// =============================================================================
// ROLES / PERMISSIONS
// =============================================================================

/// `POST /api/v1/organizations/{organization_id}/roles` — creates a
/// custom role owned by this organization.
pub async fn create_role(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<CreateRoleRequest>,
) -> Result<HttpResponse, ApiError> {
    let organization_id = path.into_inner();
    let principal = resolve_principal(&req, &state).await?;
    require_organization_scope(&principal, organization_id)?;
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let role = state.membership_service.create_role(&principal.rbac(), organization_id, &body.name).await?;
    Ok(HttpResponse::Created().json(RoleDto::from(role)))
}

/// `POST /api/v1/organizations/{organization_id}/permissions` — creates a
/// custom permission owned by this organization.
pub async fn create_permission(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<CreatePermissionRequest>,
) -> Result<HttpResponse, ApiError> {
    let organization_id = path.into_inner();
    let principal = resolve_principal(&req, &state).await?;
    require_organization_scope(&principal, organization_id)?;
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let permission = state
        .membership_service
        .create_permission(&principal.rbac(), organization_id, &body.name, body.description)
        .await?;
    Ok(HttpResponse::Created().json(PermissionDto::from(permission)))
}

/// `POST /api/v1/organizations/{organization_id}/roles/{role_id}/permissions`
/// — links a permission to a role, enforced against the cross-organization
/// isolation invariant (I2).
pub async fn link_permission(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<LinkPermissionRequest>,
) -> Result<HttpResponse, ApiError> {
    let (organization_id, role_id) = path.into_inner();
    let principal = resolve_principal(&req, &state).await?;
    require_organization_scope(&principal, organization_id)?;
    let body = body.into_inner();

    state
        .membership_service
        .link_permission(&principal.rbac(), organization_id, role_id, body.permission_id)
        .await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Permission linked")))
}

// =============================================================================
// OAUTH2
// =============================================================================

/// `GET /oauth2/authorize` — issues a single-use authorization code
/// (§4.8). Consent collection is assumed to have already happened upstream
/// of this call; by the time a caller reaches this endpoint they are
/// authenticated and have consented.
pub async fn oauth_authorize(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<AuthorizeQuery>,
) -> Result<HttpResponse, ApiError> {
    let principal = resolve_principal(&req, &state).await?;
    let query = query.into_inner();

    let issued = state
        .oauth_service
        .authorize(
            query.client_id,
            principal.user_id,
            &query.redirect_uri,
            &query.scope,
            query.code_challenge,
            query.code_challenge_method,
        )
        .await?;

    Ok(HttpResponse::Ok().json(AuthorizeResponseDto::from_issued(issued, query.state)))
}

/// `POST /oauth2/token` — dispatches the code-exchange and refresh grants
/// (§4.8) by `grant_type`, form-encoded per RFC 6749.
pub async fn oauth_token(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Form<TokenRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    let bundle = match body.grant_type.as_str() {
        "authorization_code" => {
            let client_id = body.client_id.ok_or(ApiError::BadRequest { message: "client_id is required".to_string() })?;
            let code = body.code.ok_or(ApiError::BadRequest { message: "code is required".to_string() })?;
            let redirect_uri = body
                .redirect_uri
                .ok_or(ApiError::BadRequest { message: "redirect_uri is required".to_string() })?;

            state
                .oauth_service
                .exchange_code(
                    client_id,
                    body.client_secret.as_deref(),
                    &code,
                    &redirect_uri,
                    body.code_verifier.as_deref(),
                    client_ip(&req),
                    user_agent(&req),
                )
                .await?
        }
        "refresh_token" => {
            let refresh_token =
                body.refresh_token.ok_or(ApiError::BadRequest { message: "refresh_token is required".to_string() })?;
            state.oauth_service.refresh(&refresh_token).await?
        }
        _ => return Err(ApiError::BadRequest { message: "unsupported grant_type".to_string() }),
    };

    Ok(HttpResponse::Ok().json(TokenResponseDto::from(bundle)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn test_health_check_returns_ok() {
        let response = health_check().await;
        assert_eq!(response.status(), actix_web::http::StatusCode::OK);
    }
}
