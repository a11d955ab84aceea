//! # API Layer
//!
//! The API layer handles HTTP request/response processing for authentication
//! endpoints. It bridges the HTTP world with the service layer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            HTTP Request                                 │
//! └───────────────────────────────┬─────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Routes (routes.rs)                             │
//! │  Define URL patterns and HTTP methods, map to handlers                  │
//! └───────────────────────────────┬─────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Handlers (handlers.rs)                           │
//! │  1. Extract request data (JSON body, headers, path params)              │
//! │  2. Validate input using DTOs                                           │
//! │  3. Call service layer                                                  │
//! │  4. Transform response                                                  │
//! └───────────────────────────────┬─────────────────────────────────────────┘
//!                                 │
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          DTOs (dto.rs)                                  │
//! │  - Request validation (serde, validator)                                │
//! │  - Response serialization                                               │
//! │  - API contract definitions                                             │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! | Module       | Responsibility                                      |
//! |--------------|-----------------------------------------------------|
//! | `routes`     | Route definitions with actix-web's `configure()`    |
//! | `handlers`   | Request handlers (extractors → service → response)  |
//! | `dto`        | Data Transfer Objects for request/response          |
//!
//! ## Endpoint Summary
//!
//! | Method | Path                                                         | Auth |
//! |--------|--------------------------------------------------------------|------|
//! | POST   | `/api/v1/auth/register`                                      | No   |
//! | POST   | `/api/v1/auth/login`                                          | No   |
//! | POST   | `/api/v1/auth/refresh`                                        | No   |
//! | POST   | `/api/v1/auth/logout`                                         | Yes  |
//! | POST   | `/api/v1/auth/logout-all`                                     | Yes  |
//! | GET    | `/api/v1/auth/me`                                             | Yes  |
//! | POST   | `/api/v1/organizations`                                       | Yes  |
//! | POST   | `/api/v1/organizations/{id}/invitations`                      | Yes  |
//! | POST   | `/api/v1/organizations/{id}/invitations/{id}/resend`          | Yes  |
//! | POST   | `/api/v1/organizations/{id}/invitations/{id}/cancel`          | Yes  |
//! | POST   | `/api/v1/invitations/accept`                                  | Yes  |
//! | POST   | `/api/v1/organizations/{id}/roles`                            | Yes  |
//! | POST   | `/api/v1/organizations/{id}/permissions`                      | Yes  |
//! | POST   | `/api/v1/organizations/{id}/roles/{id}/permissions`           | Yes  |
//! | GET    | `/oauth2/authorize`                                           | Yes  |
//! | POST   | `/oauth2/token`                                               | No*  |
//! | GET    | `/health`                                                     | No   |
//!
//! *`/oauth2/token` authenticates the OAuth2 client (confidential secret or
//! public + PKCE), not a bearer principal.
//!
//! ## Related Documentation
//!
//! - Service layer: [`crate::service`]
//! - Error responses: [`shared::errors::ApiError`]
//! - Principal resolution: [`shared::auth::principal::PrincipalResolver`]

pub mod dto;
pub mod handlers;
pub mod routes;
