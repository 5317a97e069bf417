// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated requests.
//!
//! Use the `Auth` extractor in handlers to require a valid bearer token:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(claims): Auth) -> impl IntoResponse {
//!     // claims is ValidatedClaims
//! }
//! ```
//!
//! and [`AdminOnly`] / [`UserOnly`] to additionally require a provider role.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::header::bearer_token;
use super::roles::RoleDecision;
use super::{AuthError, ValidatedClaims};
use crate::config::AuthSettings;
use crate::state::AppState;

/// Extractor for authenticated requests.
///
/// Validates the bearer token from the `Authorization` header and stores
/// the claims in the request extensions, so later extractors on the same
/// request do not validate twice.
///
/// # Example
///
/// ```rust,ignore
/// async fn current_user(Auth(claims): Auth) -> Json<UserMeResponse> {
///     // claims.subject is the provider user id
/// }
/// ```
pub struct Auth(pub ValidatedClaims);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<ValidatedClaims>().cloned() {
            return Ok(Auth(claims));
        }

        let token = bearer_token(&parts.headers)?;
        let claims = state.validator.validate(&token).await?;
        parts.extensions.insert(claims.clone());

        Ok(Auth(claims))
    }
}

/// A provider role an endpoint can require.
pub trait RoleRequirement: Send + Sync + 'static {
    /// The configured role id.
    fn role_id(settings: &AuthSettings) -> &str;
}

/// The configured admin role.
pub struct AdminRole;

impl RoleRequirement for AdminRole {
    fn role_id(settings: &AuthSettings) -> &str {
        &settings.admin_role
    }
}

/// The configured user role.
pub struct UserRole;

impl RoleRequirement for UserRole {
    fn role_id(settings: &AuthSettings) -> &str {
        &settings.user_role
    }
}

/// Extractor that requires an authenticated subject holding role `R`.
///
/// Authentication runs first, so a request without valid credentials is
/// rejected with 401 before any role lookup.
///
/// # Example
///
/// ```rust,ignore
/// async fn admin_only(AdminOnly { claims, .. }: AdminOnly) -> impl IntoResponse {
///     // Only subjects holding the admin role reach here
/// }
/// ```
pub struct RequireRole<R: RoleRequirement> {
    pub claims: ValidatedClaims,
    pub decision: RoleDecision,
    _role: PhantomData<R>,
}

impl<R: RoleRequirement> FromRequestParts<AppState> for RequireRole<R> {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(claims) = Auth::from_request_parts(parts, state).await?;

        let role_id = R::role_id(&state.settings.auth);
        let decision = state.roles.authorize(&claims.subject, role_id).await?;

        Ok(RequireRole {
            claims,
            decision,
            _role: PhantomData,
        })
    }
}

/// Extractor that requires the admin role.
pub type AdminOnly = RequireRole<AdminRole>;

/// Extractor that requires the user role.
pub type UserOnly = RequireRole<UserRole>;
