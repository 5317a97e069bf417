// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{Auth, ValidatedClaims};

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// Provider subject (`sub` claim)
    pub subject: String,
    /// Subject without its connection prefix
    pub user_id: String,
    /// Audience the token was accepted for
    pub audience: String,
    pub issuer: String,
    /// Token expiry
    pub expires_at: DateTime<Utc>,
    /// Granted scopes, if the token carries any
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
}

impl From<ValidatedClaims> for UserMeResponse {
    fn from(claims: ValidatedClaims) -> Self {
        Self {
            user_id: claims.user_id().to_string(),
            scopes: claims.scopes().into_iter().map(str::to_string).collect(),
            subject: claims.subject,
            audience: claims.audience,
            issuer: claims.issuer,
            expires_at: claims.expiry,
        }
    }
}

/// Get the current authenticated user's identity.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 500, description = "Credentials could not be verified"),
    )
)]
pub async fn get_current_user(Auth(claims): Auth) -> Json<UserMeResponse> {
    Json(claims.into())
}
