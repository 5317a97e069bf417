// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! These endpoints require the configured admin role.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::{AdminOnly, RoleRecord},
    error::ApiError,
    state::AppState,
};

/// Longest subject accepted in a path.
const MAX_SUBJECT_LEN: usize = 256;

/// Response for the admin role listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserRolesResponse {
    /// Provider subject the roles belong to.
    pub user_id: String,
    /// Every role assigned to the subject.
    pub roles: Vec<RoleRecord>,
}

fn validate_subject(user_id: &str) -> Result<&str, ApiError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::bad_request("user_id must not be empty"));
    }
    if user_id.len() > MAX_SUBJECT_LEN || user_id.chars().any(char::is_control) {
        return Err(ApiError::bad_request("user_id is not a valid subject"));
    }
    Ok(user_id)
}

/// List the provider roles of any user.
#[utoipa::path(
    get,
    path = "/v1/admin/users/{user_id}/roles",
    tag = "Admin",
    security(("bearer" = [])),
    params(
        ("user_id" = String, Path, description = "Provider subject, e.g. auth0|64f0c1d2e3")
    ),
    responses(
        (status = 200, description = "Roles of the user", body = UserRolesResponse),
        (status = 400, description = "Invalid user id"),
        (status = 401, description = "Unauthorized - invalid or missing token"),
        (status = 403, description = "Forbidden - admin role required"),
        (status = 500, description = "Identity provider unavailable"),
    )
)]
pub async fn list_user_roles(
    AdminOnly { claims, .. }: AdminOnly,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserRolesResponse>, ApiError> {
    let user_id = validate_subject(&user_id)?;
    tracing::info!(admin = %claims.subject, target = user_id, "admin role listing");

    let roles = state.roles.list_roles(user_id).await?;
    Ok(Json(UserRolesResponse {
        user_id: user_id.to_string(),
        roles,
    }))
}
