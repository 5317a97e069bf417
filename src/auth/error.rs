// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Every [`AuthError`] variant belongs to exactly one [`AuthErrorKind`]. The
//! kind decides the status code and the message returned to the caller; the
//! variant detail only ever reaches the logs.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// The four failure kinds visible at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    /// No credential supplied.
    RequiresAuthentication,
    /// Malformed header, invalid signature, invalid or expired claims.
    BadCredentials,
    /// Key set or provider API unreachable or unparsable.
    UnableCredentials,
    /// Authenticated but lacking the required role.
    PermissionDenied,
}

impl AuthErrorKind {
    pub fn status_code(self) -> StatusCode {
        match self {
            AuthErrorKind::RequiresAuthentication | AuthErrorKind::BadCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AuthErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            AuthErrorKind::UnableCredentials => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(self) -> &'static str {
        match self {
            AuthErrorKind::RequiresAuthentication => "requires_authentication",
            AuthErrorKind::BadCredentials => "bad_credentials",
            AuthErrorKind::UnableCredentials => "unable_credentials",
            AuthErrorKind::PermissionDenied => "permission_denied",
        }
    }

    /// Fixed, non-sensitive message returned to clients.
    pub fn public_message(self) -> &'static str {
        match self {
            AuthErrorKind::RequiresAuthentication => "Requires authentication",
            AuthErrorKind::BadCredentials => "Bad credentials",
            AuthErrorKind::UnableCredentials => "Unable to verify credentials",
            AuthErrorKind::PermissionDenied => "Permission denied",
        }
    }
}

/// Authentication error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("authorization header is required")]
    MissingAuthHeader,

    #[error("invalid authorization header (expected 'Bearer <token>')")]
    InvalidAuthHeader,

    #[error("token is malformed")]
    MalformedToken,

    #[error("token algorithm {0} is not accepted")]
    UnsupportedAlgorithm(String),

    #[error("token header carries no key id")]
    MissingKeyId,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    TokenExpired,

    #[error("token issuer is invalid")]
    InvalidIssuer,

    #[error("token audience is invalid")]
    InvalidAudience,

    #[error("token is missing required claim {0}")]
    MissingClaim(String),

    #[error("failed to fetch signing key set: {0}")]
    KeySetUnavailable(String),

    #[error("no signing key with id {0} in the published key set")]
    UnknownSigningKey(String),

    #[error("identity provider request failed: {0}")]
    ProviderUnavailable(String),

    #[error("subject lacks required role {0}")]
    InsufficientPermissions(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: &'static str,
    error_code: &'static str,
}

impl AuthError {
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::MissingAuthHeader => AuthErrorKind::RequiresAuthentication,
            AuthError::InvalidAuthHeader
            | AuthError::MalformedToken
            | AuthError::UnsupportedAlgorithm(_)
            | AuthError::MissingKeyId
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::InvalidIssuer
            | AuthError::InvalidAudience
            | AuthError::MissingClaim(_) => AuthErrorKind::BadCredentials,
            AuthError::KeySetUnavailable(_)
            | AuthError::UnknownSigningKey(_)
            | AuthError::ProviderUnavailable(_) => AuthErrorKind::UnableCredentials,
            AuthError::InsufficientPermissions(_) => AuthErrorKind::PermissionDenied,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    pub fn error_code(&self) -> &'static str {
        self.kind().error_code()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        match kind {
            AuthErrorKind::UnableCredentials => {
                tracing::error!(error = %self, "credential verification unavailable")
            }
            _ => tracing::debug!(error = %self, code = kind.error_code(), "request rejected"),
        }

        let body = Json(AuthErrorBody {
            error: kind.public_message(),
            error_code: kind.error_code(),
        });
        let mut response = (kind.status_code(), body).into_response();
        if kind.status_code() == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
