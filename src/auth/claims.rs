// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Validated token claims.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::AuthError;

/// Claims of a token whose signature and standard claims were verified.
///
/// Lives for the duration of one request (stored in request extensions).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedClaims {
    /// Provider user identifier (`sub`), e.g. `auth0|64f0c1d2e3`.
    pub subject: String,
    /// The configured audience the token was accepted for.
    pub audience: String,
    pub issuer: String,
    pub expiry: DateTime<Utc>,
    /// The complete claim set, unmodified.
    pub raw: Map<String, Value>,
}

impl ValidatedClaims {
    /// Build from a decoded claim map already checked for signature,
    /// audience, issuer and expiry.
    pub fn from_raw(raw: Map<String, Value>, audience: &str) -> Result<Self, AuthError> {
        let subject = string_claim(&raw, "sub")?;
        let issuer = string_claim(&raw, "iss")?;
        let exp = raw
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or_else(|| AuthError::MissingClaim("exp".into()))?;
        let expiry = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or(AuthError::MalformedToken)?;

        Ok(Self {
            subject,
            audience: audience.to_string(),
            issuer,
            expiry,
            raw,
        })
    }

    /// The user id without the connection prefix (`auth0|abc` -> `abc`).
    pub fn user_id(&self) -> &str {
        self.subject
            .rsplit_once('|')
            .map(|(_, id)| id)
            .unwrap_or(&self.subject)
    }

    /// Space separated `scope` claim, if present.
    pub fn scopes(&self) -> Vec<&str> {
        self.raw
            .get("scope")
            .and_then(Value::as_str)
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }
}

fn string_claim(raw: &Map<String, Value>, name: &str) -> Result<String, AuthError> {
    raw.get(name)
        .and_then(Value::as_str)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AuthError::MissingClaim(name.to_string()))
}
