// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer credential parsing for the `Authorization` header.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use super::AuthError;

const BEARER_SCHEME: &str = "bearer";

/// The two fields of an `Authorization` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationHeaderElements {
    pub scheme: String,
    pub token: String,
    /// True iff the scheme is `bearer` (any case) and the token is non-empty.
    pub is_valid: bool,
}

impl AuthorizationHeaderElements {
    /// Split a raw header value into scheme and token.
    ///
    /// Anything other than exactly two whitespace-separated fields is
    /// `InvalidAuthHeader`.
    pub fn parse(value: &str) -> Result<Self, AuthError> {
        let mut fields = value.split_whitespace();
        let (Some(scheme), Some(token), None) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(AuthError::InvalidAuthHeader);
        };

        let is_valid = scheme.eq_ignore_ascii_case(BEARER_SCHEME) && !token.trim().is_empty();
        Ok(Self {
            scheme: scheme.to_string(),
            token: token.to_string(),
            is_valid,
        })
    }
}

/// Extract the raw, unverified bearer token from a header value.
pub fn extract(header: Option<&str>) -> Result<String, AuthError> {
    let value = header.ok_or(AuthError::MissingAuthHeader)?;
    let elements = AuthorizationHeaderElements::parse(value)?;
    if !elements.is_valid {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(elements.token)
}

/// Extract the bearer token from request headers.
///
/// A header that is present but not visible ASCII counts as malformed.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let value = match headers.get(AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| AuthError::InvalidAuthHeader)?),
        None => None,
    };
    extract(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_is_valid() {
        let elements = AuthorizationHeaderElements::parse("Bearer abc.def.ghi").unwrap();
        assert_eq!(elements.scheme, "Bearer");
        assert_eq!(elements.token, "abc.def.ghi");
        assert!(elements.is_valid);
    }

    #[test]
    fn basic_header_parses_but_is_invalid() {
        let elements = AuthorizationHeaderElements::parse("Basic abc").unwrap();
        assert!(!elements.is_valid);
        assert_eq!(extract(Some("Basic abc")), Err(AuthError::InvalidAuthHeader));
    }

    #[test]
    fn missing_header_requires_authentication() {
        assert_eq!(extract(None), Err(AuthError::MissingAuthHeader));
    }

    #[test]
    fn scheme_is_case_insensitive() {
        for scheme in ["bearer", "BEARER", "BeArEr"] {
            assert_eq!(extract(Some(&format!("{scheme} tok"))).unwrap(), "tok");
        }
    }

    #[test]
    fn other_schemes_are_rejected() {
        for header in ["Token abc", "Digest abc", "Bearer: abc", "bearerx abc"] {
            assert_eq!(extract(Some(header)), Err(AuthError::InvalidAuthHeader), "{header}");
        }
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        for header in ["", "   ", "Bearer", "Bearer ", "Bearer a b", "abc.def.ghi", "Bearer a\tb c"] {
            assert_eq!(extract(Some(header)), Err(AuthError::InvalidAuthHeader), "{header:?}");
        }
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        assert_eq!(extract(Some("  Bearer   tok  ")).unwrap(), "tok");
    }

    #[test]
    fn non_ascii_header_value_is_bad_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xfftoken").unwrap(),
        );
        assert_eq!(bearer_token(&headers), Err(AuthError::InvalidAuthHeader));
    }

    #[test]
    fn headers_without_authorization_require_authentication() {
        assert_eq!(bearer_token(&HeaderMap::new()), Err(AuthError::MissingAuthHeader));
    }
}
