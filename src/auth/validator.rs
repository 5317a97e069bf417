// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification.
//!
//! Only RS256 is accepted. The algorithm is checked from the unverified
//! header before any key lookup, so a token declaring a symmetric algorithm
//! can never be verified with the public key as an HMAC secret.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde_json::{Map, Value};
use tracing::debug;

use super::{AuthError, JwksManager, ValidatedClaims};
use crate::config::AuthSettings;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

const ACCEPTED_ALGORITHM: Algorithm = Algorithm::RS256;

/// Verifies tokens against the provider key set and configured claims.
#[derive(Clone)]
pub struct TokenValidator {
    jwks: JwksManager,
    audience: String,
    issuer: String,
}

impl TokenValidator {
    pub fn new(jwks: JwksManager, settings: &AuthSettings) -> Self {
        Self {
            jwks,
            audience: settings.audience.clone(),
            issuer: settings.issuer.clone(),
        }
    }

    pub fn jwks(&self) -> &JwksManager {
        &self.jwks
    }

    /// Verify `token` and return its claims.
    ///
    /// Signature and claim failures are `BadCredentials`; an unreachable key
    /// set or unknown key id is `UnableCredentials`.
    pub async fn validate(&self, token: &str) -> Result<ValidatedClaims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        if header.alg != ACCEPTED_ALGORITHM {
            return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }
        let kid = header
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or(AuthError::MissingKeyId)?;

        let key = self.jwks.resolve(kid).await?;

        let token_data = decode::<Map<String, Value>>(token, &key.decoding_key, &self.validation())
            .map_err(|e| {
                debug!(kid, error = %e, "token rejected");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                    ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                    ErrorKind::InvalidAudience => AuthError::InvalidAudience,
                    ErrorKind::MissingRequiredClaim(claim) => AuthError::MissingClaim(claim.clone()),
                    _ => AuthError::MalformedToken,
                }
            })?;

        ValidatedClaims::from_raw(token_data.claims, &self.audience)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(ACCEPTED_ALGORITHM);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::provider::{ProviderClient, ProviderEndpoints, RetryPolicy};
    use crate::auth::AuthErrorKind;
    use crate::test_support::{
        auth_settings, jwks_body, now, other_key, sign, test_key, unsigned_token, valid_claims,
        TEST_SUBJECT,
    };
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ISSUER: &str = "https://tenant.example.com";

    async fn validator() -> (TokenValidator, MockServer) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&[test_key()])))
            .mount(&server)
            .await;
        let client = ProviderClient::new(ProviderEndpoints::with_base_url(&server.uri()).unwrap())
            .with_retry_policy(RetryPolicy::none());
        let jwks = JwksManager::new(client).unwrap();
        (TokenValidator::new(jwks, &auth_settings(ISSUER)), server)
    }

    #[tokio::test]
    async fn valid_token_returns_claims_unmodified() {
        let (validator, _server) = validator().await;
        let claims = valid_claims(ISSUER);
        let validated = validator.validate(&sign(test_key(), &claims)).await.unwrap();

        assert_eq!(validated.subject, TEST_SUBJECT);
        assert_eq!(validated.issuer, ISSUER);
        assert_eq!(Value::Object(validated.raw), claims);
    }

    #[tokio::test]
    async fn audience_array_containing_configured_audience_is_accepted() {
        let (validator, _server) = validator().await;
        let mut claims = valid_claims(ISSUER);
        claims["aud"] = json!([crate::test_support::TEST_AUDIENCE, "https://tenant.example.com/userinfo"]);
        assert!(validator.validate(&sign(test_key(), &claims)).await.is_ok());
    }

    #[tokio::test]
    async fn wrong_audience_is_bad_credentials() {
        let (validator, _server) = validator().await;
        let mut claims = valid_claims(ISSUER);
        claims["aud"] = json!("https://someone-else.example.com");
        let err = validator.validate(&sign(test_key(), &claims)).await.unwrap_err();
        assert_eq!(err, AuthError::InvalidAudience);
        assert_eq!(err.kind(), AuthErrorKind::BadCredentials);
    }

    #[tokio::test]
    async fn wrong_issuer_is_bad_credentials() {
        let (validator, _server) = validator().await;
        let claims = valid_claims("https://evil.example.com");
        let err = validator.validate(&sign(test_key(), &claims)).await.unwrap_err();
        assert_eq!(err, AuthError::InvalidIssuer);
    }

    #[tokio::test]
    async fn expired_token_is_bad_credentials() {
        let (validator, _server) = validator().await;
        let mut claims = valid_claims(ISSUER);
        claims["exp"] = json!(now() - 3600);
        let err = validator.validate(&sign(test_key(), &claims)).await.unwrap_err();
        assert_eq!(err, AuthError::TokenExpired);
        assert_eq!(err.kind(), AuthErrorKind::BadCredentials);
    }

    #[tokio::test]
    async fn expiry_within_leeway_is_accepted() {
        let (validator, _server) = validator().await;
        let mut claims = valid_claims(ISSUER);
        claims["exp"] = json!(now() - 10);
        assert!(validator.validate(&sign(test_key(), &claims)).await.is_ok());
    }

    #[tokio::test]
    async fn missing_subject_is_bad_credentials() {
        let (validator, _server) = validator().await;
        let mut claims = valid_claims(ISSUER);
        claims.as_object_mut().unwrap().remove("sub");
        let err = validator.validate(&sign(test_key(), &claims)).await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::BadCredentials);
    }

    #[tokio::test]
    async fn key_not_in_key_set_is_unable_credentials() {
        let (validator, _server) = validator().await;
        let token = sign(other_key(), &valid_claims(ISSUER));
        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err, AuthError::UnknownSigningKey(other_key().kid.clone()));
        assert_eq!(err.kind(), AuthErrorKind::UnableCredentials);
    }

    #[tokio::test]
    async fn signature_from_other_key_under_published_kid_is_bad_credentials() {
        let (validator, _server) = validator().await;
        let mut header = jsonwebtoken::Header::new(Algorithm::RS256);
        header.kid = Some(test_key().kid.clone());
        let token =
            jsonwebtoken::encode(&header, &valid_claims(ISSUER), &other_key().encoding_key).unwrap();
        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err, AuthError::InvalidSignature);
    }

    #[tokio::test]
    async fn symmetric_algorithm_is_rejected_before_key_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&[test_key()])))
            .expect(0)
            .mount(&server)
            .await;
        let client = ProviderClient::new(ProviderEndpoints::with_base_url(&server.uri()).unwrap());
        let validator = TokenValidator::new(JwksManager::new(client).unwrap(), &auth_settings(ISSUER));

        let token = unsigned_token(
            &json!({"alg": "HS256", "typ": "JWT", "kid": test_key().kid}),
            &valid_claims(ISSUER),
        );
        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err, AuthError::UnsupportedAlgorithm("HS256".into()));
        assert_eq!(err.kind(), AuthErrorKind::BadCredentials);
    }

    #[tokio::test]
    async fn missing_kid_is_bad_credentials() {
        let (validator, _server) = validator().await;
        let token = unsigned_token(&json!({"alg": "RS256", "typ": "JWT"}), &valid_claims(ISSUER));
        assert_eq!(validator.validate(&token).await.unwrap_err(), AuthError::MissingKeyId);
    }

    #[tokio::test]
    async fn garbage_token_is_malformed() {
        let (validator, _server) = validator().await;
        for token in ["abc.def.ghi", "not-a-jwt", ""] {
            let err = validator.validate(token).await.unwrap_err();
            assert_eq!(err, AuthError::MalformedToken, "{token}");
        }
    }
}
