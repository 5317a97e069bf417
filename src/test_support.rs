// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for unit tests: RSA signing keys, their JWKS form,
//! signed test tokens and a mocked identity provider.

use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::rngs::OsRng;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::auth::{ProviderClient, ProviderEndpoints, RetryPolicy};
use crate::config::{AuthSettings, LogFormat, Settings};
use crate::state::AppState;

pub const TEST_DOMAIN: &str = "tenant.example.com";
pub const TEST_AUDIENCE: &str = "https://accounts.example.com";
pub const TEST_SUBJECT: &str = "auth0|64f0c1d2e3";
pub const USER_ROLE: &str = "rol_user";
pub const ADMIN_ROLE: &str = "rol_admin";

pub struct TestKey {
    pub kid: String,
    pub encoding_key: EncodingKey,
    n: String,
    e: String,
}

fn generate(kid: &str) -> TestKey {
    let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    let public_key = private_key.to_public_key();
    let pem = private_key.to_pkcs1_pem(LineEnding::LF).unwrap();
    TestKey {
        kid: kid.to_string(),
        encoding_key: EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap(),
        n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
    }
}

/// The key published by the mock provider.
pub fn test_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| generate("test-key-1"))
}

/// A second key, used for rotation and unpublished-key cases.
pub fn other_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| generate("test-key-2"))
}

/// JWKS document publishing `keys`.
pub fn jwks_body(keys: &[&TestKey]) -> Value {
    json!({
        "keys": keys
            .iter()
            .map(|key| json!({
                "kty": "RSA",
                "use": "sig",
                "alg": "RS256",
                "kid": key.kid,
                "n": key.n,
                "e": key.e,
            }))
            .collect::<Vec<_>>()
    })
}

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Auth settings for a tenant whose issuer is `issuer`.
pub fn auth_settings(issuer: &str) -> AuthSettings {
    AuthSettings::for_domain(TEST_DOMAIN, TEST_AUDIENCE, "client-id", "client-secret")
        .with_issuer(issuer)
        .with_roles(USER_ROLE, ADMIN_ROLE)
}

/// Claims accepted by [`auth_settings`] with the same issuer.
pub fn valid_claims(issuer: &str) -> Value {
    json!({
        "sub": TEST_SUBJECT,
        "aud": TEST_AUDIENCE,
        "iss": issuer,
        "iat": now(),
        "exp": now() + 600,
        "scope": "openid profile",
    })
}

/// Sign `claims` with `key` using RS256 and the key's id.
pub fn sign(key: &TestKey, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(key.kid.clone());
    encode(&header, claims, &key.encoding_key).unwrap()
}

/// A compact token with an arbitrary header and a garbage signature.
pub fn unsigned_token(header: &Value, claims: &Value) -> String {
    format!(
        "{}.{}.c2lnbmF0dXJl",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// Process settings around [`auth_settings`].
pub fn test_settings(issuer: &str) -> Settings {
    Settings {
        auth: auth_settings(issuer),
        front_end_url: None,
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout: Duration::from_secs(5),
        log_format: LogFormat::Pretty,
    }
}

/// State whose provider calls go to `server`, with retries disabled.
pub fn test_state(server: &MockServer) -> AppState {
    test_state_with(server, test_settings(&server.uri()))
}

/// Like [`test_state`] but with caller-provided settings.
pub fn test_state_with(server: &MockServer, settings: Settings) -> AppState {
    let client = ProviderClient::new(ProviderEndpoints::with_base_url(&server.uri()).unwrap())
        .with_retry_policy(RetryPolicy::none());
    AppState::with_client(settings, client).unwrap()
}

/// Claims valid for a [`test_state`] built on `server`.
pub fn claims_for(server: &MockServer) -> Value {
    valid_claims(&server.uri())
}

/// Publish [`test_key`] as the tenant key set.
pub async fn mount_jwks(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_body(&[test_key()])))
        .mount(server)
        .await;
}

/// Answer client-credentials exchanges with a day-long token.
pub async fn mount_service_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "svc-token",
            "expires_in": 86400,
            "token_type": "Bearer",
        })))
        .mount(server)
        .await;
}

/// Answer role lookups for every user with `role_ids`.
pub async fn mount_roles(server: &MockServer, role_ids: &[&str]) {
    let roles: Vec<Value> = role_ids
        .iter()
        .map(|id| json!({"id": id, "name": format!("name-{id}")}))
        .collect();
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/v2/users/[^/]+/roles$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(roles))
        .mount(server)
        .await;
}
