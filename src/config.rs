// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup (after an
//! optional `.env` file is loaded) and shared immutably through `AppState`.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUTH_DOMAIN` | Identity provider tenant host (e.g. `tenant.eu.auth0.com`) | Required |
//! | `AUTH_AUDIENCE` | Expected `aud` claim of user tokens | Required |
//! | `AUTH_CLIENT_ID` | Client id for the client-credentials exchange | Required |
//! | `AUTH_CLIENT_SECRET` | Client secret for the client-credentials exchange | Required |
//! | `AUTH_USER_ROLE` | Provider role id granted to regular users | Required |
//! | `AUTH_ADMIN_ROLE` | Provider role id granted to administrators | Required |
//! | `AUTH_ISSUER` | Expected `iss` claim | `https://{AUTH_DOMAIN}` |
//! | `AUTH_MANAGEMENT_AUDIENCE` | Audience of the service token | `https://{AUTH_DOMAIN}/api/v2/` |
//! | `FRONT_END_URL` | Allowed CORS origin | No cross-origin access |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `REQUEST_TIMEOUT_SECS` | Per-request timeout | `30` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;
use std::time::Duration;

pub const AUTH_DOMAIN_ENV: &str = "AUTH_DOMAIN";
pub const AUTH_AUDIENCE_ENV: &str = "AUTH_AUDIENCE";
pub const AUTH_CLIENT_ID_ENV: &str = "AUTH_CLIENT_ID";
pub const AUTH_CLIENT_SECRET_ENV: &str = "AUTH_CLIENT_SECRET";
pub const AUTH_USER_ROLE_ENV: &str = "AUTH_USER_ROLE";
pub const AUTH_ADMIN_ROLE_ENV: &str = "AUTH_ADMIN_ROLE";
pub const AUTH_ISSUER_ENV: &str = "AUTH_ISSUER";
pub const AUTH_MANAGEMENT_AUDIENCE_ENV: &str = "AUTH_MANAGEMENT_AUDIENCE";
pub const FRONT_END_URL_ENV: &str = "FRONT_END_URL";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const REQUEST_TIMEOUT_ENV: &str = "REQUEST_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {0} must not be empty")]
    Empty(&'static str),

    #[error("environment variable {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Identity provider settings consumed by the auth pipeline.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// Bare tenant host, no scheme or path.
    pub domain: String,
    pub audience: String,
    pub issuer: String,
    pub management_audience: String,
    pub client_id: String,
    pub client_secret: String,
    pub user_role: String,
    pub admin_role: String,
}

impl AuthSettings {
    /// Settings for `domain` with issuer and management audience derived
    /// from it the way the provider publishes them.
    pub fn for_domain(
        domain: impl Into<String>,
        audience: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        let domain = domain.into();
        Self {
            issuer: format!("https://{domain}"),
            management_audience: format!("https://{domain}/api/v2/"),
            audience: audience.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            user_role: String::new(),
            admin_role: String::new(),
            domain,
        }
    }

    pub fn with_roles(mut self, user_role: impl Into<String>, admin_role: impl Into<String>) -> Self {
        self.user_role = user_role.into();
        self.admin_role = admin_role.into();
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

// The client secret must never reach the logs.
impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("domain", &self.domain)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("management_audience", &self.management_audience)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_role", &self.user_role)
            .field("admin_role", &self.admin_role)
            .finish()
    }
}

/// Process-wide settings, built once in `main`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub auth: AuthSettings,
    pub front_end_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            let value = lookup(name).ok_or(ConfigError::Missing(name))?;
            let value = value.trim().to_string();
            if value.is_empty() {
                return Err(ConfigError::Empty(name));
            }
            Ok(value)
        };
        let optional = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let domain = validate_domain(&required(AUTH_DOMAIN_ENV)?)?;
        let mut auth = AuthSettings::for_domain(
            domain,
            required(AUTH_AUDIENCE_ENV)?,
            required(AUTH_CLIENT_ID_ENV)?,
            required(AUTH_CLIENT_SECRET_ENV)?,
        )
        .with_roles(required(AUTH_USER_ROLE_ENV)?, required(AUTH_ADMIN_ROLE_ENV)?);

        if let Some(issuer) = optional(AUTH_ISSUER_ENV) {
            auth.issuer = issuer;
        }
        if let Some(audience) = optional(AUTH_MANAGEMENT_AUDIENCE_ENV) {
            auth.management_audience = audience;
        }

        let port = match optional(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let timeout_secs = match optional(REQUEST_TIMEOUT_ENV) {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                name: REQUEST_TIMEOUT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Self {
            auth,
            front_end_url: optional(FRONT_END_URL_ENV),
            host: optional(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            request_timeout: Duration::from_secs(timeout_secs),
            log_format: optional(LOG_FORMAT_ENV)
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
        })
    }
}

/// The domain is used to build `https://{domain}/...` URLs, so it must be a
/// bare host.
fn validate_domain(domain: &str) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        name: AUTH_DOMAIN_ENV,
        reason: reason.to_string(),
    };
    if domain.contains("://") {
        return Err(invalid("expected a bare host without scheme"));
    }
    let parsed = url::Url::parse(&format!("https://{domain}"))
        .map_err(|e| invalid(&e.to_string()))?;
    if parsed.path() != "/" || parsed.query().is_some() {
        return Err(invalid("expected a bare host without path"));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(domain.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (AUTH_DOMAIN_ENV, "tenant.example.com"),
            (AUTH_AUDIENCE_ENV, "https://api.example.com"),
            (AUTH_CLIENT_ID_ENV, "client-id"),
            (AUTH_CLIENT_SECRET_ENV, "client-secret"),
            (AUTH_USER_ROLE_ENV, "rol_user"),
            (AUTH_ADMIN_ROLE_ENV, "rol_admin"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Settings, ConfigError> {
        Settings::from_lookup(|name| env.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn derives_issuer_and_management_audience_from_domain() {
        let settings = load(&base_env()).unwrap();
        assert_eq!(settings.auth.issuer, "https://tenant.example.com");
        assert_eq!(
            settings.auth.management_audience,
            "https://tenant.example.com/api/v2/"
        );
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert!(settings.front_end_url.is_none());
    }

    #[test]
    fn explicit_issuer_overrides_default() {
        let mut env = base_env();
        env.insert(AUTH_ISSUER_ENV, "https://tenant.example.com/");
        let settings = load(&env).unwrap();
        assert_eq!(settings.auth.issuer, "https://tenant.example.com/");
    }

    #[test]
    fn missing_required_variable_is_reported() {
        let mut env = base_env();
        env.remove(AUTH_CLIENT_SECRET_ENV);
        assert_eq!(
            load(&env).unwrap_err(),
            ConfigError::Missing(AUTH_CLIENT_SECRET_ENV)
        );
    }

    #[test]
    fn empty_required_variable_is_rejected() {
        let mut env = base_env();
        env.insert(AUTH_AUDIENCE_ENV, "   ");
        assert_eq!(load(&env).unwrap_err(), ConfigError::Empty(AUTH_AUDIENCE_ENV));
    }

    #[test]
    fn domain_with_scheme_is_rejected() {
        let mut env = base_env();
        env.insert(AUTH_DOMAIN_ENV, "https://tenant.example.com");
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: AUTH_DOMAIN_ENV, .. })
        ));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut env = base_env();
        env.insert(PORT_ENV, "eighty");
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: PORT_ENV, .. })
        ));
    }

    #[test]
    fn debug_output_redacts_client_secret() {
        let settings = load(&base_env()).unwrap();
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("client-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("other"), LogFormat::Pretty);
    }
}
