// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP plumbing for the identity provider.
//!
//! All calls to the provider (key set, token endpoint, management API) go
//! through [`ProviderClient`], which retries transient failures with
//! bounded exponential backoff.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;
use url::Url;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure talking to the identity provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("cannot build provider URL: {0}")]
    Url(String),
}

impl ProviderError {
    /// Transport errors, 5xx and 429 are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport { .. } => true,
            ProviderError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            ProviderError::Decode { .. } | ProviderError::Url(_) => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Retry policy for provider calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }
}

/// Well-known endpoint locations of the provider tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    base: Url,
}

impl ProviderEndpoints {
    /// Endpoints of `https://{domain}`.
    pub fn from_domain(domain: &str) -> Result<Self, ProviderError> {
        Self::with_base_url(&format!("https://{domain}"))
    }

    /// Endpoints under an explicit base URL.
    pub fn with_base_url(base: &str) -> Result<Self, ProviderError> {
        let mut base = Url::parse(base).map_err(|e| ProviderError::Url(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ProviderError::Url(format!("{base} cannot be a base URL")));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    fn join(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::Url(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn jwks_url(&self) -> Result<Url, ProviderError> {
        self.join(&[".well-known", "jwks.json"])
    }

    pub fn token_url(&self) -> Result<Url, ProviderError> {
        self.join(&["oauth", "token"])
    }

    /// Role listing of one user in the management API. The subject is
    /// percent-encoded as a single path segment.
    pub fn user_roles_url(&self, subject: &str) -> Result<Url, ProviderError> {
        self.join(&["api", "v2", "users", subject, "roles"])
    }
}

/// Shared HTTP client for provider calls.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: Client,
    endpoints: ProviderEndpoints,
    retry: RetryPolicy,
}

impl ProviderClient {
    pub fn new(endpoints: ProviderEndpoints) -> Self {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "falling back to default HTTP client");
                Client::new()
            });
        Self {
            http,
            endpoints,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.endpoints
    }

    /// GET a JSON document, optionally with a bearer token.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        bearer: Option<&str>,
    ) -> Result<T, ProviderError> {
        self.execute(url, || {
            let request = self.http.get(url.clone());
            match bearer {
                Some(token) => request.bearer_auth(token),
                None => request,
            }
        })
        .await
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B, T>(&self, url: &Url, body: &B) -> Result<T, ProviderError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(url, || self.http.post(url.clone()).json(body))
            .await
    }

    async fn execute<T, F>(&self, url: &Url, build: F) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let attempt = || send_once::<T>(url, build());
        attempt
            .retry(self.retry.backoff())
            .when(ProviderError::is_transient)
            .notify(|err: &ProviderError, delay: Duration| {
                warn!(
                    url = %url,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "retrying identity provider request"
                );
            })
            .await
    }
}

async fn send_once<T: DeserializeOwned>(url: &Url, request: RequestBuilder) -> Result<T, ProviderError> {
    let response = request.send().await.map_err(|e| ProviderError::Transport {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            url: url.to_string(),
            status,
        });
    }

    response.json::<T>().await.map_err(|e| ProviderError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}
