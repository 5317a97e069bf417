// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Machine-to-machine access token for the provider management API.
//!
//! The token is obtained with a client-credentials exchange, cached with its
//! acquisition time and lifetime, and refreshed once it is within the
//! refresh margin of expiry.
//!
//! Concurrent callers needing a refresh share one exchange and its outcome,
//! failure included. The exchange runs as its own task, so a caller that is
//! cancelled while waiting does not cancel it for the others.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::provider::ProviderClient;
use super::AuthError;
use crate::config::AuthSettings;

/// Refresh this long before the token expires.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

const GRANT_TYPE: &str = "client_credentials";

/// A service access token and its lifetime.
#[derive(Debug, Clone)]
pub struct ServiceAccessToken {
    pub value: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_in: Duration,
}

impl ServiceAccessToken {
    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.expires_in)
            .ok()
            .and_then(|lifetime| self.acquired_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the token expires within `margin` of `now`.
    ///
    /// The margin is capped at half the token lifetime, so a token issued
    /// for less than twice the margin is still reused for half its life.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let margin = margin.min(self.expires_in / 2);
        chrono::Duration::from_std(margin)
            .ok()
            .and_then(|margin| now.checked_add_signed(margin))
            .is_none_or(|deadline| deadline >= self.expires_at())
    }
}

#[derive(Serialize)]
struct ClientCredentialsRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
    grant_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}

type ExchangeResult = Result<String, AuthError>;
type SharedExchange = Shared<BoxFuture<'static, ExchangeResult>>;

struct Inner {
    client: ProviderClient,
    token_url: Url,
    client_id: String,
    client_secret: String,
    audience: String,
    current: Mutex<Option<ServiceAccessToken>>,
    in_flight: Mutex<Option<SharedExchange>>,
}

/// Supplies a valid service token, exchanging credentials when needed.
#[derive(Clone)]
pub struct ServiceTokenSupplier {
    inner: Arc<Inner>,
    refresh_margin: Duration,
}

impl ServiceTokenSupplier {
    pub fn new(client: ProviderClient, settings: &AuthSettings) -> Result<Self, AuthError> {
        let token_url = client
            .endpoints()
            .token_url()
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                token_url,
                client_id: settings.client_id.clone(),
                client_secret: settings.client_secret.clone(),
                audience: settings.management_audience.clone(),
                current: Mutex::new(None),
                in_flight: Mutex::new(None),
            }),
            refresh_margin: DEFAULT_REFRESH_MARGIN,
        })
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Return a token valid for at least the refresh margin.
    pub async fn service_token(&self) -> Result<String, AuthError> {
        if let Some(value) = self.fresh_token() {
            return Ok(value);
        }

        let exchange = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if let Some(exchange) = slot.as_ref() {
                exchange.clone()
            } else {
                // An exchange may have finished since the first check.
                if let Some(value) = self.fresh_token() {
                    return Ok(value);
                }

                // The slot stays locked until the handle is stored, so the
                // task cannot clear it before it is set.
                let inner = self.inner.clone();
                let task = tokio::spawn(async move { inner.exchange_and_store().await });
                let exchange = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(AuthError::ProviderUnavailable(format!("token exchange task failed: {e}")))
                    })
                }
                .boxed()
                .shared();
                *slot = Some(exchange.clone());
                exchange
            }
        };

        exchange.await
    }

    /// Drop the cached token so the next call re-acquires one.
    pub fn invalidate(&self) {
        self.inner.current().take();
    }

    /// Drop the cached token only if it is still `rejected`, keeping a
    /// newer token another caller may already have acquired.
    pub fn invalidate_token(&self, rejected: &str) {
        let mut current = self.inner.current();
        if current.as_ref().is_some_and(|token| token.value == rejected) {
            debug!("dropping rejected service token");
            current.take();
        }
    }

    fn fresh_token(&self) -> Option<String> {
        let current = self.inner.current();
        let token = current.as_ref()?;
        if token.needs_refresh(Utc::now(), self.refresh_margin) {
            debug!(expires_at = %token.expires_at(), "service token near expiry, refreshing");
            return None;
        }
        Some(token.value.clone())
    }
}

impl Inner {
    fn current(&self) -> std::sync::MutexGuard<'_, Option<ServiceAccessToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn exchange_and_store(&self) -> ExchangeResult {
        let result = self.exchange().await;
        match &result {
            Ok(token) => *self.current() = Some(token.clone()),
            Err(err) => warn!(url = %self.token_url, error = %err, "service token exchange failed"),
        }

        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = None;
        result.map(|token| token.value)
    }

    async fn exchange(&self) -> Result<ServiceAccessToken, AuthError> {
        let request = ClientCredentialsRequest {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            audience: &self.audience,
            grant_type: GRANT_TYPE,
        };

        let acquired_at = Utc::now();
        let response: TokenResponse = self
            .client
            .post_json(&self.token_url, &request)
            .await
            .map_err(|e| AuthError::ProviderUnavailable(format!("token exchange failed: {e}")))?;

        if response.access_token.trim().is_empty() {
            return Err(AuthError::ProviderUnavailable(
                "token response did not include access_token".to_string(),
            ));
        }

        info!(expires_in = response.expires_in, "service access token acquired");
        Ok(ServiceAccessToken {
            value: response.access_token,
            acquired_at,
            expires_in: Duration::from_secs(response.expires_in),
        })
    }
}
