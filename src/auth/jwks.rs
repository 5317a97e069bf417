// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing-key resolution from the provider's published JWKS.
//!
//! ## Caching
//!
//! - Keys are indexed by key id. Entries have no TTL; the set is refetched
//!   only when a token names a key id that is not cached.
//! - Concurrent misses share one outstanding fetch. The fetch runs as its
//!   own task, so a request that is cancelled while waiting does not cancel
//!   the fetch other requests are waiting on.
//! - Miss-driven refetches are rate limited by a minimum refresh interval so
//!   tokens carrying bogus key ids cannot trigger a fetch storm.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::DecodingKey;
use tracing::{debug, info, warn};
use url::Url;

use super::error::AuthError;
use super::provider::ProviderClient;

/// Default minimum time between two miss-driven refetches.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// A public key from the provider key set.
#[derive(Clone)]
pub struct SigningKey {
    pub key_id: String,
    pub decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

type KeyMap = HashMap<String, Arc<SigningKey>>;
type FetchResult = Result<Arc<KeyMap>, AuthError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

#[derive(Default)]
struct CacheState {
    keys: Arc<KeyMap>,
    last_attempt: Option<Instant>,
    last_error: Option<AuthError>,
}

struct Inner {
    client: ProviderClient,
    jwks_url: Url,
    cache: RwLock<CacheState>,
    in_flight: Mutex<Option<SharedFetch>>,
}

/// JWKS manager with caching.
#[derive(Clone)]
pub struct JwksManager {
    inner: Arc<Inner>,
    min_refresh_interval: Duration,
}

impl JwksManager {
    /// Create a manager fetching from the client's well-known JWKS URL.
    pub fn new(client: ProviderClient) -> Result<Self, AuthError> {
        let jwks_url = client
            .endpoints()
            .jwks_url()
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                jwks_url,
                cache: RwLock::new(CacheState::default()),
                in_flight: Mutex::new(None),
            }),
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        })
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn jwks_url(&self) -> &Url {
        &self.inner.jwks_url
    }

    /// Resolve the signing key for `kid`, fetching the key set on a miss.
    ///
    /// A key id still missing after a fresh fetch is `UnknownSigningKey`.
    pub async fn resolve(&self, kid: &str) -> Result<Arc<SigningKey>, AuthError> {
        if let Some(key) = self.inner.snapshot().get(kid) {
            return Ok(key.clone());
        }

        debug!(kid, "signing key not cached, refreshing key set");
        let keys = self.fetch(true).await?;
        keys.get(kid)
            .cloned()
            .ok_or_else(|| AuthError::UnknownSigningKey(kid.to_string()))
    }

    /// Force a refetch of the key set, joining any fetch already running.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        self.fetch(false).await.map(|_| ())
    }

    /// Make sure a key set is cached, fetching it if not.
    ///
    /// Unlike [`refresh`](Self::refresh) this honours the refresh interval,
    /// so repeated calls while the provider is down reuse the last failure.
    pub async fn ensure_loaded(&self) -> Result<(), AuthError> {
        if self.is_cached() {
            return Ok(());
        }
        self.fetch(true).await.map(|_| ())
    }

    /// Whether at least one key is cached.
    pub fn is_cached(&self) -> bool {
        !self.inner.snapshot().is_empty()
    }

    async fn fetch(&self, rate_limited: bool) -> FetchResult {
        let fetch = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if let Some(fetch) = slot.as_ref() {
                fetch.clone()
            } else {
                if rate_limited {
                    if let Some(recent) = self.inner.recent_outcome(self.min_refresh_interval) {
                        debug!("key set fetched recently, not refetching");
                        return recent;
                    }
                }

                // The slot stays locked until the handle is stored, so the
                // task cannot clear it before it is set.
                let inner = self.inner.clone();
                let task = tokio::spawn(async move { inner.fetch_and_store().await });
                let fetch = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(AuthError::KeySetUnavailable(format!("key set fetch task failed: {e}")))
                    })
                }
                .boxed()
                .shared();
                *slot = Some(fetch.clone());
                fetch
            }
        };

        fetch.await
    }
}

impl Inner {
    fn snapshot(&self) -> Arc<KeyMap> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys
            .clone()
    }

    /// Outcome of the last attempt if it happened within `interval`.
    fn recent_outcome(&self, interval: Duration) -> Option<FetchResult> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        let last_attempt = cache.last_attempt?;
        if last_attempt.elapsed() >= interval {
            return None;
        }
        Some(match &cache.last_error {
            Some(err) => Err(err.clone()),
            None => Ok(cache.keys.clone()),
        })
    }

    async fn fetch_and_store(&self) -> FetchResult {
        let result = self
            .client
            .get_json::<JwkSet>(&self.jwks_url, None)
            .await
            .map(|jwks| Arc::new(index_keys(&jwks)))
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()));

        {
            let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
            cache.last_attempt = Some(Instant::now());
            match &result {
                Ok(keys) => {
                    info!(url = %self.jwks_url, keys = keys.len(), "signing key set refreshed");
                    cache.keys = keys.clone();
                    cache.last_error = None;
                }
                Err(err) => {
                    warn!(url = %self.jwks_url, error = %err, "signing key set fetch failed");
                    cache.last_error = Some(err.clone());
                }
            }
        }

        *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner) = None;
        result
    }
}

/// Index every usable RSA key of the set by key id.
fn index_keys(jwks: &JwkSet) -> KeyMap {
    jwks.keys
        .iter()
        .filter_map(|jwk| match jwk_to_signing_key(jwk) {
            Ok(key) => Some((key.key_id.clone(), Arc::new(key))),
            Err(reason) => {
                debug!(kid = ?jwk.common.key_id, reason, "skipping key set entry");
                None
            }
        })
        .collect()
}

/// Convert a JWK to a signing key. Only RSA keys with a key id qualify.
fn jwk_to_signing_key(jwk: &Jwk) -> Result<SigningKey, &'static str> {
    let key_id = jwk.common.key_id.clone().ok_or("missing kid")?;
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let decoding_key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|_| "invalid RSA components")?;
            Ok(SigningKey {
                key_id,
                decoding_key,
            })
        }
        _ => Err("unsupported key type"),
    }
}
