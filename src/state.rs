// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{
    AuthError, JwksManager, ProviderClient, ProviderEndpoints, RoleAuthorizer,
    ServiceTokenSupplier, TokenValidator,
};
use crate::config::Settings;

/// Shared handles for request handlers.
///
/// Every component is cheap to clone; the key set and service token caches
/// are shared between clones.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub validator: TokenValidator,
    pub roles: RoleAuthorizer,
    pub tokens: ServiceTokenSupplier,
}

impl AppState {
    /// Build state against the provider tenant named in `settings`.
    pub fn new(settings: Settings) -> Result<Self, AuthError> {
        let endpoints = ProviderEndpoints::from_domain(&settings.auth.domain)
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;
        Self::with_client(settings, ProviderClient::new(endpoints))
    }

    /// Build state using an already configured provider client.
    pub fn with_client(settings: Settings, client: ProviderClient) -> Result<Self, AuthError> {
        let jwks = JwksManager::new(client.clone())?;
        let validator = TokenValidator::new(jwks, &settings.auth);
        let tokens = ServiceTokenSupplier::new(client.clone(), &settings.auth)?;
        let roles = RoleAuthorizer::new(client, tokens.clone());

        Ok(Self {
            settings: Arc::new(settings),
            validator,
            roles,
            tokens,
        })
    }
}
