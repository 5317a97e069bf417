// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role-based authorization against the provider management API.
//!
//! Role membership is looked up per request; nothing is cached locally.
//! Role pages are requested until a short page comes back, so membership
//! beyond the first page is seen.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;
use utoipa::ToSchema;

use super::provider::ProviderClient;
use super::service_token::ServiceTokenSupplier;
use super::AuthError;

/// Roles requested per management API page.
pub const ROLES_PAGE_SIZE: usize = 25;

/// Upper bound on pages walked for one subject.
const MAX_ROLE_PAGES: usize = 40;

/// A role record as returned by the management API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RoleRecord {
    /// Provider role id (e.g. `rol_0aBcD...`)
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Outcome of a role check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDecision {
    pub role_id: String,
    pub granted: bool,
}

/// Decides role membership of token subjects.
#[derive(Clone)]
pub struct RoleAuthorizer {
    client: ProviderClient,
    tokens: ServiceTokenSupplier,
}

impl RoleAuthorizer {
    pub fn new(client: ProviderClient, tokens: ServiceTokenSupplier) -> Self {
        Self { client, tokens }
    }

    /// Succeed iff `subject` holds `required_role`; otherwise
    /// `InsufficientPermissions`.
    pub async fn authorize(&self, subject: &str, required_role: &str) -> Result<RoleDecision, AuthError> {
        let decision = self.check(subject, required_role).await?;
        if !decision.granted {
            debug!(subject, role_id = required_role, "role check denied");
            return Err(AuthError::InsufficientPermissions(required_role.to_string()));
        }
        Ok(decision)
    }

    /// Look up whether `subject` holds `role_id`, stopping at the first page
    /// that contains it.
    pub async fn check(&self, subject: &str, role_id: &str) -> Result<RoleDecision, AuthError> {
        for page in 0..MAX_ROLE_PAGES {
            let roles = self.fetch_page(subject, page).await?;
            if roles.iter().any(|role| role.id == role_id) {
                return Ok(RoleDecision {
                    role_id: role_id.to_string(),
                    granted: true,
                });
            }
            if roles.len() < ROLES_PAGE_SIZE {
                break;
            }
        }
        Ok(RoleDecision {
            role_id: role_id.to_string(),
            granted: false,
        })
    }

    /// All roles of `subject`.
    pub async fn list_roles(&self, subject: &str) -> Result<Vec<RoleRecord>, AuthError> {
        let mut all = Vec::new();
        for page in 0..MAX_ROLE_PAGES {
            let roles = self.fetch_page(subject, page).await?;
            let last = roles.len() < ROLES_PAGE_SIZE;
            all.extend(roles);
            if last {
                return Ok(all);
            }
        }
        warn!(subject, pages = MAX_ROLE_PAGES, "role listing truncated at page cap");
        Ok(all)
    }

    /// Fetch one page, re-acquiring the service token once if the
    /// management API rejects it.
    async fn fetch_page(&self, subject: &str, page: usize) -> Result<Vec<RoleRecord>, AuthError> {
        let url = self.page_url(subject, page)?;
        let mut retried_auth = false;
        loop {
            let token = self.tokens.service_token().await?;
            match self.client.get_json::<Vec<RoleRecord>>(&url, Some(&token)).await {
                Ok(roles) => return Ok(roles),
                Err(e) if e.status() == Some(StatusCode::UNAUTHORIZED) && !retried_auth => {
                    warn!(subject, "management API rejected service token, re-acquiring");
                    self.tokens.invalidate_token(&token);
                    retried_auth = true;
                }
                Err(e) => {
                    if e.status() == Some(StatusCode::UNAUTHORIZED) {
                        self.tokens.invalidate_token(&token);
                    }
                    return Err(AuthError::ProviderUnavailable(format!("role lookup failed: {e}")));
                }
            }
        }
    }

    fn page_url(&self, subject: &str, page: usize) -> Result<Url, AuthError> {
        let mut url = self
            .client
            .endpoints()
            .user_roles_url(subject)
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &ROLES_PAGE_SIZE.to_string())
            .append_pair("include_totals", "false");
        Ok(url)
    }
}
