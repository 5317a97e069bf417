// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer token authentication and role authorization against an external
//! OAuth2/OIDC identity provider tenant.
//!
//! ## Auth Flow
//!
//! 1. Client obtains an access token from the provider tenant
//! 2. Client sends `Authorization: Bearer <token>`
//! 3. Gateway:
//!    - Resolves the signing key from the tenant JWKS (cached, refetched on
//!      an unknown key id)
//!    - Verifies the RS256 signature, expiry, issuer and audience
//!    - For role-gated endpoints, looks up the subject's roles through the
//!      management API using a machine-to-machine service token
//!
//! ## Security
//!
//! - Only RS256 is accepted
//! - Clock skew tolerance is 60 seconds
//! - Error responses carry one of four fixed messages; details go to the
//!   logs only

pub mod claims;
pub mod error;
pub mod extractor;
pub mod header;
pub mod jwks;
pub mod provider;
pub mod roles;
pub mod service_token;
pub mod validator;

pub use claims::ValidatedClaims;
pub use error::{AuthError, AuthErrorKind};
pub use extractor::{AdminOnly, AdminRole, Auth, RequireRole, RoleRequirement, UserOnly, UserRole};
pub use jwks::{JwksManager, SigningKey};
pub use provider::{ProviderClient, ProviderEndpoints, ProviderError, RetryPolicy};
pub use roles::{RoleAuthorizer, RoleDecision, RoleRecord};
pub use service_token::ServiceTokenSupplier;
pub use validator::TokenValidator;
