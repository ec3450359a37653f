//! OpenID Connect engine contract.
//!
//! The protocol engine (token issuance, signing, the authorization and token
//! endpoints) is a collaborator, not part of this crate. This module defines
//! the seams the bootstrap layer plugs into:
//!
//! - [`ValidationPolicy`] - decides the fate of client-schema violations
//! - [`AccountProvider`] - account lookup and claims
//! - [`Session`] / [`RequestContext`] - per-request session access
//! - [`ProviderEngine`] - construction from an [`EngineConfig`] and mounting
//!
//! [`LocalEngine`] is the embedded implementation used by the server binary.

pub mod claims;
pub mod context;
pub mod discovery;
pub mod local;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;

use crate::error::EngineError;
use crate::types::{AccountClaims, AccountRecord, ClientSpec};

pub use claims::ClaimsConfig;
pub use context::{InMemorySession, RequestContext, Session};
pub use local::LocalEngine;
pub use schema::{
    ClientSchema, SchemaViolation, SuppressedViolation, ValidationPolicy, ValidationReport,
    ViolationCode,
};

/// Account callbacks the engine calls during authentication and claims release.
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Resolves the account for a subject presented during authentication.
    ///
    /// # Errors
    ///
    /// Implementations may fail for malformed identifiers or session faults.
    async fn find_account(
        &self,
        ctx: &RequestContext,
        account_id: &str,
    ) -> Result<AccountRecord, EngineError>;

    /// Materialises the claims for a resolved account.
    fn claims(&self, account: &AccountRecord) -> AccountClaims;
}

/// Everything an engine needs at construction.
#[derive(Clone)]
pub struct EngineConfig {
    /// Client registrations, in registry order.
    pub clients: Vec<ClientSpec>,
    /// Scope to claims mapping.
    pub claims: ClaimsConfig,
    /// Whether PKCE is mandatory for every client.
    pub pkce_required: bool,
    /// Account callbacks.
    pub account_provider: Arc<dyn AccountProvider>,
    /// Policy applied to client-schema violations.
    pub validation_policy: Arc<dyn ValidationPolicy>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("clients", &self.clients.len())
            .field("claims", &self.claims)
            .field("pkce_required", &self.pkce_required)
            .field("validation_policy", &self.validation_policy)
            .finish_non_exhaustive()
    }
}

/// An OpenID Connect provider engine.
pub trait ProviderEngine: Sized + Send + Sync + 'static {
    /// Builds the engine for `issuer`, validating every client through the
    /// configured policy.
    ///
    /// # Errors
    ///
    /// Fails when a violation is not suppressed or the issuer is unusable.
    fn new(issuer: &str, config: EngineConfig) -> Result<Self, EngineError>;

    /// The engine's request handler, relative to its mount point.
    fn router(self: Arc<Self>) -> Router;
}
