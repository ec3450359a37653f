//! # octofhir-idp
//!
//! Bootstrap and policy layer for an embedded OpenID Connect provider used in
//! local and test deployments.
//!
//! This crate provides:
//! - Environment-driven client registration for three flow profiles
//! - A validation policy that suppresses a fixed allow-list of client checks
//! - Stateless account lookup with optional consent bypass
//! - Assembly of the engine under an issuer path prefix with proxy trust
//!
//! ## Overview
//!
//! Configuration flows one way: [`config::EnvConfigLoader`] reads the
//! environment, [`registry::ClientRegistryBuilder`] turns per-client values
//! into registrations, and [`assembly::ProviderAssembly`] hands everything to
//! a [`engine::ProviderEngine`] and mounts its router.
//!
//! ## Modules
//!
//! - [`config`] - Environment variables, defaults and validation
//! - [`registry`] - Client registrations per flow profile
//! - [`policy`] - Client validation policies
//! - [`account`] - Account lookup, claims and consent bypass
//! - [`assembly`] - Engine construction and mounting
//! - [`engine`] - Engine contract and the embedded engine
//! - [`http`] - Request origin resolution
//! - [`types`] - Client, account and profile types

pub mod account;
pub mod assembly;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod policy;
pub mod registry;
pub mod types;

pub use account::{AccountClaimsResolver, CONSENT_BYPASS_SCOPES};
pub use assembly::{MountedProvider, ProviderAssembly};
pub use config::{ClientEnv, ClientField, EnvConfigLoader, IdpConfig, IssuerConfig, Scheme};
pub use engine::{
    AccountProvider, EngineConfig, InMemorySession, LocalEngine, ProviderEngine, RequestContext,
    Session, ValidationPolicy, ViolationCode,
};
pub use error::{AccountError, ConfigError, EngineError, EngineValidationError, IdpError};
pub use policy::{StrictPolicy, SuppressingPolicy, ValidationSuppressionSet};
pub use registry::{ClientRegistry, ClientRegistryBuilder};
pub use types::{
    AccountClaims, AccountRecord, ClientSpec, FlowProfile, GrantType, ResponseType,
    TokenEndpointAuthMethod,
};

/// Type alias for provider assembly results.
pub type IdpResult<T> = Result<T, IdpError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use octofhir_idp::prelude::*;
/// ```
pub mod prelude {
    pub use crate::IdpResult;
    pub use crate::account::AccountClaimsResolver;
    pub use crate::assembly::{MountedProvider, ProviderAssembly};
    pub use crate::config::{EnvConfigLoader, IdpConfig, IssuerConfig};
    pub use crate::engine::{LocalEngine, ProviderEngine, RequestContext};
    pub use crate::error::{ConfigError, EngineError, IdpError};
    pub use crate::policy::ValidationSuppressionSet;
    pub use crate::registry::ClientRegistryBuilder;
    pub use crate::types::{ClientSpec, FlowProfile};
}
