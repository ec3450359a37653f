//! Provider assembly.
//!
//! Composes the client registry, account resolver and validation policy into
//! an [`EngineConfig`], instantiates the engine, and mounts its router under
//! the issuer path prefix with proxy trust applied.

use std::sync::Arc;

use axum::Router;
use axum::middleware;

use crate::account::AccountClaimsResolver;
use crate::config::{ISSUER_PREFIX, IdpConfig, IssuerConfig, validate_path_prefix};
use crate::engine::{ClaimsConfig, EngineConfig, ProviderEngine};
use crate::error::{ConfigError, IdpError};
use crate::http::{OriginPolicy, resolve_origin};
use crate::policy::{SuppressingPolicy, ValidationSuppressionSet};
use crate::registry::{ClientRegistry, ClientRegistryBuilder};
use crate::types::FlowProfile;

/// An engine mounted under its path prefix.
pub struct MountedProvider<E> {
    /// The instantiated engine.
    pub engine: Arc<E>,
    /// Router with the engine nested at the prefix.
    pub router: Router,
    /// Issuer the engine was built for.
    pub issuer: IssuerConfig,
}

impl<E> std::fmt::Debug for MountedProvider<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountedProvider")
            .field("issuer", &self.issuer.issuer())
            .finish_non_exhaustive()
    }
}

/// Everything needed to build and mount the engine.
#[derive(Debug, Clone)]
pub struct ProviderAssembly {
    issuer: IssuerConfig,
    profile: FlowProfile,
    clients: ClientRegistry,
    suppression: ValidationSuppressionSet,
    claims: ClaimsConfig,
    resolver: AccountClaimsResolver,
}

impl ProviderAssembly {
    /// Creates an assembly with the default suppression set.
    #[must_use]
    pub fn new(
        issuer: IssuerConfig,
        profile: FlowProfile,
        clients: ClientRegistry,
        resolver: AccountClaimsResolver,
    ) -> Self {
        Self {
            issuer,
            profile,
            clients,
            suppression: ValidationSuppressionSet::default(),
            claims: ClaimsConfig::default(),
            resolver,
        }
    }

    /// Builds the registry and resolver from loaded configuration.
    pub fn from_config(config: &IdpConfig) -> Result<Self, ConfigError> {
        let clients = ClientRegistryBuilder::new(config.profile).build(&config.clients)?;
        let resolver = AccountClaimsResolver::new(&config.email_domain, config.profile);
        Ok(
            Self::new(config.issuer.clone(), config.profile, clients, resolver)
                .with_suppression(config.suppression.clone()),
        )
    }

    #[must_use]
    pub fn with_suppression(mut self, suppression: ValidationSuppressionSet) -> Self {
        self.suppression = suppression;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &IssuerConfig {
        &self.issuer
    }

    #[must_use]
    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Configuration handed to the engine.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            clients: self.clients.clone().into_vec(),
            claims: self.claims.clone(),
            pkce_required: self.profile.pkce_required(),
            account_provider: Arc::new(self.resolver.clone()),
            validation_policy: Arc::new(SuppressingPolicy::new(self.suppression.clone())),
        }
    }

    /// Instantiates the engine and mounts it.
    ///
    /// # Errors
    ///
    /// Fails when the path prefix is not literal path text, or when the engine
    /// rejects a client registration or the issuer.
    pub fn build<E: ProviderEngine>(&self) -> Result<MountedProvider<E>, IdpError> {
        validate_path_prefix(&self.issuer.path_prefix)
            .map_err(|e| ConfigError::invalid(ISSUER_PREFIX, e))?;
        let issuer = self.issuer.issuer();

        if !self.suppression.is_empty() && self.issuer.trust_proxy() && !self.issuer.is_localhost()
        {
            tracing::warn!(
                issuer = %issuer,
                suppressed = %self.suppression,
                "Client validation suppression is active on a public https issuer"
            );
        }
        for client_id in self.clients.duplicate_client_ids() {
            tracing::warn!(client_id, "Duplicate client_id in registry");
        }

        let engine = Arc::new(E::new(&issuer, self.engine_config())?);

        let policy = OriginPolicy {
            trust_proxy: self.issuer.trust_proxy(),
            fallback_host: self.issuer.host.clone(),
        };
        let router = mount(&self.issuer.path_prefix, Arc::clone(&engine).router())
            .layer(middleware::from_fn_with_state(policy, resolve_origin));

        tracing::info!(
            issuer = %issuer,
            profile = %self.profile,
            clients = self.clients.len(),
            trust_proxy = self.issuer.trust_proxy(),
            "Provider assembled"
        );

        Ok(MountedProvider {
            engine,
            router,
            issuer: self.issuer.clone(),
        })
    }
}

/// Root prefix merges, anything else nests.
fn mount(prefix: &str, engine: Router) -> Router {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        Router::new().merge(engine)
    } else {
        Router::new().nest(prefix, engine)
    }
}
