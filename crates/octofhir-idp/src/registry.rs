//! Client registry construction.
//!
//! Per-client environment values plus the deployment's [`FlowProfile`] become
//! the ordered list of [`ClientSpec`] registrations handed to the engine.

use std::collections::BTreeMap;

use crate::config::{ClientEnv, ClientField, client_variable_name};
use crate::error::ConfigError;
use crate::types::{ClientSpec, FlowProfile, TokenEndpointAuthMethod};

/// Builds client registrations for one profile.
#[derive(Debug, Clone, Copy)]
pub struct ClientRegistryBuilder {
    profile: FlowProfile,
}

impl ClientRegistryBuilder {
    #[must_use]
    pub fn new(profile: FlowProfile) -> Self {
        Self { profile }
    }

    /// Builds all clients, ascending by index.
    ///
    /// # Errors
    ///
    /// Fails on the first client with a missing required field, an unknown
    /// auth method, or no redirect URIs. No partial registry is returned.
    pub fn build(&self, envs: &[ClientEnv]) -> Result<ClientRegistry, ConfigError> {
        let mut clients = envs
            .iter()
            .map(|env| self.build_client(env))
            .collect::<Result<Vec<_>, _>>()?;
        clients.sort_by_key(|c| c.index);

        tracing::info!(
            profile = %self.profile,
            clients = clients.len(),
            "Client registry built"
        );
        Ok(ClientRegistry { clients })
    }

    fn build_client(&self, env: &ClientEnv) -> Result<ClientSpec, ConfigError> {
        let client_id = env.require(ClientField::ClientId)?.to_string();
        let redirect_uri = env.require(ClientField::RedirectUri)?;
        let logout_redirect_uri = env.require(ClientField::LogoutRedirectUri)?;

        let redirect_uris: Vec<String> = [Some(redirect_uri), env.get(ClientField::SilentRedirectUri)]
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        if redirect_uris.is_empty() {
            return Err(ConfigError::EmptyRedirectUris { index: env.index });
        }

        let (client_secret, token_endpoint_auth_method) = match self.profile.fixed_auth_method() {
            Some(method) => (None, method),
            None => {
                let secret = env.require(ClientField::ClientSecret)?.to_string();
                let raw = env.require(ClientField::TokenEndpointAuthMethod)?;
                let method = raw.parse::<TokenEndpointAuthMethod>().map_err(|e| {
                    ConfigError::invalid(
                        client_variable_name(ClientField::TokenEndpointAuthMethod, env.index),
                        e,
                    )
                })?;
                (Some(secret), method)
            }
        };

        tracing::debug!(
            index = env.index,
            client_id = %client_id,
            auth_method = %token_endpoint_auth_method,
            "Client registered"
        );

        Ok(ClientSpec {
            index: env.index,
            client_id,
            client_secret,
            token_endpoint_auth_method,
            redirect_uris,
            post_logout_redirect_uris: vec![logout_redirect_uri.to_string()],
            response_types: self.profile.response_types().to_vec(),
            grant_types: self.profile.grant_types().map(<[_]>::to_vec),
            pkce_required: self.profile.pkce_required(),
        })
    }
}

/// Ordered, immutable set of client registrations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientRegistry {
    clients: Vec<ClientSpec>,
}

impl ClientRegistry {
    pub fn iter(&self) -> impl Iterator<Item = &ClientSpec> {
        self.clients.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Looks up a client by id.
    #[must_use]
    pub fn get(&self, client_id: &str) -> Option<&ClientSpec> {
        self.clients.iter().find(|c| c.client_id == client_id)
    }

    /// Client ids registered more than once, sorted.
    ///
    /// Duplicates are not rejected here; the engine reports them with
    /// `client-id-duplicate`.
    #[must_use]
    pub fn duplicate_client_ids(&self) -> Vec<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for client in &self.clients {
            *counts.entry(client.client_id.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(id, _)| id)
            .collect()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<ClientSpec> {
        self.clients
    }
}

impl<'a> IntoIterator for &'a ClientRegistry {
    type Item = &'a ClientSpec;
    type IntoIter = std::slice::Iter<'a, ClientSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.clients.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GrantType, ResponseType};

    fn env(index: usize, id: &str) -> ClientEnv {
        ClientEnv::new(index)
            .with(ClientField::ClientId, id)
            .with(ClientField::RedirectUri, format!("http://localhost:{}/cb", 4200 + index))
            .with(ClientField::LogoutRedirectUri, format!("http://localhost:{}/", 4200 + index))
    }

    fn confidential(index: usize, id: &str) -> ClientEnv {
        env(index, id)
            .with(ClientField::ClientSecret, "s3cret")
            .with(ClientField::TokenEndpointAuthMethod, "client_secret_post")
    }

    #[test]
    fn test_auth_code_pkce_profile() {
        let registry = ClientRegistryBuilder::new(FlowProfile::AuthCodeWithPkce)
            .build(&[env(1, "spa")])
            .unwrap();
        let client = registry.get("spa").unwrap();

        assert_eq!(client.response_types, vec![ResponseType::Code]);
        assert_eq!(client.grant_types, None);
        assert_eq!(client.token_endpoint_auth_method, TokenEndpointAuthMethod::None);
        assert_eq!(client.client_secret, None);
        assert!(client.pkce_required);
        assert_eq!(client.redirect_uris, vec!["http://localhost:4201/cb"]);
        assert_eq!(client.post_logout_redirect_uris, vec!["http://localhost:4201/"]);
    }

    #[test]
    fn test_implicit_profile() {
        let registry = ClientRegistryBuilder::new(FlowProfile::ImplicitOnly)
            .build(&[env(1, "a"), env(2, "b")])
            .unwrap();

        for client in &registry {
            assert_eq!(client.response_types, vec![ResponseType::IdTokenToken]);
            assert_eq!(client.grant_types, Some(vec![GrantType::Implicit]));
            assert_eq!(client.token_endpoint_auth_method, TokenEndpointAuthMethod::None);
            assert!(!client.pkce_required);
        }
    }

    #[test]
    fn test_implicit_plus_auth_code_profile() {
        let registry = ClientRegistryBuilder::new(FlowProfile::ImplicitPlusAuthCode)
            .build(&[confidential(1, "web")])
            .unwrap();
        let client = registry.get("web").unwrap();

        assert_eq!(
            client.response_types,
            vec![ResponseType::IdTokenToken, ResponseType::Code]
        );
        assert_eq!(
            client.grant_types,
            Some(vec![GrantType::Implicit, GrantType::AuthorizationCode])
        );
        assert_eq!(
            client.token_endpoint_auth_method,
            TokenEndpointAuthMethod::ClientSecretPost
        );
        assert_eq!(client.client_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_confidential_profile_requires_secret() {
        let err = ClientRegistryBuilder::new(FlowProfile::ImplicitPlusAuthCode)
            .build(&[confidential(1, "a"), env(2, "b")])
            .unwrap_err();
        assert_eq!(err, ConfigError::missing("CLIENT_SECRET_2"));
    }

    #[test]
    fn test_unknown_auth_method_names_suffixed_variable() {
        let bad = env(2, "b")
            .with(ClientField::ClientSecret, "s3cret")
            .with(ClientField::TokenEndpointAuthMethod, "magic");
        let err = ClientRegistryBuilder::new(FlowProfile::ImplicitPlusAuthCode)
            .build(&[confidential(1, "a"), bad])
            .unwrap_err();
        assert_eq!(err.variable(), Some("CLIENT_TOKEN_ENDPOINT_AUTH_METHOD_2"));

        let ignored = env(1, "a").with(ClientField::TokenEndpointAuthMethod, "magic");
        let registry = ClientRegistryBuilder::new(FlowProfile::AuthCodeWithPkce)
            .build(&[ignored])
            .unwrap();
        assert_eq!(
            registry.get("a").unwrap().token_endpoint_auth_method,
            TokenEndpointAuthMethod::None
        );
    }

    #[test]
    fn test_silent_redirect_uri_is_second() {
        let with_silent = env(1, "a").with(ClientField::SilentRedirectUri, "http://localhost:4201/silent");
        let registry = ClientRegistryBuilder::new(FlowProfile::ImplicitOnly)
            .build(&[with_silent])
            .unwrap();
        let client = registry.get("a").unwrap();

        assert_eq!(client.redirect_uri(), Some("http://localhost:4201/cb"));
        assert_eq!(client.silent_redirect_uri(), Some("http://localhost:4201/silent"));
    }

    #[test]
    fn test_n_clients_in_ascending_index_order() {
        let envs: Vec<_> = [3, 1, 5, 2, 4]
            .into_iter()
            .map(|i| env(i, &format!("c{i}")))
            .collect();
        let registry = ClientRegistryBuilder::new(FlowProfile::ImplicitOnly)
            .build(&envs)
            .unwrap();

        let indexes: Vec<_> = registry.iter().map(|c| c.index).collect();
        assert_eq!(indexes, [1, 2, 3, 4, 5]);
        assert_eq!(registry.len(), 5);
        assert!(registry.duplicate_client_ids().is_empty());
    }

    #[test]
    fn test_missing_field_names_suffixed_variable() {
        let broken = ClientEnv::new(2)
            .with(ClientField::ClientId, "b")
            .with(ClientField::RedirectUri, "http://localhost/cb");
        let err = ClientRegistryBuilder::new(FlowProfile::AuthCodeWithPkce)
            .build(&[env(1, "a"), broken])
            .unwrap_err();
        assert_eq!(err, ConfigError::missing("CLIENT_LOGOUT_REDIRECT_URI_2"));
    }

    #[test]
    fn test_duplicate_client_ids_are_reported_not_rejected() {
        let registry = ClientRegistryBuilder::new(FlowProfile::ImplicitOnly)
            .build(&[env(1, "same"), env(2, "same"), env(3, "other")])
            .unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.duplicate_client_ids(), vec!["same"]);
    }

    #[test]
    fn test_registration_metadata_has_no_secret_for_public_clients() {
        let registry = ClientRegistryBuilder::new(FlowProfile::AuthCodeWithPkce)
            .build(&[env(1, "spa")])
            .unwrap();
        let json = serde_json::to_value(registry.get("spa").unwrap()).unwrap();
        assert!(json.get("client_secret").is_none());
        assert!(json.get("grant_types").is_none());
        assert_eq!(json["token_endpoint_auth_method"], "none");
    }
}
