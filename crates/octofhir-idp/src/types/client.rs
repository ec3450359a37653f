//! Relying-party registration types.
//!
//! `ClientSpec` serialises with the OpenID Connect Dynamic Client Registration
//! metadata names, which is the shape the engine consumes.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 grant types a client may be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code flow.
    AuthorizationCode,
    /// Implicit flow (tokens returned from the authorization endpoint).
    Implicit,
}

impl GrantType {
    /// Returns the OAuth 2.0 grant_type parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Implicit => "implicit",
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Response Type
// =============================================================================

/// Authorization endpoint response types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResponseType {
    /// `code`
    #[serde(rename = "code")]
    Code,
    /// `id_token token`
    #[serde(rename = "id_token token")]
    IdTokenToken,
}

impl ResponseType {
    /// Returns the response_type parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::IdTokenToken => "id_token token",
        }
    }

    /// Whether this response type returns tokens from the authorization endpoint.
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        matches!(self, Self::IdTokenToken)
    }
}

impl std::fmt::Display for ResponseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Token Endpoint Auth Method
// =============================================================================

/// How a client authenticates at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// Public client, no authentication.
    None,
    /// HTTP Basic with client_id and client_secret.
    ClientSecretBasic,
    /// client_id and client_secret in the form body.
    ClientSecretPost,
    /// JWT assertion signed with the client secret.
    ClientSecretJwt,
    /// JWT assertion signed with a private key.
    PrivateKeyJwt,
}

impl TokenEndpointAuthMethod {
    /// All recognised methods.
    pub const ALL: [Self; 5] = [
        Self::None,
        Self::ClientSecretBasic,
        Self::ClientSecretPost,
        Self::ClientSecretJwt,
        Self::PrivateKeyJwt,
    ];

    /// Returns the registration metadata value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::ClientSecretJwt => "client_secret_jwt",
            Self::PrivateKeyJwt => "private_key_jwt",
        }
    }

    /// Whether the method needs a shared client secret.
    #[must_use]
    pub fn requires_secret(&self) -> bool {
        matches!(
            self,
            Self::ClientSecretBasic | Self::ClientSecretPost | Self::ClientSecretJwt
        )
    }
}

impl std::fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TokenEndpointAuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|m| m.as_str()).collect();
                format!("unknown token endpoint auth method '{s}', expected one of {known:?}")
            })
    }
}

// =============================================================================
// Client Spec
// =============================================================================

/// One configured relying party.
///
/// Built once at startup by the registry builder and never mutated afterwards.
/// `redirect_uris` always starts with the primary redirect URI; the silent
/// renew URI, when configured, is second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSpec {
    /// 1-based ordinal of the client in the environment.
    #[serde(skip)]
    pub index: usize,

    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// Shared secret, present only for confidential clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Token endpoint authentication method.
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,

    /// Primary and (optional) silent redirect URIs, in that order.
    pub redirect_uris: Vec<String>,

    /// Allowed post-logout redirect URIs.
    pub post_logout_redirect_uris: Vec<String>,

    /// Response types the client may request.
    pub response_types: Vec<ResponseType>,

    /// Grant types, or `None` to take the engine default for the response types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_types: Option<Vec<GrantType>>,

    /// Whether the engine must demand PKCE from this client.
    #[serde(skip)]
    pub pkce_required: bool,
}

impl ClientSpec {
    /// The primary redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uris.first().map(String::as_str)
    }

    /// The silent renew redirect URI, if configured.
    #[must_use]
    pub fn silent_redirect_uri(&self) -> Option<&str> {
        self.redirect_uris.get(1).map(String::as_str)
    }

    /// Grant types as the engine will apply them.
    ///
    /// Without an explicit list the engine registers `authorization_code`.
    #[must_use]
    pub fn effective_grant_types(&self) -> Vec<GrantType> {
        self.grant_types
            .clone()
            .unwrap_or_else(|| vec![GrantType::AuthorizationCode])
    }

    /// Whether any registered response type is an implicit one.
    #[must_use]
    pub fn uses_implicit(&self) -> bool {
        self.response_types.iter().any(ResponseType::is_implicit)
    }

    /// Checks if the given redirect URI is registered for this client.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn public_client() -> ClientSpec {
        ClientSpec {
            index: 1,
            client_id: "spa".to_string(),
            client_secret: None,
            token_endpoint_auth_method: TokenEndpointAuthMethod::None,
            redirect_uris: vec![
                "http://localhost:4200/callback".to_string(),
                "http://localhost:4200/silent".to_string(),
            ],
            post_logout_redirect_uris: vec!["http://localhost:4200/".to_string()],
            response_types: vec![ResponseType::Code],
            grant_types: None,
            pkce_required: true,
        }
    }

    #[test]
    fn test_redirect_uri_accessors() {
        let client = public_client();
        assert_eq!(client.redirect_uri(), Some("http://localhost:4200/callback"));
        assert_eq!(client.silent_redirect_uri(), Some("http://localhost:4200/silent"));
        assert!(client.is_redirect_uri_allowed("http://localhost:4200/silent"));
        assert!(!client.is_redirect_uri_allowed("http://evil.example/callback"));
    }

    #[test]
    fn test_effective_grant_types_default_to_code() {
        let client = public_client();
        assert_eq!(client.effective_grant_types(), vec![GrantType::AuthorizationCode]);
        assert!(!client.uses_implicit());
    }

    #[test]
    fn test_serializes_registration_metadata() {
        let client = public_client();
        let json = serde_json::to_value(&client).unwrap();

        assert_eq!(json["client_id"], "spa");
        assert_eq!(json["token_endpoint_auth_method"], "none");
        assert_eq!(json["response_types"], serde_json::json!(["code"]));
        assert_eq!(json["redirect_uris"].as_array().unwrap().len(), 2);
        // engine default applies when no grant types are set
        assert!(json.get("grant_types").is_none());
        assert!(json.get("client_secret").is_none());
        assert!(json.get("index").is_none());
    }

    #[test]
    fn test_implicit_response_type_wire_value() {
        let json = serde_json::to_value(ResponseType::IdTokenToken).unwrap();
        assert_eq!(json, "id_token token");
        assert!(ResponseType::IdTokenToken.is_implicit());
    }

    #[test]
    fn test_auth_method_parsing() {
        assert_eq!(
            "client_secret_basic".parse::<TokenEndpointAuthMethod>(),
            Ok(TokenEndpointAuthMethod::ClientSecretBasic)
        );
        assert!("basic".parse::<TokenEndpointAuthMethod>().is_err());
        assert!(TokenEndpointAuthMethod::ClientSecretPost.requires_secret());
        assert!(!TokenEndpointAuthMethod::PrivateKeyJwt.requires_secret());
        assert!(!TokenEndpointAuthMethod::None.requires_secret());
    }
}
