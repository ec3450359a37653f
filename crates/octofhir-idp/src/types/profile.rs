//! Deployment flow profiles.
//!
//! A profile fixes the response types, grant types and client authentication
//! of every client in a deployment. The tables below are fixed:
//! nothing about a client's flow is derived at runtime.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::client::{GrantType, ResponseType, TokenEndpointAuthMethod};

/// Flow profile selected once per deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowProfile {
    /// Authorization code with mandatory PKCE, public clients.
    #[default]
    #[serde(rename = "auth-code-pkce")]
    AuthCodeWithPkce,
    /// Implicit flow only, public clients.
    #[serde(rename = "implicit")]
    ImplicitOnly,
    /// Implicit plus authorization code, confidential clients, consent bypass.
    #[serde(rename = "implicit-auth-code")]
    ImplicitPlusAuthCode,
}

const CODE: &[ResponseType] = &[ResponseType::Code];
const IMPLICIT: &[ResponseType] = &[ResponseType::IdTokenToken];
const IMPLICIT_AND_CODE: &[ResponseType] = &[ResponseType::IdTokenToken, ResponseType::Code];

const IMPLICIT_GRANT: &[GrantType] = &[GrantType::Implicit];
const IMPLICIT_AND_CODE_GRANTS: &[GrantType] = &[GrantType::Implicit, GrantType::AuthorizationCode];

impl FlowProfile {
    /// All profiles.
    pub const ALL: [Self; 3] = [
        Self::AuthCodeWithPkce,
        Self::ImplicitOnly,
        Self::ImplicitPlusAuthCode,
    ];

    /// The value used in `FLOW_PROFILE`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthCodeWithPkce => "auth-code-pkce",
            Self::ImplicitOnly => "implicit",
            Self::ImplicitPlusAuthCode => "implicit-auth-code",
        }
    }

    /// Whether every client must carry a secret and an explicit auth method.
    #[must_use]
    pub fn requires_confidential_client(&self) -> bool {
        matches!(self, Self::ImplicitPlusAuthCode)
    }

    /// Whether `openid` is pre-consented for sessions in this deployment.
    #[must_use]
    pub fn consent_bypass_enabled(&self) -> bool {
        matches!(self, Self::ImplicitPlusAuthCode)
    }

    /// Response types attached to every client.
    #[must_use]
    pub fn response_types(&self) -> &'static [ResponseType] {
        match self {
            Self::AuthCodeWithPkce => CODE,
            Self::ImplicitOnly => IMPLICIT,
            Self::ImplicitPlusAuthCode => IMPLICIT_AND_CODE,
        }
    }

    /// Grant types attached to every client; `None` leaves the engine default.
    #[must_use]
    pub fn grant_types(&self) -> Option<&'static [GrantType]> {
        match self {
            Self::AuthCodeWithPkce => None,
            Self::ImplicitOnly => Some(IMPLICIT_GRANT),
            Self::ImplicitPlusAuthCode => Some(IMPLICIT_AND_CODE_GRANTS),
        }
    }

    /// Auth method fixed by the profile; `None` means it comes from the environment.
    #[must_use]
    pub fn fixed_auth_method(&self) -> Option<TokenEndpointAuthMethod> {
        if self.requires_confidential_client() {
            None
        } else {
            Some(TokenEndpointAuthMethod::None)
        }
    }

    /// Whether PKCE is mandatory for every client.
    #[must_use]
    pub fn pkce_required(&self) -> bool {
        matches!(self, Self::AuthCodeWithPkce)
    }
}

impl std::fmt::Display for FlowProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FlowProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|p| p.as_str()).collect();
                format!("unknown flow profile '{s}', expected one of {known:?}")
            })
    }
}
