//! Deployment configuration loaded from environment variables.
//!
//! Variables are read through the `config` crate's environment source. Tests
//! inject a map with [`EnvConfigLoader::from_map`] instead of touching the
//! process environment.
//!
//! Per-client variables carry an index suffix: none for the first client,
//! `_2`, `_3`, ... for the rest. The external name of every per-client
//! variable is fixed by [`CLIENT_VARIABLES`].

use std::collections::BTreeMap;
use std::str::FromStr;

use config::{Config, Environment, Map};
use url::Url;

use crate::error::ConfigError;
use crate::policy::ValidationSuppressionSet;
use crate::types::FlowProfile;

// =============================================================================
// Variable Names
// =============================================================================

pub const PORT: &str = "PORT";
pub const CLIENT_COUNT: &str = "CLIENT_COUNT";
pub const ISSUER_PROTO: &str = "ISSUER_PROTO";
pub const ISSUER_HOST: &str = "ISSUER_HOST";
pub const ISSUER_PREFIX: &str = "ISSUER_PREFIX";
pub const EMAIL_DOMAIN: &str = "EMAIL_DOMAIN";
pub const FLOW_PROFILE: &str = "FLOW_PROFILE";
pub const VALIDATION_SUPPRESS: &str = "VALIDATION_SUPPRESS";
pub const LOG_LEVEL: &str = "LOG_LEVEL";

/// Global variables, read once.
pub const GLOBAL_VARIABLES: [&str; 9] = [
    PORT,
    CLIENT_COUNT,
    ISSUER_PROTO,
    ISSUER_HOST,
    ISSUER_PREFIX,
    EMAIL_DOMAIN,
    FLOW_PROFILE,
    VALIDATION_SUPPRESS,
    LOG_LEVEL,
];

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CLIENT_COUNT: usize = 1;
pub const DEFAULT_ISSUER_PROTO: &str = "http://";
pub const DEFAULT_ISSUER_HOST: &str = "localhost";
pub const DEFAULT_ISSUER_PREFIX: &str = "/";
pub const DEFAULT_EMAIL_DOMAIN: &str = "@domain.com";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Internal field a per-client variable feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClientField {
    ClientId,
    RedirectUri,
    SilentRedirectUri,
    LogoutRedirectUri,
    ClientSecret,
    TokenEndpointAuthMethod,
}

impl ClientField {
    /// Internal field name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientId => "clientId",
            Self::RedirectUri => "redirectUri",
            Self::SilentRedirectUri => "silentRedirectUri",
            Self::LogoutRedirectUri => "logoutRedirectUri",
            Self::ClientSecret => "clientSecret",
            Self::TokenEndpointAuthMethod => "tokenEndpointAuthMethod",
        }
    }

    /// Whether the value must parse as an absolute URL.
    #[must_use]
    pub fn is_uri(&self) -> bool {
        matches!(
            self,
            Self::RedirectUri | Self::SilentRedirectUri | Self::LogoutRedirectUri
        )
    }
}

/// When a per-client variable must be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Always,
    /// Only for profiles with confidential clients.
    Confidential,
    Optional,
}

impl Requirement {
    #[must_use]
    pub fn is_required(&self, profile: FlowProfile) -> bool {
        match self {
            Self::Always => true,
            Self::Confidential => profile.requires_confidential_client(),
            Self::Optional => false,
        }
    }
}

/// One row of the external name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientVariable {
    /// External name, before the index suffix.
    pub name: &'static str,
    pub field: ClientField,
    pub requirement: Requirement,
}

/// External variable name to client field.
pub const CLIENT_VARIABLES: [ClientVariable; 6] = [
    ClientVariable {
        name: "CLIENT_ID",
        field: ClientField::ClientId,
        requirement: Requirement::Always,
    },
    ClientVariable {
        name: "CLIENT_REDIRECT_URI",
        field: ClientField::RedirectUri,
        requirement: Requirement::Always,
    },
    ClientVariable {
        name: "CLIENT_SILENT_REDIRECT_URI",
        field: ClientField::SilentRedirectUri,
        requirement: Requirement::Optional,
    },
    ClientVariable {
        name: "CLIENT_LOGOUT_REDIRECT_URI",
        field: ClientField::LogoutRedirectUri,
        requirement: Requirement::Always,
    },
    ClientVariable {
        name: "CLIENT_SECRET",
        field: ClientField::ClientSecret,
        requirement: Requirement::Confidential,
    },
    ClientVariable {
        name: "CLIENT_TOKEN_ENDPOINT_AUTH_METHOD",
        field: ClientField::TokenEndpointAuthMethod,
        requirement: Requirement::Confidential,
    },
];

/// Index suffix: empty for the first client, `_i` otherwise.
#[must_use]
pub fn client_suffix(index: usize) -> String {
    if index <= 1 {
        String::new()
    } else {
        format!("_{index}")
    }
}

/// Full variable name of `field` for client `index`.
#[must_use]
pub fn client_variable_name(field: ClientField, index: usize) -> String {
    let name = CLIENT_VARIABLES
        .iter()
        .find(|v| v.field == field)
        .map_or(field.as_str(), |v| v.name);
    format!("{name}{}", client_suffix(index))
}

/// Whether `name` is a variable this crate reads.
#[must_use]
pub fn is_recognised(name: &str) -> bool {
    if GLOBAL_VARIABLES.contains(&name) {
        return true;
    }
    CLIENT_VARIABLES.iter().any(|v| {
        name.strip_prefix(v.name).is_some_and(|rest| {
            rest.is_empty()
                || rest
                    .strip_prefix('_')
                    .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        })
    })
}

// =============================================================================
// Per-Client Values
// =============================================================================

/// Raw values for one client, keyed by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEnv {
    /// 1-based index.
    pub index: usize,
    values: BTreeMap<ClientField, String>,
}

impl ClientEnv {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self {
            index,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: ClientField, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: ClientField, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    #[must_use]
    pub fn get(&self, field: ClientField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Returns a field or an error naming the suffixed variable.
    pub fn require(&self, field: ClientField) -> Result<&str, ConfigError> {
        self.get(field)
            .ok_or_else(|| ConfigError::missing(client_variable_name(field, self.index)))
    }
}

// =============================================================================
// Issuer
// =============================================================================

/// Issuer URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Scheme including `://`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http://",
            Self::Https => "https://",
        }
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http://" => Ok(Self::Http),
            "https://" => Ok(Self::Https),
            _ => Err(format!("expected 'http://' or 'https://', got '{s}'")),
        }
    }
}

/// Where the provider is reachable from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerConfig {
    pub scheme: Scheme,
    pub host: String,
    /// Mount path, always starting with `/`.
    pub path_prefix: String,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::Http,
            host: DEFAULT_ISSUER_HOST.to_string(),
            path_prefix: DEFAULT_ISSUER_PREFIX.to_string(),
        }
    }
}

impl IssuerConfig {
    /// `scheme + host + path_prefix`, concatenated verbatim.
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("{}{}{}", self.scheme.as_str(), self.host, self.path_prefix)
    }

    /// Forwarded headers are trusted iff the issuer is https.
    #[must_use]
    pub fn trust_proxy(&self) -> bool {
        self.scheme == Scheme::Https
    }

    /// Whether the host, ignoring any port, is a loopback name.
    #[must_use]
    pub fn is_localhost(&self) -> bool {
        let host = self
            .host
            .rsplit_once(':')
            .map_or(self.host.as_str(), |(h, _)| h);
        matches!(host, "localhost" | "127.0.0.1" | "[::1]")
    }
}

/// Checks that a mount prefix is literal path text.
///
/// The prefix becomes a router path, where `:x`, `*x` and `{x}` segments are
/// captures or invalid patterns.
pub(crate) fn validate_path_prefix(prefix: &str) -> Result<(), String> {
    if !prefix.starts_with('/') {
        return Err(format!("must start with '/', got '{prefix}'"));
    }
    if let Some(c) = prefix.chars().find(|c| matches!(c, '{' | '}' | '?' | '#')) {
        return Err(format!("must not contain '{c}', got '{prefix}'"));
    }
    if let Some(segment) = prefix
        .split('/')
        .find(|s| s.starts_with(':') || s.starts_with('*'))
    {
        return Err(format!("segment '{segment}' is a route pattern, got '{prefix}'"));
    }
    Ok(())
}

// =============================================================================
// Loaded Configuration
// =============================================================================

/// Everything read from the environment at startup.
#[derive(Debug, Clone)]
pub struct IdpConfig {
    pub port: u16,
    pub profile: FlowProfile,
    pub issuer: IssuerConfig,
    pub email_domain: String,
    pub suppression: ValidationSuppressionSet,
    pub log_level: String,
    /// Per-client values, ascending index.
    pub clients: Vec<ClientEnv>,
}

/// Reads and validates deployment variables.
#[derive(Debug, Clone)]
pub struct EnvConfigLoader {
    source: Config,
}

impl EnvConfigLoader {
    /// Reads recognised variables from the process environment.
    pub fn from_process_env() -> Result<Self, ConfigError> {
        Self::from_map(std::env::vars().filter(|(k, _)| is_recognised(k)))
    }

    /// Reads variables from an explicit map.
    pub fn from_map<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map: Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let source = Config::builder()
            .add_source(Environment::default().source(Some(map)).ignore_empty(true))
            .build()
            .map_err(|e| ConfigError::invalid("environment", e.to_string()))?;

        Ok(Self { source })
    }

    /// Value of a variable; unset and empty are the same.
    #[must_use]
    pub fn get(&self, variable: &str) -> Option<String> {
        self.source
            .get_string(&variable.to_ascii_lowercase())
            .ok()
            .filter(|v| !v.is_empty())
    }

    fn get_or(&self, variable: &str, default: &str) -> String {
        self.get(variable).unwrap_or_else(|| default.to_string())
    }

    pub fn port(&self) -> Result<u16, ConfigError> {
        let Some(raw) = self.get(PORT) else {
            return Ok(DEFAULT_PORT);
        };
        match raw.trim().parse::<u16>() {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(ConfigError::invalid(
                PORT,
                format!("expected a port number, got '{raw}'"),
            )),
        }
    }

    pub fn client_count(&self) -> Result<usize, ConfigError> {
        let Some(raw) = self.get(CLIENT_COUNT) else {
            return Ok(DEFAULT_CLIENT_COUNT);
        };
        match raw.trim().parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConfigError::invalid(
                CLIENT_COUNT,
                format!("expected a positive integer, got '{raw}'"),
            )),
        }
    }

    pub fn profile(&self) -> Result<FlowProfile, ConfigError> {
        match self.get(FLOW_PROFILE) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e: String| ConfigError::invalid(FLOW_PROFILE, e)),
            None => Ok(FlowProfile::default()),
        }
    }

    pub fn issuer(&self) -> Result<IssuerConfig, ConfigError> {
        let scheme = self
            .get_or(ISSUER_PROTO, DEFAULT_ISSUER_PROTO)
            .parse::<Scheme>()
            .map_err(|e| ConfigError::invalid(ISSUER_PROTO, e))?;
        let host = self.get_or(ISSUER_HOST, DEFAULT_ISSUER_HOST);
        let path_prefix = self.get_or(ISSUER_PREFIX, DEFAULT_ISSUER_PREFIX);
        validate_path_prefix(&path_prefix).map_err(|e| ConfigError::invalid(ISSUER_PREFIX, e))?;

        Url::parse(&format!("{}{host}/", scheme.as_str()))
            .map_err(|e| ConfigError::invalid(ISSUER_HOST, e.to_string()))?;

        let issuer = IssuerConfig {
            scheme,
            host,
            path_prefix,
        };
        Url::parse(&issuer.issuer())
            .map_err(|e| ConfigError::invalid(ISSUER_PREFIX, e.to_string()))?;
        Ok(issuer)
    }

    pub fn email_domain(&self) -> String {
        self.get_or(EMAIL_DOMAIN, DEFAULT_EMAIL_DOMAIN)
    }

    pub fn suppression(&self) -> Result<ValidationSuppressionSet, ConfigError> {
        match self.get(VALIDATION_SUPPRESS) {
            Some(raw) => ValidationSuppressionSet::parse(&raw)
                .map_err(|e| ConfigError::invalid(VALIDATION_SUPPRESS, e)),
            None => Ok(ValidationSuppressionSet::default()),
        }
    }

    pub fn log_level(&self) -> String {
        self.get_or(LOG_LEVEL, DEFAULT_LOG_LEVEL)
    }

    /// Reads and validates the variables of client `index`.
    pub fn client_env(&self, index: usize, profile: FlowProfile) -> Result<ClientEnv, ConfigError> {
        let mut env = ClientEnv::new(index);

        for var in &CLIENT_VARIABLES {
            let name = format!("{}{}", var.name, client_suffix(index));
            let Some(value) = self.get(&name) else {
                if var.requirement.is_required(profile) {
                    return Err(ConfigError::missing(name));
                }
                continue;
            };

            if var.field.is_uri() {
                Url::parse(&value).map_err(|e| ConfigError::invalid(&name, e.to_string()))?;
            }
            env.insert(var.field, value);
        }

        Ok(env)
    }

    /// Reads every client, ascending index. Fails on the first error.
    pub fn clients(&self, profile: FlowProfile) -> Result<Vec<ClientEnv>, ConfigError> {
        (1..=self.client_count()?)
            .map(|i| self.client_env(i, profile))
            .collect()
    }

    /// Reads the full configuration.
    pub fn load(&self) -> Result<IdpConfig, ConfigError> {
        let profile = self.profile()?;
        let config = IdpConfig {
            port: self.port()?,
            profile,
            issuer: self.issuer()?,
            email_domain: self.email_domain(),
            suppression: self.suppression()?,
            log_level: self.log_level(),
            clients: self.clients(profile)?,
        };

        tracing::debug!(
            profile = %config.profile,
            clients = config.clients.len(),
            issuer = %config.issuer.issuer(),
            "Configuration loaded"
        );
        Ok(config)
    }
}
