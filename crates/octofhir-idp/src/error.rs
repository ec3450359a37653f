//! Error types for the identity provider bootstrap layer.
//!
//! Configuration and engine validation errors are fatal at startup. Account
//! and session errors are per-request and belong to the engine; they are
//! surfaced here only so the engine contract can name them.

use crate::engine::ViolationCode;

/// Errors raised while reading deployment configuration from the environment.
///
/// Every variant that originates from an environment variable carries the
/// exact variable name (including the client index suffix).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{variable} config missing")]
    Missing {
        /// Name of the missing variable, e.g. `CLIENT_ID_2`.
        variable: String,
    },

    /// A variable is present but its value cannot be used.
    #[error("{variable} is invalid: {message}")]
    Invalid {
        /// Name of the offending variable.
        variable: String,
        /// Why the value was rejected.
        message: String,
    },

    /// A client ended up with no redirect URIs at all.
    #[error("client {index} has no redirect URIs")]
    EmptyRedirectUris {
        /// 1-based client index.
        index: usize,
    },
}

impl ConfigError {
    /// Creates a new `Missing` error.
    #[must_use]
    pub fn missing(variable: impl Into<String>) -> Self {
        Self::Missing {
            variable: variable.into(),
        }
    }

    /// Creates a new `Invalid` error.
    #[must_use]
    pub fn invalid(variable: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            variable: variable.into(),
            message: message.into(),
        }
    }

    /// Returns the environment variable this error refers to, if any.
    #[must_use]
    pub fn variable(&self) -> Option<&str> {
        match self {
            Self::Missing { variable } | Self::Invalid { variable, .. } => Some(variable),
            Self::EmptyRedirectUris { .. } => None,
        }
    }
}

/// A client-schema violation that was not suppressed by the validation policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid client metadata for {client_id}: {message} ({code})")]
pub struct EngineValidationError {
    /// Client whose registration was rejected.
    pub client_id: String,
    /// Machine-readable violation code.
    pub code: ViolationCode,
    /// Human-readable description.
    pub message: String,
}

/// Errors raised by account lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    /// The engine asked for an account without an identifier.
    #[error("account id cannot be empty")]
    EmptyAccountId,
}

/// Errors raised through the engine contract.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A client registration failed schema validation.
    #[error(transparent)]
    Validation(#[from] EngineValidationError),

    /// Session state was accessed on a request that has no session.
    #[error("session state violation: {message}")]
    SessionStateViolation {
        /// What was attempted.
        message: String,
    },

    /// The issuer identifier is not a valid URL.
    #[error("invalid issuer {issuer}: {message}")]
    InvalidIssuer {
        /// The rejected issuer string.
        issuer: String,
        /// Parser error.
        message: String,
    },

    /// Account lookup failed.
    #[error(transparent)]
    Account(#[from] AccountError),
}

impl EngineError {
    /// Creates a new `SessionStateViolation` error.
    #[must_use]
    pub fn session_state(message: impl Into<String>) -> Self {
        Self::SessionStateViolation {
            message: message.into(),
        }
    }
}

/// Top-level error for assembling the provider.
#[derive(Debug, thiserror::Error)]
pub enum IdpError {
    /// Environment configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The engine refused the assembled configuration.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

impl From<EngineValidationError> for IdpError {
    fn from(err: EngineValidationError) -> Self {
        Self::Engine(EngineError::Validation(err))
    }
}
