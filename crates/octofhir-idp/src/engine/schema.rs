//! Client-schema validation.
//!
//! The engine checks every client registration against a fixed set of safety
//! rules. Each failed rule is reported to the [`ValidationPolicy`] injected at
//! construction, which either rejects the registration or suppresses the
//! violation. Validation continues after a suppressed violation, so one client
//! can report several.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::EngineValidationError;
use crate::types::{ClientSpec, GrantType, ResponseType};

// =============================================================================
// Violation Codes
// =============================================================================

/// Machine-readable codes for client-schema violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationCode {
    /// No redirect URIs registered.
    RedirectUrisRequired,
    /// A redirect URI is not an absolute URL.
    RedirectUriInvalid,
    /// A redirect URI carries a fragment.
    RedirectUriFragment,
    /// Implicit clients must use https redirect URIs.
    ImplicitForceHttps,
    /// Implicit clients must not redirect to localhost.
    ImplicitForbidLocalhost,
    /// Implicit response types need the implicit grant.
    ImplicitForbidUnregisteredGrant,
    /// The code response type needs the authorization_code grant.
    CodeForbidUnregisteredGrant,
    /// The auth method needs a client secret that is not configured.
    AuthMethodRequiresSecret,
    /// Two clients share a client_id.
    ClientIdDuplicate,
}

impl ViolationCode {
    /// Every code the schema can report.
    pub const ALL: [Self; 9] = [
        Self::RedirectUrisRequired,
        Self::RedirectUriInvalid,
        Self::RedirectUriFragment,
        Self::ImplicitForceHttps,
        Self::ImplicitForbidLocalhost,
        Self::ImplicitForbidUnregisteredGrant,
        Self::CodeForbidUnregisteredGrant,
        Self::AuthMethodRequiresSecret,
        Self::ClientIdDuplicate,
    ];

    /// Returns the wire form of the code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RedirectUrisRequired => "redirect-uris-required",
            Self::RedirectUriInvalid => "redirect-uri-invalid",
            Self::RedirectUriFragment => "redirect-uri-fragment",
            Self::ImplicitForceHttps => "implicit-force-https",
            Self::ImplicitForbidLocalhost => "implicit-forbid-localhost",
            Self::ImplicitForbidUnregisteredGrant => "implicit-forbid-unregistered-grant",
            Self::CodeForbidUnregisteredGrant => "code-forbid-unregistered-grant",
            Self::AuthMethodRequiresSecret => "auth-method-requires-secret",
            Self::ClientIdDuplicate => "client-id-duplicate",
        }
    }
}

impl std::fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ViolationCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| format!("unknown validation code '{s}'"))
    }
}

// =============================================================================
// Violations and Policy
// =============================================================================

/// A single failed schema rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Client being validated.
    pub client_id: String,
    /// Which rule failed.
    pub code: ViolationCode,
    /// Human-readable description.
    pub message: String,
}

impl SchemaViolation {
    /// Creates a new violation.
    #[must_use]
    pub fn new(client_id: impl Into<String>, code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            code,
            message: message.into(),
        }
    }
}

impl From<SchemaViolation> for EngineValidationError {
    fn from(v: SchemaViolation) -> Self {
        Self {
            client_id: v.client_id,
            code: v.code,
            message: v.message,
        }
    }
}

/// A violation the policy chose to discard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressedViolation(pub SchemaViolation);

/// Decides what happens to a schema violation.
///
/// Returning `Err` rejects the client registration and aborts engine
/// construction. Returning `Ok` lets the registration proceed as if valid.
pub trait ValidationPolicy: Send + Sync + std::fmt::Debug {
    /// Handles one violation.
    fn invalidate(
        &self,
        violation: SchemaViolation,
    ) -> Result<SuppressedViolation, EngineValidationError>;
}

/// Outcome of validating a whole registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Violations the policy suppressed, in the order they were found.
    pub suppressed: Vec<SchemaViolation>,
}

// =============================================================================
// Schema
// =============================================================================

/// The engine's built-in client checks, bound to a policy.
#[derive(Debug, Clone, Copy)]
pub struct ClientSchema<'a> {
    policy: &'a dyn ValidationPolicy,
}

impl<'a> ClientSchema<'a> {
    /// Binds the schema to a policy.
    #[must_use]
    pub fn new(policy: &'a dyn ValidationPolicy) -> Self {
        Self { policy }
    }

    /// Validates every client, including cross-client id uniqueness.
    ///
    /// # Errors
    ///
    /// Returns the first violation the policy does not suppress.
    pub fn validate_all(
        &self,
        clients: &[ClientSpec],
    ) -> Result<ValidationReport, EngineValidationError> {
        let mut report = ValidationReport::default();
        let mut seen = HashSet::new();

        for client in clients {
            if !seen.insert(client.client_id.as_str()) {
                self.report(
                    &mut report,
                    SchemaViolation::new(
                        &client.client_id,
                        ViolationCode::ClientIdDuplicate,
                        "client_id must be unique",
                    ),
                )?;
            }
            self.validate_into(client, &mut report)?;
        }

        Ok(report)
    }

    /// Validates a single client.
    ///
    /// # Errors
    ///
    /// Returns the first violation the policy does not suppress.
    pub fn validate(&self, client: &ClientSpec) -> Result<ValidationReport, EngineValidationError> {
        let mut report = ValidationReport::default();
        self.validate_into(client, &mut report)?;
        Ok(report)
    }

    fn validate_into(
        &self,
        client: &ClientSpec,
        report: &mut ValidationReport,
    ) -> Result<(), EngineValidationError> {
        for violation in check_client(client) {
            self.report(report, violation)?;
        }
        Ok(())
    }

    fn report(
        &self,
        report: &mut ValidationReport,
        violation: SchemaViolation,
    ) -> Result<(), EngineValidationError> {
        let SuppressedViolation(suppressed) = self.policy.invalidate(violation)?;
        report.suppressed.push(suppressed);
        Ok(())
    }
}

fn check_client(client: &ClientSpec) -> Vec<SchemaViolation> {
    let id = client.client_id.as_str();
    let mut violations = Vec::new();

    if client.redirect_uris.is_empty() {
        violations.push(SchemaViolation::new(
            id,
            ViolationCode::RedirectUrisRequired,
            "redirect_uris must contain members",
        ));
    }

    let implicit = client.uses_implicit();
    for uri in &client.redirect_uris {
        let parsed = match Url::parse(uri) {
            Ok(parsed) => parsed,
            Err(e) => {
                violations.push(SchemaViolation::new(
                    id,
                    ViolationCode::RedirectUriInvalid,
                    format!("redirect_uris {uri} must be a valid URL: {e}"),
                ));
                continue;
            }
        };

        if parsed.fragment().is_some() {
            violations.push(SchemaViolation::new(
                id,
                ViolationCode::RedirectUriFragment,
                format!("redirect_uris {uri} must not contain fragments"),
            ));
        }

        if implicit {
            if parsed.scheme() != "https" {
                violations.push(SchemaViolation::new(
                    id,
                    ViolationCode::ImplicitForceHttps,
                    "implicit clients must only register https redirect_uris",
                ));
            }
            if parsed.host_str() == Some("localhost") {
                violations.push(SchemaViolation::new(
                    id,
                    ViolationCode::ImplicitForbidLocalhost,
                    "implicit clients must not use localhost as a redirect_uris hostname",
                ));
            }
        }
    }

    let grants = client.effective_grant_types();
    if implicit && !grants.contains(&GrantType::Implicit) {
        violations.push(SchemaViolation::new(
            id,
            ViolationCode::ImplicitForbidUnregisteredGrant,
            "response_types using id_token or token require the implicit grant",
        ));
    }
    if client.response_types.contains(&ResponseType::Code)
        && !grants.contains(&GrantType::AuthorizationCode)
    {
        violations.push(SchemaViolation::new(
            id,
            ViolationCode::CodeForbidUnregisteredGrant,
            "response_types using code require the authorization_code grant",
        ));
    }

    if client.token_endpoint_auth_method.requires_secret() && client.client_secret.is_none() {
        violations.push(SchemaViolation::new(
            id,
            ViolationCode::AuthMethodRequiresSecret,
            format!(
                "token_endpoint_auth_method {} requires a client_secret",
                client.token_endpoint_auth_method
            ),
        ));
    }

    violations
}
