//! Client validation policies.
//!
//! The engine's stock behaviour rejects every schema violation
//! ([`StrictPolicy`]). Local and test deployments register implicit-flow
//! clients on `http://localhost`, which trips two of the engine's checks; the
//! [`SuppressingPolicy`] wraps another policy and discards exactly those codes
//! that are in its [`ValidationSuppressionSet`]. Everything else reaches the
//! wrapped policy untouched.
//!
//! A suppression set can only ever contain codes from [`SUPPRESSIBLE_CODES`].

use std::collections::BTreeSet;

use crate::engine::{SchemaViolation, SuppressedViolation, ValidationPolicy, ViolationCode};
use crate::error::EngineValidationError;

/// Codes a deployment is allowed to suppress.
pub const SUPPRESSIBLE_CODES: [ViolationCode; 2] = [
    ViolationCode::ImplicitForceHttps,
    ViolationCode::ImplicitForbidLocalhost,
];

/// Value of `VALIDATION_SUPPRESS` that disables suppression.
pub const SUPPRESS_NONE: &str = "none";

// =============================================================================
// Suppression Set
// =============================================================================

/// Violation codes a deployment discards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSuppressionSet {
    codes: BTreeSet<ViolationCode>,
}

impl Default for ValidationSuppressionSet {
    /// The full allow-list.
    fn default() -> Self {
        Self {
            codes: SUPPRESSIBLE_CODES.into_iter().collect(),
        }
    }
}

impl ValidationSuppressionSet {
    /// Suppresses nothing.
    #[must_use]
    pub fn none() -> Self {
        Self {
            codes: BTreeSet::new(),
        }
    }

    /// Builds a set from codes.
    ///
    /// # Errors
    ///
    /// Returns the first code that is not in [`SUPPRESSIBLE_CODES`].
    pub fn try_from_codes(
        codes: impl IntoIterator<Item = ViolationCode>,
    ) -> Result<Self, ViolationCode> {
        let mut set = BTreeSet::new();
        for code in codes {
            if !SUPPRESSIBLE_CODES.contains(&code) {
                return Err(code);
            }
            set.insert(code);
        }
        Ok(Self { codes: set })
    }

    /// Parses a comma-separated list of codes, or `none`.
    ///
    /// # Errors
    ///
    /// Fails on unknown codes and on codes outside the allow-list.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case(SUPPRESS_NONE) {
            return Ok(Self::none());
        }

        let codes = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<ViolationCode>)
            .collect::<Result<Vec<_>, _>>()?;

        Self::try_from_codes(codes).map_err(|code| {
            let allowed: Vec<_> = SUPPRESSIBLE_CODES.iter().map(|c| c.as_str()).collect();
            format!("{code} cannot be suppressed, allowed: {allowed:?}")
        })
    }

    /// Whether `code` is suppressed.
    #[must_use]
    pub fn contains(&self, code: ViolationCode) -> bool {
        self.codes.contains(&code)
    }

    /// Whether nothing is suppressed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Suppressed codes in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = ViolationCode> + '_ {
        self.codes.iter().copied()
    }
}

impl std::fmt::Display for ValidationSuppressionSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str(SUPPRESS_NONE);
        }
        let codes: Vec<_> = self.iter().map(|c| c.as_str()).collect();
        f.write_str(&codes.join(","))
    }
}

// =============================================================================
// Policies
// =============================================================================

/// Rejects every violation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictPolicy;

impl ValidationPolicy for StrictPolicy {
    fn invalidate(
        &self,
        violation: SchemaViolation,
    ) -> Result<SuppressedViolation, EngineValidationError> {
        Err(violation.into())
    }
}

/// Discards violations whose code is in the suppression set and delegates
/// the rest to `inner`.
#[derive(Debug, Clone)]
pub struct SuppressingPolicy<P = StrictPolicy> {
    inner: P,
    suppressed: ValidationSuppressionSet,
}

impl SuppressingPolicy<StrictPolicy> {
    /// Wraps the engine's stock policy.
    #[must_use]
    pub fn new(suppressed: ValidationSuppressionSet) -> Self {
        Self::wrap(StrictPolicy, suppressed)
    }
}

impl<P: ValidationPolicy> SuppressingPolicy<P> {
    /// Wraps an arbitrary policy.
    #[must_use]
    pub fn wrap(inner: P, suppressed: ValidationSuppressionSet) -> Self {
        Self { inner, suppressed }
    }

    /// The active suppression set.
    #[must_use]
    pub fn suppressed(&self) -> &ValidationSuppressionSet {
        &self.suppressed
    }
}

impl<P: ValidationPolicy> ValidationPolicy for SuppressingPolicy<P> {
    fn invalidate(
        &self,
        violation: SchemaViolation,
    ) -> Result<SuppressedViolation, EngineValidationError> {
        if self.suppressed.contains(violation.code) {
            tracing::warn!(
                client_id = %violation.client_id,
                code = %violation.code,
                "Client validation suppressed"
            );
            return Ok(SuppressedViolation(violation));
        }
        self.inner.invalidate(violation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(code: ViolationCode) -> SchemaViolation {
        SchemaViolation::new("c1", code, format!("failed {code}"))
    }

    #[test]
    fn test_allow_listed_codes_never_propagate() {
        let policy = SuppressingPolicy::new(ValidationSuppressionSet::default());
        for code in SUPPRESSIBLE_CODES {
            let result = policy.invalidate(violation(code));
            assert_eq!(result, Ok(SuppressedViolation(violation(code))));
        }
    }

    #[test]
    fn test_other_codes_propagate_unchanged() {
        let policy = SuppressingPolicy::new(ValidationSuppressionSet::default());
        for code in ViolationCode::ALL {
            if SUPPRESSIBLE_CODES.contains(&code) {
                continue;
            }
            let err = policy.invalidate(violation(code)).unwrap_err();
            assert_eq!(err, EngineValidationError::from(violation(code)));
        }
    }

    #[test]
    fn test_unregistered_grant_is_not_suppressed() {
        let policy = SuppressingPolicy::new(ValidationSuppressionSet::default());
        let err = policy
            .invalidate(violation(ViolationCode::ImplicitForbidUnregisteredGrant))
            .unwrap_err();
        assert_eq!(err.code, ViolationCode::ImplicitForbidUnregisteredGrant);
        assert_eq!(err.message, "failed implicit-forbid-unregistered-grant");
    }

    #[test]
    fn test_default_set_is_exactly_the_allow_list() {
        let set = ValidationSuppressionSet::default();
        assert_eq!(set.iter().collect::<Vec<_>>(), SUPPRESSIBLE_CODES.to_vec());
        for code in ViolationCode::ALL {
            assert_eq!(set.contains(code), SUPPRESSIBLE_CODES.contains(&code));
        }
    }

    #[test]
    fn test_empty_set_suppresses_nothing() {
        let policy = SuppressingPolicy::new(ValidationSuppressionSet::none());
        for code in ViolationCode::ALL {
            assert!(policy.invalidate(violation(code)).is_err());
        }
    }

    #[test]
    fn test_set_cannot_widen() {
        assert_eq!(
            ValidationSuppressionSet::try_from_codes([ViolationCode::ClientIdDuplicate]),
            Err(ViolationCode::ClientIdDuplicate)
        );
        let err = ValidationSuppressionSet::parse("implicit-force-https,redirect-uri-fragment")
            .unwrap_err();
        assert!(err.contains("redirect-uri-fragment cannot be suppressed"));
        assert!(ValidationSuppressionSet::parse("made-up-code").is_err());
    }

    #[test]
    fn test_parse_subsets() {
        let set = ValidationSuppressionSet::parse(" implicit-forbid-localhost ").unwrap();
        assert!(set.contains(ViolationCode::ImplicitForbidLocalhost));
        assert!(!set.contains(ViolationCode::ImplicitForceHttps));
        assert_eq!(set.to_string(), "implicit-forbid-localhost");

        let none = ValidationSuppressionSet::parse("NONE").unwrap();
        assert!(none.is_empty());
        assert_eq!(none.to_string(), "none");
    }

    #[test]
    fn test_wrapped_policy_sees_only_unsuppressed_codes() {
        #[derive(Debug)]
        struct Forbid(ViolationCode);

        impl ValidationPolicy for Forbid {
            fn invalidate(
                &self,
                violation: SchemaViolation,
            ) -> Result<SuppressedViolation, EngineValidationError> {
                assert_ne!(violation.code, self.0, "suppressed code reached inner policy");
                Ok(SuppressedViolation(violation))
            }
        }

        let policy = SuppressingPolicy::wrap(
            Forbid(ViolationCode::ImplicitForceHttps),
            ValidationSuppressionSet::default(),
        );
        assert!(policy.invalidate(violation(ViolationCode::ImplicitForceHttps)).is_ok());
        assert!(policy.invalidate(violation(ViolationCode::RedirectUriFragment)).is_ok());
        assert_eq!(policy.suppressed(), &ValidationSuppressionSet::default());
    }
}
