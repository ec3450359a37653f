//! Scope to claims mapping.

use std::collections::BTreeMap;

/// Which claims each scope releases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsConfig {
    scopes: BTreeMap<String, Vec<String>>,
}

impl Default for ClaimsConfig {
    /// `openid` releases `sub`, `name` and `email`.
    fn default() -> Self {
        let mut scopes = BTreeMap::new();
        scopes.insert(
            "openid".to_string(),
            vec!["sub".to_string(), "name".to_string(), "email".to_string()],
        );
        Self { scopes }
    }
}

impl ClaimsConfig {
    /// Claims released by a scope; unknown scopes release nothing.
    #[must_use]
    pub fn claims_for_scope(&self, scope: &str) -> &[String] {
        self.scopes.get(scope).map(Vec::as_slice).unwrap_or_default()
    }

    /// Scopes with a claims mapping.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }

    /// Every claim any scope can release, deduplicated and sorted.
    #[must_use]
    pub fn claims_supported(&self) -> Vec<&str> {
        let mut claims: Vec<&str> = self
            .scopes
            .values()
            .flat_map(|c| c.iter().map(String::as_str))
            .collect();
        claims.sort_unstable();
        claims.dedup();
        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_openid_claims() {
        let config = ClaimsConfig::default();
        assert_eq!(config.claims_for_scope("openid"), ["sub", "name", "email"]);
        assert!(config.claims_for_scope("profile").is_empty());
        assert_eq!(config.claims_supported(), vec!["email", "name", "sub"]);
        assert_eq!(config.scopes().collect::<Vec<_>>(), vec!["openid"]);
    }
}
