//! Account types produced per authentication request.

use serde::{Deserialize, Serialize};

/// An account resolved for a single request.
///
/// There is no backing store: the identifier is whatever subject the caller
/// presented, and the record is discarded once the response is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    /// Opaque subject identifier.
    pub account_id: String,
}

impl AccountRecord {
    /// Creates a record for the given subject.
    #[must_use]
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
        }
    }
}

/// Claims released for an account under the `openid` scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountClaims {
    /// Subject identifier.
    pub sub: String,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl AccountClaims {
    /// Looks up a claim value by its standard name.
    #[must_use]
    pub fn get(&self, claim: &str) -> Option<&str> {
        match claim {
            "sub" => Some(&self.sub),
            "name" => Some(&self.name),
            "email" => Some(&self.email),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_lookup() {
        let claims = AccountClaims {
            sub: "alice".to_string(),
            name: "alice".to_string(),
            email: "alice@example.com".to_string(),
        };
        assert_eq!(claims.get("email"), Some("alice@example.com"));
        assert_eq!(claims.get("sub"), Some("alice"));
        assert_eq!(claims.get("phone_number"), None);
    }
}
