//! Account lookup and claims.
//!
//! There is no user store. Any non-empty subject is accepted and its claims
//! are derived from the id alone. In deployments with consent bypass the
//! `openid` scope is granted to the requesting client before the account is
//! returned, so the consent screen is skipped.

use async_trait::async_trait;

use crate::engine::{AccountProvider, RequestContext};
use crate::error::{AccountError, EngineError};
use crate::types::{AccountClaims, AccountRecord, FlowProfile};

/// Scopes pre-granted when consent bypass is on.
pub const CONSENT_BYPASS_SCOPES: [&str; 1] = ["openid"];

/// Account provider backed by nothing but the subject id.
#[derive(Debug, Clone)]
pub struct AccountClaimsResolver {
    email_domain: String,
    consent_bypass: bool,
}

impl AccountClaimsResolver {
    #[must_use]
    pub fn new(email_domain: impl Into<String>, profile: FlowProfile) -> Self {
        Self {
            email_domain: email_domain.into(),
            consent_bypass: profile.consent_bypass_enabled(),
        }
    }

    #[must_use]
    pub fn consent_bypass(&self) -> bool {
        self.consent_bypass
    }

    /// Grants [`CONSENT_BYPASS_SCOPES`] to the request's client.
    ///
    /// Returns whether a grant was made. Nothing happens when bypass is off,
    /// or when the request has no session or no client.
    pub async fn pre_authorize(&self, ctx: &RequestContext) -> Result<bool, EngineError> {
        if !self.consent_bypass || !ctx.has_session() {
            return Ok(false);
        }
        let Some(client_id) = ctx.client_id() else {
            return Ok(false);
        };

        let session = ctx.session()?;
        session.grant_scopes(client_id, &CONSENT_BYPASS_SCOPES).await?;
        tracing::debug!(client_id, session_id = session.id(), "Consent pre-granted");
        Ok(true)
    }
}

#[async_trait]
impl AccountProvider for AccountClaimsResolver {
    async fn find_account(
        &self,
        ctx: &RequestContext,
        account_id: &str,
    ) -> Result<AccountRecord, EngineError> {
        if account_id.is_empty() {
            return Err(AccountError::EmptyAccountId.into());
        }
        self.pre_authorize(ctx).await?;
        Ok(AccountRecord::new(account_id))
    }

    fn claims(&self, account: &AccountRecord) -> AccountClaims {
        AccountClaims {
            sub: account.account_id.clone(),
            name: account.account_id.clone(),
            email: format!("{}{}", account.account_id, self.email_domain),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::{InMemorySession, Session};

    #[test]
    fn test_claims_are_derived_from_id() {
        let resolver = AccountClaimsResolver::new("@example.com", FlowProfile::AuthCodeWithPkce);
        let claims = resolver.claims(&AccountRecord::new("alice"));
        assert_eq!(
            claims,
            AccountClaims {
                sub: "alice".to_string(),
                name: "alice".to_string(),
                email: "alice@example.com".to_string(),
            }
        );
        assert_eq!(resolver.claims(&AccountRecord::new("alice")), claims);
    }

    #[tokio::test]
    async fn test_empty_account_id_is_rejected() {
        let resolver = AccountClaimsResolver::new("@example.com", FlowProfile::AuthCodeWithPkce);
        let err = resolver
            .find_account(&RequestContext::new(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Account(AccountError::EmptyAccountId)));
    }

    #[tokio::test]
    async fn test_bypass_grants_openid_to_session_client() {
        let resolver = AccountClaimsResolver::new("@example.com", FlowProfile::ImplicitPlusAuthCode);
        let session = Arc::new(InMemorySession::new());
        let ctx = RequestContext::new()
            .with_client("c1")
            .with_session(session.clone());

        let account = resolver.find_account(&ctx, "alice").await.unwrap();
        assert_eq!(account.account_id, "alice");
        assert!(session.granted_scopes("c1").await.contains("openid"));
        assert!(session.granted_scopes("c2").await.is_empty());
    }

    #[tokio::test]
    async fn test_bypass_without_session_is_a_no_op() {
        let resolver = AccountClaimsResolver::new("@example.com", FlowProfile::ImplicitPlusAuthCode);
        let ctx = RequestContext::new().with_client("c1");

        assert!(!resolver.pre_authorize(&ctx).await.unwrap());
        let account = resolver.find_account(&ctx, "alice").await.unwrap();
        assert_eq!(account.account_id, "alice");
    }

    #[tokio::test]
    async fn test_no_bypass_outside_confidential_profile() {
        for profile in [FlowProfile::AuthCodeWithPkce, FlowProfile::ImplicitOnly] {
            let resolver = AccountClaimsResolver::new("@example.com", profile);
            let session = Arc::new(InMemorySession::new());
            let ctx = RequestContext::new()
                .with_client("c1")
                .with_session(session.clone());

            resolver.find_account(&ctx, "alice").await.unwrap();
            assert!(session.granted_scopes("c1").await.is_empty(), "{profile}");
        }
    }
}
