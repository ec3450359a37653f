//! Embedded engine.
//!
//! Holds the validated client registry and answers the questions the
//! bootstrap layer steers: which claims an account releases, whether a
//! session still needs consent, and what the provider metadata looks like.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use serde_json::{Value, json};
use url::Url;

use super::discovery::openid_configuration_handler;
use super::{
    AccountProvider, ClaimsConfig, ClientSchema, EngineConfig, ProviderEngine, RequestContext,
    ValidationReport,
};
use crate::error::EngineError;
use crate::http::RequestOrigin;
use crate::types::{ClientSpec, ResponseType};

/// Path of the metadata document relative to the mount point.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// In-process provider engine.
pub struct LocalEngine {
    issuer: String,
    issuer_url: Url,
    clients: Vec<ClientSpec>,
    claims: ClaimsConfig,
    pkce_required: bool,
    account_provider: Arc<dyn AccountProvider>,
    report: ValidationReport,
}

impl LocalEngine {
    /// Issuer identifier.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Registered clients, in registry order.
    #[must_use]
    pub fn clients(&self) -> &[ClientSpec] {
        &self.clients
    }

    /// Looks up a registered client.
    #[must_use]
    pub fn client(&self, client_id: &str) -> Option<&ClientSpec> {
        self.clients.iter().find(|c| c.client_id == client_id)
    }

    /// Whether authorization requests must carry a PKCE challenge.
    #[must_use]
    pub fn pkce_required(&self) -> bool {
        self.pkce_required
    }

    /// Violations suppressed while the registry was validated.
    #[must_use]
    pub fn validation_report(&self) -> &ValidationReport {
        &self.report
    }

    /// Resolves an account and releases the claims of the requested scopes.
    ///
    /// # Errors
    ///
    /// Propagates account lookup failures unchanged.
    pub async fn resolve_claims(
        &self,
        ctx: &RequestContext,
        account_id: &str,
        scopes: &[&str],
    ) -> Result<BTreeMap<String, String>, EngineError> {
        let account = self.account_provider.find_account(ctx, account_id).await?;
        let claims = self.account_provider.claims(&account);

        let released = scopes
            .iter()
            .flat_map(|scope| self.claims.claims_for_scope(scope))
            .filter_map(|name| claims.get(name).map(|v| (name.clone(), v.to_string())))
            .collect();
        Ok(released)
    }

    /// Whether the consent screen must be shown for `scopes`.
    ///
    /// Without a session or a client there is nothing to consult, so consent
    /// is always required.
    pub async fn consent_required(&self, ctx: &RequestContext, scopes: &[&str]) -> bool {
        let (Ok(session), Some(client_id)) = (ctx.session(), ctx.client_id()) else {
            return true;
        };
        let granted: BTreeSet<String> = session.granted_scopes(client_id).await;
        !scopes.iter().all(|s| granted.contains(*s))
    }

    /// Base URL for endpoints, using the request origin when one was resolved.
    #[must_use]
    pub fn endpoint_base(&self, origin: Option<&RequestOrigin>) -> String {
        let base = match origin {
            Some(origin) => format!("{}{}", origin.base_url(), self.issuer_url.path()),
            None => self.issuer.clone(),
        };
        base.trim_end_matches('/').to_string()
    }

    /// Provider metadata document.
    #[must_use]
    pub fn discovery_document(&self, origin: Option<&RequestOrigin>) -> Value {
        let base = self.endpoint_base(origin);

        let response_types: BTreeSet<&str> = self
            .clients
            .iter()
            .flat_map(|c| c.response_types.iter().map(|r| r.as_str()))
            .collect();
        let grant_types: BTreeSet<&str> = self
            .clients
            .iter()
            .flat_map(|c| c.effective_grant_types())
            .map(|g| g.as_str())
            .collect();
        let auth_methods: BTreeSet<&str> = self
            .clients
            .iter()
            .map(|c| c.token_endpoint_auth_method.as_str())
            .collect();
        let code_challenge_methods: Vec<&str> = if self
            .clients
            .iter()
            .any(|c| c.response_types.contains(&ResponseType::Code))
        {
            vec!["S256"]
        } else {
            Vec::new()
        };

        json!({
            "issuer": self.issuer,
            "authorization_endpoint": format!("{base}/auth"),
            "token_endpoint": format!("{base}/token"),
            "userinfo_endpoint": format!("{base}/me"),
            "end_session_endpoint": format!("{base}/session/end"),
            "jwks_uri": format!("{base}/jwks"),
            "scopes_supported": self.claims.scopes().collect::<Vec<_>>(),
            "claims_supported": self.claims.claims_supported(),
            "response_types_supported": response_types,
            "grant_types_supported": grant_types,
            "token_endpoint_auth_methods_supported": auth_methods,
            "code_challenge_methods_supported": code_challenge_methods,
            "subject_types_supported": ["public"],
        })
    }
}

impl ProviderEngine for LocalEngine {
    fn new(issuer: &str, config: EngineConfig) -> Result<Self, EngineError> {
        let issuer_url = Url::parse(issuer).map_err(|e| EngineError::InvalidIssuer {
            issuer: issuer.to_string(),
            message: e.to_string(),
        })?;

        let report = ClientSchema::new(config.validation_policy.as_ref())
            .validate_all(&config.clients)?;

        tracing::info!(
            issuer,
            clients = config.clients.len(),
            suppressed = report.suppressed.len(),
            "Client registry accepted"
        );

        Ok(Self {
            issuer: issuer.to_string(),
            issuer_url,
            clients: config.clients,
            claims: config.claims,
            pkce_required: config.pkce_required,
            account_provider: config.account_provider,
            report,
        })
    }

    fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route(DISCOVERY_PATH, get(openid_configuration_handler))
            .with_state(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{InMemorySession, Session};
    use crate::policy::StrictPolicy;
    use crate::types::{
        AccountClaims, AccountRecord, GrantType, ResponseType, TokenEndpointAuthMethod,
    };
    use async_trait::async_trait;

    struct EchoAccounts;

    #[async_trait]
    impl AccountProvider for EchoAccounts {
        async fn find_account(
            &self,
            _ctx: &RequestContext,
            account_id: &str,
        ) -> Result<AccountRecord, EngineError> {
            Ok(AccountRecord::new(account_id))
        }

        fn claims(&self, account: &AccountRecord) -> AccountClaims {
            AccountClaims {
                sub: account.account_id.clone(),
                name: account.account_id.clone(),
                email: format!("{}@test.local", account.account_id),
            }
        }
    }

    fn code_client(id: &str) -> ClientSpec {
        ClientSpec {
            index: 1,
            client_id: id.to_string(),
            client_secret: None,
            token_endpoint_auth_method: TokenEndpointAuthMethod::None,
            redirect_uris: vec!["http://localhost:4200/cb".to_string()],
            post_logout_redirect_uris: vec!["http://localhost:4200/".to_string()],
            response_types: vec![ResponseType::Code],
            grant_types: None,
            pkce_required: true,
        }
    }

    fn config(clients: Vec<ClientSpec>) -> EngineConfig {
        EngineConfig {
            clients,
            claims: ClaimsConfig::default(),
            pkce_required: true,
            account_provider: Arc::new(EchoAccounts),
            validation_policy: Arc::new(StrictPolicy),
        }
    }

    #[test]
    fn test_rejects_invalid_issuer() {
        let err = LocalEngine::new("not an issuer", config(vec![])).err().unwrap();
        assert!(matches!(err, EngineError::InvalidIssuer { .. }));
    }

    #[test]
    fn test_rejects_duplicate_clients() {
        let err = LocalEngine::new(
            "http://localhost/",
            config(vec![code_client("a"), code_client("a")]),
        )
        .err()
        .unwrap();
        assert!(matches!(err, EngineError::Validation(ref e) if e.client_id == "a"));
    }

    #[tokio::test]
    async fn test_resolve_claims_filters_by_scope() {
        let engine = LocalEngine::new("http://localhost/", config(vec![code_client("a")])).unwrap();
        let ctx = RequestContext::new().with_client("a");

        let claims = engine.resolve_claims(&ctx, "bob", &["openid"]).await.unwrap();
        assert_eq!(claims.get("sub").map(String::as_str), Some("bob"));
        assert_eq!(claims.get("email").map(String::as_str), Some("bob@test.local"));

        let none = engine.resolve_claims(&ctx, "bob", &["profile"]).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_consent_required_consults_session() {
        let engine = LocalEngine::new("http://localhost/", config(vec![code_client("a")])).unwrap();
        let session = Arc::new(InMemorySession::for_account("bob"));
        let ctx = RequestContext::new()
            .with_client("a")
            .with_session(session.clone());

        assert!(engine.consent_required(&ctx, &["openid"]).await);
        session.grant_scopes("a", &["openid"]).await.unwrap();
        assert!(!engine.consent_required(&ctx, &["openid"]).await);
        assert!(engine.consent_required(&RequestContext::new(), &["openid"]).await);
    }

    #[test]
    fn test_discovery_document() {
        let mut implicit = code_client("b");
        implicit.redirect_uris = vec!["https://app.example.com/cb".to_string()];
        implicit.response_types = vec![ResponseType::IdTokenToken];
        implicit.grant_types = Some(vec![GrantType::Implicit]);

        let engine = LocalEngine::new(
            "https://id.example.com/auth/",
            config(vec![code_client("a"), implicit]),
        )
        .unwrap();

        let doc = engine.discovery_document(None);
        assert_eq!(doc["issuer"], "https://id.example.com/auth/");
        assert_eq!(doc["token_endpoint"], "https://id.example.com/auth/token");
        assert_eq!(
            doc["response_types_supported"],
            json!(["code", "id_token token"])
        );
        assert_eq!(
            doc["grant_types_supported"],
            json!(["authorization_code", "implicit"])
        );
        assert_eq!(doc["code_challenge_methods_supported"], json!(["S256"]));
        assert_eq!(doc["claims_supported"], json!(["email", "name", "sub"]));

        let origin = RequestOrigin {
            scheme: "http".to_string(),
            host: "internal:3000".to_string(),
        };
        let doc = engine.discovery_document(Some(&origin));
        assert_eq!(doc["issuer"], "https://id.example.com/auth/");
        assert_eq!(doc["jwks_uri"], "http://internal:3000/auth/jwks");
    }

    #[test]
    fn test_s256_advertised_for_code_clients_without_enforcement() {
        let mut hybrid = code_client("a");
        hybrid.client_secret = Some("secret".to_string());
        hybrid.token_endpoint_auth_method = TokenEndpointAuthMethod::ClientSecretBasic;
        hybrid.redirect_uris = vec!["https://app.example.com/cb".to_string()];
        hybrid.response_types = vec![ResponseType::IdTokenToken, ResponseType::Code];
        hybrid.grant_types = Some(vec![GrantType::Implicit, GrantType::AuthorizationCode]);
        hybrid.pkce_required = false;

        let mut cfg = config(vec![hybrid]);
        cfg.pkce_required = false;
        let engine = LocalEngine::new("https://id.example.com/", cfg).unwrap();
        assert!(!engine.pkce_required());
        assert_eq!(
            engine.discovery_document(None)["code_challenge_methods_supported"],
            json!(["S256"])
        );

        let mut implicit = code_client("b");
        implicit.redirect_uris = vec!["https://app.example.com/cb".to_string()];
        implicit.response_types = vec![ResponseType::IdTokenToken];
        implicit.grant_types = Some(vec![GrantType::Implicit]);
        implicit.pkce_required = false;

        let mut cfg = config(vec![implicit]);
        cfg.pkce_required = false;
        let engine = LocalEngine::new("https://id.example.com/", cfg).unwrap();
        assert_eq!(
            engine.discovery_document(None)["code_challenge_methods_supported"],
            json!([])
        );
    }
}
