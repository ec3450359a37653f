//! Request context and session contract.
//!
//! A request may or may not carry an end-user session. Authorization requests
//! from a logged-in browser have one; back-channel requests such as a PKCE
//! token exchange do not. Accessing session state on a session-less request is
//! a [`EngineError::SessionStateViolation`], so callers check
//! [`RequestContext::has_session`] first.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::EngineError;

/// End-user session as seen by the policy layer.
#[async_trait]
pub trait Session: Send + Sync + std::fmt::Debug {
    /// Session identifier.
    fn id(&self) -> &str;

    /// Account bound to the session, once the user has logged in.
    fn account_id(&self) -> Option<String>;

    /// Records scopes as already consented to for a client.
    ///
    /// Grants accumulate; granting an already granted scope is a no-op.
    async fn grant_scopes(&self, client_id: &str, scopes: &[&str]) -> Result<(), EngineError>;

    /// Scopes consented to for a client in this session.
    async fn granted_scopes(&self, client_id: &str) -> BTreeSet<String>;
}

/// Session kept in process memory.
#[derive(Debug)]
pub struct InMemorySession {
    id: String,
    account_id: Option<String>,
    grants: DashMap<String, BTreeSet<String>>,
}

impl InMemorySession {
    /// Creates an anonymous session.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            account_id: None,
            grants: DashMap::new(),
        }
    }

    /// Creates a session already bound to an account.
    #[must_use]
    pub fn for_account(account_id: impl Into<String>) -> Self {
        Self {
            account_id: Some(account_id.into()),
            ..Self::new()
        }
    }
}

impl Default for InMemorySession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Session for InMemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    fn account_id(&self) -> Option<String> {
        self.account_id.clone()
    }

    async fn grant_scopes(&self, client_id: &str, scopes: &[&str]) -> Result<(), EngineError> {
        let mut granted = self.grants.entry(client_id.to_string()).or_default();
        granted.extend(scopes.iter().map(|s| (*s).to_string()));
        Ok(())
    }

    async fn granted_scopes(&self, client_id: &str) -> BTreeSet<String> {
        self.grants
            .get(client_id)
            .map(|g| g.value().clone())
            .unwrap_or_default()
    }
}

/// Per-request context handed to account callbacks.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    client_id: Option<String>,
    session: Option<Arc<dyn Session>>,
}

impl RequestContext {
    /// Creates an empty context: no client, no session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client the request is made on behalf of.
    #[must_use]
    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Attaches an end-user session.
    #[must_use]
    pub fn with_session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    /// Client the request is made on behalf of.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Whether a session is attached.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// The attached session.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateViolation` when the request has no session.
    pub fn session(&self) -> Result<&Arc<dyn Session>, EngineError> {
        self.session
            .as_ref()
            .ok_or_else(|| EngineError::session_state("request has no session"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_grants_accumulate_per_client() {
        let session = InMemorySession::for_account("alice");
        session.grant_scopes("c1", &["openid"]).await.unwrap();
        session.grant_scopes("c1", &["openid", "profile"]).await.unwrap();

        let granted = session.granted_scopes("c1").await;
        assert_eq!(granted.len(), 2);
        assert!(granted.contains("openid"));
        assert!(session.granted_scopes("c2").await.is_empty());
        assert_eq!(session.account_id().as_deref(), Some("alice"));
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(InMemorySession::new().id(), InMemorySession::new().id());
    }

    #[test]
    fn test_session_access_without_session_is_a_violation() {
        let ctx = RequestContext::new().with_client("c1");
        assert!(!ctx.has_session());
        assert!(matches!(
            ctx.session(),
            Err(EngineError::SessionStateViolation { .. })
        ));
    }

    #[test]
    fn test_context_with_session() {
        let session: Arc<dyn Session> = Arc::new(InMemorySession::new());
        let ctx = RequestContext::new()
            .with_client("c1")
            .with_session(session.clone());
        assert!(ctx.has_session());
        assert_eq!(ctx.client_id(), Some("c1"));
        assert_eq!(ctx.session().unwrap().id(), session.id());
    }
}
