//! Session context: who is calling, against which node and context.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use circle_id::{ContextId, UserId};
use serde::{Deserialize, Serialize};

use crate::ClientError;

/// A logged-in session.
///
/// Created at login and read-only afterwards. The executor public key is
/// also the caller's user id on the node.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Base URL of the node.
    pub node_url: String,

    /// Application context every call runs in.
    pub context_id: ContextId,

    /// Identity key the node executes calls as.
    #[serde(default)]
    pub executor_public_key: Option<UserId>,

    /// Bearer token for the `Authorization` header.
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token expiration time (if known).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(
        node_url: impl Into<String>,
        context_id: ContextId,
        executor_public_key: UserId,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            node_url: node_url.into(),
            context_id,
            executor_public_key: Some(executor_public_key),
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns true if the token is known to have expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// The executor key, or an authentication error when it is missing.
    pub fn executor(&self) -> Result<&UserId, ClientError> {
        self.executor_public_key
            .as_ref()
            .ok_or_else(|| ClientError::authentication("session has no executor public key"))
    }

    /// Checks that the session can authorize a call and returns the
    /// executor key and bearer token.
    pub fn credentials(&self) -> Result<(&UserId, &str), ClientError> {
        let executor = self.executor()?;
        if self.access_token.is_empty() {
            return Err(ClientError::authentication("session has no access token"));
        }
        if self.is_expired_at(Utc::now()) {
            return Err(ClientError::authentication("session has expired"));
        }
        Ok((executor, &self.access_token))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("node_url", &self.node_url)
            .field("context_id", &self.context_id)
            .field("executor_public_key", &self.executor_public_key)
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Shared holder of the current session.
///
/// Clones share the same slot, so a logout through one handle is seen by
/// every client holding another.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    /// An empty store (logged out).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(session))),
        }
    }

    /// Install a session, replacing any previous one.
    pub fn login(&self, session: Session) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    /// Destroy the current session, returning it.
    pub fn logout(&self) -> Option<Session> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// A snapshot of the current session.
    pub fn current(&self) -> Option<Session> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current session, or an authentication error when logged out.
    pub fn require(&self) -> Result<Session, ClientError> {
        self.current()
            .ok_or_else(|| ClientError::authentication("no active session"))
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session() -> Session {
        Session::new(
            "http://localhost:2428",
            ContextId::new("ctx-1").unwrap(),
            UserId::new("exec-1").unwrap(),
            "token",
        )
    }

    #[test]
    fn test_credentials() {
        let s = session();
        let (executor, token) = s.credentials().unwrap();
        assert_eq!(executor.as_str(), "exec-1");
        assert_eq!(token, "token");
    }

    #[test]
    fn test_missing_executor_is_authentication_error() {
        let mut s = session();
        s.executor_public_key = None;
        let err = s.credentials().unwrap_err();
        assert_eq!(err.code(), 401);
    }

    #[test]
    fn test_empty_token_is_authentication_error() {
        let mut s = session();
        s.access_token.clear();
        assert!(s.credentials().unwrap_err().is_authentication());
    }

    #[test]
    fn test_expired_session() {
        let s = session().with_expires_at(Utc::now() - Duration::minutes(1));
        assert!(s.credentials().unwrap_err().is_authentication());

        let s = session().with_expires_at(Utc::now() + Duration::minutes(5));
        assert!(s.credentials().is_ok());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let s = session().with_refresh_token("refresh");
        let debug = format!("{s:?}");
        assert!(!debug.contains("token\""));
        assert!(!debug.contains("refresh\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_store_login_logout() {
        let store = SessionStore::new();
        assert!(store.require().unwrap_err().is_authentication());

        let shared = store.clone();
        store.login(session());
        assert!(shared.is_logged_in());

        let previous = shared.logout();
        assert_eq!(previous, Some(session()));
        assert!(!store.is_logged_in());
    }

    #[test]
    fn test_session_json_omits_unset_optionals() {
        let json = serde_json::to_value(session()).unwrap();
        assert!(json.get("refresh_token").is_none());
        assert_eq!(json["executor_public_key"], "exec-1");
    }
}
