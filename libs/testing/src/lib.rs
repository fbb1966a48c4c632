//! In-process stand-in for an application node.
//!
//! [`MockNode`] serves the JSON-RPC execute endpoint and the event socket on
//! an ephemeral local port. Calls run against an in-memory ledger that
//! enforces the same membership and ownership rules as the deployed
//! application, and every state change is pushed to subscribed sockets as
//! an `ExecutionEvent` frame.
//!
//! ```ignore
//! let node = MockNode::start().await?;
//! let session = Session::new(node.url(), node.context_id().clone(), lawyer, node.token());
//! ```

mod ledger;
mod server;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use circle_events::{DomainEvent, EventError};
use circle_id::{ContextId, DocHash, IdError, UserId};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::server::NodeState;

pub use crate::server::{RPC_PATH, WS_PATH};

/// Bearer token accepted by [`MockNode::start`].
pub const DEFAULT_TOKEN: &str = "test-token";

/// Context served by [`MockNode::start`].
pub const DEFAULT_CONTEXT: &str = "ctx-test";

/// Errors raised by the mock node helpers.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("failed to bind mock node: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid context id: {0}")]
    Context(#[from] IdError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error("node rejected the operation: {0}")]
    Rejected(String),
}

/// One `execute` call as the node received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub args: Value,
    pub executor: String,
}

/// A running mock node. The server stops when this is dropped.
pub struct MockNode {
    addr: SocketAddr,
    state: Arc<NodeState>,
    server: JoinHandle<()>,
}

impl MockNode {
    /// Starts a node serving [`DEFAULT_CONTEXT`] behind [`DEFAULT_TOKEN`].
    pub async fn start() -> Result<Self, NodeError> {
        Self::start_with(DEFAULT_TOKEN, DEFAULT_CONTEXT).await
    }

    pub async fn start_with(token: &str, context_id: &str) -> Result<Self, NodeError> {
        let context_id = ContextId::new(context_id)?;
        let state = Arc::new(NodeState::new(token.to_string(), context_id));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = server::router(state.clone());

        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "mock node stopped");
            }
        });

        tracing::debug!(%addr, "mock node listening");
        Ok(Self {
            addr,
            state,
            server,
        })
    }

    /// Base URL, without the RPC or socket path.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn context_id(&self) -> &ContextId {
        &self.state.context_id
    }

    pub fn token(&self) -> &str {
        &self.state.token
    }

    /// Pushes events on the served context.
    pub fn emit(&self, events: &[DomainEvent]) -> Result<(), NodeError> {
        self.emit_to(&self.state.context_id, events)
    }

    /// Pushes events on an arbitrary context, served or not.
    pub fn emit_to(&self, context_id: &ContextId, events: &[DomainEvent]) -> Result<(), NodeError> {
        self.state.publish(context_id, events)?;
        Ok(())
    }

    /// Switches event payloads between JSON objects and JSON byte arrays.
    pub fn set_bytes_payloads(&self, enabled: bool) {
        self.state.bytes_payloads.store(enabled, Ordering::SeqCst);
    }

    /// Number of open sockets with at least one subscription.
    pub fn subscribers(&self) -> usize {
        self.state.subscribers.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` sockets have subscribed.
    ///
    /// Returns `false` if `timeout` elapses first.
    pub async fn wait_for_subscribers(&self, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.subscribers() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }

    /// Every `execute` call received so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Closes every open event socket from the server side.
    pub fn drop_connections(&self) {
        self.state.close_sockets();
    }

    /// Finishes the pending analysis of a document and emits
    /// `AnalysisCompleted` followed by `DocumentAnalyzed`.
    pub fn complete_analysis(&self, doc_hash: &DocHash) -> Result<(), NodeError> {
        let outcome = self
            .state
            .ledger()
            .complete_analysis(doc_hash.as_str())
            .map_err(NodeError::Rejected)?;
        self.emit(&outcome.events)
    }

    /// Users who asked `user` for access to their details and are still waiting.
    pub fn pending_detail_requests(&self, user: &UserId) -> Vec<String> {
        self.state.ledger().detail_requests(user.as_str())
    }
}

impl Drop for MockNode {
    fn drop(&mut self) {
        self.server.abort();
    }
}
