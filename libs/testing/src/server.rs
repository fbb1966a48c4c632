//! HTTP and WebSocket surface of the mock node.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use circle_events::{encode_event_frame, DomainEvent, EventError};
use circle_id::ContextId;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::ledger::{Ledger, Outcome};
use crate::RecordedCall;

pub const RPC_PATH: &str = "/jsonrpc";
pub const WS_PATH: &str = "/ws";

const OUTBOUND_CAPACITY: usize = 1024;

/// A frame fanned out to every open socket.
#[derive(Debug, Clone)]
pub(crate) enum Outbound {
    Frame { context_id: ContextId, text: String },
    Close,
}

/// Shared state behind the router.
pub(crate) struct NodeState {
    pub token: String,
    pub context_id: ContextId,
    ledger: Mutex<Ledger>,
    pub calls: Mutex<Vec<RecordedCall>>,
    pub subscribers: AtomicUsize,
    pub bytes_payloads: AtomicBool,
    outbound: broadcast::Sender<Outbound>,
}

impl NodeState {
    pub fn new(token: String, context_id: ContextId) -> Self {
        let (outbound, _) = broadcast::channel(OUTBOUND_CAPACITY);
        Self {
            token,
            context_id,
            ledger: Mutex::new(Ledger::default()),
            calls: Mutex::new(Vec::new()),
            subscribers: AtomicUsize::new(0),
            bytes_payloads: AtomicBool::new(false),
            outbound,
        }
    }

    pub fn ledger(&self) -> std::sync::MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        bearer_token(headers).is_some_and(|token| token == self.token)
    }

    /// Pushes events to sockets subscribed to `context_id`.
    pub fn publish(&self, context_id: &ContextId, events: &[DomainEvent]) -> Result<(), EventError> {
        if events.is_empty() {
            return Ok(());
        }
        let as_bytes = self.bytes_payloads.load(Ordering::SeqCst);
        let frame = encode_event_frame(context_id, events, as_bytes)?;
        // No open sockets is not an error.
        let _ = self.outbound.send(Outbound::Frame {
            context_id: context_id.clone(),
            text: frame.to_string(),
        });
        Ok(())
    }

    pub fn close_sockets(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

pub(crate) fn router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route(RPC_PATH, post(rpc))
        .route(WS_PATH, get(ws))
        .with_state(state)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get("Authorization")?.to_str().ok()?;
    let token = auth.trim().strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

// =============================================================================
// JSON-RPC
// =============================================================================

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteParams {
    context_id: String,
    method: String,
    #[serde(default)]
    args_json: Value,
    executor_public_key: String,
}

fn rpc_error(id: &Value, error: Value) -> Response {
    Json(json!({ "jsonrpc": "2.0", "id": id, "error": error })).into_response()
}

async fn rpc(
    State(node): State<Arc<NodeState>>,
    headers: HeaderMap,
    Json(request): Json<RpcRequest>,
) -> Response {
    if !node.authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "message": "invalid or missing token" } })),
        )
            .into_response();
    }

    if request.method != "execute" {
        return rpc_error(
            &request.id,
            json!({ "code": -32601, "type": "MethodNotFound", "message": format!("unknown method {}", request.method) }),
        );
    }

    let params: ExecuteParams = match serde_json::from_value(request.params) {
        Ok(params) => params,
        Err(e) => {
            return rpc_error(
                &request.id,
                json!({ "code": -32602, "type": "InvalidParams", "message": e.to_string() }),
            )
        }
    };

    if params.context_id != node.context_id.as_str() {
        return rpc_error(
            &request.id,
            json!({ "type": "ContextNotFound", "data": format!("context {} not found", params.context_id) }),
        );
    }

    node.calls
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(RecordedCall {
            method: params.method.clone(),
            args: params.args_json.clone(),
            executor: params.executor_public_key.clone(),
        });

    let result = node
        .ledger()
        .execute(&params.method, params.args_json, &params.executor_public_key);

    match result {
        Ok(Outcome { output, events }) => {
            debug!(method = %params.method, events = events.len(), "call applied");
            if let Err(e) = node.publish(&node.context_id, &events) {
                warn!(error = %e, "failed to encode events");
            }
            Json(json!({ "jsonrpc": "2.0", "id": request.id, "result": { "output": output } }))
                .into_response()
        }
        Err(message) => {
            debug!(method = %params.method, %message, "call rejected");
            rpc_error(
                &request.id,
                json!({ "type": "FunctionCallError", "data": message }),
            )
        }
    }
}

// =============================================================================
// Event socket
// =============================================================================

#[derive(Debug, Deserialize)]
struct SocketRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: SocketParams,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocketParams {
    #[serde(default)]
    context_ids: Vec<ContextId>,
}

async fn ws(
    State(node): State<Arc<NodeState>>,
    headers: HeaderMap,
    upgrade: WebSocketUpgrade,
) -> Response {
    if !node.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    upgrade.on_upgrade(move |socket| serve_socket(node, socket))
}

async fn serve_socket(node: Arc<NodeState>, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let mut outbound = node.outbound.subscribe();
    let mut topics: Vec<ContextId> = Vec::new();
    let mut counted = false;

    loop {
        tokio::select! {
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let request: SocketRequest = match serde_json::from_str(text.as_str()) {
                        Ok(request) => request,
                        Err(e) => {
                            warn!(error = %e, "unreadable socket request");
                            continue;
                        }
                    };

                    match request.method.as_str() {
                        "subscribe" => {
                            for context in request.params.context_ids {
                                if !topics.contains(&context) {
                                    topics.push(context);
                                }
                            }
                        }
                        "unsubscribe" => {
                            topics.retain(|t| !request.params.context_ids.contains(t));
                        }
                        other => {
                            warn!(method = other, "unsupported socket method");
                            continue;
                        }
                    }

                    let ack = json!({
                        "jsonrpc": "2.0",
                        "id": request.id,
                        "result": { "contextIds": topics },
                    });
                    if sender.send(Message::Text(ack.to_string().into())).await.is_err() {
                        break;
                    }

                    if !counted && !topics.is_empty() {
                        counted = true;
                        node.subscribers.fetch_add(1, Ordering::SeqCst);
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    debug!(error = %e, "socket read failed");
                    break;
                }
            },
            frame = outbound.recv() => match frame {
                Ok(Outbound::Frame { context_id, text }) => {
                    if topics.contains(&context_id)
                        && sender.send(Message::Text(text.into())).await.is_err()
                    {
                        break;
                    }
                }
                Ok(Outbound::Close) => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "socket lagged behind event fan-out");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    if counted {
        node.subscribers.fetch_sub(1, Ordering::SeqCst);
    }
}
