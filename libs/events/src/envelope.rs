//! Stream frames - the JSON-RPC notifications that carry events.

use circle_id::{ContextId, RequestId};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{DomainEvent, EventError};

/// Frame type carrying application events.
pub const EXECUTION_EVENT: &str = "ExecutionEvent";

/// Method name of the subscription request.
pub const SUBSCRIBE_METHOD: &str = "subscribe";

/// Method name of the unsubscription request.
pub const UNSUBSCRIBE_METHOD: &str = "unsubscribe";

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Events emitted by the application running in a context.
    Events(ContextEvents),

    /// A response to one of our requests (subscribe, unsubscribe).
    Ack { id: Option<String> },

    /// Any other notification (for example `StateMutation`).
    Other { frame_type: String },
}

/// Events emitted within one context, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEvents {
    pub context_id: ContextId,
    pub events: Vec<RawEvent>,
}

/// An event as it appears on the wire, before payload decoding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawEvent {
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl RawEvent {
    /// Decodes the payload into a [`DomainEvent`].
    ///
    /// The payload may be the JSON object itself or its UTF-8 JSON bytes
    /// encoded as an array of numbers.
    pub fn decode(&self) -> Result<DomainEvent, EventError> {
        let payload = match &self.data {
            Value::Array(items) => {
                let bytes = items
                    .iter()
                    .map(|item| {
                        item.as_u64()
                            .and_then(|b| u8::try_from(b).ok())
                            .ok_or_else(|| EventError::InvalidPayload {
                                kind: self.kind.clone(),
                                message: "byte payload contains a non-byte value".to_string(),
                            })
                    })
                    .collect::<Result<Vec<u8>, _>>()?;
                serde_json::from_slice(&bytes).map_err(|e| EventError::InvalidPayload {
                    kind: self.kind.clone(),
                    message: e.to_string(),
                })?
            }
            other => other.clone(),
        };

        DomainEvent::from_parts(&self.kind, payload)
    }
}

#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireContextEvent {
    context_id: ContextId,
    #[serde(default)]
    data: WireEventData,
}

#[derive(Debug, Default, Deserialize)]
struct WireEventData {
    #[serde(default)]
    events: Vec<RawEvent>,
}

/// Decodes one text frame received on the event socket.
pub fn decode_frame(text: &str) -> Result<StreamFrame, EventError> {
    let frame: WireFrame =
        serde_json::from_str(text).map_err(|e| EventError::MalformedFrame(e.to_string()))?;

    if let Some(error) = frame.error {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(EventError::Remote(message));
    }

    let id = frame.id.and_then(|id| match id {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    let Some(result) = frame.result else {
        return Err(EventError::MalformedFrame(
            "frame has neither result nor error".to_string(),
        ));
    };

    match result.get("type").and_then(Value::as_str) {
        Some(EXECUTION_EVENT) => {
            let event: WireContextEvent = serde_json::from_value(result)
                .map_err(|e| EventError::MalformedFrame(e.to_string()))?;
            Ok(StreamFrame::Events(ContextEvents {
                context_id: event.context_id,
                events: event.data.events,
            }))
        }
        Some(other) => Ok(StreamFrame::Other {
            frame_type: other.to_string(),
        }),
        None => Ok(StreamFrame::Ack { id }),
    }
}

/// Builds a subscription request for the given contexts.
pub fn subscribe_request(id: RequestId, contexts: &[ContextId]) -> Value {
    context_request(id, SUBSCRIBE_METHOD, contexts)
}

/// Builds an unsubscription request for the given contexts.
pub fn unsubscribe_request(id: RequestId, contexts: &[ContextId]) -> Value {
    context_request(id, UNSUBSCRIBE_METHOD, contexts)
}

fn context_request(id: RequestId, method: &str, contexts: &[ContextId]) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": { "contextIds": contexts },
    })
}

/// Encodes events the way the node pushes them.
///
/// With `as_bytes` the payloads are emitted as UTF-8 JSON byte arrays,
/// otherwise as plain objects.
pub fn encode_event_frame(
    context_id: &ContextId,
    events: &[DomainEvent],
    as_bytes: bool,
) -> Result<Value, EventError> {
    let events = events
        .iter()
        .map(|event| {
            let (kind, payload) = event.to_parts()?;
            let data = if as_bytes {
                Value::from(serde_json::to_vec(&payload)?)
            } else {
                payload
            };
            Ok(json!({ "kind": kind.as_str(), "data": data }))
        })
        .collect::<Result<Vec<_>, EventError>>()?;

    Ok(json!({
        "jsonrpc": "2.0",
        "id": null,
        "result": {
            "contextId": context_id,
            "type": EXECUTION_EVENT,
            "data": { "events": events },
        },
    }))
}
