//! # circle-events
//!
//! Domain event definitions for the CipherCircle client, and decoding of the
//! WebSocket frames the node pushes them in.
//!
//! ## Design Principles
//!
//! - Events are transient notifications; they never carry message or
//!   document content, only identifiers
//! - Every event kind has exactly one payload shape
//! - Decoding is lenient at the frame level (unknown frame types are
//!   surfaced, not rejected) and strict at the event level
//!
//! ## Wire Shape
//!
//! The node wraps events in a JSON-RPC notification:
//!
//! ```json
//! {"jsonrpc":"2.0","id":null,"result":{
//!   "contextId":"ctx-1","type":"ExecutionEvent",
//!   "data":{"events":[{"kind":"MessageSent","data":{"case_id":"c1","sender":"u1"}}]}}}
//! ```
//!
//! `data` of each event is either the payload object or the UTF-8 JSON bytes
//! of it encoded as a number array.

mod envelope;
mod error;
mod types;

pub use envelope::*;
pub use error::EventError;
pub use types::*;
