//! # circle-client
//!
//! Client for the CipherCircle legal-collaboration application running on a
//! node.
//!
//! - [`CircleClient`]: one async method per node operation, over a
//!   [`RpcGateway`] (JSON-RPC over HTTP by default)
//! - [`EventStream`]: WebSocket subscription delivering [`DomainEvent`]s to
//!   listeners in arrival order
//! - [`views`]: projections that keep list views current from events
//!
//! Every call is scoped to the [`Session`] held in a [`SessionStore`]; with
//! no usable session, calls fail with a 401 before touching the network.
//!
//! Message and document contents are opaque, already-encrypted bytes.
//!
//! [`DomainEvent`]: circle_events::DomainEvent

mod api;
mod config;
mod details;
mod envelope;
mod error;
mod rpc;
mod session;
mod stream;
pub mod types;
pub mod views;

pub use api::{methods, CircleClient};
pub use config::{ClientConfig, DEFAULT_RPC_PATH, DEFAULT_WS_PATH};
pub use details::UserDetails;
pub use envelope::{Envelope, Receipt};
pub use error::{ApiError, ClientError, ErrorKind, CODE_BAD_REQUEST, CODE_INTERNAL, CODE_UNAUTHORIZED};
pub use rpc::{JsonRpcGateway, RpcGateway, RpcOutput, EXECUTE_METHOD};
pub use session::{Session, SessionStore};
pub use stream::{EventStream, Listener, ListenerGuard, ListenerId};

pub use circle_events::DomainEvent;
