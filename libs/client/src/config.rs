//! Client configuration.

use std::time::Duration;

/// Default JSON-RPC endpoint path on the node.
pub const DEFAULT_RPC_PATH: &str = "/jsonrpc";

/// Default WebSocket endpoint path on the node.
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Transport settings shared by the gateway and the event stream.
///
/// The node address itself lives in the [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Path of the JSON-RPC endpoint.
    pub rpc_path: String,

    /// Path of the WebSocket endpoint.
    pub ws_path: String,

    /// Timeout for one RPC call, connect included.
    pub request_timeout: Duration,

    /// Timeout for establishing the event stream.
    pub connect_timeout: Duration,

    /// Capacity of the broadcast channel behind [`EventStream::events`](crate::EventStream::events).
    pub event_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_path: DEFAULT_RPC_PATH.to_string(),
            ws_path: DEFAULT_WS_PATH.to_string(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            event_buffer: 256,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let rpc_path = std::env::var("CIRCLE_RPC_PATH").unwrap_or(defaults.rpc_path);
        let ws_path = std::env::var("CIRCLE_WS_PATH").unwrap_or(defaults.ws_path);

        let request_timeout = std::env::var("CIRCLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Self {
            rpc_path,
            ws_path,
            request_timeout,
            ..defaults
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    /// Full JSON-RPC URL for a node.
    pub fn rpc_url(&self, node_url: &str) -> String {
        join_url(node_url, &self.rpc_path)
    }

    /// Full WebSocket URL for a node, with the scheme mapped to ws/wss.
    pub fn ws_url(&self, node_url: &str) -> String {
        let url = join_url(node_url, &self.ws_path);
        if let Some(rest) = url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            url
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.rpc_path, "/jsonrpc");
        assert_eq!(config.ws_path, "/ws");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_rpc_url_joins_without_double_slash() {
        let config = ClientConfig::default();
        assert_eq!(
            config.rpc_url("http://localhost:2428/"),
            "http://localhost:2428/jsonrpc"
        );
    }

    #[test]
    fn test_ws_url_maps_scheme() {
        let config = ClientConfig::default();
        assert_eq!(config.ws_url("http://node:2428"), "ws://node:2428/ws");
        assert_eq!(config.ws_url("https://node.example"), "wss://node.example/ws");
    }

    #[test]
    fn test_relative_path() {
        let config = ClientConfig {
            rpc_path: "rpc".into(),
            ..ClientConfig::default()
        };
        assert_eq!(config.rpc_url("http://n"), "http://n/rpc");
    }

    #[test]
    fn test_event_buffer_never_zero() {
        let config = ClientConfig::default().with_event_buffer(0);
        assert_eq!(config.event_buffer, 1);
    }
}
