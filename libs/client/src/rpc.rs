//! JSON-RPC gateway to the node.

use async_trait::async_trait;
use circle_id::{ContextId, RequestId, UserId};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{ClientConfig, ClientError, Session};

/// Name of the JSON-RPC method that runs an application call.
pub const EXECUTE_METHOD: &str = "execute";

/// Successful output of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcOutput {
    pub request_id: RequestId,
    pub output: Value,
}

/// Forwards one application call to the node.
///
/// Implementations make exactly one attempt per call.
#[async_trait]
pub trait RpcGateway: Send + Sync {
    async fn call(
        &self,
        method: &str,
        args: Value,
        session: &Session,
    ) -> Result<RpcOutput, ClientError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: RequestId,
    method: &'static str,
    params: ExecuteParams<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteParams<'a> {
    context_id: &'a ContextId,
    method: &'a str,
    args_json: Value,
    executor_public_key: &'a UserId,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<ExecuteResult>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ExecuteResult {
    #[serde(default)]
    output: Value,
}

/// Error object as the node reports it. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcErrorBody {
    fn into_error(self, fallback_code: Option<i64>) -> ClientError {
        let message = self
            .message
            .or_else(|| match self.data {
                Some(Value::String(s)) => Some(s),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
            .or_else(|| self.error_type.clone())
            .unwrap_or_else(|| "Unknown error".to_string());

        ClientError::Remote {
            code: self.code.or(fallback_code),
            error_type: self.error_type,
            message,
        }
    }
}

/// [`RpcGateway`] over HTTP.
#[derive(Debug, Clone)]
pub struct JsonRpcGateway {
    client: reqwest::Client,
    config: ClientConfig,
}

impl JsonRpcGateway {
    /// Create a gateway with the given transport settings.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn send(
        &self,
        method: &str,
        args: Value,
        session: &Session,
    ) -> Result<RpcOutput, ClientError> {
        let (executor, token) = session.credentials()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ClientError::authentication("access token is not a valid header value"))?;

        let id = RequestId::new();
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: EXECUTE_METHOD,
            params: ExecuteParams {
                context_id: &session.context_id,
                method,
                args_json: args,
                executor_public_key: executor,
            },
        };

        let response = self
            .client
            .post(self.config.rpc_url(&session.node_url))
            .header(AUTHORIZATION, bearer)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::authentication("node rejected the access token"));
        }

        let body = response.bytes().await?;

        let http_code = (!status.is_success()).then(|| i64::from(status.as_u16()));

        let parsed: JsonRpcResponse = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(_) if http_code.is_some() => {
                let reason = status.canonical_reason().unwrap_or("request failed");
                return Err(ClientError::remote(http_code, reason));
            }
            Err(e) => return Err(ClientError::format(e.to_string())),
        };

        match (parsed.result, parsed.error) {
            (_, Some(error)) => Err(error.into_error(http_code)),
            (Some(result), None) if http_code.is_none() => Ok(RpcOutput {
                request_id: id,
                output: result.output,
            }),
            (_, None) => match http_code {
                Some(code) => Err(ClientError::remote(
                    Some(code),
                    status.canonical_reason().unwrap_or("request failed"),
                )),
                None => Err(ClientError::format(
                    "response has neither result nor error",
                )),
            },
        }
    }
}

#[async_trait]
impl RpcGateway for JsonRpcGateway {
    async fn call(
        &self,
        method: &str,
        args: Value,
        session: &Session,
    ) -> Result<RpcOutput, ClientError> {
        debug!(method, context_id = %session.context_id, "rpc call");

        let result = self.send(method, args, session).await;

        match &result {
            Ok(output) => debug!(method, request_id = %output.request_id, "rpc call succeeded"),
            Err(err) => warn!(method, kind = %err.kind(), code = err.code(), error = %err, "rpc call failed"),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let context = ContextId::new("ctx-1").unwrap();
        let executor = UserId::new("exec-1").unwrap();
        let id = RequestId::new();
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: EXECUTE_METHOD,
            params: ExecuteParams {
                context_id: &context,
                method: "list_cases_for_user",
                args_json: json!({"user_id": "exec-1"}),
                executor_public_key: &executor,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["method"], "execute");
        assert_eq!(json["id"], id.to_string());
        assert_eq!(json["params"]["contextId"], "ctx-1");
        assert_eq!(json["params"]["method"], "list_cases_for_user");
        assert_eq!(json["params"]["argsJson"]["user_id"], "exec-1");
        assert_eq!(json["params"]["executorPublicKey"], "exec-1");
    }

    #[test]
    fn test_error_body_message_fallbacks() {
        let err = RpcErrorBody {
            error_type: Some("FunctionCallError".into()),
            data: Some(json!("Case not found")),
            ..RpcErrorBody::default()
        }
        .into_error(None);
        assert_eq!(err.to_api_error().message, "Case not found");
        assert_eq!(err.code(), 500);

        let err = RpcErrorBody {
            error_type: Some("FunctionCallError".into()),
            ..RpcErrorBody::default()
        }
        .into_error(Some(403));
        assert_eq!(err.to_api_error().message, "FunctionCallError");
        assert_eq!(err.code(), 403);

        let err = RpcErrorBody::default().into_error(None);
        assert_eq!(err.to_api_error().message, "Unknown error");
    }
}
