//! Client errors and their wire shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code reported for authentication failures.
pub const CODE_UNAUTHORIZED: i64 = 401;

/// Code reported for inputs rejected before any network I/O.
pub const CODE_BAD_REQUEST: i64 = 400;

/// Code reported for transport and format failures, and for remote
/// failures that carry no code of their own.
pub const CODE_INTERNAL: i64 = 500;

/// Coarse classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Validation,
    Transport,
    Remote,
    Format,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::Validation => "validation",
            ErrorKind::Transport => "transport",
            ErrorKind::Remote => "remote",
            ErrorKind::Format => "format",
        };
        f.write_str(s)
    }
}

/// Errors returned by the gateway and the domain client.
///
/// Every call makes at most one attempt; none of these are retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// No usable session: absent, missing the executor key or the token,
    /// expired, or rejected by the node.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Input rejected locally; nothing was sent.
    #[error("invalid input: {message}")]
    Validation { message: String },

    /// The node could not be reached or the connection failed mid-call.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The node answered with an error.
    #[error("{message}")]
    Remote {
        code: Option<i64>,
        error_type: Option<String>,
        message: String,
    },

    /// The node answered with something that could not be decoded.
    #[error("invalid response format: {message}")]
    Format { message: String },
}

impl ClientError {
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn remote(code: Option<i64>, message: impl Into<String>) -> Self {
        Self::Remote {
            code,
            error_type: None,
            message: message.into(),
        }
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::Format { .. } => ErrorKind::Format,
        }
    }

    /// Numeric code reported in the envelope.
    pub fn code(&self) -> i64 {
        match self {
            Self::Authentication { .. } => CODE_UNAUTHORIZED,
            Self::Validation { .. } => CODE_BAD_REQUEST,
            Self::Transport { .. } | Self::Format { .. } => CODE_INTERNAL,
            Self::Remote { code, .. } => code.unwrap_or(CODE_INTERNAL),
        }
    }

    /// Returns true if the caller has to log in (again).
    pub fn is_authentication(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }

    /// The envelope shape of this error.
    pub fn to_api_error(&self) -> ApiError {
        let message = match self {
            Self::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        };
        ApiError {
            message,
            code: self.code(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::format(err.to_string())
        } else {
            Self::transport(err.to_string())
        }
    }
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_keys().collect();
        fields.sort_unstable();
        Self::validation(format!("invalid fields: {}", fields.join(", ")))
    }
}

/// The `error` half of an [`Envelope`](crate::Envelope).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    pub code: i64,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        err.to_api_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ClientError::authentication("x").code(), 401);
        assert_eq!(ClientError::validation("x").code(), 400);
        assert_eq!(ClientError::transport("x").code(), 500);
        assert_eq!(ClientError::format("x").code(), 500);
        assert_eq!(ClientError::remote(None, "x").code(), 500);
        assert_eq!(ClientError::remote(Some(403), "x").code(), 403);
    }

    #[test]
    fn test_remote_message_passes_through() {
        let err = ClientError::remote(Some(-32000), "Case not found");
        let api = err.to_api_error();
        assert_eq!(api.message, "Case not found");
        assert_eq!(api.code, -32000);
    }

    #[test]
    fn test_kind() {
        assert_eq!(
            ClientError::authentication("no session").kind(),
            ErrorKind::Authentication
        );
        assert!(ClientError::authentication("no session").is_authentication());
        assert!(!ClientError::transport("refused").is_authentication());
    }

    #[test]
    fn test_api_error_json() {
        let api = ClientError::authentication("no session").to_api_error();
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["code"], 401);
        assert!(json["message"].as_str().unwrap().contains("no session"));
    }
}
