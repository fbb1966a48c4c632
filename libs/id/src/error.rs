use thiserror::Error;

/// Why a raw string was rejected as an identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("identifier is empty")]
    Empty,

    /// Node key that is empty; carries the key type, e.g. `"case id"`.
    #[error("{0} is empty")]
    EmptyKey(&'static str),

    /// Request id with a prefix other than `req`.
    #[error("wrong identifier prefix {actual:?}, expected {expected:?}")]
    InvalidPrefix {
        expected: &'static str,
        actual: String,
    },

    #[error("identifier has no '_' between prefix and body")]
    MissingSeparator,

    #[error("malformed ULID: {0}")]
    InvalidUlid(String),
}

impl IdError {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty | Self::EmptyKey(_))
    }

    pub fn is_prefix_error(&self) -> bool {
        matches!(self, Self::InvalidPrefix { .. })
    }
}
