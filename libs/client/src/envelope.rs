//! The `{data, error}` result shape handed to UI callers.

use circle_id::RequestId;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::{ApiError, ClientError};

/// Result of one domain operation.
///
/// Serializes as `{"data": ..., "error": null}` or
/// `{"data": null, "error": {"message": ..., "code": ...}}`. Exactly one of
/// the two is non-null; deserializing anything else fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Data(T),
    Error(ApiError),
}

impl<T> Envelope<T> {
    pub fn data(&self) -> Option<&T> {
        match self {
            Envelope::Data(data) => Some(data),
            Envelope::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Envelope::Data(_) => None,
            Envelope::Error(error) => Some(error),
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Envelope::Data(_))
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            Envelope::Data(data) => Ok(data),
            Envelope::Error(error) => Err(error),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        match self {
            Envelope::Data(data) => Envelope::Data(f(data)),
            Envelope::Error(error) => Envelope::Error(error),
        }
    }
}

impl<T> From<Result<T, ClientError>> for Envelope<T> {
    fn from(result: Result<T, ClientError>) -> Self {
        match result {
            Ok(data) => Envelope::Data(data),
            Err(err) => Envelope::Error(err.to_api_error()),
        }
    }
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Envelope", 2)?;
        state.serialize_field("data", &self.data())?;
        state.serialize_field("error", &self.error())?;
        state.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Envelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(bound(deserialize = "T: Deserialize<'de>"))]
        struct Raw<T> {
            #[serde(default)]
            data: Option<T>,
            #[serde(default)]
            error: Option<ApiError>,
        }

        let raw = Raw::<T>::deserialize(deserializer)?;
        match (raw.data, raw.error) {
            (Some(data), None) => Ok(Envelope::Data(data)),
            (None, Some(error)) => Ok(Envelope::Error(error)),
            (Some(_), Some(_)) => Err(de::Error::custom(
                "envelope has both data and error set",
            )),
            (None, None) => Err(de::Error::custom(
                "envelope has neither data nor error set",
            )),
        }
    }
}

/// Acknowledgement of an operation that produces no value.
///
/// Returned instead of `()` so a successful envelope always has non-null
/// `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub request_id: RequestId,
    pub method: String,
}
