//! # circle-id
//!
//! Typed identifiers for the CipherCircle client.
//!
//! ## Design Principles
//!
//! - Node-issued identifiers (case ids, executor public keys, document
//!   hashes) are opaque strings; the client never parses their structure
//! - Identifiers are typed so a `CaseId` cannot be passed where a `UserId`
//!   is expected
//! - Client-issued identifiers (JSON-RPC request ids) are prefixed ULIDs
//!
//! ## Formats
//!
//! - Opaque keys: any non-empty string, kept byte for byte, e.g.
//!   `Merger_1718000000000` or
//!   `7Vr2b3mZ9Kq8bX1Ns5Tx4c1RkG2vH9dYpQ3Lw6Ez8JfA`
//! - Request ids: `req_{ulid}`, e.g. `req_01HV4Z2WQXKJNM8GPQY6VBKC3D`

mod error;
mod macros;
mod request;
mod types;

pub use error::IdError;
pub use request::RequestId;
pub use types::*;

