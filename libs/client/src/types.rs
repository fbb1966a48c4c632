//! Records exchanged with the node.
//!
//! These mirror the node's own structs field for field. Byte fields travel
//! as JSON number arrays, which is what serde does for `Vec<u8>`.

use std::fmt;
use std::str::FromStr;

use circle_id::{AnalysisId, CaseId, DocHash, PaymentId, UserId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ClientError;

// =============================================================================
// Enums
// =============================================================================

/// How a message behaves once read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageMode {
    /// Disappears for each reader once they mark it read.
    Vanish,
    /// Stays visible; reads are only recorded.
    Persistent,
}

impl fmt::Display for MessageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageMode::Vanish => write!(f, "Vanish"),
            MessageMode::Persistent => write!(f, "Persistent"),
        }
    }
}

/// Who can see a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PrivacyLevel {
    /// Only members.
    #[default]
    Private,
    /// Everyone in the context.
    Public,
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivacyLevel::Private => write!(f, "Private"),
            PrivacyLevel::Public => write!(f, "Public"),
        }
    }
}

/// Role of a case member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Lawyer,
    Client,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Lawyer => "lawyer",
            MemberRole::Client => "client",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lawyer" => Ok(MemberRole::Lawyer),
            "client" => Ok(MemberRole::Client),
            other => Err(ClientError::validation(format!(
                "unknown member role {other:?}"
            ))),
        }
    }
}

// =============================================================================
// Cases
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseMember {
    pub member_id: UserId,
    pub role: MemberRole,
    pub is_admin: bool,
}

/// Parameters for opening a case. The admin is always the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaseCreateParams {
    pub case_name: String,
    pub description: String,
    pub privacy_level: PrivacyLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<UserId>,
    #[serde(default)]
    pub initial_docs: Vec<DocHash>,
}

impl CaseCreateParams {
    pub fn new(case_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            case_name: case_name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_privacy(mut self, privacy_level: PrivacyLevel) -> Self {
        self.privacy_level = privacy_level;
        self
    }

    pub fn with_client(mut self, client_id: UserId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Rejects parameters the node would refuse.
    pub fn check(&self) -> Result<(), ClientError> {
        if self.case_name.trim().is_empty() || self.description.trim().is_empty() {
            return Err(ClientError::validation(
                "case name and description are required",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalCase {
    pub case_id: CaseId,
    pub case_name: String,
    /// The node reports a case without a client as an empty string.
    #[serde(default, with = "empty_as_none")]
    pub client_id: Option<UserId>,
    #[serde(default)]
    pub lawyer_ids: Vec<UserId>,
    pub admin_id: UserId,
    pub status: String,
    #[serde(default)]
    pub related_documents: Vec<DocHash>,
    #[serde(default)]
    pub privacy_level: PrivacyLevel,
}

impl LegalCase {
    /// Client first, then lawyers.
    pub fn participants(&self) -> Vec<UserId> {
        self.client_id
            .iter()
            .chain(self.lawyer_ids.iter())
            .cloned()
            .collect()
    }

    pub fn is_member(&self, user: &UserId) -> bool {
        self.admin_id == *user
            || self.client_id.as_ref() == Some(user)
            || self.lawyer_ids.contains(user)
    }
}

// =============================================================================
// Messages
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedMessage {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub sender_id: UserId,
    #[serde(default)]
    pub recipient_ids: Vec<UserId>,
    pub timestamp: u64,
    pub mode: MessageMode,
    #[serde(default)]
    pub read_receipts: Vec<UserId>,
}

impl EncryptedMessage {
    pub fn is_read_by(&self, user: &UserId) -> bool {
        self.read_receipts.contains(user)
    }
}

// =============================================================================
// Documents
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalDocument {
    pub encrypted_content: Vec<u8>,
    pub document_hash: DocHash,
    pub document_type: String,
    pub owner_id: UserId,
    #[serde(default)]
    pub case_id: Option<CaseId>,
    #[serde(default)]
    pub access_list: Vec<UserId>,
    #[serde(default)]
    pub ai_analysis_id: Option<AnalysisId>,
    #[serde(default)]
    pub payment_id: Option<PaymentId>,
    pub timestamp: u64,
}

/// Already-encrypted document content ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub encrypted_content: Vec<u8>,
    pub doc_hash: DocHash,
    pub document_type: String,
}

impl DocumentUpload {
    /// Builds an upload, hashing the content to derive its `doc_hash`.
    pub fn from_content(
        encrypted_content: Vec<u8>,
        document_type: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let doc_hash = DocHash::new(content_hash(&encrypted_content))
            .map_err(|e| ClientError::validation(e.to_string()))?;
        Ok(Self {
            encrypted_content,
            doc_hash,
            document_type: document_type.into(),
        })
    }
}

/// Lowercase hex SHA-256 of `content`.
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

// =============================================================================
// Payments
// =============================================================================

pub const PAYMENT_PENDING: &str = "pending";
pub const PAYMENT_COMPLETED: &str = "completed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub payment_id: PaymentId,
    pub amount: u64,
    pub status: String,
    pub timestamp: u64,
}

impl PaymentStatus {
    pub fn is_completed(&self) -> bool {
        self.status == PAYMENT_COMPLETED
    }
}

mod empty_as_none {
    use circle_id::UserId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<UserId>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_ref().map(UserId::as_str).unwrap_or_default())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<UserId>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => UserId::new(s).map(Some).map_err(serde::de::Error::custom),
        }
    }
}
