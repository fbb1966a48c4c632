//! Domain event definitions.
//!
//! Each event kind has a payload struct with the identifiers the node emits
//! for it. Kind names are the node's wire names.

use std::fmt;
use std::str::FromStr;

use circle_id::{AnalysisId, CanisterId, CaseId, DocHash, PaymentId, UserId};
use serde::{Deserialize, Serialize};

use crate::EventError;

// =============================================================================
// Event Kind Constants
// =============================================================================

/// All event kind names as constants.
pub mod event_types {
    // Cases
    pub const CASE_OPENED: &str = "CaseOpened";
    pub const MEMBER_ADDED: &str = "MemberAdded";

    // Messaging
    pub const MESSAGE_SENT: &str = "MessageSent";

    // Documents and access
    pub const DOCUMENT_UPLOADED: &str = "DocumentUploaded";
    pub const ACCESS_GRANTED: &str = "AccessGranted";
    pub const CONSENT_REVOKED: &str = "ConsentRevoked";

    // Analysis
    pub const DOCUMENT_ANALYZED: &str = "DocumentAnalyzed";
    pub const ANALYSIS_REQUESTED: &str = "AnalysisRequested";
    pub const ANALYSIS_COMPLETED: &str = "AnalysisCompleted";

    // Payments
    pub const PAYMENT_INITIATED: &str = "PaymentInitiated";
    pub const PAYMENT_COMPLETED: &str = "PaymentCompleted";
}

/// Discriminant of a [`DomainEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageSent,
    DocumentUploaded,
    AccessGranted,
    CaseOpened,
    DocumentAnalyzed,
    ConsentRevoked,
    AnalysisRequested,
    AnalysisCompleted,
    PaymentInitiated,
    PaymentCompleted,
    MemberAdded,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 11] = [
        EventKind::MessageSent,
        EventKind::DocumentUploaded,
        EventKind::AccessGranted,
        EventKind::CaseOpened,
        EventKind::DocumentAnalyzed,
        EventKind::ConsentRevoked,
        EventKind::AnalysisRequested,
        EventKind::AnalysisCompleted,
        EventKind::PaymentInitiated,
        EventKind::PaymentCompleted,
        EventKind::MemberAdded,
    ];

    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::MessageSent => event_types::MESSAGE_SENT,
            EventKind::DocumentUploaded => event_types::DOCUMENT_UPLOADED,
            EventKind::AccessGranted => event_types::ACCESS_GRANTED,
            EventKind::CaseOpened => event_types::CASE_OPENED,
            EventKind::DocumentAnalyzed => event_types::DOCUMENT_ANALYZED,
            EventKind::ConsentRevoked => event_types::CONSENT_REVOKED,
            EventKind::AnalysisRequested => event_types::ANALYSIS_REQUESTED,
            EventKind::AnalysisCompleted => event_types::ANALYSIS_COMPLETED,
            EventKind::PaymentInitiated => event_types::PAYMENT_INITIATED,
            EventKind::PaymentCompleted => event_types::PAYMENT_COMPLETED,
            EventKind::MemberAdded => event_types::MEMBER_ADDED,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EventError::UnknownEventType(s.to_string()))
    }
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSentPayload {
    pub case_id: CaseId,
    pub sender: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUploadedPayload {
    pub doc_hash: DocHash,
    pub doc_type: String,
}

/// Shared by `AccessGranted` and `ConsentRevoked`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentPayload {
    pub client_id: UserId,
    pub lawyer_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseOpenedPayload {
    pub case_id: CaseId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnalyzedPayload {
    pub doc_hash: DocHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequestedPayload {
    pub doc_hash: DocHash,
    pub ai_canister: CanisterId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisCompletedPayload {
    pub doc_hash: DocHash,
    pub analysis_id: AnalysisId,
}

/// Shared by `PaymentInitiated` and `PaymentCompleted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPayload {
    pub doc_hash: DocHash,
    pub payment_id: PaymentId,
}

/// `role` is kept as the node sent it ("lawyer" or "client").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberAddedPayload {
    pub case_id: CaseId,
    pub member_id: UserId,
    pub role: String,
}

// =============================================================================
// Domain Event
// =============================================================================

/// An asynchronous notification pushed by the node.
///
/// Serializes as `{"type": "<Kind>", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum DomainEvent {
    MessageSent(MessageSentPayload),
    DocumentUploaded(DocumentUploadedPayload),
    AccessGranted(ConsentPayload),
    CaseOpened(CaseOpenedPayload),
    DocumentAnalyzed(DocumentAnalyzedPayload),
    ConsentRevoked(ConsentPayload),
    AnalysisRequested(AnalysisRequestedPayload),
    AnalysisCompleted(AnalysisCompletedPayload),
    PaymentInitiated(PaymentPayload),
    PaymentCompleted(PaymentPayload),
    MemberAdded(MemberAddedPayload),
}

impl DomainEvent {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::MessageSent(_) => EventKind::MessageSent,
            DomainEvent::DocumentUploaded(_) => EventKind::DocumentUploaded,
            DomainEvent::AccessGranted(_) => EventKind::AccessGranted,
            DomainEvent::CaseOpened(_) => EventKind::CaseOpened,
            DomainEvent::DocumentAnalyzed(_) => EventKind::DocumentAnalyzed,
            DomainEvent::ConsentRevoked(_) => EventKind::ConsentRevoked,
            DomainEvent::AnalysisRequested(_) => EventKind::AnalysisRequested,
            DomainEvent::AnalysisCompleted(_) => EventKind::AnalysisCompleted,
            DomainEvent::PaymentInitiated(_) => EventKind::PaymentInitiated,
            DomainEvent::PaymentCompleted(_) => EventKind::PaymentCompleted,
            DomainEvent::MemberAdded(_) => EventKind::MemberAdded,
        }
    }

    /// Builds an event from its wire kind and payload object.
    pub fn from_parts(kind: &str, payload: serde_json::Value) -> Result<Self, EventError> {
        let kind: EventKind = kind.parse()?;
        let tagged = serde_json::json!({ "type": kind.as_str(), "payload": payload });
        serde_json::from_value(tagged).map_err(|e| EventError::InvalidPayload {
            kind: kind.to_string(),
            message: e.to_string(),
        })
    }

    /// Splits the event into its kind and payload object.
    pub fn to_parts(&self) -> Result<(EventKind, serde_json::Value), EventError> {
        let mut tagged = serde_json::to_value(self)?;
        let payload = tagged
            .get_mut("payload")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null);
        Ok((self.kind(), payload))
    }

    /// The case this event concerns, if any.
    pub fn case_id(&self) -> Option<&CaseId> {
        match self {
            DomainEvent::MessageSent(p) => Some(&p.case_id),
            DomainEvent::CaseOpened(p) => Some(&p.case_id),
            DomainEvent::MemberAdded(p) => Some(&p.case_id),
            _ => None,
        }
    }

    /// The document this event concerns, if any.
    pub fn doc_hash(&self) -> Option<&DocHash> {
        match self {
            DomainEvent::DocumentUploaded(p) => Some(&p.doc_hash),
            DomainEvent::DocumentAnalyzed(p) => Some(&p.doc_hash),
            DomainEvent::AnalysisRequested(p) => Some(&p.doc_hash),
            DomainEvent::AnalysisCompleted(p) => Some(&p.doc_hash),
            DomainEvent::PaymentInitiated(p) | DomainEvent::PaymentCompleted(p) => {
                Some(&p.doc_hash)
            }
            _ => None,
        }
    }
}

impl fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainEvent::MessageSent(p) => {
                write!(f, "{} case={} sender={}", self.kind(), p.case_id, p.sender)
            }
            DomainEvent::DocumentUploaded(p) => {
                write!(f, "{} doc={} type={}", self.kind(), p.doc_hash, p.doc_type)
            }
            DomainEvent::AccessGranted(p) | DomainEvent::ConsentRevoked(p) => write!(
                f,
                "{} client={} lawyer={}",
                self.kind(),
                p.client_id,
                p.lawyer_id
            ),
            DomainEvent::CaseOpened(p) => write!(f, "{} case={}", self.kind(), p.case_id),
            DomainEvent::DocumentAnalyzed(p) => write!(f, "{} doc={}", self.kind(), p.doc_hash),
            DomainEvent::AnalysisRequested(p) => write!(
                f,
                "{} doc={} canister={}",
                self.kind(),
                p.doc_hash,
                p.ai_canister
            ),
            DomainEvent::AnalysisCompleted(p) => write!(
                f,
                "{} doc={} analysis={}",
                self.kind(),
                p.doc_hash,
                p.analysis_id
            ),
            DomainEvent::PaymentInitiated(p) | DomainEvent::PaymentCompleted(p) => write!(
                f,
                "{} doc={} payment={}",
                self.kind(),
                p.doc_hash,
                p.payment_id
            ),
            DomainEvent::MemberAdded(p) => write!(
                f,
                "{} case={} member={} role={}",
                self.kind(),
                p.case_id,
                p.member_id,
                p.role
            ),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
