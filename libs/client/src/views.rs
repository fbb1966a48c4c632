//! Projections of domain events onto the list-backed views.
//!
//! Events only carry identifiers, so most of them can only tell a view that
//! it is out of date. Member additions carry enough to update the list in
//! place.

use circle_events::DomainEvent;
use circle_id::{CaseId, DocHash, UserId};
use circle_reconcile::{Change, Keyed, ListView, Projection};

use crate::types::{CaseMember, EncryptedMessage, LegalCase, LegalDocument};

impl Keyed for CaseMember {
    type Key = UserId;

    fn key(&self) -> UserId {
        self.member_id.clone()
    }
}

impl Keyed for LegalCase {
    type Key = CaseId;

    fn key(&self) -> CaseId {
        self.case_id.clone()
    }
}

impl Keyed for LegalDocument {
    type Key = DocHash;

    fn key(&self) -> DocHash {
        self.document_hash.clone()
    }
}

/// Messages have no id on the node; sender, time and iv identify one.
impl Keyed for EncryptedMessage {
    type Key = (UserId, u64, Vec<u8>);

    fn key(&self) -> Self::Key {
        (self.sender_id.clone(), self.timestamp, self.iv.clone())
    }
}

/// Messages of one case.
#[derive(Debug, Clone)]
pub struct CaseMessages {
    pub case_id: CaseId,
}

impl Projection for CaseMessages {
    type Item = EncryptedMessage;
    type Event = DomainEvent;

    fn project(&self, event: &DomainEvent) -> Option<Change<EncryptedMessage>> {
        match event {
            DomainEvent::MessageSent(p) if p.case_id == self.case_id => Some(Change::Stale),
            _ => None,
        }
    }
}

/// Members of one case.
#[derive(Debug, Clone)]
pub struct CaseMembers {
    pub case_id: CaseId,
}

impl Projection for CaseMembers {
    type Item = CaseMember;
    type Event = DomainEvent;

    fn project(&self, event: &DomainEvent) -> Option<Change<CaseMember>> {
        match event {
            DomainEvent::MemberAdded(p) if p.case_id == self.case_id => {
                Some(match p.role.parse() {
                    Ok(role) => Change::Upsert(CaseMember {
                        member_id: p.member_id.clone(),
                        role,
                        is_admin: false,
                    }),
                    Err(_) => Change::Stale,
                })
            }
            _ => None,
        }
    }
}

/// Documents attached to one case.
///
/// Upload events do not say which case a document belongs to, so every
/// upload marks the view stale.
#[derive(Debug, Clone)]
pub struct CaseDocuments {
    pub case_id: CaseId,
}

impl Projection for CaseDocuments {
    type Item = LegalDocument;
    type Event = DomainEvent;

    fn project(&self, event: &DomainEvent) -> Option<Change<LegalDocument>> {
        match event {
            DomainEvent::DocumentUploaded(_) => Some(Change::Stale),
            _ => None,
        }
    }
}

/// Documents the caller owns or has been granted.
#[derive(Debug, Clone, Default)]
pub struct VaultDocuments;

impl Projection for VaultDocuments {
    type Item = LegalDocument;
    type Event = DomainEvent;

    fn project(&self, event: &DomainEvent) -> Option<Change<LegalDocument>> {
        match event {
            DomainEvent::DocumentUploaded(_)
            | DomainEvent::AccessGranted(_)
            | DomainEvent::ConsentRevoked(_) => Some(Change::Stale),
            _ => None,
        }
    }
}

/// Cases visible to the caller.
#[derive(Debug, Clone, Default)]
pub struct VisibleCases;

impl Projection for VisibleCases {
    type Item = LegalCase;
    type Event = DomainEvent;

    fn project(&self, event: &DomainEvent) -> Option<Change<LegalCase>> {
        match event {
            DomainEvent::CaseOpened(_) | DomainEvent::MemberAdded(_) => Some(Change::Stale),
            _ => None,
        }
    }
}

pub type MessagesView = ListView<CaseMessages>;
pub type MembersView = ListView<CaseMembers>;
pub type CaseDocumentsView = ListView<CaseDocuments>;
pub type VaultView = ListView<VaultDocuments>;
pub type CasesView = ListView<VisibleCases>;

pub fn messages_view(case_id: CaseId) -> MessagesView {
    ListView::new(CaseMessages { case_id })
}

pub fn members_view(case_id: CaseId) -> MembersView {
    ListView::new(CaseMembers { case_id })
}

pub fn case_documents_view(case_id: CaseId) -> CaseDocumentsView {
    ListView::new(CaseDocuments { case_id })
}

pub fn vault_view() -> VaultView {
    ListView::new(VaultDocuments)
}

pub fn cases_view() -> CasesView {
    ListView::new(VisibleCases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemberRole;
    use circle_events::{MemberAddedPayload, MessageSentPayload};
    use circle_reconcile::{EventOutcome, FetchOutcome};

    fn case(id: &str) -> CaseId {
        CaseId::new(id).unwrap()
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn member_added(case_id: &str, member: &str, role: &str) -> DomainEvent {
        DomainEvent::MemberAdded(MemberAddedPayload {
            case_id: case(case_id),
            member_id: user(member),
            role: role.to_string(),
        })
    }

    fn lawyer(id: &str, is_admin: bool) -> CaseMember {
        CaseMember {
            member_id: user(id),
            role: MemberRole::Lawyer,
            is_admin,
        }
    }

    #[test]
    fn test_member_added_appends() {
        let mut view = members_view(case("c1"));
        let ticket = view.begin_fetch();
        view.complete_fetch::<String>(ticket, Ok(vec![lawyer("admin", true)]))
            .unwrap();

        let outcome = view.on_event(&member_added("c1", "client-1", "client"));
        assert_eq!(outcome, EventOutcome::Applied);
        assert_eq!(view.len(), 2);
        assert_eq!(view.items()[1].role, MemberRole::Client);
        assert!(!view.items()[1].is_admin);
    }

    #[test]
    fn test_member_added_other_case_ignored() {
        let mut view = members_view(case("c1"));
        let ticket = view.begin_fetch();
        view.complete_fetch::<String>(ticket, Ok(vec![])).unwrap();
        assert_eq!(
            view.on_event(&member_added("c2", "x", "lawyer")),
            EventOutcome::Ignored
        );
    }

    #[test]
    fn test_member_added_unknown_role_requests_refetch() {
        let mut view = members_view(case("c1"));
        let ticket = view.begin_fetch();
        view.complete_fetch::<String>(ticket, Ok(vec![])).unwrap();
        assert_eq!(
            view.on_event(&member_added("c1", "x", "judge")),
            EventOutcome::RefetchNeeded
        );
    }

    #[test]
    fn test_member_added_during_fetch_replayed() {
        let mut view = members_view(case("c1"));
        let ticket = view.begin_fetch();
        assert_eq!(
            view.on_event(&member_added("c1", "l2", "lawyer")),
            EventOutcome::Buffered
        );
        let outcome = view
            .complete_fetch::<String>(ticket, Ok(vec![lawyer("admin", true)]))
            .unwrap();
        assert!(matches!(outcome, FetchOutcome::Applied { replayed: 1, .. }));
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn test_message_sent_marks_stale() {
        let mut view = messages_view(case("c1"));
        let ticket = view.begin_fetch();
        view.complete_fetch::<String>(ticket, Ok(vec![])).unwrap();

        let event = DomainEvent::MessageSent(MessageSentPayload {
            case_id: case("c1"),
            sender: user("u"),
        });
        assert_eq!(view.on_event(&event), EventOutcome::RefetchNeeded);
        assert!(view.is_stale());
    }
}
