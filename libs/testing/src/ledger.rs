//! In-memory application state with the node's access rules.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use circle_events::{
    AnalysisCompletedPayload, AnalysisRequestedPayload, CaseOpenedPayload, ConsentPayload,
    DocumentAnalyzedPayload, DocumentUploadedPayload, DomainEvent, MemberAddedPayload,
    MessageSentPayload, PaymentPayload,
};
use circle_id::DocHash;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// First timestamp handed out; each call advances it by one.
const CLOCK_START: u64 = 1_718_000_000_000;

/// Result of one successful call.
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    pub output: Value,
    pub events: Vec<DomainEvent>,
}

impl Outcome {
    fn unit(events: Vec<DomainEvent>) -> Self {
        Self {
            output: Value::Null,
            events,
        }
    }

    fn value<T: Serialize>(output: &T) -> Result<Self, String> {
        Ok(Self {
            output: serde_json::to_value(output).map_err(|e| e.to_string())?,
            events: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Case {
    case_id: String,
    case_name: String,
    client_id: String,
    lawyer_ids: Vec<String>,
    admin_id: String,
    status: String,
    related_documents: Vec<String>,
    privacy_level: String,
}

impl Case {
    fn participants(&self) -> Vec<String> {
        let mut participants = Vec::new();
        if !self.client_id.is_empty() {
            participants.push(self.client_id.clone());
        }
        participants.extend(self.lawyer_ids.iter().cloned());
        participants
    }

    fn is_participant(&self, user: &str) -> bool {
        self.client_id == user || self.lawyer_ids.iter().any(|l| l == user)
    }

    fn is_member(&self, user: &str) -> bool {
        self.is_participant(user) || self.admin_id == user
    }
}

#[derive(Debug, Clone, Serialize)]
struct CaseMember {
    member_id: String,
    role: String,
    is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    ciphertext: Vec<u8>,
    iv: Vec<u8>,
    sender_id: String,
    recipient_ids: Vec<String>,
    timestamp: u64,
    mode: String,
    read_receipts: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Document {
    encrypted_content: Vec<u8>,
    document_hash: String,
    document_type: String,
    owner_id: String,
    case_id: Option<String>,
    access_list: Vec<String>,
    ai_analysis_id: Option<String>,
    payment_id: Option<String>,
    timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Payment {
    payment_id: String,
    amount: u64,
    status: String,
    timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Details {
    user_id: String,
    name: String,
    email: String,
    phone: String,
    wallet_address: String,
    #[serde(default)]
    access_list: Vec<String>,
}

#[derive(Debug, Clone)]
struct Analysis {
    doc_hash: String,
    canister: String,
    completed: bool,
}

// =============================================================================
// Call arguments
// =============================================================================

#[derive(Deserialize)]
struct OpenCaseArgs {
    params: OpenCaseParams,
}

#[derive(Deserialize)]
struct OpenCaseParams {
    case_name: String,
    description: String,
    #[serde(default)]
    privacy_level: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    initial_docs: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct CaseArgs {
    case_id: String,
}

#[derive(Deserialize)]
struct AddMemberArgs {
    case_id: String,
    new_member_id: String,
    role: String,
}

#[derive(Deserialize)]
struct SendMessageArgs {
    case_id: String,
    ciphertext: Vec<u8>,
    iv: Vec<u8>,
    mode: String,
}

#[derive(Deserialize)]
struct MarkReadArgs {
    case_id: String,
    message_index: usize,
    reader_id: String,
}

#[derive(Deserialize)]
struct MessagesArgs {
    case_id: String,
    requester_id: String,
}

#[derive(Deserialize)]
struct DocumentArgs {
    encrypted_content: Vec<u8>,
    doc_hash: String,
    document_type: String,
    #[serde(default)]
    case_id: Option<String>,
}

#[derive(Deserialize)]
struct GrantArgs {
    doc_hash: String,
    grantee_id: String,
}

#[derive(Deserialize)]
struct UpdateDetailsArgs {
    details: Details,
}

#[derive(Deserialize)]
struct GetDetailsArgs {
    user_id: String,
    requester_id: String,
}

#[derive(Deserialize)]
struct GranteeArgs {
    grantee_id: String,
}

#[derive(Deserialize)]
struct RequestDetailsArgs {
    target_user_id: String,
}

#[derive(Deserialize)]
struct RevokeArgs {
    lawyer_id: String,
}

#[derive(Deserialize)]
struct AnalysisArgs {
    doc_hash: String,
    ai_canister_id: String,
}

#[derive(Deserialize)]
struct PaymentArgs {
    doc_hash: String,
    amount: u64,
}

#[derive(Deserialize)]
struct PaymentStatusArgs {
    payment_id: String,
    status: Payment,
}

fn parse<T: DeserializeOwned>(method: &str, args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("Invalid arguments for {method}: {e}"))
}

fn key<K>(raw: &str) -> Result<K, String>
where
    K: FromStr,
    K::Err: Display,
{
    raw.parse().map_err(|e: K::Err| e.to_string())
}

// =============================================================================
// Ledger
// =============================================================================

/// State of one application context.
#[derive(Debug)]
pub(crate) struct Ledger {
    clock: u64,
    cases: Vec<Case>,
    messages: HashMap<String, Vec<Message>>,
    documents: Vec<Document>,
    payments: HashMap<String, Payment>,
    details: HashMap<String, Details>,
    detail_requests: HashMap<String, Vec<String>>,
    analyses: HashMap<String, Analysis>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            clock: CLOCK_START,
            cases: Vec::new(),
            messages: HashMap::new(),
            documents: Vec::new(),
            payments: HashMap::new(),
            details: HashMap::new(),
            detail_requests: HashMap::new(),
            analyses: HashMap::new(),
        }
    }
}

impl Ledger {
    fn now(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn case(&self, case_id: &str) -> Result<&Case, String> {
        self.cases
            .iter()
            .find(|c| c.case_id == case_id)
            .ok_or_else(|| "Case not found".to_string())
    }

    fn case_mut(&mut self, case_id: &str) -> Result<&mut Case, String> {
        self.cases
            .iter_mut()
            .find(|c| c.case_id == case_id)
            .ok_or_else(|| "Case not found".to_string())
    }

    fn document_mut(&mut self, doc_hash: &str) -> Option<&mut Document> {
        self.documents
            .iter_mut()
            .find(|d| d.document_hash == doc_hash)
    }

    /// Pending detail-access requests addressed to `user`.
    pub(crate) fn detail_requests(&self, user: &str) -> Vec<String> {
        self.detail_requests.get(user).cloned().unwrap_or_default()
    }

    /// Runs one application method as `executor`.
    pub(crate) fn execute(
        &mut self,
        method: &str,
        args: Value,
        executor: &str,
    ) -> Result<Outcome, String> {
        match method {
            "open_case" => self.open_case(parse(method, args)?, executor),
            "list_cases_for_user" => self.list_cases(executor),
            "list_case_members" => self.list_case_members(parse(method, args)?, executor),
            "add_case_member" => self.add_case_member(parse(method, args)?, executor),
            "send_message" => self.send_message(parse(method, args)?, executor),
            "mark_message_read" => self.mark_message_read(parse(method, args)?),
            "get_case_messages" => self.get_messages(parse(method, args)?, false),
            "get_visible_messages" => self.get_messages(parse(method, args)?, true),
            "upload_document_case" => self.upload_document(parse(method, args)?, executor, true),
            "store_document" => self.upload_document(parse(method, args)?, executor, false),
            "grant_access" => self.grant_access(parse(method, args)?, executor),
            "get_accessible_documents" => self.accessible_documents(executor),
            "get_group_documents" => self.group_documents(parse(method, args)?, executor),
            "update_user_details" => self.update_details(parse(method, args)?, executor),
            "get_user_details" => self.get_details(parse(method, args)?),
            "grant_user_details_access" => self.grant_details(parse(method, args)?, executor),
            "request_user_details_access" => self.request_details(parse(method, args)?, executor),
            "revoke_consent" => self.revoke_consent(parse(method, args)?, executor),
            "request_ai_analysis" => self.request_analysis(parse(method, args)?),
            "process_payment" => self.process_payment(parse(method, args)?),
            "update_payment_status" => self.update_payment_status(parse(method, args)?),
            other => Err(format!("Method not found: {other}")),
        }
    }

    // -------------------------------------------------------------------------
    // Cases
    // -------------------------------------------------------------------------

    fn open_case(&mut self, args: OpenCaseArgs, executor: &str) -> Result<Outcome, String> {
        let params = args.params;
        if params.case_name.is_empty() || params.description.is_empty() {
            return Err("Case name and description are required".to_string());
        }

        let case_id = format!("{}_{}", params.case_name, self.now());
        let event = DomainEvent::CaseOpened(CaseOpenedPayload {
            case_id: key(&case_id)?,
        });

        self.cases.push(Case {
            case_id,
            case_name: params.case_name,
            client_id: params.client_id.unwrap_or_default(),
            lawyer_ids: vec![executor.to_string()],
            admin_id: executor.to_string(),
            status: "active".to_string(),
            related_documents: params.initial_docs.unwrap_or_default(),
            privacy_level: params.privacy_level.unwrap_or_else(|| "Private".to_string()),
        });

        Ok(Outcome::unit(vec![event]))
    }

    fn list_cases(&self, executor: &str) -> Result<Outcome, String> {
        let visible: Vec<&Case> = self
            .cases
            .iter()
            .filter(|c| c.is_member(executor) || c.privacy_level == "Public")
            .collect();
        Outcome::value(&visible)
    }

    fn list_case_members(&self, args: CaseArgs, executor: &str) -> Result<Outcome, String> {
        let case = self.case(&args.case_id)?;
        if !case.is_member(executor) {
            return Err("Unauthorized access".to_string());
        }

        let mut members: Vec<CaseMember> = case
            .lawyer_ids
            .iter()
            .map(|lawyer| CaseMember {
                member_id: lawyer.clone(),
                role: "lawyer".to_string(),
                is_admin: case.admin_id == *lawyer,
            })
            .collect();
        if !case.client_id.is_empty() {
            members.push(CaseMember {
                member_id: case.client_id.clone(),
                role: "client".to_string(),
                is_admin: false,
            });
        }

        Outcome::value(&members)
    }

    fn add_case_member(&mut self, args: AddMemberArgs, executor: &str) -> Result<Outcome, String> {
        let event = DomainEvent::MemberAdded(MemberAddedPayload {
            case_id: key(&args.case_id)?,
            member_id: key(&args.new_member_id)?,
            role: args.role.clone(),
        });

        let case = self.case_mut(&args.case_id)?;
        if !case.is_participant(executor) {
            return Err("Only case members can add new members".to_string());
        }

        match args.role.as_str() {
            "lawyer" => {
                if !case.lawyer_ids.contains(&args.new_member_id) {
                    case.lawyer_ids.push(args.new_member_id);
                }
            }
            "client" => {
                if !case.client_id.is_empty() {
                    return Err("Case already has a client".to_string());
                }
                case.client_id = args.new_member_id;
            }
            _ => return Err("Invalid role specified".to_string()),
        }

        Ok(Outcome::unit(vec![event]))
    }

    // -------------------------------------------------------------------------
    // Messages
    // -------------------------------------------------------------------------

    fn send_message(&mut self, args: SendMessageArgs, executor: &str) -> Result<Outcome, String> {
        if args.mode != "Vanish" && args.mode != "Persistent" {
            return Err(format!("Unknown message mode {}", args.mode));
        }

        let case = self.case(&args.case_id)?;
        if !case.is_participant(executor) {
            return Err("Unauthorized sender".to_string());
        }
        let recipients = case.participants();

        let event = DomainEvent::MessageSent(MessageSentPayload {
            case_id: key(&args.case_id)?,
            sender: key(executor)?,
        });

        let timestamp = self.now();
        self.messages
            .entry(args.case_id)
            .or_default()
            .push(Message {
                ciphertext: args.ciphertext,
                iv: args.iv,
                sender_id: executor.to_string(),
                recipient_ids: recipients,
                timestamp,
                mode: args.mode,
                read_receipts: Vec::new(),
            });

        Ok(Outcome::unit(vec![event]))
    }

    fn mark_message_read(&mut self, args: MarkReadArgs) -> Result<Outcome, String> {
        let messages = self.messages.entry(args.case_id).or_default();
        let Some(message) = messages.get_mut(args.message_index) else {
            return Err("Message not found".to_string());
        };

        if !message.recipient_ids.contains(&args.reader_id) {
            return Err("Unauthorized read attempt".to_string());
        }
        if !message.read_receipts.contains(&args.reader_id) {
            message.read_receipts.push(args.reader_id.clone());
        }

        if message.mode == "Vanish" {
            message.recipient_ids.retain(|id| *id != args.reader_id);
            if message.recipient_ids.is_empty() {
                messages.remove(args.message_index);
            }
        }

        Ok(Outcome::unit(Vec::new()))
    }

    fn get_messages(&self, args: MessagesArgs, visible_only: bool) -> Result<Outcome, String> {
        let case = self.case(&args.case_id)?;
        if !case.is_participant(&args.requester_id) {
            return Err("Unauthorized access".to_string());
        }

        let messages: Vec<&Message> = self
            .messages
            .get(&args.case_id)
            .into_iter()
            .flatten()
            .filter(|m| !visible_only || m.recipient_ids.contains(&args.requester_id))
            .collect();
        Outcome::value(&messages)
    }

    // -------------------------------------------------------------------------
    // Documents
    // -------------------------------------------------------------------------

    fn upload_document(
        &mut self,
        args: DocumentArgs,
        executor: &str,
        to_case: bool,
    ) -> Result<Outcome, String> {
        let (case_id, access_list) = match (to_case, &args.case_id) {
            (true, Some(case_id)) => {
                let case = self.case_mut(case_id)?;
                if !case.is_member(executor) {
                    return Err("Unauthorized access".to_string());
                }
                if !case.related_documents.contains(&args.doc_hash) {
                    case.related_documents.push(args.doc_hash.clone());
                }
                (Some(case_id.clone()), case.participants())
            }
            (true, None) => return Err("Case not found".to_string()),
            (false, _) => (None, Vec::new()),
        };

        let event = DomainEvent::DocumentUploaded(DocumentUploadedPayload {
            doc_hash: key(&args.doc_hash)?,
            doc_type: args.document_type.clone(),
        });

        let timestamp = self.now();
        let document = Document {
            encrypted_content: args.encrypted_content,
            document_hash: args.doc_hash.clone(),
            document_type: args.document_type,
            owner_id: executor.to_string(),
            case_id,
            access_list,
            ai_analysis_id: None,
            payment_id: None,
            timestamp,
        };
        match self.document_mut(&args.doc_hash) {
            Some(existing) => *existing = document,
            None => self.documents.push(document),
        }

        Ok(Outcome::unit(vec![event]))
    }

    fn grant_access(&mut self, args: GrantArgs, executor: &str) -> Result<Outcome, String> {
        let event = DomainEvent::AccessGranted(ConsentPayload {
            client_id: key(executor)?,
            lawyer_id: key(&args.grantee_id)?,
        });

        let document = self
            .document_mut(&args.doc_hash)
            .ok_or_else(|| "Document not found".to_string())?;
        if document.owner_id != executor {
            return Err("Only document owner can grant access".to_string());
        }
        if !document.access_list.contains(&args.grantee_id) {
            document.access_list.push(args.grantee_id);
        }

        Ok(Outcome::unit(vec![event]))
    }

    fn accessible_documents(&self, executor: &str) -> Result<Outcome, String> {
        let documents: Vec<&Document> = self
            .documents
            .iter()
            .filter(|d| d.owner_id == executor || d.access_list.iter().any(|a| a == executor))
            .collect();
        Outcome::value(&documents)
    }

    fn group_documents(&self, args: CaseArgs, executor: &str) -> Result<Outcome, String> {
        let case = self.case(&args.case_id)?;
        if !case.is_member(executor) {
            return Err("Unauthorized access".to_string());
        }
        let documents: Vec<&Document> = self
            .documents
            .iter()
            .filter(|d| d.case_id.as_deref() == Some(args.case_id.as_str()))
            .collect();
        Outcome::value(&documents)
    }

    // -------------------------------------------------------------------------
    // User details
    // -------------------------------------------------------------------------

    fn update_details(&mut self, args: UpdateDetailsArgs, executor: &str) -> Result<Outcome, String> {
        let mut details = args.details;
        if details.user_id != executor {
            return Err("Users can only update their own details".to_string());
        }
        details.access_list = self
            .details
            .get(executor)
            .map(|existing| existing.access_list.clone())
            .unwrap_or_default();
        self.details.insert(executor.to_string(), details);
        Ok(Outcome::unit(Vec::new()))
    }

    fn get_details(&self, args: GetDetailsArgs) -> Result<Outcome, String> {
        let details = self
            .details
            .get(&args.user_id)
            .ok_or_else(|| "User details not found".to_string())?;
        if args.requester_id != args.user_id && !details.access_list.contains(&args.requester_id) {
            return Err("Unauthorized access".to_string());
        }
        Outcome::value(details)
    }

    fn grant_details(&mut self, args: GranteeArgs, executor: &str) -> Result<Outcome, String> {
        let details = self
            .details
            .get_mut(executor)
            .ok_or_else(|| "User details not found".to_string())?;
        if !details.access_list.contains(&args.grantee_id) {
            details.access_list.push(args.grantee_id.clone());
        }
        if let Some(pending) = self.detail_requests.get_mut(executor) {
            pending.retain(|requester| *requester != args.grantee_id);
        }
        Ok(Outcome::unit(Vec::new()))
    }

    fn request_details(&mut self, args: RequestDetailsArgs, executor: &str) -> Result<Outcome, String> {
        if args.target_user_id == executor {
            return Err("Cannot request access to your own details".to_string());
        }
        let pending = self.detail_requests.entry(args.target_user_id).or_default();
        if !pending.iter().any(|r| r == executor) {
            pending.push(executor.to_string());
        }
        Ok(Outcome::unit(Vec::new()))
    }

    // -------------------------------------------------------------------------
    // Consent and analysis
    // -------------------------------------------------------------------------

    fn revoke_consent(&mut self, args: RevokeArgs, executor: &str) -> Result<Outcome, String> {
        let event = DomainEvent::ConsentRevoked(ConsentPayload {
            client_id: key(executor)?,
            lawyer_id: key(&args.lawyer_id)?,
        });

        for document in self.documents.iter_mut().filter(|d| d.owner_id == executor) {
            document.access_list.retain(|id| *id != args.lawyer_id);
        }

        Ok(Outcome::unit(vec![event]))
    }

    fn request_analysis(&mut self, args: AnalysisArgs) -> Result<Outcome, String> {
        if !self.documents.iter().any(|d| d.document_hash == args.doc_hash) {
            return Err("Document not found".to_string());
        }

        let event = DomainEvent::AnalysisRequested(AnalysisRequestedPayload {
            doc_hash: key(&args.doc_hash)?,
            ai_canister: key(&args.ai_canister_id)?,
        });

        let analysis_id = format!("{}_{}", args.doc_hash, self.now());
        self.analyses.insert(
            analysis_id,
            Analysis {
                doc_hash: args.doc_hash,
                canister: args.ai_canister_id,
                completed: false,
            },
        );

        Ok(Outcome::unit(vec![event]))
    }

    /// Completes the oldest pending analysis of a document, as the analysis
    /// canister's callback would.
    pub(crate) fn complete_analysis(&mut self, doc_hash: &str) -> Result<Outcome, String> {
        let mut pending: Vec<&String> = self
            .analyses
            .iter()
            .filter(|(_, a)| a.doc_hash == doc_hash && !a.completed)
            .map(|(id, _)| id)
            .collect();
        pending.sort();
        let analysis_id = pending
            .first()
            .map(|id| (*id).clone())
            .ok_or_else(|| "Analysis not found".to_string())?;

        if let Some(analysis) = self.analyses.get_mut(&analysis_id) {
            analysis.completed = true;
            tracing::debug!(canister = %analysis.canister, %analysis_id, "analysis completed");
        }
        if let Some(document) = self.document_mut(doc_hash) {
            document.ai_analysis_id = Some(analysis_id.clone());
        }

        let doc: DocHash = key(doc_hash)?;
        Ok(Outcome::unit(vec![
            DomainEvent::AnalysisCompleted(AnalysisCompletedPayload {
                doc_hash: doc.clone(),
                analysis_id: key(&analysis_id)?,
            }),
            DomainEvent::DocumentAnalyzed(DocumentAnalyzedPayload { doc_hash: doc }),
        ]))
    }

    // -------------------------------------------------------------------------
    // Payments
    // -------------------------------------------------------------------------

    fn process_payment(&mut self, args: PaymentArgs) -> Result<Outcome, String> {
        let timestamp = self.now();
        let payment_id = format!("payment_{}_{}", args.doc_hash, timestamp);

        let event = DomainEvent::PaymentInitiated(PaymentPayload {
            doc_hash: key(&args.doc_hash)?,
            payment_id: key(&payment_id)?,
        });

        self.payments.insert(
            payment_id.clone(),
            Payment {
                payment_id: payment_id.clone(),
                amount: args.amount,
                status: "pending".to_string(),
                timestamp,
            },
        );
        if let Some(document) = self.document_mut(&args.doc_hash) {
            document.payment_id = Some(payment_id.clone());
        }

        let mut outcome = Outcome::value(&payment_id)?;
        outcome.events.push(event);
        Ok(outcome)
    }

    fn update_payment_status(&mut self, args: PaymentStatusArgs) -> Result<Outcome, String> {
        let completed = args.status.status == "completed";
        self.payments.insert(args.payment_id.clone(), args.status);

        if !completed {
            return Ok(Outcome::unit(Vec::new()));
        }

        let doc_hash = self
            .documents
            .iter()
            .find(|d| d.payment_id.as_deref() == Some(args.payment_id.as_str()))
            .map(|d| d.document_hash.clone())
            .ok_or_else(|| "Document not found for payment".to_string())?;

        Ok(Outcome::unit(vec![DomainEvent::PaymentCompleted(
            PaymentPayload {
                doc_hash: key(&doc_hash)?,
                payment_id: key(&args.payment_id)?,
            },
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open(ledger: &mut Ledger, admin: &str, name: &str) -> String {
        ledger
            .execute(
                "open_case",
                json!({"params": {"case_name": name, "description": "d", "privacy_level": "Private"}}),
                admin,
            )
            .unwrap();
        ledger.cases.last().unwrap().case_id.clone()
    }

    #[test]
    fn test_open_case_requires_name() {
        let mut ledger = Ledger::default();
        let err = ledger
            .execute(
                "open_case",
                json!({"params": {"case_name": "", "description": "d"}}),
                "l1",
            )
            .unwrap_err();
        assert_eq!(err, "Case name and description are required");
    }

    #[test]
    fn test_open_case_keeps_untrimmed_name_in_id() {
        let mut ledger = Ledger::default();
        let outcome = ledger
            .execute(
                "open_case",
                json!({"params": {"case_name": " Merger", "description": "d"}}),
                "l1",
            )
            .unwrap();
        let case_id = ledger.cases.last().unwrap().case_id.clone();
        assert!(case_id.starts_with(" Merger_"));
        match &outcome.events[0] {
            DomainEvent::CaseOpened(p) => assert_eq!(p.case_id.as_str(), case_id),
            other => panic!("unexpected event {other:?}"),
        }

        let listed = ledger.execute("list_cases_for_user", json!({}), "l1").unwrap();
        assert_eq!(listed.output[0]["case_id"], json!(case_id));
    }

    #[test]
    fn test_members_and_visibility() {
        let mut ledger = Ledger::default();
        let case_id = open(&mut ledger, "l1", "Merger");

        let outcome = ledger
            .execute(
                "add_case_member",
                json!({"case_id": case_id, "new_member_id": "c1", "role": "client", "caller_id": "l1"}),
                "l1",
            )
            .unwrap();
        assert!(matches!(outcome.events[0], DomainEvent::MemberAdded(_)));

        let members = ledger
            .execute("list_case_members", json!({"case_id": case_id, "caller_id": "c1"}), "c1")
            .unwrap()
            .output;
        assert_eq!(members.as_array().unwrap().len(), 2);

        let err = ledger
            .execute(
                "add_case_member",
                json!({"case_id": case_id, "new_member_id": "c2", "role": "client", "caller_id": "l1"}),
                "l1",
            )
            .unwrap_err();
        assert_eq!(err, "Case already has a client");

        let stranger = ledger.execute("list_cases_for_user", json!({}), "x").unwrap();
        assert_eq!(stranger.output, json!([]));
    }

    #[test]
    fn test_vanish_message_disappears_for_reader() {
        let mut ledger = Ledger::default();
        let case_id = open(&mut ledger, "l1", "Merger");
        ledger
            .execute(
                "add_case_member",
                json!({"case_id": case_id, "new_member_id": "c1", "role": "client", "caller_id": "l1"}),
                "l1",
            )
            .unwrap();
        ledger
            .execute(
                "send_message",
                json!({"case_id": case_id, "ciphertext": [1], "iv": [2], "mode": "Vanish", "sender_id": "l1"}),
                "l1",
            )
            .unwrap();

        ledger
            .execute(
                "mark_message_read",
                json!({"case_id": case_id, "message_index": 0, "reader_id": "c1"}),
                "c1",
            )
            .unwrap();

        let visible = ledger
            .execute("get_visible_messages", json!({"case_id": case_id, "requester_id": "c1"}), "c1")
            .unwrap()
            .output;
        assert_eq!(visible, json!([]));

        let all = ledger
            .execute("get_case_messages", json!({"case_id": case_id, "requester_id": "l1"}), "l1")
            .unwrap()
            .output;
        assert_eq!(all.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_payment_completion_emits_event() {
        let mut ledger = Ledger::default();
        ledger
            .execute(
                "store_document",
                json!({"encrypted_content": [1], "doc_hash": "abc", "document_type": "nda"}),
                "o1",
            )
            .unwrap();
        let payment_id = ledger
            .execute("process_payment", json!({"doc_hash": "abc", "amount": 10}), "o1")
            .unwrap()
            .output;
        let payment_id = payment_id.as_str().unwrap().to_string();

        let outcome = ledger
            .execute(
                "update_payment_status",
                json!({"payment_id": payment_id, "status": {"payment_id": payment_id, "amount": 10, "status": "completed", "timestamp": 1}}),
                "o1",
            )
            .unwrap();
        assert!(matches!(outcome.events[0], DomainEvent::PaymentCompleted(_)));
    }

    #[test]
    fn test_unknown_method() {
        let mut ledger = Ledger::default();
        let err = ledger.execute("create_proposal", json!({}), "x").unwrap_err();
        assert!(err.starts_with("Method not found"));
    }
}
