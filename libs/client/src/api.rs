//! Domain client: one method per node operation.

use circle_id::{CanisterId, CaseId, DocHash, PaymentId, UserId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::rpc::{JsonRpcGateway, RpcGateway, RpcOutput};
use crate::types::{
    CaseCreateParams, CaseMember, DocumentUpload, EncryptedMessage, LegalCase, LegalDocument,
    MemberRole, MessageMode, PaymentStatus,
};
use crate::{ClientConfig, ClientError, Receipt, SessionStore, UserDetails};

/// Node method names.
pub mod methods {
    pub const OPEN_CASE: &str = "open_case";
    pub const LIST_CASES_FOR_USER: &str = "list_cases_for_user";
    pub const LIST_CASE_MEMBERS: &str = "list_case_members";
    pub const ADD_CASE_MEMBER: &str = "add_case_member";

    pub const SEND_MESSAGE: &str = "send_message";
    pub const MARK_MESSAGE_READ: &str = "mark_message_read";
    pub const GET_CASE_MESSAGES: &str = "get_case_messages";
    pub const GET_VISIBLE_MESSAGES: &str = "get_visible_messages";

    pub const UPLOAD_DOCUMENT_CASE: &str = "upload_document_case";
    pub const STORE_DOCUMENT: &str = "store_document";
    pub const GRANT_ACCESS: &str = "grant_access";
    pub const GET_ACCESSIBLE_DOCUMENTS: &str = "get_accessible_documents";
    pub const GET_GROUP_DOCUMENTS: &str = "get_group_documents";

    pub const UPDATE_USER_DETAILS: &str = "update_user_details";
    pub const GET_USER_DETAILS: &str = "get_user_details";
    pub const GRANT_USER_DETAILS_ACCESS: &str = "grant_user_details_access";
    pub const REQUEST_USER_DETAILS_ACCESS: &str = "request_user_details_access";

    pub const REVOKE_CONSENT: &str = "revoke_consent";
    pub const REQUEST_AI_ANALYSIS: &str = "request_ai_analysis";

    pub const PROCESS_PAYMENT: &str = "process_payment";
    pub const UPDATE_PAYMENT_STATUS: &str = "update_payment_status";
}

/// Client for the CipherCircle application running on a node.
///
/// Every method resolves the current session first and fails with a 401
/// authentication error, without any network I/O, when there is no usable
/// session. Calls are attempted once.
#[derive(Debug, Clone)]
pub struct CircleClient<G = JsonRpcGateway> {
    gateway: G,
    sessions: SessionStore,
}

impl CircleClient<JsonRpcGateway> {
    /// Create a client talking JSON-RPC over HTTP.
    pub fn new(config: ClientConfig, sessions: SessionStore) -> Result<Self, ClientError> {
        Ok(Self::with_gateway(JsonRpcGateway::new(config)?, sessions))
    }
}

impl<G: RpcGateway> CircleClient<G> {
    pub fn with_gateway(gateway: G, sessions: SessionStore) -> Self {
        Self { gateway, sessions }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    // =========================================================================
    // Cases
    // =========================================================================

    /// Open a case administered by the caller.
    pub async fn open_case(&self, params: CaseCreateParams) -> Result<Receipt, ClientError> {
        self.execute(methods::OPEN_CASE, |caller| {
            params.check()?;
            let mut case = to_args(&params)?;
            if let Value::Object(fields) = &mut case {
                fields.insert("admin_id".to_string(), json!(caller));
            }
            Ok(json!({ "params": case }))
        })
        .await
    }

    /// Cases visible to the caller.
    pub async fn list_cases(&self) -> Result<Vec<LegalCase>, ClientError> {
        self.query(methods::LIST_CASES_FOR_USER, |caller| {
            Ok(json!({ "user_id": caller }))
        })
        .await
    }

    pub async fn list_case_members(&self, case_id: &CaseId) -> Result<Vec<CaseMember>, ClientError> {
        self.query(methods::LIST_CASE_MEMBERS, |caller| {
            Ok(json!({ "caller_id": caller, "case_id": case_id }))
        })
        .await
    }

    pub async fn add_case_member(
        &self,
        case_id: &CaseId,
        new_member_id: &UserId,
        role: MemberRole,
    ) -> Result<Receipt, ClientError> {
        self.execute(methods::ADD_CASE_MEMBER, |caller| {
            Ok(json!({
                "case_id": case_id,
                "new_member_id": new_member_id,
                "role": role,
                "caller_id": caller,
            }))
        })
        .await
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Post an already-encrypted message to a case.
    pub async fn send_message(
        &self,
        case_id: &CaseId,
        ciphertext: &[u8],
        iv: &[u8],
        mode: MessageMode,
    ) -> Result<Receipt, ClientError> {
        self.execute(methods::SEND_MESSAGE, |caller| {
            Ok(json!({
                "case_id": case_id,
                "ciphertext": ciphertext,
                "iv": iv,
                "mode": mode,
                "sender_id": caller,
            }))
        })
        .await
    }

    /// Mark a message read by the caller. Vanish messages disappear for the
    /// caller afterwards.
    pub async fn mark_message_read(
        &self,
        case_id: &CaseId,
        message_index: usize,
    ) -> Result<Receipt, ClientError> {
        self.execute(methods::MARK_MESSAGE_READ, |caller| {
            Ok(json!({
                "case_id": case_id,
                "message_index": message_index,
                "reader_id": caller,
            }))
        })
        .await
    }

    pub async fn get_case_messages(
        &self,
        case_id: &CaseId,
    ) -> Result<Vec<EncryptedMessage>, ClientError> {
        self.query(methods::GET_CASE_MESSAGES, |caller| {
            Ok(json!({ "case_id": case_id, "requester_id": caller }))
        })
        .await
    }

    /// Messages still visible to the caller.
    pub async fn get_visible_messages(
        &self,
        case_id: &CaseId,
    ) -> Result<Vec<EncryptedMessage>, ClientError> {
        self.query(methods::GET_VISIBLE_MESSAGES, |caller| {
            Ok(json!({ "case_id": case_id, "requester_id": caller }))
        })
        .await
    }

    // =========================================================================
    // Documents
    // =========================================================================

    pub async fn upload_document_case(
        &self,
        upload: &DocumentUpload,
        case_id: &CaseId,
    ) -> Result<Receipt, ClientError> {
        self.execute(methods::UPLOAD_DOCUMENT_CASE, |caller| {
            Ok(json!({
                "encrypted_content": upload.encrypted_content,
                "doc_hash": upload.doc_hash,
                "document_type": upload.document_type,
                "case_id": case_id,
                "caller_id": caller,
            }))
        })
        .await
    }

    /// Store a document in the caller's personal vault.
    pub async fn store_document(&self, upload: &DocumentUpload) -> Result<Receipt, ClientError> {
        self.execute(methods::STORE_DOCUMENT, |_| {
            Ok(json!({
                "encrypted_content": upload.encrypted_content,
                "doc_hash": upload.doc_hash,
                "document_type": upload.document_type,
            }))
        })
        .await
    }

    pub async fn grant_access(
        &self,
        doc_hash: &DocHash,
        grantee_id: &UserId,
    ) -> Result<Receipt, ClientError> {
        self.execute(methods::GRANT_ACCESS, |caller| {
            Ok(json!({
                "doc_hash": doc_hash,
                "grantee_id": grantee_id,
                "caller_id": caller,
            }))
        })
        .await
    }

    /// Documents the caller owns or has been granted.
    pub async fn get_accessible_documents(&self) -> Result<Vec<LegalDocument>, ClientError> {
        self.query(methods::GET_ACCESSIBLE_DOCUMENTS, |_| Ok(json!({})))
            .await
    }

    pub async fn get_group_documents(
        &self,
        case_id: &CaseId,
    ) -> Result<Vec<LegalDocument>, ClientError> {
        self.query(methods::GET_GROUP_DOCUMENTS, |_| Ok(json!({ "case_id": case_id })))
            .await
    }

    // =========================================================================
    // User details
    // =========================================================================

    /// Validate and publish the caller's contact details.
    pub async fn update_user_details(&self, details: &UserDetails) -> Result<Receipt, ClientError> {
        self.execute(methods::UPDATE_USER_DETAILS, |caller| {
            details.validate()?;
            Ok(json!({ "details": details, "caller_id": caller }))
        })
        .await
    }

    /// Contact details of `user_id`, if the caller may see them.
    pub async fn get_user_details(&self, user_id: &UserId) -> Result<UserDetails, ClientError> {
        self.query(methods::GET_USER_DETAILS, |caller| {
            Ok(json!({ "user_id": user_id, "requester_id": caller }))
        })
        .await
    }

    pub async fn grant_user_details_access(
        &self,
        grantee_id: &UserId,
    ) -> Result<Receipt, ClientError> {
        self.execute(methods::GRANT_USER_DETAILS_ACCESS, |caller| {
            Ok(json!({ "grantee_id": grantee_id, "caller_id": caller }))
        })
        .await
    }

    pub async fn request_user_details_access(
        &self,
        target_user_id: &UserId,
    ) -> Result<Receipt, ClientError> {
        self.execute(methods::REQUEST_USER_DETAILS_ACCESS, |caller| {
            Ok(json!({ "target_user_id": target_user_id, "requester_id": caller }))
        })
        .await
    }

    // =========================================================================
    // Consent and analysis
    // =========================================================================

    /// Withdraw a lawyer's access to every document the caller owns.
    pub async fn revoke_consent(&self, lawyer_id: &UserId) -> Result<Receipt, ClientError> {
        self.execute(methods::REVOKE_CONSENT, |_| Ok(json!({ "lawyer_id": lawyer_id })))
            .await
    }

    pub async fn request_ai_analysis(
        &self,
        doc_hash: &DocHash,
        ai_canister_id: &CanisterId,
    ) -> Result<Receipt, ClientError> {
        self.execute(methods::REQUEST_AI_ANALYSIS, |_| {
            Ok(json!({ "doc_hash": doc_hash, "ai_canister_id": ai_canister_id }))
        })
        .await
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Start a payment for a document and return its id.
    pub async fn process_payment(
        &self,
        doc_hash: &DocHash,
        amount: u64,
    ) -> Result<PaymentId, ClientError> {
        self.query(methods::PROCESS_PAYMENT, |_| {
            Ok(json!({ "doc_hash": doc_hash, "amount": amount }))
        })
        .await
    }

    pub async fn update_payment_status(
        &self,
        payment_id: &PaymentId,
        status: &PaymentStatus,
    ) -> Result<Receipt, ClientError> {
        self.execute(methods::UPDATE_PAYMENT_STATUS, |_| {
            Ok(json!({ "payment_id": payment_id, "status": status }))
        })
        .await
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    async fn invoke<F>(&self, method: &str, build_args: F) -> Result<RpcOutput, ClientError>
    where
        F: FnOnce(&UserId) -> Result<Value, ClientError>,
    {
        let session = self.sessions.require()?;
        let (caller, _) = session.credentials()?;
        let args = build_args(caller)?;
        self.gateway.call(method, args, &session).await
    }

    async fn query<T, F>(&self, method: &str, build_args: F) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: FnOnce(&UserId) -> Result<Value, ClientError>,
    {
        let output = self.invoke(method, build_args).await?;
        serde_json::from_value(output.output).map_err(|e| {
            ClientError::format(format!("unexpected output for {method}: {e}"))
        })
    }

    async fn execute<F>(&self, method: &str, build_args: F) -> Result<Receipt, ClientError>
    where
        F: FnOnce(&UserId) -> Result<Value, ClientError>,
    {
        let output = self.invoke(method, build_args).await?;
        Ok(Receipt {
            request_id: output.request_id,
            method: method.to_string(),
        })
    }
}

fn to_args<T: Serialize>(value: &T) -> Result<Value, ClientError> {
    serde_json::to_value(value).map_err(|e| ClientError::validation(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Session;
    use async_trait::async_trait;
    use circle_id::{ContextId, RequestId};
    use std::sync::Mutex;

    /// Records calls and answers with a canned output.
    struct Recorder {
        calls: Mutex<Vec<(String, Value)>>,
        output: Value,
    }

    impl Recorder {
        fn new(output: Value) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                output,
            }
        }
    }

    #[async_trait]
    impl RpcGateway for Recorder {
        async fn call(
            &self,
            method: &str,
            args: Value,
            _session: &Session,
        ) -> Result<RpcOutput, ClientError> {
            self.calls.lock().unwrap().push((method.to_string(), args));
            Ok(RpcOutput {
                request_id: RequestId::new(),
                output: self.output.clone(),
            })
        }
    }

    fn session() -> Session {
        Session::new(
            "http://node",
            ContextId::new("ctx").unwrap(),
            UserId::new("me").unwrap(),
            "token",
        )
    }

    fn client(output: Value) -> CircleClient<Recorder> {
        CircleClient::with_gateway(Recorder::new(output), SessionStore::with_session(session()))
    }

    fn last_call(client: &CircleClient<Recorder>) -> (String, Value) {
        client.gateway().calls.lock().unwrap().last().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_open_case_args() {
        let client = client(Value::Null);
        let receipt = client
            .open_case(CaseCreateParams::new("Merger", "Due diligence"))
            .await
            .unwrap();
        assert_eq!(receipt.method, "open_case");

        let (method, args) = last_call(&client);
        assert_eq!(method, "open_case");
        assert_eq!(args["params"]["admin_id"], "me");
        assert_eq!(args["params"]["case_name"], "Merger");
        assert_eq!(args["params"]["privacy_level"], "Private");
        assert_eq!(args["params"]["initial_docs"], json!([]));
    }

    #[tokio::test]
    async fn test_open_case_rejects_empty_name_without_call() {
        let client = client(Value::Null);
        let err = client
            .open_case(CaseCreateParams::new("", "x"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 400);
        assert!(client.gateway().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_session_short_circuits() {
        let client = CircleClient::with_gateway(Recorder::new(json!([])), SessionStore::new());
        let err = client.list_cases().await.unwrap_err();
        assert_eq!(err.code(), 401);
        assert!(client.gateway().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_executor_key_short_circuits() {
        let mut keyless = session();
        keyless.executor_public_key = None;
        let client =
            CircleClient::with_gateway(Recorder::new(json!([])), SessionStore::with_session(keyless));

        // Neither call puts the executor key in its arguments.
        let err = client.get_accessible_documents().await.unwrap_err();
        assert_eq!(err.code(), 401);
        let err = client
            .revoke_consent(&UserId::new("lawyer-9").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_authentication());

        assert!(client.gateway().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_args() {
        let client = client(Value::Null);
        let case = CaseId::new("c1").unwrap();
        client
            .send_message(&case, &[1, 2, 3], &[9; 12], MessageMode::Vanish)
            .await
            .unwrap();

        let (_, args) = last_call(&client);
        assert_eq!(args["ciphertext"], json!([1, 2, 3]));
        assert_eq!(args["mode"], "Vanish");
        assert_eq!(args["sender_id"], "me");
    }

    #[tokio::test]
    async fn test_mark_read_uses_session_key() {
        let client = client(Value::Null);
        client
            .mark_message_read(&CaseId::new("c1").unwrap(), 3)
            .await
            .unwrap();
        let (_, args) = last_call(&client);
        assert_eq!(args["reader_id"], "me");
        assert_eq!(args["message_index"], 3);
    }

    #[tokio::test]
    async fn test_decode_failure_is_format_error() {
        let client = client(json!({"not": "a list"}));
        let err = client.list_cases().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Format);
    }

    #[tokio::test]
    async fn test_process_payment_returns_id() {
        let client = client(json!("payment_abc_1"));
        let id = client
            .process_payment(&DocHash::new("abc").unwrap(), 100)
            .await
            .unwrap();
        assert_eq!(id.as_str(), "payment_abc_1");
    }

    #[tokio::test]
    async fn test_invalid_details_not_sent() {
        let client = client(Value::Null);
        let details = UserDetails::new(
            UserId::new("me").unwrap(),
            "X",
            "not-an-email",
            "123",
            "w",
        );
        let err = client.update_user_details(&details).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert!(client.gateway().calls.lock().unwrap().is_empty());
    }
}
