//! End-to-end happy path test.
//!
//! Drives a lawyer and a client through a full case against the in-process
//! mock node, verifying:
//!
//! 1. Opening a case and staffing it
//! 2. Persistent and vanishing messages
//! 3. Case documents, analysis and payment
//! 4. Contact details sharing
//! 5. Vault consent and its revocation
//! 6. The order of events on the stream and view reconciliation
//!
//! ## Running
//!
//! ```bash
//! cargo test -p circle-e2e --test happy_path
//! ```

use std::time::Duration;

use circle_client::types::{
    CaseCreateParams, DocumentUpload, MemberRole, MessageMode, PaymentStatus, PAYMENT_COMPLETED,
};
use circle_client::views::{members_view, messages_view};
use circle_client::{
    CircleClient, ClientConfig, DomainEvent, ErrorKind, EventStream, Session, SessionStore,
    UserDetails,
};
use circle_events::EventKind;
use circle_id::{CanisterId, UserId};
use circle_reconcile::{EventOutcome, FetchOutcome};
use circle_testing::MockNode;
use tokio::sync::broadcast;

const WAIT: Duration = Duration::from_secs(5);

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn client_for(node: &MockNode, executor: &UserId) -> (CircleClient, SessionStore) {
    let sessions = SessionStore::with_session(Session::new(
        node.url(),
        node.context_id().clone(),
        executor.clone(),
        node.token(),
    ));
    let client = CircleClient::new(ClientConfig::default(), sessions.clone()).unwrap();
    (client, sessions)
}

async fn next_event(events: &mut broadcast::Receiver<DomainEvent>) -> DomainEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("event arrives in time")
        .expect("event channel open")
}

async fn expect_kinds(events: &mut broadcast::Receiver<DomainEvent>, kinds: &[EventKind]) {
    for expected in kinds {
        let event = next_event(events).await;
        assert_eq!(event.kind(), *expected, "unexpected event {event:?}");
    }
}

#[tokio::test]
async fn e2e_case_lifecycle() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,circle_client=debug".into()),
        )
        .with_test_writer()
        .try_init();

    let node = MockNode::start().await.unwrap();
    let lawyer_id = user("lawyer-7f3a");
    let client_id = user("client-19bc");
    let (lawyer, lawyer_sessions) = client_for(&node, &lawyer_id);
    let (client, _) = client_for(&node, &client_id);

    let mut stream = EventStream::new(ClientConfig::default(), lawyer_sessions);
    let mut events = stream.events();
    stream.connect().await.unwrap();
    assert!(node.wait_for_subscribers(1, WAIT).await);

    // ===========================================================================
    // Step 1: Open a case and add the client
    // ===========================================================================
    lawyer
        .open_case(CaseCreateParams::new("Estate Planning", "Trust and will"))
        .await
        .unwrap();
    expect_kinds(&mut events, &[EventKind::CaseOpened]).await;

    let cases = lawyer.list_cases().await.unwrap();
    assert_eq!(cases.len(), 1);
    let case = &cases[0];
    let case_id = case.case_id.clone();
    assert!(case_id.as_str().starts_with("Estate Planning_"));
    assert_eq!(case.admin_id, lawyer_id);
    assert_eq!(case.client_id, None);
    assert!(client.list_cases().await.unwrap().is_empty());

    let mut members = members_view(case_id.clone());
    let ticket = members.begin_fetch();
    let fetched = lawyer.list_case_members(&case_id).await;
    members.complete_fetch(ticket, fetched).unwrap();
    assert_eq!(members.len(), 1);
    assert!(members.items()[0].is_admin);

    lawyer
        .add_case_member(&case_id, &client_id, MemberRole::Client)
        .await
        .unwrap();
    let added = next_event(&mut events).await;
    assert_eq!(added.kind(), EventKind::MemberAdded);
    assert_eq!(members.on_event(&added), EventOutcome::Applied);
    assert_eq!(members.len(), 2);
    assert_eq!(members.items()[1].member_id, client_id);
    assert_eq!(members.items()[1].role, MemberRole::Client);

    // The event-applied list matches a fresh snapshot.
    let projected = members.items().to_vec();
    let ticket = members.begin_fetch();
    let fetched = client.list_case_members(&case_id).await;
    members.complete_fetch(ticket, fetched).unwrap();
    assert_eq!(members.items(), projected.as_slice());

    let err = lawyer
        .add_case_member(&case_id, &user("second-client"), MemberRole::Client)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Remote);
    assert_eq!(err.to_api_error().message, "Case already has a client");

    // ===========================================================================
    // Step 2: Messages
    // ===========================================================================
    let mut messages = messages_view(case_id.clone());
    let ticket = messages.begin_fetch();
    let fetched = client.get_case_messages(&case_id).await;
    messages.complete_fetch(ticket, fetched).unwrap();
    assert!(messages.is_empty());

    lawyer
        .send_message(&case_id, b"\x01\x02\x03", b"iv-one", MessageMode::Persistent)
        .await
        .unwrap();
    lawyer
        .send_message(&case_id, b"\x04\x05", b"iv-two", MessageMode::Vanish)
        .await
        .unwrap();

    for _ in 0..2 {
        let sent = next_event(&mut events).await;
        assert_eq!(sent.kind(), EventKind::MessageSent);
        assert_eq!(messages.on_event(&sent), EventOutcome::RefetchNeeded);
    }
    assert!(messages.is_stale());

    let ticket = messages.begin_fetch();
    let fetched = client.get_case_messages(&case_id).await;
    let outcome = messages.complete_fetch(ticket, fetched).unwrap();
    assert!(matches!(outcome, FetchOutcome::Applied { changed: true, .. }));
    assert_eq!(messages.len(), 2);
    assert_eq!(messages.items()[0].mode, MessageMode::Persistent);
    assert_eq!(messages.items()[1].recipient_ids, vec![client_id.clone(), lawyer_id.clone()]);

    client.mark_message_read(&case_id, 1).await.unwrap();
    let visible = client.get_visible_messages(&case_id).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].mode, MessageMode::Persistent);
    let all = lawyer.get_case_messages(&case_id).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[1].is_read_by(&client_id));

    // ===========================================================================
    // Step 3: Documents, analysis and payment
    // ===========================================================================
    let upload = DocumentUpload::from_content(b"sealed will".to_vec(), "will").unwrap();
    lawyer.upload_document_case(&upload, &case_id).await.unwrap();
    expect_kinds(&mut events, &[EventKind::DocumentUploaded]).await;

    let documents = client.get_group_documents(&case_id).await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].document_hash, upload.doc_hash);
    assert!(client
        .get_accessible_documents()
        .await
        .unwrap()
        .iter()
        .any(|d| d.document_hash == upload.doc_hash));

    let canister = CanisterId::new("analysis-canister-01").unwrap();
    lawyer
        .request_ai_analysis(&upload.doc_hash, &canister)
        .await
        .unwrap();
    node.complete_analysis(&upload.doc_hash).unwrap();
    expect_kinds(
        &mut events,
        &[
            EventKind::AnalysisRequested,
            EventKind::AnalysisCompleted,
            EventKind::DocumentAnalyzed,
        ],
    )
    .await;

    let payment_id = client
        .process_payment(&upload.doc_hash, 25_000)
        .await
        .unwrap();
    assert!(payment_id.as_str().starts_with("payment_"));
    let status = PaymentStatus {
        payment_id: payment_id.clone(),
        amount: 25_000,
        status: PAYMENT_COMPLETED.to_string(),
        timestamp: 1,
    };
    client
        .update_payment_status(&payment_id, &status)
        .await
        .unwrap();
    expect_kinds(
        &mut events,
        &[EventKind::PaymentInitiated, EventKind::PaymentCompleted],
    )
    .await;

    let documents = lawyer.get_group_documents(&case_id).await.unwrap();
    assert_eq!(documents[0].payment_id.as_ref(), Some(&payment_id));
    assert!(documents[0].ai_analysis_id.is_some());

    // ===========================================================================
    // Step 4: Contact details
    // ===========================================================================
    let calls_before = node.calls().len();
    let invalid = UserDetails::new(
        client_id.clone(),
        "Ada Client",
        "ada@example.com",
        "12345",
        "abcde-12345",
    );
    let err = client.update_user_details(&invalid).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(node.calls().len(), calls_before);

    let details = UserDetails::new(
        client_id.clone(),
        "Ada Client",
        "ada@example.com",
        "+44 7700900123",
        "abcde-12345",
    );
    client.update_user_details(&details).await.unwrap();

    let err = lawyer.get_user_details(&client_id).await.unwrap_err();
    assert_eq!(err.to_api_error().message, "Unauthorized access");

    lawyer.request_user_details_access(&client_id).await.unwrap();
    assert_eq!(
        node.pending_detail_requests(&client_id),
        vec![lawyer_id.to_string()]
    );
    client.grant_user_details_access(&lawyer_id).await.unwrap();
    assert!(node.pending_detail_requests(&client_id).is_empty());

    let seen = lawyer.get_user_details(&client_id).await.unwrap();
    assert_eq!(seen.email, "ada@example.com");

    // ===========================================================================
    // Step 5: Vault consent
    // ===========================================================================
    let private = DocumentUpload::from_content(b"medical record".to_vec(), "record").unwrap();
    client.store_document(&private).await.unwrap();
    client
        .grant_access(&private.doc_hash, &lawyer_id)
        .await
        .unwrap();
    expect_kinds(
        &mut events,
        &[EventKind::DocumentUploaded, EventKind::AccessGranted],
    )
    .await;
    assert!(lawyer
        .get_accessible_documents()
        .await
        .unwrap()
        .iter()
        .any(|d| d.document_hash == private.doc_hash));

    client.revoke_consent(&lawyer_id).await.unwrap();
    expect_kinds(&mut events, &[EventKind::ConsentRevoked]).await;
    assert!(!lawyer
        .get_accessible_documents()
        .await
        .unwrap()
        .iter()
        .any(|d| d.document_hash == private.doc_hash));

    stream.disconnect().await;
    assert!(!stream.is_connected());
}
