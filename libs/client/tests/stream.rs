//! Event stream behaviour against an in-process node.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use circle_client::{ClientConfig, DomainEvent, EventStream, Session, SessionStore};
use circle_events::{CaseOpenedPayload, DocumentUploadedPayload, MessageSentPayload};
use circle_id::{CaseId, ContextId, DocHash, UserId};
use circle_testing::MockNode;
use tokio::sync::broadcast;

const WAIT: Duration = Duration::from_secs(5);

fn sent(case: &str, n: usize) -> DomainEvent {
    DomainEvent::MessageSent(MessageSentPayload {
        case_id: CaseId::new(case).unwrap(),
        sender: UserId::new(format!("user-{n}")).unwrap(),
    })
}

fn stream_for(node: &MockNode) -> EventStream {
    let session = Session::new(
        node.url(),
        node.context_id().clone(),
        UserId::new("lawyer-1").unwrap(),
        node.token(),
    );
    EventStream::new(ClientConfig::default(), SessionStore::with_session(session))
}

async fn next(events: &mut broadcast::Receiver<DomainEvent>) -> DomainEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("event arrives in time")
        .expect("event channel open")
}

async fn wait_until_unsubscribed(node: &MockNode) {
    tokio::time::timeout(WAIT, async {
        while node.subscribers() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("old socket closes");
}

#[tokio::test]
async fn delivers_events_in_emission_order() {
    let node = MockNode::start().await.unwrap();
    let mut stream = stream_for(&node);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    stream.add_callback(move |event| sink.lock().unwrap().push(event.clone()));
    let mut events = stream.events();

    stream.connect().await.unwrap();
    assert!(node.wait_for_subscribers(1, WAIT).await);

    let batch: Vec<DomainEvent> = (0..5).map(|n| sent("Merger_1", n)).collect();
    node.emit(&batch[..2]).unwrap();
    node.emit(&batch[2..]).unwrap();

    for expected in &batch {
        assert_eq!(&next(&mut events).await, expected);
    }
    assert_eq!(*seen.lock().unwrap(), batch);

    stream.disconnect().await;
}

#[tokio::test]
async fn ignores_other_contexts() {
    let node = MockNode::start().await.unwrap();
    let mut stream = stream_for(&node);
    let mut events = stream.events();

    stream.connect().await.unwrap();
    assert!(node.wait_for_subscribers(1, WAIT).await);

    node.emit_to(&ContextId::new("ctx-elsewhere").unwrap(), &[sent("Other_1", 0)])
        .unwrap();
    node.emit(&[sent("Merger_1", 1)]).unwrap();

    assert_eq!(next(&mut events).await, sent("Merger_1", 1));
}

#[tokio::test]
async fn decodes_byte_array_payloads() {
    let node = MockNode::start().await.unwrap();
    node.set_bytes_payloads(true);

    let mut stream = stream_for(&node);
    let mut events = stream.events();
    stream.connect().await.unwrap();
    assert!(node.wait_for_subscribers(1, WAIT).await);

    let uploaded = DomainEvent::DocumentUploaded(DocumentUploadedPayload {
        doc_hash: DocHash::new("9f86d081884c7d65").unwrap(),
        doc_type: "contract".to_string(),
    });
    node.emit(std::slice::from_ref(&uploaded)).unwrap();

    assert_eq!(next(&mut events).await, uploaded);
}

#[tokio::test]
async fn reconnect_does_not_replay_missed_events() {
    let node = MockNode::start().await.unwrap();
    let mut stream = stream_for(&node);
    let mut events = stream.events();

    stream.connect().await.unwrap();
    assert!(node.wait_for_subscribers(1, WAIT).await);
    node.emit(&[sent("Merger_1", 0)]).unwrap();
    assert_eq!(next(&mut events).await, sent("Merger_1", 0));

    stream.disconnect().await;
    assert!(!stream.is_connected());
    wait_until_unsubscribed(&node).await;

    node.emit(&[sent("Merger_1", 1)]).unwrap();

    stream.connect().await.unwrap();
    assert!(node.wait_for_subscribers(1, WAIT).await);
    node.emit(&[sent("Merger_1", 2)]).unwrap();

    assert_eq!(next(&mut events).await, sent("Merger_1", 2));
}

#[tokio::test]
async fn disconnect_clears_listeners() {
    let node = MockNode::start().await.unwrap();
    let mut stream = stream_for(&node);
    stream.add_callback(|_| {});
    let _guard = stream.scoped(|_| {});

    stream.connect().await.unwrap();
    assert_eq!(stream.listener_count(), 2);

    stream.disconnect().await;
    stream.disconnect().await;
    assert_eq!(stream.listener_count(), 0);
}

#[tokio::test]
async fn server_close_ends_connection() {
    let node = MockNode::start().await.unwrap();
    let mut stream = stream_for(&node);
    stream.connect().await.unwrap();
    assert!(node.wait_for_subscribers(1, WAIT).await);

    node.drop_connections();

    tokio::time::timeout(WAIT, async {
        while stream.is_connected() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection task ends");
}

#[tokio::test]
async fn resubscribe_switches_context() {
    let node = MockNode::start().await.unwrap();
    let mut stream = stream_for(&node);
    let mut events = stream.events();
    stream.connect().await.unwrap();
    assert!(node.wait_for_subscribers(1, WAIT).await);

    let other = ContextId::new("ctx-second").unwrap();
    stream.subscribe(vec![other.clone()]);
    assert_eq!(stream.topics(), vec![other.clone()]);

    let opened = DomainEvent::CaseOpened(CaseOpenedPayload {
        case_id: CaseId::new("Lease_7").unwrap(),
    });
    // Keep emitting until the new subscription has taken effect on the node.
    let received = tokio::time::timeout(WAIT, async {
        loop {
            node.emit_to(&other, std::slice::from_ref(&opened)).unwrap();
            if let Ok(Ok(event)) =
                tokio::time::timeout(Duration::from_millis(100), events.recv()).await
            {
                break event;
            }
        }
    })
    .await
    .expect("event on the new context");
    assert_eq!(received, opened);

    node.emit(&[sent("Merger_1", 3)]).unwrap();
    node.emit_to(&other, &[sent("Lease_7", 4)]).unwrap();
    let mut last = next(&mut events).await;
    while last == opened {
        last = next(&mut events).await;
    }
    assert_eq!(last, sent("Lease_7", 4));
}

#[tokio::test]
async fn empty_subscription_before_connect_stays_empty() {
    let node = MockNode::start().await.unwrap();
    let mut stream = stream_for(&node);
    let mut events = stream.events();

    stream.subscribe(vec![]);
    stream.connect().await.unwrap();
    assert!(stream.is_connected());
    assert!(stream.topics().is_empty());

    node.emit(&[sent("Merger_1", 0)]).unwrap();
    assert!(
        tokio::time::timeout(Duration::from_millis(200), events.recv())
            .await
            .is_err()
    );
    assert_eq!(node.subscribers(), 0);

    stream.subscribe(vec![node.context_id().clone()]);
    assert!(node.wait_for_subscribers(1, WAIT).await);
    node.emit(&[sent("Merger_1", 1)]).unwrap();
    assert_eq!(next(&mut events).await, sent("Merger_1", 1));
}
