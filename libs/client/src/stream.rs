//! Push channel for domain events.
//!
//! One WebSocket connection per stream. A single task reads frames and
//! invokes listeners, so listeners run one at a time in arrival order.
//! Delivery is best effort: events pushed while disconnected are lost.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use circle_events::{decode_frame, subscribe_request, unsubscribe_request, DomainEvent, StreamFrame};
use circle_id::{ContextId, RequestId};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::{ClientConfig, ClientError, SessionStore};

/// How long `disconnect` waits for the close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// A registered event listener.
pub type Listener = Arc<dyn Fn(&DomainEvent) + Send + Sync>;

/// Handle returned by [`EventStream::add_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

enum Command {
    Send(Value),
    Close,
}

struct Connection {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl Connection {
    fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }
}

/// State shared between the stream handle, its task and listener guards.
struct Shared {
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    /// `None` until topics are first chosen.
    topics: Mutex<Option<Vec<ContextId>>>,
    next_id: AtomicU64,
    events: broadcast::Sender<DomainEvent>,
}

impl Shared {
    fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn topics(&self) -> Vec<ContextId> {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default()
    }

    /// The chosen topics, or `fallback` alone if none were ever chosen.
    fn topics_or(&self, fallback: &ContextId) -> Vec<ContextId> {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_or_insert_with(|| vec![fallback.clone()])
            .clone()
    }

    fn set_topics(&self, topics: Vec<ContextId>) -> Vec<ContextId> {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(topics)
            .unwrap_or_default()
    }

    fn accepts(&self, context_id: &ContextId) -> bool {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|topics| topics.contains(context_id))
    }

    fn dispatch(&self, event: &DomainEvent) {
        // Listeners may register or remove listeners; never call them under the lock.
        let snapshot: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(event);
        }

        // No receivers is fine.
        let _ = self.events.send(event.clone());
    }

    fn handle_text(&self, text: &str) {
        match decode_frame(text) {
            Ok(StreamFrame::Events(batch)) => {
                if !self.accepts(&batch.context_id) {
                    debug!(context_id = %batch.context_id, "ignoring events for unsubscribed context");
                    return;
                }
                for raw in &batch.events {
                    match raw.decode() {
                        Ok(event) => self.dispatch(&event),
                        Err(e) => warn!(kind = %raw.kind, error = %e, "skipping undecodable event"),
                    }
                }
            }
            Ok(StreamFrame::Ack { id }) => debug!(?id, "subscription acknowledged"),
            Ok(StreamFrame::Other { frame_type }) => debug!(%frame_type, "ignoring frame"),
            Err(e) => warn!(error = %e, "undecodable frame"),
        }
    }
}

/// A subscription to the node's event push channel.
///
/// Constructed explicitly and torn down on drop.
pub struct EventStream {
    config: ClientConfig,
    sessions: SessionStore,
    shared: Arc<Shared>,
    connection: Option<Connection>,
}

impl EventStream {
    /// Create a disconnected stream.
    pub fn new(config: ClientConfig, sessions: SessionStore) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            config,
            sessions,
            shared: Arc::new(Shared {
                listeners: Mutex::new(Vec::new()),
                topics: Mutex::new(None),
                next_id: AtomicU64::new(1),
                events,
            }),
            connection: None,
        }
    }

    /// Returns true while the connection task is running.
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(Connection::is_alive)
    }

    /// Open the connection and subscribe to the current topics.
    ///
    /// Does nothing when already connected. If [`subscribe`](Self::subscribe)
    /// was never called the stream subscribes to the session's context. An
    /// explicitly empty topic list stays empty.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.is_connected() {
            return Ok(());
        }

        let session = self.sessions.require()?;
        let (_, token) = session.credentials()?;

        let url = self.config.ws_url(&session.node_url);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| ClientError::transport(format!("invalid stream url {url}: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ClientError::authentication("access token is not a valid header value"))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (ws, _response) = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(request),
        )
        .await
        .map_err(|_| ClientError::transport(format!("timed out connecting to {url}")))?
        .map_err(|e| ClientError::transport(format!("failed to connect to {url}: {e}")))?;

        let topics = self.shared.topics_or(&session.context_id);

        let (commands, receiver) = mpsc::unbounded_channel();
        // Queued before the task starts so it goes out first.
        if !topics.is_empty() {
            let _ = commands.send(Command::Send(subscribe_request(RequestId::new(), &topics)));
        }

        let task = tokio::spawn(run_connection(ws, receiver, Arc::clone(&self.shared)));
        info!(%url, topics = topics.len(), "event stream connected");

        self.connection = Some(Connection { commands, task });
        Ok(())
    }

    /// Restrict delivery to events from these contexts.
    ///
    /// Applies immediately when connected, otherwise on the next connect.
    pub fn subscribe(&mut self, topics: Vec<ContextId>) {
        let previous = self.shared.set_topics(topics.clone());

        let Some(connection) = self.connection.as_ref().filter(|c| c.is_alive()) else {
            return;
        };

        let removed: Vec<ContextId> = previous
            .into_iter()
            .filter(|context| !topics.contains(context))
            .collect();
        if !removed.is_empty() {
            let _ = connection
                .commands
                .send(Command::Send(unsubscribe_request(RequestId::new(), &removed)));
        }
        if !topics.is_empty() {
            let _ = connection
                .commands
                .send(Command::Send(subscribe_request(RequestId::new(), &topics)));
        }
    }

    /// Contexts events are currently accepted from.
    pub fn topics(&self) -> Vec<ContextId> {
        self.shared.topics()
    }

    /// Register a listener invoked once per inbound event.
    pub fn add_callback<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.shared.add(Arc::new(callback))
    }

    /// Unregister a listener. Returns false if it was not registered.
    pub fn remove_callback(&self, id: ListenerId) -> bool {
        self.shared.remove(id)
    }

    /// Register a listener that is removed when the guard is dropped.
    pub fn scoped<F>(&self, callback: F) -> ListenerGuard
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        let id = self.add_callback(callback);
        ListenerGuard {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// A receiver of every dispatched event, for async consumers.
    pub fn events(&self) -> broadcast::Receiver<DomainEvent> {
        self.shared.events.subscribe()
    }

    /// Close the connection and unregister all listeners.
    ///
    /// Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let Some(connection) = self.connection.take() else {
            return;
        };

        let _ = connection.commands.send(Command::Close);
        let abort = connection.task.abort_handle();
        if tokio::time::timeout(CLOSE_TIMEOUT, connection.task).await.is_err() {
            abort.abort();
        }
        info!("event stream disconnected");
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.task.abort();
        }
    }
}

/// Removes its listener when dropped.
#[must_use = "the listener is removed when the guard is dropped"]
pub struct ListenerGuard {
    id: ListenerId,
    shared: Weak<Shared>,
}

impl ListenerGuard {
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.remove(self.id);
        }
    }
}

async fn run_connection<S>(
    ws: tokio_tungstenite::WebSocketStream<S>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    shared: Arc<Shared>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(request)) => {
                    if let Err(e) = write.send(Message::Text(request.to_string().into())).await {
                        warn!(error = %e, "failed to send on event stream");
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = write.close().await;
                    break;
                }
            },
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => shared.handle_text(text.as_str()),
                Some(Ok(Message::Close(_))) | None => {
                    info!("event stream closed by node");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "event stream failed");
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use circle_events::{encode_event_frame, CaseOpenedPayload};
    use circle_id::CaseId;
    use std::sync::atomic::AtomicUsize;

    fn stream() -> EventStream {
        EventStream::new(ClientConfig::default(), SessionStore::new())
    }

    fn opened(case: &str) -> DomainEvent {
        DomainEvent::CaseOpened(CaseOpenedPayload {
            case_id: CaseId::new(case).unwrap(),
        })
    }

    fn frame(context: &str, events: &[DomainEvent]) -> String {
        encode_event_frame(&ContextId::new(context).unwrap(), events, false)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_dispatch_in_order() {
        let stream = stream();
        stream.shared.set_topics(vec![ContextId::new("ctx").unwrap()]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        stream.add_callback(move |event| {
            if let DomainEvent::CaseOpened(p) = event {
                sink.lock().unwrap().push(p.case_id.to_string());
            }
        });

        stream
            .shared
            .handle_text(&frame("ctx", &[opened("a"), opened("b")]));
        stream.shared.handle_text(&frame("ctx", &[opened("c")]));

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_filters_unsubscribed_context() {
        let stream = stream();
        stream.shared.set_topics(vec![ContextId::new("ctx").unwrap()]);

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        stream.add_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        stream.shared.handle_text(&frame("other", &[opened("a")]));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_kind_skipped() {
        let stream = stream();
        stream.shared.set_topics(vec![ContextId::new("ctx").unwrap()]);

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        stream.add_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let text = r#"{"id":null,"result":{"contextId":"ctx","type":"ExecutionEvent","data":{"events":[{"kind":"ProposalCreated","data":{}},{"kind":"CaseOpened","data":{"case_id":"c1"}}]}}}"#;
        stream.shared.handle_text(text);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_and_scoped_listeners() {
        let stream = stream();
        let id = stream.add_callback(|_| {});
        assert_eq!(stream.listener_count(), 1);
        assert!(stream.remove_callback(id));
        assert!(!stream.remove_callback(id));

        {
            let _guard = stream.scoped(|_| {});
            assert_eq!(stream.listener_count(), 1);
        }
        assert_eq!(stream.listener_count(), 0);
    }

    #[test]
    fn test_broadcast_receiver() {
        let stream = stream();
        stream.shared.set_topics(vec![ContextId::new("ctx").unwrap()]);
        let mut rx = stream.events();

        stream.shared.handle_text(&frame("ctx", &[opened("a")]));
        assert_eq!(rx.try_recv().unwrap(), opened("a"));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent_and_clears_listeners() {
        let mut stream = stream();
        stream.add_callback(|_| {});
        stream.disconnect().await;
        stream.disconnect().await;
        assert_eq!(stream.listener_count(), 0);
        assert!(!stream.is_connected());
    }

    #[tokio::test]
    async fn test_connect_without_session_is_authentication_error() {
        let mut stream = stream();
        let err = stream.connect().await.unwrap_err();
        assert!(err.is_authentication());
    }

    #[test]
    fn test_subscribe_while_disconnected_sets_topics() {
        let mut stream = stream();
        stream.subscribe(vec![ContextId::new("a").unwrap()]);
        assert_eq!(stream.topics(), vec![ContextId::new("a").unwrap()]);
    }

    #[test]
    fn test_explicitly_empty_topics_accept_nothing() {
        let mut stream = stream();
        stream.subscribe(vec![]);
        assert!(stream.topics().is_empty());
        assert!(stream.shared.topics_or(&ContextId::new("ctx").unwrap()).is_empty());

        let mut rx = stream.events();
        stream.shared.handle_text(&frame("ctx", &[opened("a")]));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unset_topics_fall_back_to_session_context() {
        let stream = stream();
        let ctx = ContextId::new("ctx").unwrap();
        assert_eq!(stream.shared.topics_or(&ctx), vec![ctx.clone()]);
        assert_eq!(stream.topics(), vec![ctx]);
    }
}
