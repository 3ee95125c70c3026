//! Conversation session manager: the object the UI layer talks to.
//!
//! At most one live transport session exists per manager. Opening a
//! conversation closes the previous one first, fetches history, spawns the
//! transport session and wires the merge buffer, outbound queue and handler
//! registries together. A single pump task per conversation serializes
//! merging and handler fan-out, so every message is delivered to all
//! handlers in registration order before the next one is processed.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use client_core::{
    ChatError, ChatMessage, ConversationId, HandlerId, HandlerRegistry, MergeBuffer,
    OutboundQueue, ReconnectPolicy, SessionEvent, SessionState,
};
use url::Url;

use crate::{
    connector::{Connector, endpoint_url},
    provider::{CredentialProvider, HistoryFetcher},
    session::TransportSession,
};

/// Manager construction parameters.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// WebSocket base address; the per-conversation endpoint is derived from
    /// it deterministically.
    pub base_url: Url,
    /// Backoff policy applied after transport drops.
    pub reconnect: ReconnectPolicy,
}

impl ManagerConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Per-conversation handler registries. Cleared synchronously on close so a
/// completion arriving late observes an empty fan-out set. Dispatch snapshots
/// the callbacks and invokes them with the lock released, so a callback may
/// subscribe or unsubscribe on its own handle.
#[derive(Default)]
struct Registries {
    messages: Mutex<HandlerRegistry<ChatMessage>>,
    states: Mutex<HandlerRegistry<SessionState>>,
    errors: Mutex<HandlerRegistry<ChatError>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Registries {
    fn dispatch_message(&self, message: &ChatMessage) {
        let handlers = lock(&self.messages).snapshot();
        for handler in handlers {
            handler(message);
        }
    }

    fn dispatch_state(&self, state: &SessionState) {
        let handlers = lock(&self.states).snapshot();
        for handler in handlers {
            handler(state);
        }
    }

    fn dispatch_error(&self, error: &ChatError) {
        let handlers = lock(&self.errors).snapshot();
        for handler in handlers {
            handler(error);
        }
    }

    fn clear_all(&self) {
        lock(&self.messages).clear();
        lock(&self.states).clear();
        lock(&self.errors).clear();
    }
}

struct ActiveConversation {
    id: ConversationId,
    generation: u64,
    session: TransportSession,
    outbox: Arc<Mutex<OutboundQueue>>,
    registries: Arc<Registries>,
}

struct ManagerInner {
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialProvider>,
    history: Arc<dyn HistoryFetcher>,
    config: ManagerConfig,
    generation: AtomicU64,
    active: tokio::sync::Mutex<Option<ActiveConversation>>,
}

/// Top-level consumer entry point. Cheap to clone.
#[derive(Clone)]
pub struct ConversationManager {
    inner: Arc<ManagerInner>,
}

impl ConversationManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialProvider>,
        history: Arc<dyn HistoryFetcher>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                connector,
                credentials,
                history,
                config,
                generation: AtomicU64::new(0),
                active: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Open a conversation, closing any previously open one first.
    ///
    /// Fails fast when no credential is available. History fetch and the
    /// handshake proceed asynchronously; results reach the handle's
    /// subscribers.
    pub async fn open_conversation(
        &self,
        id: ConversationId,
    ) -> Result<ConversationHandle, ChatError> {
        let credential = self
            .inner
            .credentials
            .credential()
            .ok_or_else(ChatError::missing_credential)?;
        let url = endpoint_url(&self.inner.config.base_url, &id, &credential)?;

        let mut active = self.inner.active.lock().await;
        if let Some(previous) = active.take() {
            debug!(conversation = %previous.id, "closing previous conversation");
            shutdown(&previous);
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let registries = Arc::new(Registries::default());
        let outbox = Arc::new(Mutex::new(OutboundQueue::new()));

        let (event_tx, event_rx) = mpsc::channel(256);
        let session = TransportSession::spawn(
            Arc::clone(&self.inner.connector),
            url,
            self.inner.config.reconnect,
            event_tx,
        );

        let (history_tx, history_rx) = oneshot::channel();
        {
            let history = Arc::clone(&self.inner.history);
            let id = id.clone();
            tokio::spawn(async move {
                let _ = history_tx.send(history.fetch_history(&id).await);
            });
        }

        tokio::spawn(pump(
            event_rx,
            history_rx,
            Arc::clone(&registries),
            Arc::clone(&outbox),
            session.clone(),
        ));

        *active = Some(ActiveConversation {
            id: id.clone(),
            generation,
            session,
            outbox: Arc::clone(&outbox),
            registries: Arc::clone(&registries),
        });

        Ok(ConversationHandle {
            inner: Arc::clone(&self.inner),
            registries,
            generation,
            id,
        })
    }

    /// Send through the currently open conversation.
    pub async fn send(&self, text: &str) -> Result<(), ChatError> {
        let active = self.inner.active.lock().await;
        let Some(active) = active.as_ref() else {
            return Err(ChatError::send_while_closed());
        };
        route_send(active, text).await
    }

    /// Close the currently open conversation, if any. Idempotent.
    pub async fn close(&self) {
        let mut active = self.inner.active.lock().await;
        if let Some(active) = active.take() {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            shutdown(&active);
        }
    }
}

/// Route one send through the outbound queue policy: forward immediately
/// while `Open` with nothing queued, buffer FIFO otherwise, reject once the
/// session is terminally closed.
///
/// A non-empty backlog means the open-transition flush has not finished yet;
/// a direct send would overtake it on the wire, so the payload joins the
/// queue instead.
async fn route_send(active: &ActiveConversation, text: &str) -> Result<(), ChatError> {
    match active.session.state() {
        SessionState::Closed => return Err(ChatError::send_while_closed()),
        SessionState::Open if lock(&active.outbox).is_empty() => {
            match active.session.send(text).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    // Lost the race with a drop; buffer for the next open.
                    debug!(%err, "session no longer open; buffering send");
                }
            }
        }
        _ => {}
    }
    lock(&active.outbox).enqueue(text);
    Ok(())
}

/// Tear down one conversation: clear handlers first (no late deliveries),
/// discard queued sends without flushing, then cancel the session.
fn shutdown(active: &ActiveConversation) {
    active.registries.clear_all();
    lock(&active.outbox).clear();
    active.session.close();
}

/// Handle to one open conversation.
pub struct ConversationHandle {
    inner: Arc<ManagerInner>,
    registries: Arc<Registries>,
    generation: u64,
    id: ConversationId,
}

impl std::fmt::Debug for ConversationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationHandle")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .finish()
    }
}

impl ConversationHandle {
    pub fn conversation_id(&self) -> &ConversationId {
        &self.id
    }

    /// Subscribe to the merged (history + live) message stream.
    ///
    /// There is no replay buffer: register handlers right after
    /// `open_conversation` returns to observe the historical prefix.
    pub fn subscribe(&self, handler: impl Fn(&ChatMessage) + Send + Sync + 'static) -> HandlerId {
        lock(&self.registries.messages).register(handler)
    }

    /// Subscribe to session state transitions.
    pub fn on_state_change(&self, handler: impl Fn(&SessionState) + Send + Sync + 'static) -> HandlerId {
        lock(&self.registries.states).register(handler)
    }

    /// Subscribe to surfaced errors (history fetch failures).
    pub fn on_error(&self, handler: impl Fn(&ChatError) + Send + Sync + 'static) -> HandlerId {
        lock(&self.registries.errors).register(handler)
    }

    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        lock(&self.registries.messages).unregister(id)
    }

    pub fn unsubscribe_state(&self, id: HandlerId) -> bool {
        lock(&self.registries.states).unregister(id)
    }

    pub fn unsubscribe_error(&self, id: HandlerId) -> bool {
        lock(&self.registries.errors).unregister(id)
    }

    /// Send through the outbound queue; a stale handle (its conversation was
    /// closed or replaced) gets a usage error.
    pub async fn send(&self, text: &str) -> Result<(), ChatError> {
        let active = self.inner.active.lock().await;
        let Some(active) = active.as_ref() else {
            return Err(ChatError::send_while_closed());
        };
        if active.generation != self.generation {
            return Err(ChatError::send_while_closed());
        }
        route_send(active, text).await
    }

    /// Close this conversation. A stale handle is a no-op.
    pub async fn close(&self) {
        let mut active = self.inner.active.lock().await;
        let is_current = active
            .as_ref()
            .is_some_and(|current| current.generation == self.generation);
        if is_current && let Some(current) = active.take() {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            shutdown(&current);
        }
    }
}

/// Await the pending history result, or never when it was already consumed.
async fn recv_history(
    slot: &mut Option<oneshot::Receiver<Result<Vec<ChatMessage>, ChatError>>>,
) -> Result<Result<Vec<ChatMessage>, ChatError>, oneshot::error::RecvError> {
    match slot.as_mut() {
        Some(rx) => rx.await,
        None => std::future::pending().await,
    }
}

/// Per-conversation pump: the single task that owns the merge buffer and
/// performs all handler fan-out, in order.
async fn pump(
    mut event_rx: mpsc::Receiver<SessionEvent>,
    history_rx: oneshot::Receiver<Result<Vec<ChatMessage>, ChatError>>,
    registries: Arc<Registries>,
    outbox: Arc<Mutex<OutboundQueue>>,
    session: TransportSession,
) {
    let mut merge = MergeBuffer::new();
    let mut history_slot = Some(history_rx);

    loop {
        tokio::select! {
            result = recv_history(&mut history_slot), if history_slot.is_some() => {
                history_slot = None;
                let emissions = match result {
                    Ok(Ok(batch)) => merge.complete_history(batch),
                    Ok(Err(err)) => {
                        warn!(%err, "history fetch failed; continuing live-only");
                        registries.dispatch_error(&err);
                        merge.skip_history()
                    }
                    // Fetch task was torn down mid-flight.
                    Err(_) => merge.skip_history(),
                };
                for message in &emissions {
                    registries.dispatch_message(message);
                }
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::MessageReceived(message) => {
                        for emitted in &merge.push_live(message) {
                            registries.dispatch_message(emitted);
                        }
                    }
                    SessionEvent::StateChanged { state, .. } => {
                        if state == SessionState::Open {
                            flush_outbox(&outbox, &session).await;
                        }
                        registries.dispatch_state(&state);
                        if state == SessionState::Closed {
                            // Permanent close discards the backlog; nothing
                            // will ever flush it.
                            lock(&outbox).clear();
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Flush the queued backlog in submission order on a transition to `Open`.
async fn flush_outbox(outbox: &Mutex<OutboundQueue>, session: &TransportSession) {
    let backlog = lock(outbox).drain();
    if backlog.is_empty() {
        return;
    }
    debug!(len = backlog.len(), "flushing outbound backlog");

    let mut backlog = backlog.into_iter();
    while let Some(payload) = backlog.next() {
        if let Err(err) = session.send(&payload).await {
            // The session dropped again mid-flush; keep order for the next
            // open by putting the unsent remainder back at the head.
            debug!(%err, "flush interrupted; re-buffering remainder");
            let mut remainder = vec![payload];
            remainder.extend(backlog);
            lock(outbox).requeue_front(remainder);
            return;
        }
    }
}
