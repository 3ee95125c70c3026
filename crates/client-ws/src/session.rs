//! Transport session: exactly one live connection per open conversation.
//!
//! The run loop owns the connection lifecycle: handshake, read/write, and
//! the capped-backoff reconnect cycle after unexpected drops. A handshake
//! rejection is terminal; an explicit `close()` wins from any state,
//! including in the middle of a backoff sleep. The session itself never
//! queues sends; that is the manager's outbound queue, layered above.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use client_core::{
    ChatError, ReconnectBackoff, ReconnectPolicy, SessionEvent, SessionState, SessionStateMachine,
    decode_inbound, encode_outbound,
};

use crate::connector::{Connector, WireConnection};

/// Handle to a running transport session.
///
/// Cloneable; all clones drive the same connection.
#[derive(Clone)]
pub struct TransportSession {
    outbound_tx: mpsc::Sender<String>,
    cancel: CancellationToken,
    state_rx: watch::Receiver<SessionState>,
}

impl TransportSession {
    /// Spawn the session run loop; lifecycle and message events are
    /// delivered through `event_tx` in emission order.
    pub fn spawn(
        connector: Arc<dyn Connector>,
        url: Url,
        policy: ReconnectPolicy,
        event_tx: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
        let cancel = CancellationToken::new();

        let run = SessionRun {
            connector,
            url,
            machine: SessionStateMachine::default(),
            backoff: ReconnectBackoff::new(policy),
            event_tx,
            state_tx,
            outbound_rx,
            cancel: cancel.child_token(),
        };
        tokio::spawn(run.run());

        Self {
            outbound_tx,
            cancel,
            state_rx,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Hand one payload to the connection writer.
    ///
    /// Valid only while `Open`; callers that want buffering go through the
    /// outbound queue instead.
    pub async fn send(&self, content: &str) -> Result<(), ChatError> {
        let state = self.state();
        if state != SessionState::Open {
            return Err(ChatError::send_not_open(state));
        }
        self.outbound_tx
            .send(content.to_owned())
            .await
            .map_err(|_| ChatError::send_not_open(SessionState::Closed))
    }

    /// Idempotent; forces `Closed` and cancels any pending reconnect timer.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

enum Drive {
    /// The connection dropped or failed at transport level.
    Dropped,
    /// Explicit close requested.
    Cancelled,
}

struct SessionRun {
    connector: Arc<dyn Connector>,
    url: Url,
    machine: SessionStateMachine,
    backoff: ReconnectBackoff,
    event_tx: mpsc::Sender<SessionEvent>,
    state_tx: watch::Sender<SessionState>,
    outbound_rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
}

impl SessionRun {
    async fn run(mut self) {
        loop {
            match self.machine.begin_connect() {
                Ok(event) => self.publish(event).await,
                Err(err) => {
                    debug!(%err, "connect attempt on finished session");
                    return;
                }
            }

            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.publish_local_close().await;
                    return;
                }
                result = self.connector.connect(&self.url) => result,
            };

            let mut connection = match attempt {
                Ok(connection) => connection,
                Err(err) if err.is_recoverable() => {
                    debug!(%err, "connect failed");
                    if !self.enter_reconnect_and_wait().await {
                        return;
                    }
                    continue;
                }
                Err(err) => {
                    warn!(%err, "handshake rejected; session will not retry");
                    if let Some(event) = self.machine.auth_rejected() {
                        self.publish(event).await;
                    }
                    return;
                }
            };

            match self.machine.handshake_succeeded() {
                Ok(event) => self.publish(event).await,
                Err(err) => {
                    debug!(%err, "stale handshake result");
                    connection.close().await;
                    return;
                }
            }
            self.backoff.reset();

            match self.drive(connection.as_mut()).await {
                Drive::Cancelled => {
                    connection.close().await;
                    self.publish_local_close().await;
                    return;
                }
                Drive::Dropped => {
                    if !self.enter_reconnect_and_wait().await {
                        return;
                    }
                }
            }
        }
    }

    /// Pump one open connection until it drops or the session is closed.
    async fn drive(&mut self, connection: &mut dyn WireConnection) -> Drive {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Drive::Cancelled,
                outbound = self.outbound_rx.recv() => {
                    // The sender lives in every handle clone; `None` means
                    // the session was dropped wholesale.
                    let Some(content) = outbound else { return Drive::Cancelled };
                    let frame = encode_outbound(&content);
                    if let Err(err) = connection.send_text(&frame).await {
                        warn!(%err, "send failed; reconnecting");
                        return Drive::Dropped;
                    }
                }
                inbound = connection.next_text() => match inbound {
                    Some(Ok(text)) => match decode_inbound(&text) {
                        Ok(message) => {
                            self.publish(SessionEvent::MessageReceived(message)).await;
                        }
                        Err(err) => warn!(%err, "dropping malformed live event"),
                    },
                    Some(Err(err)) => {
                        debug!(%err, "connection lost");
                        return Drive::Dropped;
                    }
                    None => {
                        debug!("peer closed the connection");
                        return Drive::Dropped;
                    }
                },
            }
        }
    }

    /// Transition to `Reconnecting` and sleep the backoff delay.
    ///
    /// Returns `false` when the session was closed while waiting.
    async fn enter_reconnect_and_wait(&mut self) -> bool {
        let Some(event) = self.machine.connection_lost() else {
            return false;
        };
        self.publish(event).await;
        self.discard_inflight_outbound();

        let delay = self.backoff.next_delay();
        debug!(?delay, "scheduling reconnect attempt");
        tokio::select! {
            _ = self.cancel.cancelled() => {
                self.publish_local_close().await;
                false
            }
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Payloads accepted while `Open` but still in flight when the
    /// connection dropped are not resurrected after reconnect.
    fn discard_inflight_outbound(&mut self) {
        while let Ok(content) = self.outbound_rx.try_recv() {
            warn!(
                len = content.len(),
                "dropping in-flight payload lost to disconnect"
            );
        }
    }

    async fn publish_local_close(&mut self) {
        if let Some(event) = self.machine.close() {
            self.publish(event).await;
        }
    }

    async fn publish(&mut self, event: SessionEvent) {
        if let SessionEvent::StateChanged { state, .. } = &event {
            let _ = self.state_tx.send(*state);
        }
        // The manager may already be gone during teardown.
        let _ = self.event_tx.send(event).await;
    }
}
