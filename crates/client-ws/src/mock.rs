//! Scripted connector and wire doubles for session/manager tests.

use std::collections::VecDeque;
use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};
use url::Url;

use client_core::ChatError;

use crate::connector::{Connector, WireConnection};

/// Outcome of one scripted connect attempt.
pub(crate) enum ConnectScript {
    /// Handshake rejected with an auth error (terminal).
    RejectAuth,
    /// Connect fails at transport level (retried).
    RejectTransport,
    /// Connect succeeds; optionally only after the gate is notified.
    Accept { gate: Option<Arc<Notify>> },
}

impl ConnectScript {
    pub(crate) fn accept() -> Self {
        Self::Accept { gate: None }
    }

    pub(crate) fn gated(gate: Arc<Notify>) -> Self {
        Self::Accept { gate: Some(gate) }
    }
}

/// Test-side probe for one accepted connection.
pub(crate) struct WireProbe {
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<Result<String, ChatError>>>>,
    sent_rx: mpsc::UnboundedReceiver<String>,
}

impl WireProbe {
    /// Inject one inbound text frame.
    pub(crate) fn push_inbound(&self, text: &str) {
        let guard = self
            .inbound_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(Ok(text.to_owned()));
        }
    }

    /// Simulate an unexpected peer-side drop.
    pub(crate) fn drop_connection(&self) {
        self.inbound_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Next frame the session wrote to this connection.
    pub(crate) async fn next_sent(&mut self) -> Option<String> {
        self.sent_rx.recv().await
    }
}

/// Connector that replays a fixed script of connect outcomes. Once the
/// script is exhausted, further attempts hang (as an unreachable server
/// would) instead of resolving.
pub(crate) struct ScriptedConnector {
    scripts: Mutex<VecDeque<ConnectScript>>,
    wires_tx: mpsc::UnboundedSender<WireProbe>,
    attempts: AtomicUsize,
}

impl ScriptedConnector {
    pub(crate) fn new(
        scripts: Vec<ConnectScript>,
    ) -> (Self, mpsc::UnboundedReceiver<WireProbe>) {
        let (wires_tx, wires_rx) = mpsc::unbounded_channel();
        (
            Self {
                scripts: Mutex::new(scripts.into()),
                wires_tx,
                attempts: AtomicUsize::new(0),
            },
            wires_rx,
        )
    }

    /// Number of connect attempts observed so far.
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _url: &Url) -> Result<Box<dyn WireConnection>, ChatError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match script {
            None => std::future::pending().await,
            Some(ConnectScript::RejectAuth) => Err(ChatError::auth_rejected("scripted rejection")),
            Some(ConnectScript::RejectTransport) => {
                Err(ChatError::transport_drop("scripted connect failure"))
            }
            Some(ConnectScript::Accept { gate }) => {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                let (sent_tx, sent_rx) = mpsc::unbounded_channel();
                let _ = self.wires_tx.send(WireProbe {
                    inbound_tx: Mutex::new(Some(inbound_tx)),
                    sent_rx,
                });
                Ok(Box::new(MockConnection {
                    inbound_rx,
                    sent_tx,
                }))
            }
        }
    }
}

struct MockConnection {
    inbound_rx: mpsc::UnboundedReceiver<Result<String, ChatError>>,
    sent_tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl WireConnection for MockConnection {
    async fn send_text(&mut self, text: &str) -> Result<(), ChatError> {
        self.sent_tx
            .send(text.to_owned())
            .map_err(|_| ChatError::transport_drop("mock connection torn down"))
    }

    async fn next_text(&mut self) -> Option<Result<String, ChatError>> {
        self.inbound_rx.recv().await
    }

    async fn close(&mut self) {}
}
