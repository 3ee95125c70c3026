use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque conversation identifier (a room or a direct-message peer).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Canonical message payload flowing through the merged conversation view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Server-assigned message ID; `None` for unacknowledged local sends.
    pub id: Option<String>,
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Sender user ID.
    pub sender_id: String,
    /// Message body.
    pub content: String,
    /// Creation timestamp in milliseconds since Unix epoch.
    pub created_at_ms: u64,
}

/// Transport session lifecycle state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionState {
    /// No connection attempt has been made yet.
    Disconnected,
    /// A handshake is in flight.
    Connecting,
    /// The connection is established and sends are accepted.
    Open,
    /// The connection dropped unexpectedly; a backoff retry is pending.
    Reconnecting,
    /// The session ended and will never be revived.
    Closed,
}

/// Why a session reached [`SessionState::Closed`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CloseReason {
    /// The consumer called close.
    LocalClose,
    /// The handshake was rejected by the server (invalid/expired credential).
    AuthRejected,
}

/// Events emitted by a transport session toward its owning manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Lifecycle transition.
    StateChanged {
        /// New session state.
        state: SessionState,
        /// Close reason when `state == Closed`.
        reason: Option<CloseReason>,
    },
    /// A live message was decoded from the wire.
    MessageReceived(ChatMessage),
}

impl SessionEvent {
    /// Shorthand for a transition without a close reason.
    pub fn state(state: SessionState) -> Self {
        Self::StateChanged {
            state,
            reason: None,
        }
    }

    /// Shorthand for a terminal transition to `Closed`.
    pub fn closed(reason: CloseReason) -> Self {
        Self::StateChanged {
            state: SessionState::Closed,
            reason: Some(reason),
        }
    }
}
