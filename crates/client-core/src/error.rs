use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SessionState;

/// Broad error category driving recovery behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChatErrorCategory {
    /// Handshake rejected by the server. Terminal; never reconnected.
    Auth,
    /// Unexpected transport-level failure. Recoverable via backoff reconnect.
    Transport,
    /// Malformed inbound wire payload. The frame is dropped, the stream lives.
    Decode,
    /// History fetch failure. Surfaced to the consumer, never retried silently.
    History,
    /// Caller/programming error (send after close, missing credential).
    Usage,
    /// Internal invariant break.
    Internal,
}

/// Stable error payload crossing the transport/consumer boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct ChatError {
    /// High-level category.
    pub category: ChatErrorCategory,
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ChatError {
    /// Construct an error with an explicit category and stable code.
    pub fn new(
        category: ChatErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether the reconnect loop may recover from this error.
    ///
    /// Only transport-level drops are retried; an auth rejection is terminal.
    pub fn is_recoverable(&self) -> bool {
        self.category == ChatErrorCategory::Transport
    }

    /// Handshake rejected during connection establishment.
    pub fn auth_rejected(message: impl Into<String>) -> Self {
        Self::new(ChatErrorCategory::Auth, "auth_rejected", message)
    }

    /// Unexpected network-level disconnect or connect failure.
    pub fn transport_drop(message: impl Into<String>) -> Self {
        Self::new(ChatErrorCategory::Transport, "transport_drop", message)
    }

    /// Malformed inbound live payload.
    pub fn decode_failure(message: impl Into<String>) -> Self {
        Self::new(ChatErrorCategory::Decode, "decode_failure", message)
    }

    /// History fetch failed; the live session is unaffected.
    pub fn history_unavailable(message: impl Into<String>) -> Self {
        Self::new(ChatErrorCategory::History, "history_unavailable", message)
    }

    /// Send attempted while the session is not `Open`.
    pub fn send_not_open(state: SessionState) -> Self {
        Self::new(
            ChatErrorCategory::Usage,
            "send_not_open",
            format!("cannot send while session is in state {state:?}"),
        )
    }

    /// Send attempted against an explicitly closed conversation.
    pub fn send_while_closed() -> Self {
        Self::new(
            ChatErrorCategory::Usage,
            "send_while_closed",
            "conversation was closed; send rejected",
        )
    }

    /// The credential provider returned no credential.
    pub fn missing_credential() -> Self {
        Self::new(
            ChatErrorCategory::Usage,
            "missing_credential",
            "credential provider returned no credential",
        )
    }

    /// Invalid session state transition.
    pub fn invalid_state(current: SessionState, action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            ChatErrorCategory::Internal,
            "invalid_state_transition",
            format!("cannot run '{action}' while session is in state {current:?}"),
        )
    }
}
