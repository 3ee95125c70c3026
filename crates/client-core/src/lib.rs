//! Core contract shared between the realtime transport runtime and its
//! consumers.
//!
//! This crate defines the message/session vocabulary, the live-event wire
//! codec, the session lifecycle machine, the history/live merge buffer, the
//! outbound queue and the handler-registry abstraction. It performs no I/O;
//! the network binding lives in `client-ws`.

/// Stable error taxonomy for the transport layer.
pub mod error;
/// Insertion-ordered consumer callback registry.
pub mod handlers;
/// History/live merge buffer.
pub mod merge;
/// FIFO queue for sends issued while not open.
pub mod outbox;
/// Capped exponential reconnect backoff.
pub mod retry;
/// Transport session lifecycle state machine.
pub mod session_state;
/// Conversation/message/session types.
pub mod types;
/// Live-event JSON codec.
pub mod wire;

pub use error::{ChatError, ChatErrorCategory};
pub use handlers::{HandlerId, HandlerRegistry};
pub use merge::MergeBuffer;
pub use outbox::OutboundQueue;
pub use retry::{ReconnectBackoff, ReconnectPolicy};
pub use session_state::SessionStateMachine;
pub use types::{ChatMessage, CloseReason, ConversationId, SessionEvent, SessionState};
pub use wire::{InboundFrame, decode_inbound, encode_outbound};
