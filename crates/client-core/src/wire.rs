//! JSON codec for the live event channel.
//!
//! Outbound sends carry only the body; inbound events carry the full message
//! shape. Malformed inbound payloads surface as [`ChatError`] decode failures
//! and are dropped by the transport rather than reaching handlers. The same
//! frame shape is returned by the history endpoint, so the history fetcher
//! deserializes [`InboundFrame`] batches too.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::ChatError,
    types::{ChatMessage, ConversationId},
};

/// Inbound message frame as sent by the server, on the socket and in
/// history responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InboundFrame {
    #[serde(default)]
    id: Option<String>,
    conversation_id: String,
    sender_id: String,
    content: String,
    /// Milliseconds since Unix epoch.
    created_at: u64,
}

impl From<InboundFrame> for ChatMessage {
    fn from(frame: InboundFrame) -> Self {
        ChatMessage {
            // An empty id is as good as none; only non-empty ids take part
            // in deduplication.
            id: frame.id.filter(|id| !id.is_empty()),
            conversation_id: ConversationId::new(frame.conversation_id),
            sender_id: frame.sender_id,
            content: frame.content,
            created_at_ms: frame.created_at,
        }
    }
}

/// Encode an outbound send as a `{"content": ...}` frame.
pub fn encode_outbound(content: &str) -> String {
    json!({ "content": content }).to_string()
}

/// Decode an inbound live event frame into a [`ChatMessage`].
pub fn decode_inbound(text: &str) -> Result<ChatMessage, ChatError> {
    let frame: InboundFrame = serde_json::from_str(text)
        .map_err(|err| ChatError::decode_failure(format!("invalid live event: {err}")))?;
    Ok(frame.into())
}
