//! History/live merge buffer.
//!
//! The merged conversation view emits the finite historical batch first, in
//! fetch order, then every live arrival append-only at the tail. Live
//! messages arriving while the history fetch is still pending are buffered
//! in arrival order and flushed right after the historical prefix. Once
//! streaming begins the ordering guarantee is emission order, not timestamp
//! order; a live message is never inserted into the already-emitted prefix.

use std::collections::HashSet;

use crate::types::ChatMessage;

#[derive(Debug, Clone)]
enum MergePhase {
    /// History fetch pending; live arrivals are held back.
    AwaitingHistory { buffered: Vec<ChatMessage> },
    /// History (or its failure) has been emitted; live arrivals pass through.
    Streaming,
}

/// Merges a one-shot historical batch with an unbounded live stream into a
/// single gap-free, duplicate-free emission sequence.
#[derive(Debug, Clone)]
pub struct MergeBuffer {
    phase: MergePhase,
    emitted_ids: HashSet<String>,
}

impl Default for MergeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeBuffer {
    pub fn new() -> Self {
        Self {
            phase: MergePhase::AwaitingHistory {
                buffered: Vec::new(),
            },
            emitted_ids: HashSet::new(),
        }
    }

    /// Whether the historical prefix has been emitted yet.
    pub fn is_streaming(&self) -> bool {
        matches!(self.phase, MergePhase::Streaming)
    }

    /// Feed one live arrival; returns the messages to emit for it.
    ///
    /// Empty while history is pending (the arrival is buffered) or when the
    /// message is an id-duplicate of one already emitted (an optimistic echo
    /// reconciled by id). Id-less messages are never deduplicated.
    pub fn push_live(&mut self, message: ChatMessage) -> Vec<ChatMessage> {
        match &mut self.phase {
            MergePhase::AwaitingHistory { buffered } => {
                buffered.push(message);
                Vec::new()
            }
            MergePhase::Streaming => {
                if self.record_id(&message) {
                    vec![message]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Complete the history fetch: emits the batch in fetch order (history
    /// is trusted as already sorted), then the buffered live arrivals in
    /// their original arrival order.
    pub fn complete_history(&mut self, history: Vec<ChatMessage>) -> Vec<ChatMessage> {
        let buffered = self.begin_streaming();
        let mut emissions = Vec::with_capacity(history.len() + buffered.len());
        for message in history.into_iter().chain(buffered) {
            if self.record_id(&message) {
                emissions.push(message);
            }
        }
        emissions
    }

    /// Skip the historical prefix (fetch failed or history not wanted) and
    /// flush any buffered live arrivals.
    pub fn skip_history(&mut self) -> Vec<ChatMessage> {
        self.complete_history(Vec::new())
    }

    fn begin_streaming(&mut self) -> Vec<ChatMessage> {
        let buffered = match &mut self.phase {
            MergePhase::AwaitingHistory { buffered } => std::mem::take(buffered),
            MergePhase::Streaming => Vec::new(),
        };
        self.phase = MergePhase::Streaming;
        buffered
    }

    /// Record the message id; `false` when the id was already emitted.
    fn record_id(&mut self, message: &ChatMessage) -> bool {
        match &message.id {
            Some(id) if !id.is_empty() => self.emitted_ids.insert(id.clone()),
            _ => true,
        }
    }
}
