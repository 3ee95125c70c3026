use std::collections::VecDeque;

/// FIFO queue of sends issued while the transport session is not open.
///
/// The queue never retries on its own: the owning manager drains it on every
/// transition to `Open` and clears it without flushing on close. A reopened
/// conversation starts with a fresh, empty queue.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: VecDeque<String>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a payload in submission order.
    pub fn enqueue(&mut self, payload: impl Into<String>) {
        self.pending.push_back(payload.into());
    }

    /// Remove and return the whole backlog in submission order.
    pub fn drain(&mut self) -> Vec<String> {
        self.pending.drain(..).collect()
    }

    /// Put unsent payloads back at the head, preserving their order ahead
    /// of anything enqueued since the drain.
    pub fn requeue_front(&mut self, payloads: Vec<String>) {
        for payload in payloads.into_iter().rev() {
            self.pending.push_front(payload);
        }
    }

    /// Drop all pending payloads without flushing.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
