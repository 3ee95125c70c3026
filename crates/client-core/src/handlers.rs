//! Insertion-ordered callback registry.
//!
//! Replaces the ad hoc per-socket handler arrays of earlier drafts with one
//! explicit abstraction: registration order is the fan-out order for every
//! dispatched value, and a dispatch completes for all handlers before the
//! caller processes the next value.

/// Stable handle for unregistering a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler<T> = std::sync::Arc<dyn Fn(&T) + Send + Sync>;

/// Set of consumer callbacks with defined fan-out order.
pub struct HandlerRegistry<T> {
    next_id: u64,
    handlers: Vec<(HandlerId, Handler<T>)>,
}

impl<T> Default for HandlerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandlerRegistry<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            handlers: Vec::new(),
        }
    }

    /// Register a callback; multiple registrations fan out, not replace.
    pub fn register(&mut self, handler: impl Fn(&T) + Send + Sync + 'static) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, std::sync::Arc::new(handler)));
        id
    }

    /// Remove one callback; `false` when the id is unknown.
    pub fn unregister(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    /// Drop every registered callback.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Invoke every callback in registration order.
    pub fn dispatch(&self, value: &T) {
        for (_, handler) in &self.handlers {
            handler(value);
        }
    }

    /// Clone the callbacks in registration order. Lets a caller that guards
    /// the registry with a lock release it before invoking anything, so a
    /// callback may register or unregister without deadlocking.
    pub fn snapshot(&self) -> Vec<Handler<T>> {
        self.handlers
            .iter()
            .map(|(_, handler)| std::sync::Arc::clone(handler))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<T> std::fmt::Debug for HandlerRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
