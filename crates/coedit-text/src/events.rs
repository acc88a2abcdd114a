//! Change notifications and listener bookkeeping.
//!
//! Every subscriber gets its own unbounded queue, so notifications are
//! delivered in the order they were emitted and never dropped while the
//! subscription is alive. Dropping a [`Subscription`] unregisters it.

use crate::delta::DeltaOp;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// What produced a change.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// A direct edit made through this replica's editing surface.
    Local,
    /// This replica's grouped undo/redo.
    Undo,
    /// An update received from the named peer.
    Remote(String),
    /// State restored from the durable cache.
    Load,
}

impl Origin {
    /// Whether the change was produced by this replica itself.
    pub fn is_self(&self) -> bool {
        matches!(self, Origin::Local | Origin::Undo)
    }
}

/// Notification emitted after a document mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Origin tag, `None` for untagged changes such as state merges.
    pub origin: Option<Origin>,
    /// The visible change, expressed against the text before the mutation.
    pub delta: Vec<DeltaOp>,
}

struct Listeners<E> {
    next_id: u64,
    senders: HashMap<u64, mpsc::UnboundedSender<E>>,
}

/// A registry of subscribers for one event stream.
pub struct ListenerRegistry<E> {
    inner: Arc<Mutex<Listeners<E>>>,
}

impl<E: Clone> ListenerRegistry<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                senders: HashMap::new(),
            })),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listeners = self.inner.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.senders.insert(id, tx);

        Subscription {
            id,
            receiver: rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every live subscriber. Returns the number reached.
    pub fn emit(&self, event: E) -> usize {
        let mut listeners = self.inner.lock();
        listeners
            .senders
            .retain(|_, tx| tx.send(event.clone()).is_ok());
        listeners.senders.len()
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.inner.lock().senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every subscriber. Their queues still yield what was already
    /// delivered, then end.
    pub fn clear(&self) {
        self.inner.lock().senders.clear();
    }
}

impl<E: Clone> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A scoped subscription; unregisters itself when dropped.
pub struct Subscription<E> {
    id: u64,
    receiver: mpsc::UnboundedReceiver<E>,
    registry: Weak<Mutex<Listeners<E>>>,
}

impl<E> Subscription<E> {
    /// Take the next queued event without waiting.
    pub fn try_next(&mut self) -> Option<E> {
        self.receiver.try_recv().ok()
    }

    /// Take every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<E> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait for the next event. Returns `None` once the registry released
    /// this subscription and the queue is empty.
    pub async fn next(&mut self) -> Option<E> {
        self.receiver.recv().await
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            inner.lock().senders.remove(&self.id);
        }
    }
}

impl<E> std::fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
