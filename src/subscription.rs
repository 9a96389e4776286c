//! Multi-listener action sources.
//!
//! A [`Subscription`] is a fan-out point for externally produced actions:
//! timers, sockets, anything that emits. The runtime's `subscribe` effect
//! attaches a listener that feeds emitted actions into its queue, and the
//! `unsubscribe` effect detaches it again by key.

use crate::action::Action;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Listener = Arc<dyn Fn(Action) + Send + Sync>;

/// A cloneable handle to a shared set of action listeners.
///
/// # Example
///
/// ```rust
/// use flywheel::action::Action;
/// use flywheel::subscription::Subscription;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let source = Subscription::new();
/// let seen = Arc::new(AtomicUsize::new(0));
///
/// let counter = seen.clone();
/// let id = source.listen(move |_action| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// source.emit(Action::new("Tick", 1));
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
///
/// source.unlisten(id);
/// source.emit(Action::new("Tick", 2));
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<Inner>,
}

struct Inner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl Subscription {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a listener; returns an id usable with [`Subscription::unlisten`].
    pub fn listen(&self, listener: impl Fn(Action) + Send + Sync + 'static) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a previously registered listener.
    pub fn unlisten(&self, id: u64) {
        self.inner
            .listeners
            .lock()
            .retain(|(listener_id, _)| *listener_id != id);
    }

    /// Fan an action out to every listener.
    ///
    /// Listeners are invoked outside the internal lock, so they may call
    /// back into this subscription.
    pub fn emit(&self, action: Action) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            (*listener)(action.clone());
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}
