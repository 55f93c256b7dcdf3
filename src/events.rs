//! Observer lists.
//!
//! Every change notification in the crate goes through `Observers<E>`:
//! callbacks are registered with `subscribe`, which hands back a
//! `SubscriptionId`, and removed again with `unsubscribe`. Owners must
//! unsubscribe when the listener goes away; nothing is collected
//! automatically.
//!
//! Callbacks run synchronously, in subscription order, while the emitting
//! object is still mid-update. They receive the event payload only, so a
//! callback cannot re-enter the emitter. A listener that needs to act on the
//! emitter should record the event and act after the call returns. During a
//! multi-stat cascade (a base change that re-clamps dependent stats) a
//! listener may see the dependents' events before the triggering stat's own.

use std::fmt;

/// Handle returned by [`Observers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// A list of callbacks for one event type.
///
/// # Examples
///
/// ```rust
/// use statfx::events::Observers;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let seen = Rc::new(Cell::new(0));
/// let mut observers = Observers::<u32>::new();
///
/// let sink = seen.clone();
/// let id = observers.subscribe(move |v| sink.set(sink.get() + *v));
/// observers.emit(&5);
/// assert_eq!(seen.get(), 5);
///
/// assert!(observers.unsubscribe(id));
/// observers.emit(&5);
/// assert_eq!(seen.get(), 5);
/// ```
pub struct Observers<E> {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Box<dyn FnMut(&E)>)>,
}

impl<E> Observers<E> {
    /// Create an empty observer list.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            callbacks: Vec::new(),
        }
    }

    /// Register a callback.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&E) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if the id was not registered here.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(sub, _)| *sub != id);
        self.callbacks.len() != before
    }

    /// Invoke every callback with `event`.
    pub fn emit(&mut self, event: &E) {
        for (_, callback) in self.callbacks.iter_mut() {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Drop every callback.
    pub fn clear(&mut self) {
        self.callbacks.clear();
    }
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.callbacks.len())
            .finish()
    }
}
