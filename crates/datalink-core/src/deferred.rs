//! Cross-thread mailbox for work that must run on the simulation thread.
//!
//! Network tasks may need to change live simulation state (set the
//! throttle, stage, change time warp). They cannot touch that state
//! directly; instead they [`enqueue`](DeferredQueue::enqueue) a closure.
//! Once per tick the simulation thread calls
//! [`drain`](DeferredQueue::drain), which runs every pending closure in
//! submission order against the live target, exactly once.
//!
//! The critical section on either side is a single `Vec` push or swap,
//! so producers never wait on simulation progress. Closures run with the
//! lock released: a closure that enqueues more work lands in the next
//! drain instead of looping forever in the current one.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A unit of work captured on any thread and executed on the simulation thread.
pub type DelayedEntry<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Thread-safe FIFO of [`DelayedEntry`] values targeting `T`.
pub struct DeferredQueue<T: ?Sized> {
    pending: Mutex<Vec<DelayedEntry<T>>>,
}

impl<T: ?Sized> DeferredQueue<T> {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Append an action. Callable from any thread.
    pub fn enqueue(&self, action: impl FnOnce(&mut T) + Send + 'static) {
        self.enqueue_boxed(Box::new(action));
    }

    /// Append an already-boxed action.
    pub fn enqueue_boxed(&self, entry: DelayedEntry<T>) {
        self.lock().push(entry);
    }

    /// Take every pending action and run it against `target`, in order.
    ///
    /// Must only be called from the thread that owns `target`. Returns the
    /// number of actions executed.
    pub fn drain(&self, target: &mut T) -> usize {
        let batch = std::mem::take(&mut *self.lock());
        let count = batch.len();
        for action in batch {
            action(&mut *target);
        }
        count
    }

    /// Number of actions waiting for the next drain.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no actions are waiting.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panicking producer cannot leave the Vec half-written, so a
    // poisoned lock still guards a consistent list.
    fn lock(&self) -> MutexGuard<'_, Vec<DelayedEntry<T>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: ?Sized> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for DeferredQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("pending", &self.len())
            .finish()
    }
}
