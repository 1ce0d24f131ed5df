//! Multi-producer, multi-consumer FIFO queue with blocking `pop`.
//!
//! The queue keeps its elements and its lock in one value. Consumers wait
//! on a "non-empty" condition and producers on a bounded queue wait on a
//! "non-full" condition:
//!
//! ```text
//! push:  lock -> while full { wait(non_full) }  -> push_back -> notify(non_empty)
//! pop:   lock -> while empty { wait(non_empty) } -> pop_front -> notify(non_full)
//! ```
//!
//! # Wakeups
//!
//! A notification is not delivered to a particular waiter. Another consumer
//! can take the element between the notify and the waiter reacquiring the
//! lock, and condition variables may wake spuriously. Every wait therefore
//! re-checks its predicate after waking and waits again if it no longer
//! holds. Bounded waits check the predicate one last time before reporting
//! a timeout, so a timed-out waiter never strands an element.
//!
//! # Capacity
//!
//! A capacity of `0` means unbounded; `push` on an unbounded queue never
//! blocks. A bounded queue never holds more than its capacity and blocks
//! producers exactly when it is full.
//!
//! # Example
//!
//! ```ignore
//! let queue = Arc::new(BlockingQueue::bounded(64));
//!
//! let producer = {
//!     let queue = Arc::clone(&queue);
//!     thread::spawn(move || {
//!         for job in jobs {
//!             queue.push(job); // waits while 64 jobs are queued
//!         }
//!     })
//! };
//!
//! let job = queue.pop(); // waits for the first job
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::{ConfigError, QueueConfig};
use crate::tracing_compat::{debug, trace};

/// Upper bound on the slots reserved up front for a bounded queue.
const PREALLOCATE_LIMIT: usize = 1024;

/// Error returned when a push cannot complete. The item is handed back.
#[derive(Clone, PartialEq, Eq)]
pub enum PushError<T> {
    /// The bounded queue was full ([`BlockingQueue::try_push`]).
    Full(T),
    /// The bounded queue stayed full for the whole timeout
    /// ([`BlockingQueue::push_timeout`]).
    TimedOut(T),
}

impl<T> PushError<T> {
    /// Returns the item that was not pushed.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::TimedOut(item) => item,
        }
    }

    /// Returns true if this error came from an expired timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => write!(f, "Full(..)"),
            Self::TimedOut(_) => write!(f, "TimedOut(..)"),
        }
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => write!(f, "queue is full"),
            Self::TimedOut(_) => write!(f, "queue push timed out"),
        }
    }
}

impl<T> std::error::Error for PushError<T> {}

/// Error returned by [`BlockingQueue::pop_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PopError {
    /// The queue stayed empty for the whole timeout.
    #[error("queue pop timed out")]
    TimedOut,
}

/// A FIFO queue whose consumers block until an element is available.
///
/// Elements are delivered in push order across all producers, and each
/// element is received by exactly one consumer.
pub struct BlockingQueue<T> {
    /// Queued elements; only touched while locked.
    items: Mutex<VecDeque<T>>,
    /// Maximum queued elements, `None` when unbounded.
    capacity: Option<usize>,
    /// Label attached to log events.
    name: Option<String>,
    /// Signalled when an element is pushed.
    not_empty: Condvar,
    /// Signalled when a bounded queue frees a slot.
    not_full: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Creates a queue holding at most `capacity` elements, `0` for unbounded.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = (capacity > 0).then_some(capacity);
        let reserve = capacity.map_or(0, |cap| cap.min(PREALLOCATE_LIMIT));
        Self {
            items: Mutex::new(VecDeque::with_capacity(reserve)),
            capacity,
            name: None,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Creates a queue with no capacity limit.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Creates a queue holding at most `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "bounded queue capacity must be non-zero");
        Self::new(capacity)
    }

    /// Creates a queue from a validated configuration.
    pub fn with_config(config: &QueueConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut queue = Self::new(config.capacity);
        queue.name.clone_from(&config.name);
        Ok(queue)
    }

    /// Returns the capacity limit, or `None` when unbounded.
    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Returns true if the queue has a capacity limit.
    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        self.capacity.is_some()
    }

    /// Returns the queue's name, if configured.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the number of queued elements.
    ///
    /// The value can be stale as soon as it is returned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns true if no elements are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Returns true if a bounded queue is at capacity. Always false when unbounded.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.is_full_locked(&self.items.lock())
    }

    /// Appends `item`, waiting while a bounded queue is full.
    pub fn push(&self, item: T) {
        let mut items = self.items.lock();
        while self.is_full_locked(&items) {
            self.not_full.wait(&mut items);
        }
        self.enqueue(&mut items, item);
    }

    /// Appends `item` only if there is room right now.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Full`] with the item if the queue is full.
    pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        let mut items = self.items.lock();
        if self.is_full_locked(&items) {
            return Err(PushError::Full(item));
        }
        self.enqueue(&mut items, item);
        Ok(())
    }

    /// Appends `item`, waiting at most `timeout` for room.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::TimedOut`] with the item if the queue stayed full.
    pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<(), PushError<T>> {
        // A deadline past the representable range waits without one.
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.push(item);
            return Ok(());
        };
        let mut items = self.items.lock();
        while self.is_full_locked(&items) {
            if self.not_full.wait_until(&mut items, deadline).timed_out()
                && self.is_full_locked(&items)
            {
                debug!(
                    queue = self.name(),
                    timeout = ?timeout,
                    "queue push timed out"
                );
                return Err(PushError::TimedOut(item));
            }
        }
        self.enqueue(&mut items, item);
        Ok(())
    }

    /// Removes and returns the head element, waiting until one is available.
    pub fn pop(&self) -> T {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = self.dequeue(&mut items) {
                return item;
            }
            self.not_empty.wait(&mut items);
        }
    }

    /// Removes and returns the head element if there is one.
    pub fn try_pop(&self) -> Option<T> {
        let mut items = self.items.lock();
        self.dequeue(&mut items)
    }

    /// Removes and returns the head element, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`PopError::TimedOut`] if the queue stayed empty.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T, PopError> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Ok(self.pop());
        };
        let mut items = self.items.lock();
        loop {
            if let Some(item) = self.dequeue(&mut items) {
                return Ok(item);
            }
            if self.not_empty.wait_until(&mut items, deadline).timed_out() {
                return self.dequeue(&mut items).ok_or_else(|| {
                    debug!(queue = self.name(), timeout = ?timeout, "queue pop timed out");
                    PopError::TimedOut
                });
            }
        }
    }

    /// Removes every queued element, in FIFO order, without waiting.
    ///
    /// Producers blocked on a full queue are woken.
    pub fn drain(&self) -> Vec<T> {
        let mut items = self.items.lock();
        let drained: Vec<T> = items.drain(..).collect();
        if self.is_bounded() && !drained.is_empty() {
            self.not_full.notify_all();
        }
        trace!(queue = self.name(), count = drained.len(), "queue drained");
        drained
    }

    fn is_full_locked(&self, items: &VecDeque<T>) -> bool {
        self.capacity.is_some_and(|cap| items.len() >= cap)
    }

    fn enqueue(&self, items: &mut MutexGuard<'_, VecDeque<T>>, item: T) {
        items.push_back(item);
        trace!(queue = self.name(), len = items.len(), "queue push");
        self.not_empty.notify_one();
    }

    fn dequeue(&self, items: &mut MutexGuard<'_, VecDeque<T>>) -> Option<T> {
        let item = items.pop_front()?;
        trace!(queue = self.name(), len = items.len(), "queue pop");
        if self.is_bounded() {
            self.not_full.notify_one();
        }
        Some(item)
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingQueue")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
