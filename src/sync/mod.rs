//! Blocking synchronization primitives for OS threads.
//!
//! Each primitive owns both its protected state and the lock guarding it,
//! and hands out access only through scoped guards or whole operations, so
//! release happens on every exit path including unwinding.
//!
//! # Primitives
//!
//! - [`OrderedLock`]: Rank-ordered mutual exclusion with fail-fast order checks
//! - [`BlockingQueue`]: FIFO queue with blocking `pop` and optional capacity
//! - [`OnceInitializer`]: Exactly-once initialization with retry on failure
//! - [`Lazy`]: Lazily initialized value for `static` items
//!
//! # Blocking vs. Errors
//!
//! Waiting is never an error. Errors report programmer mistakes
//! ([`LockOrderViolation`]), failed factories ([`InitializationFailure`]),
//! or the outcome of an explicitly bounded wait (`TimedOut` variants).
//!
//! The primitives do not interrupt waiters. A value must outlive every
//! thread that may still be blocked inside it, which borrowing enforces for
//! all `&self` methods.

mod blocking_queue;
mod lazy;
mod once;
mod ordered_lock;

pub use blocking_queue::{BlockingQueue, PopError, PushError};
pub use lazy::Lazy;
pub use once::{InitState, InitializationFailure, OnceInitializer};
pub use ordered_lock::{
    current_held_rank, held_lock_count, LockError, LockOrderViolation, LockRank, OrderedLock,
    OrderedLockGuard, TryLockError,
};
