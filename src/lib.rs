//! Sync-core: deadlock-resistant synchronization building blocks for threaded Rust.
//!
//! # Overview
//!
//! Most concurrency bugs in threaded code come from a short list of hazards:
//! locks taken in inconsistent order, waits that trust a single wakeup, and
//! lazy initialization guarded by a plain flag. This crate packages the fix
//! for each hazard as a primitive whose state and lock live in one owned
//! value, so the pairing cannot be forgotten or bypassed.
//!
//! # Primitives
//!
//! - [`OrderedLock`]: a mutex with a rank. A thread holding a lock may only
//!   acquire locks of strictly lower rank; anything else is reported as a
//!   [`LockOrderViolation`] before the thread blocks.
//! - [`BlockingQueue`]: an optionally bounded FIFO queue whose `pop` waits
//!   until an element arrives, re-checking its predicate on every wakeup.
//! - [`OnceInitializer`]: runs a factory exactly once across racing
//!   callers; a failed factory leaves it retryable.
//! - [`Lazy`]: a `static`-friendly wrapper over [`OnceInitializer`].
//!
//! # Module Structure
//!
//! - [`sync`]: the primitives and their error types
//! - [`error`]: crate-wide error kinds and recoverability classification
//! - [`config`]: queue configuration
//! - [`tracing_compat`]: structured logging that compiles out without the
//!   `tracing-integration` feature
//!
//! # Scope
//!
//! The crate does not spawn threads, schedule work, or cancel waiters. It
//! provides primitives that calling code composes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod config;
pub mod error;
pub mod sync;
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;
pub mod tracing_compat;

pub use config::{ConfigError, QueueConfig};
pub use error::{Error, ErrorCategory, ErrorKind, Recoverability, Result};
pub use sync::{
    current_held_rank, held_lock_count, BlockingQueue, InitState, InitializationFailure, Lazy,
    LockError, LockOrderViolation, LockRank, OnceInitializer, OrderedLock, OrderedLockGuard,
    PopError, PushError, TryLockError,
};
