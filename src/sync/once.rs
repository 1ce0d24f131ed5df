//! One-time initialization with double-checked publication.
//!
//! [`OnceInitializer`] runs a factory exactly once no matter how many
//! threads race to trigger it, and every later reader sees the fully
//! constructed value.
//!
//! # Protocol
//!
//! ```text
//! fast path:  load(state, Acquire) == DONE            -> return value
//! slow path:  lock -> re-check DONE                   -> return value
//!                  -> state = IN_PROGRESS -> factory()
//!                  -> store value -> store(state, DONE, Release) -> unlock
//! ```
//!
//! The Release store of `DONE` pairs with the Acquire load on the fast
//! path, so a reader that observes `DONE` also observes every write the
//! factory made. Callers that arrive while a factory runs block on the lock
//! instead of running a second factory.
//!
//! # Failure
//!
//! A factory that returns an error or panics leaves the state at
//! `NOT_STARTED`. The lock is released on the way out, so blocked callers
//! wake up, see the state is not `DONE`, and run their own factory.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::OnceLock;

use parking_lot::{const_mutex, Mutex};

use crate::tracing_compat::{debug, warn};

const NOT_STARTED: u8 = 0;
const IN_PROGRESS: u8 = 1;
const DONE: u8 = 2;

/// Observable state of a [`OnceInitializer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitState {
    /// No factory has completed and none is running.
    NotStarted,
    /// A factory is running.
    InProgress,
    /// The value is published; this state is final.
    Done,
}

/// Error returned when the factory passed to
/// [`OnceInitializer::get_or_try_init`] fails.
///
/// The initializer is left retryable: a later call runs its factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializationFailure<E> {
    source: E,
    attempt: u32,
}

impl<E> InitializationFailure<E> {
    /// Wraps a factory error raised on the given attempt.
    #[must_use]
    pub const fn new(source: E, attempt: u32) -> Self {
        Self { source, attempt }
    }

    /// Which factory invocation failed, counting from 1.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The factory's error.
    #[must_use]
    pub const fn error(&self) -> &E {
        &self.source
    }

    /// Consumes the failure, returning the factory's error.
    pub fn into_source(self) -> E {
        self.source
    }
}

impl<E> fmt::Display for InitializationFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "initialization failed on attempt {}", self.attempt)
    }
}

impl<E> std::error::Error for InitializationFailure<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// A value computed exactly once, on first request.
///
/// # Example
///
/// ```ignore
/// static REGISTRY: OnceInitializer<Registry> = OnceInitializer::new();
///
/// fn registry() -> &'static Registry {
///     REGISTRY.get_or_init(Registry::load)
/// }
/// ```
pub struct OnceInitializer<T> {
    /// NOT_STARTED, IN_PROGRESS, or DONE.
    state: AtomicU8,
    /// The value (OnceLock gives safe `&T` access once set).
    value: OnceLock<T>,
    /// Serializes the NOT_STARTED -> DONE transition.
    init_lock: Mutex<()>,
    /// Factory invocations so far.
    attempts: AtomicU32,
}

impl<T> OnceInitializer<T> {
    /// Creates an initializer in the `NotStarted` state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(NOT_STARTED),
            value: OnceLock::new(),
            init_lock: const_mutex(()),
            attempts: AtomicU32::new(0),
        }
    }

    /// Creates an initializer that is already `Done` with `value`.
    #[must_use]
    pub fn with_value(value: T) -> Self {
        Self {
            state: AtomicU8::new(DONE),
            value: OnceLock::from(value),
            init_lock: const_mutex(()),
            attempts: AtomicU32::new(0),
        }
    }

    /// Returns true once the value has been published.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::Acquire) == DONE
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> InitState {
        match self.state.load(Ordering::Acquire) {
            NOT_STARTED => InitState::NotStarted,
            IN_PROGRESS => InitState::InProgress,
            _ => InitState::Done,
        }
    }

    /// Returns how many times a factory has been invoked.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Returns the value if it has been published.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        if self.is_initialized() {
            self.value.get()
        } else {
            None
        }
    }

    /// Returns the value, running `f` to produce it if no caller has yet.
    ///
    /// Exactly one caller runs its factory; concurrent callers block until
    /// the value is published. If `f` panics the initializer stays
    /// retryable and the panic propagates to this caller.
    pub fn get_or_init<F>(&self, f: F) -> &T
    where
        F: FnOnce() -> T,
    {
        if let Some(value) = self.get() {
            return value;
        }
        let _guard = self.init_lock.lock();
        if let Some(value) = self.get() {
            return value;
        }
        let reset = self.begin();
        let value = f();
        self.publish(value, reset)
    }

    /// Returns the value, running fallible `f` to produce it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`InitializationFailure`] wrapping `f`'s error. The
    /// initializer stays `NotStarted` and a later call may retry.
    pub fn get_or_try_init<F, E>(&self, f: F) -> Result<&T, InitializationFailure<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.get() {
            return Ok(value);
        }
        let _guard = self.init_lock.lock();
        if let Some(value) = self.get() {
            return Ok(value);
        }
        let reset = self.begin();
        match f() {
            Ok(value) => Ok(self.publish(value, reset)),
            Err(e) => {
                // Dropping the guard returns the state to NOT_STARTED.
                drop(reset);
                let attempt = self.attempts();
                warn!(attempt, "once initializer factory failed");
                Err(InitializationFailure::new(e, attempt))
            }
        }
    }

    /// Publishes `value` if nothing has been published yet.
    ///
    /// # Errors
    ///
    /// Returns `Err(value)` if the initializer is already `Done`.
    pub fn set(&self, value: T) -> Result<(), T> {
        if self.is_initialized() {
            return Err(value);
        }
        let _guard = self.init_lock.lock();
        if self.is_initialized() {
            return Err(value);
        }
        let reset = ResetOnDrop { state: &self.state };
        self.publish(value, reset);
        Ok(())
    }

    /// Consumes the initializer, returning the value if it was published.
    pub fn into_inner(self) -> Option<T> {
        self.value.into_inner()
    }

    /// Marks a factory as running. Must be called with `init_lock` held.
    fn begin(&self) -> ResetOnDrop<'_> {
        self.state.store(IN_PROGRESS, Ordering::Relaxed);
        self.attempts.fetch_add(1, Ordering::Relaxed);
        debug!(attempt = self.attempts(), "once initializer running factory");
        ResetOnDrop { state: &self.state }
    }

    /// Stores the value and releases it to readers. Must be called with
    /// `init_lock` held.
    fn publish(&self, value: T, reset: ResetOnDrop<'_>) -> &T {
        let value = self.value.get_or_init(|| value);
        self.state.store(DONE, Ordering::Release);
        std::mem::forget(reset);
        debug!("once initializer published value");
        value
    }
}

impl<T> Default for OnceInitializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for OnceInitializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("OnceInitializer");
        match self.get() {
            Some(v) => d.field("value", v),
            None => d.field("value", &format_args!("<{:?}>", self.state())),
        };
        d.finish()
    }
}

impl<T: Clone> Clone for OnceInitializer<T> {
    fn clone(&self) -> Self {
        match self.get() {
            Some(value) => Self::with_value(value.clone()),
            None => Self::new(),
        }
    }
}

impl<T> From<T> for OnceInitializer<T> {
    fn from(value: T) -> Self {
        Self::with_value(value)
    }
}

/// Returns the state to NOT_STARTED unless forgotten after publication.
struct ResetOnDrop<'a> {
    state: &'a AtomicU8,
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.state.store(NOT_STARTED, Ordering::Release);
    }
}
