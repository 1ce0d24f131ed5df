//! Error types and error handling strategy for sync-core.
//!
//! Each primitive returns its own precise error type (for example
//! [`LockOrderViolation`] or [`PushError`]). This module provides the
//! crate-wide [`Error`] those types convert into, for callers that want a
//! single error type across primitives.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Blocking is expected control flow and never produces an error
//! - Programmer errors are classified as permanent and are never retried
//! - Errors that describe a passing condition (timeouts, a full queue, a
//!   failed factory) are classified as transient
//!
//! # Error Categories
//!
//! - **Ordering**: rank-order violations on [`OrderedLock`](crate::OrderedLock)
//! - **Contention**: bounded waits that timed out or would have blocked
//! - **Initialization**: factories that failed inside a once-initializer
//! - **Config**: invalid configuration values

use core::fmt;
use std::sync::Arc;

use crate::config::ConfigError;
use crate::sync::{
    InitializationFailure, LockError, LockOrderViolation, PopError, PushError, TryLockError,
};

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Ordering ===
    /// A thread tried to acquire an ordered lock out of rank order.
    LockOrderViolation,

    // === Contention ===
    /// A bounded lock acquisition timed out.
    LockTimeout,
    /// A non-blocking operation would have blocked.
    WouldBlock,
    /// A bounded queue was full.
    QueueFull,
    /// A bounded queue wait timed out.
    QueueTimeout,

    // === Initialization ===
    /// The factory supplied to a once-initializer failed.
    InitializationFailed,

    // === Config ===
    /// A configuration value was rejected.
    InvalidConfig,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::LockOrderViolation => ErrorCategory::Ordering,
            Self::LockTimeout | Self::WouldBlock | Self::QueueFull | Self::QueueTimeout => {
                ErrorCategory::Contention
            }
            Self::InitializationFailed => ErrorCategory::Initialization,
            Self::InvalidConfig => ErrorCategory::Config,
        }
    }

    /// Returns the recoverability classification for this error kind.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        match self {
            Self::LockTimeout
            | Self::WouldBlock
            | Self::QueueFull
            | Self::QueueTimeout
            | Self::InitializationFailed => Recoverability::Transient,
            Self::LockOrderViolation | Self::InvalidConfig => Recoverability::Permanent,
        }
    }

    /// Returns true if this error is typically retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.recoverability(), Recoverability::Transient)
    }
}

/// Classification of error recoverability for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recoverability {
    /// The condition may clear; retrying can succeed.
    Transient,
    /// A defect in the calling code; retrying reproduces it.
    Permanent,
}

impl Recoverability {
    /// Returns true if this error is safe to retry.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Returns true if this error should never be retried.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent)
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Lock rank ordering failures.
    Ordering,
    /// Bounded waits and non-blocking attempts.
    Contention,
    /// Once-initializer factory failures.
    Initialization,
    /// Configuration failures.
    Config,
}

/// The crate-wide error type.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the recoverability classification.
    #[must_use]
    pub const fn recoverability(&self) -> Recoverability {
        self.kind.recoverability()
    }

    /// Returns true if this error is typically retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns true if this error reports a lock order violation.
    #[must_use]
    pub const fn is_lock_order_violation(&self) -> bool {
        matches!(self.kind, ErrorKind::LockOrderViolation)
    }

    /// Returns true if this error is the outcome of a bounded wait.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::LockTimeout | ErrorKind::QueueTimeout)
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<LockOrderViolation> for Error {
    fn from(e: LockOrderViolation) -> Self {
        Self::new(ErrorKind::LockOrderViolation)
            .with_message(e.to_string())
            .with_source(e)
    }
}

impl From<LockError> for Error {
    fn from(e: LockError) -> Self {
        match e {
            LockError::OrderViolation(violation) => violation.into(),
            LockError::TimedOut => Self::new(ErrorKind::LockTimeout),
        }
    }
}

impl From<TryLockError> for Error {
    fn from(e: TryLockError) -> Self {
        match e {
            TryLockError::OrderViolation(violation) => violation.into(),
            TryLockError::WouldBlock => Self::new(ErrorKind::WouldBlock),
        }
    }
}

impl<T> From<PushError<T>> for Error {
    fn from(e: PushError<T>) -> Self {
        match e {
            PushError::Full(_) => Self::new(ErrorKind::QueueFull),
            PushError::TimedOut(_) => Self::new(ErrorKind::QueueTimeout),
        }
    }
}

impl From<PopError> for Error {
    fn from(e: PopError) -> Self {
        match e {
            PopError::TimedOut => Self::new(ErrorKind::QueueTimeout),
        }
    }
}

impl<E> From<InitializationFailure<E>> for Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(e: InitializationFailure<E>) -> Self {
        let attempt = e.attempt();
        Self::new(ErrorKind::InitializationFailed)
            .with_message(format!("factory failed on attempt {attempt}"))
            .with_source(e.into_source())
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::new(ErrorKind::InvalidConfig)
            .with_message(e.to_string())
            .with_source(e)
    }
}

/// A specialized Result type for sync-core operations.
pub type Result<T> = core::result::Result<T, Error>;
