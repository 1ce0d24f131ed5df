//! Configuration for [`BlockingQueue`](crate::BlockingQueue).
//!
//! | Option | Default | Env var | Description |
//! |--------|---------|---------|-------------|
//! | `capacity` | 0 (unbounded) | `SYNC_CORE_QUEUE_CAPACITY` | Maximum queued elements |
//! | `name` | none | `SYNC_CORE_QUEUE_NAME` | Label attached to log events |
//!
//! ```ignore
//! let config = QueueConfig::bounded(64).name("ingest");
//! let queue: BlockingQueue<Job> = BlockingQueue::with_config(&config)?;
//! ```

use serde::{Deserialize, Serialize};

/// Environment variable holding the queue capacity.
pub const CAPACITY_ENV: &str = "SYNC_CORE_QUEUE_CAPACITY";
/// Environment variable holding the queue name.
pub const NAME_ENV: &str = "SYNC_CORE_QUEUE_NAME";

/// Errors produced while building or validating a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The capacity value could not be parsed.
    #[error("invalid queue capacity {value:?}")]
    InvalidCapacity {
        /// The rejected raw value.
        value: String,
    },
    /// The queue name was empty or whitespace.
    #[error("queue name must not be empty")]
    InvalidName,
}

/// Queue configuration.
///
/// A capacity of `0` means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of queued elements, `0` for unbounded.
    pub capacity: usize,
    /// Optional label used in log events.
    pub name: Option<String>,
}

impl QueueConfig {
    /// Configuration for an unbounded queue.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            capacity: 0,
            name: None,
        }
    }

    /// Configuration for a queue holding at most `capacity` elements.
    #[must_use]
    pub const fn bounded(capacity: usize) -> Self {
        Self {
            capacity,
            name: None,
        }
    }

    /// Sets the capacity (`0` for unbounded).
    #[must_use]
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the queue name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the capacity limit, or `None` when unbounded.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        if self.capacity == 0 {
            None
        } else {
            Some(self.capacity)
        }
    }

    /// Checks that every field holds a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.name {
            Some(name) if name.trim().is_empty() => Err(ConfigError::InvalidName),
            _ => Ok(()),
        }
    }

    /// Builds a configuration from `SYNC_CORE_QUEUE_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(CAPACITY_ENV) {
            config.capacity = raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidCapacity { value: raw })?;
        }
        if let Some(name) = lookup(NAME_ENV) {
            config.name = Some(name);
        }
        config.validate()?;
        Ok(config)
    }
}
