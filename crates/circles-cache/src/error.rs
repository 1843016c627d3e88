//! Cache error types.
//!
//! A miss is a regular variant of [`CacheError`] so callers can tell it
//! apart from transport and decoding failures without inspecting messages.

/// Error returned by caller-supplied loader functions.
pub type LoaderError = Box<dyn std::error::Error + Send + Sync>;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while talking to the cache or loading through it.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The key is not present in the store.
    #[error("cache miss: {key}")]
    Miss {
        /// The key that was looked up.
        key: String,
    },

    /// The store could not be reached or rejected the command.
    #[error("cache transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// A value could not be encoded or decoded.
    #[error("cache serialization error for {key}: {source}")]
    Serialization {
        /// The key whose value failed to (de)serialize.
        key: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// The loader for a key failed to fetch from the system of record.
    #[error("loader failed for {key}: {source}")]
    Loader {
        /// The key being loaded.
        key: String,
        /// Error reported by the loader.
        #[source]
        source: LoaderError,
    },

    /// A freshly loaded value could not be written back to the store.
    #[error("cache write failed for {key}: {source}")]
    Write {
        /// The key being written.
        key: String,
        /// The store error that caused the write to fail.
        #[source]
        source: Box<CacheError>,
    },

    /// Work was stopped because its cancellation token fired.
    #[error("cache operation cancelled")]
    Cancelled,

    /// The cache could not be configured.
    #[error("cache configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },
}

impl CacheError {
    /// Creates a new `Miss` error.
    #[must_use]
    pub fn miss(key: impl Into<String>) -> Self {
        Self::Miss { key: key.into() }
    }

    /// Creates a new `Transport` error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            key: key.into(),
            source,
        }
    }

    /// Creates a new `Loader` error.
    #[must_use]
    pub fn loader(key: impl Into<String>, source: LoaderError) -> Self {
        Self::Loader {
            key: key.into(),
            source,
        }
    }

    /// Wraps a store error as a `Write` error.
    #[must_use]
    pub fn write(key: impl Into<String>, source: CacheError) -> Self {
        Self::Write {
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Creates a new `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a cache miss.
    #[must_use]
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss { .. })
    }

    /// Returns `true` if the operation was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> CacheErrorCategory {
        match self {
            Self::Miss { .. } => CacheErrorCategory::Miss,
            Self::Transport { .. } | Self::Serialization { .. } => CacheErrorCategory::Transport,
            Self::Loader { .. } => CacheErrorCategory::Loader,
            Self::Write { .. } => CacheErrorCategory::Write,
            Self::Cancelled => CacheErrorCategory::Cancelled,
            Self::Config { .. } => CacheErrorCategory::Config,
        }
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::transport(err.to_string())
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::transport(format!("failed to get Redis connection: {err}"))
    }
}

/// Error categories for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheErrorCategory {
    /// Key absent; expected on the read path.
    Miss,
    /// Network, protocol or encoding failure against the store.
    Transport,
    /// System-of-record failure.
    Loader,
    /// Write-back failure after a successful load.
    Write,
    /// Cancellation.
    Cancelled,
    /// Bad configuration.
    Config,
}

impl std::fmt::Display for CacheErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Miss => "miss",
            Self::Transport => "transport",
            Self::Loader => "loader",
            Self::Write => "write",
            Self::Cancelled => "cancelled",
            Self::Config => "config",
        };
        f.write_str(s)
    }
}
