//! Key-value store error types.

/// Errors that can occur when talking to the backing key-value store.
///
/// Transient infrastructure faults (`Unavailable`, `Timeout`) are never
/// surfaced to HTTP clients; callers convert them into a fail-open or
/// fail-closed default per operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store is unreachable (connection refused, pool exhausted, DNS...).
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of the connectivity failure.
        message: String,
    },

    /// A store call exceeded its bounded timeout.
    ///
    /// Treated identically to [`StoreError::Unavailable`] by callers.
    #[error("Store operation timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// The store returned an error for an otherwise reachable backend.
    #[error("Store backend error: {message}")]
    Backend {
        /// Description of the backend error.
        message: String,
    },

    /// A cached value could not be decoded into its expected shape.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the encode/decode failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Backend` error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns `true` if the store itself could not be reached in time.
    ///
    /// These are the errors that trigger fail-open paths.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            Self::unavailable(err.to_string())
        } else {
            Self::backend(err.to_string())
        }
    }
}

/// Type alias for store operation results.
pub type StoreResult<T> = Result<T, StoreError>;
