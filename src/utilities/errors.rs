//! Shared low-level error types for the KVS and storage layers.

use thiserror::Error;

/// Errors surfaced by a [`crate::kvs::Kvs`] backend.
#[derive(Debug, Error)]
pub enum KvsError {
    /// A transient transport error (connection reset, timeout). Callers may
    /// retry these with backoff.
    #[error("KVS transport error: {message}")]
    Transport { message: String },

    /// A non-retryable error: malformed key, serialization failure, or a
    /// backend-reported type mismatch (e.g. `LPUSH` against a string key).
    #[error("KVS operation error: {message}")]
    Operation { message: String },

    /// Value stored under a key failed to deserialize into the expected
    /// shape.
    #[error("KVS deserialization error for key `{key}`: {message}")]
    Deserialize { key: String, message: String },
}

impl KvsError {
    /// Whether this error is worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KvsError::Transport { .. })
    }
}
