//! Storage error types.
//!
//! Every error variant carries enough context to diagnose the problem
//! without a debugger. Not-found conditions are first-class variants so that
//! callers can match on them identically whichever backend produced them.

/// Errors that can occur during provider and store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The key is absent from the store.
    #[error("value not found for key '{key}'")]
    ValueNotFound { key: String },

    /// The named store was never opened through this provider.
    #[error("store '{name}' not found")]
    StoreNotFound { name: String },

    /// The store handle was released by `close_store` or `close`.
    #[error("store '{name}' has been closed")]
    StoreClosed { name: String },

    /// The provider could not be constructed from the given settings.
    #[error("invalid storage configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The backend cannot represent the given value.
    #[error("invalid value for key '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// A backend call did not complete within its deadline.
    #[error("storage operation '{operation}' timed out")]
    Timeout { operation: String },

    /// Unclassified I/O or connectivity failure from the backend.
    #[error("storage operation '{operation}' failed: {reason}")]
    Backend { operation: String, reason: String },
}

impl StorageError {
    /// Whether this error means "the key does not exist".
    pub fn is_value_not_found(&self) -> bool {
        matches!(self, Self::ValueNotFound { .. })
    }
}
