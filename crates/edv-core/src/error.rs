//! Error types for `edv-core`.
//!
//! Each error variant carries enough context to diagnose the problem without
//! a debugger. Storage errors with no domain meaning (connectivity, timeouts)
//! pass through unchanged in [`VaultError::Storage`].

use edv_storage::StorageError;

/// Errors from vault and document operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// No vault has been created under this identifier.
    #[error("specified vault does not exist: {vault_id}")]
    VaultNotFound { vault_id: String },

    /// The vault exists but holds no document with this identifier.
    #[error("specified document does not exist: {document_id} in vault {vault_id}")]
    DocumentNotFound {
        vault_id: String,
        document_id: String,
    },

    /// A vault with this identifier was already created.
    #[error("vault already exists: {vault_id}")]
    DuplicateVault { vault_id: String },

    /// A document with this identifier was already stored in the vault.
    #[error("a document with the given id already exists: {document_id} in vault {vault_id}")]
    DuplicateDocument {
        vault_id: String,
        document_id: String,
    },

    /// The request cannot be served as given (empty identifier, unserializable document).
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The storage provider returned an error with no more specific meaning.
    #[error("vault storage error: {0}")]
    Storage(#[from] StorageError),
}
