//! Storage provider abstraction for EDV.
//!
//! This crate defines two traits that every backend implements:
//!
//! - [`Store`]: the key-value surface of a single named namespace
//!   (`put`/`get`, overwrite-by-key, nothing else).
//! - [`Provider`]: a factory and registry of stores by name.
//!
//! Neither trait knows anything about vaults, documents, or uniqueness rules.
//! Those invariants live in `edv-core`, layered on top of
//! [`Provider::store_exists`] and [`Store::get`] so they hold identically for
//! every backend.
//!
//! Two implementations are provided:
//!
//! - [`MemoryProvider`]: process-local, no persistence
//! - [`CouchDbProvider`]: each named store is a CouchDB database (feature `couchdb-backend`)

#[cfg(feature = "couchdb-backend")]
mod couchdb;
mod error;
mod memory;

use std::sync::Arc;

#[cfg(feature = "couchdb-backend")]
pub use couchdb::{CouchDbConfig, CouchDbProvider, CouchDbStore};
pub use error::StorageError;
pub use memory::{MemoryProvider, MemoryStore};

/// A single namespace's key-value surface.
///
/// Values are opaque byte arrays. `put` overwrites any existing value for the
/// key; callers that need write-once semantics must check with
/// [`get`](Store::get) first.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Store a key-value pair, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::StoreClosed`] if the handle was released, or a
    /// backend error if the write fails.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Retrieve the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ValueNotFound`] if the key is absent, or a
    /// backend error if the read fails.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Factory and registry of [`Store`]s keyed by name.
#[async_trait::async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Open the store called `name`, provisioning it if it does not exist.
    ///
    /// Repeated calls with the same name return the same logical store.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the store cannot be provisioned.
    async fn open_store(&self, name: &str) -> Result<Arc<dyn Store>, StorageError>;

    /// Check whether the store called `name` is already provisioned.
    ///
    /// Must not provision anything and must be cheap: it runs before every
    /// vault and document operation.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the check itself fails.
    async fn store_exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Release this provider's handle to the store called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::StoreNotFound`] if `name` was never opened.
    async fn close_store(&self, name: &str) -> Result<(), StorageError>;

    /// Release every open store. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a backend error if teardown fails.
    async fn close(&self) -> Result<(), StorageError>;
}
