//! In-memory storage provider.
//!
//! Every named store is a `HashMap` behind its own `RwLock`, and the registry
//! of stores sits behind a separate `RwLock` owned by the provider. Nothing is
//! persisted: all data is lost when the provider is dropped. Useful for
//! development and tests where a real backend is not wanted.
//!
//! Closing a store wipes its contents, so any handle still held by a caller
//! reads as empty afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::{Provider, StorageError, Store};

/// A single in-memory namespace.
///
/// Clones share the same underlying map, so a handle returned by
/// [`MemoryProvider::open_store`] observes every write made through any other
/// handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    async fn wipe(&self) {
        self.data.write().await.clear();
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let data = self.data.read().await;
        data.get(key)
            .cloned()
            .ok_or_else(|| StorageError::ValueNotFound {
                key: key.to_owned(),
            })
    }
}

/// A provider whose stores live in process memory.
///
/// The registry is owned by this instance alone. [`close`](Provider::close)
/// wipes every store and empties the registry; the provider can be used again
/// afterwards.
///
/// # Examples
///
/// ```
/// # use edv_storage::{MemoryProvider, Provider, Store};
/// # #[tokio::main]
/// # async fn main() {
/// let provider = MemoryProvider::new();
/// let store = provider.open_store("vault-1").await.unwrap();
/// store.put("doc-1", b"{}").await.unwrap();
/// assert!(provider.store_exists("vault-1").await.unwrap());
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryProvider {
    stores: RwLock<HashMap<String, MemoryStore>>,
}

impl MemoryProvider {
    /// Create a provider with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stores currently registered.
    pub async fn store_count(&self) -> usize {
        self.stores.read().await.len()
    }
}

#[async_trait::async_trait]
impl Provider for MemoryProvider {
    async fn open_store(&self, name: &str) -> Result<Arc<dyn Store>, StorageError> {
        let mut stores = self.stores.write().await;
        let store = stores
            .entry(name.to_owned())
            .or_insert_with(|| {
                debug!(store = %name, "provisioning in-memory store");
                MemoryStore::new()
            })
            .clone();
        Ok(Arc::new(store))
    }

    async fn store_exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.stores.read().await.contains_key(name))
    }

    /// Unregister `name` and wipe its data.
    ///
    /// This only takes the registry lock. A caller holding a handle, such as a
    /// document write already in flight, can still write into the detached map
    /// afterwards; that write is lost and a reopened store does not see it.
    async fn close_store(&self, name: &str) -> Result<(), StorageError> {
        let removed = self.stores.write().await.remove(name);
        let Some(store) = removed else {
            return Err(StorageError::StoreNotFound {
                name: name.to_owned(),
            });
        };

        store.wipe().await;
        debug!(store = %name, "closed in-memory store");
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        let drained: Vec<MemoryStore> = {
            let mut stores = self.stores.write().await;
            stores.drain().map(|(_, store)| store).collect()
        };

        for store in &drained {
            store.wipe().await;
        }
        debug!(closed = drained.len(), "closed in-memory provider");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_store_provisions_new_store() {
        let provider = MemoryProvider::new();
        assert!(!provider.store_exists("store1").await.unwrap());

        provider.open_store("store1").await.unwrap();
        assert!(provider.store_exists("store1").await.unwrap());
        assert_eq!(provider.store_count().await, 1);
    }

    #[tokio::test]
    async fn reopening_returns_same_logical_store() {
        let provider = MemoryProvider::new();
        let first = provider.open_store("store1").await.unwrap();
        first.put("key", b"value").await.unwrap();

        let second = provider.open_store("store1").await.unwrap();
        assert_eq!(second.get("key").await.unwrap(), b"value".to_vec());
        assert_eq!(provider.store_count().await, 1);
    }

    #[tokio::test]
    async fn store_exists_has_no_side_effects() {
        let provider = MemoryProvider::new();
        assert!(!provider.store_exists("store1").await.unwrap());
        assert!(!provider.store_exists("store1").await.unwrap());
        assert_eq!(provider.store_count().await, 0);
    }

    #[tokio::test]
    async fn get_missing_key_is_value_not_found() {
        let provider = MemoryProvider::new();
        let store = provider.open_store("store1").await.unwrap();

        let err = store.get("nope").await.unwrap_err();
        assert!(err.is_value_not_found());
    }

    #[tokio::test]
    async fn put_overwrites_existing() {
        let store = MemoryStore::new();
        store.put("key", b"v1").await.unwrap();
        store.put("key", b"v2").await.unwrap();
        assert_eq!(store.get("key").await.unwrap(), b"v2".to_vec());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn stores_are_isolated_by_name() {
        let provider = MemoryProvider::new();
        let a = provider.open_store("a").await.unwrap();
        let b = provider.open_store("b").await.unwrap();

        a.put("key", b"from-a").await.unwrap();
        assert!(b.get("key").await.unwrap_err().is_value_not_found());
    }

    #[tokio::test]
    async fn close_store_wipes_cached_handle() {
        let provider = MemoryProvider::new();
        let store = provider.open_store("store1").await.unwrap();
        store.put("something", b"value").await.unwrap();
        provider.open_store("store2").await.unwrap();

        provider.close_store("store1").await.unwrap();

        assert!(store.get("something").await.unwrap_err().is_value_not_found());
        assert!(!provider.store_exists("store1").await.unwrap());
        assert_eq!(provider.store_count().await, 1);
    }

    #[tokio::test]
    async fn reopen_after_close_store_is_empty() {
        let provider = MemoryProvider::new();
        let store = provider.open_store("store1").await.unwrap();
        store.put("doc", b"data").await.unwrap();

        provider.close_store("store1").await.unwrap();

        let reopened = provider.open_store("store1").await.unwrap();
        assert!(reopened.get("doc").await.unwrap_err().is_value_not_found());
    }

    #[tokio::test]
    async fn write_through_detached_handle_is_lost() {
        let provider = MemoryProvider::new();
        let stale = provider.open_store("store1").await.unwrap();

        provider.close_store("store1").await.unwrap();
        stale.put("late", b"value").await.unwrap();

        let reopened = provider.open_store("store1").await.unwrap();
        assert!(reopened.get("late").await.unwrap_err().is_value_not_found());
    }

    #[tokio::test]
    async fn close_store_unknown_name_is_store_not_found() {
        let provider = MemoryProvider::new();
        let err = provider.close_store("store1").await.unwrap_err();
        assert!(matches!(err, StorageError::StoreNotFound { name } if name == "store1"));
    }

    #[tokio::test]
    async fn close_empties_registry_and_wipes_stores() {
        let provider = MemoryProvider::new();
        let store1 = provider.open_store("store1").await.unwrap();
        store1.put("k", b"v").await.unwrap();
        provider.open_store("store2").await.unwrap();

        provider.close().await.unwrap();

        assert_eq!(provider.store_count().await, 0);
        assert!(store1.get("k").await.unwrap_err().is_value_not_found());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let provider = MemoryProvider::new();
        provider.close().await.unwrap();
        provider.close().await.unwrap();

        // Still usable afterwards.
        provider.open_store("store1").await.unwrap();
        assert!(provider.store_exists("store1").await.unwrap());
    }
}
