//! Shared application state for the EDV server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`.

use std::sync::Arc;

use tracing::info;

use edv_core::vault::VaultCollection;
use edv_storage::{MemoryProvider, Provider, StorageError};

use crate::config::StorageBackendType;

/// Shared application state passed to all HTTP handlers.
#[derive(Debug)]
pub struct AppState {
    /// Vaults and documents over the configured provider.
    pub vaults: VaultCollection,
}

impl AppState {
    /// State serving vaults from `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            vaults: VaultCollection::new(provider),
        }
    }
}

/// Construct the storage provider selected by `backend`.
///
/// # Errors
///
/// Returns [`StorageError::InvalidConfig`] if the backend settings are
/// invalid or the backend was not compiled in.
pub fn build_provider(backend: &StorageBackendType) -> Result<Arc<dyn Provider>, StorageError> {
    match backend {
        StorageBackendType::Memory => {
            info!("using in-memory storage (data will not persist)");
            Ok(Arc::new(MemoryProvider::new()))
        }
        #[cfg(feature = "couchdb-backend")]
        StorageBackendType::CouchDb { url, timeout } => {
            info!(timeout_secs = timeout.as_secs(), "using CouchDB storage");
            let config =
                edv_storage::CouchDbConfig::new(url.clone()).with_request_timeout(*timeout);
            Ok(Arc::new(edv_storage::CouchDbProvider::new(&config)?))
        }
        #[cfg(not(feature = "couchdb-backend"))]
        StorageBackendType::CouchDb { .. } => Err(StorageError::InvalidConfig {
            reason: "CouchDB backend requested but feature 'couchdb-backend' is not enabled"
                .to_owned(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn memory_backend_builds_empty_provider() {
        let provider = build_provider(&StorageBackendType::Memory).unwrap();
        assert!(!provider.store_exists("vault-1").await.unwrap());
    }

    #[cfg(feature = "couchdb-backend")]
    #[test]
    fn couchdb_backend_rejects_invalid_url() {
        let backend = StorageBackendType::CouchDb {
            url: "not a url".to_owned(),
            timeout: Duration::from_secs(1),
        };
        assert!(matches!(
            build_provider(&backend),
            Err(StorageError::InvalidConfig { .. })
        ));
    }

    #[cfg(not(feature = "couchdb-backend"))]
    #[test]
    fn couchdb_backend_requires_feature() {
        let backend = StorageBackendType::CouchDb {
            url: "http://localhost:5984".to_owned(),
            timeout: Duration::from_secs(1),
        };
        assert!(build_provider(&backend).is_err());
    }
}
