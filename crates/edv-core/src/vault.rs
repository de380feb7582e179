//! Vault collection: the business rules layered over a storage provider.
//!
//! A vault is one named store. The provider will happily create stores on
//! open and overwrite keys on put; this layer is what makes vault creation
//! explicit and documents write-once:
//!
//! - a vault must be created before it can be used, and only once;
//! - a document id can be written once per vault, never overwritten.
//!
//! Both rules are check-then-act sequences over [`Provider::store_exists`] and
//! [`Store::get`]. They are serialized per vault identifier (see
//! `crate::lock`) so concurrent callers cannot both pass the check.

use std::sync::Arc;

use edv_storage::{Provider, StorageError, Store};
use tracing::{debug, info, warn};

use crate::document::StructuredDocument;
use crate::error::VaultError;
use crate::lock::VaultLocks;

/// Vaults and their documents on top of a bound [`Provider`].
pub struct VaultCollection {
    provider: Arc<dyn Provider>,
    locks: VaultLocks,
}

impl std::fmt::Debug for VaultCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultCollection").finish_non_exhaustive()
    }
}

impl VaultCollection {
    /// Bind a collection to `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            locks: VaultLocks::default(),
        }
    }

    /// The provider backing this collection.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Create the vault `vault_id`.
    ///
    /// This is the only way a vault comes into existence.
    ///
    /// # Errors
    ///
    /// - [`VaultError::DuplicateVault`] if the vault already exists.
    /// - [`VaultError::InvalidRequest`] if `vault_id` is empty.
    /// - [`VaultError::Storage`] if the provider fails.
    pub async fn create_vault(&self, vault_id: &str) -> Result<(), VaultError> {
        require_id("vault id", vault_id)?;
        let _guard = self.locks.acquire(vault_id).await;

        if self.provider.store_exists(vault_id).await? {
            warn!(vault_id, "rejected duplicate vault");
            return Err(VaultError::DuplicateVault {
                vault_id: vault_id.to_owned(),
            });
        }

        self.provider.open_store(vault_id).await?;
        info!(vault_id, "vault created");
        Ok(())
    }

    /// Store `document` in the vault `vault_id`, keyed by its `id`.
    ///
    /// # Errors
    ///
    /// - [`VaultError::VaultNotFound`] if the vault was never created.
    /// - [`VaultError::DuplicateDocument`] if the id is already taken in this vault.
    /// - [`VaultError::InvalidRequest`] if an identifier is empty.
    /// - [`VaultError::Storage`] if the provider or store fails.
    pub async fn store_document(
        &self,
        vault_id: &str,
        document: &StructuredDocument,
    ) -> Result<(), VaultError> {
        require_id("vault id", vault_id)?;
        require_id("document id", &document.id)?;
        let _guard = self.locks.acquire(vault_id).await;

        let vault = self.open_existing(vault_id).await?;

        match vault.get(&document.id).await {
            Ok(_) => {
                warn!(vault_id, document_id = %document.id, "rejected duplicate document");
                return Err(VaultError::DuplicateDocument {
                    vault_id: vault_id.to_owned(),
                    document_id: document.id.clone(),
                });
            }
            Err(StorageError::ValueNotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let bytes = serde_json::to_vec(document).map_err(|e| VaultError::InvalidRequest {
            reason: format!("document could not be serialized: {e}"),
        })?;
        vault.put(&document.id, &bytes).await?;

        debug!(vault_id, document_id = %document.id, bytes = bytes.len(), "document stored");
        Ok(())
    }

    /// Retrieve the serialized document `document_id` from the vault `vault_id`.
    ///
    /// # Errors
    ///
    /// - [`VaultError::VaultNotFound`] if the vault was never created.
    /// - [`VaultError::DocumentNotFound`] if the vault has no such document.
    /// - [`VaultError::InvalidRequest`] if an identifier is empty.
    /// - [`VaultError::Storage`] if the provider or store fails.
    pub async fn retrieve_document(
        &self,
        vault_id: &str,
        document_id: &str,
    ) -> Result<Vec<u8>, VaultError> {
        require_id("vault id", vault_id)?;
        require_id("document id", document_id)?;

        let vault = self.open_existing(vault_id).await?;

        match vault.get(document_id).await {
            Ok(bytes) => {
                debug!(vault_id, document_id, bytes = bytes.len(), "document retrieved");
                Ok(bytes)
            }
            Err(StorageError::ValueNotFound { .. }) => Err(VaultError::DocumentNotFound {
                vault_id: vault_id.to_owned(),
                document_id: document_id.to_owned(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Release every store held by the provider.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Storage`] if the provider fails to close.
    pub async fn close(&self) -> Result<(), VaultError> {
        self.provider.close().await?;
        info!("vault collection closed");
        Ok(())
    }

    async fn open_existing(&self, vault_id: &str) -> Result<Arc<dyn Store>, VaultError> {
        if !self.provider.store_exists(vault_id).await? {
            return Err(VaultError::VaultNotFound {
                vault_id: vault_id.to_owned(),
            });
        }
        Ok(self.provider.open_store(vault_id).await?)
    }
}

fn require_id(what: &str, id: &str) -> Result<(), VaultError> {
    if id.is_empty() {
        return Err(VaultError::InvalidRequest {
            reason: format!("{what} must not be empty"),
        });
    }
    Ok(())
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod couchdb_tests {
    use edv_storage::{CouchDbConfig, CouchDbProvider};
    use mockito::{Matcher, Server};
    use serde_json::{Map, Value, json};

    use super::*;

    const MISSING: &str = r#"{"error":"not_found","reason":"missing"}"#;

    fn hello() -> StructuredDocument {
        let mut content = Map::new();
        content.insert("message".to_owned(), json!("hello"));
        StructuredDocument::new("doc-1", content)
    }

    #[tokio::test]
    async fn document_lifecycle_over_couchdb() {
        let mut server = Server::new_async().await;
        let provider = CouchDbProvider::new(&CouchDbConfig::new(server.url())).unwrap();
        let vaults = VaultCollection::new(Arc::new(provider));

        server
            .mock("HEAD", "/vault-1")
            .with_status(404)
            .create_async()
            .await;
        let create = server
            .mock("PUT", "/vault-1")
            .with_status(201)
            .with_body(r#"{"ok":true}"#)
            .expect(1)
            .create_async()
            .await;
        vaults.create_vault("vault-1").await.unwrap();
        create.assert_async().await;

        let absent = server
            .mock("GET", "/vault-1/doc-1")
            .with_status(404)
            .with_body(MISSING)
            .create_async()
            .await;
        let write = server
            .mock("PUT", "/vault-1/doc-1")
            .match_body(Matcher::PartialJson(json!({
                "id": "doc-1",
                "content": {"message": "hello"}
            })))
            .with_status(201)
            .with_body(r#"{"ok":true,"id":"doc-1","rev":"1-abc"}"#)
            .expect(1)
            .create_async()
            .await;
        vaults.store_document("vault-1", &hello()).await.unwrap();
        absent.remove_async().await;

        server
            .mock("GET", "/vault-1/doc-1")
            .with_status(200)
            .with_body(
                r#"{"_id":"doc-1","_rev":"1-abc","id":"doc-1","meta":{},"content":{"message":"hello"}}"#,
            )
            .create_async()
            .await;
        server
            .mock("GET", "/vault-1/doc-2")
            .with_status(404)
            .with_body(MISSING)
            .create_async()
            .await;

        let bytes = vaults.retrieve_document("vault-1", "doc-1").await.unwrap();
        let stored: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(stored, serde_json::to_value(hello()).unwrap());

        let err = vaults.retrieve_document("vault-1", "doc-2").await.unwrap_err();
        assert!(matches!(
            err,
            VaultError::DocumentNotFound { document_id, .. } if document_id == "doc-2"
        ));

        let mut world = hello();
        world.content.insert("message".to_owned(), json!("world"));
        let err = vaults.store_document("vault-1", &world).await.unwrap_err();
        assert!(matches!(err, VaultError::DuplicateDocument { .. }));
        write.assert_async().await;

        let bytes = vaults.retrieve_document("vault-1", "doc-1").await.unwrap();
        let stored: StructuredDocument = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(stored.content["message"], "hello");

        let err = vaults.create_vault("vault-1").await.unwrap_err();
        assert!(matches!(err, VaultError::DuplicateVault { .. }));
    }

    #[tokio::test]
    async fn dot_identifiers_behave_like_any_other_over_couchdb() {
        let mut server = Server::new_async().await;
        let provider = CouchDbProvider::new(&CouchDbConfig::new(server.url())).unwrap();
        let vaults = VaultCollection::new(Arc::new(provider));

        server
            .mock("HEAD", Matcher::Regex(r"^/h(\$|%24)2e2e$".to_owned()))
            .with_status(404)
            .create_async()
            .await;
        let database = server
            .mock("PUT", Matcher::Regex(r"^/h(\$|%24)2e2e$".to_owned()))
            .with_status(201)
            .with_body(r#"{"ok":true}"#)
            .expect(1)
            .create_async()
            .await;
        vaults.create_vault("..").await.unwrap();
        database.assert_async().await;

        server
            .mock("PUT", "/vault-1")
            .with_status(201)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;
        server
            .mock("HEAD", "/vault-1")
            .with_status(404)
            .create_async()
            .await;
        vaults.create_vault("vault-1").await.unwrap();

        server
            .mock("GET", "/vault-1/~..")
            .with_status(404)
            .with_body(MISSING)
            .create_async()
            .await;
        let err = vaults.retrieve_document("vault-1", "..").await.unwrap_err();
        assert!(matches!(err, VaultError::DocumentNotFound { .. }));

        server
            .mock("GET", "/vault-1/~_all_docs")
            .with_status(404)
            .with_body(MISSING)
            .create_async()
            .await;
        let err = vaults.retrieve_document("vault-1", "_all_docs").await.unwrap_err();
        assert!(matches!(err, VaultError::DocumentNotFound { .. }));
    }
}
