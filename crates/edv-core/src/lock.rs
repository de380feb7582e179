//! Per-vault mutual exclusion.
//!
//! The provider contract has no atomic create-if-absent or put-if-absent, so
//! the vault collection serializes its check-then-act sequences per vault
//! identifier with these locks. Operations on different vaults never contend.
//!
//! The locks are process-local. Two server processes sharing one remote
//! backend can still race on the same vault.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A table of async mutexes keyed by vault identifier.
///
/// Entries are created on demand and pruned once nobody holds or waits on
/// them, so the table stays proportional to the number of in-flight vaults.
#[derive(Debug, Default)]
pub(crate) struct VaultLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VaultLocks {
    /// Wait for exclusive access to `vault_id`. Released when the guard drops.
    pub(crate) async fn acquire(&self, vault_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().await;
            // Only the table holds a reference: no guard and no waiter.
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(table.entry(vault_id.to_owned()).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.table.lock().await.len()
    }
}
