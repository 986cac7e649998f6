use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error};

use crate::error::CacheError;
use crate::models::snapshot::SessionSnapshot;

#[cfg(feature = "redis-store")]
pub mod redis_store;
pub mod reports;
pub mod rooms;
pub mod session;
pub mod store;

pub use reports::{ReportCache, ReportKey};
pub use session::RoomMatch;
pub use store::{BlobStore, FsStore, MemoryStore, Store};

const PLAN_PREFIX: &str = "plans";
const MAX_PLAN_ID_LEN: usize = 128;

/// Plan ids end up in storage keys, so only `[A-Za-z0-9_-]` is accepted.
pub fn validate_plan_id(plan_id: &str) -> Result<(), CacheError> {
    let ok = !plan_id.is_empty()
        && plan_id.len() <= MAX_PLAN_ID_LEN
        && plan_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(CacheError::InvalidPlanId(plan_id.to_string()))
    }
}

fn plan_key(plan_id: &str) -> String {
    format!("{}/{}.json", PLAN_PREFIX, plan_id)
}

/// One JSON snapshot per plan on top of a [`BlobStore`].
///
/// Writers to the same plan are serialized by a per-plan async mutex held
/// across load, modify and store. Readers take no lock; the store's atomic
/// `put` keeps them from seeing a half-written snapshot.
pub struct SessionCache<S> {
    store: S,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: BlobStore> SessionCache<S> {
    pub fn new(store: S) -> Self {
        Self { store, locks: Mutex::new(HashMap::new()) }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn lock_plan(&self, plan_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // an entry only the map still references has no holder or waiter
            locks.retain(|id, lock| id == plan_id || Arc::strong_count(lock) > 1);
            locks.entry(plan_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drops the lock entry of `plan_id` unless someone holds or awaits it.
    async fn forget_lock(&self, plan_id: &str) {
        let mut locks = self.locks.lock().await;
        if locks.get(plan_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(plan_id);
        }
    }

    async fn read_snapshot(&self, plan_id: &str) -> Result<Option<SessionSnapshot>, CacheError> {
        validate_plan_id(plan_id)?;
        let Some(bytes) = self.store.get(&plan_key(plan_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_slice::<SessionSnapshot>(&bytes) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(source) => {
                error!(plan_id, error = %source, "Corrupt session snapshot");
                Err(CacheError::Corruption { plan_id: plan_id.to_string(), source })
            }
        }
    }

    async fn write_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        self.store.put(&plan_key(&snapshot.metadata.plan_id), bytes).await?;
        debug!(
            plan_id = %snapshot.metadata.plan_id,
            rooms = snapshot.rooms.len(),
            "Snapshot written"
        );
        Ok(())
    }

    /// Ids of every stored plan, sorted.
    pub async fn list_plans(&self) -> Result<Vec<String>, CacheError> {
        let keys = self.store.list(PLAN_PREFIX).await?;
        Ok(keys
            .iter()
            .filter_map(|k| k.strip_prefix("plans/")?.strip_suffix(".json"))
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_plan_locks_are_dropped() {
        let cache = SessionCache::new(MemoryStore::new());
        for id in ["a", "b", "c"] {
            drop(cache.lock_plan(id).await);
        }
        let held = cache.lock_plan("d").await;
        assert_eq!(cache.locks.lock().await.len(), 1);

        drop(cache.lock_plan("e").await);
        // "d" is still held, so it stays
        assert!(cache.locks.lock().await.contains_key("d"));
        drop(held);

        cache.create_plan(Some("f")).await.unwrap();
        cache.delete_snapshot("f").await.unwrap();
        assert!(!cache.locks.lock().await.contains_key("f"));
    }

    #[test]
    fn plan_ids_are_restricted() {
        assert!(validate_plan_id("PLAN-2024_01").is_ok());
        assert!(validate_plan_id("").is_err());
        assert!(validate_plan_id("../x").is_err());
        assert!(validate_plan_id("a/b").is_err());
        assert!(validate_plan_id(&"x".repeat(129)).is_err());
    }
}
