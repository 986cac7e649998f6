use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::StoreError;

#[cfg(feature = "redis-store")]
use super::redis_store::RedisStore;

/// Keyed blob storage behind the caches. Keys are relative, `/`-separated
/// paths such as `plans/<id>.json`. A `put` is atomic: readers see either
/// the old value or the new one.
pub trait BlobStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send;

    fn put(&self, key: &str, value: Vec<u8>) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns whether something was removed.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Keys directly under `prefix`, sorted.
    fn list(&self, prefix: &str) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;
}

pub(crate) fn check_key(key: &str) -> Result<(), StoreError> {
    let path = Path::new(key);
    let plain = !key.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
    if plain {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// One file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> Result<PathBuf, StoreError> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

impl BlobStore for FsStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.path(key)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // write aside, then rename over the target
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, &value).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        match tokio::fs::remove_file(self.path(key)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = prefix.trim_end_matches('/');
        let mut entries = match tokio::fs::read_dir(self.path(dir)?).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else { continue };
            if name.ends_with(".tmp") {
                continue;
            }
            keys.push(format!("{}/{}", dir, name));
        }
        keys.sort();
        Ok(keys)
    }
}

/// Process-local store; used by tests and the `memory` backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        check_key(key)?;
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        check_key(key)?;
        self.blobs.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        check_key(key)?;
        Ok(self.blobs.write().await.remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        let blobs = self.blobs.read().await;
        let mut keys: Vec<String> = blobs
            .keys()
            .filter(|k| k.strip_prefix(&dir).is_some_and(|rest| !rest.contains('/')))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Backend picked from configuration at startup.
#[derive(Debug, Clone)]
pub enum Store {
    Fs(FsStore),
    Memory(MemoryStore),
    #[cfg(feature = "redis-store")]
    Redis(RedisStore),
}

impl Store {
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StoreError> {
        match config.backend {
            StorageBackend::Fs => Ok(Store::Fs(FsStore::new(&config.data_dir))),
            StorageBackend::Memory => Ok(Store::Memory(MemoryStore::new())),
            #[cfg(feature = "redis-store")]
            StorageBackend::Redis => {
                let store = RedisStore::connect(&config.redis_url, &config.key_prefix).await?;
                Ok(Store::Redis(store))
            }
            #[cfg(not(feature = "redis-store"))]
            StorageBackend::Redis => Err(StoreError::Backend(
                "built without the redis-store feature".to_string(),
            )),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Store::Fs(_) => "fs",
            Store::Memory(_) => "memory",
            #[cfg(feature = "redis-store")]
            Store::Redis(_) => "redis",
        }
    }
}

impl BlobStore for Store {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self {
            Store::Fs(s) => s.get(key).await,
            Store::Memory(s) => s.get(key).await,
            #[cfg(feature = "redis-store")]
            Store::Redis(s) => s.get(key).await,
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        match self {
            Store::Fs(s) => s.put(key, value).await,
            Store::Memory(s) => s.put(key, value).await,
            #[cfg(feature = "redis-store")]
            Store::Redis(s) => s.put(key, value).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        match self {
            Store::Fs(s) => s.delete(key).await,
            Store::Memory(s) => s.delete(key).await,
            #[cfg(feature = "redis-store")]
            Store::Redis(s) => s.delete(key).await,
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        match self {
            Store::Fs(s) => s.list(prefix).await,
            Store::Memory(s) => s.list(prefix).await,
            #[cfg(feature = "redis-store")]
            Store::Redis(s) => s.list(prefix).await,
        }
    }
}
