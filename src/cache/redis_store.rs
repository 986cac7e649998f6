use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::fmt;

use super::store::{check_key, BlobStore};
use crate::error::StoreError;

#[derive(Clone)]
pub struct RedisClient {
    pub conn: MultiplexedConnection,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(RedisClient { conn })
    }
}

/// Blobs stored as plain string keys under a common prefix. Every write is
/// a single `SET`, so readers never see half a snapshot.
#[derive(Clone)]
pub struct RedisStore {
    redis: RedisClient,
    prefix: String,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").field("prefix", &self.prefix).finish_non_exhaustive()
    }
}

impl RedisStore {
    pub async fn connect(redis_url: &str, prefix: &str) -> Result<Self, StoreError> {
        let redis = RedisClient::new(redis_url).await?;
        Ok(Self { redis, prefix: prefix.to_string() })
    }

    fn key(&self, key: &str) -> Result<String, StoreError> {
        check_key(key)?;
        Ok(format!("{}{}", self.prefix, key))
    }
}

impl BlobStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.redis.conn.clone();
        let value: Option<Vec<u8>> = conn.get(self.key(key)?).await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut conn = self.redis.conn.clone();
        let _: () = conn.set(self.key(key)?, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.redis.conn.clone();
        let removed: usize = conn.del(self.key(key)?).await?;
        Ok(removed > 0)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        let mut conn = self.redis.conn.clone();
        // KEYS is fine for the handful of plans one deployment keeps
        let found: Vec<String> = conn.keys(format!("{}{}*", self.prefix, dir)).await?;
        let mut keys: Vec<String> = found
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .filter(|k| k.strip_prefix(&dir).is_some_and(|rest| !rest.contains('/')))
            .collect();
        keys.sort();
        Ok(keys)
    }
}
