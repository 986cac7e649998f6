use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::debug;

use super::BlobStore;
use crate::error::CacheError;
use crate::models::seat::Seat;
use crate::models::snapshot::{RoomEntry, RoomInputs};

/// Hex SHA-256 identifying one rendered report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportKey(String);

#[derive(Serialize)]
struct KeyMaterial<'a> {
    inputs: &'a RoomInputs,
    seating: &'a [Vec<Seat>],
    template_id: &'a str,
}

impl ReportKey {
    /// Hashes the room geometry, the seated grid (which carries the rosters)
    /// and the template. Any seat change yields a new key.
    pub fn new(
        inputs: &RoomInputs,
        seating: &[Vec<Seat>],
        template_id: &str,
    ) -> Result<Self, CacheError> {
        let material = serde_json::to_vec(&KeyMaterial { inputs, seating, template_id })?;
        let mut hasher = Sha256::new();
        hasher.update(&material);
        Ok(ReportKey(format!("{:x}", hasher.finalize())))
    }

    pub fn for_room(entry: &RoomEntry, template_id: &str) -> Result<Self, CacheError> {
        Self::new(&entry.inputs, &entry.raw_matrix, template_id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn storage_key(&self) -> String {
        format!("reports/{}.bin", self.0)
    }
}

impl fmt::Display for ReportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rendered artifacts (PDF bytes and the like) keyed by content hash.
pub struct ReportCache<S> {
    store: S,
}

impl<S: BlobStore> ReportCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn get(&self, key: &ReportKey) -> Result<Option<Vec<u8>>, CacheError> {
        let hit = self.store.get(&key.storage_key()).await?;
        debug!(key = %key, hit = hit.is_some(), "Report cache lookup");
        Ok(hit)
    }

    pub async fn put(&self, key: &ReportKey, bytes: Vec<u8>) -> Result<(), CacheError> {
        let size = bytes.len();
        self.store.put(&key.storage_key(), bytes).await?;
        debug!(key = %key, size, "Report cached");
        Ok(())
    }
}
