use chrono::Utc;
use std::collections::BTreeMap;
use tracing::info;

use super::{validate_plan_id, BlobStore, SessionCache};
use crate::error::CacheError;
use crate::models::seat::Seat;
use crate::models::snapshot::{BatchEntry, RoomEntry};

impl<S: BlobStore> SessionCache<S> {
    /// Read-modify-write of one saved room under the plan lock. `edit` runs on
    /// the stored entry; when it fails nothing is written. Finalized plans can
    /// still be patched: walk-in students arrive after the plan is fixed.
    pub async fn patch_room<F, T, E>(
        &self,
        plan_id: &str,
        room_name: &str,
        edit: F,
    ) -> Result<T, E>
    where
        F: FnOnce(&mut RoomEntry) -> Result<T, E>,
        E: From<CacheError>,
    {
        validate_plan_id(plan_id)?;
        let _guard = self.lock_plan(plan_id).await;
        let mut snapshot = self
            .read_snapshot(plan_id)
            .await?
            .ok_or_else(|| CacheError::PlanNotFound(plan_id.to_string()))?;
        let entry = snapshot.rooms.get_mut(room_name).ok_or_else(|| CacheError::RoomNotFound {
            plan_id: plan_id.to_string(),
            room: room_name.to_string(),
        })?;

        let out = edit(entry)?;
        entry.refresh();

        snapshot.metadata.updated_at = Utc::now();
        snapshot.recount();
        self.write_snapshot(&snapshot).await?;
        info!(plan_id, room = room_name, "Room patched");
        Ok(out)
    }

    /// Unallocated, non-broken seats of a room in column-major order.
    pub async fn empty_seats(
        &self,
        plan_id: &str,
        room_name: &str,
    ) -> Result<Vec<Seat>, CacheError> {
        let entry = self.require_room(plan_id, room_name).await?;
        let mut seats: Vec<Seat> =
            entry.raw_matrix.into_iter().flatten().filter(Seat::is_unallocated).collect();
        seats.sort_by_key(|s| (s.col, s.row));
        Ok(seats)
    }

    /// Batches present in a room, keyed by label, externals included.
    pub async fn room_batches(
        &self,
        plan_id: &str,
        room_name: &str,
    ) -> Result<BTreeMap<String, BatchEntry>, CacheError> {
        Ok(self.require_room(plan_id, room_name).await?.batches)
    }

    async fn require_room(
        &self,
        plan_id: &str,
        room_name: &str,
    ) -> Result<RoomEntry, CacheError> {
        let snapshot = self
            .load_snapshot(plan_id)
            .await?
            .ok_or_else(|| CacheError::PlanNotFound(plan_id.to_string()))?;
        let mut rooms = snapshot.rooms;
        rooms.remove(room_name).ok_or_else(|| CacheError::RoomNotFound {
            plan_id: plan_id.to_string(),
            room: room_name.to_string(),
        })
    }
}
