use chrono::Utc;
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use super::{plan_key, validate_plan_id, BlobStore, SessionCache};
use crate::error::CacheError;
use crate::models::plan::AllocationResult;
use crate::models::snapshot::{PlanStatus, RoomEntry, RoomInputs, SessionSnapshot};

/// Where a room with a given fingerprint was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMatch {
    pub plan_id: String,
    pub room_name: String,
}

fn check_room_name(room_name: &str) -> Result<(), CacheError> {
    if room_name.trim().is_empty() {
        return Err(CacheError::InvalidRoomName(room_name.to_string()));
    }
    Ok(())
}

impl<S: BlobStore> SessionCache<S> {
    /// Creates an empty plan. A fresh UUID is used when no id is given.
    pub async fn create_plan(&self, plan_id: Option<&str>) -> Result<String, CacheError> {
        let plan_id = match plan_id {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        validate_plan_id(&plan_id)?;

        let _guard = self.lock_plan(&plan_id).await;
        if self.read_snapshot(&plan_id).await?.is_none() {
            self.write_snapshot(&SessionSnapshot::new(plan_id.as_str())).await?;
            info!(plan_id = %plan_id, "Plan created");
        }
        Ok(plan_id)
    }

    pub async fn load_snapshot(
        &self,
        plan_id: &str,
    ) -> Result<Option<SessionSnapshot>, CacheError> {
        self.read_snapshot(plan_id).await
    }

    pub async fn load_room_entry(
        &self,
        plan_id: &str,
        room_name: &str,
    ) -> Result<Option<RoomEntry>, CacheError> {
        Ok(self.read_snapshot(plan_id).await?.and_then(|mut s| s.rooms.remove(room_name)))
    }

    /// Miss (no plan or no room) is `None`.
    pub async fn load_room(
        &self,
        plan_id: &str,
        room_name: &str,
    ) -> Result<Option<AllocationResult>, CacheError> {
        Ok(self.load_room_entry(plan_id, room_name).await?.map(|entry| entry.to_result()))
    }

    pub async fn save_room(
        &self,
        plan_id: &str,
        room_name: &str,
        result: &AllocationResult,
        inputs: RoomInputs,
    ) -> Result<bool, CacheError> {
        self.save_room_entry(plan_id, room_name, RoomEntry::from_result(result, inputs, None))
            .await
    }

    /// Creates or overwrites one room of a plan. Returns `false` when the plan
    /// already holds exactly this entry as its latest room; nothing is written
    /// then.
    pub async fn save_room_entry(
        &self,
        plan_id: &str,
        room_name: &str,
        entry: RoomEntry,
    ) -> Result<bool, CacheError> {
        validate_plan_id(plan_id)?;
        check_room_name(room_name)?;

        let _guard = self.lock_plan(plan_id).await;
        let mut snapshot =
            self.read_snapshot(plan_id).await?.unwrap_or_else(|| SessionSnapshot::new(plan_id));
        if snapshot.is_finalized() {
            return Err(CacheError::PlanFinalized(plan_id.to_string()));
        }

        let unchanged = snapshot.rooms.get(room_name) == Some(&entry)
            && snapshot.metadata.latest_room.as_deref() == Some(room_name);
        if unchanged {
            return Ok(false);
        }

        let students = entry.occupied_count();
        snapshot.rooms.insert(room_name.to_string(), entry);
        snapshot.metadata.latest_room = Some(room_name.to_string());
        snapshot.metadata.updated_at = Utc::now();
        snapshot.recount();
        self.write_snapshot(&snapshot).await?;

        info!(plan_id, room = room_name, students, "Room saved");
        Ok(true)
    }

    /// Copies one room from `source_plan_id` into `dest_plan_id`.
    pub async fn import_snapshot(
        &self,
        source_plan_id: &str,
        dest_plan_id: &str,
        room_name: &str,
    ) -> Result<(), CacheError> {
        let source = self
            .read_snapshot(source_plan_id)
            .await?
            .ok_or_else(|| CacheError::PlanNotFound(source_plan_id.to_string()))?;
        let entry = source.rooms.get(room_name).cloned().ok_or_else(|| CacheError::RoomNotFound {
            plan_id: source_plan_id.to_string(),
            room: room_name.to_string(),
        })?;

        if source_plan_id != dest_plan_id {
            self.save_room_entry(dest_plan_id, room_name, entry).await?;
            info!(
                source = source_plan_id,
                dest = dest_plan_id,
                room = room_name,
                "Room imported from another session"
            );
        }
        Ok(())
    }

    /// Scans the other plans for a room generated from the same request.
    /// Unreadable snapshots are skipped.
    pub async fn find_room(
        &self,
        fingerprint: &str,
        exclude_plan_id: &str,
    ) -> Result<Option<RoomMatch>, CacheError> {
        for plan_id in self.list_plans().await? {
            if plan_id == exclude_plan_id {
                continue;
            }
            let snapshot = match self.read_snapshot(&plan_id).await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => continue,
                Err(e) => {
                    warn!(plan_id = %plan_id, error = %e, "Skipping unreadable plan");
                    continue;
                }
            };
            let hit = snapshot
                .rooms
                .iter()
                .find(|(_, room)| room.fingerprint.as_deref() == Some(fingerprint));
            if let Some((room_name, _)) = hit {
                return Ok(Some(RoomMatch { plan_id, room_name: room_name.clone() }));
            }
        }
        Ok(None)
    }

    /// Drops every room not in `keep_rooms` (all kept when `None`) and marks
    /// the plan finalized. Finalizing twice changes nothing.
    pub async fn finalize(
        &self,
        plan_id: &str,
        keep_rooms: Option<&[String]>,
    ) -> Result<SessionSnapshot, CacheError> {
        let _guard = self.lock_plan(plan_id).await;
        let mut snapshot = self
            .read_snapshot(plan_id)
            .await?
            .ok_or_else(|| CacheError::PlanNotFound(plan_id.to_string()))?;
        if snapshot.is_finalized() {
            return Ok(snapshot);
        }

        if let Some(keep) = keep_rooms {
            let before = snapshot.rooms.len();
            snapshot.rooms.retain(|name, _| keep.iter().any(|k| k == name));
            if before != snapshot.rooms.len() {
                info!(plan_id, dropped = before - snapshot.rooms.len(), "Pruned rooms");
            }
        }
        snapshot.metadata.status = PlanStatus::Finalized;
        snapshot.metadata.updated_at = Utc::now();
        snapshot.recount();
        self.write_snapshot(&snapshot).await?;

        info!(plan_id, rooms = snapshot.rooms.len(), "Plan finalized");
        Ok(snapshot)
    }

    pub async fn delete_snapshot(&self, plan_id: &str) -> Result<bool, CacheError> {
        validate_plan_id(plan_id)?;
        let guard = self.lock_plan(plan_id).await;
        let removed = self.store().delete(&plan_key(plan_id)).await?;
        drop(guard);
        self.forget_lock(plan_id).await;
        if removed {
            info!(plan_id, "Plan deleted");
        }
        Ok(removed)
    }

    /// Roll number -> room for every seated student of the plan, skipping
    /// `except_room`. Feeds the cross-room duplicate check.
    pub async fn occupied_rolls(
        &self,
        plan_id: &str,
        except_room: &str,
    ) -> Result<HashMap<String, String>, CacheError> {
        let Some(snapshot) = self.read_snapshot(plan_id).await? else {
            return Ok(HashMap::new());
        };
        let mut rolls = HashMap::new();
        for (room_name, room) in snapshot.rooms.iter().filter(|(name, _)| *name != except_room) {
            for seat in room.raw_matrix.iter().flatten() {
                if let Some(roll) = seat.roll_number() {
                    rolls.entry(roll.to_string()).or_insert_with(|| room_name.clone());
                }
            }
        }
        Ok(rolls)
    }
}
