//! seating.rs
//!
//! Service layer that drives one room through the allocation pipeline and
//! records it in the planning session.
//!
//! Order of lookups for `generate_room`:
//! 1.  **Same plan**: the room is already saved with an identical request
//!     fingerprint. The stored grid is returned with its checks rerun against
//!     the plan's other rooms.
//! 2.  **Other plan**: another session generated the same request. The room is
//!     copied over and its checks are rerun against the rolls of this plan.
//! 3.  **Fresh run**: `seating::plan_room` builds the grid, which is then saved.
//!
//! Requests that shuffle without a fixed seed have no fingerprint and always
//! take the fresh path.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

use super::revalidate;
use crate::error::{CacheError, ServiceError};
use crate::models::plan::{AllocationResult, GenerationRequest, GenerationResponse};
use crate::models::snapshot::{RoomEntry, RoomInputs};
use crate::seating;
use crate::AppState;

/// How the returned grid was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultSource {
    Generated,
    Cached,
    Imported { from_plan: String },
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub plan_id: String,
    pub room_name: String,
    pub result: AllocationResult,
    pub source: ResultSource,
    /// `false` when the snapshot already held this exact room.
    pub written: bool,
}

impl GenerationOutcome {
    pub fn response(&self) -> GenerationResponse {
        GenerationResponse::from(&self.result)
    }
}

/// Hex SHA-256 of the request, or `None` when the outcome is not reproducible.
pub fn fingerprint(request: &GenerationRequest) -> Result<Option<String>, CacheError> {
    if request.randomize_within_column && request.shuffle_seed.is_none() {
        return Ok(None);
    }
    let bytes = serde_json::to_vec(request)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(Some(format!("{:x}", hasher.finalize())))
}

pub struct SeatingService {
    state: Arc<AppState>,
}

impl SeatingService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Fills gaps in the request from `allocation` config.
    fn with_defaults(&self, mut request: GenerationRequest) -> GenerationRequest {
        let defaults = &self.state.config.allocation;
        if request.block_width.is_none()
            && request.block_structure.as_ref().map_or(true, |s| s.is_empty())
        {
            request.block_width = Some(defaults.default_block_width);
        }
        request.allow_adjacent_same_batch |= defaults.allow_adjacent_same_batch;
        request
    }

    pub async fn generate_room(
        &self,
        plan_id: &str,
        room_name: &str,
        request: GenerationRequest,
    ) -> Result<GenerationOutcome, ServiceError> {
        let cache = &self.state.cache;
        let request = self.with_defaults(request);
        let fingerprint = fingerprint(&request)?;

        if let Some(fp) = fingerprint.as_deref() {
            if let Some(mut entry) = cache.load_room_entry(plan_id, room_name).await? {
                if entry.fingerprint.as_deref() == Some(fp) {
                    debug!(plan_id, room = room_name, "Room already generated from this request");
                    // other rooms may have changed since this one was saved
                    let others = cache.occupied_rolls(plan_id, room_name).await?;
                    let before = entry.constraints.clone();
                    revalidate(&mut entry, &others)?;
                    let written = entry.constraints != before;
                    if written {
                        let constraints = entry.constraints.clone();
                        cache
                            .patch_room(plan_id, room_name, |stored| {
                                stored.constraints = constraints;
                                Ok::<_, CacheError>(())
                            })
                            .await?;
                        info!(plan_id, room = room_name, "Checks refreshed for cached room");
                    }
                    return Ok(GenerationOutcome {
                        plan_id: plan_id.to_string(),
                        room_name: room_name.to_string(),
                        result: entry.to_result(),
                        source: ResultSource::Cached,
                        written,
                    });
                }
            }

            if let Some(hit) = cache.find_room(fp, plan_id).await? {
                if let Some(mut entry) = cache.load_room_entry(&hit.plan_id, &hit.room_name).await? {
                    let others = cache.occupied_rolls(plan_id, room_name).await?;
                    revalidate(&mut entry, &others)?;
                    let result = entry.to_result();
                    let written = cache.save_room_entry(plan_id, room_name, entry).await?;
                    info!(
                        plan_id,
                        room = room_name,
                        source_plan = %hit.plan_id,
                        "Reused room from another session"
                    );
                    return Ok(GenerationOutcome {
                        plan_id: plan_id.to_string(),
                        room_name: room_name.to_string(),
                        result,
                        source: ResultSource::Imported { from_plan: hit.plan_id },
                        written,
                    });
                }
            }
        }

        let others = cache.occupied_rolls(plan_id, room_name).await?;
        let result = seating::plan_room(&request, &others)?;
        let entry = RoomEntry::from_result(&result, RoomInputs::from_request(&request), fingerprint);
        let written = cache.save_room_entry(plan_id, room_name, entry).await?;

        let validation = result.validation();
        info!(
            plan_id,
            room = room_name,
            students = result.summary.total_allocated_students,
            valid = validation.is_valid,
            "Room generated"
        );
        Ok(GenerationOutcome {
            plan_id: plan_id.to_string(),
            room_name: room_name.to_string(),
            result,
            source: ResultSource::Generated,
            written,
        })
    }

    /// Copies a room between plans and reruns its checks in the new plan.
    pub async fn import_room(
        &self,
        source_plan_id: &str,
        dest_plan_id: &str,
        room_name: &str,
    ) -> Result<AllocationResult, ServiceError> {
        let cache = &self.state.cache;
        cache.import_snapshot(source_plan_id, dest_plan_id, room_name).await?;
        let others = cache.occupied_rolls(dest_plan_id, room_name).await?;
        let result = cache
            .patch_room(dest_plan_id, room_name, |entry| {
                revalidate(entry, &others)?;
                Ok::<_, ServiceError>(entry.to_result())
            })
            .await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn unseeded_shuffle_has_no_fingerprint() {
        let mut request = GenerationRequest::new(4, 4, 2);
        assert!(fingerprint(&request).unwrap().is_some());

        request.randomize_within_column = true;
        assert_eq!(fingerprint(&request).unwrap(), None);

        request.shuffle_seed = Some(7);
        assert_eq!(fingerprint(&request).unwrap().map(|f| f.len()), Some(64));
    }

    #[test]
    fn fingerprint_tracks_the_request() {
        let a = GenerationRequest::new(4, 4, 2).with_count(1, 5);
        let b = GenerationRequest::new(4, 4, 2).with_count(1, 6);
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&a.clone()).unwrap());
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn config_block_width_fills_missing_layout() {
        let mut config = Config::in_memory();
        config.allocation.default_block_width = 3;
        let state = AppState::with_store(config, crate::cache::Store::Memory(Default::default()));
        let service = SeatingService::new(state);

        let filled = service.with_defaults(GenerationRequest::new(2, 6, 2));
        assert_eq!(filled.block_width, Some(3));

        let mut explicit = GenerationRequest::new(2, 6, 2);
        explicit.block_structure = Some(vec![2, 4]);
        assert_eq!(service.with_defaults(explicit).block_width, None);
    }
}
