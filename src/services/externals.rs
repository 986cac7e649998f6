use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::revalidate;
use crate::error::{AllocationError, ServiceError};
use crate::models::seat::{Occupant, PaperSet, Seat, SeatState};
use crate::models::snapshot::RoomEntry;
use crate::seating::paper_set::paper_set_for;
use crate::AppState;

pub const EXTERNAL_COLOR: &str = "#3b82f6";

fn default_color() -> String {
    EXTERNAL_COLOR.to_string()
}

/// Walk-in student placed by hand on an empty seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ExternalStudent {
    #[validate(length(min = 1, max = 64))]
    pub roll_number: String,
    #[serde(default)]
    pub student_name: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub batch_label: String,
    #[serde(default = "default_color")]
    pub color: String,
    /// Derived from the seat position when left out.
    #[serde(default)]
    pub paper_set: Option<PaperSet>,
}

impl ExternalStudent {
    pub fn new(roll_number: impl Into<String>, batch_label: impl Into<String>) -> Self {
        Self {
            roll_number: roll_number.into(),
            student_name: None,
            batch_label: batch_label.into(),
            color: default_color(),
            paper_set: None,
        }
    }
}

/// External occupant together with the room it sits in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedExternal {
    pub room_name: String,
    pub seat: Seat,
}

fn seat_mut<'a>(
    entry: &'a mut RoomEntry,
    room_name: &str,
    row: usize,
    col: usize,
) -> Result<&'a mut Seat, ServiceError> {
    let (rows, cols) = (entry.inputs.rows, entry.inputs.cols);
    entry.raw_matrix.get_mut(row).and_then(|r| r.get_mut(col)).ok_or_else(|| {
        ServiceError::SeatOutOfRange { room: room_name.to_string(), row, col, rows, cols }
    })
}

pub struct ExternalStudentService {
    state: Arc<AppState>,
}

impl ExternalStudentService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Seats `student` on an empty seat of a saved room. Works on finalized
    /// plans too. The roll number must be new to the whole plan.
    pub async fn add_external(
        &self,
        plan_id: &str,
        room_name: &str,
        row: usize,
        col: usize,
        student: ExternalStudent,
    ) -> Result<Seat, ServiceError> {
        student.validate().map_err(AllocationError::from)?;
        let cache = &self.state.cache;
        let others = cache.occupied_rolls(plan_id, room_name).await?;

        let seat = cache
            .patch_room(plan_id, room_name, |entry| {
                let unavailable = |reason: String| ServiceError::SeatUnavailable { row, col, reason };

                if let Some(other_room) = others.get(&student.roll_number) {
                    return Err(unavailable(format!(
                        "{} is already seated in room {:?}",
                        student.roll_number, other_room
                    )));
                }
                if let Some(taken) = entry
                    .raw_matrix
                    .iter()
                    .flatten()
                    .find(|s| s.roll_number() == Some(student.roll_number.as_str()))
                {
                    return Err(unavailable(format!(
                        "{} is already seated at {}",
                        student.roll_number,
                        taken.position()
                    )));
                }

                // generated and external students must not share a batch entry
                if entry.batches.get(&student.batch_label).is_some_and(|b| b.batch_id.is_some()) {
                    return Err(AllocationError::config(format!(
                        "batch label {:?} belongs to a generated batch of room {:?}",
                        student.batch_label, room_name
                    ))
                    .into());
                }

                let target = seat_mut(entry, room_name, row, col)?;
                match &target.state {
                    SeatState::Broken => return Err(unavailable("seat is broken".to_string())),
                    SeatState::Occupied(o) => {
                        return Err(unavailable(format!("seat is taken by {}", o.roll_number)))
                    }
                    SeatState::Unallocated => {}
                }

                let paper_set = student
                    .paper_set
                    .unwrap_or_else(|| paper_set_for(&entry.raw_matrix, row, col, None));
                let occupant = Occupant::external(
                    student.batch_label.clone(),
                    student.color.clone(),
                    student.roll_number.clone(),
                    student.student_name.clone(),
                    paper_set,
                );
                let target = seat_mut(entry, room_name, row, col)?;
                target.state = SeatState::Occupied(occupant);
                let seat = target.clone();

                revalidate(entry, &others)?;
                Ok(seat)
            })
            .await?;

        info!(
            plan_id,
            room = room_name,
            position = %seat.position(),
            roll = %student.roll_number,
            "External student added"
        );
        Ok(seat)
    }

    /// Frees a seat taken by an external student. Generated students cannot be
    /// removed this way.
    pub async fn remove_external(
        &self,
        plan_id: &str,
        room_name: &str,
        row: usize,
        col: usize,
    ) -> Result<Seat, ServiceError> {
        let cache = &self.state.cache;
        let others = cache.occupied_rolls(plan_id, room_name).await?;

        let removed = cache
            .patch_room(plan_id, room_name, |entry| {
                let target = seat_mut(entry, room_name, row, col)?;
                let is_external = target.occupant().is_some_and(|o| o.is_external);
                if !is_external {
                    return Err(ServiceError::SeatUnavailable {
                        row,
                        col,
                        reason: "no external student at this seat".to_string(),
                    });
                }
                let removed = target.clone();
                target.state = SeatState::Unallocated;

                revalidate(entry, &others)?;
                Ok(removed)
            })
            .await?;

        info!(plan_id, room = room_name, position = %removed.position(), "External student removed");
        Ok(removed)
    }

    /// Every external student of a plan, room by room.
    pub async fn list_externals(&self, plan_id: &str) -> Result<Vec<PlacedExternal>, ServiceError> {
        let Some(snapshot) = self.state.cache.load_snapshot(plan_id).await? else {
            return Ok(Vec::new());
        };
        let mut placed = Vec::new();
        for (room_name, room) in &snapshot.rooms {
            for seat in room.raw_matrix.iter().flatten() {
                if seat.occupant().is_some_and(|o| o.is_external) {
                    placed.push(PlacedExternal { room_name: room_name.clone(), seat: seat.clone() });
                }
            }
        }
        Ok(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryStore, Store};
    use crate::config::Config;
    use crate::models::plan::GenerationRequest;
    use crate::services::SeatingService;

    async fn planned_room() -> (Arc<AppState>, String) {
        let state = AppState::with_store(Config::in_memory(), Store::Memory(MemoryStore::new()));
        let plan_id = state.cache.create_plan(Some("exam-1")).await.unwrap();
        let request = GenerationRequest::new(3, 4, 1).with_roster(1, ["R1", "R2", "R3"]);
        SeatingService::new(state.clone())
            .generate_room(&plan_id, "101", request)
            .await
            .unwrap();
        (state, plan_id)
    }

    async fn first_empty(state: &AppState, plan_id: &str) -> Seat {
        state.cache.empty_seats(plan_id, "101").await.unwrap().remove(0)
    }

    #[tokio::test]
    async fn add_then_remove_external() {
        let (state, plan_id) = planned_room().await;
        let service = ExternalStudentService::new(state.clone());
        let empty = first_empty(&state, &plan_id).await;

        let seat = service
            .add_external(&plan_id, "101", empty.row, empty.col, ExternalStudent::new("X1", "Guest"))
            .await
            .unwrap();
        let occupant = seat.occupant().unwrap();
        assert!(occupant.is_external);
        assert_eq!(occupant.color, EXTERNAL_COLOR);
        assert_eq!(occupant.paper_set, Some(PaperSet::checkerboard(empty.row, empty.col)));

        let room = state.cache.load_room_entry(&plan_id, "101").await.unwrap().unwrap();
        assert_eq!(room.summary.total_allocated_students, 4);
        assert_eq!(room.batches["Guest"].students.len(), 1);
        assert_eq!(service.list_externals(&plan_id).await.unwrap().len(), 1);

        service.remove_external(&plan_id, "101", empty.row, empty.col).await.unwrap();
        let room = state.cache.load_room_entry(&plan_id, "101").await.unwrap().unwrap();
        assert_eq!(room.summary.total_allocated_students, 3);
        assert!(!room.batches.contains_key("Guest"));
    }

    #[tokio::test]
    async fn taken_broken_and_out_of_range_seats_are_refused() {
        let (state, plan_id) = planned_room().await;
        let service = ExternalStudentService::new(state.clone());

        let taken = service
            .add_external(&plan_id, "101", 0, 0, ExternalStudent::new("X1", "Guest"))
            .await;
        assert!(matches!(taken, Err(ServiceError::SeatUnavailable { .. })));

        let outside = service
            .add_external(&plan_id, "101", 9, 0, ExternalStudent::new("X1", "Guest"))
            .await;
        assert!(matches!(outside, Err(ServiceError::SeatOutOfRange { rows: 3, cols: 4, .. })));

        let empty = first_empty(&state, &plan_id).await;
        let duplicate = service
            .add_external(&plan_id, "101", empty.row, empty.col, ExternalStudent::new("R1", "Guest"))
            .await;
        assert!(matches!(duplicate, Err(ServiceError::SeatUnavailable { .. })));
    }

    #[tokio::test]
    async fn generated_batch_labels_are_refused() {
        let (state, plan_id) = planned_room().await;
        let service = ExternalStudentService::new(state.clone());
        let empty = first_empty(&state, &plan_id).await;
        let before = state.cache.load_room_entry(&plan_id, "101").await.unwrap().unwrap();

        let clash = service
            .add_external(&plan_id, "101", empty.row, empty.col, ExternalStudent::new("X1", "Batch 1"))
            .await;
        assert!(matches!(clash, Err(ServiceError::Allocation(AllocationError::Configuration(_)))));

        let after = state.cache.load_room_entry(&plan_id, "101").await.unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(after.batches["Batch 1"].students.len(), 3);
    }

    #[tokio::test]
    async fn generated_students_cannot_be_removed() {
        let (state, plan_id) = planned_room().await;
        let service = ExternalStudentService::new(state);
        let result = service.remove_external(&plan_id, "101", 0, 0).await;
        assert!(matches!(result, Err(ServiceError::SeatUnavailable { .. })));
    }

    #[tokio::test]
    async fn finalized_plans_accept_externals() {
        let (state, plan_id) = planned_room().await;
        state.cache.finalize(&plan_id, None).await.unwrap();
        let empty = first_empty(&state, &plan_id).await;

        ExternalStudentService::new(state.clone())
            .add_external(&plan_id, "101", empty.row, empty.col, ExternalStudent::new("X9", "Guest"))
            .await
            .unwrap();
        let snapshot = state.cache.load_snapshot(&plan_id).await.unwrap().unwrap();
        assert!(snapshot.is_finalized());
        assert_eq!(snapshot.metadata.total_students, 4);
    }

    #[test]
    fn empty_roll_is_rejected() {
        assert!(ExternalStudent::new("", "Guest").validate().is_err());
    }
}
