use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::batch::{BatchId, BatchRecord, BranchInfo};
use super::plan::{AllocationResult, ConstraintResult, GenerationRequest, Summary};
use super::seat::{PaperSet, Seat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Active,
    Finalized,
}

/// Room geometry a grid was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInputs {
    pub rows: usize,
    pub cols: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_width: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_structure: Option<Vec<usize>>,
    #[serde(default)]
    pub broken_seats: Vec<[usize; 2]>,
    #[serde(default)]
    pub allow_adjacent_same_batch: bool,
}

impl RoomInputs {
    pub fn from_request(request: &GenerationRequest) -> Self {
        let mut broken_seats = request.broken_seats.clone();
        broken_seats.sort_unstable();
        broken_seats.dedup();
        Self {
            rows: request.rows,
            cols: request.cols,
            block_width: request.block_width,
            block_structure: request.block_structure.clone().filter(|s| !s.is_empty()),
            broken_seats,
            allow_adjacent_same_batch: request.allow_adjacent_same_batch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub roll_number: String,
    #[serde(default)]
    pub student_name: Option<String>,
    pub position: String,
    pub paper_set: Option<PaperSet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    /// `None` for the pseudo-batch of external students.
    pub batch_id: Option<BatchId>,
    pub color: String,
    pub declared_count: usize,
    pub placed: usize,
    pub unplaced: usize,
    pub info: BranchInfo,
    /// Seated students in placement order.
    pub students: Vec<StudentRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomEntry {
    pub batches: BTreeMap<String, BatchEntry>,
    pub raw_matrix: Vec<Vec<Seat>>,
    pub inputs: RoomInputs,
    pub summary: Summary,
    pub constraints: Vec<ConstraintResult>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Hash of the request that produced this room, used for cross-session reuse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl RoomEntry {
    pub fn from_result(
        result: &AllocationResult,
        inputs: RoomInputs,
        fingerprint: Option<String>,
    ) -> Self {
        let batches = result
            .batches
            .iter()
            .map(|b| {
                let entry = BatchEntry {
                    batch_id: Some(b.batch_id),
                    color: b.color.clone(),
                    declared_count: b.declared_count,
                    placed: b.placed,
                    unplaced: b.unplaced,
                    info: b.info.clone(),
                    students: Vec::new(),
                };
                (b.label.clone(), entry)
            })
            .collect();

        let mut entry = Self {
            batches,
            raw_matrix: result.seating.clone(),
            inputs,
            summary: result.summary.clone(),
            constraints: result.constraints.clone(),
            warnings: result.warnings.clone(),
            fingerprint,
        };
        entry.collect_students();
        entry
    }

    pub fn to_result(&self) -> AllocationResult {
        let mut batches: Vec<BatchRecord> = self
            .batches
            .iter()
            .filter_map(|(label, e)| {
                e.batch_id.map(|batch_id| BatchRecord {
                    batch_id,
                    label: label.clone(),
                    color: e.color.clone(),
                    declared_count: e.declared_count,
                    placed: e.placed,
                    unplaced: e.unplaced,
                    info: e.info.clone(),
                })
            })
            .collect();
        batches.sort_by_key(|b| b.batch_id);

        AllocationResult {
            rows: self.inputs.rows,
            cols: self.inputs.cols,
            seating: self.raw_matrix.clone(),
            batches,
            summary: self.summary.clone(),
            constraints: self.constraints.clone(),
            warnings: self.warnings.clone(),
        }
    }

    pub fn occupied_count(&self) -> usize {
        self.raw_matrix.iter().flatten().filter(|s| s.occupant().is_some()).count()
    }

    /// Rebuilds student lists and the summary after an out-of-band seat update.
    pub fn refresh(&mut self) {
        self.collect_students();
        let records = self.to_result().batches;
        self.summary = Summary::compute(&self.raw_matrix, &records);
    }

    fn collect_students(&mut self) {
        self.batches.retain(|_, e| e.batch_id.is_some());
        for entry in self.batches.values_mut() {
            entry.students.clear();
        }

        let cols = self.raw_matrix.first().map_or(0, |r| r.len());
        for col in 0..cols {
            for row in &self.raw_matrix {
                let Some(seat) = row.get(col) else { continue };
                let Some(occupant) = seat.occupant() else { continue };
                let label = occupant
                    .batch_label
                    .clone()
                    .unwrap_or_else(|| "External".to_string());
                let entry = self.batches.entry(label).or_insert_with(|| BatchEntry {
                    batch_id: None,
                    color: occupant.color.clone(),
                    declared_count: 0,
                    placed: 0,
                    unplaced: 0,
                    info: BranchInfo::unavailable(),
                    students: Vec::new(),
                });
                entry.students.push(StudentRecord {
                    roll_number: occupant.roll_number.clone(),
                    student_name: occupant.student_name.clone(),
                    position: seat.position(),
                    paper_set: occupant.paper_set,
                });
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub plan_id: String,
    pub latest_room: Option<String>,
    pub total_students: usize,
    pub status: PlanStatus,
    pub updated_at: DateTime<Utc>,
}

/// One file per planning session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub metadata: SnapshotMetadata,
    pub rooms: BTreeMap<String, RoomEntry>,
}

impl SessionSnapshot {
    pub fn new(plan_id: impl Into<String>) -> Self {
        Self {
            metadata: SnapshotMetadata {
                plan_id: plan_id.into(),
                latest_room: None,
                total_students: 0,
                status: PlanStatus::Active,
                updated_at: Utc::now(),
            },
            rooms: BTreeMap::new(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.metadata.status == PlanStatus::Finalized
    }

    pub fn recount(&mut self) {
        self.metadata.total_students = self.rooms.values().map(RoomEntry::occupied_count).sum();
        if let Some(latest) = &self.metadata.latest_room {
            if !self.rooms.contains_key(latest) {
                self.metadata.latest_room = None;
            }
        }
    }
}
