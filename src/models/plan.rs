use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

use super::batch::{BatchId, BatchRecord, Student};
use super::seat::{PaperSet, Seat};

/// Input of one generation call, as consumed from the API layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct GenerationRequest {
    #[validate(range(min = 1, max = 500))]
    pub rows: usize,
    #[validate(range(min = 1, max = 500))]
    pub cols: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub block_width: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_structure: Option<Vec<usize>>,
    /// `[row, col]` pairs, zero-based.
    #[serde(default)]
    pub broken_seats: Vec<[usize; 2]>,
    #[validate(range(min = 1, max = 100))]
    pub num_batches: usize,
    #[serde(default)]
    pub batch_student_counts: BTreeMap<BatchId, usize>,
    #[serde(default)]
    pub batch_roll_numbers: BTreeMap<BatchId, Vec<Student>>,
    #[serde(default)]
    pub batch_labels: BTreeMap<BatchId, String>,
    #[serde(default)]
    pub batch_colors: BTreeMap<BatchId, String>,
    /// Sample first roll per batch, used to generate rolls when no roster is uploaded.
    #[serde(default)]
    pub start_rolls: BTreeMap<BatchId, String>,
    #[serde(default)]
    pub allow_adjacent_same_batch: bool,
    #[serde(default)]
    pub randomize_within_column: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shuffle_seed: Option<u64>,
}

impl GenerationRequest {
    pub fn new(rows: usize, cols: usize, num_batches: usize) -> Self {
        Self {
            rows,
            cols,
            block_width: None,
            block_structure: None,
            broken_seats: Vec::new(),
            num_batches,
            batch_student_counts: BTreeMap::new(),
            batch_roll_numbers: BTreeMap::new(),
            batch_labels: BTreeMap::new(),
            batch_colors: BTreeMap::new(),
            start_rolls: BTreeMap::new(),
            allow_adjacent_same_batch: false,
            randomize_within_column: false,
            shuffle_seed: None,
        }
    }

    pub fn with_roster<I, S>(mut self, batch_id: BatchId, rolls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roster: Vec<Student> = rolls.into_iter().map(Student::new).collect();
        self.batch_roll_numbers.insert(batch_id, roster);
        self
    }

    pub fn with_count(mut self, batch_id: BatchId, count: usize) -> Self {
        self.batch_student_counts.insert(batch_id, count);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Unsatisfied checks at this priority reject the plan.
    pub fn is_blocking(self) -> bool {
        matches!(self, Priority::Critical | Priority::High)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintResult {
    pub name: String,
    pub priority: Priority,
    pub satisfied: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperSetDistribution {
    #[serde(rename = "A")]
    pub a: usize,
    #[serde(rename = "B")]
    pub b: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_available_seats: usize,
    pub total_allocated_students: usize,
    pub broken_seats_count: usize,
    /// Occupied seats per batch label.
    pub batch_distribution: BTreeMap<String, usize>,
    pub paper_set_distribution: PaperSetDistribution,
    /// Declared students per batch label that have no seat in this grid.
    pub unallocated_per_batch: BTreeMap<String, usize>,
}

impl Summary {
    pub fn compute(seating: &[Vec<Seat>], batches: &[BatchRecord]) -> Self {
        let mut summary = Summary::default();
        let mut seated: BTreeMap<BatchId, usize> = BTreeMap::new();

        for seat in seating.iter().flatten() {
            if seat.is_broken() {
                summary.broken_seats_count += 1;
                continue;
            }
            summary.total_available_seats += 1;
            let Some(occupant) = seat.occupant() else { continue };

            summary.total_allocated_students += 1;
            let label = occupant.batch_label.clone().unwrap_or_else(|| "External".to_string());
            *summary.batch_distribution.entry(label).or_default() += 1;
            if let Some(id) = occupant.batch_id {
                *seated.entry(id).or_default() += 1;
            }
            match occupant.paper_set {
                Some(PaperSet::A) => summary.paper_set_distribution.a += 1,
                Some(PaperSet::B) => summary.paper_set_distribution.b += 1,
                None => {}
            }
        }

        for batch in batches {
            let placed = seated.get(&batch.batch_id).copied().unwrap_or(0);
            summary
                .unallocated_per_batch
                .insert(batch.label.clone(), batch.declared_count.saturating_sub(placed));
        }
        summary
    }
}

/// Full output of one generation call. Immutable apart from the external
/// seat-patch path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub rows: usize,
    pub cols: usize,
    pub seating: Vec<Vec<Seat>>,
    pub batches: Vec<BatchRecord>,
    pub summary: Summary,
    pub constraints: Vec<ConstraintResult>,
    /// Non-fatal notes raised while building the grid.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl AllocationResult {
    pub fn seat(&self, row: usize, col: usize) -> Option<&Seat> {
        self.seating.get(row).and_then(|r| r.get(col))
    }

    pub fn occupied_seats(&self) -> impl Iterator<Item = &Seat> {
        self.seating.iter().flatten().filter(|s| s.occupant().is_some())
    }

    pub fn validation(&self) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for check in self.constraints.iter().filter(|c| !c.satisfied) {
            if check.priority.is_blocking() {
                errors.push(check.message.clone());
            } else {
                warnings.push(check.message.clone());
            }
        }
        warnings.extend(self.warnings.iter().cloned());
        ValidationReport { is_valid: errors.is_empty(), errors, warnings }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintsStatus {
    pub constraints: Vec<ConstraintResult>,
}

/// Response produced for the API layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub seating: Vec<Vec<Seat>>,
    pub summary: Summary,
    pub validation: ValidationReport,
    pub constraints_status: ConstraintsStatus,
}

impl From<&AllocationResult> for GenerationResponse {
    fn from(result: &AllocationResult) -> Self {
        Self {
            seating: result.seating.clone(),
            summary: result.summary.clone(),
            validation: result.validation(),
            constraints_status: ConstraintsStatus { constraints: result.constraints.clone() },
        }
    }
}
