use serde::{Deserialize, Serialize};

use crate::error::AllocationError;
use crate::seating::branch;

pub type BatchId = u32;

const DEFAULT_BATCH_COLORS: [&str; 5] = ["#DBEAFE", "#DCFCE7", "#FEE2E2", "#FEF3C7", "#E9D5FF"];
const FALLBACK_BATCH_COLOR: &str = "#E5E7EB";

pub fn default_batch_color(batch_id: BatchId) -> &'static str {
    batch_id
        .checked_sub(1)
        .and_then(|i| DEFAULT_BATCH_COLORS.get(i as usize))
        .copied()
        .unwrap_or(FALLBACK_BATCH_COLOR)
}

/// One roster line. Accepts either `"BTCS24O1001"` or
/// `{"roll_number": "BTCS24O1001", "name": "..."}` on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RosterEntry")]
pub struct Student {
    pub roll_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Student {
    pub fn new(roll_number: impl Into<String>) -> Self {
        Self { roll_number: roll_number.into(), name: None }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RosterEntry {
    Roll(String),
    Full {
        roll_number: String,
        #[serde(default, alias = "student_name")]
        name: Option<String>,
    },
}

impl From<RosterEntry> for Student {
    fn from(entry: RosterEntry) -> Self {
        match entry {
            RosterEntry::Roll(roll_number) => Student::new(roll_number.trim()),
            RosterEntry::Full { roll_number, name } => Student {
                roll_number: roll_number.trim().to_string(),
                name: name.filter(|n| !n.trim().is_empty()),
            },
        }
    }
}

/// Academic metadata inferred from a batch's roll numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortInfo {
    pub degree: String,
    pub branch: String,
    pub branch_name: String,
    pub joining_year: u16,
}

/// Serialized as the object above, or as the string `"N/A"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BranchInfo {
    Known(CohortInfo),
    Unavailable(NotAvailable),
}

impl BranchInfo {
    pub fn unavailable() -> Self {
        BranchInfo::Unavailable(NotAvailable)
    }

    pub fn known(&self) -> Option<&CohortInfo> {
        match self {
            BranchInfo::Known(info) => Some(info),
            BranchInfo::Unavailable(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NotAvailable;

impl From<NotAvailable> for String {
    fn from(_: NotAvailable) -> Self {
        "N/A".to_string()
    }
}

impl TryFrom<String> for NotAvailable {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "N/A" {
            Ok(NotAvailable)
        } else {
            Err(format!("expected \"N/A\", got {value:?}"))
        }
    }
}

/// A cohort taking part in one allocation run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub batch_id: BatchId,
    pub label: String,
    pub color: String,
    pub declared_count: usize,
    roster: Vec<Student>,
    inferred_branch: BranchInfo,
}

impl Batch {
    /// `declared_count` defaults to the roster length.
    pub fn new(
        batch_id: BatchId,
        label: impl Into<String>,
        color: impl Into<String>,
        roster: Vec<Student>,
        declared_count: Option<usize>,
    ) -> Result<Self, AllocationError> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(AllocationError::config(format!("batch {} has an empty label", batch_id)));
        }
        if let Some(pos) = roster.iter().position(|s| s.roll_number.is_empty()) {
            return Err(AllocationError::config(format!(
                "batch {:?} has an empty roll number at roster position {}",
                label, pos
            )));
        }

        let inferred_branch = branch::detect(roster.iter().map(|s| s.roll_number.as_str()));
        Ok(Self {
            batch_id,
            label,
            color: color.into(),
            declared_count: declared_count.unwrap_or(roster.len()),
            roster,
            inferred_branch,
        })
    }

    pub fn roster(&self) -> &[Student] {
        &self.roster
    }

    pub fn inferred_branch(&self) -> &BranchInfo {
        &self.inferred_branch
    }

    /// Students the mapper is allowed to seat, in roster order.
    pub fn placeable(&self) -> &[Student] {
        let n = self.declared_count.min(self.roster.len());
        &self.roster[..n]
    }
}

/// Per-batch outcome of one allocation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub batch_id: BatchId,
    pub label: String,
    pub color: String,
    pub declared_count: usize,
    pub placed: usize,
    /// Declared students without a seat in this grid.
    pub unplaced: usize,
    pub info: BranchInfo,
}
