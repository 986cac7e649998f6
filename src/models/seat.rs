use serde::{Deserialize, Serialize};

use super::batch::BatchId;

pub const BROKEN_COLOR: &str = "#FF0000";
pub const UNALLOCATED_COLOR: &str = "#F3F4F6";

/// Answer-paper set handed to an occupied seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PaperSet {
    A,
    B,
}

impl PaperSet {
    pub fn opposite(self) -> Self {
        match self {
            PaperSet::A => PaperSet::B,
            PaperSet::B => PaperSet::A,
        }
    }

    /// Checkerboard default: `A` on even `row + col`.
    pub fn checkerboard(row: usize, col: usize) -> Self {
        if (row + col) % 2 == 0 {
            PaperSet::A
        } else {
            PaperSet::B
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaperSet::A => "A",
            PaperSet::B => "B",
        }
    }
}

/// Whoever sits in an occupied seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupant {
    /// `None` for external students added after generation.
    pub batch_id: Option<BatchId>,
    pub batch_label: Option<String>,
    pub roll_number: String,
    pub student_name: Option<String>,
    pub paper_set: Option<PaperSet>,
    pub color: String,
    pub is_external: bool,
}

impl Occupant {
    pub fn student(
        batch_id: BatchId,
        batch_label: impl Into<String>,
        color: impl Into<String>,
        roll_number: impl Into<String>,
        student_name: Option<String>,
    ) -> Self {
        Self {
            batch_id: Some(batch_id),
            batch_label: Some(batch_label.into()),
            roll_number: roll_number.into(),
            student_name,
            paper_set: None,
            color: color.into(),
            is_external: false,
        }
    }

    pub fn external(
        batch_label: impl Into<String>,
        color: impl Into<String>,
        roll_number: impl Into<String>,
        student_name: Option<String>,
        paper_set: PaperSet,
    ) -> Self {
        Self {
            batch_id: None,
            batch_label: Some(batch_label.into()),
            roll_number: roll_number.into(),
            student_name,
            paper_set: Some(paper_set),
            color: color.into(),
            is_external: true,
        }
    }
}

/// Exactly one of these holds for every seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatState {
    Broken,
    Unallocated,
    Occupied(Occupant),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SeatRecord", try_from = "SeatRecord")]
pub struct Seat {
    pub row: usize,
    pub col: usize,
    pub block_index: usize,
    pub state: SeatState,
}

impl Seat {
    pub fn broken(row: usize, col: usize, block_index: usize) -> Self {
        Self { row, col, block_index, state: SeatState::Broken }
    }

    pub fn unallocated(row: usize, col: usize, block_index: usize) -> Self {
        Self { row, col, block_index, state: SeatState::Unallocated }
    }

    pub fn occupied(row: usize, col: usize, block_index: usize, occupant: Occupant) -> Self {
        Self { row, col, block_index, state: SeatState::Occupied(occupant) }
    }

    pub fn is_broken(&self) -> bool {
        matches!(self.state, SeatState::Broken)
    }

    pub fn is_unallocated(&self) -> bool {
        matches!(self.state, SeatState::Unallocated)
    }

    pub fn occupant(&self) -> Option<&Occupant> {
        match &self.state {
            SeatState::Occupied(occupant) => Some(occupant),
            _ => None,
        }
    }

    pub fn occupant_mut(&mut self) -> Option<&mut Occupant> {
        match &mut self.state {
            SeatState::Occupied(occupant) => Some(occupant),
            _ => None,
        }
    }

    pub fn batch_id(&self) -> Option<BatchId> {
        self.occupant().and_then(|o| o.batch_id)
    }

    pub fn paper_set(&self) -> Option<PaperSet> {
        self.occupant().and_then(|o| o.paper_set)
    }

    pub fn roll_number(&self) -> Option<&str> {
        self.occupant().map(|o| o.roll_number.as_str())
    }

    /// Spreadsheet-style label, `A1` for the top-left seat.
    pub fn position(&self) -> String {
        seat_position(self.row, self.col)
    }
}

pub fn seat_position(row: usize, col: usize) -> String {
    format!("{}{}", column_label(col), row + 1)
}

/// `0 -> A`, `25 -> Z`, `26 -> AA`.
pub fn column_label(col: usize) -> String {
    let mut label = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        label.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_default()
}

/// Flat on-disk layout read by the report collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SeatRecord {
    position: String,
    row: usize,
    col: usize,
    block: usize,
    batch: Option<BatchId>,
    batch_label: Option<String>,
    paper_set: Option<PaperSet>,
    roll_number: Option<String>,
    student_name: Option<String>,
    is_broken: bool,
    is_unallocated: bool,
    #[serde(default)]
    is_external: bool,
    color: String,
}

impl From<Seat> for SeatRecord {
    fn from(seat: Seat) -> Self {
        let position = seat.position();
        let mut record = SeatRecord {
            position,
            row: seat.row,
            col: seat.col,
            block: seat.block_index,
            batch: None,
            batch_label: None,
            paper_set: None,
            roll_number: None,
            student_name: None,
            is_broken: false,
            is_unallocated: false,
            is_external: false,
            color: UNALLOCATED_COLOR.to_string(),
        };
        match seat.state {
            SeatState::Broken => {
                record.is_broken = true;
                record.color = BROKEN_COLOR.to_string();
            }
            SeatState::Unallocated => record.is_unallocated = true,
            SeatState::Occupied(o) => {
                record.batch = o.batch_id;
                record.batch_label = o.batch_label;
                record.paper_set = o.paper_set;
                record.roll_number = Some(o.roll_number);
                record.student_name = o.student_name;
                record.is_external = o.is_external;
                record.color = o.color;
            }
        }
        record
    }
}

impl TryFrom<SeatRecord> for Seat {
    type Error = String;

    fn try_from(r: SeatRecord) -> Result<Self, Self::Error> {
        let at = format!("seat ({}, {})", r.row, r.col);
        let state = match (r.is_broken, r.is_unallocated, r.roll_number) {
            (true, true, _) => return Err(format!("{at} is both broken and unallocated")),
            (true, false, None) => SeatState::Broken,
            (false, true, None) => SeatState::Unallocated,
            (true, false, Some(_)) | (false, true, Some(_)) => {
                return Err(format!("{at} carries a roll number but is not occupied"))
            }
            (false, false, None) => return Err(format!("{at} is occupied without a roll number")),
            (false, false, Some(roll_number)) => {
                if !r.is_external && r.batch.is_none() {
                    return Err(format!("{at} is occupied without a batch"));
                }
                SeatState::Occupied(Occupant {
                    batch_id: r.batch,
                    batch_label: r.batch_label,
                    roll_number,
                    student_name: r.student_name,
                    paper_set: r.paper_set,
                    color: r.color,
                    is_external: r.is_external,
                })
            }
        };
        Ok(Seat { row: r.row, col: r.col, block_index: r.block, state })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_labels_roll_over_after_z() {
        assert_eq!(column_label(0), "A");
        assert_eq!(column_label(25), "Z");
        assert_eq!(column_label(26), "AA");
        assert_eq!(seat_position(2, 1), "B3");
    }

    #[test]
    fn occupied_seat_uses_flat_layout() {
        let seat = Seat::occupied(
            0,
            2,
            1,
            Occupant {
                paper_set: Some(PaperSet::B),
                ..Occupant::student(1, "CSE", "#DBEAFE", "BTCS24O1001", None)
            },
        );
        let json = serde_json::to_value(&seat).unwrap();
        assert_eq!(json["position"], "C1");
        assert_eq!(json["batch"], 1);
        assert_eq!(json["paper_set"], "B");
        assert_eq!(json["is_broken"], false);
        assert_eq!(json["is_unallocated"], false);

        let back: Seat = serde_json::from_value(json).unwrap();
        assert_eq!(back, seat);
    }

    #[test]
    fn impossible_flag_combination_is_rejected() {
        let json = serde_json::json!({
            "position": "A1", "row": 0, "col": 0, "block": 0,
            "batch": null, "batch_label": null, "paper_set": null,
            "roll_number": "X1", "student_name": null,
            "is_broken": true, "is_unallocated": false, "color": "#FF0000"
        });
        assert!(serde_json::from_value::<Seat>(json).is_err());
    }
}
