use std::collections::{BTreeMap, HashMap};

use super::blocks::BlockLayout;
use crate::models::batch::{BatchId, BatchRecord};
use crate::models::plan::{ConstraintResult, Priority};
use crate::models::seat::Seat;

pub const DUPLICATE_CHECK: &str = "no_duplicate_rolls";
pub const CAPACITY_CHECK: &str = "batch_capacity";
pub const BLOCK_SUM_CHECK: &str = "block_structure";
pub const ADJACENCY_CHECK: &str = "no_adjacent_batches";
pub const PAPER_SET_CHECK: &str = "paper_set_alternation";

const MAX_LISTED: usize = 5;

pub struct ValidationContext<'a> {
    pub layout: &'a BlockLayout,
    pub allow_adjacent_same_batch: bool,
    /// Roll number -> room name for the other rooms saved in the same plan.
    pub other_rooms: &'a HashMap<String, String>,
}

fn check(name: &str, priority: Priority, problems: Vec<String>, ok: String) -> ConstraintResult {
    let satisfied = problems.is_empty();
    let message = if satisfied {
        ok
    } else {
        let mut listed = problems.iter().take(MAX_LISTED).cloned().collect::<Vec<_>>().join("; ");
        if problems.len() > MAX_LISTED {
            listed.push_str(&format!(" (and {} more)", problems.len() - MAX_LISTED));
        }
        listed
    };
    ConstraintResult { name: name.to_string(), priority, satisfied, message }
}

/// Runs every check on a finished grid. Never fails; each outcome is a record.
pub fn validate(
    seating: &[Vec<Seat>],
    batches: &[BatchRecord],
    ctx: &ValidationContext<'_>,
) -> Vec<ConstraintResult> {
    let mut results = vec![
        check_duplicates(seating, ctx.other_rooms),
        check_capacity(seating, batches),
        check_block_sum(seating, ctx.layout),
    ];
    if !ctx.allow_adjacent_same_batch && batches.len() > 1 {
        results.push(check_adjacency(seating));
    }
    results.push(check_paper_sets(seating));
    results
}

fn check_duplicates(
    seating: &[Vec<Seat>],
    other_rooms: &HashMap<String, String>,
) -> ConstraintResult {
    let mut seen: HashMap<&str, String> = HashMap::new();
    let mut problems = Vec::new();
    for seat in seating.iter().flatten() {
        let Some(roll) = seat.roll_number() else { continue };
        if let Some(first) = seen.get(roll) {
            problems.push(format!("{} seated at {} and {}", roll, first, seat.position()));
        } else {
            seen.insert(roll, seat.position());
        }
        if let Some(room) = other_rooms.get(roll) {
            problems.push(format!(
                "{} at {} is already seated in room {:?}",
                roll,
                seat.position(),
                room
            ));
        }
    }
    check(
        DUPLICATE_CHECK,
        Priority::Critical,
        problems,
        format!("{} roll numbers, all unique", seen.len()),
    )
}

fn check_capacity(seating: &[Vec<Seat>], batches: &[BatchRecord]) -> ConstraintResult {
    let mut placed: BTreeMap<BatchId, usize> = BTreeMap::new();
    for id in seating.iter().flatten().filter_map(Seat::batch_id) {
        *placed.entry(id).or_default() += 1;
    }

    let mut problems = Vec::new();
    for batch in batches {
        let seated = placed.get(&batch.batch_id).copied().unwrap_or(0);
        if seated > batch.declared_count {
            problems.push(format!(
                "batch {:?} has {} seats for {} declared students",
                batch.label, seated, batch.declared_count
            ));
        }
        if batch.unplaced > 0 {
            problems.push(format!(
                "{} students of batch {:?} have no seat",
                batch.unplaced, batch.label
            ));
        }
    }
    check(CAPACITY_CHECK, Priority::Medium, problems, "every batch fits the room".to_string())
}

fn check_block_sum(seating: &[Vec<Seat>], layout: &BlockLayout) -> ConstraintResult {
    let grid_cols = seating.first().map_or(layout.cols(), Vec::len);
    let total = layout.widths().iter().try_fold(0usize, |acc, &w| acc.checked_add(w));
    let problems = match total {
        Some(total) if total == grid_cols => Vec::new(),
        Some(total) => {
            vec![format!("block widths sum to {} but the grid has {} columns", total, grid_cols)]
        }
        None => vec![format!("block widths overflow against {} grid columns", grid_cols)],
    };
    check(BLOCK_SUM_CHECK, Priority::High, problems, format!("blocks {:?}", layout.widths()))
}

fn check_adjacency(seating: &[Vec<Seat>]) -> ConstraintResult {
    let mut problems = Vec::new();
    for row in seating {
        for pair in row.windows(2) {
            let (Some(left), Some(right)) = (pair[0].batch_id(), pair[1].batch_id()) else {
                continue;
            };
            if left != right {
                problems.push(format!(
                    "batches {} and {} sit side by side at {}-{}",
                    left,
                    right,
                    pair[0].position(),
                    pair[1].position()
                ));
            }
        }
    }
    check(ADJACENCY_CHECK, Priority::High, problems, "batches are separated by gaps".to_string())
}

fn check_paper_sets(seating: &[Vec<Seat>]) -> ConstraintResult {
    let mut problems = Vec::new();
    for (r, row) in seating.iter().enumerate() {
        for (c, seat) in row.iter().enumerate() {
            let (Some(batch), Some(set)) = (seat.batch_id(), seat.paper_set()) else { continue };
            let below = seating.get(r + 1).and_then(|next| next.get(c));
            let right = row.get(c + 1);
            for other in [below, right].into_iter().flatten() {
                if other.batch_id() == Some(batch) && other.paper_set() == Some(set) {
                    problems.push(format!(
                        "set {} repeated at {} and {}",
                        set.as_str(),
                        seat.position(),
                        other.position()
                    ));
                }
            }
        }
    }
    check(
        PAPER_SET_CHECK,
        Priority::High,
        problems,
        "same-batch neighbours alternate paper sets".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::batch::BranchInfo;
    use crate::models::seat::{Occupant, PaperSet};

    fn seat(row: usize, col: usize, batch: u32, roll: &str, set: PaperSet) -> Seat {
        let occupant = Occupant {
            paper_set: Some(set),
            ..Occupant::student(batch, format!("B{batch}"), "#fff", roll, None)
        };
        Seat::occupied(row, col, 0, occupant)
    }

    fn record(id: u32, declared: usize, unplaced: usize) -> BatchRecord {
        BatchRecord {
            batch_id: id,
            label: format!("B{id}"),
            color: "#fff".into(),
            declared_count: declared,
            placed: declared - unplaced,
            unplaced,
            info: BranchInfo::unavailable(),
        }
    }

    fn run(
        seating: &[Vec<Seat>],
        batches: &[BatchRecord],
        other: &HashMap<String, String>,
    ) -> Vec<ConstraintResult> {
        let cols = seating[0].len();
        let layout = BlockLayout::uniform(cols, cols).unwrap();
        let ctx = ValidationContext {
            layout: &layout,
            allow_adjacent_same_batch: false,
            other_rooms: other,
        };
        validate(seating, batches, &ctx)
    }

    fn find<'a>(results: &'a [ConstraintResult], name: &str) -> &'a ConstraintResult {
        results.iter().find(|r| r.name == name).unwrap()
    }

    #[test]
    fn clean_grid_passes_everything() {
        let grid = vec![vec![
            seat(0, 0, 1, "a1", PaperSet::A),
            Seat::unallocated(0, 1, 0),
            seat(0, 2, 2, "b1", PaperSet::A),
        ]];
        let results = run(&grid, &[record(1, 1, 0), record(2, 1, 0)], &HashMap::new());
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.satisfied), "{results:?}");
    }

    #[test]
    fn duplicate_in_grid_and_in_other_room() {
        let grid = vec![vec![seat(0, 0, 1, "a1", PaperSet::A), seat(0, 1, 1, "a1", PaperSet::B)]];
        let other = HashMap::from([("a1".to_string(), "R2".to_string())]);
        let results = run(&grid, &[record(1, 2, 0)], &other);
        let dup = find(&results, DUPLICATE_CHECK);
        assert!(!dup.satisfied);
        assert_eq!(dup.priority, Priority::Critical);
        assert!(dup.message.contains("A1 and B1"));
        assert!(dup.message.contains("R2"));
    }

    #[test]
    fn adjacent_batches_are_flagged_only_with_several_batches() {
        let grid = vec![vec![seat(0, 0, 1, "a1", PaperSet::A), seat(0, 1, 2, "b1", PaperSet::B)]];
        let results = run(&grid, &[record(1, 1, 0), record(2, 1, 0)], &HashMap::new());
        assert!(!find(&results, ADJACENCY_CHECK).satisfied);

        let single = vec![vec![seat(0, 0, 1, "a1", PaperSet::A), seat(0, 1, 1, "a2", PaperSet::B)]];
        let results = run(&single, &[record(1, 2, 0)], &HashMap::new());
        assert!(results.iter().all(|r| r.name != ADJACENCY_CHECK));
    }

    #[test]
    fn repeated_paper_set_is_high_priority() {
        let grid = vec![
            vec![seat(0, 0, 1, "a1", PaperSet::A)],
            vec![seat(1, 0, 1, "a2", PaperSet::A)],
        ];
        let results = run(&grid, &[record(1, 2, 0)], &HashMap::new());
        let check = find(&results, PAPER_SET_CHECK);
        assert!(!check.satisfied);
        assert!(check.priority.is_blocking());
    }

    #[test]
    fn unplaced_students_are_a_medium_warning() {
        let grid = vec![vec![seat(0, 0, 1, "a1", PaperSet::A)]];
        let results = run(&grid, &[record(1, 3, 2)], &HashMap::new());
        let capacity = find(&results, CAPACITY_CHECK);
        assert!(!capacity.satisfied);
        assert_eq!(capacity.priority, Priority::Medium);
        assert!(!capacity.priority.is_blocking());
    }
}
