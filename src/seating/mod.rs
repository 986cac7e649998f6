//! Seat allocation pipeline: blocks -> columns -> grid -> paper sets -> checks.
//!
//! Everything here is synchronous and side-effect free apart from logging.

pub mod blocks;
pub mod branch;
pub mod columns;
pub mod grid;
pub mod paper_set;
pub mod rolls;
pub mod validator;

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};
use ::validator::Validate;

use crate::error::AllocationError;
use crate::models::batch::{default_batch_color, Batch, BatchId, BatchRecord};
use crate::models::plan::{AllocationResult, GenerationRequest, Summary};
use blocks::BlockLayout;
use columns::ColumnPlan;
use rolls::RollSeries;

fn check_keys<V>(
    field: &str,
    map: &BTreeMap<BatchId, V>,
    num_batches: usize,
) -> Result<(), AllocationError> {
    match map.keys().find(|&&id| id == 0 || id as usize > num_batches) {
        Some(id) => Err(AllocationError::config(format!(
            "{} refers to batch {} but batches are numbered 1..={}",
            field, id, num_batches
        ))),
        None => Ok(()),
    }
}

/// Builds the batch list in id order. Batches without a roster get generated
/// rolls: a declared count if given, otherwise enough to fill their columns.
pub fn build_batches(
    request: &GenerationRequest,
    plan: &ColumnPlan,
) -> Result<Vec<Batch>, AllocationError> {
    let n = request.num_batches;
    check_keys("batch_student_counts", &request.batch_student_counts, n)?;
    check_keys("batch_roll_numbers", &request.batch_roll_numbers, n)?;
    check_keys("batch_labels", &request.batch_labels, n)?;
    check_keys("batch_colors", &request.batch_colors, n)?;
    check_keys("start_rolls", &request.start_rolls, n)?;

    let mut series = RollSeries::new();
    let mut labels = HashSet::new();
    let mut batches = Vec::with_capacity(n);

    for (index, id) in (1..=n as BatchId).enumerate() {
        let label = request
            .batch_labels
            .get(&id)
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| format!("Batch {}", id));
        if !labels.insert(label.clone()) {
            return Err(AllocationError::config(format!("batch label {:?} is used twice", label)));
        }

        let color = request
            .batch_colors
            .get(&id)
            .cloned()
            .unwrap_or_else(|| default_batch_color(id).to_string());
        let declared = request.batch_student_counts.get(&id).copied();

        let roster = match request.batch_roll_numbers.get(&id).filter(|r| !r.is_empty()) {
            Some(roster) => roster.clone(),
            None => {
                // never more rolls than the batch has seats
                let capacity = plan.seating_column_count(index).saturating_mul(request.rows);
                let count = declared.map_or(capacity, |d| d.min(capacity));
                let start = request.start_rolls.get(&id).map(String::as_str);
                series.generate(start, count)?
            }
        };

        batches.push(Batch::new(id, label, color, roster, declared)?);
    }
    Ok(batches)
}

/// Runs the whole pipeline for one room.
///
/// `other_rooms` maps roll numbers already seated elsewhere in the same plan to
/// their room, so that cross-room duplicates show up in the checks.
pub fn plan_room(
    request: &GenerationRequest,
    other_rooms: &HashMap<String, String>,
) -> Result<AllocationResult, AllocationError> {
    request.validate()?;

    let layout = BlockLayout::resolve(
        request.cols,
        request.block_width,
        request.block_structure.as_deref(),
    )?;
    let plan = columns::allocate_columns(
        request.num_batches,
        &layout,
        request.allow_adjacent_same_batch,
    )?;
    debug!(blocks = ?layout.widths(), gaps = ?plan.gap_columns(), "Column plan ready");

    let batches = build_batches(request, &plan)?;

    let shuffle_seed = request.randomize_within_column.then(|| {
        request.shuffle_seed.unwrap_or_else(|| {
            let seed = rand::random::<u64>();
            info!(seed, "Generated shuffle seed");
            seed
        })
    });

    let mut mapped = grid::map_seats(
        request.rows,
        &layout,
        &plan,
        &batches,
        &request.broken_seats,
        shuffle_seed,
    )?;
    paper_set::assign_paper_sets(&mut mapped.seating);

    let records: Vec<BatchRecord> = batches
        .iter()
        .enumerate()
        .map(|(i, b)| BatchRecord {
            batch_id: b.batch_id,
            label: b.label.clone(),
            color: b.color.clone(),
            declared_count: b.declared_count,
            placed: mapped.placed[i],
            unplaced: b.declared_count.saturating_sub(mapped.placed[i]),
            info: b.inferred_branch().clone(),
        })
        .collect();

    let ctx = validator::ValidationContext {
        layout: &layout,
        allow_adjacent_same_batch: request.allow_adjacent_same_batch,
        other_rooms,
    };
    let constraints = validator::validate(&mapped.seating, &records, &ctx);
    let summary = Summary::compute(&mapped.seating, &records);

    let mut warnings = plan.warnings().to_vec();
    warnings.append(&mut mapped.warnings);
    for (record, &queued) in records.iter().zip(&mapped.unplaced) {
        if queued == 0 && record.unplaced > 0 {
            warnings.push(format!(
                "{} students of batch {:?} could not be seated",
                record.unplaced, record.label
            ));
        }
    }

    Ok(AllocationResult {
        rows: request.rows,
        cols: request.cols,
        seating: mapped.seating,
        batches: records,
        summary,
        constraints,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::seat::PaperSet;

    fn occupied_cols(result: &AllocationResult, batch: BatchId) -> Vec<usize> {
        let mut cols: Vec<usize> = result
            .occupied_seats()
            .filter(|s| s.batch_id() == Some(batch))
            .map(|s| s.col)
            .collect();
        cols.sort_unstable();
        cols.dedup();
        cols
    }

    #[test]
    fn two_batches_on_four_by_six() {
        let request = GenerationRequest::new(4, 6, 2).with_count(1, 10).with_count(2, 10);
        let result = plan_room(&request, &HashMap::new()).unwrap();

        assert_eq!(occupied_cols(&result, 1), vec![0, 1]);
        assert_eq!(occupied_cols(&result, 2), vec![3, 4, 5]);
        assert!(result.seating.iter().all(|row| row[2].is_unallocated()));
        // batch 1 only has 8 seats and does not spill into batch 2's columns
        assert_eq!(result.summary.total_allocated_students, 18);
        assert_eq!(result.batches[0].placed, 8);
        assert_eq!(result.batches[0].unplaced, 2);
        assert_eq!(result.batches[1].placed, 10);

        let validation = result.validation();
        assert!(validation.is_valid, "{:?}", validation.errors);
        assert!(!validation.warnings.is_empty());
    }

    #[test]
    fn generated_rolls_use_start_roll_and_global_serials() {
        let mut request = GenerationRequest::new(2, 4, 2).with_count(1, 2).with_count(2, 2);
        request.start_rolls.insert(1, "BTCS24O1135".into());
        let result = plan_room(&request, &HashMap::new()).unwrap();

        let rolls: Vec<&str> = result.occupied_seats().filter_map(|s| s.roll_number()).collect();
        assert!(rolls.contains(&"BTCS24O1135"));
        assert!(rolls.contains(&"BTCS24O1136"));
        assert!(rolls.contains(&"1001"));
        assert_eq!(result.batches[0].info.known().map(|i| i.branch.as_str()), Some("CS"));
    }

    #[test]
    fn single_batch_with_adjacency_fills_densely_and_alternates() {
        let mut request = GenerationRequest::new(3, 4, 1).with_count(1, 12);
        request.allow_adjacent_same_batch = true;
        let result = plan_room(&request, &HashMap::new()).unwrap();
        assert_eq!(result.summary.total_allocated_students, 12);
        for seat in result.occupied_seats() {
            assert_eq!(seat.paper_set(), Some(PaperSet::checkerboard(seat.row, seat.col)));
        }
        assert!(result.validation().is_valid);
    }

    #[test]
    fn single_batch_spaced_layout_leaves_alternate_columns_first() {
        let request = GenerationRequest::new(2, 4, 1).with_count(1, 4);
        let result = plan_room(&request, &HashMap::new()).unwrap();
        assert_eq!(occupied_cols(&result, 1), vec![0, 2]);
    }

    #[test]
    fn out_of_range_batch_key_is_rejected() {
        let request = GenerationRequest::new(2, 4, 2).with_count(3, 5);
        let err = plan_room(&request, &HashMap::new()).unwrap_err();
        assert!(matches!(err, AllocationError::Configuration(_)));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let mut request = GenerationRequest::new(2, 4, 2);
        request.batch_labels.insert(1, "CSE".into());
        request.batch_labels.insert(2, " CSE ".into());
        assert!(plan_room(&request, &HashMap::new()).is_err());
    }

    #[test]
    fn cross_room_duplicate_is_critical() {
        let request = GenerationRequest::new(2, 2, 1).with_roster(1, ["A1", "A2"]);
        let other = HashMap::from([("A2".to_string(), "Room 101".to_string())]);
        let result = plan_room(&request, &other).unwrap();
        let validation = result.validation();
        assert!(!validation.is_valid);
        assert!(validation.errors[0].contains("Room 101"));
    }

    #[test]
    fn seeded_shuffle_is_reproducible() {
        let rolls: Vec<String> = (0..8).map(|i| format!("R{i:02}")).collect();
        let mut request = GenerationRequest::new(4, 2, 1).with_roster(1, rolls);
        request.allow_adjacent_same_batch = true;
        request.randomize_within_column = true;
        request.shuffle_seed = Some(42);
        let a = plan_room(&request, &HashMap::new()).unwrap();
        let b = plan_room(&request, &HashMap::new()).unwrap();
        assert_eq!(a.seating, b.seating);
    }

    #[test]
    fn invalid_dimensions_fail_validation() {
        let request = GenerationRequest::new(0, 4, 1);
        assert!(matches!(
            plan_room(&request, &HashMap::new()),
            Err(AllocationError::Configuration(_))
        ));
    }

    #[test]
    fn huge_declared_count_is_capped_at_capacity() {
        let request = GenerationRequest::new(2, 2, 1).with_count(1, usize::MAX);
        let result = plan_room(&request, &HashMap::new()).unwrap();
        // single batch, no adjacency: column 0 regular, column 1 spacer
        assert_eq!(result.batches[0].placed, 4);
        assert_eq!(result.batches[0].unplaced, usize::MAX - 4);
        assert_eq!(result.summary.total_allocated_students, 4);
        assert!(!result.warnings.is_empty());
        assert!(result.validation().is_valid);
    }

    #[test]
    fn start_roll_near_serial_limit_is_rejected() {
        let mut request = GenerationRequest::new(3, 2, 1).with_count(1, 5);
        request.start_rolls.insert(1, format!("BT{}", u64::MAX - 1));
        assert!(matches!(
            plan_room(&request, &HashMap::new()),
            Err(AllocationError::Configuration(_))
        ));
    }
}
