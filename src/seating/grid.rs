use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;

use super::blocks::BlockLayout;
use super::columns::ColumnPlan;
use crate::error::AllocationError;
use crate::models::batch::{Batch, Student};
use crate::models::seat::{Occupant, Seat};

/// Grid produced by the mapper, before paper sets are assigned.
#[derive(Debug, Clone)]
pub struct MappedGrid {
    pub seating: Vec<Vec<Seat>>,
    /// Seated students per batch, in batch order.
    pub placed: Vec<usize>,
    /// Placeable students per batch that found no seat.
    pub unplaced: Vec<usize>,
    pub warnings: Vec<String>,
}

/// Checks coordinates and returns the broken cells as a set.
pub fn broken_cells(
    rows: usize,
    cols: usize,
    broken_seats: &[[usize; 2]],
) -> Result<HashSet<(usize, usize)>, AllocationError> {
    broken_seats
        .iter()
        .map(|&[row, col]| {
            if row >= rows || col >= cols {
                Err(AllocationError::config(format!(
                    "broken seat ({}, {}) is outside the {}x{} grid",
                    row, col, rows, cols
                )))
            } else {
                Ok((row, col))
            }
        })
        .collect()
}

/// Column-major placement. Each batch walks its columns in fill order and
/// fills rows top to bottom, skipping broken cells. `shuffle_seed` shuffles
/// the students bound for each column before they are seated.
pub fn map_seats(
    rows: usize,
    layout: &BlockLayout,
    plan: &ColumnPlan,
    batches: &[Batch],
    broken_seats: &[[usize; 2]],
    shuffle_seed: Option<u64>,
) -> Result<MappedGrid, AllocationError> {
    let cols = layout.cols();
    let broken = broken_cells(rows, cols, broken_seats)?;

    let mut seating: Vec<Vec<Seat>> = (0..rows)
        .map(|row| {
            (0..cols)
                .map(|col| {
                    let block = layout.block_of(col).unwrap_or_default();
                    if broken.contains(&(row, col)) {
                        Seat::broken(row, col, block)
                    } else {
                        Seat::unallocated(row, col, block)
                    }
                })
                .collect()
        })
        .collect();

    let mut placed = vec![0; batches.len()];
    let mut unplaced = vec![0; batches.len()];
    let mut warnings = Vec::new();

    for (index, batch) in batches.iter().enumerate() {
        let mut queue: &[Student] = batch.placeable();

        for col in plan.fill_order(index) {
            if queue.is_empty() {
                break;
            }
            let open_rows: Vec<usize> =
                (0..rows).filter(|&row| !broken.contains(&(row, col))).collect();
            let take = open_rows.len().min(queue.len());
            let (chunk, rest) = queue.split_at(take);
            queue = rest;

            let mut chunk: Vec<&Student> = chunk.iter().collect();
            if let Some(seed) = shuffle_seed {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(col as u64));
                chunk.shuffle(&mut rng);
            }

            for (&row, student) in open_rows.iter().zip(chunk) {
                let seat = &mut seating[row][col];
                let occupant = Occupant::student(
                    batch.batch_id,
                    batch.label.as_str(),
                    batch.color.as_str(),
                    student.roll_number.as_str(),
                    student.name.clone(),
                );
                *seat = Seat::occupied(row, col, seat.block_index, occupant);
                placed[index] += 1;
            }
        }

        unplaced[index] = queue.len();
        if !queue.is_empty() {
            warnings.push(format!(
                "{} students of batch {:?} could not be seated",
                queue.len(),
                batch.label
            ));
        }
    }

    Ok(MappedGrid { seating, placed, unplaced, warnings })
}
