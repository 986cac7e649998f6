use crate::models::batch::BatchId;
use crate::models::seat::{PaperSet, Seat};

/// Paper set of the neighbour at `(row, col)` when it seats the same batch.
fn same_batch_set(
    grid: &[Vec<Seat>],
    row: usize,
    col: usize,
    batch: BatchId,
) -> Option<PaperSet> {
    let seat = grid.get(row)?.get(col)?;
    if seat.batch_id()? == batch {
        seat.paper_set()
    } else {
        None
    }
}

/// Set for the seat at `(row, col)`, given the sets already placed above and
/// to the left. Same batch above wins, then same batch on the left, then the
/// checkerboard. Diagonals are not looked at.
pub fn paper_set_for(
    grid: &[Vec<Seat>],
    row: usize,
    col: usize,
    batch: Option<BatchId>,
) -> PaperSet {
    let Some(batch) = batch else {
        return PaperSet::checkerboard(row, col);
    };
    let above = row.checked_sub(1).and_then(|r| same_batch_set(grid, r, col, batch));
    let left = col.checked_sub(1).and_then(|c| same_batch_set(grid, row, c, batch));
    match (above, left) {
        (Some(set), _) | (None, Some(set)) => set.opposite(),
        (None, None) => PaperSet::checkerboard(row, col),
    }
}

/// Assigns a set to every occupied seat in column-major order.
/// Broken and unallocated seats keep `None`.
pub fn assign_paper_sets(grid: &mut [Vec<Seat>]) {
    let cols = grid.first().map_or(0, Vec::len);
    for col in 0..cols {
        for row in 0..grid.len() {
            let Some(batch) = grid[row].get(col).and_then(|s| s.occupant()).map(|o| o.batch_id)
            else {
                continue;
            };
            let set = paper_set_for(grid, row, col, batch);
            if let Some(occupant) = grid[row][col].occupant_mut() {
                occupant.paper_set = Some(set);
            }
        }
    }
}
