use tracing::warn;

use super::blocks::BlockLayout;
use crate::error::AllocationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Receives students of the batch at this index in the input order.
    /// Spacer columns are only filled once every regular column of the
    /// batch is full.
    Seating { batch: usize, spacer: bool },
    /// Reserved aisle between two batches; never receives students.
    Gap,
}

/// Contiguous columns handed to one batch before gaps are carved out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSpan {
    pub batch: usize,
    pub start_col: usize,
    pub width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    roles: Vec<ColumnRole>,
    spans: Vec<BatchSpan>,
    warnings: Vec<String>,
}

impl ColumnPlan {
    pub fn roles(&self) -> &[ColumnRole] {
        &self.roles
    }

    pub fn role(&self, col: usize) -> Option<ColumnRole> {
        self.roles.get(col).copied()
    }

    pub fn spans(&self) -> &[BatchSpan] {
        &self.spans
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn gap_columns(&self) -> Vec<usize> {
        self.roles
            .iter()
            .enumerate()
            .filter(|(_, r)| matches!(r, ColumnRole::Gap))
            .map(|(c, _)| c)
            .collect()
    }

    /// Columns that seat `batch`, in fill order: regular columns left to right,
    /// then spacer columns left to right.
    pub fn fill_order(&self, batch: usize) -> Vec<usize> {
        let of_kind = |want_spacer: bool| {
            self.roles.iter().enumerate().filter_map(move |(c, r)| match r {
                ColumnRole::Seating { batch: b, spacer } if *b == batch && *spacer == want_spacer => {
                    Some(c)
                }
                _ => None,
            })
        };
        of_kind(false).chain(of_kind(true)).collect()
    }

    pub fn seating_column_count(&self, batch: usize) -> usize {
        self.roles
            .iter()
            .filter(|r| matches!(r, ColumnRole::Seating { batch: b, .. } if *b == batch))
            .count()
    }
}

/// Splits the layout's columns between `num_batches` batches.
///
/// `base = cols / n` columns each, the first `cols % n` batches get one more.
/// With several batches and `allow_adjacent_same_batch == false`, one column
/// per batch boundary becomes a gap. A single batch never gets gaps; instead,
/// unless adjacency is allowed, every odd column inside a block is marked as a
/// spacer that is only used when the regular columns overflow.
pub fn allocate_columns(
    num_batches: usize,
    layout: &BlockLayout,
    allow_adjacent_same_batch: bool,
) -> Result<ColumnPlan, AllocationError> {
    let cols = layout.cols();
    if num_batches == 0 {
        return Err(AllocationError::config("at least one batch is required"));
    }
    if num_batches > cols {
        return Err(AllocationError::InsufficientColumns { batches: num_batches, cols });
    }

    let base = cols / num_batches;
    let remainder = cols % num_batches;

    let mut spans = Vec::with_capacity(num_batches);
    let mut roles = Vec::with_capacity(cols);
    let mut start_col = 0;
    for batch in 0..num_batches {
        let width = base + usize::from(batch < remainder);
        spans.push(BatchSpan { batch, start_col, width });
        roles.extend((0..width).map(|_| ColumnRole::Seating { batch, spacer: false }));
        start_col += width;
    }

    let mut warnings = Vec::new();
    if num_batches == 1 {
        if !allow_adjacent_same_batch {
            for col in 0..cols {
                if layout.col_in_block(col).is_some_and(|i| i % 2 == 1) {
                    roles[col] = ColumnRole::Seating { batch: 0, spacer: true };
                }
            }
        }
    } else if !allow_adjacent_same_batch {
        let mut seating: Vec<usize> = spans.iter().map(|s| s.width).collect();
        for i in 0..num_batches - 1 {
            let left = spans[i];
            let right = spans[i + 1];
            if seating[i] >= 2 {
                roles[left.start_col + left.width - 1] = ColumnRole::Gap;
                seating[i] -= 1;
            } else if seating[i + 1] >= 2 {
                roles[right.start_col] = ColumnRole::Gap;
                seating[i + 1] -= 1;
            } else {
                let message = format!(
                    "no gap column between batch {} and batch {}: {} columns are too few for {} batches",
                    i + 1,
                    i + 2,
                    cols,
                    num_batches
                );
                warn!("{}", message);
                warnings.push(message);
            }
        }
    }

    Ok(ColumnPlan { roles, spans, warnings })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(num_batches: usize, cols: usize, width: usize, allow: bool) -> ColumnPlan {
        let layout = BlockLayout::uniform(cols, width).unwrap();
        allocate_columns(num_batches, &layout, allow).unwrap()
    }

    #[test]
    fn remainder_goes_to_leading_batches() {
        let p = plan(3, 8, 2, true);
        let widths: Vec<usize> = p.spans().iter().map(|s| s.width).collect();
        assert_eq!(widths, vec![3, 3, 2]);
        assert!(p.gap_columns().is_empty());
    }

    #[test]
    fn two_batches_on_six_columns_reserve_one_gap() {
        let p = plan(2, 6, 3, false);
        assert_eq!(p.gap_columns(), vec![2]);
        assert_eq!(p.fill_order(0), vec![0, 1]);
        assert_eq!(p.fill_order(1), vec![3, 4, 5]);
    }

    #[test]
    fn gap_moves_right_when_left_batch_has_one_column() {
        // spans: [0..2], [2..3], [3..4]
        let p = plan(3, 4, 2, false);
        assert_eq!(p.gap_columns(), vec![1]);
        assert_eq!(p.fill_order(0), vec![0]);
        assert_eq!(p.fill_order(1), vec![2]);
        assert_eq!(p.fill_order(2), vec![3]);
        assert_eq!(p.warnings().len(), 1);
    }

    #[test]
    fn every_batch_keeps_a_column() {
        let p = plan(4, 4, 2, false);
        for b in 0..4 {
            assert_eq!(p.seating_column_count(b), 1);
        }
        assert_eq!(p.warnings().len(), 3);
    }

    #[test]
    fn too_many_batches_is_an_error() {
        let layout = BlockLayout::uniform(3, 3).unwrap();
        let err = allocate_columns(4, &layout, false).unwrap_err();
        assert_eq!(err, AllocationError::InsufficientColumns { batches: 4, cols: 3 });
    }

    #[test]
    fn single_batch_uses_spacers_not_gaps() {
        let p = plan(1, 6, 3, false);
        assert!(p.gap_columns().is_empty());
        assert_eq!(p.fill_order(0), vec![0, 2, 3, 5, 1, 4]);
    }

    #[test]
    fn single_batch_with_adjacency_fills_densely() {
        let p = plan(1, 4, 2, true);
        assert_eq!(p.fill_order(0), vec![0, 1, 2, 3]);
    }

    #[test]
    fn columns_add_up() {
        for n in 1..=5 {
            let p = plan(n, 11, 3, false);
            let seating: usize = (0..n).map(|b| p.seating_column_count(b)).sum();
            assert_eq!(seating + p.gap_columns().len(), 11);
        }
    }
}
