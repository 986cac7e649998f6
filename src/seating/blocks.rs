use crate::error::AllocationError;

pub const DEFAULT_BLOCK_WIDTH: usize = 2;

/// A run of adjacent columns grouped visually (a bench row section).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub start_col: usize,
    pub width: usize,
}

impl Block {
    pub fn end_col(&self) -> usize {
        self.start_col + self.width
    }

    pub fn contains(&self, col: usize) -> bool {
        (self.start_col..self.end_col()).contains(&col)
    }
}

/// Ordered block boundaries. Widths always sum to `cols`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    cols: usize,
    blocks: Vec<Block>,
}

impl BlockLayout {
    /// A non-empty `block_structure` overrides `block_width`.
    pub fn resolve(
        cols: usize,
        block_width: Option<usize>,
        block_structure: Option<&[usize]>,
    ) -> Result<Self, AllocationError> {
        match block_structure {
            Some(widths) if !widths.is_empty() => Self::explicit(cols, widths),
            _ => Self::uniform(cols, block_width.unwrap_or(DEFAULT_BLOCK_WIDTH)),
        }
    }

    pub fn uniform(cols: usize, block_width: usize) -> Result<Self, AllocationError> {
        if cols == 0 {
            return Err(AllocationError::config("room must have at least one column"));
        }
        if block_width == 0 {
            return Err(AllocationError::config("block_width must be positive"));
        }

        let blocks = (0..cols)
            .step_by(block_width)
            .map(|start_col| Block { start_col, width: block_width.min(cols - start_col) })
            .collect();
        Ok(Self { cols, blocks })
    }

    pub fn explicit(cols: usize, widths: &[usize]) -> Result<Self, AllocationError> {
        if cols == 0 {
            return Err(AllocationError::config("room must have at least one column"));
        }
        if let Some(i) = widths.iter().position(|&w| w == 0) {
            return Err(AllocationError::config(format!(
                "block_structure entry {} is zero; every block needs a column",
                i
            )));
        }
        if let Some(i) = widths.iter().position(|&w| w > cols) {
            return Err(AllocationError::config(format!(
                "block_structure entry {} is wider than the room's {} columns",
                i, cols
            )));
        }
        let total = widths.iter().try_fold(0usize, |acc, &w| acc.checked_add(w));
        if total != Some(cols) {
            return Err(AllocationError::config(format!(
                "block_structure {:?} does not sum to the room's {} columns",
                widths, cols
            )));
        }

        let mut start_col = 0;
        let blocks = widths
            .iter()
            .map(|&width| {
                let block = Block { start_col, width };
                start_col += width;
                block
            })
            .collect();
        Ok(Self { cols, blocks })
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn widths(&self) -> Vec<usize> {
        self.blocks.iter().map(|b| b.width).collect()
    }

    /// `(start_col, width)` pairs in left-to-right order.
    pub fn boundaries(&self) -> Vec<(usize, usize)> {
        self.blocks.iter().map(|b| (b.start_col, b.width)).collect()
    }

    pub fn block_of(&self, col: usize) -> Option<usize> {
        self.blocks.iter().position(|b| b.contains(col))
    }

    pub fn col_in_block(&self, col: usize) -> Option<usize> {
        self.block_of(col).map(|i| col - self.blocks[i].start_col)
    }

    pub fn is_same_block(&self, a: usize, b: usize) -> bool {
        match (self.block_of(a), self.block_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_width_truncates_last_block() {
        let layout = BlockLayout::uniform(8, 3).unwrap();
        assert_eq!(layout.widths(), vec![3, 3, 2]);
        assert_eq!(layout.boundaries(), vec![(0, 3), (3, 3), (6, 2)]);
    }

    #[test]
    fn explicit_structure_is_accepted_when_it_sums_to_cols() {
        let layout = BlockLayout::resolve(8, Some(4), Some(&[3, 2, 3])).unwrap();
        assert_eq!(layout.widths(), vec![3, 2, 3]);
        assert_eq!(layout.block_of(0), Some(0));
        assert_eq!(layout.block_of(2), Some(0));
        assert_eq!(layout.block_of(3), Some(1));
        assert_eq!(layout.block_of(4), Some(1));
        assert_eq!(layout.block_of(5), Some(2));
        assert_eq!(layout.block_of(7), Some(2));
        assert_eq!(layout.block_of(8), None);
    }

    #[test]
    fn explicit_structure_with_wrong_sum_is_rejected() {
        let err = BlockLayout::resolve(8, None, Some(&[3, 2, 2])).unwrap_err();
        assert!(matches!(err, AllocationError::Configuration(_)));
    }

    #[test]
    fn oversized_widths_are_rejected_without_overflow() {
        let err = BlockLayout::explicit(1, &[usize::MAX, 2]).unwrap_err();
        assert!(matches!(err, AllocationError::Configuration(_)));
        assert!(BlockLayout::explicit(4, &[2, usize::MAX - 1, 3]).is_err());
        assert!(BlockLayout::explicit(4, &[5]).is_err());
    }

    #[test]
    fn empty_structure_falls_back_to_width() {
        let layout = BlockLayout::resolve(6, Some(3), Some(&[])).unwrap();
        assert_eq!(layout.widths(), vec![3, 3]);
    }

    #[test]
    fn default_width_applies_when_nothing_given() {
        let layout = BlockLayout::resolve(5, None, None).unwrap();
        assert_eq!(layout.widths(), vec![2, 2, 1]);
    }

    #[test]
    fn zero_width_and_zero_cols_are_rejected() {
        assert!(BlockLayout::uniform(6, 0).is_err());
        assert!(BlockLayout::uniform(0, 2).is_err());
        assert!(BlockLayout::explicit(4, &[4, 0]).is_err());
    }

    #[test]
    fn block_position_helpers() {
        let layout = BlockLayout::uniform(6, 3).unwrap();
        assert!(layout.is_same_block(0, 2));
        assert!(!layout.is_same_block(2, 3));
        assert!(layout.is_same_block(3, 5));
        assert_eq!(layout.col_in_block(3), Some(0));
        assert_eq!(layout.col_in_block(4), Some(1));
    }
}
