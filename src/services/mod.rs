pub mod externals;
pub mod seating;

pub use externals::{ExternalStudent, ExternalStudentService};
pub use seating::{fingerprint, GenerationOutcome, ResultSource, SeatingService};

use std::collections::HashMap;

use crate::error::AllocationError;
use crate::models::snapshot::RoomEntry;
use crate::seating::blocks::BlockLayout;
use crate::seating::validator::{self, ValidationContext};

/// Re-runs the checks on a stored room, e.g. after a seat patch or when the
/// room lands in a plan with different neighbours.
pub(crate) fn revalidate(
    entry: &mut RoomEntry,
    other_rooms: &HashMap<String, String>,
) -> Result<(), AllocationError> {
    let inputs = &entry.inputs;
    let layout =
        BlockLayout::resolve(inputs.cols, inputs.block_width, inputs.block_structure.as_deref())?;
    let records = entry.to_result().batches;
    let ctx = ValidationContext {
        layout: &layout,
        allow_adjacent_same_batch: inputs.allow_adjacent_same_batch,
        other_rooms,
    };
    entry.constraints = validator::validate(&entry.raw_matrix, &records, &ctx);
    Ok(())
}
