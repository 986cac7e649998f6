pub mod batch;
pub mod plan;
pub mod seat;
pub mod snapshot;

pub use batch::{Batch, BatchId, BatchRecord, BranchInfo, CohortInfo, Student};
pub use plan::{
    AllocationResult, ConstraintResult, GenerationRequest, GenerationResponse, Priority, Summary,
    ValidationReport,
};
pub use seat::{Occupant, PaperSet, Seat, SeatState};
pub use snapshot::{BatchEntry, PlanStatus, RoomEntry, RoomInputs, SessionSnapshot};
