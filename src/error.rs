use thiserror::Error;

/// Structural problems with a generation request. Always reported verbatim,
/// never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Insufficient columns: {batches} batches cannot share {cols} columns")]
    InsufficientColumns { batches: usize, cols: usize },
}

impl AllocationError {
    pub fn config(message: impl Into<String>) -> Self {
        AllocationError::Configuration(message.into())
    }
}

impl From<validator::ValidationErrors> for AllocationError {
    fn from(err: validator::ValidationErrors) -> Self {
        AllocationError::Configuration(format!("invalid request: {}", err))
    }
}

/// Failures of the underlying keyed blob store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "redis-store")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend unavailable: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid plan id: {0:?}")]
    InvalidPlanId(String),

    #[error("Invalid room name: {0:?}")]
    InvalidRoomName(String),

    #[error("Plan {0} not found")]
    PlanNotFound(String),

    #[error("Room {room:?} not found in plan {plan_id}")]
    RoomNotFound { plan_id: String, room: String },

    #[error("Plan {0} is finalized")]
    PlanFinalized(String),

    /// Malformed snapshot. Fatal for this plan only.
    #[error("Snapshot for plan {plan_id} is corrupt: {source}")]
    Corruption {
        plan_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors surfaced by the service layer that drives the pipeline and the cache.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Seat ({row}, {col}) is outside the {rows}x{cols} grid of room {room:?}")]
    SeatOutOfRange {
        room: String,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Seat ({row}, {col}) cannot be used: {reason}")]
    SeatUnavailable {
        row: usize,
        col: usize,
        reason: String,
    },
}
