//! Domain error types.
//!
//! These errors represent construction failures and data inconsistencies
//! in the baseline schedule. They are distinct from real-time rejections,
//! which live in [`crate::realtime::RejectReason`].

use super::{StopId, TripId};

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DomainError {
    /// A stop pattern must visit at least two stops
    #[error("stop pattern needs at least 2 stops, got {0}")]
    PatternTooShort(usize),

    /// A per-stop array does not have one entry per pattern stop
    #[error("{field} has {actual} entries, pattern has {expected} stops")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Scheduled times decrease somewhere along the trip
    #[error("scheduled times of trip {0} are not increasing")]
    ScheduleNotIncreasing(TripId),

    /// A pattern references a stop that was not imported
    #[error("unknown stop {0}")]
    UnknownStop(StopId),

    /// A trip appears in more than one pattern
    #[error("duplicate trip {0}")]
    DuplicateTrip(TripId),

    /// A service date string could not be parsed
    #[error("invalid service date: {0}")]
    InvalidServiceDate(String),
}
