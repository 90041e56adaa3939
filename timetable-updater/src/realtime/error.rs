//! Real-time update rejection reasons.

/// Why a single real-time message was not applied.
///
/// Rejections are local to one message: the batch continues and the
/// previously published times stay in effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    /// Trip absent from the targeted pattern/timetable
    #[error("trip {0} not found")]
    NotFound(String),

    /// Calls could not be aligned one-to-one with the pattern stops
    #[error("{calls} calls could not be aligned with {stops} stops ({matched} matched)")]
    StructuralMismatch {
        calls: usize,
        stops: usize,
        matched: usize,
    },

    /// Resulting times decrease somewhere along the trip
    #[error("times are not increasing at stop {stop}")]
    MonotonicityViolation { stop: usize },

    /// A time or delay does not fit the service-day clock
    #[error("time at stop {stop} is out of range")]
    TimeOutOfRange { stop: usize },

    /// Resulting stop count differs from the pattern
    #[error("result has {actual} stops, pattern has {expected}")]
    StopCountMismatch { expected: usize, actual: usize },

    /// Vehicle position update without a monitored stop
    #[error("vehicle position update has no monitored call")]
    MissingMonitoredCall,

    /// Neither calls nor a cancellation
    #[error("update has no calls")]
    EmptyJourney,

    /// No service date in the message and none derivable from its calls
    #[error("cannot determine service date of trip {0}")]
    UnknownServiceDate(String),

    /// A stop-sequence update skips a stop
    #[error("skipped stops are not supported")]
    PartialCancellationUnsupported,

    /// A stop-sequence update matched no stop of the trip
    #[error("stop time update {index} does not match any stop of the trip")]
    UnmatchedStopTimeUpdate { index: usize },
}

impl RejectReason {
    /// Short, stable label for summaries and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::NotFound(_) => "not_found",
            RejectReason::StructuralMismatch { .. } => "structural_mismatch",
            RejectReason::MonotonicityViolation { .. } => "monotonicity_violation",
            RejectReason::TimeOutOfRange { .. } => "time_out_of_range",
            RejectReason::StopCountMismatch { .. } => "stop_count_mismatch",
            RejectReason::MissingMonitoredCall => "missing_monitored_call",
            RejectReason::EmptyJourney => "empty_journey",
            RejectReason::UnknownServiceDate(_) => "unknown_service_date",
            RejectReason::PartialCancellationUnsupported => "partial_cancellation_unsupported",
            RejectReason::UnmatchedStopTimeUpdate { .. } => "unmatched_stop_time_update",
        }
    }
}
