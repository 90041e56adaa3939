//! Real-time update engine.
//!
//! Turns one incoming message plus the current timetable into a new,
//! validated `TripTimes`. Everything here is synchronous and pure: the
//! inputs are never modified, and a rejected message leaves no trace.

mod error;
mod estimated;
mod matcher;
mod propagate;
mod resolve;
mod trip_matcher;
mod trip_update;
mod vehicle_position;

use chrono_tz::Tz;

use crate::domain::{StationResolver, StopPattern, TripTimes, TripTimesBuilder};

pub use error::RejectReason;
pub use estimated::{apply_estimated_journey, map_dropoff, map_pickup};
pub use matcher::{CallMatch, MatchedCalls, match_calls, stop_matches};
pub use propagate::DelayPropagator;
pub use resolve::{
    ResolvedTimes, ServiceClock, StopPosition, prioritized_time, resolve_call_times,
    resolve_service_date,
};
pub use trip_matcher::TripMatcher;
pub use trip_update::apply_trip_update;
pub use vehicle_position::apply_vehicle_position;

/// Collaborators needed to apply a message.
#[derive(Clone, Copy)]
pub struct UpdateContext<'a> {
    /// Stop lookup for station-level matching
    pub resolver: &'a dyn StationResolver,
    /// Time zone the feed's service days are defined in
    pub time_zone: Tz,
}

impl<'a> UpdateContext<'a> {
    /// Creates a context.
    pub fn new(resolver: &'a dyn StationResolver, time_zone: Tz) -> Self {
        Self {
            resolver,
            time_zone,
        }
    }
}

/// Accept `candidate` only if every value fit, it has the stops of `pattern`
/// and its times never decrease.
pub fn validate(candidate: TripTimesBuilder, pattern: &StopPattern) -> Result<TripTimes, RejectReason> {
    if let Some(stop) = candidate.out_of_range_stop() {
        return Err(RejectReason::TimeOutOfRange { stop });
    }
    let candidate = candidate.build();
    if candidate.num_stops() != pattern.len() {
        return Err(RejectReason::StopCountMismatch {
            expected: pattern.len(),
            actual: candidate.num_stops(),
        });
    }
    if let Some(stop) = candidate.first_decreasing_stop() {
        return Err(RejectReason::MonotonicityViolation { stop });
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::{regular_pattern, trip_times};

    #[test]
    fn validate_checks_stop_count_then_order() {
        let pattern = regular_pattern(3);
        let tt = trip_times(&pattern, &[0, 600, 1200]);
        assert!(validate(tt.to_builder(), &pattern).is_ok());

        let other = regular_pattern(4);
        assert_eq!(
            validate(tt.to_builder(), &other),
            Err(RejectReason::StopCountMismatch {
                expected: 4,
                actual: 3
            })
        );

        let mut b = tt.to_builder();
        b.set_arrival_delay(2, -700);
        assert_eq!(
            validate(b, &pattern),
            Err(RejectReason::MonotonicityViolation { stop: 2 })
        );
    }

    #[test]
    fn validate_rejects_overflowing_values_first() {
        let pattern = regular_pattern(3);
        let mut b = trip_times(&pattern, &[0, 600, 1200]).to_builder();
        b.set_arrival_delay(0, 5000).set_departure_delay(2, i32::MAX);
        assert_eq!(
            validate(b, &pattern),
            Err(RejectReason::TimeOutOfRange { stop: 2 })
        );
    }
}
