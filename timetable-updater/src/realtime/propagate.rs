//! Delay propagation to stops without a matching call.

use crate::domain::{PickDrop, StopPattern, TripTimes, TripTimesBuilder};

/// Running state of a stop-by-stop scan.
///
/// Call [`DelayPropagator::matched`] after writing a matched stop and
/// [`DelayPropagator::fill_unmatched`] for every other stop, in stop order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayPropagator {
    last_arrival_delay: i32,
    last_departure_delay: i32,
    departure_from_previous_stop: Option<i32>,
}

impl DelayPropagator {
    /// State before the first stop.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a matched stop has established a non-zero delay.
    pub fn has_delay(&self) -> bool {
        self.last_arrival_delay != 0 || self.last_departure_delay != 0
    }

    /// Remember the delays written for matched `stop`.
    pub fn matched(&mut self, times: &TripTimesBuilder, stop: usize) {
        self.last_arrival_delay = times.arrival_delay(stop);
        self.last_departure_delay = times.departure_delay(stop);
        self.departure_from_previous_stop = Some(times.departure(stop));
    }

    /// Write times for unmatched `stop`.
    ///
    /// A stop the pattern neither boards nor alights at collapses onto the
    /// previous departure. Other stops carry the last delay forward, or keep
    /// the `existing` delays while no delay has been established.
    pub fn fill_unmatched(
        &mut self,
        times: &mut TripTimesBuilder,
        stop: usize,
        pattern: &StopPattern,
        existing: &TripTimes,
    ) {
        match self.departure_from_previous_stop {
            Some(previous) if pattern.is_board_and_alight_at(stop, PickDrop::None) => {
                times
                    .set_arrival_time(stop, previous)
                    .set_departure_time(stop, previous);
            }
            _ => {
                let (arrival_delay, departure_delay) = if self.has_delay() {
                    (self.last_arrival_delay, self.last_departure_delay)
                } else {
                    (existing.arrival_delay(stop), existing.departure_delay(stop))
                };
                times
                    .set_arrival_delay(stop, arrival_delay)
                    .set_departure_delay(stop, departure_delay);
            }
        }
        self.departure_from_previous_stop = Some(times.departure(stop));
    }
}


#[cfg(test)]
mod proptests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{FeedScopedId, PatternStop, ScheduledTrip, Stop};
    use proptest::prelude::*;

    proptest! {
        /// An unmatched pass-through stop always equals the previous departure,
        /// whatever stale delay it had.
        #[test]
        fn pass_through_ignores_stale_delay(
            matched_delay in -120i32..600,
            stale in -600i32..600,
        ) {
            let stops = (0..3)
                .map(|i| {
                    let stop = Arc::new(Stop::new(FeedScopedId::new("F", format!("S{i}")), ""));
                    if i == 1 { PatternStop::pass_through(stop) } else { PatternStop::regular(stop) }
                })
                .collect();
            let pattern = Arc::new(StopPattern::new(stops).unwrap());
            let trip = ScheduledTrip::new(
                FeedScopedId::new("F", "T1"),
                pattern.clone(),
                vec![0, 600, 1200],
                vec![0, 600, 1200],
            ).unwrap();
            let mut eb = TripTimes::scheduled(&trip).unwrap().to_builder();
            eb.set_arrival_delay(1, stale).set_departure_delay(1, stale);
            let existing = eb.build();

            let mut b = TripTimesBuilder::from_schedule(&existing, &pattern);
            let mut p = DelayPropagator::new();
            b.set_arrival_delay(0, matched_delay).set_departure_delay(0, matched_delay);
            p.matched(&b, 0);
            p.fill_unmatched(&mut b, 1, &pattern, &existing);

            prop_assert_eq!(b.arrival(1), b.departure(0));
            prop_assert_eq!(b.departure(1), b.departure(0));
        }
    }
}
