//! Applying estimated journeys (SIRI ET).

use tracing::debug;

use crate::domain::{
    ArrivalBoardingActivity, CallKind, CallStatus, DepartureBoardingActivity, EstimatedJourney,
    PickDrop, RealTimeState, ServiceDate, TripTimes, TripTimesBuilder,
};
use crate::timetable::Timetable;

use super::{
    CallMatch, DelayPropagator, RejectReason, ServiceClock, StopPosition, UpdateContext,
    match_calls, resolve_call_times, validate,
};

/// Alighting permission after an arrival boarding activity.
///
/// `None` means the current value stays. `Alighting` only re-opens a stop
/// that is currently not routable; it never loosens a planned restriction.
pub fn map_dropoff(current: PickDrop, activity: ArrivalBoardingActivity) -> Option<PickDrop> {
    match activity {
        ArrivalBoardingActivity::Alighting => current.is_not_routable().then_some(PickDrop::Scheduled),
        ArrivalBoardingActivity::NoAlighting => Some(PickDrop::None),
        ArrivalBoardingActivity::PassThru => Some(PickDrop::Cancelled),
    }
}

/// Boarding permission after a departure boarding activity.
pub fn map_pickup(current: PickDrop, activity: DepartureBoardingActivity) -> Option<PickDrop> {
    match activity {
        DepartureBoardingActivity::Boarding => current.is_not_routable().then_some(PickDrop::Scheduled),
        DepartureBoardingActivity::NoBoarding => Some(PickDrop::None),
        DepartureBoardingActivity::PassThru => Some(PickDrop::Cancelled),
    }
}

/// Build the new times of the trip `journey` refers to.
///
/// The trip is looked up in `timetable` by raw id. Times of the timetable are
/// never modified; the caller stores the returned value.
pub fn apply_estimated_journey(
    timetable: &Timetable,
    journey: &EstimatedJourney,
    service_date: ServiceDate,
    ctx: &UpdateContext<'_>,
) -> Result<TripTimes, RejectReason> {
    let existing = timetable
        .trip_index_by_raw_id(&journey.trip_ref)
        .and_then(|index| timetable.trip_times(index))
        .ok_or_else(|| RejectReason::NotFound(journey.trip_ref.clone()))?;

    if journey.cancellation {
        debug!(trip = %journey.trip_ref, "trip cancelled");
        let mut times = existing.to_builder();
        times.cancel_trip();
        return Ok(times.build());
    }

    if journey.num_calls() == 0 {
        return Err(RejectReason::EmptyJourney);
    }

    let pattern = &timetable.pattern().stop_pattern;
    let matched = match_calls(pattern, journey, ctx.resolver)?;
    let clock = ServiceClock::new(service_date, ctx.time_zone);

    let mut times = TripTimesBuilder::from_schedule(existing, pattern);
    let mut propagator = DelayPropagator::new();
    let num_stops = pattern.len();

    for stop in 0..num_stops {
        match matched.at(stop) {
            Some(call_match) => {
                let position = StopPosition { index: stop, num_stops };
                apply_call(&mut times, position, call_match, journey.prediction_inaccurate, &clock)?;
                propagator.matched(&times, stop);
            }
            None => propagator.fill_unmatched(&mut times, stop, pattern, existing),
        }
    }

    times.set_real_time_state(if matched.stop_pattern_changed() {
        RealTimeState::Modified
    } else {
        RealTimeState::Updated
    });

    validate(times, pattern)
}

fn apply_call(
    times: &mut TripTimesBuilder,
    position: StopPosition,
    call_match: &CallMatch<'_>,
    journey_prediction_inaccurate: bool,
    clock: &ServiceClock,
) -> Result<(), RejectReason> {
    let stop = position.index;
    let call = call_match.call;

    if call.arrival_status == Some(CallStatus::Cancelled) {
        times.set_dropoff(stop, PickDrop::Cancelled);
    } else if let Some(value) = call
        .arrival_boarding_activity
        .and_then(|activity| map_dropoff(times.dropoff(stop), activity))
    {
        times.set_dropoff(stop, value);
    }

    if call.departure_status == Some(CallStatus::Cancelled) {
        times.set_pickup(stop, PickDrop::Cancelled);
    } else if let Some(value) = call
        .departure_boarding_activity
        .and_then(|activity| map_pickup(times.pickup(stop), activity))
    {
        times.set_pickup(stop, value);
    }

    if call.cancellation {
        times.cancel_stop(stop);
    }

    if call_match.kind == CallKind::Estimated {
        times.set_prediction_inaccurate(stop, journey_prediction_inaccurate || call.prediction_inaccurate);
        if let Some(display) = &call.destination_display {
            times.set_headsign(stop, display);
        }
    }

    let current = (times.arrival(stop), times.departure(stop));
    let resolved = resolve_call_times(call_match.kind, call, position, current, clock)?;
    times
        .set_arrival_time(stop, resolved.arrival)
        .set_departure_time(stop, resolved.departure);
    if resolved.recorded {
        times.set_recorded(stop);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use chrono::{DateTime, FixedOffset, TimeZone};

    use crate::domain::{
        FeedScopedId, PatternId, PatternStop, ScheduledTrip, ServiceDate, Stop, StopIndex,
        StopPattern, TripPattern, TripTimes,
    };
    use crate::timetable::Timetable;

    pub const TZ: chrono_tz::Tz = chrono_tz::Europe::Oslo;

    pub fn date() -> ServiceDate {
        ServiceDate::parse("2024-03-15").unwrap()
    }

    /// Instant `secs` after the start of service on 2024-03-15 in Oslo.
    pub fn at(secs: i32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 15, 0, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(i64::from(secs))
    }

    /// Quays `Q0..Qn` in feed `RB`. `Q1` belongs to station `S1`, which
    /// also has quay `Q1b`.
    pub fn stops(n: usize) -> (StopIndex, Vec<Arc<Stop>>) {
        let mut index = StopIndex::new();
        let quays = (0..n)
            .map(|i| {
                let stop = Stop::new(FeedScopedId::new("RB", format!("Q{i}")), format!("Quay {i}"));
                let stop = if i == 1 {
                    stop.with_parent_station(FeedScopedId::new("RB", "S1"))
                } else {
                    stop
                };
                index.insert(stop)
            })
            .collect();
        index.insert(
            Stop::new(FeedScopedId::new("RB", "Q1b"), "Quay 1b")
                .with_parent_station(FeedScopedId::new("RB", "S1")),
        );
        (index, quays)
    }

    /// Timetable with trip `T1` over `times` (arrival equals departure);
    /// stops listed in `pass_through` are neither boarded nor alighted.
    pub fn timetable(times: &[i32], pass_through: &[usize]) -> (StopIndex, Timetable) {
        let (index, quays) = stops(times.len());
        let pattern_stops = quays
            .into_iter()
            .enumerate()
            .map(|(i, stop)| {
                if pass_through.contains(&i) {
                    PatternStop::pass_through(stop)
                } else {
                    PatternStop::regular(stop)
                }
            })
            .collect();
        let stop_pattern = Arc::new(StopPattern::new(pattern_stops).unwrap());
        let pattern = Arc::new(TripPattern::new(
            PatternId(FeedScopedId::new("RB", "P1")),
            stop_pattern.clone(),
        ));
        let trip = ScheduledTrip::new(
            FeedScopedId::new("RB", "T1"),
            stop_pattern,
            times.to_vec(),
            times.to_vec(),
        )
        .unwrap();

        let mut table = Timetable::new(pattern);
        table
            .add_trip_times(TripTimes::scheduled(&trip).unwrap())
            .unwrap();
        (index, table)
    }
}


#[cfg(test)]
mod proptests {
    use super::fixtures::*;
    use super::*;
    use crate::domain::Call;
    use proptest::prelude::*;

    /// Optional expected arrival/departure offsets for each of four stops.
    fn call_strategy() -> impl Strategy<Value = Vec<Option<(i32, i32)>>> {
        prop::collection::vec(prop::option::of((-300i32..900, 0i32..120)), 4)
    }

    proptest! {
        /// Accepted results never decrease; rejected ones leave the base as is.
        #[test]
        fn results_are_monotonic_or_rejected(offsets in call_strategy()) {
            let schedule = [0, 600, 1200, 1800];
            let (index, table) = timetable(&schedule, &[]);
            let base = table.trip_times(0).unwrap().clone();

            let calls = offsets
                .iter()
                .enumerate()
                .filter_map(|(i, o)| o.map(|(delay, dwell)| (i, delay, dwell)))
                .map(|(i, delay, dwell)| {
                    let mut call = Call::at(format!("Q{i}"));
                    call.arrival.expected = Some(at(schedule[i] + delay));
                    call.departure.expected = Some(at(schedule[i] + delay + dwell));
                    call
                })
                .collect::<Vec<_>>();
            prop_assume!(!calls.is_empty());

            let j = EstimatedJourney {
                trip_ref: "T1".into(),
                estimated_calls: calls,
                ..EstimatedJourney::default()
            };
            let ctx = UpdateContext::new(&index, TZ);

            match apply_estimated_journey(&table, &j, date(), &ctx) {
                Ok(tt) => {
                    prop_assert!(tt.times_increasing());
                    let again = apply_estimated_journey(&table, &j, date(), &ctx).unwrap();
                    prop_assert_eq!(tt, again);
                }
                Err(reason) => {
                    let is_monotonicity = matches!(reason, RejectReason::MonotonicityViolation { .. });
                    prop_assert!(is_monotonicity);
                }
            }
            prop_assert_eq!(table.trip_times(0).unwrap(), &base);
        }
    }
}
