//! Applying stop-sequence trip updates (GTFS-RT).
//!
//! Updates are expected in stop order. Each one is matched by stop sequence,
//! or by raw stop id when the sequence is missing; the last delay seen is
//! carried to stops without an update.

use tracing::trace;

use crate::domain::{
    RealTimeState, StopPattern, StopScheduleRelationship, StopTimeEvent, StopTimeUpdate, TripScheduleRelationship,
    TripTimes, TripTimesBuilder, TripUpdate,
};
use crate::timetable::Timetable;

use super::{RejectReason, UpdateContext, validate};

#[derive(Debug, Clone, Copy)]
enum Event {
    Arrival,
    Departure,
}

impl Event {
    fn set_time(self, times: &mut TripTimesBuilder, stop: usize, time: i32) {
        match self {
            Event::Arrival => times.set_arrival_time(stop, time),
            Event::Departure => times.set_departure_time(stop, time),
        };
    }

    fn set_delay(self, times: &mut TripTimesBuilder, stop: usize, delay: i32) {
        match self {
            Event::Arrival => times.set_arrival_delay(stop, delay),
            Event::Departure => times.set_departure_delay(stop, delay),
        };
    }

    fn delay(self, times: &TripTimes, stop: usize) -> i32 {
        match self {
            Event::Arrival => times.arrival_delay(stop),
            Event::Departure => times.departure_delay(stop),
        }
    }
}

fn update_matches(update: &StopTimeUpdate, stop: usize, existing: &TripTimes, pattern: &StopPattern) -> bool {
    match (update.stop_sequence, &update.stop_id) {
        (Some(sequence), _) => sequence == existing.stop_sequence(stop),
        (None, Some(stop_id)) => pattern.stop(stop).is_some_and(|s| s.id.id() == stop_id),
        (None, None) => false,
    }
}

/// Write one event and update the carried delay.
///
/// An absolute time wins for the value; a given delay wins for what is
/// carried forward. Without either, the carried delay (or zero) applies.
fn apply_event(
    times: &mut TripTimesBuilder,
    stop: usize,
    event: Event,
    update: Option<StopTimeEvent>,
    carried: &mut Option<i32>,
    start_of_service: i64,
) -> Result<(), RejectReason> {
    match update.map(|e| (e.time, e.delay)) {
        Some((Some(time), given_delay)) => {
            let seconds = time
                .checked_sub(start_of_service)
                .and_then(|secs| i32::try_from(secs).ok())
                .ok_or(RejectReason::TimeOutOfRange { stop })?;
            event.set_time(times, stop, seconds);
            *carried = Some(given_delay.unwrap_or_else(|| event.delay(times, stop)));
        }
        Some((None, Some(delay))) => {
            event.set_delay(times, stop, delay);
            *carried = Some(delay);
        }
        _ => event.set_delay(times, stop, carried.unwrap_or(0)),
    }
    Ok(())
}

/// Build the new times of the trip `update` refers to.
pub fn apply_trip_update(
    timetable: &Timetable,
    update: &TripUpdate,
    ctx: &UpdateContext<'_>,
) -> Result<TripTimes, RejectReason> {
    let existing = timetable
        .trip_index_by_raw_id(&update.trip_ref)
        .and_then(|index| timetable.trip_times(index))
        .ok_or_else(|| RejectReason::NotFound(update.trip_ref.clone()))?;

    if update.schedule_relationship == TripScheduleRelationship::Canceled {
        let mut times = existing.to_builder();
        times.cancel_trip();
        return Ok(times.build());
    }

    if update.stop_time_updates.is_empty() {
        return Err(RejectReason::EmptyJourney);
    }

    let pattern = &timetable.pattern().stop_pattern;
    let start_of_service = update
        .service_date
        .start_of_service(ctx.time_zone)
        .timestamp();
    let mut updates = update.stop_time_updates.iter().enumerate().peekable();
    let mut times = TripTimesBuilder::from_schedule(existing, pattern);
    let mut delay: Option<i32> = None;

    for stop in 0..existing.num_stops() {
        let Some((_, stop_update)) =
            updates.next_if(|(_, u)| update_matches(u, stop, existing, pattern))
        else {
            let carried = delay.unwrap_or(0);
            times
                .set_arrival_delay(stop, carried)
                .set_departure_delay(stop, carried);
            continue;
        };

        match stop_update.schedule_relationship {
            StopScheduleRelationship::Skipped => {
                return Err(RejectReason::PartialCancellationUnsupported);
            }
            StopScheduleRelationship::NoData => {
                times.set_arrival_delay(stop, 0).set_departure_delay(stop, 0);
                delay = Some(0);
            }
            StopScheduleRelationship::Scheduled => {
                apply_event(&mut times, stop, Event::Arrival, stop_update.arrival, &mut delay, start_of_service)?;
                apply_event(
                    &mut times,
                    stop,
                    Event::Departure,
                    stop_update.departure,
                    &mut delay,
                    start_of_service,
                )?;
            }
        }
    }

    if let Some((index, _)) = updates.next() {
        trace!(trip = %update.trip_ref, index, "stop time update left over");
        return Err(RejectReason::UnmatchedStopTimeUpdate { index });
    }

    times.set_real_time_state(RealTimeState::Updated);
    validate(times, pattern)
}
