//! Time resolution for matched calls.
//!
//! Each call event carries up to three timestamps. The best one is picked by
//! priority (actual, then expected, then aimed) and converted to seconds since
//! the start of service of the trip's service date.

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use tracing::warn;

use crate::domain::{Call, CallKind, CallTimes, EstimatedJourney, ServiceDate, TripTimes, day_offset};

use super::RejectReason;

/// Converts feed timestamps to seconds since start of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceClock {
    pub service_date: ServiceDate,
    pub time_zone: Tz,
}

impl ServiceClock {
    /// Creates a clock for `service_date` in `time_zone`.
    pub fn new(service_date: ServiceDate, time_zone: Tz) -> Self {
        Self {
            service_date,
            time_zone,
        }
    }

    /// Seconds since the start of service of `instant`, if representable.
    pub fn seconds(&self, instant: DateTime<FixedOffset>) -> Option<i32> {
        self.service_date
            .seconds_since_start_of_service(self.time_zone, &instant)
    }
}

/// The highest-priority timestamp of an event.
///
/// Estimated calls never contribute an actual time.
pub fn prioritized_time(kind: CallKind, times: &CallTimes) -> Option<DateTime<FixedOffset>> {
    let actual = match kind {
        CallKind::Recorded => times.actual,
        CallKind::Estimated => None,
    };
    actual.or(times.expected).or(times.aimed)
}

/// Position of a stop within its trip, for the boundary fallback rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPosition {
    pub index: usize,
    pub num_stops: usize,
}

impl StopPosition {
    fn is_first(self) -> bool {
        self.index == 0
    }

    fn is_last(self) -> bool {
        self.index + 1 == self.num_stops
    }
}

/// Resolved times of one matched stop, in seconds since start of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTimes {
    pub arrival: i32,
    pub departure: i32,
    /// An actual time was observed for either event
    pub recorded: bool,
}

/// Resolves arrival and departure of a matched call.
///
/// Missing values fall back to the `current` arrival and departure, except
/// at the first stop, where a missing arrival first takes the resolved
/// departure, and at the last stop, where a missing departure first takes the
/// resolved arrival.
///
/// A fallback value never contradicts the event that was given: a missing
/// arrival is not later than the resolved departure, and a missing departure
/// is not earlier than the resolved arrival.
///
/// A timestamp too far from the service date to be counted in seconds is
/// rejected.
pub fn resolve_call_times(
    kind: CallKind,
    call: &Call,
    position: StopPosition,
    (current_arrival, current_departure): (i32, i32),
    clock: &ServiceClock,
) -> Result<ResolvedTimes, RejectReason> {
    let arrival = &call.arrival;
    let departure = &call.departure;
    let seconds = |time: Option<DateTime<FixedOffset>>| {
        time.map(|t| {
            clock
                .seconds(t)
                .ok_or(RejectReason::TimeOutOfRange { stop: position.index })
        })
        .transpose()
    };
    let realtime_arrival = seconds(prioritized_time(kind, arrival))?;
    let realtime_departure = seconds(prioritized_time(kind, departure))?;

    let resolved_arrival = realtime_arrival
        .or(realtime_departure.filter(|_| position.is_first()))
        .unwrap_or_else(|| realtime_departure.map_or(current_arrival, |d| current_arrival.min(d)));
    let resolved_departure = realtime_departure
        .or(realtime_arrival.filter(|_| position.is_last()))
        .unwrap_or_else(|| realtime_arrival.map_or(current_departure, |a| current_departure.max(a)));

    let recorded = kind == CallKind::Recorded
        && (arrival.actual.is_some() || departure.actual.is_some());

    Ok(ResolvedTimes {
        arrival: resolved_arrival,
        departure: resolved_departure,
        recorded,
    })
}

/// The service date an estimated journey refers to.
///
/// Uses the journey's data-frame reference when it parses. Otherwise the
/// first call's aimed departure, in `tz`, minus the number of whole days the
/// trip's first departure lies past midnight. Returns `None` if neither is
/// available.
pub fn resolve_service_date(
    journey: &EstimatedJourney,
    existing: &TripTimes,
    tz: Tz,
) -> Option<ServiceDate> {
    if let Some(frame) = &journey.data_frame_ref {
        match ServiceDate::parse(frame) {
            Ok(date) => return Some(date),
            Err(_) => warn!(trip = %journey.trip_ref, data_frame = %frame, "invalid data frame reference"),
        }
    }

    let first_departure = journey.first_call()?.departure.aimed?;
    let local = first_departure.with_timezone(&tz).date_naive();
    Some(ServiceDate::new(local).minus_days(day_offset(existing.departure(0))))
}
