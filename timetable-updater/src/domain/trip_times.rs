//! Per-trip, per-service-day arrival and departure times.
//!
//! A `TripTimes` is never changed once it has been placed in a timetable.
//! Real-time updates start from a [`TripTimesBuilder`], which owns a private
//! copy, and produce a new value.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::{PickDrop, ScheduledTrip, StopPattern, TripId};

/// How a trip's times relate to the schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealTimeState {
    /// No real-time data applied
    #[default]
    Scheduled,
    /// Delays applied, stop pattern unchanged
    Updated,
    /// A stop was replaced by another stop of the same station
    Modified,
    /// The whole trip is cancelled
    Canceled,
}

/// Arrival/departure times of one trip on one service day.
///
/// Scheduled times are shared with every other `TripTimes` of the same trip;
/// delays and per-stop flags are owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripTimes {
    trip_id: TripId,
    scheduled_arrivals: Arc<[i32]>,
    scheduled_departures: Arc<[i32]>,
    stop_sequences: Arc<[u32]>,
    arrival_delays: Vec<i32>,
    departure_delays: Vec<i32>,
    pickups: Vec<PickDrop>,
    dropoffs: Vec<PickDrop>,
    cancelled: Vec<bool>,
    recorded: Vec<bool>,
    prediction_inaccurate: Vec<bool>,
    headsigns: Vec<Option<Arc<str>>>,
    real_time_state: RealTimeState,
}

impl TripTimes {
    /// Create the scheduled realization of an imported trip.
    pub fn scheduled(trip: &ScheduledTrip) -> Result<Self, DomainError> {
        let n = trip.pattern.len();
        let times = Self {
            trip_id: trip.id.clone(),
            scheduled_arrivals: trip.arrivals().into(),
            scheduled_departures: trip.departures().into(),
            stop_sequences: trip.stop_sequences().into(),
            arrival_delays: vec![0; n],
            departure_delays: vec![0; n],
            pickups: trip.pattern.stops().iter().map(|s| s.pickup).collect(),
            dropoffs: trip.pattern.stops().iter().map(|s| s.dropoff).collect(),
            cancelled: vec![false; n],
            recorded: vec![false; n],
            prediction_inaccurate: vec![false; n],
            headsigns: vec![None; n],
            real_time_state: RealTimeState::Scheduled,
        };
        if !times.times_increasing() {
            return Err(DomainError::ScheduleNotIncreasing(trip.id.clone()));
        }
        Ok(times)
    }

    /// Start an update from a copy of these times.
    pub fn to_builder(&self) -> TripTimesBuilder {
        TripTimesBuilder {
            inner: self.clone(),
            out_of_range: None,
        }
    }

    /// Trip id.
    pub fn trip_id(&self) -> &TripId {
        &self.trip_id
    }

    /// Number of stops.
    pub fn num_stops(&self) -> usize {
        self.scheduled_arrivals.len()
    }

    /// Scheduled arrival at `stop`.
    ///
    /// All per-stop accessors panic if `stop` is out of bounds.
    pub fn scheduled_arrival(&self, stop: usize) -> i32 {
        self.scheduled_arrivals[stop]
    }

    /// Scheduled departure at `stop`.
    pub fn scheduled_departure(&self, stop: usize) -> i32 {
        self.scheduled_departures[stop]
    }

    /// Real-time (or scheduled, if no delay) arrival at `stop`.
    pub fn arrival(&self, stop: usize) -> i32 {
        self.scheduled_arrivals[stop] + self.arrival_delays[stop]
    }

    /// Real-time (or scheduled, if no delay) departure at `stop`.
    pub fn departure(&self, stop: usize) -> i32 {
        self.scheduled_departures[stop] + self.departure_delays[stop]
    }

    /// Arrival delay in seconds at `stop`.
    pub fn arrival_delay(&self, stop: usize) -> i32 {
        self.arrival_delays[stop]
    }

    /// Departure delay in seconds at `stop`.
    pub fn departure_delay(&self, stop: usize) -> i32 {
        self.departure_delays[stop]
    }

    /// GTFS stop sequence number at `stop`.
    pub fn stop_sequence(&self, stop: usize) -> u32 {
        self.stop_sequences[stop]
    }

    /// Effective boarding permission at `stop`.
    pub fn pickup(&self, stop: usize) -> PickDrop {
        self.pickups[stop]
    }

    /// Effective alighting permission at `stop`.
    pub fn dropoff(&self, stop: usize) -> PickDrop {
        self.dropoffs[stop]
    }

    /// Whether `stop` was cancelled by a real-time update.
    pub fn is_cancelled_stop(&self, stop: usize) -> bool {
        self.cancelled[stop]
    }

    /// Whether an actual (observed) time was reported for `stop`.
    pub fn is_recorded(&self, stop: usize) -> bool {
        self.recorded[stop]
    }

    /// Whether the feed flagged the prediction at `stop` as inaccurate.
    pub fn is_prediction_inaccurate(&self, stop: usize) -> bool {
        self.prediction_inaccurate[stop]
    }

    /// Real-time destination display override at `stop`.
    pub fn headsign(&self, stop: usize) -> Option<&str> {
        self.headsigns[stop].as_deref()
    }

    /// Real-time state.
    pub fn real_time_state(&self) -> RealTimeState {
        self.real_time_state
    }

    /// Whether the whole trip is cancelled.
    pub fn is_canceled(&self) -> bool {
        self.real_time_state == RealTimeState::Canceled
    }

    /// Time spent at `stop` (departure minus arrival).
    pub fn dwell_time(&self, stop: usize) -> i32 {
        self.departure(stop).saturating_sub(self.arrival(stop))
    }

    /// Time between departing `hop` and arriving at `hop + 1`.
    pub fn running_time(&self, hop: usize) -> i32 {
        self.arrival(hop + 1).saturating_sub(self.departure(hop))
    }

    /// Checks `arrival[i] <= departure[i] <= arrival[i + 1]` for every stop.
    pub fn times_increasing(&self) -> bool {
        self.first_decreasing_stop().is_none()
    }

    /// First stop whose arrival precedes the previous departure or whose
    /// departure precedes its own arrival.
    pub fn first_decreasing_stop(&self) -> Option<usize> {
        let mut previous_departure = i32::MIN;
        for stop in 0..self.num_stops() {
            let arrival = self.arrival(stop);
            let departure = self.departure(stop);
            if arrival < previous_departure || departure < arrival {
                return Some(stop);
            }
            previous_departure = departure;
        }
        None
    }
}

/// Private, mutable copy of a `TripTimes` being updated.
///
/// Dereferences to the `TripTimes` under construction so getters can be used
/// while building.
///
/// A delay or time whose result does not fit in an `i32` is not stored; the
/// stop is remembered instead and reported by
/// [`TripTimesBuilder::out_of_range_stop`].
#[derive(Debug, Clone)]
pub struct TripTimesBuilder {
    inner: TripTimes,
    out_of_range: Option<usize>,
}

impl TripTimesBuilder {
    /// A fresh copy of `base` with every real-time change undone.
    ///
    /// Delays are zero, flags cleared, and pickup/drop-off taken from the
    /// planned `pattern`.
    pub fn from_schedule(base: &TripTimes, pattern: &StopPattern) -> Self {
        let n = base.num_stops();
        let inner = TripTimes {
            trip_id: base.trip_id.clone(),
            scheduled_arrivals: base.scheduled_arrivals.clone(),
            scheduled_departures: base.scheduled_departures.clone(),
            stop_sequences: base.stop_sequences.clone(),
            arrival_delays: vec![0; n],
            departure_delays: vec![0; n],
            pickups: (0..n).map(|i| pattern.pickup(i)).collect(),
            dropoffs: (0..n).map(|i| pattern.dropoff(i)).collect(),
            cancelled: vec![false; n],
            recorded: vec![false; n],
            prediction_inaccurate: vec![false; n],
            headsigns: vec![None; n],
            real_time_state: RealTimeState::Scheduled,
        };
        Self {
            inner,
            out_of_range: None,
        }
    }

    /// First stop where a setter was given a value out of range.
    pub fn out_of_range_stop(&self) -> Option<usize> {
        self.out_of_range
    }

    fn mark_out_of_range(&mut self, stop: usize) {
        self.out_of_range.get_or_insert(stop);
    }

    /// Set the arrival delay at `stop`.
    pub fn set_arrival_delay(&mut self, stop: usize, delay: i32) -> &mut Self {
        match self.inner.scheduled_arrivals[stop].checked_add(delay) {
            Some(_) => self.inner.arrival_delays[stop] = delay,
            None => self.mark_out_of_range(stop),
        }
        self
    }

    /// Set the departure delay at `stop`.
    pub fn set_departure_delay(&mut self, stop: usize, delay: i32) -> &mut Self {
        match self.inner.scheduled_departures[stop].checked_add(delay) {
            Some(_) => self.inner.departure_delays[stop] = delay,
            None => self.mark_out_of_range(stop),
        }
        self
    }

    /// Set the absolute arrival time at `stop`.
    pub fn set_arrival_time(&mut self, stop: usize, time: i32) -> &mut Self {
        match time.checked_sub(self.inner.scheduled_arrivals[stop]) {
            Some(delay) => self.inner.arrival_delays[stop] = delay,
            None => self.mark_out_of_range(stop),
        }
        self
    }

    /// Set the absolute departure time at `stop`.
    pub fn set_departure_time(&mut self, stop: usize, time: i32) -> &mut Self {
        match time.checked_sub(self.inner.scheduled_departures[stop]) {
            Some(delay) => self.inner.departure_delays[stop] = delay,
            None => self.mark_out_of_range(stop),
        }
        self
    }

    /// Cancel a single stop: no boarding, no alighting.
    pub fn cancel_stop(&mut self, stop: usize) -> &mut Self {
        self.inner.cancelled[stop] = true;
        self.inner.pickups[stop] = PickDrop::Cancelled;
        self.inner.dropoffs[stop] = PickDrop::Cancelled;
        self
    }

    /// Flag that an actual time was observed at `stop`.
    pub fn set_recorded(&mut self, stop: usize) -> &mut Self {
        self.inner.recorded[stop] = true;
        self
    }

    /// Set or clear the inaccurate-prediction flag at `stop`.
    pub fn set_prediction_inaccurate(&mut self, stop: usize, inaccurate: bool) -> &mut Self {
        self.inner.prediction_inaccurate[stop] = inaccurate;
        self
    }

    /// Override boarding at `stop`.
    pub fn set_pickup(&mut self, stop: usize, value: PickDrop) -> &mut Self {
        self.inner.pickups[stop] = value;
        self
    }

    /// Override alighting at `stop`.
    pub fn set_dropoff(&mut self, stop: usize, value: PickDrop) -> &mut Self {
        self.inner.dropoffs[stop] = value;
        self
    }

    /// Override the destination display at `stop`.
    pub fn set_headsign(&mut self, stop: usize, headsign: &str) -> &mut Self {
        self.inner.headsigns[stop] = Some(Arc::from(headsign));
        self
    }

    /// Set the real-time state.
    pub fn set_real_time_state(&mut self, state: RealTimeState) -> &mut Self {
        self.inner.real_time_state = state;
        self
    }

    /// Cancel the whole trip. Delays are left as they are.
    pub fn cancel_trip(&mut self) -> &mut Self {
        self.inner.real_time_state = RealTimeState::Canceled;
        self.inner.cancelled.fill(true);
        self
    }

    /// Finish the update.
    pub fn build(self) -> TripTimes {
        self.inner
    }
}

impl Deref for TripTimesBuilder {
    type Target = TripTimes;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::{FeedScopedId, PatternStop, Stop};

    /// Pattern of regular stops named `S0`, `S1`, ... in feed `F`.
    pub fn regular_pattern(n: usize) -> Arc<StopPattern> {
        let stops = (0..n)
            .map(|i| {
                PatternStop::regular(Arc::new(Stop::new(
                    FeedScopedId::new("F", format!("S{i}")),
                    format!("Stop {i}"),
                )))
            })
            .collect();
        Arc::new(StopPattern::new(stops).unwrap())
    }

    /// Scheduled trip times where arrival equals departure.
    pub fn trip_times(pattern: &Arc<StopPattern>, times: &[i32]) -> TripTimes {
        let trip = ScheduledTrip::new(
            FeedScopedId::new("F", "T1"),
            pattern.clone(),
            times.to_vec(),
            times.to_vec(),
        )
        .unwrap();
        TripTimes::scheduled(&trip).unwrap()
    }
}
