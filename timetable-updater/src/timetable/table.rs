//! All trips of one pattern on one service date.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{DomainError, FeedScopedId, ServiceDate, TripId, TripPattern, TripTimes};
use crate::realtime::RejectReason;

/// Summary values recomputed by [`Timetable::finish`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimetableStats {
    /// Shortest running time per hop across all trips
    pub min_running_times: Vec<i32>,
    /// Shortest dwell time per stop across all trips
    pub min_dwell_times: Vec<i32>,
    /// Earliest departure of any trip
    pub min_time: Option<i32>,
    /// Latest arrival of any trip
    pub max_time: Option<i32>,
}

/// Ordered `TripTimes` of one pattern, with a trip id index.
///
/// The scheduled timetable of a pattern has no service date; real-time
/// timetables are copies of it bound to a date.
#[derive(Debug, Clone)]
pub struct Timetable {
    pattern: Arc<TripPattern>,
    service_date: Option<ServiceDate>,
    trip_times: Vec<Arc<TripTimes>>,
    index: HashMap<TripId, usize>,
    stats: TimetableStats,
}

impl Timetable {
    /// An empty scheduled timetable.
    pub fn new(pattern: Arc<TripPattern>) -> Self {
        Self {
            pattern,
            service_date: None,
            trip_times: Vec::new(),
            index: HashMap::new(),
            stats: TimetableStats::default(),
        }
    }

    /// A copy of this timetable bound to `date`.
    ///
    /// Trip times are shared with `self` until replaced.
    pub fn for_service_date(&self, date: ServiceDate) -> Self {
        Self {
            service_date: Some(date),
            ..self.clone()
        }
    }

    /// The pattern all trips follow.
    pub fn pattern(&self) -> &Arc<TripPattern> {
        &self.pattern
    }

    /// Service date of a real-time timetable; `None` for the schedule.
    pub fn service_date(&self) -> Option<ServiceDate> {
        self.service_date
    }

    /// Number of trips.
    pub fn len(&self) -> usize {
        self.trip_times.len()
    }

    /// Returns true if the timetable has no trips.
    pub fn is_empty(&self) -> bool {
        self.trip_times.is_empty()
    }

    /// Trip times at `index`.
    pub fn trip_times(&self, index: usize) -> Option<&Arc<TripTimes>> {
        self.trip_times.get(index)
    }

    /// Trip times of `trip_id`.
    pub fn get(&self, trip_id: &TripId) -> Option<&Arc<TripTimes>> {
        self.trip_index(trip_id)
            .and_then(|index| self.trip_times.get(index))
    }

    /// All trip times, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TripTimes>> {
        self.trip_times.iter()
    }

    /// Position of `trip_id`.
    pub fn trip_index(&self, trip_id: &TripId) -> Option<usize> {
        self.index.get(trip_id).copied()
    }

    /// Position of the trip with raw id `raw_id` in the pattern's feed.
    pub fn trip_index_by_raw_id(&self, raw_id: &str) -> Option<usize> {
        self.trip_index(&FeedScopedId::new(self.pattern.id.0.feed_id(), raw_id))
    }

    /// Add a trip. Its stop count must match the pattern.
    pub fn add_trip_times(&mut self, trip_times: TripTimes) -> Result<usize, DomainError> {
        if trip_times.num_stops() != self.pattern.num_stops() {
            return Err(DomainError::LengthMismatch {
                field: "trip times",
                expected: self.pattern.num_stops(),
                actual: trip_times.num_stops(),
            });
        }
        if self.index.contains_key(trip_times.trip_id()) {
            return Err(DomainError::DuplicateTrip(trip_times.trip_id().clone()));
        }
        let index = self.trip_times.len();
        self.index.insert(trip_times.trip_id().clone(), index);
        self.trip_times.push(Arc::new(trip_times));
        Ok(index)
    }

    /// Replace the times of an existing trip.
    pub fn set_trip_times(&mut self, trip_times: TripTimes) -> Result<(), RejectReason> {
        self.set_shared_trip_times(Arc::new(trip_times))
    }

    /// Replace the times of an existing trip with an already shared value.
    pub fn set_shared_trip_times(&mut self, trip_times: Arc<TripTimes>) -> Result<(), RejectReason> {
        if trip_times.num_stops() != self.pattern.num_stops() {
            return Err(RejectReason::StopCountMismatch {
                expected: self.pattern.num_stops(),
                actual: trip_times.num_stops(),
            });
        }
        let index = self
            .trip_index(trip_times.trip_id())
            .ok_or_else(|| RejectReason::NotFound(trip_times.trip_id().to_string()))?;
        self.trip_times[index] = trip_times;
        Ok(())
    }

    /// Recompute [`TimetableStats`] from the current trips.
    pub fn finish(&mut self) {
        let stops = self.pattern.num_stops();
        let hops = stops.saturating_sub(1);
        let mut stats = TimetableStats {
            min_running_times: vec![i32::MAX; hops],
            min_dwell_times: vec![i32::MAX; stops],
            min_time: None,
            max_time: None,
        };

        for tt in &self.trip_times {
            for hop in 0..hops {
                stats.min_running_times[hop] = stats.min_running_times[hop].min(tt.running_time(hop));
            }
            for stop in 0..stops {
                stats.min_dwell_times[stop] = stats.min_dwell_times[stop].min(tt.dwell_time(stop));
            }
            let first_departure = tt.departure(0);
            let last_arrival = tt.arrival(stops - 1);
            stats.min_time = Some(stats.min_time.map_or(first_departure, |t| t.min(first_departure)));
            stats.max_time = Some(stats.max_time.map_or(last_arrival, |t| t.max(last_arrival)));
        }

        if self.trip_times.is_empty() {
            stats.min_running_times.clear();
            stats.min_dwell_times.clear();
        }
        self.stats = stats;
    }

    /// Statistics as of the last [`Timetable::finish`].
    pub fn stats(&self) -> &TimetableStats {
        &self.stats
    }
}
