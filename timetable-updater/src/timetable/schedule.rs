//! The baseline schedule of one feed.
//!
//! Holds the stops and one scheduled [`Timetable`] per trip pattern. Trips
//! with structurally equal stop sequences share a pattern.
//!
//! The schedule file is a JSON document:
//!
//! ```json
//! {
//!   "feedId": "RB",
//!   "stops": [{ "id": "RB:Q0", "name": "Quay 0", "parentStation": "RB:S0" }],
//!   "trips": [{
//!     "id": "RB:T1",
//!     "stopTimes": [
//!       { "stop": "RB:Q0", "arrival": 28800, "departure": 28800 },
//!       { "stop": "RB:Q1", "arrival": 29400, "departure": 29460, "pickup": "none" }
//!     ]
//!   }]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::domain::{
    DomainError, FeedScopedId, PatternDeduplicator, PatternId, PatternStop, PickDrop, ScheduledTrip, Stop, StopId,
    StopIndex, StopPattern, TripId, TripPattern, TripTimes,
};
use crate::realtime::TripMatcher;

use super::{ScheduleError, Timetable};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleFile {
    feed_id: String,
    #[serde(default)]
    stops: Vec<Stop>,
    #[serde(default)]
    trips: Vec<TripDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TripDto {
    id: TripId,
    stop_times: Vec<StopTimeDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopTimeDto {
    stop: StopId,
    arrival: i32,
    departure: i32,
    #[serde(default)]
    pickup: PickDrop,
    #[serde(default)]
    dropoff: PickDrop,
    stop_sequence: Option<u32>,
}

/// Stops and scheduled timetables of one feed.
#[derive(Debug, Clone)]
pub struct TransitSchedule {
    feed_id: String,
    stops: Arc<StopIndex>,
    timetables: HashMap<PatternId, Arc<Timetable>>,
    trip_patterns: HashMap<TripId, PatternId>,
    matcher: TripMatcher,
}

impl TransitSchedule {
    /// Build a schedule from imported trips.
    ///
    /// Patterns get ids `<feed>:P<n>` in order of first appearance. Trips of
    /// a pattern are ordered by first departure.
    pub fn new(feed_id: impl Into<String>, stops: StopIndex, trips: Vec<ScheduledTrip>) -> Result<Self, DomainError> {
        let feed_id = feed_id.into();
        let mut pattern_ids: HashMap<Arc<StopPattern>, PatternId> = HashMap::new();
        let mut grouped: Vec<(Arc<TripPattern>, Vec<ScheduledTrip>)> = Vec::new();

        for trip in trips {
            let next = grouped.len();
            let id = pattern_ids
                .entry(trip.pattern.clone())
                .or_insert_with(|| PatternId(FeedScopedId::new(&feed_id, format!("P{next}"))))
                .clone();
            match grouped.iter_mut().find(|(pattern, _)| pattern.id == id) {
                Some((_, trips)) => trips.push(trip),
                None => {
                    let pattern = Arc::new(TripPattern::new(id, trip.pattern.clone()));
                    grouped.push((pattern, vec![trip]));
                }
            }
        }

        let mut timetables = HashMap::new();
        let mut trip_patterns = HashMap::new();
        for (pattern, mut trips) in grouped {
            trips.sort_by_key(|trip| trip.departures().first().copied().unwrap_or_default());
            let mut table = Timetable::new(pattern.clone());
            for trip in &trips {
                if trip_patterns.insert(trip.id.clone(), pattern.id.clone()).is_some() {
                    return Err(DomainError::DuplicateTrip(trip.id.clone()));
                }
                table.add_trip_times(TripTimes::scheduled(trip)?)?;
            }
            table.finish();
            timetables.insert(pattern.id.clone(), Arc::new(table));
        }

        let matcher = TripMatcher::from_timetables(timetables.values().map(Arc::as_ref));
        debug!(
            feed = %feed_id,
            patterns = timetables.len(),
            trips = trip_patterns.len(),
            "built transit schedule"
        );

        Ok(Self {
            feed_id,
            stops: Arc::new(stops),
            timetables,
            trip_patterns,
            matcher,
        })
    }

    /// Parse a schedule document.
    pub fn from_json(json: &str) -> Result<Self, ScheduleError> {
        let file: ScheduleFile = serde_json::from_str(json)?;
        let stops: StopIndex = file.stops.into_iter().collect();
        let mut dedup = PatternDeduplicator::new();

        let trips = file
            .trips
            .into_iter()
            .map(|dto| build_trip(dto, &stops, &mut dedup))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(file.feed_id, stops, trips)?)
    }

    /// Read and parse a schedule file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ScheduleError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ScheduleError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&json)
    }

    /// Feed the schedule was imported from.
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    /// Stop index, shared with update workers.
    pub fn stops(&self) -> &Arc<StopIndex> {
        &self.stops
    }

    /// Scheduled timetable of `pattern`.
    pub fn timetable(&self, pattern: &PatternId) -> Option<&Arc<Timetable>> {
        self.timetables.get(pattern)
    }

    /// Scheduled timetable containing the trip with raw id `raw_trip_id`.
    pub fn timetable_for_trip(&self, raw_trip_id: &str) -> Option<&Arc<Timetable>> {
        self.trip_patterns
            .get(&FeedScopedId::new(&self.feed_id, raw_trip_id))
            .and_then(|pattern| self.timetables.get(pattern))
    }

    /// All scheduled timetables.
    pub fn timetables(&self) -> impl Iterator<Item = &Arc<Timetable>> {
        self.timetables.values()
    }

    /// Fuzzy trip index over all scheduled trips.
    pub fn trip_matcher(&self) -> &TripMatcher {
        &self.matcher
    }

    /// Number of distinct patterns.
    pub fn num_patterns(&self) -> usize {
        self.timetables.len()
    }

    /// Number of trips.
    pub fn num_trips(&self) -> usize {
        self.trip_patterns.len()
    }
}

fn build_trip(dto: TripDto, stops: &StopIndex, dedup: &mut PatternDeduplicator) -> Result<ScheduledTrip, DomainError> {
    let pattern_stops = dto
        .stop_times
        .iter()
        .map(|st| {
            let stop = stops
                .get(&st.stop)
                .ok_or_else(|| DomainError::UnknownStop(st.stop.clone()))?;
            Ok(PatternStop {
                stop: stop.clone(),
                pickup: st.pickup,
                dropoff: st.dropoff,
            })
        })
        .collect::<Result<Vec<_>, DomainError>>()?;
    let pattern = dedup.intern(StopPattern::new(pattern_stops)?);

    let arrivals = dto.stop_times.iter().map(|st| st.arrival).collect();
    let departures = dto.stop_times.iter().map(|st| st.departure).collect();
    let sequences = dto
        .stop_times
        .iter()
        .enumerate()
        .map(|(i, st)| st.stop_sequence.unwrap_or(i as u32))
        .collect();

    ScheduledTrip::with_stop_sequences(dto.id, pattern, arrivals, departures, sequences)
}
