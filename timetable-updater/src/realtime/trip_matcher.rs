//! Fuzzy trip matching.
//!
//! Some feeds reference trips by a shortened id, or not at all. The matcher
//! indexes scheduled trips by their unpadded id and by where and when they
//! end, so such messages can still be tied to a trip.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Timelike};
use chrono_tz::Tz;

use crate::domain::{EstimatedJourney, SECONDS_PER_DAY, TripId, VehiclePositionUpdate};
use crate::timetable::Timetable;

fn unpadded_id(id: &str) -> &str {
    match id.find('-') {
        Some(dash) if dash > 0 => &id[..dash],
        _ => id,
    }
}

/// Index of scheduled trips for messages without a usable trip id.
#[derive(Debug, Clone, Default)]
pub struct TripMatcher {
    by_unpadded_id: HashMap<String, Vec<TripId>>,
    by_last_stop: HashMap<(String, i32), Vec<TripId>>,
}

impl TripMatcher {
    /// Create an empty matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every trip of the given scheduled timetables.
    pub fn from_timetables<'a>(timetables: impl IntoIterator<Item = &'a Timetable>) -> Self {
        let mut matcher = Self::new();
        for timetable in timetables {
            let stop_pattern = &timetable.pattern().stop_pattern;
            let last = stop_pattern.len() - 1;
            let Some(last_stop) = stop_pattern.stop(last) else {
                continue;
            };
            for tt in timetable.iter() {
                matcher.insert(tt.trip_id(), last_stop.id.id(), tt.scheduled_arrival(last));
            }
        }
        matcher
    }

    /// Index one trip ending at `last_stop` at `last_arrival`.
    pub fn insert(&mut self, trip_id: &TripId, last_stop: &str, last_arrival: i32) {
        self.by_unpadded_id
            .entry(unpadded_id(trip_id.id()).to_string())
            .or_default()
            .push(trip_id.clone());
        self.by_last_stop
            .entry((last_stop.to_string(), last_arrival))
            .or_default()
            .push(trip_id.clone());
    }

    /// The part of a trip id before its first `-`, unless the id starts with one.
    ///
    /// # Examples
    ///
    /// ```
    /// use timetable_updater::realtime::TripMatcher;
    ///
    /// assert_eq!(TripMatcher::unpadded_id("1234-2024-03-15"), "1234");
    /// assert_eq!(TripMatcher::unpadded_id("1234"), "1234");
    /// assert_eq!(TripMatcher::unpadded_id("-1234"), "-1234");
    /// ```
    pub fn unpadded_id(id: &str) -> &str {
        unpadded_id(id)
    }

    /// Trips whose unpadded id equals the unpadded `raw_id`.
    pub fn match_id(&self, raw_id: &str) -> &[TripId] {
        self.by_unpadded_id
            .get(unpadded_id(raw_id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Trips ending at `last_stop` at `last_arrival` seconds.
    pub fn match_last_stop(&self, last_stop: &str, last_arrival: i32) -> &[TripId] {
        self.by_last_stop
            .get(&(last_stop.to_string(), last_arrival))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Candidate trips for `journey`.
    ///
    /// Tries the trip reference first, then the last estimated call's stop
    /// and aimed arrival (or departure) time of day, also as a trip that
    /// started the previous day.
    pub fn match_journey(&self, journey: &EstimatedJourney, tz: Tz) -> &[TripId] {
        let by_id = self.match_id(&journey.trip_ref);
        if !by_id.is_empty() {
            return by_id;
        }

        let Some(last) = journey.estimated_calls.last() else {
            return &[];
        };
        match last.arrival.aimed.or(last.departure.aimed) {
            Some(aimed) => self.match_last_stop_at(&last.stop_ref, aimed, tz),
            None => &[],
        }
    }

    /// Candidate trips for a vehicle position.
    ///
    /// Tries the trip reference first, then the destination and its aimed
    /// arrival time of day.
    pub fn match_vehicle(&self, update: &VehiclePositionUpdate, tz: Tz) -> &[TripId] {
        let by_id = self.match_id(&update.trip_ref);
        if !by_id.is_empty() {
            return by_id;
        }
        match (&update.destination_ref, update.destination_aimed_arrival) {
            (Some(destination), Some(aimed)) => self.match_last_stop_at(destination, aimed, tz),
            _ => &[],
        }
    }

    /// Trips ending at `last_stop` at the local time of day of `aimed`, on
    /// the same service day or as a trip that started the day before.
    fn match_last_stop_at(&self, last_stop: &str, aimed: DateTime<FixedOffset>, tz: Tz) -> &[TripId] {
        let second_of_day = aimed.with_timezone(&tz).num_seconds_from_midnight() as i32;
        let today = self.match_last_stop(last_stop, second_of_day);
        if !today.is_empty() {
            return today;
        }
        self.match_last_stop(last_stop, second_of_day + SECONDS_PER_DAY)
    }

    /// Number of indexed trips.
    pub fn len(&self) -> usize {
        self.by_unpadded_id.values().map(Vec::len).sum()
    }

    /// Returns true if no trip is indexed.
    pub fn is_empty(&self) -> bool {
        self.by_unpadded_id.is_empty()
    }
}
