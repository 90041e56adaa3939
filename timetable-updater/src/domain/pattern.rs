//! Stop patterns and scheduled trips.
//!
//! A `StopPattern` is the ordered list of stops a group of trips visits,
//! together with the boarding/alighting permissions at each stop. Patterns
//! compare structurally, so the importer can share one `Arc<StopPattern>`
//! between every trip with the same calling sequence.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::{PatternId, Stop, TripId};

/// Pickup or drop-off permission at a stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickDrop {
    /// Regularly scheduled
    #[default]
    Scheduled,
    /// Not available
    None,
    /// Must phone the agency
    CallAgency,
    /// Must coordinate with the driver
    CoordinateWithDriver,
    /// Cancelled by a real-time update
    Cancelled,
}

impl PickDrop {
    /// Returns true for `None` and `Cancelled`.
    pub fn is_not_routable(self) -> bool {
        matches!(self, PickDrop::None | PickDrop::Cancelled)
    }
}

/// One entry in a stop pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternStop {
    /// The stop
    pub stop: Arc<Stop>,
    /// Boarding permission
    pub pickup: PickDrop,
    /// Alighting permission
    pub dropoff: PickDrop,
}

impl PatternStop {
    /// A stop with regular boarding and alighting.
    pub fn regular(stop: Arc<Stop>) -> Self {
        Self {
            stop,
            pickup: PickDrop::Scheduled,
            dropoff: PickDrop::Scheduled,
        }
    }

    /// A stop where the vehicle passes without serving passengers.
    pub fn pass_through(stop: Arc<Stop>) -> Self {
        Self {
            stop,
            pickup: PickDrop::None,
            dropoff: PickDrop::None,
        }
    }
}

/// Ordered stop sequence with boarding/alighting permissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StopPattern {
    stops: Vec<PatternStop>,
}

impl StopPattern {
    /// Build a pattern. A pattern needs at least two stops.
    pub fn new(stops: Vec<PatternStop>) -> Result<Self, DomainError> {
        if stops.len() < 2 {
            return Err(DomainError::PatternTooShort(stops.len()));
        }
        Ok(Self { stops })
    }

    /// Number of stops.
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// Patterns always have at least two stops.
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Stop at the given position.
    pub fn stop(&self, index: usize) -> Option<&Arc<Stop>> {
        self.stops.get(index).map(|s| &s.stop)
    }

    /// All pattern entries.
    pub fn stops(&self) -> &[PatternStop] {
        &self.stops
    }

    /// Planned boarding permission at `index`.
    pub fn pickup(&self, index: usize) -> PickDrop {
        self.stops
            .get(index)
            .map(|s| s.pickup)
            .unwrap_or(PickDrop::None)
    }

    /// Planned alighting permission at `index`.
    pub fn dropoff(&self, index: usize) -> PickDrop {
        self.stops
            .get(index)
            .map(|s| s.dropoff)
            .unwrap_or(PickDrop::None)
    }

    /// Both boarding and alighting are `value` at `index`.
    pub fn is_board_and_alight_at(&self, index: usize, value: PickDrop) -> bool {
        self.pickup(index) == value && self.dropoff(index) == value
    }
}

/// Interns structurally equal stop patterns.
#[derive(Debug, Default)]
pub struct PatternDeduplicator {
    patterns: HashSet<Arc<StopPattern>>,
}

impl PatternDeduplicator {
    /// Create an empty deduplicator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared instance equal to `pattern`.
    pub fn intern(&mut self, pattern: StopPattern) -> Arc<StopPattern> {
        if let Some(existing) = self.patterns.get(&pattern) {
            return existing.clone();
        }
        let pattern = Arc::new(pattern);
        self.patterns.insert(pattern.clone());
        pattern
    }

    /// Number of distinct patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true if nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// A pattern as exposed to timetables: an id plus the shared stop pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripPattern {
    /// Pattern id
    pub id: PatternId,
    /// Shared stop sequence
    pub stop_pattern: Arc<StopPattern>,
}

impl TripPattern {
    /// Creates a trip pattern.
    pub fn new(id: PatternId, stop_pattern: Arc<StopPattern>) -> Self {
        Self { id, stop_pattern }
    }

    /// Number of stops.
    pub fn num_stops(&self) -> usize {
        self.stop_pattern.len()
    }
}

/// A trip as imported from the static schedule.
///
/// Times are seconds since the start of the service day and may exceed
/// 24 hours for trips running past midnight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTrip {
    /// Trip id
    pub id: TripId,
    /// Shared stop pattern
    pub pattern: Arc<StopPattern>,
    arrivals: Vec<i32>,
    departures: Vec<i32>,
    stop_sequences: Vec<u32>,
}

impl ScheduledTrip {
    /// Creates a scheduled trip. Stop sequences default to `0..n`.
    pub fn new(
        id: TripId,
        pattern: Arc<StopPattern>,
        arrivals: Vec<i32>,
        departures: Vec<i32>,
    ) -> Result<Self, DomainError> {
        let stop_sequences = (0..pattern.len() as u32).collect();
        Self::with_stop_sequences(id, pattern, arrivals, departures, stop_sequences)
    }

    /// Creates a scheduled trip with explicit GTFS stop sequence numbers.
    pub fn with_stop_sequences(
        id: TripId,
        pattern: Arc<StopPattern>,
        arrivals: Vec<i32>,
        departures: Vec<i32>,
        stop_sequences: Vec<u32>,
    ) -> Result<Self, DomainError> {
        let n = pattern.len();
        for (field, len) in [
            ("arrivals", arrivals.len()),
            ("departures", departures.len()),
            ("stop_sequences", stop_sequences.len()),
        ] {
            if len != n {
                return Err(DomainError::LengthMismatch {
                    field,
                    expected: n,
                    actual: len,
                });
            }
        }
        Ok(Self {
            id,
            pattern,
            arrivals,
            departures,
            stop_sequences,
        })
    }

    /// Scheduled arrival seconds per stop.
    pub fn arrivals(&self) -> &[i32] {
        &self.arrivals
    }

    /// Scheduled departure seconds per stop.
    pub fn departures(&self) -> &[i32] {
        &self.departures
    }

    /// GTFS stop sequence numbers per stop.
    pub fn stop_sequences(&self) -> &[u32] {
        &self.stop_sequences
    }
}
