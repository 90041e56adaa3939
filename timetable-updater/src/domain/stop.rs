//! Stops and station membership.
//!
//! A stop (quay, platform) may belong to a parent station. Real-time feeds
//! sometimes report a different platform of the same station than the one
//! in the schedule; the [`StationResolver`] lets the matcher accept those.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{FeedScopedId, StopId};

/// A boardable stop location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    /// Stop id
    pub id: StopId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Parent station, if this stop is one of several in a station
    #[serde(default)]
    pub parent_station: Option<FeedScopedId>,
}

impl Stop {
    /// Creates a stop with no parent station.
    pub fn new(id: StopId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_station: None,
        }
    }

    /// Sets the parent station.
    pub fn with_parent_station(mut self, station: FeedScopedId) -> Self {
        self.parent_station = Some(station);
        self
    }

    /// Returns true if this stop belongs to a station.
    pub fn is_part_of_station(&self) -> bool {
        self.parent_station.is_some()
    }

    /// Returns true if both stops belong to the same (known) station.
    pub fn is_part_of_same_station_as(&self, other: &Stop) -> bool {
        match (&self.parent_station, &other.parent_station) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Station-membership lookups needed by the real-time matcher.
///
/// Implementations must be cheap and side-effect free; they are called from
/// the update loop for every unmatched stop of every message.
pub trait StationResolver: Send + Sync {
    /// Look up a stop by feed and raw id.
    fn lookup_stop(&self, feed_id: &str, raw_id: &str) -> Option<Arc<Stop>>;

    /// Whether the stop belongs to a multi-stop station.
    fn is_part_of_station(&self, stop: &Stop) -> bool {
        stop.is_part_of_station()
    }

    /// Whether the two stops share a parent station.
    fn is_part_of_same_station(&self, a: &Stop, b: &Stop) -> bool {
        a.is_part_of_same_station_as(b)
    }
}

/// In-memory stop lookup keyed by feed-scoped id.
#[derive(Debug, Clone, Default)]
pub struct StopIndex {
    stops: HashMap<StopId, Arc<Stop>>,
}

impl StopIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stop, returning the shared handle stored in the index.
    pub fn insert(&mut self, stop: Stop) -> Arc<Stop> {
        let stop = Arc::new(stop);
        self.stops.insert(stop.id.clone(), stop.clone());
        stop
    }

    /// Get a stop by id.
    pub fn get(&self, id: &StopId) -> Option<&Arc<Stop>> {
        self.stops.get(id)
    }

    /// Number of stops in the index.
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// Returns true if the index holds no stops.
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

impl FromIterator<Stop> for StopIndex {
    fn from_iter<I: IntoIterator<Item = Stop>>(iter: I) -> Self {
        let mut index = StopIndex::new();
        for stop in iter {
            index.insert(stop);
        }
        index
    }
}

impl StationResolver for StopIndex {
    fn lookup_stop(&self, feed_id: &str, raw_id: &str) -> Option<Arc<Stop>> {
        self.stops.get(&FeedScopedId::new(feed_id, raw_id)).cloned()
    }
}
