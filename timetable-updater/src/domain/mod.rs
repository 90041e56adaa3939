//! Domain types for the real-time timetable updater.
//!
//! This module contains the baseline schedule model (stops, patterns,
//! scheduled trips), the copy-on-write per-trip times, and the normalized
//! real-time messages. Baseline types enforce their invariants at
//! construction time, so code that receives them can trust their validity.

mod error;
mod ids;
mod message;
mod pattern;
mod service_date;
mod stop;
mod trip_times;

pub use error::DomainError;
pub use ids::{FeedScopedId, InvalidFeedScopedId, PatternId, StopId, TripId};
pub use message::{
    ArrivalBoardingActivity, Call, CallKind, CallStatus, CallTimes, DepartureBoardingActivity,
    EstimatedJourney, StopScheduleRelationship, StopTimeEvent, StopTimeUpdate, TripScheduleRelationship,
    TripUpdate, UpdateBatch, UpdateMessage, VehiclePositionUpdate,
};
pub use pattern::{PatternDeduplicator, PatternStop, PickDrop, ScheduledTrip, StopPattern, TripPattern};
pub use service_date::{SECONDS_PER_DAY, ServiceDate, day_offset};
pub use stop::{StationResolver, Stop, StopIndex};
pub use trip_times::{RealTimeState, TripTimes, TripTimesBuilder};

#[cfg(test)]
pub(crate) use trip_times::test_support;
