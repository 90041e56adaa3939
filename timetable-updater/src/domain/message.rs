//! Normalized real-time messages.
//!
//! These types are what the transport layer hands to the update engine after
//! parsing SIRI or GTFS-RT. They use `Option` liberally because feeds omit
//! fields rather than sending null values.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::ServiceDate;

/// Actual, expected and aimed timestamps of one call event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTimes {
    /// Observed time. Only meaningful on recorded calls.
    pub actual: Option<DateTime<FixedOffset>>,
    /// Predicted time
    pub expected: Option<DateTime<FixedOffset>>,
    /// Planned time as known by the feed
    pub aimed: Option<DateTime<FixedOffset>>,
}

/// Progress status of a call event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallStatus {
    OnTime,
    Early,
    Delayed,
    Cancelled,
    Arrived,
    Departed,
    Missed,
    NoReport,
    NotExpected,
}

/// Alighting signal of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArrivalBoardingActivity {
    Alighting,
    NoAlighting,
    PassThru,
}

/// Boarding signal of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DepartureBoardingActivity {
    Boarding,
    NoBoarding,
    PassThru,
}

/// One stop visit of a monitored journey.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    /// Raw stop id, without feed scope.
    pub stop_ref: String,

    /// Arrival timestamps.
    #[serde(default)]
    pub arrival: CallTimes,

    /// Departure timestamps.
    #[serde(default)]
    pub departure: CallTimes,

    /// The vehicle will not serve this stop.
    #[serde(default)]
    pub cancellation: bool,

    pub arrival_status: Option<CallStatus>,
    pub departure_status: Option<CallStatus>,
    pub arrival_boarding_activity: Option<ArrivalBoardingActivity>,
    pub departure_boarding_activity: Option<DepartureBoardingActivity>,

    #[serde(default)]
    pub prediction_inaccurate: bool,

    /// Destination shown on the vehicle from this stop.
    pub destination_display: Option<String>,
}

impl Call {
    /// A call at `stop_ref` with no times or flags.
    pub fn at(stop_ref: impl Into<String>) -> Self {
        Self {
            stop_ref: stop_ref.into(),
            ..Self::default()
        }
    }
}

/// Whether a call has already happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Already visited, may carry actual times
    Recorded,
    /// Still to come
    Estimated,
}

/// Recorded and estimated calls of one trip (SIRI EstimatedVehicleJourney).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatedJourney {
    /// Raw trip id, without feed scope.
    pub trip_ref: String,

    /// Service date as sent by the feed (`YYYY-MM-DD`), possibly malformed.
    pub data_frame_ref: Option<String>,

    #[serde(default)]
    pub recorded_calls: Vec<Call>,

    #[serde(default)]
    pub estimated_calls: Vec<Call>,

    /// The whole trip is cancelled.
    #[serde(default)]
    pub cancellation: bool,

    #[serde(default)]
    pub prediction_inaccurate: bool,
}

impl EstimatedJourney {
    /// Recorded calls then estimated calls, in message order.
    pub fn calls(&self) -> impl Iterator<Item = (CallKind, &Call)> {
        self.recorded_calls
            .iter()
            .map(|c| (CallKind::Recorded, c))
            .chain(self.estimated_calls.iter().map(|c| (CallKind::Estimated, c)))
    }

    /// Total number of calls.
    pub fn num_calls(&self) -> usize {
        self.recorded_calls.len() + self.estimated_calls.len()
    }

    /// The first call of the journey, recorded or estimated.
    pub fn first_call(&self) -> Option<&Call> {
        self.calls().next().map(|(_, c)| c)
    }
}

/// "Vehicle on trip X is D seconds late as of stop S" (SIRI VM).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePositionUpdate {
    /// Raw trip id, without feed scope.
    pub trip_ref: String,

    pub service_date: ServiceDate,

    /// Monitored call stop. Required to place the delay.
    pub stop_ref: Option<String>,

    /// Delay in seconds, negative when early.
    pub delay_secs: i32,

    /// Last stop of the journey, for matching when `trip_ref` is unknown.
    #[serde(default)]
    pub destination_ref: Option<String>,

    /// Planned arrival at `destination_ref`.
    #[serde(default)]
    pub destination_aimed_arrival: Option<DateTime<FixedOffset>>,
}

/// Trip-level schedule relationship of a stop-sequence update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TripScheduleRelationship {
    #[default]
    Scheduled,
    Canceled,
}

/// Stop-level schedule relationship of a stop-sequence update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopScheduleRelationship {
    #[default]
    Scheduled,
    Skipped,
    NoData,
}

/// Arrival or departure of a stop-sequence update.
///
/// When both are present, `time` gives the value and `delay` the delay
/// carried to later stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopTimeEvent {
    /// Absolute POSIX time in seconds
    pub time: Option<i64>,
    /// Delay in seconds
    pub delay: Option<i32>,
}

/// One stop of a stop-sequence update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTimeUpdate {
    pub stop_sequence: Option<u32>,
    /// Raw stop id, used when `stop_sequence` is absent.
    pub stop_id: Option<String>,
    pub arrival: Option<StopTimeEvent>,
    pub departure: Option<StopTimeEvent>,
    #[serde(default)]
    pub schedule_relationship: StopScheduleRelationship,
}

/// Stop-sequence keyed trip update (GTFS-RT TripUpdate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripUpdate {
    /// Raw trip id, without feed scope.
    pub trip_ref: String,

    pub service_date: ServiceDate,

    #[serde(default)]
    pub schedule_relationship: TripScheduleRelationship,

    #[serde(default)]
    pub stop_time_updates: Vec<StopTimeUpdate>,
}

/// Any message the engine can apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateMessage {
    EstimatedJourney(EstimatedJourney),
    VehiclePosition(VehiclePositionUpdate),
    TripUpdate(TripUpdate),
}

impl UpdateMessage {
    /// Raw trip id the message refers to.
    pub fn trip_ref(&self) -> &str {
        match self {
            UpdateMessage::EstimatedJourney(m) => &m.trip_ref,
            UpdateMessage::VehiclePosition(m) => &m.trip_ref,
            UpdateMessage::TripUpdate(m) => &m.trip_ref,
        }
    }
}

/// Messages received in one poll of a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBatch {
    #[serde(default)]
    pub messages: Vec<UpdateMessage>,
}
