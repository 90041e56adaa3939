//! Real-time timetable updates for a transit network.
//!
//! Merges streaming vehicle positions, estimated-call journeys and
//! stop-sequence trip updates into a fixed baseline schedule, and publishes
//! the revised timetables as versioned snapshots that trip planners can read
//! without blocking.

pub mod domain;
pub mod realtime;
pub mod timetable;
pub mod updater;
