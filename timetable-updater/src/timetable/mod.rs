//! Timetables and their versioned publication.

mod error;
mod schedule;
mod snapshot;
mod table;

pub use error::ScheduleError;
pub use schedule::TransitSchedule;
pub use snapshot::{SnapshotBuffer, TimetableKey, TimetableSnapshot, TimetableSnapshotSource};
pub use table::{Timetable, TimetableStats};
