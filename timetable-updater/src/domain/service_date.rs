//! Service dates and service-relative time.
//!
//! Schedule times are stored as seconds since the *start of service* of a
//! service date, which may exceed 24 hours for trips running past midnight.
//! The start of service is defined as noon minus 12 hours in the feed time
//! zone, so days with a daylight-saving change still map noon to 43 200.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Seconds in a nominal service day.
pub const SECONDS_PER_DAY: i32 = 24 * 60 * 60;

/// Operating day a trip belongs to, independent of wall-clock date.
///
/// # Examples
///
/// ```
/// use timetable_updater::domain::ServiceDate;
///
/// let date = ServiceDate::parse("2024-03-15").unwrap();
/// assert_eq!(date.to_string(), "2024-03-15");
/// assert!(ServiceDate::parse("15/03/2024").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceDate(NaiveDate);

impl ServiceDate {
    /// Wrap a calendar date.
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parse an ISO-8601 calendar date (`YYYY-MM-DD`).
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| DomainError::InvalidServiceDate(s.to_string()))
    }

    /// The underlying calendar date.
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The service date `days` before this one.
    pub fn minus_days(&self, days: i64) -> Self {
        Self(self.0 - Duration::days(days))
    }

    /// Noon minus 12 hours on this date, in `tz`.
    pub fn start_of_service(&self, tz: Tz) -> DateTime<Tz> {
        let noon = self.0.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default());
        let local_noon = tz
            .from_local_datetime(&noon)
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(&noon));
        local_noon - Duration::hours(12)
    }

    /// Seconds between the start of service and `instant`, or `None` if
    /// they do not fit in an `i32`.
    pub fn seconds_since_start_of_service<Z: TimeZone>(&self, tz: Tz, instant: &DateTime<Z>) -> Option<i32> {
        let start = self.start_of_service(tz);
        instant
            .timestamp()
            .checked_sub(start.timestamp())
            .and_then(|secs| i32::try_from(secs).ok())
    }
}

impl fmt::Debug for ServiceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceDate({})", self.0)
    }
}

impl fmt::Display for ServiceDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl From<NaiveDate> for ServiceDate {
    fn from(value: NaiveDate) -> Self {
        Self(value)
    }
}

/// Number of whole days a trip's first departure lies after its service date.
///
/// A trip that departs at 25:10 belongs to "yesterday"'s service date even
/// though it physically departs today.
pub fn day_offset(first_departure: i32) -> i64 {
    if first_departure > SECONDS_PER_DAY {
        i64::from(first_departure / SECONDS_PER_DAY)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn date(s: &str) -> ServiceDate {
        ServiceDate::parse(s).unwrap()
    }

    #[test]
    fn start_of_service_is_local_midnight_on_normal_days() {
        let start = date("2024-03-15").start_of_service(chrono_tz::Europe::Oslo);
        assert_eq!(start.to_rfc3339(), "2024-03-15T00:00:00+01:00");
    }

    #[test]
    fn start_of_service_on_dst_change() {
        // Clocks go forward on 2024-03-31 in Oslo; noon is at +02:00 so the
        // start of service is 23:00 local on the previous evening.
        let tz = chrono_tz::Europe::Oslo;
        let d = date("2024-03-31");
        let noon = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 31, 12, 0, 0)
            .unwrap();
        assert_eq!(d.seconds_since_start_of_service(tz, &noon), Some(12 * 3600));
    }

    #[test]
    fn seconds_past_midnight_exceed_a_day() {
        let tz = chrono_tz::Europe::Oslo;
        let d = date("2024-03-15");
        let next_morning = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 16, 1, 10, 0)
            .unwrap();
        assert_eq!(
            d.seconds_since_start_of_service(tz, &next_morning),
            Some(SECONDS_PER_DAY + 70 * 60)
        );
    }

    #[test]
    fn far_off_instants_do_not_wrap() {
        let tz = chrono_tz::Europe::Oslo;
        let d = date("2024-03-15");
        let far = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2200, 1, 1, 0, 0, 0)
            .unwrap();
        assert_eq!(d.seconds_since_start_of_service(tz, &far), None);
    }

    #[test]
    fn other_offsets_are_normalised() {
        let tz = chrono_tz::Europe::Oslo;
        let d = date("2024-03-15");
        let utc = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 15, 9, 0, 0)
            .unwrap();
        // 09:00Z is 10:00 in Oslo.
        assert_eq!(d.seconds_since_start_of_service(tz, &utc), Some(10 * 3600));
    }

    #[test]
    fn day_offset_only_counts_whole_days_after_midnight() {
        assert_eq!(day_offset(0), 0);
        assert_eq!(day_offset(SECONDS_PER_DAY), 0);
        assert_eq!(day_offset(SECONDS_PER_DAY + 1), 1);
        assert_eq!(day_offset(2 * SECONDS_PER_DAY + 600), 2);
    }

    #[test]
    fn minus_days_and_ordering() {
        let d = date("2024-03-01");
        assert_eq!(d.minus_days(1), date("2024-02-29"));
        assert!(d.minus_days(1) < d);
    }

    #[test]
    fn invalid_dates_rejected() {
        assert!(ServiceDate::parse("2024-02-30").is_err());
        assert!(ServiceDate::parse("").is_err());
        assert!(ServiceDate::parse("20240315").is_err());
    }
}
