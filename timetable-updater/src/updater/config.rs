//! Updater configuration.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::ServiceDate;

/// Configuration of one feed's update loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdaterConfig {
    /// Feed whose trips and stops messages refer to.
    pub feed_id: String,

    /// Time zone the feed's service days are defined in.
    pub time_zone: Tz,

    /// How often to poll the source for a new batch (seconds).
    pub poll_frequency_secs: u64,

    /// Maximum time one batch may take before it is abandoned (seconds).
    /// An abandoned batch publishes nothing.
    pub cycle_timeout_secs: u64,

    /// Real-time timetables for service dates older than this many days
    /// are dropped. Zero keeps everything.
    pub retention_days: u32,
}

impl UpdaterConfig {
    /// Create a new configuration with the given parameters.
    pub fn new(
        feed_id: impl Into<String>,
        time_zone: Tz,
        poll_frequency_secs: u64,
        cycle_timeout_secs: u64,
        retention_days: u32,
    ) -> Self {
        Self {
            feed_id: feed_id.into(),
            time_zone,
            poll_frequency_secs,
            cycle_timeout_secs,
            retention_days,
        }
    }

    /// Read `FEED_ID`, `FEED_TIMEZONE`, `POLL_FREQUENCY_SECS`,
    /// `CYCLE_TIMEOUT_SECS` and `RETENTION_DAYS` from the environment.
    ///
    /// Missing variables take their default; unparsable ones are logged and
    /// also take their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`UpdaterConfig::from_env`], reading values from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            feed_id: lookup("FEED_ID").unwrap_or(defaults.feed_id),
            time_zone: parse_or(&lookup, "FEED_TIMEZONE", defaults.time_zone),
            poll_frequency_secs: parse_or(&lookup, "POLL_FREQUENCY_SECS", defaults.poll_frequency_secs),
            cycle_timeout_secs: parse_or(&lookup, "CYCLE_TIMEOUT_SECS", defaults.cycle_timeout_secs),
            retention_days: parse_or(&lookup, "RETENTION_DAYS", defaults.retention_days),
        }
    }

    /// Returns the polling interval as a Duration. Never zero.
    pub fn poll_frequency(&self) -> Duration {
        Duration::from_secs(self.poll_frequency_secs.max(1))
    }

    /// Returns the cycle timeout as a Duration.
    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    /// The oldest service date to keep as of `now`, if retention is enabled.
    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> Option<ServiceDate> {
        if self.retention_days == 0 {
            return None;
        }
        let today = ServiceDate::new(now.with_timezone(&self.time_zone).date_naive());
        Some(today.minus_days(i64::from(self.retention_days)))
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            feed_id: "RB".to_string(),
            time_zone: Tz::UTC,
            poll_frequency_secs: 60,
            cycle_timeout_secs: 30,
            retention_days: 2,
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparsable setting");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn default_config() {
        let config = UpdaterConfig::default();

        assert_eq!(config.feed_id, "RB");
        assert_eq!(config.time_zone, Tz::UTC);
        assert_eq!(config.poll_frequency_secs, 60);
        assert_eq!(config.cycle_timeout_secs, 30);
        assert_eq!(config.retention_days, 2);
    }

    #[test]
    fn duration_methods() {
        let config = UpdaterConfig::new("RB", Tz::UTC, 0, 5, 1);

        assert_eq!(config.poll_frequency(), Duration::from_secs(1));
        assert_eq!(config.cycle_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn reads_lookup_and_falls_back() {
        let env: HashMap<&str, &str> = [
            ("FEED_ID", "RUT"),
            ("FEED_TIMEZONE", "Europe/Oslo"),
            ("POLL_FREQUENCY_SECS", "15"),
            ("CYCLE_TIMEOUT_SECS", "soon"),
        ]
        .into_iter()
        .collect();

        let config = UpdaterConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.feed_id, "RUT");
        assert_eq!(config.time_zone, chrono_tz::Europe::Oslo);
        assert_eq!(config.poll_frequency_secs, 15);
        assert_eq!(config.cycle_timeout_secs, 30);
        assert_eq!(config.retention_days, 2);
    }

    #[test]
    fn retention_cutoff_uses_local_date() {
        let config = UpdaterConfig::new("RB", chrono_tz::Europe::Oslo, 60, 30, 2);
        // 23:30 UTC is already the next day in Oslo.
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 23, 30, 0).unwrap();

        assert_eq!(
            config.retention_cutoff(now),
            ServiceDate::parse("2024-03-14").ok()
        );

        let keep_all = UpdaterConfig::new("RB", Tz::UTC, 60, 30, 0);
        assert_eq!(keep_all.retention_cutoff(now), None);
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: UpdaterConfig =
            serde_json::from_str(r#"{ "feedId": "SKY", "timeZone": "Europe/Oslo" }"#).unwrap();
        assert_eq!(config.feed_id, "SKY");
        assert_eq!(config.time_zone, chrono_tz::Europe::Oslo);
        assert_eq!(config.poll_frequency_secs, 60);
    }
}
