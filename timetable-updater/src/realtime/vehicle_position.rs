//! Applying vehicle position delays (SIRI VM).

use crate::domain::{RealTimeState, TripTimes, VehiclePositionUpdate};
use crate::timetable::Timetable;

use super::{RejectReason, UpdateContext, stop_matches, validate};

/// Apply "vehicle is `delay_secs` late as of `stop_ref`" to the trip.
///
/// Stops before the monitored stop keep their delay unless it exceeds the
/// new one; the monitored stop and everything after it get the new delay.
/// If the monitored stop is not on the trip, every stop is capped.
pub fn apply_vehicle_position(
    timetable: &Timetable,
    update: &VehiclePositionUpdate,
    ctx: &UpdateContext<'_>,
) -> Result<TripTimes, RejectReason> {
    let existing = timetable
        .trip_index_by_raw_id(&update.trip_ref)
        .and_then(|index| timetable.trip_times(index))
        .ok_or_else(|| RejectReason::NotFound(update.trip_ref.clone()))?;
    let stop_ref = update
        .stop_ref
        .as_deref()
        .ok_or(RejectReason::MissingMonitoredCall)?;

    let pattern = &timetable.pattern().stop_pattern;
    let delay = update.delay_secs;
    let mut times = existing.to_builder();
    let mut reached = false;

    for (stop, pattern_stop) in pattern.stops().iter().enumerate() {
        if !reached {
            reached = stop_matches(&pattern_stop.stop, stop_ref, ctx.resolver).is_some();
        }
        let (arrival_delay, departure_delay) = if reached {
            (delay, delay)
        } else {
            (
                existing.arrival_delay(stop).min(delay),
                existing.departure_delay(stop).min(delay),
            )
        };
        times
            .set_arrival_delay(stop, arrival_delay)
            .set_departure_delay(stop, departure_delay);
    }

    if times.real_time_state() != RealTimeState::Modified {
        times.set_real_time_state(RealTimeState::Updated);
    }

    validate(times, pattern)
}

#[cfg(test)]
mod tests {
    use super::super::estimated::fixtures::*;
    use super::*;
    use crate::domain::FeedScopedId;

    fn update(stop_ref: Option<&str>, delay_secs: i32) -> VehiclePositionUpdate {
        VehiclePositionUpdate {
            trip_ref: "T1".into(),
            service_date: date(),
            stop_ref: stop_ref.map(String::from),
            delay_secs,
            destination_ref: None,
            destination_aimed_arrival: None,
        }
    }

    fn with_delays(table: &mut Timetable, delays: &[i32]) {
        let id = FeedScopedId::new("RB", "T1");
        let mut b = table.get(&id).unwrap().to_builder();
        for (stop, delay) in delays.iter().enumerate() {
            b.set_arrival_delay(stop, *delay).set_departure_delay(stop, *delay);
        }
        table.set_trip_times(b.build()).unwrap();
    }

    #[test]
    fn delay_applies_from_monitored_stop() {
        let (index, mut table) = timetable(&[0, 600, 1200, 1800], &[]);
        with_delays(&mut table, &[30, 200, 200, 200]);
        let ctx = UpdateContext::new(&index, TZ);

        let tt = apply_vehicle_position(&table, &update(Some("Q2"), 120), &ctx).unwrap();

        // Before the match: never increased, capped at the new delay.
        assert_eq!(tt.arrival_delay(0), 30);
        assert_eq!(tt.arrival_delay(1), 120);
        // From the match on: the new delay.
        assert_eq!(tt.arrival_delay(2), 120);
        assert_eq!(tt.departure_delay(3), 120);
        assert_eq!(tt.real_time_state(), RealTimeState::Updated);
    }

    #[test]
    fn station_sibling_counts_as_match() {
        let (index, table) = timetable(&[0, 600, 1200], &[]);
        let ctx = UpdateContext::new(&index, TZ);

        let tt = apply_vehicle_position(&table, &update(Some("Q1b"), 60), &ctx).unwrap();
        assert_eq!(tt.arrival_delay(0), 0);
        assert_eq!(tt.arrival_delay(1), 60);
        assert_eq!(tt.arrival_delay(2), 60);
    }

    #[test]
    fn unmatched_stop_caps_every_delay() {
        let (index, mut table) = timetable(&[0, 600, 1200], &[]);
        with_delays(&mut table, &[0, 90, 300]);
        let ctx = UpdateContext::new(&index, TZ);

        let tt = apply_vehicle_position(&table, &update(Some("ELSEWHERE"), 100), &ctx).unwrap();
        assert_eq!(
            (0..3).map(|i| tt.arrival_delay(i)).collect::<Vec<_>>(),
            vec![0, 90, 100]
        );
    }

    #[test]
    fn modified_state_is_kept() {
        let (index, mut table) = timetable(&[0, 600, 1200], &[]);
        let id = FeedScopedId::new("RB", "T1");
        let mut b = table.get(&id).unwrap().to_builder();
        b.set_real_time_state(RealTimeState::Modified);
        table.set_trip_times(b.build()).unwrap();
        let ctx = UpdateContext::new(&index, TZ);

        let tt = apply_vehicle_position(&table, &update(Some("Q0"), 10), &ctx).unwrap();
        assert_eq!(tt.real_time_state(), RealTimeState::Modified);
    }

    #[test]
    fn delay_beyond_the_clock_is_rejected() {
        let (index, table) = timetable(&[0, 600, 1200], &[]);
        let ctx = UpdateContext::new(&index, TZ);

        assert_eq!(
            apply_vehicle_position(&table, &update(Some("Q1"), i32::MAX), &ctx),
            Err(RejectReason::TimeOutOfRange { stop: 1 })
        );
        assert!(apply_vehicle_position(&table, &update(Some("Q1"), 60), &ctx).is_ok());
    }

    #[test]
    fn requires_monitored_call_and_known_trip() {
        let (index, table) = timetable(&[0, 600, 1200], &[]);
        let ctx = UpdateContext::new(&index, TZ);

        assert_eq!(
            apply_vehicle_position(&table, &update(None, 10), &ctx),
            Err(RejectReason::MissingMonitoredCall)
        );

        let mut unknown = update(Some("Q0"), 10);
        unknown.trip_ref = "T404".into();
        assert_eq!(
            apply_vehicle_position(&table, &unknown, &ctx),
            Err(RejectReason::NotFound("T404".into()))
        );
    }
}
