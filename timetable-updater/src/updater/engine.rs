//! The update loop of one feed.
//!
//! Each cycle takes one batch, applies every message to a private
//! [`SnapshotBuffer`] on a blocking worker, and commits the buffer. A
//! message that is rejected is logged and skipped; the rest of the batch
//! still applies. A cycle that exceeds its timeout publishes nothing.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, trace, warn};

use crate::domain::{
    EstimatedJourney, ServiceDate, TripUpdate, UpdateBatch, UpdateMessage, VehiclePositionUpdate,
};
use crate::realtime::{
    RejectReason, UpdateContext, apply_estimated_journey, apply_trip_update, apply_vehicle_position,
    resolve_service_date,
};
use crate::timetable::{SnapshotBuffer, Timetable, TimetableSnapshotSource, TransitSchedule};

use super::{UpdateSource, UpdaterConfig, UpdaterError};

/// Outcome of one or more update cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Messages whose new times were stored
    pub applied: usize,
    /// Rejected messages per [`RejectReason::label`]
    pub rejected: BTreeMap<&'static str, usize>,
    /// Expired real-time timetables removed
    pub purged: usize,
    /// Snapshot version published at the end of the last cycle
    pub version: u64,
}

impl UpdateSummary {
    /// Total number of rejected messages.
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    fn reject(&mut self, reason: &RejectReason) {
        *self.rejected.entry(reason.label()).or_default() += 1;
    }

    fn absorb(&mut self, other: &UpdateSummary) {
        self.applied += other.applied;
        for (label, count) in &other.rejected {
            *self.rejected.entry(label).or_default() += count;
        }
        self.purged += other.purged;
        self.version = other.version;
    }
}

/// Applies batches from one feed to a shared snapshot source.
#[derive(Debug, Clone)]
pub struct TimetableUpdater {
    config: UpdaterConfig,
    schedule: Arc<TransitSchedule>,
    snapshots: Arc<TimetableSnapshotSource>,
}

impl TimetableUpdater {
    /// Create an updater publishing to `snapshots`.
    pub fn new(
        config: UpdaterConfig,
        schedule: Arc<TransitSchedule>,
        snapshots: Arc<TimetableSnapshotSource>,
    ) -> Self {
        Self {
            config,
            schedule,
            snapshots,
        }
    }

    /// The snapshot source this updater publishes to.
    pub fn snapshots(&self) -> &Arc<TimetableSnapshotSource> {
        &self.snapshots
    }

    /// Run one cycle for `batch`, purging dates before `purge_before`.
    ///
    /// Returns the cycle's summary after the buffer has been committed.
    pub async fn run_cycle(
        &self,
        batch: UpdateBatch,
        purge_before: Option<ServiceDate>,
    ) -> Result<UpdateSummary, UpdaterError> {
        let mut buffer = self.snapshots.begin_cycle();
        let schedule = self.schedule.clone();
        let config = self.config.clone();

        // On timeout the worker is detached; its buffer is dropped uncommitted.
        let worker = tokio::task::spawn_blocking(move || {
            let mut summary = apply_batch(&mut buffer, &schedule, &config, &batch);
            if let Some(before) = purge_before {
                summary.purged = buffer.purge_expired(before);
            }
            (buffer, summary)
        });

        let timeout = self.config.cycle_timeout();
        let (buffer, mut summary) = match tokio::time::timeout(timeout, worker).await {
            Ok(joined) => joined?,
            Err(_) => {
                warn!(feed = %self.config.feed_id, ?timeout, "update cycle timed out, discarding batch");
                return Err(UpdaterError::Timeout(timeout));
            }
        };

        summary.version = buffer.commit();
        info!(
            feed = %self.config.feed_id,
            applied = summary.applied,
            rejected = summary.rejected_total(),
            purged = summary.purged,
            version = summary.version,
            "update cycle finished"
        );
        Ok(summary)
    }

    /// Poll `source` until it is exhausted.
    ///
    /// Batches that cannot be read and cycles that time out or whose worker
    /// fails are logged and skipped. Returns the totals over all cycles.
    pub async fn run<S: UpdateSource>(&self, mut source: S) -> Result<UpdateSummary, UpdaterError> {
        let mut interval = tokio::time::interval(self.config.poll_frequency());
        let mut total = UpdateSummary::default();

        loop {
            interval.tick().await;
            let batch = match source.next_batch().await {
                Ok(Some(batch)) => batch,
                Ok(None) => {
                    info!(feed = %self.config.feed_id, "source exhausted");
                    return Ok(total);
                }
                Err(e) => {
                    warn!(feed = %self.config.feed_id, error = %e, "skipping unreadable batch");
                    continue;
                }
            };

            let purge_before = self.config.retention_cutoff(Utc::now());
            match self.run_cycle(batch, purge_before).await {
                Ok(summary) => total.absorb(&summary),
                // logged by run_cycle
                Err(UpdaterError::Timeout(_)) => {}
                Err(e) => warn!(feed = %self.config.feed_id, error = %e, "update cycle failed, discarding batch"),
            }
        }
    }
}

/// Apply every message of `batch` to `buffer`.
///
/// Rejections are counted and logged; they never stop the batch.
pub fn apply_batch(
    buffer: &mut SnapshotBuffer,
    schedule: &TransitSchedule,
    config: &UpdaterConfig,
    batch: &UpdateBatch,
) -> UpdateSummary {
    let ctx = UpdateContext::new(schedule.stops().as_ref(), config.time_zone);
    let mut summary = UpdateSummary::default();

    for message in &batch.messages {
        let result = match message {
            UpdateMessage::EstimatedJourney(journey) => apply_journey(buffer, schedule, &ctx, journey),
            UpdateMessage::VehiclePosition(update) => apply_position(buffer, schedule, &ctx, update),
            UpdateMessage::TripUpdate(update) => apply_stop_times(buffer, schedule, &ctx, update),
        };
        match result {
            Ok(()) => {
                trace!(trip = %message.trip_ref(), "applied update");
                summary.applied += 1;
            }
            Err(reason) => {
                log_rejection(message.trip_ref(), &reason);
                summary.reject(&reason);
            }
        }
    }
    summary
}

fn log_rejection(trip: &str, reason: &RejectReason) {
    match reason {
        RejectReason::StructuralMismatch { .. }
        | RejectReason::UnknownServiceDate(_)
        | RejectReason::TimeOutOfRange { .. } => {
            warn!(trip, reason = reason.label(), "rejected update: {reason}");
        }
        _ => debug!(trip, reason = reason.label(), "rejected update: {reason}"),
    }
}

/// The scheduled timetable a message refers to.
///
/// Exact ids win. Otherwise `candidates` (from fuzzy matching) must name
/// exactly one trip, whose raw id is returned alongside.
fn locate<'a>(
    schedule: &'a TransitSchedule,
    trip_ref: &str,
    candidates: impl FnOnce() -> Vec<&'a str>,
) -> Result<(&'a Arc<Timetable>, Option<&'a str>), RejectReason> {
    if let Some(table) = schedule.timetable_for_trip(trip_ref) {
        return Ok((table, None));
    }
    match candidates().as_slice() {
        &[raw] => {
            let table = schedule
                .timetable_for_trip(raw)
                .ok_or_else(|| RejectReason::NotFound(trip_ref.to_string()))?;
            debug!(trip = trip_ref, matched = raw, "fuzzy matched trip");
            Ok((table, Some(raw)))
        }
        [] => Err(RejectReason::NotFound(trip_ref.to_string())),
        many => {
            debug!(trip = trip_ref, candidates = many.len(), "ambiguous fuzzy match");
            Err(RejectReason::NotFound(trip_ref.to_string()))
        }
    }
}

fn apply_journey(
    buffer: &mut SnapshotBuffer,
    schedule: &TransitSchedule,
    ctx: &UpdateContext<'_>,
    journey: &EstimatedJourney,
) -> Result<(), RejectReason> {
    let (scheduled, matched) = locate(schedule, &journey.trip_ref, || {
        schedule
            .trip_matcher()
            .match_journey(journey, ctx.time_zone)
            .iter()
            .map(|id| id.id())
            .collect()
    })?;

    let journey = match matched {
        None => Cow::Borrowed(journey),
        Some(raw) => Cow::Owned(EstimatedJourney {
            trip_ref: raw.to_string(),
            ..journey.clone()
        }),
    };

    let existing = scheduled
        .trip_index_by_raw_id(&journey.trip_ref)
        .and_then(|index| scheduled.trip_times(index))
        .ok_or_else(|| RejectReason::NotFound(journey.trip_ref.clone()))?;
    let date = resolve_service_date(&journey, existing, ctx.time_zone)
        .ok_or_else(|| RejectReason::UnknownServiceDate(journey.trip_ref.clone()))?;

    let times = apply_estimated_journey(buffer.view(scheduled, date), &journey, date, ctx)?;
    buffer.begin_update(scheduled, date).set_trip_times(times)
}

fn apply_position(
    buffer: &mut SnapshotBuffer,
    schedule: &TransitSchedule,
    ctx: &UpdateContext<'_>,
    update: &VehiclePositionUpdate,
) -> Result<(), RejectReason> {
    let (scheduled, matched) = locate(schedule, &update.trip_ref, || {
        schedule
            .trip_matcher()
            .match_vehicle(update, ctx.time_zone)
            .iter()
            .map(|id| id.id())
            .collect()
    })?;
    let update = match matched {
        None => Cow::Borrowed(update),
        Some(raw) => Cow::Owned(VehiclePositionUpdate {
            trip_ref: raw.to_string(),
            ..update.clone()
        }),
    };

    let date = update.service_date;
    let times = apply_vehicle_position(buffer.view(scheduled, date), &update, ctx)?;
    buffer.begin_update(scheduled, date).set_trip_times(times)
}

fn apply_stop_times(
    buffer: &mut SnapshotBuffer,
    schedule: &TransitSchedule,
    ctx: &UpdateContext<'_>,
    update: &TripUpdate,
) -> Result<(), RejectReason> {
    let (scheduled, matched) = locate(schedule, &update.trip_ref, || {
        schedule
            .trip_matcher()
            .match_id(&update.trip_ref)
            .iter()
            .map(|id| id.id())
            .collect()
    })?;
    let update = match matched {
        None => Cow::Borrowed(update),
        Some(raw) => Cow::Owned(TripUpdate {
            trip_ref: raw.to_string(),
            ..update.clone()
        }),
    };

    let date = update.service_date;
    let times = apply_trip_update(buffer.view(scheduled, date), &update, ctx)?;
    buffer.begin_update(scheduled, date).set_trip_times(times)
}
