//! Versioned, copy-on-write publication of real-time timetables.
//!
//! Readers load the published [`TimetableSnapshot`] and keep it as long as
//! they need a consistent view; loads never block. Each writer edits a
//! private [`SnapshotBuffer`] for the length of one update cycle and then
//! commits it, which publishes the touched timetables all at once.
//!
//! Commits merge into whatever version is current at that moment, so
//! several feeds may commit concurrently. If another commit published the
//! same (pattern, date) key in the meantime, only the trips this buffer
//! replaced are applied on top of it; when both replaced the same trip, the
//! later commit wins.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, trace, warn};

use crate::domain::{PatternId, ServiceDate, TripTimes};

use super::Timetable;

/// Key of a real-time timetable.
pub type TimetableKey = (PatternId, ServiceDate);

/// One immutable published version.
#[derive(Debug, Clone, Default)]
pub struct TimetableSnapshot {
    version: u64,
    timetables: HashMap<TimetableKey, Arc<Timetable>>,
}

impl TimetableSnapshot {
    /// Version number, incremented by every commit that changes something.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The timetable to use for `scheduled`'s pattern on `date`.
    ///
    /// Falls back to the scheduled timetable when no real-time timetable
    /// exists for the date.
    pub fn resolve(&self, scheduled: &Arc<Timetable>, date: ServiceDate) -> Arc<Timetable> {
        self.get(&scheduled.pattern().id, date)
            .cloned()
            .unwrap_or_else(|| scheduled.clone())
    }

    /// The real-time timetable of `pattern` on `date`, if any.
    pub fn get(&self, pattern: &PatternId, date: ServiceDate) -> Option<&Arc<Timetable>> {
        self.timetables.get(&(pattern.clone(), date))
    }

    /// Number of real-time timetables.
    pub fn len(&self) -> usize {
        self.timetables.len()
    }

    /// Returns true if no real-time timetable exists.
    pub fn is_empty(&self) -> bool {
        self.timetables.is_empty()
    }

    /// All real-time timetables.
    pub fn iter(&self) -> impl Iterator<Item = (&TimetableKey, &Arc<Timetable>)> {
        self.timetables.iter()
    }
}

/// Holder of the currently published snapshot.
#[derive(Debug, Default)]
pub struct TimetableSnapshotSource {
    published: ArcSwap<TimetableSnapshot>,
}

impl TimetableSnapshotSource {
    /// A source publishing an empty version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current published snapshot.
    pub fn snapshot(&self) -> Arc<TimetableSnapshot> {
        self.published.load_full()
    }

    /// Start an update cycle on top of the current snapshot.
    pub fn begin_cycle(self: &Arc<Self>) -> SnapshotBuffer {
        SnapshotBuffer::new(self.clone())
    }
}

/// A timetable copied into a buffer, with the trip times it was copied with.
#[derive(Debug)]
struct BufferedTimetable {
    origin: Vec<Arc<TripTimes>>,
    table: Timetable,
}

impl BufferedTimetable {
    fn new(table: Timetable) -> Self {
        Self {
            origin: table.iter().cloned().collect(),
            table,
        }
    }

    /// Trip times replaced since the copy was made.
    fn replaced(&self) -> Vec<Arc<TripTimes>> {
        self.table
            .iter()
            .enumerate()
            .filter(|(index, tt)| {
                self.origin
                    .get(*index)
                    .is_none_or(|original| !Arc::ptr_eq(original, tt))
            })
            .map(|(_, tt)| tt.clone())
            .collect()
    }
}

/// A touched timetable ready to be merged into the published snapshot.
struct PendingTimetable {
    key: TimetableKey,
    /// What the buffer's base version held for the key
    base: Option<Arc<Timetable>>,
    table: Arc<Timetable>,
    replaced: Vec<Arc<TripTimes>>,
}

impl PendingTimetable {
    /// The table to publish when `current` is what is published now.
    fn merge_into(&self, current: Option<&Arc<Timetable>>) -> Arc<Timetable> {
        let current = match (current, &self.base) {
            (Some(current), Some(base)) if Arc::ptr_eq(current, base) => return self.table.clone(),
            (Some(current), _) => current,
            (None, _) => return self.table.clone(),
        };

        let mut table = Timetable::clone(current);
        for trip_times in &self.replaced {
            if let Err(reason) = table.set_shared_trip_times(trip_times.clone()) {
                warn!(pattern = %self.key.0, date = %self.key.1, %reason, "dropping trip from merge");
            }
        }
        table.finish();
        Arc::new(table)
    }
}

/// A writer's private edits for one update cycle.
///
/// Timetables are copied from the published version on first write. Nothing
/// is visible to readers until [`SnapshotBuffer::commit`].
#[derive(Debug)]
pub struct SnapshotBuffer {
    source: Arc<TimetableSnapshotSource>,
    base: Arc<TimetableSnapshot>,
    dirty: HashMap<TimetableKey, BufferedTimetable>,
    purge_before: Option<ServiceDate>,
}

impl SnapshotBuffer {
    /// A buffer over the snapshot currently published by `source`.
    pub fn new(source: Arc<TimetableSnapshotSource>) -> Self {
        let base = source.snapshot();
        Self {
            source,
            base,
            dirty: HashMap::new(),
            purge_before: None,
        }
    }

    /// The version this buffer was started from.
    pub fn base_version(&self) -> u64 {
        self.base.version
    }

    /// The timetable of `scheduled`'s pattern on `date` as this cycle sees it.
    ///
    /// Edits made earlier in the cycle are visible.
    pub fn view<'a>(&'a self, scheduled: &'a Timetable, date: ServiceDate) -> &'a Timetable {
        let key = (scheduled.pattern().id.clone(), date);
        if let Some(buffered) = self.dirty.get(&key) {
            return &buffered.table;
        }
        match self.base.timetables.get(&key) {
            Some(table) => table.as_ref(),
            None => scheduled,
        }
    }

    /// The buffered, writable timetable of `scheduled`'s pattern on `date`.
    pub fn begin_update(&mut self, scheduled: &Timetable, date: ServiceDate) -> &mut Timetable {
        let key = (scheduled.pattern().id.clone(), date);
        let base = &self.base;
        let buffered = self.dirty.entry(key).or_insert_with_key(|key| {
            trace!(pattern = %key.0, date = %key.1, "copying timetable into buffer");
            BufferedTimetable::new(match base.timetables.get(key) {
                Some(published) => Timetable::clone(published),
                None => scheduled.for_service_date(date),
            })
        });
        &mut buffered.table
    }

    /// Drop real-time timetables for service dates before `before`.
    ///
    /// Returns the number of published timetables that will be removed on
    /// commit.
    pub fn purge_expired(&mut self, before: ServiceDate) -> usize {
        self.dirty.retain(|(_, date), _| *date >= before);
        self.purge_before = Some(before);
        self.base
            .timetables
            .keys()
            .filter(|(_, date)| *date < before)
            .count()
    }

    /// Number of timetables edited in this cycle.
    pub fn touched(&self) -> usize {
        self.dirty.len()
    }

    /// Returns true if committing would change nothing.
    pub fn is_clean(&self) -> bool {
        self.dirty.is_empty()
            && self.purge_before.is_none_or(|before| {
                !self.base.timetables.keys().any(|(_, date)| *date < before)
            })
    }

    /// Publish every touched timetable at once and return the version now
    /// published.
    ///
    /// Touched timetables get their statistics recomputed first. A clean
    /// buffer publishes nothing.
    pub fn commit(self) -> u64 {
        if self.is_clean() {
            trace!(version = self.base.version, "nothing to commit");
            return self.source.snapshot().version;
        }

        let base = &self.base;
        let touched: Vec<PendingTimetable> = self
            .dirty
            .into_iter()
            .map(|(key, buffered)| {
                let replaced = buffered.replaced();
                let mut table = buffered.table;
                table.finish();
                PendingTimetable {
                    base: base.timetables.get(&key).cloned(),
                    key,
                    table: Arc::new(table),
                    replaced,
                }
            })
            .collect();
        let purge_before = self.purge_before;

        let previous = self.source.published.rcu(|current| {
            let mut next = TimetableSnapshot::clone(current);
            next.version += 1;
            if let Some(before) = purge_before {
                next.timetables.retain(|(_, date), _| *date >= before);
            }
            for pending in &touched {
                let table = pending.merge_into(next.timetables.get(&pending.key));
                next.timetables.insert(pending.key.clone(), table);
            }
            next
        });

        let version = previous.version + 1;
        debug!(version, touched = touched.len(), "published timetable snapshot");
        version
    }

    /// Discard every edit of this cycle.
    pub fn rollback(self) {
        debug!(
            base_version = self.base.version,
            discarded = self.dirty.len(),
            "rolled back timetable buffer"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_support::regular_pattern;
    use crate::domain::{FeedScopedId, ScheduledTrip, TripPattern, TripTimes};

    fn scheduled(pattern: &str) -> Arc<Timetable> {
        let pattern = Arc::new(TripPattern::new(
            PatternId(FeedScopedId::new("F", pattern)),
            regular_pattern(3),
        ));
        let mut table = Timetable::new(pattern.clone());
        let trip = ScheduledTrip::new(
            FeedScopedId::new("F", "T1"),
            pattern.stop_pattern.clone(),
            vec![0, 600, 1200],
            vec![0, 600, 1200],
        )
        .unwrap();
        table
            .add_trip_times(TripTimes::scheduled(&trip).unwrap())
            .unwrap();
        table.finish();
        Arc::new(table)
    }

    /// Scheduled timetable of `P1` with trips `T1` and `T2`.
    fn two_trips() -> Arc<Timetable> {
        let mut table = Timetable::clone(&scheduled("P1"));
        let trip = ScheduledTrip::new(
            FeedScopedId::new("F", "T2"),
            table.pattern().stop_pattern.clone(),
            vec![60, 660, 1260],
            vec![60, 660, 1260],
        )
        .unwrap();
        table
            .add_trip_times(TripTimes::scheduled(&trip).unwrap())
            .unwrap();
        table.finish();
        Arc::new(table)
    }

    fn delay(buffer: &mut SnapshotBuffer, table: &Timetable, trip: &str, day: ServiceDate, delay: i32) {
        let id = FeedScopedId::new("F", trip);
        let current = buffer.view(table, day).get(&id).unwrap().clone();
        let mut b = current.to_builder();
        b.set_arrival_delay(2, delay).set_departure_delay(2, delay);
        buffer
            .begin_update(table, day)
            .set_trip_times(b.build())
            .unwrap();
    }

    fn date(day: u32) -> ServiceDate {
        ServiceDate::parse(&format!("2024-03-{day:02}")).unwrap()
    }

    fn delay_t1(buffer: &mut SnapshotBuffer, table: &Timetable, day: ServiceDate, secs: i32) {
        delay(buffer, table, "T1", day, secs);
    }

    #[test]
    fn resolve_falls_back_to_schedule() {
        let source = Arc::new(TimetableSnapshotSource::new());
        let table = scheduled("P1");

        let snapshot = source.snapshot();
        assert_eq!(snapshot.version(), 0);
        assert!(Arc::ptr_eq(&snapshot.resolve(&table, date(15)), &table));
    }

    #[test]
    fn readers_keep_their_version() {
        let source = Arc::new(TimetableSnapshotSource::new());
        let table = scheduled("P1");
        let id = FeedScopedId::new("F", "T1");
        let before = source.snapshot();

        let mut buffer = source.begin_cycle();
        delay_t1(&mut buffer, &table, date(15), 60);

        // Uncommitted edits are visible to the writer only.
        assert_eq!(buffer.view(&table, date(15)).get(&id).unwrap().arrival(2), 1260);
        assert_eq!(source.snapshot().version(), 0);

        assert_eq!(buffer.commit(), 1);
        let after = source.snapshot();

        assert_eq!(before.resolve(&table, date(15)).get(&id).unwrap().arrival(2), 1200);
        assert_eq!(after.resolve(&table, date(15)).get(&id).unwrap().arrival(2), 1260);
        // Other dates still resolve to the schedule.
        assert_eq!(after.resolve(&table, date(16)).get(&id).unwrap().arrival(2), 1200);
        // The scheduled timetable itself is untouched.
        assert_eq!(table.get(&id).unwrap().arrival(2), 1200);
    }

    #[test]
    fn commit_recomputes_statistics() {
        let source = Arc::new(TimetableSnapshotSource::new());
        let table = scheduled("P1");

        let mut buffer = source.begin_cycle();
        delay_t1(&mut buffer, &table, date(15), 60);
        buffer.commit();

        let snapshot = source.snapshot();
        let published = snapshot.get(&table.pattern().id, date(15)).unwrap();
        assert_eq!(published.stats().max_time, Some(1260));
        assert_eq!(published.service_date(), Some(date(15)));
    }

    #[test]
    fn rollback_publishes_nothing() {
        let source = Arc::new(TimetableSnapshotSource::new());
        let table = scheduled("P1");

        let mut buffer = source.begin_cycle();
        delay_t1(&mut buffer, &table, date(15), 60);
        assert_eq!(buffer.touched(), 1);
        buffer.rollback();

        let snapshot = source.snapshot();
        assert_eq!(snapshot.version(), 0);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn clean_commit_keeps_version() {
        let source = Arc::new(TimetableSnapshotSource::new());
        let buffer = source.begin_cycle();
        assert!(buffer.is_clean());
        assert_eq!(buffer.commit(), 0);
    }

    #[test]
    fn concurrent_buffers_merge_distinct_keys() {
        let source = Arc::new(TimetableSnapshotSource::new());
        let p1 = scheduled("P1");
        let p2 = scheduled("P2");

        let mut first = source.begin_cycle();
        let mut second = source.begin_cycle();
        delay_t1(&mut first, &p1, date(15), 60);
        delay_t1(&mut second, &p2, date(15), 90);

        assert_eq!(first.commit(), 1);
        assert_eq!(second.commit(), 2);

        let snapshot = source.snapshot();
        assert_eq!(snapshot.len(), 2);
        let id = FeedScopedId::new("F", "T1");
        assert_eq!(snapshot.resolve(&p1, date(15)).get(&id).unwrap().arrival(2), 1260);
        assert_eq!(snapshot.resolve(&p2, date(15)).get(&id).unwrap().arrival(2), 1290);
    }

    #[test]
    fn concurrent_buffers_keep_each_others_trips() {
        let source = Arc::new(TimetableSnapshotSource::new());
        let table = two_trips();
        let t1 = FeedScopedId::new("F", "T1");
        let t2 = FeedScopedId::new("F", "T2");

        let mut first = source.begin_cycle();
        let mut second = source.begin_cycle();
        delay(&mut first, &table, "T1", date(15), 60);
        delay(&mut second, &table, "T2", date(15), 90);

        assert_eq!(first.commit(), 1);
        assert_eq!(second.commit(), 2);

        let published = source.snapshot().resolve(&table, date(15));
        assert_eq!(published.get(&t1).unwrap().arrival(2), 1260);
        assert_eq!(published.get(&t2).unwrap().arrival(2), 1350);
        assert_eq!(published.stats().max_time, Some(1350));
    }

    #[test]
    fn same_trip_in_two_buffers_last_commit_wins() {
        let source = Arc::new(TimetableSnapshotSource::new());
        let table = two_trips();
        let t1 = FeedScopedId::new("F", "T1");

        let mut first = source.begin_cycle();
        delay(&mut first, &table, "T1", date(15), 60);
        first.commit();

        let mut stale = source.begin_cycle();
        let mut fresh = source.begin_cycle();
        delay(&mut fresh, &table, "T2", date(15), 30);
        delay(&mut stale, &table, "T1", date(15), 120);
        fresh.commit();
        stale.commit();

        let published = source.snapshot().resolve(&table, date(15));
        assert_eq!(published.get(&t1).unwrap().arrival(2), 1320);
        assert_eq!(published.get(&FeedScopedId::new("F", "T2")).unwrap().arrival(2), 1290);
    }

    #[test]
    fn purge_drops_old_dates() {
        let source = Arc::new(TimetableSnapshotSource::new());
        let table = scheduled("P1");

        let mut buffer = source.begin_cycle();
        delay_t1(&mut buffer, &table, date(14), 30);
        delay_t1(&mut buffer, &table, date(15), 60);
        buffer.commit();
        assert_eq!(source.snapshot().len(), 2);

        let mut buffer = source.begin_cycle();
        assert_eq!(buffer.purge_expired(date(15)), 1);
        assert!(!buffer.is_clean());
        buffer.commit();

        let snapshot = source.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get(&table.pattern().id, date(14)).is_none());
        assert!(snapshot.get(&table.pattern().id, date(15)).is_some());
    }

    #[test]
    fn later_edits_build_on_published_version() {
        let source = Arc::new(TimetableSnapshotSource::new());
        let table = scheduled("P1");
        let id = FeedScopedId::new("F", "T1");

        let mut buffer = source.begin_cycle();
        delay_t1(&mut buffer, &table, date(15), 60);
        buffer.commit();

        let mut buffer = source.begin_cycle();
        assert_eq!(buffer.base_version(), 1);
        assert_eq!(buffer.view(&table, date(15)).get(&id).unwrap().arrival(2), 1260);
        delay_t1(&mut buffer, &table, date(15), 120);
        buffer.commit();

        assert_eq!(
            source.snapshot().resolve(&table, date(15)).get(&id).unwrap().arrival(2),
            1320
        );
    }
}
