use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use logpane_types::{ArcRecord, Record};

/// Change notification emitted by the [`LiveWindow`]
#[derive(Clone, Debug)]
pub enum WindowChange {
    /// One record was inserted at `index`
    Added { index: usize, record: ArcRecord },
    /// One record was removed from `index`
    Removed { index: usize, record: ArcRecord },
    /// A batch changed the window; observers should re-read it
    Reset,
}

/// The visible records, newest first.
///
/// Every insertion goes through an ordering-aware operation, so the window is
/// always sorted by non-increasing timestamp and never holds the same record
/// twice. Identity is the record's allocation, not its contents.
#[derive(Debug, Default)]
pub struct LiveWindow {
    records: VecDeque<ArcRecord>,
    members: HashSet<usize>,
    observers: Vec<mpsc::UnboundedSender<WindowChange>>,
}

fn identity(record: &ArcRecord) -> usize {
    Arc::as_ptr(record) as usize
}

impl LiveWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Closed receivers are dropped on the next change.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<WindowChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, record: &ArcRecord) -> bool {
        self.members.contains(&identity(record))
    }

    pub fn get(&self, index: usize) -> Option<&ArcRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArcRecord> {
        self.records.iter()
    }

    /// Clone the handles of all visible records (newest first)
    pub fn snapshot(&self) -> Vec<ArcRecord> {
        self.records.iter().cloned().collect()
    }

    /// Insert a record expected to be the newest one.
    ///
    /// Falls back to the sorted position when the record is older than the
    /// current head, so ordering holds even for late arrivals.
    pub fn add_leading(&mut self, record: ArcRecord) -> bool {
        if self.contains(&record) {
            return false;
        }

        let index = match self.records.front() {
            Some(head) if record.timestamp < head.timestamp => {
                debug!(timestamp = %record.timestamp, "late record, inserting in order");
                self.sorted_index(&record)
            }
            _ => 0,
        };
        self.insert(index, record);
        true
    }

    /// Insert a record at its sorted position
    pub fn add(&mut self, record: ArcRecord) -> bool {
        if self.contains(&record) {
            return false;
        }

        let index = self.sorted_index(&record);
        self.insert(index, record);
        true
    }

    /// Insert every record that is not yet visible and passes `predicate`.
    /// Emits a single [`WindowChange::Reset`] if anything was inserted.
    pub fn add_many<'a, I, P>(&mut self, records: I, mut predicate: P) -> usize
    where
        I: IntoIterator<Item = &'a ArcRecord>,
        P: FnMut(&Record) -> bool,
    {
        let mut inserted = 0;
        for record in records {
            if self.contains(record) || !predicate(record) {
                continue;
            }
            let index = self.sorted_index(record);
            self.members.insert(identity(record));
            self.records.insert(index, Arc::clone(record));
            inserted += 1;
        }

        if inserted > 0 {
            self.notify(WindowChange::Reset);
        }
        inserted
    }

    /// Remove every visible record that passes `predicate`.
    /// Emits a single [`WindowChange::Reset`] and returns `true` if anything
    /// was removed.
    pub fn remove_many<'a, I, P>(&mut self, records: I, mut predicate: P) -> bool
    where
        I: IntoIterator<Item = &'a ArcRecord>,
        P: FnMut(&Record) -> bool,
    {
        let doomed: HashSet<usize> = records
            .into_iter()
            .filter(|record| self.contains(record) && predicate(record))
            .map(identity)
            .collect();

        if doomed.is_empty() {
            return false;
        }

        self.records.retain(|record| !doomed.contains(&identity(record)));
        self.members.retain(|key| !doomed.contains(key));
        self.notify(WindowChange::Reset);
        true
    }

    /// Remove every given record that is visible
    pub fn remove_all<'a, I>(&mut self, records: I) -> bool
    where
        I: IntoIterator<Item = &'a ArcRecord>,
    {
        self.remove_many(records, |_| true)
    }

    /// Remove a single record; no-op if it is not visible
    pub fn remove(&mut self, record: &ArcRecord) -> bool {
        if !self.contains(record) {
            return false;
        }
        match self.records.iter().position(|r| Arc::ptr_eq(r, record)) {
            Some(index) => self.remove_at(index).is_some(),
            None => false,
        }
    }

    pub fn remove_at(&mut self, index: usize) -> Option<ArcRecord> {
        let record = self.records.remove(index)?;
        self.members.remove(&identity(&record));
        self.notify(WindowChange::Removed {
            index,
            record: Arc::clone(&record),
        });
        Some(record)
    }

    pub fn clear(&mut self) {
        if self.records.is_empty() {
            return;
        }
        self.records.clear();
        self.members.clear();
        self.notify(WindowChange::Reset);
    }

    /// First position holding a strictly older record; ties go after the
    /// records already present.
    fn sorted_index(&self, record: &Record) -> usize {
        self.records
            .partition_point(|existing| existing.timestamp >= record.timestamp)
    }

    fn insert(&mut self, index: usize, record: ArcRecord) {
        self.members.insert(identity(&record));
        self.records.insert(index, Arc::clone(&record));
        self.notify(WindowChange::Added { index, record });
    }

    fn notify(&mut self, change: WindowChange) {
        self.observers.retain(|tx| tx.send(change.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use logpane_types::RecordBuilder;

    fn record(ms: i64) -> ArcRecord {
        let ts = FixedOffset::east_opt(0)
            .unwrap()
            .timestamp_millis_opt(ms)
            .unwrap();
        Arc::new(RecordBuilder::new(ts).message(format!("at {ms}")).build())
    }

    fn times(window: &LiveWindow) -> Vec<i64> {
        window.iter().map(|r| r.timestamp.timestamp_millis()).collect()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<WindowChange>) -> Vec<WindowChange> {
        let mut changes = Vec::new();
        while let Ok(change) = rx.try_recv() {
            changes.push(change);
        }
        changes
    }

    #[test]
    fn test_add_keeps_newest_first() {
        let mut window = LiveWindow::new();
        for ms in [20, 10, 30, 25] {
            assert!(window.add(record(ms)));
        }
        assert_eq!(times(&window), vec![30, 25, 20, 10]);
    }

    #[test]
    fn test_equal_timestamps_insert_after_existing() {
        let mut window = LiveWindow::new();
        let first = record(10);
        let second = record(10);
        window.add(Arc::clone(&first));
        window.add(Arc::clone(&second));

        assert!(Arc::ptr_eq(window.get(0).unwrap(), &first));
        assert!(Arc::ptr_eq(window.get(1).unwrap(), &second));
    }

    #[test]
    fn test_duplicates_are_ignored() {
        let mut window = LiveWindow::new();
        let r = record(5);
        assert!(window.add(Arc::clone(&r)));
        assert!(!window.add(Arc::clone(&r)));
        assert!(!window.add_leading(Arc::clone(&r)));
        assert_eq!(window.add_many([&r], |_| true), 0);
        assert_eq!(window.len(), 1);

        // same contents, different record
        let twin = Arc::new((*r).clone());
        assert!(window.add(twin));
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_add_leading_falls_back_for_late_records() {
        let mut window = LiveWindow::new();
        window.add_leading(record(10));
        window.add_leading(record(30));
        window.add_leading(record(20));
        assert_eq!(times(&window), vec![30, 20, 10]);
    }

    #[test]
    fn test_single_changes_notify_per_item() {
        let mut window = LiveWindow::new();
        let mut rx = window.subscribe();
        let r = record(1);

        window.add_leading(Arc::clone(&r));
        window.add(record(0));
        assert!(window.remove(&r));
        assert!(!window.remove(&r));

        let changes = drain(&mut rx);
        assert_eq!(changes.len(), 3);
        assert!(matches!(changes[0], WindowChange::Added { index: 0, .. }));
        assert!(matches!(changes[1], WindowChange::Added { index: 1, .. }));
        assert!(matches!(changes[2], WindowChange::Removed { index: 0, .. }));
    }

    #[test]
    fn test_batches_coalesce_into_one_reset() {
        let mut window = LiveWindow::new();
        let mut rx = window.subscribe();
        let batch: Vec<_> = (0..10).map(record).collect();

        assert_eq!(window.add_many(&batch, |r| r.timestamp.timestamp_millis() % 2 == 0), 5);
        assert!(window.remove_many(&batch, |_| true));
        assert!(!window.remove_all(&batch));

        let changes = drain(&mut rx);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| matches!(c, WindowChange::Reset)));
        assert!(window.is_empty());
    }

    #[test]
    fn test_remove_many_respects_predicate() {
        let mut window = LiveWindow::new();
        let batch: Vec<_> = (0..4).map(record).collect();
        window.add_many(&batch, |_| true);

        assert!(window.remove_many(&batch, |r| r.timestamp.timestamp_millis() >= 2));
        assert_eq!(times(&window), vec![1, 0]);
        assert!(!window.contains(&batch[3]));
        assert!(window.contains(&batch[0]));
    }

    #[test]
    fn test_closed_observers_are_dropped() {
        let mut window = LiveWindow::new();
        let rx = window.subscribe();
        drop(rx);
        window.add(record(1));
        assert!(window.observers.is_empty());
    }
}
