use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, trace};

use logpane_types::{ArcRecord, DEFAULT_MAX_LOGS_PER_LEVEL, LEVEL_COUNT, Record, Severity};

use crate::namespace::{self, NamespaceForest};
use crate::search::{SearchCriteria, SearchFilter};
use crate::window::LiveWindow;

/// Filter settings an application starts out with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSettings {
    pub threshold: Severity,
    pub max_per_level: usize,
    pub search: SearchCriteria,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            threshold: Severity::Trace,
            max_per_level: DEFAULT_MAX_LOGS_PER_LEVEL,
            search: SearchCriteria::default(),
        }
    }
}

/// Buffers and filters the records of one application.
///
/// Records are kept in one capped buffer per severity. The aggregator decides
/// which of them belong in the shared [`LiveWindow`] and keeps the window in
/// step whenever one of its filters changes.
#[derive(Debug)]
pub struct Aggregator {
    name: String,
    buffers: [VecDeque<ArcRecord>; LEVEL_COUNT],
    max_per_level: usize,
    threshold: Severity,
    active: bool,
    search: SearchFilter,
}

impl Aggregator {
    pub fn new(name: impl Into<String>, settings: &ViewSettings) -> Self {
        Self {
            name: name.into(),
            buffers: Default::default(),
            max_per_level: settings.max_per_level,
            threshold: settings.threshold,
            active: true,
            search: SearchFilter::new(settings.search.clone()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn max_per_level(&self) -> usize {
        self.max_per_level
    }

    pub fn search(&self) -> &SearchCriteria {
        self.search.criteria()
    }

    /// Buffered records of one level, oldest first
    pub fn buffered(&self, level: Severity) -> impl Iterator<Item = &ArcRecord> {
        level
            .index()
            .map(|i| &self.buffers[i])
            .into_iter()
            .flatten()
    }

    /// Number of buffered records across all levels
    pub fn len(&self) -> usize {
        self.buffers.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.iter().all(VecDeque::is_empty)
    }

    /// Buffer a record and show it if every filter lets it through
    pub fn add_log(&mut self, record: ArcRecord, window: &mut LiveWindow, namespaces: &NamespaceForest) {
        let Some(index) = record.severity.index() else {
            trace!(app = %self.name, "record without level is counted but not buffered");
            return;
        };

        let buffer = &mut self.buffers[index];
        buffer.push_back(Arc::clone(&record));
        let evicted = if buffer.len() > self.max_per_level {
            buffer.pop_front()
        } else {
            None
        };

        if self.active && self.meets_threshold(&record) && self.passes_filters(&record, namespaces) {
            window.add_leading(record);
        }
        if let Some(evicted) = evicted {
            window.remove(&evicted);
        }
    }

    /// Change the minimum severity, showing or hiding the levels in between
    pub fn set_threshold(&mut self, threshold: Severity, window: &mut LiveWindow, namespaces: &NamespaceForest) {
        let old = std::mem::replace(&mut self.threshold, threshold);
        if !self.active || old == threshold {
            return;
        }

        let band = Severity::levels_between(Some(old), Some(threshold));
        debug!(app = %self.name, from = %old, to = %threshold, ?band, "threshold changed");

        let records = band.iter().flat_map(|level| self.buffered(*level));
        if old.threshold_rank() > threshold.threshold_rank() {
            window.add_many(records, |r| self.passes_filters(r, namespaces));
        } else {
            window.remove_many(records, |r| self.passes_filters(r, namespaces));
        }
    }

    pub fn set_active(&mut self, active: bool, window: &mut LiveWindow, namespaces: &NamespaceForest) {
        if self.active == active {
            return;
        }
        self.active = active;
        debug!(app = %self.name, active, "activity changed");

        if active {
            window.add_many(self.eligible(), |r| self.passes_filters(r, namespaces));
        } else {
            window.remove_all(self.buffers.iter().flatten());
        }
    }

    /// Change the per-level capacity. Shrinking drops the oldest records of
    /// each level and hides those that were visible.
    pub fn set_max_per_level(&mut self, max_per_level: usize, window: &mut LiveWindow, namespaces: &NamespaceForest) {
        let old = std::mem::replace(&mut self.max_per_level, max_per_level);
        if max_per_level >= old {
            return;
        }

        let mut dropped = Vec::new();
        for buffer in &mut self.buffers {
            let surplus = buffer.len().saturating_sub(max_per_level);
            dropped.extend(buffer.drain(..surplus));
        }
        debug!(app = %self.name, max_per_level, dropped = dropped.len(), "capacity reduced");

        if self.active {
            window.remove_many(&dropped, |r| {
                self.meets_threshold(r) && self.passes_filters(r, namespaces)
            });
        }
    }

    /// Replace the search criteria and re-partition the eligible records
    pub fn set_search(&mut self, criteria: SearchCriteria, window: &mut LiveWindow, namespaces: &NamespaceForest) {
        if self.search.criteria() == &criteria {
            return;
        }
        self.search = SearchFilter::new(criteria);
        if !self.active {
            return;
        }

        let (matching, rest): (Vec<&ArcRecord>, Vec<&ArcRecord>) =
            self.eligible().partition(|r| self.search.matches(r));
        window.add_many(matching, |r| namespaces.is_active(&r.application, &r.namespace));
        window.remove_all(rest);
    }

    /// React to a namespace node (and its subtree) being toggled. An empty
    /// `path` stands for the application root.
    pub fn namespace_changed(
        &mut self,
        path: &str,
        selected: bool,
        window: &mut LiveWindow,
        namespaces: &NamespaceForest,
    ) {
        if !self.active {
            return;
        }

        let prefix = namespace::segments(path);
        let records = self
            .eligible()
            .filter(|r| namespace::is_within(&r.namespace, &prefix));
        if selected {
            window.add_many(records, |r| self.passes_filters(r, namespaces));
        } else {
            window.remove_all(records);
        }
    }

    /// Drop every buffered record. The window is left to the caller.
    pub fn clear(&mut self) {
        for buffer in &mut self.buffers {
            buffer.clear();
        }
    }

    /// Buffered records at or above the threshold
    fn eligible(&self) -> impl Iterator<Item = &ArcRecord> {
        let start = self.threshold.index().unwrap_or(LEVEL_COUNT);
        self.buffers[start..].iter().flatten()
    }

    fn meets_threshold(&self, record: &Record) -> bool {
        self.threshold.is_concrete() && record.severity >= self.threshold
    }

    fn passes_filters(&self, record: &Record, namespaces: &NamespaceForest) -> bool {
        namespaces.is_active(&record.application, &record.namespace) && self.search.matches(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use logpane_types::RecordBuilder;

    struct Fixture {
        aggregator: Aggregator,
        window: LiveWindow,
        namespaces: NamespaceForest,
        clock: i64,
    }

    impl Fixture {
        fn new(settings: ViewSettings) -> Self {
            Self {
                aggregator: Aggregator::new("App", &settings),
                window: LiveWindow::new(),
                namespaces: NamespaceForest::new(),
                clock: 0,
            }
        }

        fn log(&mut self, severity: Severity, namespace: &str, message: &str) -> ArcRecord {
            self.clock += 1;
            let ts = FixedOffset::east_opt(0)
                .unwrap()
                .timestamp_millis_opt(self.clock)
                .unwrap();
            let record = Arc::new(
                RecordBuilder::new(ts)
                    .application("App")
                    .namespace(namespace)
                    .severity(severity)
                    .message(message)
                    .build(),
            );
            self.namespaces.register(&record);
            self.aggregator
                .add_log(Arc::clone(&record), &mut self.window, &self.namespaces);
            record
        }

        fn one_per_level(&mut self) {
            for level in Severity::all() {
                self.log(level, "App.Ns", level.name());
            }
        }

        fn visible(&self) -> Vec<Severity> {
            let mut levels: Vec<_> = self.window.iter().map(|r| r.severity).collect();
            levels.sort();
            levels
        }

        fn threshold(&mut self, level: Severity) {
            self.aggregator
                .set_threshold(level, &mut self.window, &self.namespaces);
        }

        fn active(&mut self, active: bool) {
            self.aggregator
                .set_active(active, &mut self.window, &self.namespaces);
        }

        fn search(&mut self, criteria: SearchCriteria) {
            self.aggregator
                .set_search(criteria, &mut self.window, &self.namespaces);
        }
    }

    #[test]
    fn test_capacity_one_keeps_latest() {
        let mut f = Fixture::new(ViewSettings {
            max_per_level: 1,
            ..Default::default()
        });
        let first = f.log(Severity::Trace, "App.Ns", "first");
        let second = f.log(Severity::Trace, "App.Ns", "second");

        let buffered: Vec<_> = f.aggregator.buffered(Severity::Trace).collect();
        assert_eq!(buffered.len(), 1);
        assert!(Arc::ptr_eq(buffered[0], &second));
        assert!(f.window.contains(&second));
        assert!(!f.window.contains(&first));
        assert_eq!(f.window.len(), 1);
    }

    #[test]
    fn test_eviction_hides_record_even_if_new_one_is_hidden() {
        let mut f = Fixture::new(ViewSettings {
            max_per_level: 1,
            ..Default::default()
        });
        let shown = f.log(Severity::Info, "App.Ns", "visible");
        f.search(SearchCriteria::new("visible"));
        f.log(Severity::Info, "App.Ns", "other");

        assert!(!f.window.contains(&shown));
        assert!(f.window.is_empty());
    }

    #[test]
    fn test_raise_threshold_hides_lower_levels() {
        let mut f = Fixture::new(ViewSettings::default());
        f.one_per_level();
        assert_eq!(f.window.len(), 6);

        f.threshold(Severity::Error);
        assert_eq!(f.visible(), vec![Severity::Error, Severity::Fatal]);

        f.threshold(Severity::Debug);
        assert_eq!(f.visible(), Severity::ALL[1..].to_vec());
    }

    #[test]
    fn test_unset_threshold_shows_nothing() {
        let mut f = Fixture::new(ViewSettings::default());
        f.one_per_level();

        f.threshold(Severity::NotSet);
        assert!(f.window.is_empty());

        f.log(Severity::Fatal, "App.Ns", "late");
        assert!(f.window.is_empty());

        f.threshold(Severity::Warn);
        assert_eq!(
            f.visible(),
            vec![Severity::Warn, Severity::Error, Severity::Fatal, Severity::Fatal]
        );
    }

    #[test]
    fn test_toggle_active_restores_sorted() {
        let mut f = Fixture::new(ViewSettings::default());
        f.one_per_level();

        f.active(false);
        assert!(f.window.is_empty());
        f.log(Severity::Info, "App.Ns", "while inactive");
        assert!(f.window.is_empty());

        f.active(true);
        assert_eq!(f.window.len(), 7);
        let times: Vec<_> = f.window.iter().map(|r| r.timestamp).collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_threshold_change_while_inactive_applies_on_reactivation() {
        let mut f = Fixture::new(ViewSettings::default());
        f.one_per_level();
        f.active(false);
        f.threshold(Severity::Error);
        assert!(f.window.is_empty());

        f.active(true);
        assert_eq!(f.visible(), vec![Severity::Error, Severity::Fatal]);
    }

    #[test]
    fn test_shrinking_capacity_drops_oldest() {
        let mut f = Fixture::new(ViewSettings::default());
        let old = f.log(Severity::Warn, "App.Ns", "old");
        let mid = f.log(Severity::Warn, "App.Ns", "mid");
        let new = f.log(Severity::Warn, "App.Ns", "new");
        f.log(Severity::Info, "App.Ns", "info");

        f.aggregator
            .set_max_per_level(1, &mut f.window, &f.namespaces);

        assert_eq!(f.aggregator.len(), 2);
        assert!(!f.window.contains(&old));
        assert!(!f.window.contains(&mid));
        assert!(f.window.contains(&new));
        assert_eq!(f.window.len(), 2);
    }

    #[test]
    fn test_search_partitions_visible_records() {
        let mut f = Fixture::new(ViewSettings::default());
        f.log(Severity::Info, "App.Ns", "payment accepted");
        f.log(Severity::Info, "App.Ns", "user login");
        f.log(Severity::Warn, "App.Ns", "payment retry");

        f.search(SearchCriteria::new("PAYMENT"));
        assert_eq!(f.window.len(), 2);
        assert!(f.window.iter().all(|r| r.message.contains("payment")));

        f.search(SearchCriteria::new("payment").inverted());
        assert_eq!(f.window.len(), 1);
        assert_eq!(f.window.get(0).unwrap().message, "user login");

        f.search(SearchCriteria::default());
        assert_eq!(f.window.len(), 3);
    }

    #[test]
    fn test_namespace_toggle_limited_to_subtree() {
        let mut f = Fixture::new(ViewSettings::default());
        f.log(Severity::Info, "App.Db", "query");
        f.log(Severity::Info, "App.Db.Pool", "acquire");
        f.log(Severity::Info, "App.Dbx", "other");
        f.log(Severity::Info, "App.Web", "request");

        f.namespaces.set_selected("App", "App.Db", false).unwrap();
        f.aggregator
            .namespace_changed("App.Db", false, &mut f.window, &f.namespaces);
        let mut left: Vec<_> = f.window.iter().map(|r| r.namespace.clone()).collect();
        left.sort();
        assert_eq!(left, vec!["App.Dbx", "App.Web"]);

        f.namespaces.set_selected("App", "App.Db", true).unwrap();
        f.aggregator
            .namespace_changed("App.Db", true, &mut f.window, &f.namespaces);
        assert_eq!(f.window.len(), 4);
    }

    #[test]
    fn test_unregistered_namespace_is_hidden() {
        let mut f = Fixture::new(ViewSettings::default());
        let record = Arc::new(
            RecordBuilder::now()
                .application("App")
                .namespace("Never.Seen")
                .severity(Severity::Error)
                .build(),
        );
        f.aggregator
            .add_log(Arc::clone(&record), &mut f.window, &f.namespaces);
        assert!(f.window.is_empty());
        assert_eq!(f.aggregator.len(), 1);
    }

    #[test]
    fn test_not_set_records_are_not_buffered() {
        let mut f = Fixture::new(ViewSettings::default());
        f.log(Severity::NotSet, "App.Ns", "no level");
        assert!(f.aggregator.is_empty());
        assert!(f.window.is_empty());
    }
}
