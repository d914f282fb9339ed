use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use logpane_types::{ArcRecord, Record, Severity};

use crate::ViewError;
use crate::aggregator::{Aggregator, ViewSettings};
use crate::namespace::{LevelCounts, NamespaceForest};
use crate::search::SearchCriteria;
use crate::window::{LiveWindow, WindowChange};

/// Everything guarded by the coordinator's lock
#[derive(Debug)]
struct ViewState {
    pending: Vec<ArcRecord>,
    receiving: bool,
    defaults: ViewSettings,
    aggregators: BTreeMap<String, Aggregator>,
    namespaces: NamespaceForest,
    window: LiveWindow,
}

/// Per-application summary for front ends
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplicationSummary {
    pub name: String,
    pub threshold: Severity,
    pub active: bool,
    pub buffered: usize,
}

/// Collects received records and applies them to the view in batches.
///
/// One lock guards the pending queue, the aggregators, the namespace trees
/// and the live window. Receivers only hold it to push onto the queue;
/// [`Coordinator::tick`] and the filter operations hold it for the whole
/// update, so readers never observe half of a batch.
#[derive(Debug)]
pub struct Coordinator {
    state: Mutex<ViewState>,
    timing_trace: bool,
}

impl Coordinator {
    pub fn new(defaults: ViewSettings) -> Self {
        Self {
            state: Mutex::new(ViewState {
                pending: Vec::new(),
                receiving: true,
                defaults,
                aggregators: BTreeMap::new(),
                namespaces: NamespaceForest::new(),
                window: LiveWindow::new(),
            }),
            timing_trace: false,
        }
    }

    /// Log the duration of every tick phase at `trace`
    pub fn with_timing_trace(mut self, enabled: bool) -> Self {
        self.timing_trace = enabled;
        self
    }

    /// Queue a record for the next tick. Sentinel records and anything
    /// received while receiving is off are dropped.
    pub fn enqueue(&self, record: ArcRecord) {
        if Record::is_sentinel(&record) {
            return;
        }
        let mut state = self.state.lock();
        if state.receiving {
            state.pending.push(record);
        }
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Apply every queued record to the view. Returns how many were processed.
    pub fn tick(&self) -> usize {
        let mut guard = self.state.lock();
        if guard.pending.is_empty() {
            return 0;
        }

        let mut batch = std::mem::take(&mut guard.pending);
        // stable: equal timestamps keep arrival order
        batch.sort_by_key(|r| r.timestamp);

        let ViewState {
            defaults,
            aggregators,
            namespaces,
            window,
            ..
        } = &mut *guard;

        self.run_phase("update applications", || {
            for record in &batch {
                if !aggregators.contains_key(&record.application) {
                    debug!(app = %record.application, "new application");
                    aggregators.insert(
                        record.application.clone(),
                        Aggregator::new(&record.application, defaults),
                    );
                }
            }
        });

        self.run_phase("update namespaces", || {
            for record in &batch {
                namespaces.register(record);
            }
        });

        self.run_phase("add logs", || add_logs(&batch, aggregators, window, namespaces));

        batch.len()
    }

    fn run_phase<T>(&self, phase: &'static str, body: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = body();
        if self.timing_trace {
            trace!(phase, elapsed_us = started.elapsed().as_micros() as u64, "tick phase done");
        }
        result
    }

    pub fn set_threshold(&self, application: &str, threshold: Severity) -> Result<(), ViewError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let aggregator = state
            .aggregators
            .get_mut(application)
            .ok_or_else(|| ViewError::UnknownApplication(application.to_string()))?;
        aggregator.set_threshold(threshold, &mut state.window, &state.namespaces);
        Ok(())
    }

    /// Threshold for applications seen from now on
    pub fn set_default_threshold(&self, threshold: Severity) {
        self.state.lock().defaults.threshold = threshold;
    }

    pub fn set_active(&self, application: &str, active: bool) -> Result<(), ViewError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let aggregator = state
            .aggregators
            .get_mut(application)
            .ok_or_else(|| ViewError::UnknownApplication(application.to_string()))?;
        aggregator.set_active(active, &mut state.window, &state.namespaces);
        Ok(())
    }

    /// Deactivate every application
    pub fn unselect_all(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        for aggregator in state.aggregators.values_mut() {
            aggregator.set_active(false, &mut state.window, &state.namespaces);
        }
    }

    /// Capacity of one application
    pub fn set_max_per_level(&self, application: &str, max_per_level: usize) -> Result<(), ViewError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let aggregator = state
            .aggregators
            .get_mut(application)
            .ok_or_else(|| ViewError::UnknownApplication(application.to_string()))?;
        aggregator.set_max_per_level(max_per_level, &mut state.window, &state.namespaces);
        Ok(())
    }

    /// Capacity of every application, present and future
    pub fn set_max_per_level_all(&self, max_per_level: usize) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.defaults.max_per_level = max_per_level;
        for aggregator in state.aggregators.values_mut() {
            aggregator.set_max_per_level(max_per_level, &mut state.window, &state.namespaces);
        }
    }

    /// Search of every application, present and future
    pub fn set_search(&self, criteria: SearchCriteria) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.defaults.search = criteria.clone();
        for aggregator in state.aggregators.values_mut() {
            aggregator.set_search(criteria.clone(), &mut state.window, &state.namespaces);
        }
    }

    /// Select or unselect a namespace subtree of an application. An empty
    /// `path` addresses the application root.
    pub fn set_namespace_selected(&self, application: &str, path: &str, selected: bool) -> Result<(), ViewError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.namespaces.set_selected(application, path, selected)?;
        state
            .aggregators
            .get_mut(application)
            .ok_or_else(|| ViewError::UnknownApplication(application.to_string()))?
            .namespace_changed(path, selected, &mut state.window, &state.namespaces);
        Ok(())
    }

    /// Start or stop accepting records
    pub fn set_receiving(&self, receiving: bool) {
        let mut state = self.state.lock();
        state.receiving = receiving;
        if !receiving {
            state.pending.clear();
        }
    }

    pub fn is_receiving(&self) -> bool {
        self.state.lock().receiving
    }

    /// Drop every record but keep applications, namespaces and filters
    pub fn clear_logs(&self) {
        let mut state = self.state.lock();
        state.pending.clear();
        state.window.clear();
        for aggregator in state.aggregators.values_mut() {
            aggregator.clear();
        }
        state.namespaces.reset_counts();
    }

    /// Forget everything that was received
    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        state.pending.clear();
        state.window.clear();
        state.aggregators.clear();
        state.namespaces.clear();
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<WindowChange> {
        self.state.lock().window.subscribe()
    }

    /// Visible records, newest first
    pub fn visible(&self) -> Vec<ArcRecord> {
        self.state.lock().window.snapshot()
    }

    pub fn visible_len(&self) -> usize {
        self.state.lock().window.len()
    }

    pub fn applications(&self) -> Vec<ApplicationSummary> {
        self.state
            .lock()
            .aggregators
            .values()
            .map(|a| ApplicationSummary {
                name: a.name().to_string(),
                threshold: a.threshold(),
                active: a.is_active(),
                buffered: a.len(),
            })
            .collect()
    }

    /// Path of the namespace node a record was counted on
    pub fn namespace_of(&self, record: &Record) -> Option<String> {
        self.state
            .lock()
            .namespaces
            .namespace_of(record)
            .map(str::to_string)
    }

    pub fn namespace_counts(&self, application: &str, path: &str) -> Option<LevelCounts> {
        self.state
            .lock()
            .namespaces
            .node(application, path)
            .map(|node| node.counts().clone())
    }

    pub fn is_namespace_selected(&self, application: &str, path: &str) -> bool {
        self.state.lock().namespaces.is_active(application, path)
    }
}

/// Hand every record to its application's aggregator. A record without one
/// is logged and skipped. Returns how many were added.
fn add_logs(
    batch: &[ArcRecord],
    aggregators: &mut BTreeMap<String, Aggregator>,
    window: &mut LiveWindow,
    namespaces: &NamespaceForest,
) -> usize {
    let mut added = 0;
    for record in batch {
        let Some(aggregator) = aggregators.get_mut(&record.application) else {
            let e = ViewError::UnknownApplication(record.application.clone());
            error!(error = %e, "record skipped");
            continue;
        };
        aggregator.add_log(Arc::clone(record), window, namespaces);
        added += 1;
    }
    added
}
