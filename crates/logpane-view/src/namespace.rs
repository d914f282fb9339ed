use std::collections::BTreeMap;

use logpane_types::{LEVEL_COUNT, NAMESPACE_SPLITTER, Record, Severity};

use crate::ViewError;

/// Split a dot-separated namespace into its non-empty segments
pub fn segments(namespace: &str) -> Vec<&str> {
    namespace
        .split(NAMESPACE_SPLITTER)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whether `namespace` lies at or below the path given by `prefix`
pub fn is_within(namespace: &str, prefix: &[&str]) -> bool {
    let mut parts = namespace.split(NAMESPACE_SPLITTER).filter(|s| !s.is_empty());
    prefix.iter().all(|p| parts.next() == Some(*p))
}

/// Record counts per severity
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelCounts {
    per_level: [u64; LEVEL_COUNT],
    total: u64,
}

impl LevelCounts {
    fn record(&mut self, severity: Severity) {
        self.total += 1;
        if let Some(index) = severity.index() {
            self.per_level[index] += 1;
        }
    }

    /// Count for one level; always zero for `NotSet`
    pub fn get(&self, severity: Severity) -> u64 {
        severity.index().map_or(0, |i| self.per_level[i])
    }

    /// All records, including those without a level
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// A node of an application's namespace tree
#[derive(Clone, Debug)]
pub struct NamespaceNode {
    name: String,
    /// Path from the application root, empty for the root itself
    path: String,
    selected: bool,
    children: BTreeMap<String, NamespaceNode>,
    counts: LevelCounts,
}

impl NamespaceNode {
    fn root(application: &str) -> Self {
        Self {
            name: application.to_string(),
            path: String::new(),
            selected: true,
            children: BTreeMap::new(),
            counts: LevelCounts::default(),
        }
    }

    fn child_of(parent_path: &str, selected: bool, name: &str) -> Self {
        let path = if parent_path.is_empty() {
            name.to_string()
        } else {
            format!("{parent_path}{NAMESPACE_SPLITTER}{name}")
        };
        Self {
            name: name.to_string(),
            path,
            selected,
            children: BTreeMap::new(),
            counts: LevelCounts::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn counts(&self) -> &LevelCounts {
        &self.counts
    }

    pub fn children(&self) -> impl Iterator<Item = &NamespaceNode> {
        self.children.values()
    }

    /// Walk `segments` down from this node
    pub fn find(&self, segments: &[&str]) -> Option<&NamespaceNode> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.children.get(*segment))
    }

    fn find_mut(&mut self, segments: &[&str]) -> Option<&mut NamespaceNode> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.children.get_mut(*segment))
    }

    fn select_all(&mut self, selected: bool) {
        self.selected = selected;
        for child in self.children.values_mut() {
            child.select_all(selected);
        }
    }

    fn reset_counts(&mut self) {
        self.counts = LevelCounts::default();
        for child in self.children.values_mut() {
            child.reset_counts();
        }
    }
}

/// One namespace tree per application, rooted at the application name
#[derive(Debug, Default)]
pub struct NamespaceForest {
    roots: BTreeMap<String, NamespaceNode>,
}

impl NamespaceForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create every missing node on the record's namespace path and count the
    /// record on the leaf. New nodes take their parent's selection.
    pub fn register(&mut self, record: &Record) -> &NamespaceNode {
        let mut node = self
            .roots
            .entry(record.application.clone())
            .or_insert_with(|| NamespaceNode::root(&record.application));

        for segment in segments(&record.namespace) {
            let NamespaceNode {
                path,
                selected,
                children,
                ..
            } = node;
            node = children
                .entry(segment.to_string())
                .or_insert_with(|| NamespaceNode::child_of(path, *selected, segment));
        }

        node.counts.record(record.severity);
        node
    }

    /// Whether records in `namespace` of `application` may be shown.
    /// Paths that were never registered are not active.
    pub fn is_active(&self, application: &str, namespace: &str) -> bool {
        self.node(application, namespace)
            .is_some_and(NamespaceNode::is_selected)
    }

    pub fn root(&self, application: &str) -> Option<&NamespaceNode> {
        self.roots.get(application)
    }

    pub fn roots(&self) -> impl Iterator<Item = &NamespaceNode> {
        self.roots.values()
    }

    pub fn node(&self, application: &str, namespace: &str) -> Option<&NamespaceNode> {
        self.roots.get(application)?.find(&segments(namespace))
    }

    /// Path of the leaf node a record was counted on
    pub fn namespace_of(&self, record: &Record) -> Option<&str> {
        self.node(&record.application, &record.namespace)
            .map(NamespaceNode::path)
    }

    /// Select or unselect a node and all of its descendants. An empty `path`
    /// addresses the application root.
    pub fn set_selected(
        &mut self,
        application: &str,
        path: &str,
        selected: bool,
    ) -> Result<(), ViewError> {
        let root = self
            .roots
            .get_mut(application)
            .ok_or_else(|| ViewError::UnknownApplication(application.to_string()))?;
        let node = root
            .find_mut(&segments(path))
            .ok_or_else(|| ViewError::UnknownNamespace {
                application: application.to_string(),
                namespace: path.to_string(),
            })?;
        node.select_all(selected);
        Ok(())
    }

    /// Select or unselect every tree
    pub fn set_all_selected(&mut self, selected: bool) {
        for root in self.roots.values_mut() {
            root.select_all(selected);
        }
    }

    pub fn reset_counts(&mut self) {
        for root in self.roots.values_mut() {
            root.reset_counts();
        }
    }

    pub fn clear(&mut self) {
        self.roots.clear();
    }
}
