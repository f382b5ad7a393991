//! Reconstruct a nested forest from a flat set of work item records.
//!
//! Input is whatever a store or import hands over, so the builder never
//! fails. Records are excluded, and logged, when they:
//!
//! - miss a required field (`id`, `type`, `title`),
//! - repeat an id already seen (first occurrence wins),
//! - name a parent that is not in the set (orphans are *not* promoted to
//!   roots),
//! - sit deeper than [`MAX_TREE_DEPTH`], or are otherwise unreachable from a
//!   root (parent cycles in corrupt data).
//!
//! Each item is attached at most once, under its resolved parent, so the
//! result is acyclic by construction. Every level is sorted by `order`
//! ascending; equal keys keep their input order.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ProgressConfig;
use crate::model::{Kind, RecordDefect, WorkItem, WorkItemRecord};

/// Maximum nesting depth attached by the builder.
pub const MAX_TREE_DEPTH: usize = 256;

/// A work item with its ordered children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub item: WorkItem,
    pub children: Vec<TreeNode>,
}

/// Why a record is missing from the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Malformed(RecordDefect),
    DuplicateId,
    Orphan { parent_id: String },
    TooDeep,
    Unreachable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(defect) => write!(f, "malformed record: {defect}"),
            Self::DuplicateId => f.write_str("duplicate id"),
            Self::Orphan { parent_id } => write!(f, "parent '{parent_id}' not found"),
            Self::TooDeep => write!(f, "nested deeper than {MAX_TREE_DEPTH} levels"),
            Self::Unreachable => f.write_str("not reachable from any root"),
        }
    }
}

/// One excluded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub id: Option<String>,
    pub reason: SkipReason,
}

/// Forest plus everything that was left out of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeBuild {
    pub roots: Vec<TreeNode>,
    pub skipped: Vec<SkippedRecord>,
}

/// Build the forest, discarding the skip report.
pub fn build_tree<I, R>(records: I) -> Vec<TreeNode>
where
    I: IntoIterator<Item = R>,
    R: Into<WorkItemRecord>,
{
    build_tree_with_report(records).roots
}

/// Build the forest and report every excluded record.
pub fn build_tree_with_report<I, R>(records: I) -> TreeBuild
where
    I: IntoIterator<Item = R>,
    R: Into<WorkItemRecord>,
{
    let mut skipped = Vec::new();

    // 1. Validate, 2. dedupe by id.
    let mut seen: HashSet<String> = HashSet::new();
    let mut items: Vec<WorkItem> = Vec::new();
    for record in records {
        let record: WorkItemRecord = record.into();
        match record.validate() {
            Ok(item) => {
                if seen.insert(item.id.clone()) {
                    items.push(item);
                } else {
                    debug!(id = %item.id, "skipping duplicate work item record");
                    skipped.push(SkippedRecord {
                        id: Some(item.id),
                        reason: SkipReason::DuplicateId,
                    });
                }
            }
            Err(defect) => {
                warn!(id = ?record.id, %defect, "skipping malformed work item record");
                skipped.push(SkippedRecord {
                    id: record.id,
                    reason: SkipReason::Malformed(defect),
                });
            }
        }
    }

    // 3. Group by parent, dropping orphans.
    let mut roots: Vec<WorkItem> = Vec::new();
    let mut groups: HashMap<String, Vec<WorkItem>> = HashMap::new();
    for item in items {
        match item.parent_id.clone() {
            None => roots.push(item),
            Some(parent_id) if seen.contains(&parent_id) => {
                groups.entry(parent_id).or_default().push(item);
            }
            Some(parent_id) => {
                warn!(id = %item.id, parent_id = %parent_id, "excluding orphaned work item");
                skipped.push(SkippedRecord {
                    id: Some(item.id),
                    reason: SkipReason::Orphan { parent_id },
                });
            }
        }
    }

    // 4. Attach recursively from the sorted roots.
    sort_by_order(&mut roots);
    let forest: Vec<TreeNode> = roots
        .into_iter()
        .map(|root| attach(root, &mut groups, 1, &mut skipped))
        .collect();

    // Anything still grouped was never reached.
    let mut leftovers: Vec<WorkItem> = groups.into_values().flatten().collect();
    leftovers.sort_by(|a, b| a.id.cmp(&b.id));
    for item in leftovers {
        warn!(id = %item.id, "excluding work item unreachable from any root");
        skipped.push(SkippedRecord {
            id: Some(item.id),
            reason: SkipReason::Unreachable,
        });
    }

    TreeBuild {
        roots: forest,
        skipped,
    }
}

/// Same order as the allocator sees: key, then id.
fn sort_by_order(items: &mut [WorkItem]) {
    items.sort_by(|a, b| {
        a.order
            .total_cmp(&b.order)
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn attach(
    item: WorkItem,
    groups: &mut HashMap<String, Vec<WorkItem>>,
    depth: usize,
    skipped: &mut Vec<SkippedRecord>,
) -> TreeNode {
    let mut children = groups.remove(&item.id).unwrap_or_default();

    if depth >= MAX_TREE_DEPTH && !children.is_empty() {
        for child in children {
            warn!(id = %child.id, depth, "excluding work item nested too deep");
            skipped.push(SkippedRecord {
                id: Some(child.id),
                reason: SkipReason::TooDeep,
            });
        }
        return TreeNode {
            item,
            children: Vec::new(),
        };
    }

    sort_by_order(&mut children);
    let children = children
        .into_iter()
        .map(|child| attach(child, groups, depth + 1, skipped))
        .collect();

    TreeNode { item, children }
}

/// One row of a flattened tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatEntry {
    pub id: String,
    pub parent_id: Option<String>,
    pub kind: Kind,
    /// `0` for roots.
    pub depth: usize,
}

/// Pre-order walk of the forest.
#[must_use]
pub fn flatten(roots: &[TreeNode]) -> Vec<FlatEntry> {
    fn walk(node: &TreeNode, depth: usize, out: &mut Vec<FlatEntry>) {
        out.push(FlatEntry {
            id: node.item.id.clone(),
            parent_id: node.item.parent_id.clone(),
            kind: node.item.kind,
            depth,
        });
        for child in &node.children {
            walk(child, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    for root in roots {
        walk(root, 0, &mut out);
    }
    out
}

/// Ids from a root down to `id` (inclusive), if `id` is in the forest.
#[must_use]
pub fn find_path(roots: &[TreeNode], id: &str) -> Option<Vec<String>> {
    fn search(node: &TreeNode, id: &str, path: &mut Vec<String>) -> bool {
        path.push(node.item.id.clone());
        if node.item.id == id || node.children.iter().any(|child| search(child, id, path)) {
            return true;
        }
        path.pop();
        false
    }

    let mut path = Vec::new();
    roots
        .iter()
        .any(|root| search(root, id, &mut path))
        .then_some(path)
}

/// Completion of the leaves under a node.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub done: u32,
    pub total: u32,
}

impl Progress {
    /// Percentage of work completed, in the range `0.0..=100.0`.
    ///
    /// Returns `100.0` if total is 0 (vacuously complete).
    #[must_use]
    pub fn percent_complete(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.done as f32 / self.total as f32;
        ratio * 100.0
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.done == self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.0}%)",
            self.done,
            self.total,
            self.percent_complete()
        )
    }
}

impl TreeNode {
    /// Number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Self::size).sum::<usize>()
    }

    /// Find a node by id in this subtree.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Self> {
        if self.item.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Roll up completion over leaf descendants.
    ///
    /// Intermediate nodes are not counted, only the leaves beneath them, so
    /// a node without children reports `0/0`.
    #[must_use]
    pub fn progress(&self, config: &ProgressConfig) -> Progress {
        let mut progress = Progress::default();
        for child in &self.children {
            if child.children.is_empty() {
                progress.total += 1;
                if config.is_done(&child.item.status) {
                    progress.done += 1;
                }
            } else {
                let nested = child.progress(config);
                progress.total += nested.total;
                progress.done += nested.done;
            }
        }
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrderingConfig;
    use crate::coordinator::plan_reorder_in;

    fn item(id: &str, kind: Kind, parent: Option<&str>, order: f64) -> WorkItem {
        WorkItem {
            id: id.to_string(),
            workspace_id: "ws".to_string(),
            parent_id: parent.map(str::to_string),
            kind,
            title: format!("Title for {id}"),
            description: None,
            status: "todo".to_string(),
            order,
            created_at_us: 0,
            updated_at_us: 0,
        }
    }

    fn ids(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.item.id.as_str()).collect()
    }

    #[test]
    fn empty_input_builds_empty_forest() {
        let build = build_tree_with_report(Vec::<WorkItem>::new());
        assert!(build.roots.is_empty());
        assert!(build.skipped.is_empty());
    }

    #[test]
    fn epic_feature_story_with_orphan() {
        let roots = build_tree(vec![
            item("epic1", Kind::Epic, None, 1000.0),
            item("feature1", Kind::Feature, Some("epic1"), 1000.0),
            item("story1", Kind::Story, Some("feature1"), 1000.0),
            item("orphan1", Kind::Story, Some("missingId"), 1000.0),
        ]);

        assert_eq!(ids(&roots), vec!["epic1"]);
        assert_eq!(ids(&roots[0].children), vec!["feature1"]);
        assert_eq!(ids(&roots[0].children[0].children), vec!["story1"]);
        assert!(roots.iter().all(|r| r.find("orphan1").is_none()));
    }

    #[test]
    fn every_level_is_sorted_by_order() {
        let roots = build_tree(vec![
            item("e2", Kind::Epic, None, 2000.0),
            item("e1", Kind::Epic, None, -5.0),
            item("f-late", Kind::Feature, Some("e1"), 3000.0),
            item("f-early", Kind::Feature, Some("e1"), 1500.0),
            item("f-mid", Kind::Feature, Some("e1"), 2000.0),
        ]);
        assert_eq!(ids(&roots), vec!["e1", "e2"]);
        assert_eq!(ids(&roots[0].children), vec!["f-early", "f-mid", "f-late"]);
    }

    #[test]
    fn equal_orders_break_ties_by_id() {
        let roots = build_tree(vec![
            item("b", Kind::Epic, None, 1000.0),
            item("a", Kind::Epic, None, 1000.0),
        ]);
        assert_eq!(ids(&roots), vec!["a", "b"]);
    }

    #[test]
    fn move_onto_tied_siblings_keeps_displayed_neighbours() {
        let mut items = vec![
            item("e-z", Kind::Epic, None, 1000.0),
            item("e-a", Kind::Epic, None, 1000.0),
            item("e-m", Kind::Epic, None, 5000.0),
        ];
        assert_eq!(ids(&build_tree(items.clone())), vec!["e-a", "e-z", "e-m"]);

        let plan = plan_reorder_in(&items, "e-m", None, 1, &OrderingConfig::default())
            .expect("plan");
        assert!(!plan.renormalized.is_empty());
        for update in &plan.renormalized {
            let sibling = items.iter_mut().find(|i| i.id == update.id).expect("sibling");
            sibling.order = update.order;
        }
        let moved = items.iter_mut().find(|i| i.id == "e-m").expect("moved");
        moved.order = plan.placement.order;

        assert_eq!(ids(&build_tree(items)), vec!["e-a", "e-m", "e-z"]);
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let mut second = item("f1", Kind::Feature, Some("e1"), 500.0);
        second.title = "Second copy".to_string();
        let build = build_tree_with_report(vec![
            item("e1", Kind::Epic, None, 1000.0),
            item("f1", Kind::Feature, Some("e1"), 1000.0),
            second,
        ]);

        assert_eq!(build.roots[0].children.len(), 1);
        assert_eq!(build.roots[0].children[0].item.title, "Title for f1");
        assert_eq!(
            build.skipped,
            vec![SkippedRecord {
                id: Some("f1".to_string()),
                reason: SkipReason::DuplicateId
            }]
        );
    }

    #[test]
    fn malformed_records_are_skipped_not_fatal() {
        let records = vec![
            WorkItemRecord::from(item("e1", Kind::Epic, None, 1000.0)),
            WorkItemRecord {
                id: Some("no-title".to_string()),
                kind: Some("story".to_string()),
                parent_id: Some("e1".to_string()),
                ..WorkItemRecord::default()
            },
            WorkItemRecord {
                title: Some("no id".to_string()),
                kind: Some("epic".to_string()),
                ..WorkItemRecord::default()
            },
        ];
        let build = build_tree_with_report(records);

        assert_eq!(ids(&build.roots), vec!["e1"]);
        assert!(build.roots[0].children.is_empty());
        assert_eq!(build.skipped.len(), 2);
        assert_eq!(
            build.skipped[0].reason,
            SkipReason::Malformed(RecordDefect::MissingTitle)
        );
        assert_eq!(build.skipped[1].id, None);
    }

    #[test]
    fn descendants_of_orphans_are_excluded_too() {
        let build = build_tree_with_report(vec![
            item("s1", Kind::Story, Some("gone"), 1000.0),
            item("t1", Kind::Task, Some("s1"), 1000.0),
        ]);
        assert!(build.roots.is_empty());
        let reasons: Vec<&SkipReason> = build.skipped.iter().map(|s| &s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                &SkipReason::Orphan {
                    parent_id: "gone".to_string()
                },
                &SkipReason::Unreachable
            ]
        );
    }

    #[test]
    fn parent_cycles_are_excluded() {
        let build = build_tree_with_report(vec![
            item("a", Kind::Story, Some("b"), 1000.0),
            item("b", Kind::Story, Some("a"), 1000.0),
            item("self", Kind::Story, Some("self"), 1000.0),
            item("root", Kind::Epic, None, 1000.0),
        ]);
        assert_eq!(ids(&build.roots), vec!["root"]);
        assert_eq!(build.skipped.len(), 3);
        assert!(build.skipped.iter().all(|s| s.reason == SkipReason::Unreachable));
    }

    #[test]
    fn chains_deeper_than_the_cap_are_cut() {
        let mut records = vec![item("n0", Kind::Epic, None, 0.0)];
        for i in 1..=MAX_TREE_DEPTH + 5 {
            let parent = format!("n{}", i - 1);
            records.push(item(&format!("n{i}"), Kind::Story, Some(&parent), 0.0));
        }
        let build = build_tree_with_report(records);

        let depth = flatten(&build.roots).iter().map(|e| e.depth).max();
        assert_eq!(depth, Some(MAX_TREE_DEPTH - 1));
        assert_eq!(build.skipped[0].reason, SkipReason::TooDeep);
        assert_eq!(build.skipped.len(), 6);
    }

    #[test]
    fn flatten_is_pre_order_with_depth() {
        let roots = build_tree(vec![
            item("e", Kind::Epic, None, 1.0),
            item("f", Kind::Feature, Some("e"), 1.0),
            item("s", Kind::Story, Some("f"), 1.0),
            item("s2", Kind::Story, Some("e"), 2.0),
        ]);
        let flat: Vec<(String, usize)> = flatten(&roots).into_iter().map(|e| (e.id, e.depth)).collect();
        assert_eq!(
            flat,
            vec![
                ("e".to_string(), 0),
                ("f".to_string(), 1),
                ("s".to_string(), 2),
                ("s2".to_string(), 1),
            ]
        );
    }

    #[test]
    fn find_path_returns_root_to_node() {
        let roots = build_tree(vec![
            item("e", Kind::Epic, None, 1.0),
            item("f", Kind::Feature, Some("e"), 1.0),
            item("s", Kind::Story, Some("f"), 1.0),
            item("e2", Kind::Epic, None, 2.0),
        ]);
        assert_eq!(
            find_path(&roots, "s"),
            Some(vec!["e".to_string(), "f".to_string(), "s".to_string()])
        );
        assert_eq!(find_path(&roots, "e2"), Some(vec!["e2".to_string()]));
        assert_eq!(find_path(&roots, "nope"), None);
    }

    #[test]
    fn progress_rolls_up_leaves() {
        // Epic
        //   ├── Feature
        //   │   ├── Story A (done, leaf)
        //   │   └── Story B
        //   │       ├── Task 1 (done)
        //   │       └── Task 2 (todo)
        //   └── Story C (todo, leaf)
        let mut story_a = item("sa", Kind::Story, Some("f"), 1.0);
        story_a.status = "Done".to_string();
        let mut task1 = item("t1", Kind::Task, Some("sb"), 1.0);
        task1.status = "done".to_string();
        let roots = build_tree(vec![
            item("e", Kind::Epic, None, 1.0),
            item("f", Kind::Feature, Some("e"), 1.0),
            story_a,
            item("sb", Kind::Story, Some("f"), 2.0),
            task1,
            item("t2", Kind::Task, Some("sb"), 2.0),
            item("sc", Kind::Story, Some("e"), 2.0),
        ]);

        let config = ProgressConfig::default();
        let progress = roots[0].progress(&config);
        assert_eq!(progress, Progress { done: 2, total: 4 });
        assert_eq!(progress.to_string(), "2/4 (50%)");

        let leaf = roots[0].find("sc").expect("story C in tree");
        assert_eq!(leaf.progress(&config), Progress::default());
        assert!(leaf.progress(&config).is_complete());
        assert_eq!(roots[0].size(), 7);
    }
}
