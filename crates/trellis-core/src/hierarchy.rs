//! Nesting rules between work item kinds.
//!
//! The table in [`allowed_parents`] is the single source of truth:
//!
//! | child   | allowed parent       |
//! |---------|----------------------|
//! | epic    | none (top level)     |
//! | feature | epic                 |
//! | story   | epic, feature        |
//! | task    | story                |
//!
//! Every allowed parent has a strictly lower [`Kind::rank`] than its child,
//! so a valid parent chain can never revisit an item.
//!
//! [`ancestors`] walks stored parent links for breadcrumbs and tolerates
//! corrupt data (dangling parents, cycles) by truncating the chain.

use std::collections::HashSet;

use tracing::warn;

use crate::error::EngineError;
use crate::model::{Kind, WorkItem};
use crate::store::ItemStore;

/// Safety cap for parent-chain walks over stored data.
pub const MAX_CONTAINMENT_DEPTH: usize = 256;

/// Parent kinds a `child` may attach to. `None` stands for the top level.
#[must_use]
pub const fn allowed_parents(child: Kind) -> &'static [Option<Kind>] {
    match child {
        Kind::Epic => &[None],
        Kind::Feature => &[Some(Kind::Epic)],
        Kind::Story => &[Some(Kind::Epic), Some(Kind::Feature)],
        Kind::Task => &[Some(Kind::Story)],
    }
}

/// Returns `true` if an item of kind `child` may be placed under `parent`.
#[must_use]
pub fn is_valid_parent(parent: Option<Kind>, child: Kind) -> bool {
    allowed_parents(child).contains(&parent)
}

/// Like [`is_valid_parent`] but yields the error callers propagate.
///
/// # Errors
///
/// Returns [`EngineError::HierarchyViolation`] naming the offending pair.
pub fn check_parent(parent: Option<Kind>, child: Kind) -> Result<(), EngineError> {
    if is_valid_parent(parent, child) {
        Ok(())
    } else {
        Err(EngineError::HierarchyViolation { parent, child })
    }
}

/// Kinds that may be created directly under `parent`.
#[must_use]
pub fn allowed_children(parent: Option<Kind>) -> Vec<Kind> {
    Kind::ALL
        .into_iter()
        .filter(|child| is_valid_parent(parent, *child))
        .collect()
}

/// Get the ancestor chain of an item, from immediate parent up to root.
///
/// Returns an empty vec for top-level items. A parent id that no longer
/// resolves, a repeated id, or a chain longer than
/// [`MAX_CONTAINMENT_DEPTH`] ends the walk early with a warning.
///
/// # Errors
///
/// Returns [`EngineError::NotFound`] if `item_id` itself does not exist,
/// or [`EngineError::Db`] for storage failures.
pub fn ancestors<S: ItemStore>(store: &S, item_id: &str) -> Result<Vec<WorkItem>, EngineError> {
    let start = store
        .get(item_id)?
        .ok_or_else(|| EngineError::NotFound(item_id.to_string()))?;

    let mut chain: Vec<WorkItem> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start.id.clone());

    let mut current_parent_id = start.parent_id;

    while let Some(parent_id) = current_parent_id {
        if !visited.insert(parent_id.clone()) {
            warn!(item_id, parent_id = %parent_id, "parent chain revisits an item; truncating");
            break;
        }
        if chain.len() >= MAX_CONTAINMENT_DEPTH {
            warn!(item_id, depth = chain.len(), "parent chain exceeds depth cap; truncating");
            break;
        }
        let Some(parent) = store.get(&parent_id)? else {
            warn!(item_id, parent_id = %parent_id, "parent chain ends at a missing item");
            break;
        };
        current_parent_id = parent.parent_id.clone();
        chain.push(parent);
    }

    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemPatch;
    use crate::store::memory::MemoryStore;

    fn item(id: &str, kind: Kind, parent: Option<&str>) -> WorkItem {
        WorkItem {
            id: id.to_string(),
            workspace_id: "ws".to_string(),
            parent_id: parent.map(str::to_string),
            kind,
            title: format!("Title for {id}"),
            description: None,
            status: "todo".to_string(),
            order: 1000.0,
            created_at_us: 1,
            updated_at_us: 1,
        }
    }

    // -----------------------------------------------------------------------
    // Table
    // -----------------------------------------------------------------------

    #[test]
    fn table_matches_every_pair() {
        let expected = [
            (None, Kind::Epic, true),
            (None, Kind::Feature, false),
            (None, Kind::Story, false),
            (None, Kind::Task, false),
            (Some(Kind::Epic), Kind::Epic, false),
            (Some(Kind::Epic), Kind::Feature, true),
            (Some(Kind::Epic), Kind::Story, true),
            (Some(Kind::Epic), Kind::Task, false),
            (Some(Kind::Feature), Kind::Epic, false),
            (Some(Kind::Feature), Kind::Feature, false),
            (Some(Kind::Feature), Kind::Story, true),
            (Some(Kind::Feature), Kind::Task, false),
            (Some(Kind::Story), Kind::Epic, false),
            (Some(Kind::Story), Kind::Feature, false),
            (Some(Kind::Story), Kind::Story, false),
            (Some(Kind::Story), Kind::Task, true),
            (Some(Kind::Task), Kind::Epic, false),
            (Some(Kind::Task), Kind::Feature, false),
            (Some(Kind::Task), Kind::Story, false),
            (Some(Kind::Task), Kind::Task, false),
        ];
        for (parent, child, valid) in expected {
            assert_eq!(
                is_valid_parent(parent, child),
                valid,
                "parent={parent:?} child={child:?}"
            );
        }
    }

    #[test]
    fn parents_always_rank_above_children() {
        for child in Kind::ALL {
            for parent in allowed_parents(child).iter().flatten() {
                assert!(parent.rank() < child.rank(), "{parent} -> {child}");
            }
        }
    }

    #[test]
    fn no_kind_can_reach_itself_through_parents() {
        // Walk every allowed-parent path upward; a kind must never reappear.
        fn walk(kind: Kind, seen: &mut Vec<Kind>) {
            assert!(!seen.contains(&kind), "cycle through {kind}: {seen:?}");
            seen.push(kind);
            for parent in allowed_parents(kind).iter().flatten() {
                walk(*parent, seen);
            }
            seen.pop();
        }
        for kind in Kind::ALL {
            walk(kind, &mut Vec::new());
        }
    }

    #[test]
    fn check_parent_reports_offending_pair() {
        let err = check_parent(Some(Kind::Feature), Kind::Task).unwrap_err();
        assert!(matches!(
            err,
            EngineError::HierarchyViolation {
                parent: Some(Kind::Feature),
                child: Kind::Task
            }
        ));
        assert!(check_parent(Some(Kind::Story), Kind::Task).is_ok());
    }

    #[test]
    fn allowed_children_per_parent() {
        assert_eq!(allowed_children(None), vec![Kind::Epic]);
        assert_eq!(allowed_children(Some(Kind::Epic)), vec![Kind::Feature, Kind::Story]);
        assert_eq!(allowed_children(Some(Kind::Feature)), vec![Kind::Story]);
        assert_eq!(allowed_children(Some(Kind::Story)), vec![Kind::Task]);
        assert!(allowed_children(Some(Kind::Task)).is_empty());
    }

    // -----------------------------------------------------------------------
    // ancestors
    // -----------------------------------------------------------------------

    #[test]
    fn ancestors_no_parent() {
        let mut store = MemoryStore::new();
        store.insert(&item("wi-epic", Kind::Epic, None)).expect("insert");

        assert!(ancestors(&store, "wi-epic").expect("ancestors").is_empty());
    }

    #[test]
    fn ancestors_three_levels_nearest_first() {
        let mut store = MemoryStore::new();
        store.insert(&item("wi-e", Kind::Epic, None)).expect("insert");
        store.insert(&item("wi-f", Kind::Feature, Some("wi-e"))).expect("insert");
        store.insert(&item("wi-s", Kind::Story, Some("wi-f"))).expect("insert");
        store.insert(&item("wi-t", Kind::Task, Some("wi-s"))).expect("insert");

        let chain: Vec<String> = ancestors(&store, "wi-t")
            .expect("ancestors")
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(chain, vec!["wi-s", "wi-f", "wi-e"]);
    }

    #[test]
    fn ancestors_not_found() {
        let store = MemoryStore::new();
        let err = ancestors(&store, "wi-missing").unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn ancestors_stop_at_dangling_parent() {
        let mut store = MemoryStore::new();
        store.insert(&item("wi-s", Kind::Story, Some("wi-gone"))).expect("insert");
        store.insert(&item("wi-t", Kind::Task, Some("wi-s"))).expect("insert");

        let chain = ancestors(&store, "wi-t").expect("ancestors");
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].id, "wi-s");
    }

    #[test]
    fn ancestors_truncate_corrupt_cycle() {
        let mut store = MemoryStore::new();
        store.insert(&item("wi-a", Kind::Story, None)).expect("insert");
        store.insert(&item("wi-b", Kind::Story, Some("wi-a"))).expect("insert");
        store
            .patch("wi-a", &ItemPatch::placement(Some("wi-b".to_string()), 1.0))
            .expect("patch into a cycle");

        let chain = ancestors(&store, "wi-a").expect("ancestors");
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].id, "wi-b");
    }
}
