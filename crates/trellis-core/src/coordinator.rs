//! Mutation entry points: create, content update, reorder, delete.
//!
//! Every mutation runs inside [`ItemStore::atomic`] and re-reads the sibling
//! group it touches, so keys are always computed from current data. A
//! renormalization batch and the write that needed it commit together.
//!
//! [`plan_reorder`] and [`plan_reorder_in`] are the pure halves of a move:
//! they validate and compute the placement without touching storage.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::{OrderingConfig, ProjectConfig};
use crate::error::EngineError;
use crate::hierarchy;
use crate::model::item::DEFAULT_STATUS;
use crate::model::item_id::derive_id;
use crate::model::{ContentPatch, ItemPatch, NewWorkItem, WorkItem};
use crate::order::{self, OrderUpdate, SiblingKey};
use crate::store::ItemStore;
use crate::tree::{TreeBuild, build_tree_with_report};

/// Id derivation attempts before giving up on collisions.
const MAX_ID_ATTEMPTS: u64 = 16;

/// Where a moved item ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub parent_id: Option<String>,
    pub order: f64,
}

/// Writes needed to carry out a move.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReorderPlan {
    pub placement: Placement,
    /// Sibling rewrites to persist together with the placement.
    pub renormalized: Vec<OrderUpdate>,
}

/// Validate a move and compute its placement.
///
/// `siblings` may be any superset of the destination group: entries from
/// another workspace or parent, and the moved item itself, are ignored.
///
/// # Errors
///
/// - [`EngineError::CrossWorkspace`] if `new_parent` lives in another workspace.
/// - [`EngineError::HierarchyViolation`] if the moved kind may not sit under
///   `new_parent`.
pub fn plan_reorder(
    moved: &WorkItem,
    new_parent: Option<&WorkItem>,
    siblings: &[WorkItem],
    target_index: usize,
    config: &OrderingConfig,
) -> Result<ReorderPlan, EngineError> {
    if let Some(parent) = new_parent {
        ensure_same_workspace(parent, &moved.workspace_id)?;
    }
    hierarchy::check_parent(new_parent.map(|p| p.kind), moved.kind)?;

    let parent_id = new_parent.map(|p| p.id.clone());
    let group: Vec<SiblingKey> = siblings
        .iter()
        .filter(|s| {
            s.id != moved.id
                && s.workspace_id == moved.workspace_id
                && s.parent_id == parent_id
        })
        .map(SiblingKey::from)
        .collect();

    let allocation = order::allocate(&group, target_index, config);
    Ok(ReorderPlan {
        placement: Placement {
            parent_id,
            order: allocation.order,
        },
        renormalized: allocation.renormalized,
    })
}

/// [`plan_reorder`] over a whole workspace snapshot, resolving both ids.
///
/// # Errors
///
/// Returns [`EngineError::NotFound`] if either id is absent from `items`,
/// plus everything [`plan_reorder`] returns.
pub fn plan_reorder_in(
    items: &[WorkItem],
    moved_id: &str,
    new_parent_id: Option<&str>,
    target_index: usize,
    config: &OrderingConfig,
) -> Result<ReorderPlan, EngineError> {
    let find = |id: &str| {
        items
            .iter()
            .find(|item| item.id == id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    };

    let moved = find(moved_id)?;
    let new_parent = new_parent_id.map(find).transpose()?;
    plan_reorder(moved, new_parent, items, target_index, config)
}

fn ensure_same_workspace(parent: &WorkItem, workspace_id: &str) -> Result<(), EngineError> {
    if parent.workspace_id == workspace_id {
        Ok(())
    } else {
        Err(EngineError::CrossWorkspace {
            item_id: parent.id.clone(),
            workspace_id: parent.workspace_id.clone(),
            target_workspace_id: workspace_id.to_string(),
        })
    }
}

fn require<S: ItemStore>(store: &S, id: &str) -> Result<WorkItem, EngineError> {
    store
        .get(id)?
        .ok_or_else(|| EngineError::NotFound(id.to_string()))
}

fn apply_renormalization<S: ItemStore>(
    tx: &mut S,
    workspace_id: &str,
    parent_id: Option<&str>,
    updates: &[OrderUpdate],
) -> Result<(), EngineError> {
    if updates.is_empty() {
        return Ok(());
    }
    info!(
        workspace_id,
        parent_id = parent_id.unwrap_or("<root>"),
        rewrites = updates.len(),
        "renormalizing sibling group"
    );
    for update in updates {
        tx.patch(&update.id, &ItemPatch::order(update.order))?;
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<String, EngineError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput("title must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

fn now_us() -> i64 {
    Utc::now().timestamp_micros()
}

/// Hierarchy and ordering engine over an [`ItemStore`].
#[derive(Debug)]
pub struct Engine<S> {
    store: S,
    config: ProjectConfig,
}

impl<S: ItemStore> Engine<S> {
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `config` fails validation.
    pub fn new(store: S, config: ProjectConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Engine with default spacing and workspace settings.
    pub fn with_defaults(store: S) -> Self {
        Self {
            store,
            config: ProjectConfig::default(),
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub const fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if `id` does not exist.
    pub fn get(&self, id: &str) -> Result<WorkItem, EngineError> {
        require(&self.store, id)
    }

    /// Create an item at `new.position` among its siblings, or at the end.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidInput`] for a blank title or workspace.
    /// - [`EngineError::NotFound`] if the parent does not exist.
    /// - [`EngineError::CrossWorkspace`] if the parent is in another workspace.
    /// - [`EngineError::HierarchyViolation`] if the kind may not sit there.
    #[instrument(skip(self, new), fields(kind = %new.kind, parent_id = ?new.parent_id))]
    pub fn create(&mut self, new: NewWorkItem) -> Result<WorkItem, EngineError> {
        let title = validate_title(&new.title)?;
        if new.workspace_id.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "workspace id must not be empty".to_string(),
            ));
        }
        let ordering = self.config.ordering;

        self.store.atomic(|tx| {
            let parent = new
                .parent_id
                .as_deref()
                .map(|id| require(tx, id))
                .transpose()?;
            if let Some(parent) = &parent {
                ensure_same_workspace(parent, &new.workspace_id)?;
            }
            hierarchy::check_parent(parent.as_ref().map(|p| p.kind), new.kind)?;

            let siblings = tx.siblings(&new.workspace_id, new.parent_id.as_deref())?;
            let keys: Vec<SiblingKey> = siblings.iter().map(SiblingKey::from).collect();
            let allocation =
                order::allocate(&keys, new.position.unwrap_or(keys.len()), &ordering);
            apply_renormalization(
                tx,
                &new.workspace_id,
                new.parent_id.as_deref(),
                &allocation.renormalized,
            )?;

            let now = now_us();
            let id = fresh_id(tx, &new.workspace_id, &title, now)?;
            let item = WorkItem {
                id,
                workspace_id: new.workspace_id.clone(),
                parent_id: new.parent_id.clone(),
                kind: new.kind,
                title,
                description: new.description.clone(),
                status: new
                    .status
                    .clone()
                    .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
                order: allocation.order,
                created_at_us: now,
                updated_at_us: now,
            };
            tx.insert(&item)?;
            debug!(id = %item.id, order = item.order, "created work item");
            Ok(item)
        })
    }

    /// Edit title, description or status. Placement is never touched.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown id and
    /// [`EngineError::InvalidInput`] for a blank title.
    #[instrument(skip(self, patch))]
    pub fn update(&mut self, id: &str, mut patch: ContentPatch) -> Result<WorkItem, EngineError> {
        if let Some(title) = &patch.title {
            patch.title = Some(validate_title(title)?);
        }

        self.store.atomic(|tx| {
            let current = require(tx, id)?;
            if patch.is_empty() {
                return Ok(current);
            }
            tx.patch(id, &ItemPatch::content(patch).touched_at(now_us()))?;
            require(tx, id)
        })
    }

    /// Move `moved_id` under `new_parent_id` (`None` for the top level) at
    /// `target_index` among its new siblings.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if either item is missing, plus
    /// everything [`plan_reorder`] returns. Nothing is written on error.
    #[instrument(skip(self))]
    pub fn reorder(
        &mut self,
        moved_id: &str,
        new_parent_id: Option<&str>,
        target_index: usize,
    ) -> Result<Placement, EngineError> {
        let ordering = self.config.ordering;

        self.store.atomic(|tx| {
            let moved = require(tx, moved_id)?;
            let new_parent = new_parent_id.map(|id| require(tx, id)).transpose()?;
            let siblings = tx.siblings(&moved.workspace_id, new_parent_id)?;

            let plan = plan_reorder(
                &moved,
                new_parent.as_ref(),
                &siblings,
                target_index,
                &ordering,
            )?;
            apply_renormalization(tx, &moved.workspace_id, new_parent_id, &plan.renormalized)?;
            tx.patch(
                moved_id,
                &ItemPatch::placement(plan.placement.parent_id.clone(), plan.placement.order)
                    .touched_at(now_us()),
            )?;
            debug!(order = plan.placement.order, "moved work item");
            Ok(plan.placement)
        })
    }

    /// Delete a childless item.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] for an unknown id and
    /// [`EngineError::HasChildren`] if anything still points at it.
    #[instrument(skip(self))]
    pub fn delete(&mut self, id: &str) -> Result<(), EngineError> {
        self.store.atomic(|tx| {
            require(tx, id)?;
            let child_count = tx.count_children(id)?;
            if child_count > 0 {
                return Err(EngineError::HasChildren {
                    item_id: id.to_string(),
                    child_count,
                });
            }
            tx.delete(id)
        })
    }

    /// Respace one sibling group to `B, 2B, 3B, …` and return the rewrites.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if `parent_id` does not exist and
    /// [`EngineError::CrossWorkspace`] if it belongs to another workspace.
    #[instrument(skip(self))]
    pub fn renormalize(
        &mut self,
        workspace_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<OrderUpdate>, EngineError> {
        let base_spacing = self.config.ordering.base_spacing;

        self.store.atomic(|tx| {
            if let Some(parent_id) = parent_id {
                let parent = require(tx, parent_id)?;
                ensure_same_workspace(&parent, workspace_id)?;
            }
            let mut keys: Vec<SiblingKey> = tx
                .siblings(workspace_id, parent_id)?
                .iter()
                .map(SiblingKey::from)
                .collect();
            order::sort_siblings(&mut keys);
            let updates = order::renormalize(&keys, base_spacing);
            apply_renormalization(tx, workspace_id, parent_id, &updates)?;
            Ok(updates)
        })
    }

    /// Read a workspace and rebuild its forest.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] if the listing fails.
    pub fn tree(&self, workspace_id: &str) -> Result<TreeBuild, EngineError> {
        let records = self.store.list_workspace(workspace_id)?;
        Ok(build_tree_with_report(records))
    }

    /// Parent chain of `id`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if `id` does not exist.
    pub fn ancestors(&self, id: &str) -> Result<Vec<WorkItem>, EngineError> {
        hierarchy::ancestors(&self.store, id)
    }
}

fn fresh_id<S: ItemStore>(
    store: &S,
    workspace_id: &str,
    title: &str,
    created_at_us: i64,
) -> Result<String, EngineError> {
    for nonce in 0..MAX_ID_ATTEMPTS {
        let id = derive_id(workspace_id, title, created_at_us, nonce);
        if !store.contains(&id)? {
            return Ok(id);
        }
        debug!(id = %id, nonce, "id collision, retrying");
    }
    Err(EngineError::Db(anyhow::anyhow!(
        "could not derive a unique id after {MAX_ID_ATTEMPTS} attempts"
    )))
}
