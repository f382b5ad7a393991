//! In-memory [`ItemStore`] for tests and embedding.

use std::collections::HashMap;

use anyhow::anyhow;

use crate::error::EngineError;
use crate::model::{ItemPatch, WorkItem, WorkItemRecord};

use super::ItemStore;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    items: HashMap<String, WorkItem>,
    /// Ids in insertion order, so listings are stable.
    sequence: Vec<String>,
    in_transaction: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl ItemStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<WorkItem>, EngineError> {
        Ok(self.items.get(id).cloned())
    }

    fn siblings(
        &self,
        workspace_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<WorkItem>, EngineError> {
        let mut group: Vec<WorkItem> = self
            .sequence
            .iter()
            .filter_map(|id| self.items.get(id))
            .filter(|item| item.workspace_id == workspace_id && item.parent_id.as_deref() == parent_id)
            .cloned()
            .collect();

        group.sort_by(|a, b| a.order.total_cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        Ok(group)
    }

    fn list_workspace(&self, workspace_id: &str) -> Result<Vec<WorkItemRecord>, EngineError> {
        Ok(self
            .sequence
            .iter()
            .filter_map(|id| self.items.get(id))
            .filter(|item| item.workspace_id == workspace_id)
            .cloned()
            .map(WorkItemRecord::from)
            .collect())
    }

    fn count_children(&self, id: &str) -> Result<usize, EngineError> {
        Ok(self
            .items
            .values()
            .filter(|item| item.parent_id.as_deref() == Some(id))
            .count())
    }

    fn insert(&mut self, item: &WorkItem) -> Result<String, EngineError> {
        if self.items.contains_key(&item.id) {
            return Err(EngineError::Db(anyhow!("duplicate item id '{}'", item.id)));
        }
        self.sequence.push(item.id.clone());
        self.items.insert(item.id.clone(), item.clone());
        Ok(item.id.clone())
    }

    fn patch(&mut self, id: &str, patch: &ItemPatch) -> Result<(), EngineError> {
        let item = self
            .items
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        patch.apply_to(item);
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), EngineError> {
        if self.items.remove(id).is_none() {
            return Err(EngineError::NotFound(id.to_string()));
        }
        self.sequence.retain(|existing| existing != id);
        Ok(())
    }

    fn atomic<T, F>(&mut self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut Self) -> Result<T, EngineError>,
    {
        if self.in_transaction {
            return f(self);
        }

        let snapshot = (self.items.clone(), self.sequence.clone());
        self.in_transaction = true;
        let result = f(self);
        self.in_transaction = false;

        if result.is_err() {
            (self.items, self.sequence) = snapshot;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Kind;

    fn item(id: &str, parent: Option<&str>, order: f64) -> WorkItem {
        WorkItem {
            id: id.to_string(),
            workspace_id: "ws".to_string(),
            parent_id: parent.map(str::to_string),
            kind: Kind::Story,
            title: id.to_string(),
            description: None,
            status: "todo".to_string(),
            order,
            created_at_us: 0,
            updated_at_us: 0,
        }
    }

    #[test]
    fn siblings_are_sorted_by_order_then_id() {
        let mut store = MemoryStore::new();
        store.insert(&item("c", Some("p"), 2000.0)).expect("insert");
        store.insert(&item("b", Some("p"), 1000.0)).expect("insert");
        store.insert(&item("a", Some("p"), 2000.0)).expect("insert");
        store.insert(&item("other", Some("q"), 0.0)).expect("insert");

        let ids: Vec<String> = store
            .siblings("ws", Some("p"))
            .expect("siblings")
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn siblings_are_scoped_by_workspace() {
        let mut store = MemoryStore::new();
        store.insert(&item("a", None, 1000.0)).expect("insert");
        let mut foreign = item("b", None, 2000.0);
        foreign.workspace_id = "elsewhere".to_string();
        store.insert(&foreign).expect("insert");

        assert_eq!(store.siblings("ws", None).expect("siblings").len(), 1);
        assert_eq!(store.list_workspace("elsewhere").expect("list").len(), 1);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut store = MemoryStore::new();
        store.insert(&item("a", None, 1.0)).expect("insert");
        assert!(matches!(store.insert(&item("a", None, 2.0)), Err(EngineError::Db(_))));
    }

    #[test]
    fn patch_and_delete_missing_ids_are_not_found() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.patch("nope", &ItemPatch::order(1.0)),
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(store.delete("nope"), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn failed_transaction_restores_snapshot() {
        let mut store = MemoryStore::new();
        store.insert(&item("a", None, 1000.0)).expect("insert");

        let result: Result<(), EngineError> = store.atomic(|tx| {
            tx.patch("a", &ItemPatch::order(5.0))?;
            tx.insert(&item("b", None, 2000.0))?;
            tx.patch("missing", &ItemPatch::order(1.0))
        });
        assert!(matches!(result, Err(EngineError::NotFound(_))));

        let a = store.get("a").expect("get").expect("a exists");
        assert!((a.order - 1000.0).abs() < f64::EPSILON);
        assert!(!store.contains("b").expect("contains"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn nested_transactions_join_the_outer_one() {
        let mut store = MemoryStore::new();
        let result: Result<(), EngineError> = store.atomic(|tx| {
            tx.atomic(|inner| inner.insert(&item("a", None, 1.0)).map(|_| ()))?;
            Err(EngineError::InvalidInput("abort".to_string()))
        });
        assert!(result.is_err());
        assert!(store.is_empty());
    }
}
