//! Record storage behind the engine.
//!
//! The engine only needs keyed reads, lookups by parent and by workspace,
//! and single-row writes. [`ItemStore::atomic`] groups a read-compute-write
//! sequence into one logical transaction: either every write inside it is
//! kept, or none is.

pub mod memory;
pub mod sqlite;

use crate::error::EngineError;
use crate::model::{ItemPatch, WorkItem, WorkItemRecord};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub trait ItemStore {
    /// Fetch one item by id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] on storage failure.
    fn get(&self, id: &str) -> Result<Option<WorkItem>, EngineError>;

    /// Items of `workspace_id` whose parent is `parent_id` (`None` for the
    /// top level), sorted by order ascending then id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] on storage failure.
    fn siblings(
        &self,
        workspace_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<WorkItem>, EngineError>;

    /// Every record of a workspace, unvalidated, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] on storage failure.
    fn list_workspace(&self, workspace_id: &str) -> Result<Vec<WorkItemRecord>, EngineError>;

    /// Number of items whose parent is `id`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] on storage failure.
    fn count_children(&self, id: &str) -> Result<usize, EngineError>;

    /// Store a new item and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] on storage failure, including a
    /// duplicate id.
    fn insert(&mut self, item: &WorkItem) -> Result<String, EngineError>;

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if `id` does not exist.
    fn patch(&mut self, id: &str, patch: &ItemPatch) -> Result<(), EngineError>;

    /// Remove an item.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if `id` does not exist.
    fn delete(&mut self, id: &str) -> Result<(), EngineError>;

    /// Run `f` as one transaction.
    ///
    /// Writes made by `f` are committed when it returns `Ok` and discarded
    /// when it returns `Err`. Nested calls join the outer transaction.
    ///
    /// # Errors
    ///
    /// Propagates the error from `f`, or [`EngineError::Db`] if the
    /// transaction cannot be started or committed.
    fn atomic<T, F>(&mut self, f: F) -> Result<T, EngineError>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T, EngineError>;

    /// Returns `true` if `id` exists.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] on storage failure.
    fn contains(&self, id: &str) -> Result<bool, EngineError> {
        Ok(self.get(id)?.is_some())
    }
}
