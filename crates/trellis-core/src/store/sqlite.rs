//! SQLite-backed [`ItemStore`].
//!
//! [`ItemStore::atomic`] maps to `BEGIN IMMEDIATE … COMMIT`. Taking the write
//! lock up front serializes concurrent read-compute-write sequences across
//! processes, so two reorders of the same sibling group cannot both read the
//! old keys.

use std::path::Path;

use anyhow::{Context, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use crate::db;
use crate::error::EngineError;
use crate::model::{ItemPatch, WorkItem, WorkItemRecord};

use super::ItemStore;

const SELECT_COLUMNS: &str = "SELECT item_id, workspace_id, parent_id, kind, title, description, \
                              status, sort_order, created_at_us, updated_at_us FROM work_items";

pub struct SqliteStore {
    conn: Connection,
    in_transaction: bool,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.conn.path())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl SqliteStore {
    /// Open (or create and migrate) the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        Ok(Self::from_connection(db::open_db(path)?))
    }

    /// Private in-memory store, mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] if the database cannot be set up.
    pub fn open_in_memory() -> Result<Self, EngineError> {
        Ok(Self::from_connection(db::open_in_memory()?))
    }

    /// Wrap an already migrated connection.
    #[must_use]
    pub const fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> anyhow::Result<Vec<WorkItemRecord>> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("prepare query: {sql}"))?;
        let rows = stmt
            .query_map(params, row_to_record)
            .context("execute work item query")?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.context("read work item row")?);
        }
        Ok(records)
    }

    fn write_row(&self, item: &WorkItem) -> anyhow::Result<usize> {
        self.conn
            .execute(
                "UPDATE work_items SET workspace_id = ?2, parent_id = ?3, kind = ?4, title = ?5, \
                 description = ?6, status = ?7, sort_order = ?8, updated_at_us = ?9 \
                 WHERE item_id = ?1",
                params![
                    item.id,
                    item.workspace_id,
                    item.parent_id,
                    item.kind.as_str(),
                    item.title,
                    item.description,
                    item.status,
                    item.order,
                    item.updated_at_us,
                ],
            )
            .with_context(|| format!("update work item '{}'", item.id))
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkItemRecord> {
    Ok(WorkItemRecord {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        parent_id: row.get(2)?,
        kind: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        status: row.get(6)?,
        order: row.get(7)?,
        created_at_us: row.get(8)?,
        updated_at_us: row.get(9)?,
    })
}

/// Stored rows are expected to be well formed; one that is not means the
/// file was edited outside the engine.
fn validate_row(record: &WorkItemRecord) -> Result<WorkItem, EngineError> {
    record.validate().map_err(|defect| {
        EngineError::Db(anyhow!(
            "corrupt work item row {:?}: {defect}",
            record.id.as_deref().unwrap_or("<no id>")
        ))
    })
}

impl ItemStore for SqliteStore {
    fn get(&self, id: &str) -> Result<Option<WorkItem>, EngineError> {
        let sql = format!("{SELECT_COLUMNS} WHERE item_id = ?1");
        let record = self
            .conn
            .query_row(&sql, params![id], row_to_record)
            .optional()
            .with_context(|| format!("get work item '{id}'"))?;
        record.as_ref().map(validate_row).transpose()
    }

    fn siblings(
        &self,
        workspace_id: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<WorkItem>, EngineError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE workspace_id = ?1 AND parent_id IS ?2 \
             ORDER BY sort_order ASC, item_id ASC"
        );
        self.query_records(&sql, params![workspace_id, parent_id])?
            .iter()
            .map(validate_row)
            .collect()
    }

    fn list_workspace(&self, workspace_id: &str) -> Result<Vec<WorkItemRecord>, EngineError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE workspace_id = ?1 ORDER BY created_at_us ASC, rowid ASC"
        );
        Ok(self.query_records(&sql, params![workspace_id])?)
    }

    fn count_children(&self, id: &str) -> Result<usize, EngineError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM work_items WHERE parent_id = ?1",
                params![id],
                |row| row.get(0),
            )
            .with_context(|| format!("count children of '{id}'"))?;
        Ok(usize::try_from(count).unwrap_or(usize::MAX))
    }

    fn insert(&mut self, item: &WorkItem) -> Result<String, EngineError> {
        self.conn
            .execute(
                "INSERT INTO work_items (
                    item_id, workspace_id, parent_id, kind, title, description,
                    status, sort_order, created_at_us, updated_at_us
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    item.id,
                    item.workspace_id,
                    item.parent_id,
                    item.kind.as_str(),
                    item.title,
                    item.description,
                    item.status,
                    item.order,
                    item.created_at_us,
                    item.updated_at_us,
                ],
            )
            .with_context(|| format!("insert work item '{}'", item.id))?;
        Ok(item.id.clone())
    }

    fn patch(&mut self, id: &str, patch: &ItemPatch) -> Result<(), EngineError> {
        let mut item = self
            .get(id)?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        patch.apply_to(&mut item);
        self.write_row(&item)?;
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), EngineError> {
        let removed = self
            .conn
            .execute("DELETE FROM work_items WHERE item_id = ?1", params![id])
            .with_context(|| format!("delete work item '{id}'"))?;
        if removed == 0 {
            return Err(EngineError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn atomic<T, F>(&mut self, f: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut Self) -> Result<T, EngineError>,
    {
        if self.in_transaction {
            return f(self);
        }

        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .context("begin write transaction")?;
        self.in_transaction = true;
        let result = f(self);
        self.in_transaction = false;

        match result {
            Ok(value) => {
                if let Err(err) = self.conn.execute_batch("COMMIT") {
                    if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                        warn!(error = %rollback_err, "rollback after failed commit also failed");
                    }
                    return Err(EngineError::Db(
                        anyhow::Error::new(err).context("commit write transaction"),
                    ));
                }
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
