//! SQLite schema for the work item store.
//!
//! - `work_items` holds one row per item, with the parent link and the sparse
//!   order key used to sort siblings
//! - `store_meta` records the schema version the file was last migrated to

/// Migration v1: core table plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS work_items (
    item_id TEXT PRIMARY KEY CHECK (length(trim(item_id)) > 0),
    workspace_id TEXT NOT NULL,
    parent_id TEXT REFERENCES work_items(item_id) ON DELETE RESTRICT,
    kind TEXT NOT NULL CHECK (kind IN ('epic', 'feature', 'story', 'task')),
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT,
    status TEXT NOT NULL DEFAULT 'todo',
    sort_order REAL NOT NULL,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (parent_id IS NULL OR parent_id <> item_id)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: sibling and workspace read-path indexes.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_work_items_siblings
    ON work_items(workspace_id, parent_id, sort_order);

CREATE INDEX IF NOT EXISTS idx_work_items_workspace
    ON work_items(workspace_id, created_at_us);

CREATE INDEX IF NOT EXISTS idx_work_items_parent
    ON work_items(parent_id);
";

/// Indexes every migrated database must carry.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_work_items_siblings",
    "idx_work_items_workspace",
    "idx_work_items_parent",
];
