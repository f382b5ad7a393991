use std::fmt;

use crate::model::item::Kind;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    InvalidConfig,
    ItemNotFound,
    HierarchyViolation,
    HasChildren,
    CrossWorkspace,
    InvalidEnumValue,
    InvalidInput,
    CorruptStore,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidConfig => "E1003",
            Self::ItemNotFound => "E2001",
            Self::HierarchyViolation => "E2002",
            Self::HasChildren => "E2003",
            Self::CrossWorkspace => "E2004",
            Self::InvalidEnumValue => "E2005",
            Self::InvalidInput => "E2006",
            Self::CorruptStore => "E3001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidConfig => "Invalid configuration value",
            Self::ItemNotFound => "Item not found",
            Self::HierarchyViolation => "Item type cannot be nested there",
            Self::HasChildren => "Item still has children",
            Self::CrossWorkspace => "Item belongs to another workspace",
            Self::InvalidEnumValue => "Invalid kind value",
            Self::InvalidInput => "Invalid input",
            Self::CorruptStore => "Corrupt SQLite store",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `tl init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .trellis/config.toml and retry."),
            Self::InvalidConfig => {
                Some("Use ordering.min_gap >= 2 and ordering.base_spacing >= ordering.min_gap.")
            }
            Self::ItemNotFound => None,
            Self::HierarchyViolation => Some(
                "Nest epics at the top level, features under epics, stories under epics or features, tasks under stories.",
            ),
            Self::HasChildren => Some("Remove or move child items first."),
            Self::CrossWorkspace => Some("Items can only be nested within a single workspace."),
            Self::InvalidEnumValue => Some("Use one of: epic, feature, story, task."),
            Self::InvalidInput => None,
            Self::CorruptStore => Some("Restore .trellis/trellis.db from a backup."),
            Self::LockContention => Some("Retry after the other `tl` process releases its lock."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by engine operations.
///
/// Everything except [`EngineError::Db`] is a local precondition checked
/// before any write, so none of them is worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The prospective parent type may not contain the child type.
    #[error("cannot nest {child} under {}", parent_label(.parent))]
    HierarchyViolation { parent: Option<Kind>, child: Kind },

    /// Delete refused because the item still has children.
    #[error("cannot delete '{item_id}': it still has {child_count} child item(s)")]
    HasChildren { item_id: String, child_count: usize },

    /// Referenced item does not exist.
    #[error("item not found: '{0}'")]
    NotFound(String),

    /// The target parent lives in a different workspace.
    #[error(
        "item '{item_id}' is in workspace '{workspace_id}', not '{target_workspace_id}'"
    )]
    CrossWorkspace {
        item_id: String,
        workspace_id: String,
        target_workspace_id: String,
    },

    /// Caller-supplied value is unusable (e.g. blank title).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Underlying storage failure.
    #[error("storage error: {0:#}")]
    Db(#[from] anyhow::Error),
}

fn with_article(kind: Kind) -> String {
    match kind {
        Kind::Epic => "an epic".to_string(),
        other => format!("a {other}"),
    }
}

#[allow(clippy::ref_option)]
fn parent_label(parent: &Option<Kind>) -> String {
    parent.map_or_else(|| "the top level".to_string(), with_article)
}

impl EngineError {
    /// Stable error code for this failure.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::HierarchyViolation { .. } => ErrorCode::HierarchyViolation,
            Self::HasChildren { .. } => ErrorCode::HasChildren,
            Self::NotFound(_) => ErrorCode::ItemNotFound,
            Self::CrossWorkspace { .. } => ErrorCode::CrossWorkspace,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::InvalidConfig(_) => ErrorCode::InvalidConfig,
            Self::Db(err) => classify_db_error(err),
        }
    }

    /// Remediation text suitable for a `suggestion:` line.
    #[must_use]
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::HierarchyViolation { child, .. } => Some(format!(
                "{} can only be placed under {}",
                with_article(*child),
                allowed_parent_phrase(*child)
            )),
            Self::HasChildren { .. } => Some("remove child items first".to_string()),
            other => other.error_code().hint().map(str::to_string),
        }
    }
}

fn allowed_parent_phrase(child: Kind) -> String {
    let names: Vec<String> = crate::hierarchy::allowed_parents(child)
        .iter()
        .map(parent_label)
        .collect();
    names.join(" or ")
}

fn classify_db_error(err: &anyhow::Error) -> ErrorCode {
    for cause in err.chain() {
        if let Some(rusqlite::Error::SqliteFailure(code, _)) =
            cause.downcast_ref::<rusqlite::Error>()
        {
            return match code.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    ErrorCode::LockContention
                }
                rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase => {
                    ErrorCode::CorruptStore
                }
                _ => ErrorCode::InternalUnexpected,
            };
        }
    }
    ErrorCode::InternalUnexpected
}
