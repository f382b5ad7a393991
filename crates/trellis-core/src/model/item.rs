use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The four levels of work item, shallowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Epic,
    Feature,
    Story,
    Task,
}

impl Kind {
    /// Every kind, in nesting order.
    pub const ALL: [Self; 4] = [Self::Epic, Self::Feature, Self::Story, Self::Task];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Feature => "feature",
            Self::Story => "story",
            Self::Task => "task",
        }
    }

    /// Nesting rank: `0` for epics, increasing towards tasks.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Epic => 0,
            Self::Feature => 1,
            Self::Story => 2,
            Self::Task => 3,
        }
    }
}

/// A fully validated work item as held by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub workspace_id: String,
    pub parent_id: Option<String>,
    pub kind: Kind,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub order: f64,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

/// Loosely-typed record as it comes out of storage or an import.
///
/// Every field is optional so that incomplete rows can still be read and
/// reported instead of aborting a whole listing. [`WorkItemRecord::validate`]
/// turns it into a [`WorkItem`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkItemRecord {
    pub id: Option<String>,
    pub workspace_id: Option<String>,
    pub parent_id: Option<String>,
    #[serde(alias = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub order: Option<f64>,
    pub created_at_us: Option<i64>,
    pub updated_at_us: Option<i64>,
}

/// Why a record could not be turned into a [`WorkItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordDefect {
    MissingId,
    MissingKind,
    UnknownKind(String),
    MissingTitle,
}

impl fmt::Display for RecordDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingId => f.write_str("missing id"),
            Self::MissingKind => f.write_str("missing type"),
            Self::UnknownKind(raw) => write!(f, "unknown type '{raw}'"),
            Self::MissingTitle => f.write_str("missing title"),
        }
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl WorkItemRecord {
    /// Check required fields (`id`, `type`, `title`) and build a [`WorkItem`].
    ///
    /// A blank parent id is read as "no parent". A missing order sorts as
    /// `0.0`, a missing status as `todo`.
    ///
    /// # Errors
    ///
    /// Returns the first [`RecordDefect`] found.
    pub fn validate(&self) -> Result<WorkItem, RecordDefect> {
        let id = non_blank(self.id.as_ref()).ok_or(RecordDefect::MissingId)?;
        let raw_kind = non_blank(self.kind.as_ref()).ok_or(RecordDefect::MissingKind)?;
        let kind =
            Kind::from_str(raw_kind).map_err(|_| RecordDefect::UnknownKind(raw_kind.to_string()))?;
        let title = non_blank(self.title.as_ref()).ok_or(RecordDefect::MissingTitle)?;

        Ok(WorkItem {
            id: id.to_string(),
            workspace_id: self.workspace_id.clone().unwrap_or_default(),
            parent_id: non_blank(self.parent_id.as_ref()).map(str::to_string),
            kind,
            title: title.to_string(),
            description: self.description.clone(),
            status: self
                .status
                .clone()
                .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            order: self.order.unwrap_or(0.0),
            created_at_us: self.created_at_us.unwrap_or(0),
            updated_at_us: self.updated_at_us.unwrap_or(0),
        })
    }
}

impl From<WorkItem> for WorkItemRecord {
    fn from(item: WorkItem) -> Self {
        Self {
            id: Some(item.id),
            workspace_id: Some(item.workspace_id),
            parent_id: item.parent_id,
            kind: Some(item.kind.as_str().to_string()),
            title: Some(item.title),
            description: item.description,
            status: Some(item.status),
            order: Some(item.order),
            created_at_us: Some(item.created_at_us),
            updated_at_us: Some(item.updated_at_us),
        }
    }
}

/// Status given to items created without one.
pub const DEFAULT_STATUS: &str = "todo";

/// Input for creating a work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWorkItem {
    pub workspace_id: String,
    pub parent_id: Option<String>,
    pub kind: Kind,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    /// Target index among the new siblings; `None` appends at the end.
    pub position: Option<usize>,
}

impl NewWorkItem {
    pub fn new(workspace_id: impl Into<String>, kind: Kind, title: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            parent_id: None,
            kind,
            title: title.into(),
            description: None,
            status: None,
            position: None,
        }
    }

    #[must_use]
    pub fn under(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    #[must_use]
    pub const fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

/// Content-only edit. Fields left as `None` are untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

impl ContentPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.status.is_none()
    }
}

/// Partial write accepted by [`crate::store::ItemStore::patch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    /// `Some(None)` detaches the item to the top level.
    pub parent_id: Option<Option<String>>,
    pub order: Option<f64>,
    pub updated_at_us: Option<i64>,
}

impl ItemPatch {
    #[must_use]
    pub fn order(order: f64) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn placement(parent_id: Option<String>, order: f64) -> Self {
        Self {
            parent_id: Some(parent_id),
            order: Some(order),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn content(patch: ContentPatch) -> Self {
        Self {
            title: patch.title,
            description: patch.description,
            status: patch.status,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn touched_at(mut self, updated_at_us: i64) -> Self {
        self.updated_at_us = Some(updated_at_us);
        self
    }

    /// Apply this patch to an in-memory item.
    pub fn apply_to(&self, item: &mut WorkItem) {
        if let Some(title) = &self.title {
            item.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            item.description = Some(description.clone());
        }
        if let Some(status) = &self.status {
            item.status.clone_from(status);
        }
        if let Some(parent_id) = &self.parent_id {
            item.parent_id.clone_from(parent_id);
        }
        if let Some(order) = self.order {
            item.order = order;
        }
        if let Some(updated_at_us) = self.updated_at_us {
            item.updated_at_us = updated_at_us;
        }
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "epic" => Ok(Self::Epic),
            "feature" => Ok(Self::Feature),
            "story" | "user_story" | "userstory" => Ok(Self::Story),
            "task" => Ok(Self::Task),
            _ => Err(ParseEnumError {
                expected: "type",
                got: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ContentPatch, ItemPatch, Kind, RecordDefect, WorkItemRecord};
    use std::str::FromStr;

    fn record(id: &str, kind: &str, title: &str) -> WorkItemRecord {
        WorkItemRecord {
            id: Some(id.to_string()),
            kind: Some(kind.to_string()),
            title: Some(title.to_string()),
            ..WorkItemRecord::default()
        }
    }

    #[test]
    fn kind_json_roundtrips() {
        assert_eq!(
            serde_json::to_string(&Kind::Feature).expect("serialize"),
            "\"feature\""
        );
        assert_eq!(
            serde_json::from_str::<Kind>("\"story\"").expect("deserialize"),
            Kind::Story
        );
    }

    #[test]
    fn display_parse_roundtrips() {
        for kind in Kind::ALL {
            assert_eq!(Kind::from_str(&kind.to_string()), Ok(kind));
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_accepts_user_story() {
        assert_eq!(Kind::from_str(" EPIC "), Ok(Kind::Epic));
        assert_eq!(Kind::from_str("user_story"), Ok(Kind::Story));
        assert!(Kind::from_str("goal").is_err());
    }

    #[test]
    fn rank_increases_with_nesting() {
        let ranks: Vec<u8> = Kind::ALL.iter().map(|k| k.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn validate_fills_defaults() {
        let item = record("wi-1", "epic", "Billing").validate().expect("valid");
        assert_eq!(item.kind, Kind::Epic);
        assert_eq!(item.status, "todo");
        assert!(item.parent_id.is_none());
        assert!((item.order - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_reports_missing_fields() {
        let mut rec = record("wi-1", "epic", "Billing");
        rec.id = None;
        assert_eq!(rec.validate(), Err(RecordDefect::MissingId));

        let mut rec = record("wi-1", "epic", "Billing");
        rec.kind = Some("  ".to_string());
        assert_eq!(rec.validate(), Err(RecordDefect::MissingKind));

        let rec = record("wi-1", "initiative", "Billing");
        assert_eq!(
            rec.validate(),
            Err(RecordDefect::UnknownKind("initiative".to_string()))
        );

        let rec = record("wi-1", "story", "");
        assert_eq!(rec.validate(), Err(RecordDefect::MissingTitle));
    }

    #[test]
    fn blank_parent_reads_as_root() {
        let mut rec = record("wi-1", "epic", "Billing");
        rec.parent_id = Some(String::new());
        assert!(rec.validate().expect("valid").parent_id.is_none());
    }

    #[test]
    fn record_accepts_type_alias_in_json() {
        let rec: WorkItemRecord =
            serde_json::from_str(r#"{"id":"wi-9","type":"task","title":"Write docs","order":3.5}"#)
                .expect("parse record");
        let item = rec.validate().expect("valid");
        assert_eq!(item.kind, Kind::Task);
        assert!((item.order - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let mut item = record("wi-1", "story", "Login").validate().expect("valid");
        item.parent_id = Some("wi-epic".to_string());

        ItemPatch::content(ContentPatch {
            status: Some("done".to_string()),
            ..ContentPatch::default()
        })
        .apply_to(&mut item);
        assert_eq!(item.status, "done");
        assert_eq!(item.title, "Login");
        assert_eq!(item.parent_id.as_deref(), Some("wi-epic"));

        ItemPatch::placement(None, 2000.0).apply_to(&mut item);
        assert!(item.parent_id.is_none());
        assert!((item.order - 2000.0).abs() < f64::EPSILON);
    }
}
