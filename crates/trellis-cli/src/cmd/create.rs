//! `tl create`: create a new work item.

use crate::cmd::{Project, engine_result};
use crate::output::{CliError, OutputMode, fail, render};
use clap::Args;
use std::str::FromStr;
use trellis_core::error::ErrorCode;
use trellis_core::hierarchy;
use trellis_core::{Kind, NewWorkItem};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Title of the new item.
    #[arg(short, long)]
    pub title: String,

    /// Item kind: epic, feature, story, or task (default: the outermost
    /// kind allowed under the parent, so `epic` at the top level).
    #[arg(short, long)]
    pub kind: Option<String>,

    /// Parent item ID. Omit for a top-level item.
    #[arg(short, long)]
    pub parent: Option<String>,

    /// Zero-based position among the new siblings (default: append).
    #[arg(long)]
    pub position: Option<usize>,

    /// Description text.
    #[arg(short, long)]
    pub description: Option<String>,

    /// Initial status (default: todo).
    #[arg(short, long)]
    pub status: Option<String>,
}

/// Parse a `--kind` value, rendering a coded error when it is unknown.
pub fn parse_kind(raw: &str, output: OutputMode) -> anyhow::Result<Kind> {
    Kind::from_str(raw).map_err(|e| {
        fail(
            output,
            &CliError::from_code(ErrorCode::InvalidEnumValue, e.to_string()),
        )
    })
}

/// Kind used when `--kind` is omitted.
///
/// A parent with no allowed children yields `task` so the engine reports
/// the hierarchy violation.
#[must_use]
pub fn default_kind(parent: Option<Kind>) -> Kind {
    hierarchy::allowed_children(parent)
        .first()
        .copied()
        .unwrap_or(Kind::Task)
}

pub fn run_create(args: &CreateArgs, project: &mut Project, output: OutputMode) -> anyhow::Result<()> {
    let kind = match (&args.kind, &args.parent) {
        (Some(raw), _) => parse_kind(raw, output)?,
        (None, None) => default_kind(None),
        (None, Some(parent_id)) => {
            let parent = engine_result(output, project.engine.get(parent_id))?;
            default_kind(Some(parent.kind))
        }
    };

    let new = NewWorkItem {
        workspace_id: project.workspace.clone(),
        parent_id: args.parent.clone(),
        kind,
        title: args.title.clone(),
        description: args.description.clone(),
        status: args.status.clone(),
        position: args.position,
    };
    let item = engine_result(output, project.engine.create(new))?;
    tracing::info!(id = %item.id, kind = %item.kind, "created work item");

    render(output, &item, |item, w| {
        writeln!(w, "✓ Created {} {}: {}", item.kind, item.id, item.title)
    })
}
