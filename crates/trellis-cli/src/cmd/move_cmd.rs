//! `tl move`: reparent and/or reorder a work item.

use crate::cmd::{Project, engine_result, item_in_workspace, parse_parent};
use crate::output::{OutputMode, render};
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Item ID to move.
    pub id: String,

    /// Destination parent ID, or `none` for the top level.
    #[arg(short, long)]
    pub parent: String,

    /// Zero-based position among the destination siblings (default: append).
    #[arg(short, long)]
    pub index: Option<usize>,
}

#[derive(Debug, Serialize)]
struct MoveResult {
    id: String,
    parent_id: Option<String>,
    order: f64,
}

pub fn run_move(args: &MoveArgs, project: &mut Project, output: OutputMode) -> anyhow::Result<()> {
    item_in_workspace(project, &args.id, output)?;
    let parent = parse_parent(&args.parent);
    let placement = engine_result(
        output,
        project
            .engine
            .reorder(&args.id, parent.as_deref(), args.index.unwrap_or(usize::MAX)),
    )?;
    tracing::info!(id = %args.id, parent_id = ?placement.parent_id, "moved work item");

    let result = MoveResult {
        id: args.id.clone(),
        parent_id: placement.parent_id,
        order: placement.order,
    };
    render(output, &result, |r, w| {
        let parent = r.parent_id.as_deref().unwrap_or("top level");
        writeln!(w, "✓ Moved {} under {parent} (order {})", r.id, r.order)
    })
}
