//! `tl delete`: remove a childless work item.

use crate::cmd::{Project, engine_result, item_in_workspace};
use crate::output::{OutputMode, render};
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Item ID to delete.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct DeleteResult {
    ok: bool,
    id: String,
}

pub fn run_delete(args: &DeleteArgs, project: &mut Project, output: OutputMode) -> anyhow::Result<()> {
    item_in_workspace(project, &args.id, output)?;
    engine_result(output, project.engine.delete(&args.id))?;
    tracing::info!(id = %args.id, "deleted work item");

    let result = DeleteResult {
        ok: true,
        id: args.id.clone(),
    };
    render(output, &result, |r, w| writeln!(w, "✓ Deleted {}", r.id))
}
