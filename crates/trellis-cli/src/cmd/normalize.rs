//! `tl normalize`: respace one sibling group's order keys.

use crate::cmd::{Project, engine_result, parse_parent};
use crate::output::{OutputMode, render_mode};
use clap::Args;
use serde::Serialize;
use trellis_core::order::OrderUpdate;

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Parent whose children are respaced, or `none` for the top level.
    #[arg(short, long, default_value = "none")]
    pub parent: String,
}

#[derive(Debug, Serialize)]
struct NormalizeResult {
    parent_id: Option<String>,
    changed: Vec<OrderUpdate>,
}

pub fn run_normalize(
    args: &NormalizeArgs,
    project: &mut Project,
    output: OutputMode,
) -> anyhow::Result<()> {
    let parent = parse_parent(&args.parent);
    let changed = engine_result(
        output,
        project
            .engine
            .renormalize(&project.workspace, parent.as_deref()),
    )?;

    let result = NormalizeResult {
        parent_id: parent,
        changed,
    };
    render_mode(
        output,
        &result,
        |r, w| {
            for update in &r.changed {
                writeln!(w, "{}\t{}", update.id, update.order)?;
            }
            Ok(())
        },
        |r, w| {
            if r.changed.is_empty() {
                writeln!(w, "✓ Already evenly spaced")
            } else {
                writeln!(w, "✓ Respaced {} item(s)", r.changed.len())
            }
        },
    )
}
