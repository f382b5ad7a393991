//! `tl update`: edit the content of a work item.

use crate::cmd::{Project, engine_result, item_in_workspace};
use crate::output::{OutputMode, render};
use clap::Args;
use trellis_core::ContentPatch;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Item ID to update.
    pub id: String,

    /// New title.
    #[arg(short, long)]
    pub title: Option<String>,

    /// New description.
    #[arg(short, long)]
    pub description: Option<String>,

    /// New status.
    #[arg(short, long)]
    pub status: Option<String>,
}

pub fn run_update(args: &UpdateArgs, project: &mut Project, output: OutputMode) -> anyhow::Result<()> {
    item_in_workspace(project, &args.id, output)?;
    let patch = ContentPatch {
        title: args.title.clone(),
        description: args.description.clone(),
        status: args.status.clone(),
    };
    if patch.is_empty() {
        tracing::debug!(id = %args.id, "nothing to update");
    }

    let item = engine_result(output, project.engine.update(&args.id, patch))?;

    render(output, &item, |item, w| {
        writeln!(w, "✓ Updated {}: {} [{}]", item.id, item.title, item.status)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: UpdateArgs,
    }

    #[test]
    fn update_args_parse() {
        let w = Wrapper::parse_from(["test", "wi-abc", "--status", "done"]);
        assert_eq!(w.args.id, "wi-abc");
        assert_eq!(w.args.status.as_deref(), Some("done"));
        assert!(w.args.title.is_none());
    }
}
