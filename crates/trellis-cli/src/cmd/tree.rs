//! `tl tree`: render the workspace hierarchy.

use crate::cmd::{Project, engine_result};
use crate::output::{OutputMode, pretty_section, render_mode};
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use trellis_core::TreeNode;
use trellis_core::config::ProgressConfig;
use trellis_core::tree::{FlatEntry, flatten};

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Emit a pre-order list with depths instead of nested nodes.
    #[arg(long)]
    pub flat: bool,
}

#[derive(Debug, Serialize)]
struct SkippedView {
    id: Option<String>,
    reason: String,
}

#[derive(Debug, Serialize)]
struct TreeView<'a> {
    roots: &'a [TreeNode],
    skipped: Vec<SkippedView>,
}

#[derive(Debug, Serialize)]
struct FlatView {
    items: Vec<FlatEntry>,
    skipped: Vec<SkippedView>,
}

fn write_node(
    w: &mut dyn Write,
    node: &TreeNode,
    depth: usize,
    progress: &ProgressConfig,
) -> io::Result<()> {
    let indent = "  ".repeat(depth);
    let item = &node.item;
    if node.children.is_empty() {
        writeln!(w, "{indent}{} {}  {} [{}]", item.kind, item.id, item.title, item.status)?;
    } else {
        writeln!(
            w,
            "{indent}{} {}  {} [{}] {}",
            item.kind,
            item.id,
            item.title,
            item.status,
            node.progress(progress)
        )?;
    }
    for child in &node.children {
        write_node(w, child, depth + 1, progress)?;
    }
    Ok(())
}

fn write_text(w: &mut dyn Write, node: &TreeNode, depth: usize) -> io::Result<()> {
    let item = &node.item;
    writeln!(
        w,
        "{depth}\t{}\t{}\t{}\t{}",
        item.id,
        item.parent_id.as_deref().unwrap_or("-"),
        item.kind,
        item.title
    )?;
    for child in &node.children {
        write_text(w, child, depth + 1)?;
    }
    Ok(())
}

fn write_skipped(w: &mut dyn Write, skipped: &[SkippedView]) -> io::Result<()> {
    if skipped.is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    pretty_section(w, &format!("Skipped ({})", skipped.len()))?;
    for record in skipped {
        writeln!(w, "{}  {}", record.id.as_deref().unwrap_or("?"), record.reason)?;
    }
    Ok(())
}

pub fn run_tree(args: &TreeArgs, project: &Project, output: OutputMode) -> anyhow::Result<()> {
    let build = engine_result(output, project.engine.tree(&project.workspace))?;
    let skipped: Vec<SkippedView> = build
        .skipped
        .iter()
        .map(|s| SkippedView {
            id: s.id.clone(),
            reason: s.reason.to_string(),
        })
        .collect();
    if !skipped.is_empty() {
        tracing::warn!(count = skipped.len(), "records left out of the tree");
    }

    if args.flat {
        let view = FlatView {
            items: flatten(&build.roots),
            skipped,
        };
        return render_mode(
            output,
            &view,
            |v, w| {
                for entry in &v.items {
                    writeln!(w, "{}\t{}\t{}", entry.depth, entry.id, entry.kind)?;
                }
                Ok(())
            },
            |v, w| {
                for entry in &v.items {
                    writeln!(w, "{}{} {}", "  ".repeat(entry.depth), entry.kind, entry.id)?;
                }
                write_skipped(w, &v.skipped)
            },
        );
    }

    let progress = &project.engine.config().progress;
    let view = TreeView {
        roots: &build.roots,
        skipped,
    };
    render_mode(
        output,
        &view,
        |v, w| {
            for root in v.roots {
                write_text(w, root, 0)?;
            }
            Ok(())
        },
        |v, w| {
            if v.roots.is_empty() {
                writeln!(w, "(no items in workspace '{}')", project.workspace)?;
            }
            for root in v.roots {
                write_node(w, root, 0, progress)?;
            }
            write_skipped(w, &v.skipped)
        },
    )
}
