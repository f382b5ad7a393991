//! `tl show`: display one work item with its breadcrumb and children.

use crate::cmd::{Project, engine_result, item_in_workspace};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use clap::Args;
use serde::Serialize;
use trellis_core::WorkItem;
use trellis_core::store::ItemStore;
use trellis_core::tree::Progress;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Item ID to show.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct ShowView {
    item: WorkItem,
    /// Root first, immediate parent last.
    ancestors: Vec<WorkItem>,
    children: Vec<WorkItem>,
    progress: Progress,
}

pub fn run_show(args: &ShowArgs, project: &Project, output: OutputMode) -> anyhow::Result<()> {
    let engine = &project.engine;
    let item = item_in_workspace(project, &args.id, output)?;
    let mut ancestors = engine_result(output, engine.ancestors(&args.id))?;
    ancestors.reverse();

    let build = engine_result(output, engine.tree(&item.workspace_id))?;
    let node = build.roots.iter().find_map(|root| root.find(&args.id));
    let (children, progress) = if let Some(node) = node {
        (
            node.children.iter().map(|c| c.item.clone()).collect(),
            node.progress(&engine.config().progress),
        )
    } else {
        // Not reachable from a root; list direct children only.
        let children = engine_result(
            output,
            engine.store().siblings(&item.workspace_id, Some(item.id.as_str())),
        )?;
        (children, Progress::default())
    };

    let view = ShowView {
        item,
        ancestors,
        children,
        progress,
    };
    render_mode(
        output,
        &view,
        |v, w| {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}",
                v.item.id,
                v.item.kind,
                v.item.status,
                v.item.parent_id.as_deref().unwrap_or("-"),
                v.item.title
            )?;
            for child in &v.children {
                writeln!(w, "child\t{}\t{}\t{}", child.id, child.kind, child.title)?;
            }
            Ok(())
        },
        |v, w| {
            pretty_section(w, &format!("{} {}  {}", v.item.kind, v.item.id, v.item.title))?;
            if !v.ancestors.is_empty() {
                let crumbs: Vec<String> = v
                    .ancestors
                    .iter()
                    .map(|a| format!("{} ({})", a.title, a.id))
                    .collect();
                pretty_kv(w, "Path", crumbs.join(" > "))?;
            }
            pretty_kv(w, "Status", &v.item.status)?;
            pretty_kv(w, "Workspace", &v.item.workspace_id)?;
            pretty_kv(w, "Order", v.item.order.to_string())?;
            if let Some(description) = &v.item.description {
                pretty_kv(w, "Description", description)?;
            }
            if !v.children.is_empty() {
                pretty_kv(w, "Progress", v.progress.to_string())?;
                writeln!(w)?;
                pretty_section(w, &format!("Children ({})", v.children.len()))?;
                for child in &v.children {
                    writeln!(w, "{} {}  {} [{}]", child.kind, child.id, child.title, child.status)?;
                }
            }
            Ok(())
        },
    )
}
