pub mod completions;
pub mod create;
pub mod delete;
pub mod init;
pub mod move_cmd;
pub mod normalize;
pub mod show;
pub mod tree;
pub mod update;

use crate::output::{CliError, OutputMode, fail};
use std::path::{Path, PathBuf};
use trellis_core::config::{self, PROJECT_DIR, ProjectConfig};
use trellis_core::db::DB_FILE_NAME;
use trellis_core::error::ErrorCode;
use trellis_core::store::SqliteStore;
use trellis_core::{Engine, EngineError, WorkItem};

/// An opened project: the selected workspace and its engine.
pub struct Project {
    pub workspace: String,
    pub engine: Engine<SqliteStore>,
}

/// Walk up from `start` to the nearest directory holding `.trellis/`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(PROJECT_DIR).is_dir())
        .map(Path::to_path_buf)
}

/// Path of the store database under `root`.
pub fn db_path(root: &Path) -> PathBuf {
    root.join(PROJECT_DIR).join(DB_FILE_NAME)
}

/// Locate the project, load its config and open the store.
///
/// Failures are rendered in `output` before being returned.
pub fn open_project(
    start: &Path,
    workspace_flag: Option<&str>,
    output: OutputMode,
) -> anyhow::Result<Project> {
    let Some(root) = find_project_root(start) else {
        let err = CliError::from_code(
            ErrorCode::NotInitialized,
            format!("no {PROJECT_DIR}/ directory found in {} or its parents", start.display()),
        );
        return Err(fail(output, &err));
    };

    let config: ProjectConfig = match config::load_project_config(&root) {
        Ok(config) => config,
        Err(e) => {
            let code = if e.chain().any(|cause| cause.is::<EngineError>()) {
                ErrorCode::InvalidConfig
            } else {
                ErrorCode::ConfigParseError
            };
            return Err(fail(output, &CliError::from_code(code, format!("{e:#}"))));
        }
    };

    let workspace = workspace_flag
        .map_or_else(|| config.workspace.default.clone(), str::to_string);
    let store = engine_result(output, SqliteStore::open(&db_path(&root)))?;
    let engine = engine_result(output, Engine::new(store, config))?;
    tracing::debug!(root = %root.display(), workspace = %workspace, "opened project");

    Ok(Project {
        workspace,
        engine,
    })
}

/// Render an engine failure in `output` and pass it on as `anyhow::Error`.
pub fn engine_result<T>(output: OutputMode, result: Result<T, EngineError>) -> anyhow::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => Err(fail(output, &CliError::from(&err))),
    }
}

/// Load `id`, treating items outside the selected workspace as missing.
pub fn item_in_workspace(project: &Project, id: &str, output: OutputMode) -> anyhow::Result<WorkItem> {
    let item = engine_result(output, project.engine.get(id))?;
    if item.workspace_id != project.workspace {
        tracing::debug!(
            id,
            workspace = %item.workspace_id,
            selected = %project.workspace,
            "item outside selected workspace"
        );
        return engine_result(output, Err(EngineError::NotFound(id.to_string())));
    }
    Ok(item)
}

/// Parse a `--parent` value where `none` means the top level.
pub fn parse_parent(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(trimmed.to_string())
    }
}
