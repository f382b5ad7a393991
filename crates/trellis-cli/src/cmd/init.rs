//! `tl init`: create the project directory, config and store.

use crate::cmd::{db_path, engine_result};
use crate::output::{CliError, OutputMode, fail, render};
use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::path::Path;
use trellis_core::config::{PROJECT_DIR, default_config_toml};
use trellis_core::store::SqliteStore;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite config.toml even if `.trellis/` already exists.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "trellis.db\ntrellis.db-wal\ntrellis.db-shm\n";

#[derive(Debug, Serialize)]
struct InitResult {
    ok: bool,
    path: String,
}

/// Execute `tl init`. Creates:
///
/// ```text
/// .trellis/
///   config.toml   (default project config)
///   .gitignore    (database files)
///   trellis.db    (migrated SQLite store)
/// ```
///
/// An existing store is opened and migrated, never recreated.
///
/// # Errors
///
/// Returns an error if `.trellis/` already exists and `--force` is not set,
/// or if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    let dir = project_root.join(PROJECT_DIR);

    if dir.exists() && !args.force {
        let err = CliError {
            message: format!("{PROJECT_DIR}/ already exists in {}", project_root.display()),
            suggestion: Some("Use `tl init --force` to rewrite the default config.".to_string()),
            error_code: None,
        };
        return Err(fail(output, &err));
    }

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, default_config_toml())
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let gitignore_path = dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write {}", gitignore_path.display()))?;

    engine_result(output, SqliteStore::open(&db_path(project_root)))?;
    tracing::info!(path = %dir.display(), "initialized project");

    let result = InitResult {
        ok: true,
        path: dir.display().to_string(),
    };
    render(output, &result, |r, w| {
        writeln!(w, "✓ Initialized trellis project in {}", r.path)
    })
}
