#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, Reported};
use std::env;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use trellis_core::config;
use trellis_core::error::ErrorCode;

#[derive(Parser, Debug)]
#[command(
    name = "tl",
    author,
    version,
    about = "trellis: ordered epic/feature/story/task hierarchies",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (pretty, text, json).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Workspace to operate on (default: workspace.default from config).
    #[arg(short, long, global = true)]
    workspace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        let user_output = config::load_user_config()
            .map_err(|e| debug!(error = %e, "ignoring unreadable user config"))
            .ok()
            .and_then(|user| user.output);
        output::resolve_output_mode(self.format, self.json, user_output.as_deref())
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Project",
        about = "Initialize a trellis project",
        long_about = "Create .trellis/ with a default config and an empty store.",
        after_help = "EXAMPLES:\n    tl init\n    tl init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Items",
        about = "Create a work item",
        long_about = "Create an epic, feature, story or task, optionally under a parent and at a position.",
        after_help = "EXAMPLES:\n    tl create -k epic -t \"Checkout\"\n    tl create -k feature -t \"Payments\" -p wi-0123456789\n    tl create -k task -t \"Write tests\" -p wi-0123456789 --position 0"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Items",
        about = "Edit title, description or status",
        after_help = "EXAMPLES:\n    tl update wi-0123456789 --status done"
    )]
    Update(cmd::update::UpdateArgs),

    #[command(
        next_help_heading = "Items",
        about = "Reparent and/or reorder an item",
        long_about = "Move an item under a new parent (or `none` for the top level) at a zero-based index.",
        after_help = "EXAMPLES:\n    tl move wi-0123456789 --parent wi-abcdef0123 --index 0\n    tl move wi-0123456789 --parent none"
    )]
    Move(cmd::move_cmd::MoveArgs),

    #[command(
        next_help_heading = "Items",
        about = "Delete an item without children"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the workspace hierarchy",
        long_about = "Rebuild the ordered tree for the workspace. Records that cannot be placed are listed separately.",
        after_help = "EXAMPLES:\n    tl tree\n    tl tree --flat --format json"
    )]
    Tree(cmd::tree::TreeArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one item with its path and children"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Project",
        about = "Respace the order keys of one sibling group",
        after_help = "EXAMPLES:\n    tl normalize\n    tl normalize --parent wi-0123456789"
    )]
    Normalize(cmd::normalize::NormalizeArgs),

    #[command(
        next_help_heading = "Project",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    tl completions bash > /usr/share/bash-completion/completions/tl"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TRELLIS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "trellis=debug,info"
        } else {
            "trellis=info,warn"
        })
    });

    let format = env::var("TRELLIS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, output: OutputMode) -> anyhow::Result<()> {
    let cwd = env::current_dir()?;
    let workspace = cli.workspace.as_deref();

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, &cwd, output),
        Commands::Create(args) => {
            let mut project = cmd::open_project(&cwd, workspace, output)?;
            cmd::create::run_create(args, &mut project, output)
        }
        Commands::Update(args) => {
            let mut project = cmd::open_project(&cwd, workspace, output)?;
            cmd::update::run_update(args, &mut project, output)
        }
        Commands::Move(args) => {
            let mut project = cmd::open_project(&cwd, workspace, output)?;
            cmd::move_cmd::run_move(args, &mut project, output)
        }
        Commands::Delete(args) => {
            let mut project = cmd::open_project(&cwd, workspace, output)?;
            cmd::delete::run_delete(args, &mut project, output)
        }
        Commands::Tree(args) => {
            let project = cmd::open_project(&cwd, workspace, output)?;
            cmd::tree::run_tree(args, &project, output)
        }
        Commands::Show(args) => {
            let project = cmd::open_project(&cwd, workspace, output)?;
            cmd::show::run_show(args, &project, output)
        }
        Commands::Normalize(args) => {
            let mut project = cmd::open_project(&cwd, workspace, output)?;
            cmd::normalize::run_normalize(args, &mut project, output)
        }
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = cli.output_mode();
    match run(&cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is::<Reported>() => {
            debug!(error = %e, "command failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            let err = CliError::from_code(ErrorCode::InternalUnexpected, format!("{e:#}"));
            // Nothing else can be done if stderr itself is gone.
            let _ = output::render_error(output, &err);
            ExitCode::FAILURE
        }
    }
}
