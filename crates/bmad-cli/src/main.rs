mod cmd;
mod output;
mod root;
mod runner;

use clap::{Parser, Subcommand};
use cmd::checkpoint::CheckpointSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bmad-automate",
    about = "Drive BMAD stories from their sprint status to done with Claude",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .bmad/, _bmad-output/ or .git/)
    #[arg(long, global = true, env = "BMAD_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the remaining lifecycle of one story
    ///
    /// backlog → create-story → dev-story → code-review → git-commit → done;
    /// later statuses pick up part-way. Status is written to
    /// sprint-status.yaml after each successful workflow.
    Run {
        story: String,
        /// Show the workflows that would run without running them
        #[arg(long)]
        dry_run: bool,
        /// Continue an interrupted run (requires a checkpoint)
        #[arg(long, conflicts_with = "dry_run")]
        resume: bool,
    },

    /// Run several stories to completion, in order
    Queue {
        #[arg(required = true)]
        stories: Vec<String>,
        #[arg(long)]
        dry_run: bool,
    },

    /// Run every story of an epic ({epic}-{N}-*) in story-number order
    Epic {
        epic_id: String,
        #[arg(long)]
        dry_run: bool,
    },

    /// Send a one-off prompt to claude, without status routing
    Raw {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
        prompt: Vec<String>,
    },

    /// Show story statuses and the next workflow for each
    Status {
        /// Single story (omit for the whole sprint)
        story: Option<String>,
    },

    /// Inspect or remove records of interrupted runs
    Checkpoint {
        #[command(subcommand)]
        subcommand: CheckpointSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    tracing::debug!(root = %root.display(), "resolved project root");

    let result = match cli.command {
        Commands::Run {
            story,
            dry_run,
            resume,
        } => cmd::run::run(&root, &story, dry_run, resume, cli.json),
        Commands::Queue { stories, dry_run } => cmd::queue::run(&root, &stories, dry_run, cli.json),
        Commands::Epic { epic_id, dry_run } => cmd::epic::run(&root, &epic_id, dry_run, cli.json),
        Commands::Raw { prompt } => cmd::raw::run(&root, &prompt.join(" ")),
        Commands::Status { story } => cmd::status::run(&root, story.as_deref(), cli.json),
        Commands::Checkpoint { subcommand } => cmd::checkpoint::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(cmd::exit_code(&e));
    }
}
