mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, flow::FlowSubcommand, relationship::RelationshipSubcommand,
    step::StepSubcommand, workflow::WorkflowSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "specflow",
    about = "Field-mapping data flow between guided workflow steps",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .specflow/)
    #[arg(long, global = true, env = "SPECFLOW_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Enable debug logging
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize specflow in the current directory
    Init {
        /// Human-readable project name stored in config
        name: String,
    },

    /// Create and inspect project workflows
    Workflow {
        #[command(subcommand)]
        subcommand: WorkflowSubcommand,
    },

    /// Manage field mapping relationships
    Relationship {
        #[command(subcommand)]
        subcommand: RelationshipSubcommand,
    },

    /// Seed the built-in relationships for a project (idempotent)
    Seed { project_id: String },

    /// Run data flow between two steps
    Flow {
        #[command(subcommand)]
        subcommand: FlowSubcommand,
    },

    /// Inspect and complete step response documents
    Step {
        #[command(subcommand)]
        subcommand: StepSubcommand,
    },

    /// Validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, &name, cli.json),
        Commands::Workflow { subcommand } => cmd::workflow::run(&root, subcommand, cli.json),
        Commands::Relationship { subcommand } => {
            cmd::relationship::run(&root, subcommand, cli.json)
        }
        Commands::Seed { project_id } => cmd::seed::run(&root, &project_id, cli.json),
        Commands::Flow { subcommand } => cmd::flow::run(&root, subcommand, cli.json),
        Commands::Step { subcommand } => cmd::step::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
