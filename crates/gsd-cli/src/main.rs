mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gsd-dash",
    about = "Live dashboard for GSD .planning/ directories: phases, progress, velocity and todos",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: nearest ancestor with a .planning/ directory)
    #[arg(long, global = true, env = "GSD_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show position, progress, velocity and warnings
    Status,

    /// List roadmap phases with the current phase marked
    Phases,

    /// List pending and completed todos
    Todos,

    /// Print a document of the current phase
    Doc {
        /// context, research, plan, verification or summary
        kind: String,
    },

    /// Keep rebuilding on file changes and print every new snapshot
    Watch {
        /// Periodic refresh in seconds (0 disables; default from dashboard.yaml)
        #[arg(long)]
        interval: Option<u64>,

        /// Start with auto-refresh off (manual `r` still works)
        #[arg(long)]
        no_auto_refresh: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Watch { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
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
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Phases => cmd::phases::run(&root, cli.json),
        Commands::Todos => cmd::todos::run(&root, cli.json),
        Commands::Doc { kind } => cmd::doc::run(&root, &kind, cli.json),
        Commands::Watch {
            interval,
            no_auto_refresh,
        } => cmd::watch::run(&root, interval, no_auto_refresh, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        let not_a_project = e
            .downcast_ref::<gsd_core::GsdError>()
            .map(gsd_core::GsdError::is_fatal)
            .unwrap_or(false);
        std::process::exit(if not_a_project { 2 } else { 1 });
    }
}
