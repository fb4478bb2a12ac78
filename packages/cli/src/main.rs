use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use fedstore_federation::GatewayConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

mod commands;

/// fedstore - inspect path patterns and federated workspaces
#[derive(Parser, Debug)]
#[command(name = "fedstore")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log more; repeat for more detail. RUST_LOG overrides this.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Match paths against a path expression
    Match {
        expression: String,
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Show an expression with its predicates stripped
    Strip { expression: String },
    /// Show which projections a federated path resolves to
    Resolve {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        workspace: Option<String>,
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Read paths as one batch from an in-memory federation
    Read {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        workspace: Option<String>,
        /// Node to create before reading, as `source:workspace:/path`
        #[arg(long = "node")]
        nodes: Vec<String>,
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Cmd) -> commands::Result<()> {
    let mut out = std::io::stdout().lock();
    match command {
        Cmd::Match { expression, paths } => commands::match_paths(&expression, &paths, &mut out),
        Cmd::Strip { expression } => commands::strip(&expression, &mut out),
        Cmd::Resolve {
            config,
            workspace,
            paths,
        } => {
            let config = GatewayConfig::from_path(&config)?;
            commands::resolve(&config, workspace.as_deref(), &paths, &mut out)
        }
        Cmd::Read {
            config,
            workspace,
            nodes,
            paths,
        } => {
            let config = GatewayConfig::from_path(&config)?;
            commands::read(config, workspace.as_deref(), &nodes, &paths, &mut out)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
