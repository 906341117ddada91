//! # ssdbench CLI
//!
//! Run with: `cargo run --release --bin ssdbench -- run --profile quick --workspace /mnt/ssd/bench`

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ssdbench_core::BenchConfig;
use ssdbench_runner::{select_phases, standard_phases, Driver, PhaseContext, Reporter, PHASE_NAMES};

#[derive(Parser)]
#[command(name = "ssdbench")]
#[command(version, about = "ssdbench - staged filesystem and record-store benchmark")]
struct Cli {
    /// Log filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark phases
    Run(RunArgs),
    /// List phase names in run order
    Phases,
}

#[derive(clap::Args, Default)]
struct RunArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Workload preset used when no config file is given
    #[arg(long, value_enum, default_value_t = Profile::Full)]
    profile: Profile,

    /// Workspace root, overrides the configured one
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Comma-separated subset of phases to run
    #[arg(long, value_delimiter = ',')]
    phases: Vec<String>,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum Profile {
    Quick,
    #[default]
    Full,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Some(Commands::Phases) => {
            for name in PHASE_NAMES {
                println!("{}", name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Run(args)) => run(args).await,
        None => run(RunArgs::default()).await,
    }
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => BenchConfig::from_file(path)?,
        None => match args.profile {
            Profile::Quick => BenchConfig::quick(),
            Profile::Full => BenchConfig::default(),
        },
    };
    if let Some(root) = args.workspace {
        config.workspace.root = root;
    }
    config.validate()?;

    info!(root = ?config.workspace.root, "Starting ssdbench {}", ssdbench_core::VERSION);

    let ctx = PhaseContext::new(config);
    let phases = if args.phases.is_empty() {
        standard_phases(&ctx)
    } else {
        select_phases(&ctx, &args.phases)?
    };

    let mut driver = Driver::new();
    let outcome = driver.run(phases).await;

    print!("{}", Reporter::render(driver.results()));
    info!(metrics = ?ctx.metrics.snapshot(), "Run metrics");

    if let Err(e) = outcome {
        error!(code = e.error_code(), "{}", e);
        eprintln!("{}", Reporter::render_failure(&e));
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
