mod cmd;
mod output;

use agent_runner::RunnerError;
use clap::{Parser, Subcommand};
use cmd::{ab::AbArgs, compare::CompareArgs, run::RunArgs, verify::VerifyTarget};
use harness_core::HarnessError;
use output::Output;
use std::path::PathBuf;

/// Exit code for bad invocation, missing files or dependencies, invalid config.
pub const EXIT_USAGE: i32 = 2;

#[derive(Parser)]
#[command(
    name = "harness",
    about = "Run headless coding-agent sessions, compare prompt variants, and verify session logs",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: ./harness.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Only print errors and failed checks
    #[arg(long, global = true, short = 'q')]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one agent session and capture its log
    Run(RunArgs),

    /// Run two prompt variants and write a comparison report
    Ab(AbArgs),

    /// Rebuild a comparison report from recorded session files
    Compare(CompareArgs),

    /// Assert facts about a recorded session log
    Verify {
        #[command(subcommand)]
        target: VerifyTarget,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.quiet {
        tracing::Level::ERROR
    } else {
        match &cli.command {
            Commands::Run(_) | Commands::Ab(_) => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let out = Output {
        json: cli.json,
        quiet: cli.quiet,
    };
    let config = cli.config.as_deref();

    // Harness I/O failures are exit 1 for runs, exit 2 ("bad invocation") for verify.
    let (result, fallback) = match cli.command {
        Commands::Run(args) => (cmd::run::run(config, args, out), 1),
        Commands::Ab(args) => (cmd::ab::run(config, args, out), 1),
        Commands::Compare(args) => (cmd::compare::run(config, args, out), 1),
        Commands::Verify { target } => (cmd::verify::run(target, out), EXIT_USAGE),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Print the full error chain (anyhow's alternate Display)
            eprintln!("error: {e:#}");
            std::process::exit(exit_code_for(&e, fallback));
        }
    }
}

fn exit_code_for(err: &anyhow::Error, fallback: i32) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<RunnerError>() {
            if e.is_config() || matches!(e, RunnerError::Config(inner) if is_usage(inner)) {
                return EXIT_USAGE;
            }
        }
        if let Some(e) = cause.downcast_ref::<HarnessError>() {
            if is_usage(e) {
                return EXIT_USAGE;
            }
        }
    }
    fallback
}

fn is_usage(e: &HarnessError) -> bool {
    e.is_config() || matches!(e, HarnessError::SessionNotFound(_))
}
