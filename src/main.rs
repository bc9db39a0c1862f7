mod config;
mod discovery;
mod engine;
mod error;
mod git;
mod java_source;
mod mapping;
mod report;
mod scanner;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use config::{Config, StrategyKind};
use engine::AnalysisEngine;
use mapping::ChangeSet;
use report::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "affected-tests",
    version,
    about = "Test impact analysis - pick the test classes affected by a change",
    long_about = "Maps changed Java sources to the test classes that exercise them (naming conventions, imports, implementations, reverse dependencies) so CI runs only what a change can break."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the affected test classes for the current changes
    Run(RunArgs),

    /// Show the effective configuration
    Config {
        /// Project directory (defaults to current)
        #[arg(default_value = ".")]
        project: PathBuf,

        /// Config file (defaults to <project>/affected-tests.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Project directory (defaults to current)
    #[arg(default_value = ".")]
    project: PathBuf,

    /// Config file (defaults to <project>/affected-tests.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Branch, tag or SHA to compare HEAD against
    #[arg(long)]
    base_ref: Option<String>,

    /// Ignore unstaged working tree changes
    #[arg(long)]
    no_uncommitted: bool,

    /// Ignore staged changes
    #[arg(long)]
    no_staged: bool,

    /// Request the full suite when nothing matches
    #[arg(long)]
    run_all_if_no_matches: bool,

    /// Strategies to run (repeatable); replaces the configured list
    #[arg(short, long = "strategy", value_enum)]
    strategies: Vec<StrategyKind>,

    /// Transitive depth (0 disables, capped at 5)
    #[arg(short, long)]
    depth: Option<i32>,

    /// Changed paths relative to the project; skips git change detection
    #[arg(long)]
    changed: Vec<String>,

    /// Output format: text, json, gradle
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(base_ref) = &self.base_ref {
            config.base_ref = base_ref.clone();
        }
        if self.no_uncommitted {
            config.include_uncommitted = false;
        }
        if self.no_staged {
            config.include_staged = false;
        }
        if self.run_all_if_no_matches {
            config.run_all_if_no_matches = true;
        }
        if !self.strategies.is_empty() {
            config.strategies = self.strategies.clone();
        }
        if let Some(depth) = self.depth {
            config.transitive_depth = depth;
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("affected_tests={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = Config::load(&args.project, args.config.as_deref())?;
    args.apply(&mut config);

    let engine = AnalysisEngine::new(config, &args.project)?;
    let result = if args.changed.is_empty() {
        engine.run()?
    } else {
        let changes: ChangeSet = args.changed.iter().cloned().collect();
        engine.analyze(&changes)
    };

    if result.run_all && args.format == OutputFormat::Gradle {
        eprintln!("no affected tests matched: run the full test task");
    }
    print!("{}", report::render(&result, args.format)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(args) => run(args)?,
        Commands::Config {
            project,
            config: config_path,
        } => {
            config::show_config(&project, config_path.as_deref())?;
        }
    }

    Ok(())
}
