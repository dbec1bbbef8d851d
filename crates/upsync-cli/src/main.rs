//! upsync - declarative resource synchronizer
//!
//! Usage:
//!   upsync                # Sync every entry in ./resources.json
//!   upsync sync --jobs 4  # Sync with up to four entries in flight
//!   upsync check          # Validate the manifest without fetching

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use upsync_core::config::{DEFAULT_CONFIG_FILE, SyncConfig};
use upsync_core::orchestration::{EntryStatus, SyncPlan, SyncReport};
use upsync_core::prelude::*;

#[derive(Parser)]
#[command(name = "upsync")]
#[command(about = "Sync external files and git subtrees into a project", long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize all manifest entries (default)
    Sync(SyncArgs),

    /// Validate the manifest and report what would be synchronized
    Check {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(Args, Clone)]
struct CommonArgs {
    /// Project root that manifest paths are relative to
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Manifest file (default: resources.json under the root)
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    /// Settings file (default: upsync.toml under the root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Args, Default)]
struct SyncArgs {
    /// Number of entries processed at once
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Download attempts per file entry
    #[arg(long)]
    attempts: Option<u32>,

    /// Seconds to wait between download attempts
    #[arg(long)]
    backoff: Option<u64>,

    /// Only sync entries with this name (repeatable)
    #[arg(long = "only", value_name = "NAME")]
    only: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    format: OutputFormat,

    /// List the planned entries without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() -> Result<()> {
    // Logs go to stderr so JSON reports stay parseable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upsync=info,upsync_core=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let success = match cli.command {
        Some(Commands::Check { format }) => run_check(&cli.common, format)?,
        Some(Commands::Sync(args)) => run_sync(&cli.common, args)?,
        None => run_sync(&cli.common, SyncArgs::default())?,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// Resolve the project root and merged settings.
fn load_settings(common: &CommonArgs) -> Result<(PathBuf, SyncConfig)> {
    let root = match &common.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    let config_path = common
        .config
        .clone()
        .unwrap_or_else(|| root.join(DEFAULT_CONFIG_FILE));
    let mut config = SyncConfig::load_or_default(&config_path)?;
    if let Some(manifest) = &common.manifest {
        config.manifest = manifest.clone();
    }

    Ok((root, config))
}

fn build_orchestrator(common: &CommonArgs, args: &SyncArgs) -> Result<SyncOrchestrator> {
    let (root, mut config) = load_settings(common)?;
    if let Some(jobs) = args.jobs {
        config.jobs = jobs.max(1);
    }
    if let Some(attempts) = args.attempts {
        config.retry.max_attempts = attempts.max(1);
    }
    if let Some(backoff) = args.backoff {
        config.retry.backoff_secs = backoff;
    }

    Ok(SyncOrchestrator::from_config(root, &config)?.with_only(args.only.clone()))
}

fn run_sync(common: &CommonArgs, args: SyncArgs) -> Result<bool> {
    let orchestrator = build_orchestrator(common, &args)?;

    if args.dry_run {
        let plan = orchestrator.plan()?;
        print_plan(&plan, args.format)?;
        return Ok(true);
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let report = runtime.block_on(orchestrator.run())?;

    match args.format {
        OutputFormat::Table => print_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(report.is_success())
}

fn run_check(common: &CommonArgs, format: OutputFormat) -> Result<bool> {
    let orchestrator = build_orchestrator(common, &SyncArgs::default())?;
    let plan = orchestrator.plan()?;

    if matches!(format, OutputFormat::Table) {
        println!("Manifest: {}", orchestrator.manifest_path().display());
        match GitCli::version() {
            Ok(version) => println!("Git: {}", version),
            Err(err) => println!("Git: unavailable ({:#})", err),
        }
        println!();
    }
    print_plan(&plan, format)?;

    Ok(plan.rejected.is_empty())
}

fn print_plan(plan: &SyncPlan, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = plan
                .entries
                .iter()
                .map(|(index, entry)| {
                    serde_json::json!({
                        "index": index,
                        "name": entry.name,
                        "kind": entry.kind.as_str(),
                        "path": entry.path,
                        "url": entry.url,
                    })
                })
                .collect();
            let rejected: Vec<_> = plan
                .rejected
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "index": r.index,
                        "name": r.raw.display_name(),
                        "error": r.error.to_string(),
                    })
                })
                .collect();
            let out = serde_json::json!({
                "entries": entries,
                "rejected": rejected,
                "overlaps": plan.overlaps,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            println!("Entries ({}):", plan.entries.len());
            println!("  {:<4} {:<20} {:<6} Path", "#", "Name", "Type");
            println!("  {}", "-".repeat(60));
            for (index, entry) in &plan.entries {
                println!(
                    "  {:<4} {:<20} {:<6} {}",
                    index,
                    entry.name,
                    entry.kind.as_str(),
                    entry.path.display()
                );
            }
            if !plan.rejected.is_empty() {
                println!();
                println!("Invalid entries ({}):", plan.rejected.len());
                for rejected in &plan.rejected {
                    println!(
                        "  #{} {}: {}",
                        rejected.index,
                        rejected.raw.display_name(),
                        rejected.error
                    );
                }
            }
            for (a, b) in &plan.overlaps {
                println!("warning: entries #{} and #{} overlap", a, b);
            }
        }
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("  {:<20} {:<6} {:<30} Status", "Name", "Type", "Path");
    println!("  {}", "-".repeat(70));
    for entry in &report.entries {
        let status = match entry.status {
            EntryStatus::Succeeded => "✓",
            EntryStatus::Failed => "✗",
            EntryStatus::Skipped => "-",
        };
        let detail = entry.detail.as_deref().unwrap_or("");
        println!(
            "  {:<20} {:<6} {:<30} {} {}",
            entry.name, entry.kind, entry.path, status, detail
        );
    }
    println!();
    println!(
        "Summary: {} succeeded, {} failed, {} skipped",
        report.succeeded, report.failed, report.skipped
    );
}
