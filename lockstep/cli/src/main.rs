//! Lockstep CLI - reconcile dependency-bot branches in CI

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use lockstep_lib::changelog::{AggregateOutcome, ChangelogAggregator};
use lockstep_lib::config::{DEFAULT_CONFIG_FILE, LockstepConfig};
use lockstep_lib::lockfile::{DiffOutcome, UpgradeDiffer, render_summary};
use lockstep_lib::manifest::{ConstraintRelaxer, RelaxOutcome, RuleTable};
use lockstep_lib::migrations::{MigrationConflictResolver, MigrationOutcome};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status of `lockstep migrations` when duplicates were removed.
const EXIT_FIXED: u8 = 1;
/// Any error, in every subcommand.
const EXIT_ERROR: u8 = 2;
/// Exit status of `lockstep migrations` when there is no migration directory.
const EXIT_NO_DIRECTORY: u8 = 3;

#[derive(Parser)]
#[command(name = "lockstep")]
#[command(version)]
#[command(about = "Reconcile dependency-bot branches: migrations, manifest constraints, upgrades and changelogs", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    log_verbosity: u8,

    /// Output logs and outcomes as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (defaults to ./lockstep.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove stale duplicate schema migrations
    ///
    /// Exits 0 when clean, 1 when files were removed, 3 when there is no
    /// migration directory.
    Migrations {
        /// Migration directory
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Report the resolution plan without deleting anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Widen manifest constraints that reject the locked versions
    Relax {
        /// Manifest file
        #[arg(long, value_name = "PATH")]
        manifest: Option<PathBuf>,
    },

    /// Diff two lockfiles and write the upgrade artifact
    Diff {
        /// Lockfile before the upgrade
        #[arg(long, value_name = "PATH")]
        old: Option<PathBuf>,

        /// Lockfile after the upgrade
        #[arg(long, value_name = "PATH")]
        new: Option<PathBuf>,

        /// Upgrade artifact to write
        #[arg(long, value_name = "PATH")]
        artifact: Option<PathBuf>,
    },

    /// Collect release notes for every upgrade in the artifact
    Changelog {
        /// Upgrade artifact to read
        #[arg(long, value_name = "PATH")]
        artifact: Option<PathBuf>,

        /// Report file to write
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8, json: bool) {
    // RUST_LOG wins over -v flags
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            // Default: WARN only to reduce stderr noise
            0 => "warn".to_string(),
            // -v: Show INFO for each job's progress
            1 => "warn,lockstep_lib=info,lockstep=info".to_string(),
            2 => "info,lockstep_lib=debug,lockstep=debug".to_string(),
            _ => "debug,lockstep_lib=trace,lockstep=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    if json {
        // JSON output for structured log processing
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_file(verbose >= 3)
                    .with_line_number(verbose >= 3)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}

/// Explicit `--config` must exist; the implicit default file is optional.
fn load_config(path: Option<&Path>) -> Result<LockstepConfig> {
    match path {
        Some(path) => LockstepConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => LockstepConfig::load_or_default(Path::new(DEFAULT_CONFIG_FILE))
            .context("Failed to load lockstep.toml"),
    }
}

/// Config token first, then the conventional CI variables. Blank values are skipped.
fn resolve_token(configured: Option<String>) -> Option<String> {
    let non_blank = |token: Option<String>| token.filter(|t| !t.trim().is_empty());

    non_blank(configured)
        .or_else(|| non_blank(std::env::var("GH_TOKEN").ok()))
        .or_else(|| non_blank(std::env::var("GITHUB_TOKEN").ok()))
}

fn emit_json<T: Serialize>(outcome: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}

fn migrations(
    config: &LockstepConfig,
    dir: Option<PathBuf>,
    dry_run: bool,
    json: bool,
) -> Result<u8> {
    let resolver = MigrationConflictResolver::new(dir.unwrap_or_else(|| config.migrations.dir.clone()))
        .with_extension(config.migrations.extension.as_str())
        .dry_run(dry_run);

    let outcome = resolver
        .run()
        .with_context(|| format!("Failed to resolve migrations in {}", resolver.dir().display()))?;

    if json {
        emit_json(&outcome)?;
    } else {
        print_migrations(&outcome);
    }

    Ok(match outcome {
        MigrationOutcome::NoDirectory { .. } => EXIT_NO_DIRECTORY,
        ref fixed if fixed.has_changes() => EXIT_FIXED,
        _ => 0,
    })
}

fn print_migrations(outcome: &MigrationOutcome) {
    match outcome {
        MigrationOutcome::NoDirectory { dir } => {
            println!("No migration directory at {}, nothing to do", dir.display());
        }
        MigrationOutcome::Clean { scanned, unrecognized } => {
            println!("No duplicate migrations ({} scanned)", scanned);
            print_unrecognized(unrecognized);
        }
        MigrationOutcome::Fixed {
            resolutions,
            unrecognized,
            dry_run,
        } => {
            let verb = if *dry_run { "Would remove" } else { "Removed" };
            for resolution in resolutions {
                println!(
                    "{} duplicate {}: {} (kept {})",
                    verb,
                    resolution.identifier,
                    resolution.removed.display(),
                    resolution.kept.display()
                );
            }
            print_unrecognized(unrecognized);
        }
    }
}

fn print_unrecognized(paths: &[PathBuf]) {
    for path in paths {
        println!("Skipped (no migration declaration): {}", path.display());
    }
}

fn relax(config: &LockstepConfig, manifest: Option<PathBuf>, json: bool) -> Result<u8> {
    let rules = RuleTable::compile(&config.manifest.rules).context("Invalid relaxation rule")?;
    let relaxer =
        ConstraintRelaxer::new(manifest.unwrap_or_else(|| config.manifest.path.clone()), rules);

    let outcome = relaxer
        .run()
        .with_context(|| format!("Failed to relax {}", relaxer.manifest().display()))?;

    if json {
        emit_json(&outcome)?;
    } else {
        match &outcome {
            RelaxOutcome::Unchanged { manifest } => {
                println!("{} already accepts the locked versions", manifest.display());
            }
            RelaxOutcome::Rewritten { manifest, applied } => {
                println!("Relaxed {} ({})", manifest.display(), applied.join(", "));
            }
        }
    }
    Ok(0)
}

fn diff(
    config: &LockstepConfig,
    old: Option<PathBuf>,
    new: Option<PathBuf>,
    artifact: Option<PathBuf>,
    json: bool,
) -> Result<u8> {
    let differ = UpgradeDiffer::new(
        old.unwrap_or_else(|| config.lockfile.old.clone()),
        new.unwrap_or_else(|| config.lockfile.new.clone()),
        artifact.unwrap_or_else(|| config.lockfile.artifact.clone()),
    );

    let outcome: DiffOutcome = differ.run().context("Failed to diff lockfiles")?;

    if json {
        emit_json(&outcome)?;
    } else {
        print!("{}", render_summary(&outcome.records));
    }
    Ok(0)
}

async fn changelog(
    mut config: LockstepConfig,
    artifact: Option<PathBuf>,
    report: Option<PathBuf>,
    json: bool,
) -> Result<u8> {
    let artifact = artifact.unwrap_or_else(|| config.lockfile.artifact.clone());
    let report = report.unwrap_or_else(|| config.changelog.report.clone());
    config.changelog.token = resolve_token(config.changelog.token.take());

    let aggregator =
        ChangelogAggregator::from_config(&config.changelog).context("Failed to build HTTP client")?;

    let outcome = aggregator
        .run(&artifact, &report)
        .await
        .context("Failed to aggregate changelogs")?;

    if json {
        emit_json(&outcome)?;
    } else {
        match &outcome {
            AggregateOutcome::NoArtifact { .. } => println!("No upgrades file found"),
            AggregateOutcome::NoUpgrades { artifact } => {
                println!("No upgrades listed in {}", artifact.display());
            }
            AggregateOutcome::Written { report, entries } => {
                println!("Wrote {} changelog entries to {}", entries.len(), report.display());
            }
        }
    }
    Ok(0)
}

async fn run(cli: Cli) -> Result<u8> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Migrations { dir, dry_run } => migrations(&config, dir, dry_run, cli.json),
        Commands::Relax { manifest } => relax(&config, manifest, cli.json),
        Commands::Diff { old, new, artifact } => diff(&config, old, new, artifact, cli.json),
        Commands::Changelog { artifact, report } => {
            changelog(config, artifact, report, cli.json).await
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_verbosity, cli.json);

    if let Err(e) = color_eyre::install() {
        tracing::warn!(error = %e, "Failed to install error report handler");
    }

    tracing::debug!("Lockstep CLI starting");

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
