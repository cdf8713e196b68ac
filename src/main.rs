//! `depsolve` demonstration binary.
//!
//! This crate's public surface is the library (see `lib.rs`); this binary is a thin
//! `clap`-derived front-end exercising it end to end. It is deliberately minimal — a
//! production CLI front-end is a Non-goal of this crate.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use depsolve::config::Config;
use depsolve::core::GoImportAnalyzer;
use depsolve::manifest::RootManifest;
use depsolve::solver::{self, SolverInput};
use depsolve::source::SourceManager;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "depsolve", about = "Dependency resolver for source-based package ecosystems", version)]
struct Cli {
    /// Enable debug-level logging regardless of `RUST_LOG`.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a root project tree's dependencies into a lock, printed as JSON.
    Resolve {
        /// Filesystem root of the project to resolve.
        root_dir: PathBuf,
        /// Import path the root tree is rooted at (e.g. `example.com/org/project`).
        root_import_path: String,
        /// Path to a JSON-encoded `RootManifest` declaring the root's dependencies.
        #[arg(long)]
        manifest: PathBuf,
        /// Directory backing the source cache. Defaults to the process-wide default.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Prefer the lowest satisfying version for every project instead of the highest.
        #[arg(long)]
        downgrade: bool,
        /// Project roots whose lock entry should be ignored, forcing a fresh search.
        #[arg(long = "force-update")]
        force_update: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("off")
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_thread_ids(false).init();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match run(cli.command).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            std::process::exit(1);
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Resolve { root_dir, root_import_path, manifest, cache_dir, downgrade, force_update } => {
            let manifest_contents = tokio::fs::read_to_string(&manifest).await.map_err(|e| anyhow::anyhow!("reading {}: {e}", manifest.display()))?;
            let root_manifest: RootManifest = serde_json::from_str(&manifest_contents).map_err(|e| anyhow::anyhow!("parsing {}: {e}", manifest.display()))?;

            let mut config = Config::default_for_process();
            if let Some(dir) = cache_dir {
                config.cache_dir = dir;
            }

            let source_manager = SourceManager::new(config).await?;
            let analyzer = GoImportAnalyzer;
            let force_update: BTreeSet<String> = force_update.into_iter().collect();
            let cancel = CancellationToken::new();

            let input = SolverInput {
                root_dir: &root_dir,
                root_import_path: &root_import_path,
                root_manifest: &root_manifest,
                existing_lock: None,
                downgrade,
                force_update: &force_update,
            };

            match solver::resolve(&source_manager, &analyzer, input, &cancel).await? {
                Ok(lock) => {
                    println!("{}", serde_json::to_string_pretty(&lock)?);
                    Ok(())
                }
                Err(depsolve::core::Cancelled) => Err(anyhow::anyhow!("resolution cancelled")),
            }
        }
    }
}
