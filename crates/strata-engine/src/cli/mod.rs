// crates/strata-engine/src/cli/mod.rs
// CLI module for Strata commands

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use strata::db::{DatabasePool, find_project_by_path_sync};

pub mod analyze;
pub mod history;
pub mod ingest;

pub use analyze::run_analyze;
pub use history::{run_insights, run_runs};
pub use ingest::run_ingest;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Change-pattern detection for git history")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database file (default: ~/.strata/strata.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (default: ~/.strata/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read a repository's history into the commit store
    Ingest {
        /// Repository path (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Branch, tag or sha to walk from (default: HEAD)
        #[arg(long)]
        rev: Option<String>,

        /// Stop after this many commits
        #[arg(long)]
        max_commits: Option<usize>,
    },

    /// Run pattern detection over an ingested repository
    Analyze {
        /// Repository path (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Exclusive lower bound (sha or unique prefix)
        #[arg(long)]
        from: Option<String>,

        /// Inclusive upper bound (sha or unique prefix)
        #[arg(long)]
        to: Option<String>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Do not store the run
        #[arg(long)]
        no_persist: bool,
    },

    /// List previous runs for a repository
    Runs {
        /// Repository path (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the insights of a stored run
    Insights {
        /// Run id as printed by `analyze` or `runs`
        #[arg(long)]
        run: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Path argument or the current directory
pub fn path_or_cwd(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Project id for an ingested repository
pub async fn lookup_project(pool: &DatabasePool, path: &Path) -> Result<i64> {
    let root = strata::git::repo_root(path)?;
    let root_str = root.to_string_lossy().to_string();
    let found = pool
        .interact(move |conn| find_project_by_path_sync(conn, &root_str).map_err(Into::into))
        .await?;
    found.ok_or_else(|| {
        anyhow!(
            "{} has not been ingested yet, run `strata ingest --path {}` first",
            root.display(),
            root.display()
        )
    })
}
