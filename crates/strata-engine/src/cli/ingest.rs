// crates/strata-engine/src/cli/ingest.rs
// Repository ingestion command

use super::path_or_cwd;
use anyhow::Result;
use std::path::{Path, PathBuf};
use strata::db::DatabasePool;
use strata::git::{IngestOptions, ingest_repository};

pub async fn run_ingest(
    db_path: &Path,
    path: Option<PathBuf>,
    rev: Option<String>,
    max_commits: Option<usize>,
) -> Result<()> {
    let path = path_or_cwd(path);
    let pool = DatabasePool::open(db_path).await?;

    let summary = ingest_repository(&pool, &path, IngestOptions { rev, max_commits }).await?;

    println!(
        "Ingested {} new commits ({} scanned, {} stored) from {}",
        summary.inserted,
        summary.scanned,
        summary.stored,
        summary.repo_root.display()
    );
    Ok(())
}
