// crates/strata-engine/src/source.rs
// Seams between the engine and its store: read the dataset, write run results

use crate::Result;
use crate::patterns::{ChangeDataset, CommitRecord, FileStatsRow};
use async_trait::async_trait;
use strata_types::{AnalysisReport, CommitRange};

/// Read side of the commit/file-change store
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Commits in range with their changed files, ordered by (timestamp, sha)
    async fn fetch_commits(&self, project_id: i64, range: &CommitRange) -> Result<Vec<CommitRecord>>;

    /// Per-file change aggregates for the same project and range
    async fn fetch_file_stats(&self, project_id: i64, range: &CommitRange)
    -> Result<Vec<FileStatsRow>>;

    /// Both queries as one consistent snapshot.
    ///
    /// The default issues them concurrently. Stores that can read both under
    /// a single transaction should override it.
    async fn fetch_dataset(&self, project_id: i64, range: &CommitRange) -> Result<ChangeDataset> {
        let (commits, file_stats) = tokio::try_join!(
            self.fetch_commits(project_id, range),
            self.fetch_file_stats(project_id, range),
        )?;
        Ok(ChangeDataset::new(commits, file_stats))
    }
}

/// Write side for run results. Append-only per run id.
#[async_trait]
pub trait PatternSink: Send + Sync {
    async fn persist_run(&self, report: &AnalysisReport) -> Result<()>;
}
