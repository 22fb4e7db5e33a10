// crates/strata-engine/src/patterns/dataset.rs
// In-memory dataset shared read-only by the analyzers of one run

use serde::{Deserialize, Serialize};

/// A commit with the files it touched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    /// Empty when the store has no author for the row
    pub author_email: String,
    pub author_name: String,
    /// Unix seconds, UTC
    pub timestamp: i64,
    /// Author's UTC offset at commit time
    pub tz_offset_minutes: i32,
    pub commit_type: String,
    pub summary: String,
    pub insertions: i64,
    pub deletions: i64,
    pub files_changed: i64,
    pub files: Vec<FileChange>,
}

impl CommitRecord {
    pub fn total_lines(&self) -> i64 {
        self.insertions + self.deletions
    }

    pub fn has_author(&self) -> bool {
        !self.author_email.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub lines_added: i64,
    pub lines_removed: i64,
}

/// Per-file aggregates from the store.
///
/// Sums rather than mean/stddev so any store can answer with plain SQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStatsRow {
    pub path: String,
    pub change_count: i64,
    pub contributor_count: i64,
    pub lines_sum: f64,
    pub lines_sq_sum: f64,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
}

/// Everything one run analyzes, fetched once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeDataset {
    /// Ordered by (timestamp, sha)
    pub commits: Vec<CommitRecord>,
    pub file_stats: Vec<FileStatsRow>,
}

impl ChangeDataset {
    pub fn new(mut commits: Vec<CommitRecord>, file_stats: Vec<FileStatsRow>) -> Self {
        commits.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.sha.cmp(&b.sha)));
        Self {
            commits,
            file_stats,
        }
    }
}

/// Patterns produced by one analyzer plus the records it had to skip
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerOutput<T> {
    pub patterns: Vec<T>,
    pub skipped: usize,
}

impl<T> Default for AnalyzerOutput<T> {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            skipped: 0,
        }
    }
}
