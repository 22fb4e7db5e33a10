// crates/strata-engine/src/db/commits.rs
// Commit and file-change storage, plus the two dataset queries a run issues

use super::pool::DatabasePool;
use crate::error::{Result, StrataError};
use crate::patterns::{ChangeDataset, CommitRecord, FileChange, FileStatsRow};
use crate::source::ChangeSource;
use async_trait::async_trait;
use rusqlite::{Connection, params};
use std::collections::HashMap;
use strata_types::CommitRange;

/// Insert a commit and its file changes. Returns false if the sha was already stored.
pub fn insert_commit_sync(
    conn: &Connection,
    project_id: i64,
    commit: &CommitRecord,
) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO commits
            (project_id, sha, author_email, author_name, timestamp, tz_offset_minutes,
             commit_type, summary, insertions, deletions, files_changed)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            project_id,
            commit.sha,
            commit.author_email,
            commit.author_name,
            commit.timestamp,
            commit.tz_offset_minutes,
            commit.commit_type,
            commit.summary,
            commit.insertions,
            commit.deletions,
            commit.files_changed,
        ],
    )?;
    if inserted == 0 {
        return Ok(false);
    }

    let commit_id = conn.last_insert_rowid();
    let mut stmt = conn.prepare_cached(
        "INSERT INTO file_changes (commit_id, file_path, lines_added, lines_removed)
         VALUES (?, ?, ?, ?)",
    )?;
    for file in &commit.files {
        stmt.execute(params![
            commit_id,
            file.path,
            file.lines_added,
            file.lines_removed
        ])?;
    }
    Ok(true)
}

/// Insert a batch of commits in one transaction, returning how many were new
pub fn insert_commits_sync(
    conn: &Connection,
    project_id: i64,
    commits: &[CommitRecord],
) -> rusqlite::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0;
    for commit in commits {
        if insert_commit_sync(&tx, project_id, commit)? {
            inserted += 1;
        }
    }
    tx.commit()?;
    Ok(inserted)
}

pub fn count_commits_sync(conn: &Connection, project_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM commits WHERE project_id = ?",
        [project_id],
        |row| row.get(0),
    )
}

/// Position of a commit in store order
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CommitPosition {
    pub timestamp: i64,
    pub sha: String,
}

/// Window a commit range resolves to, in (timestamp, sha) order: `after < c <= until`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitBounds {
    pub after: Option<CommitPosition>,
    pub until: Option<CommitPosition>,
}

impl CommitBounds {
    /// Bind values for the `?2..?5` placeholders of the range filter
    fn params(&self) -> (Option<i64>, Option<&str>, Option<i64>, Option<&str>) {
        (
            self.after.as_ref().map(|p| p.timestamp),
            self.after.as_ref().map(|p| p.sha.as_str()),
            self.until.as_ref().map(|p| p.timestamp),
            self.until.as_ref().map(|p| p.sha.as_str()),
        )
    }
}

/// Row filter shared by both dataset queries; `c` is the commits table
const RANGE_FILTER: &str = "c.project_id = ?1
           AND (?2 IS NULL OR (c.timestamp, c.sha) > (?2, ?3))
           AND (?4 IS NULL OR (c.timestamp, c.sha) <= (?4, ?5))";

/// Resolve a full sha or unique prefix to its position
fn resolve_sha(conn: &Connection, project_id: i64, sha: &str) -> Result<CommitPosition> {
    let sha = sha.trim();
    if sha.len() < 4 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(StrataError::InvalidInput(format!("not a commit sha: '{}'", sha)));
    }

    let mut stmt = conn.prepare(
        "SELECT timestamp, sha FROM commits WHERE project_id = ?1 AND sha LIKE ?2 || '%' LIMIT 2",
    )?;
    let mut matches: Vec<CommitPosition> = stmt
        .query_map(params![project_id, sha.to_lowercase()], |row| {
            Ok(CommitPosition {
                timestamp: row.get(0)?,
                sha: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(StrataError::InvalidInput(format!("unknown commit: {}", sha))),
        _ => Err(StrataError::InvalidInput(format!("ambiguous commit prefix: {}", sha))),
    }
}

pub fn resolve_range_sync(
    conn: &Connection,
    project_id: i64,
    range: &CommitRange,
) -> Result<CommitBounds> {
    let after = range
        .from
        .as_deref()
        .map(|sha| resolve_sha(conn, project_id, sha))
        .transpose()?;
    let until = range
        .to
        .as_deref()
        .map(|sha| resolve_sha(conn, project_id, sha))
        .transpose()?;

    if let (Some(a), Some(u)) = (&after, &until)
        && a > u
    {
        return Err(StrataError::InvalidInput(
            "commit range 'from' is newer than 'to'".to_string(),
        ));
    }
    Ok(CommitBounds { after, until })
}

/// Query (a): commits in range with their changed-file lists
pub fn fetch_commits_sync(
    conn: &Connection,
    project_id: i64,
    bounds: &CommitBounds,
) -> rusqlite::Result<Vec<CommitRecord>> {
    let (after_ts, after_sha, until_ts, until_sha) = bounds.params();
    let mut stmt = conn.prepare(&format!(
        "SELECT c.id, c.sha, c.author_email, c.author_name, c.timestamp, c.tz_offset_minutes,
                c.commit_type, c.summary, c.insertions, c.deletions, c.files_changed
         FROM commits c
         WHERE {RANGE_FILTER}
         ORDER BY c.timestamp, c.sha"
    ))?;
    let rows = stmt.query_map(
        params![project_id, after_ts, after_sha, until_ts, until_sha],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                CommitRecord {
                    sha: row.get(1)?,
                    author_email: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    author_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    timestamp: row.get(4)?,
                    tz_offset_minutes: row.get(5)?,
                    commit_type: row.get(6)?,
                    summary: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                    insertions: row.get(8)?,
                    deletions: row.get(9)?,
                    files_changed: row.get(10)?,
                    files: Vec::new(),
                },
            ))
        },
    )?;

    let mut commits = Vec::new();
    let mut index_by_id = HashMap::new();
    for row in rows {
        let (id, commit) = row?;
        index_by_id.insert(id, commits.len());
        commits.push(commit);
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT fc.commit_id, fc.file_path, fc.lines_added, fc.lines_removed
         FROM file_changes fc
         JOIN commits c ON c.id = fc.commit_id
         WHERE {RANGE_FILTER}
         ORDER BY fc.commit_id, fc.file_path"
    ))?;
    let rows = stmt.query_map(
        params![project_id, after_ts, after_sha, until_ts, until_sha],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                FileChange {
                    path: row.get(1)?,
                    lines_added: row.get(2)?,
                    lines_removed: row.get(3)?,
                },
            ))
        },
    )?;
    for row in rows {
        let (commit_id, change) = row?;
        if let Some(&idx) = index_by_id.get(&commit_id) {
            commits[idx].files.push(change);
        }
    }

    Ok(commits)
}

/// Query (b): per-file aggregate change statistics
pub fn fetch_file_stats_sync(
    conn: &Connection,
    project_id: i64,
    bounds: &CommitBounds,
) -> rusqlite::Result<Vec<FileStatsRow>> {
    let (after_ts, after_sha, until_ts, until_sha) = bounds.params();
    let mut stmt = conn.prepare(&format!(
        "SELECT fc.file_path,
                COUNT(*),
                COUNT(DISTINCT c.author_email),
                SUM(fc.lines_added + fc.lines_removed),
                SUM((fc.lines_added + fc.lines_removed) * (fc.lines_added + fc.lines_removed)),
                MIN(c.timestamp),
                MAX(c.timestamp)
         FROM file_changes fc
         JOIN commits c ON c.id = fc.commit_id
         WHERE {RANGE_FILTER}
         GROUP BY fc.file_path
         ORDER BY fc.file_path"
    ))?;
    let rows = stmt.query_map(
        params![project_id, after_ts, after_sha, until_ts, until_sha],
        |row| {
            Ok(FileStatsRow {
                path: row.get(0)?,
                change_count: row.get(1)?,
                contributor_count: row.get(2)?,
                lines_sum: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                lines_sq_sum: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                first_timestamp: row.get(5)?,
                last_timestamp: row.get(6)?,
            })
        },
    )?;
    rows.collect()
}

fn check_project(conn: &Connection, project_id: i64) -> Result<()> {
    if super::project::project_exists_sync(conn, project_id)? {
        Ok(())
    } else {
        Err(StrataError::UnknownProject(project_id.to_string()))
    }
}

/// Both dataset queries under one read transaction, so a concurrent ingest
/// cannot land between them
pub fn fetch_dataset_sync(
    conn: &Connection,
    project_id: i64,
    range: &CommitRange,
) -> Result<ChangeDataset> {
    let tx = conn.unchecked_transaction()?;
    check_project(&tx, project_id)?;
    let bounds = resolve_range_sync(&tx, project_id, range)?;
    let commits = fetch_commits_sync(&tx, project_id, &bounds)?;
    let file_stats = fetch_file_stats_sync(&tx, project_id, &bounds)?;
    tx.commit()?;
    Ok(ChangeDataset::new(commits, file_stats))
}

#[async_trait]
impl ChangeSource for DatabasePool {
    async fn fetch_commits(&self, project_id: i64, range: &CommitRange) -> Result<Vec<CommitRecord>> {
        let range = range.clone();
        self.run(move |conn| {
            check_project(conn, project_id)?;
            let bounds = resolve_range_sync(conn, project_id, &range)?;
            Ok::<_, StrataError>(fetch_commits_sync(conn, project_id, &bounds)?)
        })
        .await
    }

    async fn fetch_file_stats(
        &self,
        project_id: i64,
        range: &CommitRange,
    ) -> Result<Vec<FileStatsRow>> {
        let range = range.clone();
        self.run(move |conn| {
            check_project(conn, project_id)?;
            let bounds = resolve_range_sync(conn, project_id, &range)?;
            Ok::<_, StrataError>(fetch_file_stats_sync(conn, project_id, &bounds)?)
        })
        .await
    }

    async fn fetch_dataset(&self, project_id: i64, range: &CommitRange) -> Result<ChangeDataset> {
        let range = range.clone();
        self.run(move |conn| fetch_dataset_sync(conn, project_id, &range))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::project::get_or_create_project_sync;
    use crate::db::schema::run_all_migrations;

    fn commit(sha: &str, ts: i64, files: &[(&str, i64, i64)]) -> CommitRecord {
        let files: Vec<FileChange> = files
            .iter()
            .map(|(p, a, r)| FileChange {
                path: p.to_string(),
                lines_added: *a,
                lines_removed: *r,
            })
            .collect();
        CommitRecord {
            sha: sha.to_string(),
            author_email: "dev@example.com".to_string(),
            author_name: "Dev".to_string(),
            timestamp: ts,
            tz_offset_minutes: 0,
            commit_type: "feat".to_string(),
            summary: "feat: work".to_string(),
            insertions: files.iter().map(|f| f.lines_added).sum(),
            deletions: files.iter().map(|f| f.lines_removed).sum(),
            files_changed: files.len() as i64,
            files,
        }
    }

    fn seeded() -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        run_all_migrations(&conn).unwrap();
        let (project_id, _) = get_or_create_project_sync(&conn, "/repo", None).unwrap();
        let commits = vec![
            commit("aaaa1111", 100, &[("a.rs", 10, 2), ("b.rs", 1, 1)]),
            commit("bbbb2222", 200, &[("a.rs", 4, 0)]),
            commit("cccc3333", 300, &[("a.rs", 6, 6), ("c.rs", 3, 0)]),
        ];
        assert_eq!(insert_commits_sync(&conn, project_id, &commits).unwrap(), 3);
        (conn, project_id)
    }

    #[test]
    fn test_insert_is_idempotent_per_sha() {
        let (conn, project_id) = seeded();
        let again = commit("aaaa1111", 100, &[("a.rs", 10, 2)]);
        assert!(!insert_commit_sync(&conn, project_id, &again).unwrap());
        assert_eq!(count_commits_sync(&conn, project_id).unwrap(), 3);
    }

    #[test]
    fn test_fetch_commits_with_files() {
        let (conn, project_id) = seeded();
        let commits = fetch_commits_sync(&conn, project_id, &CommitBounds::default()).unwrap();
        assert_eq!(commits.len(), 3);
        assert_eq!(commits[0].sha, "aaaa1111");
        let paths: Vec<&str> = commits[0].files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.rs", "b.rs"]);
        assert_eq!(commits[1].files.len(), 1);
    }

    #[test]
    fn test_fetch_file_stats_aggregates() {
        let (conn, project_id) = seeded();
        let stats = fetch_file_stats_sync(&conn, project_id, &CommitBounds::default()).unwrap();
        let a = stats.iter().find(|s| s.path == "a.rs").unwrap();
        assert_eq!(a.change_count, 3);
        assert_eq!(a.contributor_count, 1);
        // 12 + 4 + 12
        assert_eq!(a.lines_sum, 28.0);
        assert_eq!(a.lines_sq_sum, 144.0 + 16.0 + 144.0);
        assert_eq!(a.first_timestamp, 100);
        assert_eq!(a.last_timestamp, 300);
    }

    #[test]
    fn test_range_bounds_from_exclusive_to_inclusive() {
        let (conn, project_id) = seeded();
        let range = CommitRange {
            from: Some("aaaa".to_string()),
            to: Some("bbbb2222".to_string()),
        };
        let bounds = resolve_range_sync(&conn, project_id, &range).unwrap();
        let commits = fetch_commits_sync(&conn, project_id, &bounds).unwrap();
        let shas: Vec<&str> = commits.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["bbbb2222"]);
    }

    #[test]
    fn test_range_rejects_unknown_and_reversed() {
        let (conn, project_id) = seeded();
        let unknown = CommitRange {
            from: Some("ffff".to_string()),
            to: None,
        };
        assert!(matches!(
            resolve_range_sync(&conn, project_id, &unknown),
            Err(StrataError::InvalidInput(_))
        ));

        let reversed = CommitRange {
            from: Some("cccc3333".to_string()),
            to: Some("aaaa1111".to_string()),
        };
        assert!(resolve_range_sync(&conn, project_id, &reversed).is_err());

        let not_hex = CommitRange {
            from: Some("HEAD~3".to_string()),
            to: None,
        };
        assert!(resolve_range_sync(&conn, project_id, &not_hex).is_err());
    }

    fn shas(commits: &[CommitRecord]) -> Vec<&str> {
        commits.iter().map(|c| c.sha.as_str()).collect()
    }

    #[test]
    fn test_range_bounds_break_timestamp_ties_by_sha() {
        let conn = Connection::open_in_memory().unwrap();
        run_all_migrations(&conn).unwrap();
        let (project_id, _) = get_or_create_project_sync(&conn, "/repo", None).unwrap();
        let commits = vec![
            commit("a000", 100, &[("x.rs", 1, 0)]),
            commit("a001", 200, &[("x.rs", 1, 0)]),
            commit("a002", 200, &[("y.rs", 1, 0)]),
            commit("a003", 300, &[("x.rs", 1, 0)]),
        ];
        insert_commits_sync(&conn, project_id, &commits).unwrap();

        let from = CommitRange {
            from: Some("a001".to_string()),
            to: None,
        };
        let bounds = resolve_range_sync(&conn, project_id, &from).unwrap();
        let fetched = fetch_commits_sync(&conn, project_id, &bounds).unwrap();
        assert_eq!(shas(&fetched), vec!["a002", "a003"]);

        let to = CommitRange {
            from: None,
            to: Some("a001".to_string()),
        };
        let bounds = resolve_range_sync(&conn, project_id, &to).unwrap();
        let fetched = fetch_commits_sync(&conn, project_id, &bounds).unwrap();
        assert_eq!(shas(&fetched), vec!["a000", "a001"]);

        // y.rs only changed in the tied commit after the bound
        let stats = fetch_file_stats_sync(&conn, project_id, &bounds).unwrap();
        assert!(stats.iter().all(|s| s.path != "y.rs"));

        let same_second = CommitRange {
            from: Some("a001".to_string()),
            to: Some("a002".to_string()),
        };
        let bounds = resolve_range_sync(&conn, project_id, &same_second).unwrap();
        let fetched = fetch_commits_sync(&conn, project_id, &bounds).unwrap();
        assert_eq!(shas(&fetched), vec!["a002"]);

        let reversed = CommitRange {
            from: Some("a002".to_string()),
            to: Some("a001".to_string()),
        };
        assert!(resolve_range_sync(&conn, project_id, &reversed).is_err());
    }

    #[test]
    fn test_fetch_dataset_reads_both_queries() {
        let (conn, project_id) = seeded();
        let range = CommitRange {
            from: Some("aaaa1111".to_string()),
            to: None,
        };
        let dataset = fetch_dataset_sync(&conn, project_id, &range).unwrap();
        assert_eq!(shas(&dataset.commits), vec!["bbbb2222", "cccc3333"]);
        let a = dataset.file_stats.iter().find(|s| s.path == "a.rs").unwrap();
        assert_eq!(a.change_count, 2);
        assert!(dataset.file_stats.iter().all(|s| s.path != "b.rs"));

        assert!(matches!(
            fetch_dataset_sync(&conn, project_id + 1, &CommitRange::default()),
            Err(StrataError::UnknownProject(_))
        ));
    }

    #[tokio::test]
    async fn test_change_source_unknown_project() {
        let pool = DatabasePool::open_in_memory().await.unwrap();
        let result = pool.fetch_commits(42, &CommitRange::default()).await;
        assert!(matches!(result, Err(StrataError::UnknownProject(_))));
    }
}
