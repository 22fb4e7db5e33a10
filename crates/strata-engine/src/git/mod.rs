// crates/strata-engine/src/git/mod.rs
// Git history ingestion using git2
//
// Walks a local repository, diffs each non-merge commit against its first
// parent and stores the result through the commit store. Re-ingesting only
// adds commits the store has not seen.

mod classify;

pub use classify::classify_commit;

use crate::db::{
    DatabasePool, count_commits_sync, get_or_create_project_sync, insert_commits_sync,
};
use crate::error::{Result, StrataError};
use crate::patterns::{CommitRecord, FileChange};
use git2::{Commit, DiffOptions, ErrorCode, Patch, Repository, Sort};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Which part of history to read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Starting ref (branch, tag or sha). HEAD when unset.
    pub rev: Option<String>,
    pub max_commits: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub project_id: i64,
    pub repo_root: PathBuf,
    pub scanned: usize,
    pub inserted: usize,
    /// Commits held for the project after this ingest
    pub stored: i64,
}

/// Reject refs that look like flags or carry control characters
fn validate_ref(r: &str) -> Result<()> {
    if r.is_empty() || r.starts_with('-') {
        return Err(StrataError::InvalidInput(format!("invalid git ref: '{}'", r)));
    }
    if r.contains('\0') || r.contains('\n') || r.contains('\r') {
        return Err(StrataError::InvalidInput(
            "invalid git ref: contains forbidden characters".to_string(),
        ));
    }
    Ok(())
}

/// Root directory of the repository containing `path`
pub fn repo_root(path: &Path) -> Result<PathBuf> {
    let repo = Repository::discover(path)?;
    let root = repo
        .workdir()
        .unwrap_or_else(|| repo.path())
        .to_path_buf();
    Ok(std::fs::canonicalize(&root).unwrap_or(root))
}

fn commit_record(repo: &Repository, commit: &Commit<'_>) -> Result<CommitRecord> {
    let tree = commit.tree()?;
    let parent_tree = if commit.parent_count() == 1 {
        Some(commit.parent(0)?.tree()?)
    } else {
        None
    };

    let mut opts = DiffOptions::new();
    opts.ignore_submodules(true);
    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;

    let mut files = Vec::with_capacity(diff.deltas().len());
    for idx in 0..diff.deltas().len() {
        let Some(delta) = diff.get_delta(idx) else {
            continue;
        };
        let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) else {
            continue;
        };
        let (lines_added, lines_removed) = match Patch::from_diff(&diff, idx)? {
            Some(patch) => {
                let (_, added, removed) = patch.line_stats()?;
                (added as i64, removed as i64)
            }
            None => (0, 0),
        };
        files.push(FileChange {
            path: path.to_string_lossy().replace('\\', "/"),
            lines_added,
            lines_removed,
        });
    }

    let author = commit.author();
    let when = author.when();
    let summary = commit.summary().unwrap_or("").to_string();

    Ok(CommitRecord {
        sha: commit.id().to_string(),
        author_email: author.email().unwrap_or("").trim().to_string(),
        author_name: author.name().unwrap_or("").to_string(),
        timestamp: when.seconds(),
        tz_offset_minutes: when.offset_minutes(),
        commit_type: classify_commit(&summary),
        insertions: files.iter().map(|f| f.lines_added).sum(),
        deletions: files.iter().map(|f| f.lines_removed).sum(),
        files_changed: files.len() as i64,
        summary,
        files,
    })
}

/// Read non-merge commits reachable from `options.rev` (or HEAD), newest first.
///
/// An empty repository yields no commits.
pub fn read_history(path: &Path, options: &IngestOptions) -> Result<Vec<CommitRecord>> {
    let repo = Repository::discover(path)?;
    let mut revwalk = repo.revwalk()?;
    revwalk.set_sorting(Sort::TIME)?;

    match &options.rev {
        Some(rev) => {
            validate_ref(rev)?;
            let target = repo.revparse_single(rev)?.peel_to_commit()?;
            revwalk.push(target.id())?;
        }
        None => match repo.head() {
            Ok(head) => {
                let target = head.peel_to_commit()?;
                revwalk.push(target.id())?;
            }
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                debug!("Repository at {} has no commits yet", path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        },
    }

    let limit = options.max_commits.unwrap_or(usize::MAX);
    let mut commits = Vec::new();
    for oid in revwalk {
        if commits.len() >= limit {
            break;
        }
        let commit = repo.find_commit(oid?)?;
        if commit.parent_count() > 1 {
            continue;
        }
        commits.push(commit_record(&repo, &commit)?);
    }
    Ok(commits)
}

/// Read history from `path` and store it under the repository's project.
pub async fn ingest_repository(
    pool: &DatabasePool,
    path: &Path,
    options: IngestOptions,
) -> Result<IngestSummary> {
    let root = repo_root(path)?;
    info!("Reading git history from {}", root.display());

    let read_root = root.clone();
    let commits =
        tokio::task::spawn_blocking(move || read_history(&read_root, &options)).await??;
    let scanned = commits.len();

    let root_str = root.to_string_lossy().to_string();
    let name = root
        .file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string());
    let (project_id, inserted, stored) = pool
        .run(move |conn| {
            let (project_id, _) = get_or_create_project_sync(conn, &root_str, name.as_deref())?;
            let inserted = insert_commits_sync(conn, project_id, &commits)?;
            let stored = count_commits_sync(conn, project_id)?;
            Ok::<_, rusqlite::Error>((project_id, inserted, stored))
        })
        .await?;

    info!(
        "Ingested {} new of {} scanned commits into project {}",
        inserted, scanned, project_id
    );
    Ok(IngestSummary {
        project_id,
        repo_root: root,
        scanned,
        inserted,
        stored,
    })
}
