// crates/strata-engine/src/db/mod.rs
// SQLite store: commits and file changes in, run results out

mod commits;
pub mod pool;
mod project;
mod runs;
mod schema;
#[cfg(test)]
pub(crate) mod test_support;

pub use commits::{
    CommitBounds, CommitPosition, count_commits_sync, fetch_commits_sync, fetch_dataset_sync,
    fetch_file_stats_sync, insert_commit_sync, insert_commits_sync, resolve_range_sync,
};
pub use pool::DatabasePool;
pub use project::{find_project_by_path_sync, get_or_create_project_sync, project_exists_sync};
pub use runs::{RunSummary, list_runs_sync, load_insights_sync, persist_run_sync};
pub use schema::run_all_migrations;
