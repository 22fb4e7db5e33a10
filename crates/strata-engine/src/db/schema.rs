// crates/strata-engine/src/db/schema.rs
// Database schema and migrations

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table_name: &str, column_name: &str) -> bool {
    conn.query_row(
        "SELECT 1 FROM pragma_table_info(?) WHERE name=?",
        [table_name, column_name],
        |_| Ok(true),
    )
    .unwrap_or(false)
}

/// Add a column to a table if it doesn't already exist
fn add_column_if_missing(
    conn: &Connection,
    table_name: &str,
    column_name: &str,
    column_def: &str,
) -> Result<()> {
    if column_exists(conn, table_name, column_name) {
        return Ok(());
    }

    info!("Migrating {} to add {} column", table_name, column_name);
    let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table_name, column_name, column_def);
    conn.execute(&sql, [])?;
    Ok(())
}

/// Run all schema setup and migrations. Idempotent.
pub fn run_all_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    // Databases created before author offsets were recorded
    add_column_if_missing(conn, "commits", "tz_offset_minutes", "INTEGER NOT NULL DEFAULT 0")?;

    Ok(())
}

/// Database schema SQL
pub const SCHEMA: &str = r#"
-- =======================================
-- SOURCE: projects, commits, file changes
-- =======================================
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY,
    path TEXT UNIQUE NOT NULL,
    name TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS commits (
    id INTEGER PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    sha TEXT NOT NULL,
    author_email TEXT,
    author_name TEXT,
    timestamp INTEGER NOT NULL,          -- unix seconds, UTC
    tz_offset_minutes INTEGER NOT NULL DEFAULT 0,
    commit_type TEXT NOT NULL DEFAULT 'other',
    summary TEXT,
    insertions INTEGER NOT NULL DEFAULT 0,
    deletions INTEGER NOT NULL DEFAULT 0,
    files_changed INTEGER NOT NULL DEFAULT 0,
    UNIQUE(project_id, sha)
);
CREATE INDEX IF NOT EXISTS idx_commits_project_time ON commits(project_id, timestamp);

CREATE TABLE IF NOT EXISTS file_changes (
    id INTEGER PRIMARY KEY,
    commit_id INTEGER NOT NULL REFERENCES commits(id) ON DELETE CASCADE,
    file_path TEXT NOT NULL,
    lines_added INTEGER NOT NULL DEFAULT 0,
    lines_removed INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_file_changes_commit ON file_changes(commit_id);
CREATE INDEX IF NOT EXISTS idx_file_changes_path ON file_changes(file_path);

-- =======================================
-- RUNS: one row per detection run
-- =======================================
CREATE TABLE IF NOT EXISTS analysis_runs (
    run_id TEXT PRIMARY KEY,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    from_commit TEXT,
    to_commit TEXT,
    started_at TEXT NOT NULL,
    outcome TEXT NOT NULL,               -- 'succeeded', 'succeeded_with_skips', 'degraded'
    commit_count INTEGER NOT NULL,
    pattern_count INTEGER NOT NULL,
    insight_count INTEGER NOT NULL,
    timings_json TEXT NOT NULL,
    warnings_json TEXT NOT NULL DEFAULT '[]',
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_analysis_runs_project ON analysis_runs(project_id, started_at DESC);

CREATE TABLE IF NOT EXISTS algorithm_runs (
    id INTEGER PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES analysis_runs(run_id),
    algorithm TEXT NOT NULL,
    status TEXT NOT NULL,                -- 'succeeded' or 'failed'
    error TEXT,
    skipped_records INTEGER NOT NULL DEFAULT 0,
    execution_ms INTEGER NOT NULL,
    pattern_count INTEGER NOT NULL,
    mean_score REAL NOT NULL,
    std_dev REAL NOT NULL,
    significance_threshold REAL NOT NULL,
    anomaly_count INTEGER NOT NULL,
    UNIQUE(run_id, algorithm)
);

-- =======================================
-- PATTERNS: write-once, tagged with run_id
-- =======================================
CREATE TABLE IF NOT EXISTS cooccurrence_patterns (
    id INTEGER PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES analysis_runs(run_id),
    file_a TEXT NOT NULL,
    file_b TEXT NOT NULL,
    cooccurrence_count INTEGER NOT NULL,
    support REAL NOT NULL CHECK (support >= 0 AND support <= 1),
    confidence REAL NOT NULL CHECK (confidence >= 0 AND confidence <= 1),
    lift REAL NOT NULL CHECK (lift >= 0),
    strength TEXT NOT NULL,
    commits_json TEXT NOT NULL,
    CHECK (file_a < file_b),
    UNIQUE(run_id, file_a, file_b)
);

CREATE TABLE IF NOT EXISTS temporal_patterns (
    id INTEGER PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES analysis_runs(run_id),
    period_type TEXT NOT NULL,
    bins_json TEXT NOT NULL,
    peak_bins_json TEXT NOT NULL,
    significance REAL NOT NULL,
    chi_square REAL,
    authors_json TEXT NOT NULL,
    files_json TEXT NOT NULL,
    UNIQUE(run_id, period_type)
);

CREATE TABLE IF NOT EXISTS developer_patterns (
    id INTEGER PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES analysis_runs(run_id),
    author_email TEXT NOT NULL,
    author_name TEXT NOT NULL,
    commit_count INTEGER NOT NULL,
    specialties_json TEXT NOT NULL,
    velocity REAL NOT NULL,
    consistency REAL NOT NULL,
    collaborators_json TEXT NOT NULL,
    shared_files_json TEXT NOT NULL,
    avg_files_per_commit REAL NOT NULL,
    avg_lines_per_commit REAL NOT NULL,
    commit_types_json TEXT NOT NULL,
    UNIQUE(run_id, author_email)
);

CREATE TABLE IF NOT EXISTS magnitude_patterns (
    id INTEGER PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES analysis_runs(run_id),
    file_path TEXT NOT NULL,
    size_category TEXT NOT NULL,
    avg_lines_changed REAL NOT NULL,
    std_dev_lines REAL NOT NULL,
    change_count INTEGER NOT NULL,
    contributor_count INTEGER NOT NULL,
    lifespan_days REAL NOT NULL,
    frequency_score REAL NOT NULL,
    volatility_score REAL NOT NULL,
    trend TEXT NOT NULL,
    anomaly_score REAL NOT NULL,
    risk_level TEXT NOT NULL,
    UNIQUE(run_id, file_path)
);

CREATE TABLE IF NOT EXISTS frequency_patterns (
    id INTEGER PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES analysis_runs(run_id),
    file_path TEXT NOT NULL,
    change_frequency REAL NOT NULL,
    hotspot_score REAL NOT NULL,
    stability_score REAL NOT NULL,
    contributor_diversity REAL NOT NULL,
    change_types_json TEXT NOT NULL,
    UNIQUE(run_id, file_path)
);

CREATE TABLE IF NOT EXISTS insights (
    id INTEGER PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES analysis_runs(run_id),
    insight_type TEXT NOT NULL,
    description TEXT NOT NULL,
    confidence REAL NOT NULL,
    patterns_json TEXT NOT NULL,
    recommendations_json TEXT NOT NULL,
    risk_level TEXT NOT NULL,
    risk_factors_json TEXT NOT NULL,
    UNIQUE(run_id, insight_type)
);
"#;
