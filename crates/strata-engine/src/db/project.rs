// crates/strata-engine/src/db/project.rs
// Project management operations

use rusqlite::{Connection, OptionalExtension, params};

/// Get or create a project, returning (id, name) - sync version for pool.interact()
pub fn get_or_create_project_sync(
    conn: &Connection,
    path: &str,
    name: Option<&str>,
) -> rusqlite::Result<(i64, Option<String>)> {
    conn.query_row(
        "INSERT INTO projects (path, name) VALUES (?, ?)
         ON CONFLICT(path) DO UPDATE SET
             name = COALESCE(projects.name, excluded.name),
             created_at = projects.created_at
         RETURNING id, name",
        params![path, name],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}

/// Look up a project id by its path
pub fn find_project_by_path_sync(conn: &Connection, path: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row("SELECT id FROM projects WHERE path = ?", [path], |row| {
        row.get(0)
    })
    .optional()
}

pub fn project_exists_sync(conn: &Connection, project_id: i64) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM projects WHERE id = ?", [project_id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}
