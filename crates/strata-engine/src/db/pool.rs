// crates/strata-engine/src/db/pool.rs
// Async connection pool using deadpool-sqlite
//
// All store access goes through `pool.interact()` (anyhow) or `pool.run()`
// (StrataError). The closure runs on the blocking thread pool, so analyzers
// and the async runtime never wait on SQLite directly.
//
// In-memory pools use a shared-cache URI so every pooled connection sees the
// same database.

use crate::error::StrataError;
use anyhow::{Context, Result};
use deadpool_sqlite::{Config, Hook, Pool, Runtime};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// SQLITE_BUSY (file db under write contention) or SQLITE_LOCKED (shared-cache
/// in-memory db with another writer on the same table).
fn is_rusqlite_contention(err: &rusqlite::Error) -> bool {
    use rusqlite::ffi;
    matches!(
        err,
        rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: ffi::ErrorCode::DatabaseBusy | ffi::ErrorCode::DatabaseLocked,
                ..
            },
            _,
        )
    )
}

/// Walks an anyhow chain for a contention error, either bare or wrapped in StrataError::Db.
fn is_sqlite_contention(err: &anyhow::Error) -> bool {
    if let Some(rusqlite_err) = err.downcast_ref::<rusqlite::Error>() {
        return is_rusqlite_contention(rusqlite_err);
    }
    if let Some(StrataError::Db(rusqlite_err)) = err.downcast_ref::<StrataError>() {
        return is_rusqlite_contention(rusqlite_err);
    }
    false
}

/// Retry delays for SQLite contention backoff (100ms, 500ms, 2s).
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_millis(100),
    Duration::from_millis(500),
    Duration::from_millis(2000),
];

async fn retry_with_backoff<F, Fut, R, E>(
    mut op: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<R, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<R, E>>,
    E: std::fmt::Display,
{
    for (attempt, delay) in RETRY_DELAYS.iter().enumerate() {
        match op().await {
            Ok(result) => return Ok(result),
            Err(e) if is_retryable(&e) => {
                tracing::warn!(
                    "SQLite contention on attempt {}/{}, retrying in {:?}",
                    attempt + 1,
                    RETRY_DELAYS.len(),
                    delay
                );
                tokio::time::sleep(*delay).await;
            }
            Err(e) => return Err(e),
        }
    }

    op().await
}

/// Pooled SQLite database holding commits, file changes and run results.
pub struct DatabasePool {
    pool: Pool,
}

impl DatabasePool {
    /// Open a pooled database at the given path, creating it and running migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        ensure_parent_directory(path)?;
        let conn_str = path.to_string_lossy().to_string();
        let hook = make_file_post_create_hook(path.to_path_buf());
        Self::build(&conn_str, hook).await
    }

    /// Open a pooled in-memory database (tests, one-shot analysis).
    pub async fn open_in_memory() -> Result<Self> {
        let uri = format!(
            "file:strata_mem_{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4().simple()
        );
        Self::build(&uri, make_memory_post_create_hook()).await
    }

    async fn build(conn_str: &str, hook: Hook) -> Result<Self> {
        let pool = Config::new(conn_str)
            .builder(Runtime::Tokio1)
            .context("Failed to create pool builder")?
            .max_size(8)
            .post_create(hook)
            .build()
            .context("Failed to build connection pool")?;

        let db_pool = Self { pool };
        db_pool.run_migrations().await?;
        Ok(db_pool)
    }

    /// Run a closure with a pooled connection on the blocking thread pool.
    pub async fn interact<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get connection from pool")?;

        conn.interact(move |conn| f(conn))
            .await
            .map_err(|e| anyhow::anyhow!("interact failed: {e}"))?
    }

    /// Run a closure and convert its error into `StrataError`.
    pub async fn run<F, R, E>(&self, f: F) -> Result<R, StrataError>
    where
        F: FnOnce(&Connection) -> Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: Into<StrataError> + Send + 'static,
    {
        self.pool
            .get()
            .await
            .map_err(|e| StrataError::Other(format!("Failed to get connection: {}", e)))?
            .interact(move |conn| f(conn).map_err(Into::into))
            .await
            .map_err(|e| StrataError::Other(format!("Database error: {}", e)))?
    }

    /// [`interact`](Self::interact) with backoff on SQLite contention.
    pub async fn interact_with_retry<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R> + Send + Clone + 'static,
        R: Send + 'static,
    {
        retry_with_backoff(|| self.interact(f.clone()), |e: &anyhow::Error| {
            is_sqlite_contention(e)
        })
        .await
    }

    async fn run_migrations(&self) -> Result<()> {
        self.interact(|conn| {
            super::schema::run_all_migrations(conn)?;
            if let Err(e) = conn.execute_batch("PRAGMA optimize") {
                tracing::debug!("PRAGMA optimize skipped: {}", e);
            }
            Ok(())
        })
        .await
    }
}

/// Ensure parent directory exists with 0o700 on Unix.
fn ensure_parent_directory(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
        #[cfg(unix)]
        {
            let mut perms = std::fs::metadata(parent)?.permissions();
            perms.set_mode(0o700);
            std::fs::set_permissions(parent, perms)?;
        }
    }
    Ok(())
}

fn make_file_post_create_hook(path: PathBuf) -> Hook {
    Hook::async_fn(move |conn, _metrics| {
        let path_for_perms = path.clone();
        Box::pin(async move {
            conn.interact(move |conn| {
                setup_connection(conn)?;

                #[cfg(unix)]
                if let Ok(metadata) = std::fs::metadata(&path_for_perms) {
                    let mut perms = metadata.permissions();
                    perms.set_mode(0o600);
                    if let Err(e) = std::fs::set_permissions(&path_for_perms, perms) {
                        tracing::warn!("Failed to set database file permissions to 0600: {}", e);
                    }
                }
                #[cfg(not(unix))]
                let _ = &path_for_perms;

                Ok::<_, rusqlite::Error>(())
            })
            .await
            .map_err(|e| {
                deadpool_sqlite::HookError::Message(format!("interact failed: {e}").into())
            })?
            .map_err(|e| {
                deadpool_sqlite::HookError::Message(format!("connection setup failed: {e}").into())
            })
        })
    })
}

/// WAL does not apply to in-memory databases.
fn make_memory_post_create_hook() -> Hook {
    Hook::async_fn(|conn, _metrics| {
        Box::pin(async move {
            conn.interact(|conn| {
                conn.execute_batch(
                    "PRAGMA foreign_keys=ON; \
                     PRAGMA busy_timeout=5000;",
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await
            .map_err(|e| {
                deadpool_sqlite::HookError::Message(format!("interact failed: {e}").into())
            })?
            .map_err(|e| {
                deadpool_sqlite::HookError::Message(format!("connection setup failed: {e}").into())
            })
        })
    })
}

fn setup_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL; \
         PRAGMA foreign_keys=ON; \
         PRAGMA busy_timeout=5000; \
         PRAGMA synchronous=NORMAL;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_in_memory_shares_state() {
        let pool = DatabasePool::open_in_memory()
            .await
            .expect("Failed to open in-memory pool");

        let id = pool
            .interact(|conn| {
                conn.execute(
                    "INSERT INTO projects (path, name) VALUES (?, ?)",
                    rusqlite::params!["/test/path", "test"],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .expect("Failed to insert");
        assert!(id > 0);

        let name: String = pool
            .interact(move |conn| {
                conn.query_row("SELECT name FROM projects WHERE id = ?", [id], |row| {
                    row.get(0)
                })
                .map_err(Into::into)
            })
            .await
            .expect("Failed to query");
        assert_eq!(name, "test");
    }

    #[tokio::test]
    async fn test_open_file_database() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = dir.path().join("nested").join("strata.db");

        let pool = DatabasePool::open(&db_path).await.expect("Failed to open pool");
        assert!(db_path.exists());
        let projects: i64 = pool
            .interact(|conn| {
                conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))
                    .map_err(Into::into)
            })
            .await
            .expect("Count failed");
        assert_eq!(projects, 0);
    }

    #[tokio::test]
    async fn test_concurrent_writes_with_retry() {
        let pool = std::sync::Arc::new(
            DatabasePool::open_in_memory()
                .await
                .expect("Failed to open pool"),
        );

        let mut handles = Vec::new();
        for i in 0..10 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                pool.interact_with_retry(move |conn| {
                    conn.execute(
                        "INSERT INTO projects (path, name) VALUES (?, ?)",
                        rusqlite::params![format!("/concurrent/{i}"), format!("project-{i}")],
                    )?;
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().expect("Concurrent write failed");
        }

        let count: i64 = pool
            .interact(|conn| {
                conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))
                    .map_err(Into::into)
            })
            .await
            .expect("Count failed");
        assert_eq!(count, 10);
    }

    #[tokio::test]
    async fn test_run_converts_sql_errors() {
        let pool = DatabasePool::open_in_memory().await.unwrap();
        let result = pool
            .run(|conn| conn.execute("INSERT INTO nonexistent_table VALUES (1)", []))
            .await;
        assert!(matches!(result, Err(StrataError::Db(_))));
    }

    #[test]
    fn test_contention_detection() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ffi::ErrorCode::DatabaseBusy,
                extended_code: 5,
            },
            Some("database is locked".to_string()),
        );
        assert!(is_rusqlite_contention(&busy));

        let constraint = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ffi::ErrorCode::ConstraintViolation,
                extended_code: 19,
            },
            None,
        );
        assert!(!is_rusqlite_contention(&constraint));

        let wrapped: anyhow::Error = StrataError::Db(busy).into();
        assert!(is_sqlite_contention(&wrapped));
        assert!(!is_sqlite_contention(&anyhow::anyhow!("database is locked")));
    }
}
