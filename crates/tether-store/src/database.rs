use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;
use crate::schema;

const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared handle to the history database. Clones share one connection;
/// callers run synchronous statements through [`Database::with_conn`].
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database file and its parent directory.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| StoreError::Io(format!("{}: {e}", dir.display())))?;
        }
        Self::prepare(Connection::open(path)?, path.to_owned())
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::prepare(Connection::open_in_memory()?, PathBuf::from(":memory:"))
    }

    fn prepare(conn: Connection, path: PathBuf) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        for (step, sql) in [("pragmas", schema::PRAGMAS), ("schema", schema::CREATE_TABLES)] {
            conn.execute_batch(sql)
                .map_err(|e| StoreError::Database(format!("{step}: {e}")))?;
        }
        info!(path = %path.display(), "history database ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        f(&self.conn.lock())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(db: &Database) -> Vec<String> {
        db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(names)
        })
        .unwrap()
    }

    #[test]
    fn memory_database_has_history_table() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.path(), Path::new(":memory:"));
        assert_eq!(tables(&db), vec!["location_history".to_string()]);
    }

    #[test]
    fn file_database_creates_parent_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("history.db");

        let first = Database::open(&path).unwrap();
        first
            .with_conn(|conn| {
                let _ = conn.execute(
                    "INSERT INTO location_history VALUES ('g', 's', '1', '2', 'now')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        drop(first);

        let again = Database::open(&path).unwrap();
        let count: i64 = again
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM location_history", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }
}
