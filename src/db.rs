use anyhow::Result;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::SourceError;
use crate::table::{Table, Value};

/// Read-only access to the relational store
///
/// Implementations run one query with bound integer parameters and return
/// every row. Timeouts are the implementation's business; they surface as
/// a `SourceError` like any other failure.
pub trait DataSource: Send + Sync {
    fn query(&self, sql: &str, params: &[i64]) -> Result<Table, SourceError>;
}

/// SQLite-backed data source
///
/// The connection is opened lazily on the first query so an unreachable
/// database is reported through the loader instead of aborting startup.
pub struct SqliteSource {
    path: Option<PathBuf>,
    busy_timeout: Duration,
    conn: Mutex<Option<Connection>>,
}

impl SqliteSource {
    /// Source over a database file, opened read-only on first use
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            busy_timeout,
            conn: Mutex::new(None),
        }
    }

    /// Source over an already open connection (tests, in-memory databases)
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            path: None,
            busy_timeout: Duration::ZERO,
            conn: Mutex::new(Some(conn)),
        }
    }

    fn connect(&self) -> Result<Connection, SourceError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| SourceError::Connection("no database path configured".to_string()))?;

        if !path.exists() {
            return Err(SourceError::Connection(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;

        info!(path = %path.display(), "opened database (read-only)");
        Ok(conn)
    }
}

impl DataSource for SqliteSource {
    fn query(&self, sql: &str, params: &[i64]) -> Result<Table, SourceError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| SourceError::Connection("connection lock poisoned".to_string()))?;

        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        let conn = guard
            .as_ref()
            .ok_or_else(|| SourceError::Connection("connection unavailable".to_string()))?;

        debug!(sql, ?params, "running query");
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let mut table = Table::new(columns);
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(match row.get_ref(i)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(n) => Value::Integer(n),
                    ValueRef::Real(r) => Value::Real(r),
                    ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(b) => Value::Text(String::from_utf8_lossy(b).into_owned()),
                });
            }
            table.push_row(values);
        }

        Ok(table)
    }
}

/// Create the dashboard schema on a writable connection
pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "OFF")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS franchises (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS organizations (
            id INTEGER PRIMARY KEY,
            franchise_id INTEGER NOT NULL REFERENCES franchises(id),
            name TEXT NOT NULL,
            organization_type TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS individuals (
            id INTEGER PRIMARY KEY,
            franchise_id INTEGER NOT NULL REFERENCES franchises(id),
            name TEXT NOT NULL,
            species TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS commanders (
            id INTEGER PRIMARY KEY,
            individual_id INTEGER REFERENCES individuals(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS vehicles (
            id INTEGER PRIMARY KEY,
            franchise_id INTEGER NOT NULL REFERENCES franchises(id),
            name TEXT NOT NULL,
            manufacturer TEXT,
            commander_id INTEGER REFERENCES commanders(id)
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_franchises_name ON franchises(name)",
        [],
    )?;

    for table in ["organizations", "individuals", "vehicles"] {
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_franchise ON {table}(franchise_id)"
            ),
            [],
        )?;
    }

    Ok(())
}
