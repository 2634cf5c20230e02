use duckdb::{AccessMode, Config, Connection};
use r2d2::{ManageConnection, Pool};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Opens read-write connections to one destination database file.
pub struct DuckDBConnectionManager {
    db_path: PathBuf,
}

impl DuckDBConnectionManager {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self { db_path: db_path.into() }
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let config = Config::default().access_mode(AccessMode::ReadWrite)?;
        Connection::open_with_flags(&self.db_path, config)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute_batch("SELECT 1")
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Builds the pool used by a destination. A connection that cannot be opened
/// within `timeout` fails the build instead of blocking the load.
pub fn build_pool(
    db_path: &Path,
    max_size: u32,
    timeout: Duration,
) -> Result<Pool<DuckDBConnectionManager>, r2d2::Error> {
    Pool::builder()
        .max_size(max_size.max(1))
        .connection_timeout(timeout)
        .build(DuckDBConnectionManager::new(db_path))
}
