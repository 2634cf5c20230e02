use crate::config::DatabaseConfig;
use crate::db::db_pool::{build_pool, DuckDBConnectionManager};
use crate::db::db_utils::{database_path, insert_or_replace_sql};
use crate::error::LoadError;
use crate::ingest::schema::{Record, Value};
use duckdb::types::{ToSql, ToSqlOutput, Value as DuckValue};
use r2d2::Pool;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Project, instance and database identifiers of a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseAddress {
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl fmt::Display for DatabaseAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

/// One insert-or-update of a record into a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub table: String,
    pub columns: Arc<[String]>,
    pub record: Record,
}

impl Mutation {
    pub fn insert_or_update(table: &str, columns: Arc<[String]>, record: Record) -> Self {
        Self {
            table: table.to_string(),
            columns,
            record,
        }
    }
}

/// Mutations applied together in a single transaction.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WriteBatch {
    mutations: Vec<Mutation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }
}

impl IntoIterator for WriteBatch {
    type Item = Mutation;
    type IntoIter = std::vec::IntoIter<Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.into_iter()
    }
}

/// A table store that can apply a batch of upserts atomically.
///
/// Primary-key semantics belong to the destination; nothing here inspects them.
pub trait Destination {
    fn upsert(&self, table: &str, columns: &Arc<[String]>, record: Record) -> Mutation {
        Mutation::insert_or_update(table, Arc::clone(columns), record)
    }

    /// Commits every mutation in `batch` or none of them.
    fn apply(&mut self, batch: WriteBatch) -> Result<(), LoadError>;
}

impl ToSql for Value {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Int64(v) => DuckValue::BigInt(*v),
            Value::Float64(v) => DuckValue::Double(*v),
            Value::Bool(v) => DuckValue::Boolean(*v),
            Value::Text(v) => DuckValue::Text(v.clone()),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

/// Writes batches into a DuckDB file laid out as
/// `<data_dir>/<project>/<instance>/<database>.duckdb`.
pub struct DuckDbDestination {
    pool: Pool<DuckDBConnectionManager>,
    address: DatabaseAddress,
    db_path: PathBuf,
}

impl DuckDbDestination {
    pub fn connect(config: &DatabaseConfig, address: DatabaseAddress) -> Result<Self, LoadError> {
        let db_path = database_path(
            &config.data_dir,
            &address.project,
            &address.instance,
            &address.database,
        );

        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                info!("Creating database directory: {}", parent.display());
                std::fs::create_dir_all(parent).map_err(LoadError::write)?;
            }
        }

        info!("Connecting to {} at {}", address, db_path.display());
        let timeout = Duration::from_secs(config.connect_timeout_secs);
        let pool = build_pool(&db_path, config.pool_size, timeout).map_err(LoadError::write)?;

        Ok(Self {
            pool,
            address,
            db_path,
        })
    }

    pub fn address(&self) -> &DatabaseAddress {
        &self.address
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl Destination for DuckDbDestination {
    fn apply(&mut self, batch: WriteBatch) -> Result<(), LoadError> {
        let mut conn = self.pool.get().map_err(LoadError::write)?;
        let tx = conn.transaction().map_err(LoadError::write)?;

        let count = batch.len();
        for mutation in batch {
            let sql = insert_or_replace_sql(&mutation.table, &mutation.columns);
            let mut stmt = tx.prepare_cached(&sql).map_err(LoadError::write)?;
            stmt.execute(duckdb::params_from_iter(mutation.record.into_values()))
                .map_err(LoadError::write)?;
        }

        tx.commit().map_err(LoadError::write)?;
        debug!("Committed {} mutations to {}", count, self.address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use duckdb::Connection;
    use tempfile::TempDir;

    fn address() -> DatabaseAddress {
        DatabaseAddress {
            project: "project".into(),
            instance: "instance".into(),
            database: "database".into(),
        }
    }

    fn setup(dir: &TempDir) -> DatabaseConfig {
        let config = DatabaseConfig {
            data_dir: dir.path().to_path_buf(),
            pool_size: 1,
            connect_timeout_secs: 5,
        };
        let path = database_path(&config.data_dir, "project", "instance", "database");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE Testing (
                ColInt64 BIGINT PRIMARY KEY,
                ColString VARCHAR NOT NULL,
                ColDate DATE NOT NULL
            )",
        )
        .unwrap();
        config
    }

    fn batch(rows: Vec<(i64, &str, &str)>) -> WriteBatch {
        let columns: Arc<[String]> =
            vec!["ColInt64".to_string(), "ColString".to_string(), "ColDate".to_string()].into();
        let mut batch = WriteBatch::new();
        for (id, name, date) in rows {
            let record = Record::new(vec![
                Value::Int64(id),
                Value::Text(name.into()),
                Value::Text(date.into()),
            ]);
            batch.push(Mutation::insert_or_update("Testing", Arc::clone(&columns), record));
        }
        batch
    }

    fn read_rows(config: &DatabaseConfig) -> Vec<(i64, String, String)> {
        let path = database_path(&config.data_dir, "project", "instance", "database");
        let conn = Connection::open(path).unwrap();
        let mut stmt = conn
            .prepare("SELECT ColInt64, ColString, CAST(ColDate AS VARCHAR) FROM Testing ORDER BY ColInt64")
            .unwrap();
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        rows
    }

    #[test]
    fn test_address_display() {
        assert_eq!(
            address().to_string(),
            "projects/project/instances/instance/databases/database"
        );
    }

    #[test]
    fn test_apply_commits_batch() {
        let dir = TempDir::new().unwrap();
        let config = setup(&dir);

        let mut destination = DuckDbDestination::connect(&config, address()).unwrap();
        destination
            .apply(batch(vec![(1, "foo", "2018-02-03"), (2, "bar", "2018-02-04")]))
            .unwrap();
        drop(destination);

        assert_eq!(
            read_rows(&config),
            vec![
                (1, "foo".to_string(), "2018-02-03".to_string()),
                (2, "bar".to_string(), "2018-02-04".to_string()),
            ]
        );
    }

    #[test]
    fn test_apply_replaces_existing_key() {
        let dir = TempDir::new().unwrap();
        let config = setup(&dir);

        let mut destination = DuckDbDestination::connect(&config, address()).unwrap();
        destination.apply(batch(vec![(1, "foo", "2018-02-03")])).unwrap();
        destination.apply(batch(vec![(1, "baz", "2019-01-01")])).unwrap();
        drop(destination);

        assert_eq!(read_rows(&config), vec![(1, "baz".to_string(), "2019-01-01".to_string())]);
    }

    #[test]
    fn test_duplicate_key_in_batch_last_wins() {
        let dir = TempDir::new().unwrap();
        let config = setup(&dir);

        let mut destination = DuckDbDestination::connect(&config, address()).unwrap();
        destination
            .apply(batch(vec![
                (1, "foo", "2018-02-03"),
                (2, "bar", "2018-02-04"),
                (1, "baz", "2019-01-01"),
            ]))
            .unwrap();
        drop(destination);

        assert_eq!(
            read_rows(&config),
            vec![
                (1, "baz".to_string(), "2019-01-01".to_string()),
                (2, "bar".to_string(), "2018-02-04".to_string()),
            ]
        );
    }

    #[test]
    fn test_rejected_row_rolls_back_batch() {
        let dir = TempDir::new().unwrap();
        let config = setup(&dir);

        let mut destination = DuckDbDestination::connect(&config, address()).unwrap();
        let err = destination
            .apply(batch(vec![(1, "foo", "2018-02-03"), (2, "bar", "not-a-date")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Write);
        drop(destination);

        assert!(read_rows(&config).is_empty());
    }

    #[test]
    fn test_missing_table_is_write_error() {
        let dir = TempDir::new().unwrap();
        let config = setup(&dir);

        let mut destination = DuckDbDestination::connect(&config, address()).unwrap();
        let columns: Arc<[String]> = vec!["id".to_string()].into();
        let mut batch = WriteBatch::new();
        batch.push(destination.upsert("Missing", &columns, Record::new(vec![Value::Int64(1)])));

        let err = destination.apply(batch).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Write);
    }

    #[test]
    fn test_empty_batch_commits() {
        let dir = TempDir::new().unwrap();
        let config = setup(&dir);

        let mut destination = DuckDbDestination::connect(&config, address()).unwrap();
        destination.apply(WriteBatch::new()).unwrap();
    }
}
