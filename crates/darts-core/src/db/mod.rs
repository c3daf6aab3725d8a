//! Database handle: a directory holding `Darts.db`, served by a connection pool.
//!
//! Statement helpers never raise into entity code. A failing statement is
//! logged at error level with its rendered SQL and the full error chain, and
//! the caller sees `false`, `None` or an empty list. The `try_` variants return
//! the error for callers (migration, merge) that must abort on the first failure.

pub mod value;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params_from_iter, Connection, DatabaseName, OpenFlags, Row};

use crate::entity::version::VersionEntity;
use crate::entity::Entity;
use crate::error::{DartsError, Result};
use crate::fs;

use self::value::{render_statement, SqlValue};

/// File name of the SQLite database inside a database directory.
pub const DATABASE_FILE_NAME: &str = "Darts.db";

static TEMP_TABLE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Tunables for a database handle.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Maximum connections held by the pool.
    pub pool_size: u32,
    /// Log every statement at info level instead of trace.
    pub trace_sql: bool,
    /// How long a connection waits on a locked database.
    pub busy_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            pool_size: 5,
            trace_sql: false,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// A database directory and, while open, its connection pool.
pub struct Database {
    directory: PathBuf,
    config: DatabaseConfig,
    pool: RwLock<Option<Pool<SqliteConnectionManager>>>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("directory", &self.directory)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Database {
    /// A handle for `directory` with no pool yet.
    pub fn new(directory: impl Into<PathBuf>, config: DatabaseConfig) -> Self {
        Self {
            directory: directory.into(),
            config,
            pool: RwLock::new(None),
        }
    }

    /// Create the directory if needed and open the connection pool.
    pub fn open(directory: impl Into<PathBuf>, config: DatabaseConfig) -> Result<Self> {
        let database = Self::new(directory, config);
        database.initialise_connection_pool()?;
        Ok(database)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn file_path(&self) -> PathBuf {
        self.directory.join(DATABASE_FILE_NAME)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.pool.read().map(|pool| pool.is_some()).unwrap_or(false)
    }

    /// (Re)build the pool against the database file. Idempotent.
    pub fn initialise_connection_pool(&self) -> Result<()> {
        std::fs::create_dir_all(&self.directory)?;

        let timeout = self.config.busy_timeout;
        let manager = SqliteConnectionManager::file(self.file_path())
            .with_init(move |conn| conn.busy_timeout(timeout));
        let pool = Pool::builder()
            .max_size(self.config.pool_size.max(1))
            .min_idle(Some(1))
            .connection_timeout(Duration::from_secs(10))
            .build(manager)?;

        let mut guard = self
            .pool
            .write()
            .map_err(|_| DartsError::Database("Connection pool lock poisoned".to_string()))?;
        *guard = Some(pool);
        log::debug!("Opened connection pool for {}", self.file_path().display());
        Ok(())
    }

    /// Close every pooled connection. Later statements fail until the pool is
    /// initialised again.
    pub fn shutdown(&self) -> bool {
        match self.pool.write() {
            Ok(mut guard) => {
                if guard.take().is_some() {
                    log::debug!("Closed connection pool for {}", self.file_path().display());
                }
                true
            }
            Err(_) => {
                log::error!("Failed to shut down {}: pool lock poisoned", self.directory.display());
                false
            }
        }
    }

    pub fn borrow_connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        let pool = self
            .pool
            .read()
            .map_err(|_| DartsError::Database("Connection pool lock poisoned".to_string()))?
            .clone()
            .ok_or_else(|| {
                DartsError::Database(format!(
                    "Database at {} is not open",
                    self.directory.display()
                ))
            })?;
        Ok(pool.get()?)
    }

    /// Check that the directory holds a readable SQLite database, without
    /// creating one and without touching the pool.
    pub fn test_connection(&self) -> bool {
        let path = self.file_path();
        if !path.is_file() {
            log::warn!("No database file at {}", path.display());
            return false;
        }

        let result = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .and_then(|conn| {
                conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
                    row.get::<_, i64>(0)
                })
            });
        match result {
            Ok(_) => true,
            Err(err) => {
                log::warn!("Connection test failed for {}: {}", path.display(), err);
                false
            }
        }
    }

    fn trace(&self, sql: &str, params: &[SqlValue]) {
        if self.config.trace_sql {
            log::info!("{}", render_statement(sql, params));
        } else if log::log_enabled!(log::Level::Trace) {
            log::trace!("{}", render_statement(sql, params));
        }
    }

    fn run<T>(
        &self,
        sql: &str,
        params: &[SqlValue],
        op: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        self.trace(sql, params);

        let conn = match self.borrow_connection() {
            Ok(conn) => conn,
            Err(err) => {
                log::error!(
                    "No connection for statement: {}\n{}",
                    render_statement(sql, params),
                    err
                );
                return Err(err);
            }
        };

        op(&conn).map_err(|err| {
            log_sql_error(&render_statement(sql, params), &err);
            DartsError::from(err)
        })
    }

    /// Run a write statement, returning the affected row count.
    pub fn try_execute_update(&self, sql: &str, params: &[SqlValue]) -> Result<usize> {
        self.run(sql, params, |conn| {
            conn.execute(sql, params_from_iter(params.iter()))
        })
    }

    pub fn execute_update(&self, sql: &str, params: &[SqlValue]) -> bool {
        self.try_execute_update(sql, params).is_ok()
    }

    /// Run a query, mapping each row with `map`.
    pub fn query_rows<T, F>(&self, sql: &str, params: &[SqlValue], map: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.run(sql, params, |conn| {
            let mut statement = conn.prepare(sql)?;
            let rows = statement.query_map(params_from_iter(params.iter()), map)?;
            let collected: rusqlite::Result<Vec<T>> = rows.collect();
            collected
        })
    }

    /// First column of the first row as an integer, e.g. for `COUNT(*)`.
    pub fn execute_query_aggregate(&self, sql: &str, params: &[SqlValue]) -> Option<i64> {
        self.query_rows(sql, params, |row| row.get::<_, Option<i64>>(0))
            .ok()?
            .into_iter()
            .next()
            .flatten()
    }

    pub fn table_exists(&self, table: &str) -> bool {
        self.execute_query_aggregate(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE",
            &[SqlValue::from(table)],
        )
        .unwrap_or(0)
            > 0
    }

    pub fn column_exists(&self, table: &str, column: &str) -> bool {
        self.execute_query_aggregate(
            "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ? COLLATE NOCASE",
            &[SqlValue::from(table), SqlValue::from(column)],
        )
        .unwrap_or(0)
            > 0
    }

    /// Names of all user tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        self.query_rows(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            &[],
            |row| row.get::<_, String>(0),
        )
        .unwrap_or_default()
    }

    /// Create `table` unless it already exists. Returns true only if it was created.
    pub fn create_table_if_not_exists(&self, table: &str, columns_sql: &str) -> bool {
        if self.table_exists(table) {
            log::debug!("Table {} already exists", table);
            return false;
        }

        let created = self.execute_update(&format!("CREATE TABLE {}({})", table, columns_sql), &[]);
        if created {
            log::info!("Created {} table", table);
        }
        created
    }

    /// Create a scratch table with a unique `zz`-prefixed name and return that name.
    ///
    /// SQLite TEMP tables live on a single connection, which the pool does not
    /// guarantee between statements, so this is an ordinary table the caller
    /// drops when done.
    pub fn create_temp_table(&self, name: &str, columns_sql: &str) -> Option<String> {
        let suffix = TEMP_TABLE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = chrono::Utc::now().timestamp_millis();
        let full_name = format!("zz{}{}{}", name, millis, suffix);

        self.execute_update(&format!("CREATE TABLE {}({})", full_name, columns_sql), &[])
            .then_some(full_name)
    }

    pub fn drop_table(&self, table: &str) -> bool {
        self.execute_update(&format!("DROP TABLE {}", table), &[])
    }

    /// Remove the `DEFAULT` clause from one column.
    ///
    /// SQLite cannot alter a column in place, so the table is rebuilt under a
    /// new name with the same columns, the rows copied across and the indexes
    /// recreated, all in one transaction.
    pub fn drop_column_default(&self, table: &str, column: &str) -> bool {
        let sql = format!("PRAGMA table_info({})", table);
        let result = self.run(&sql, &[], |conn| {
            let columns = {
                let mut statement = conn.prepare(&sql)?;
                let rows = statement.query_map([], |row| {
                    Ok(TableColumn {
                        name: row.get(1)?,
                        declared_type: row.get(2)?,
                        not_null: row.get::<_, i64>(3)? != 0,
                        default: row.get(4)?,
                        primary_key: row.get::<_, i64>(5)? > 0,
                    })
                })?;
                let collected: rusqlite::Result<Vec<TableColumn>> = rows.collect();
                collected?
            };

            let index_sql = {
                let mut statement = conn.prepare(
                    "SELECT sql FROM sqlite_master WHERE type = 'index' AND tbl_name = ? AND sql IS NOT NULL",
                )?;
                let rows = statement.query_map([table], |row| row.get::<_, String>(0))?;
                let collected: rusqlite::Result<Vec<String>> = rows.collect();
                collected?
            };

            let definitions = columns
                .iter()
                .map(|c| c.ddl(column))
                .collect::<Vec<_>>()
                .join(", ");
            let names = columns
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let rebuild = format!("{}_rebuild", table);

            let tx = conn.unchecked_transaction()?;
            tx.execute(&format!("CREATE TABLE {}({})", rebuild, definitions), [])?;
            tx.execute(
                &format!("INSERT INTO {} ({}) SELECT {} FROM {}", rebuild, names, names, table),
                [],
            )?;
            tx.execute(&format!("DROP TABLE {}", table), [])?;
            tx.execute(&format!("ALTER TABLE {} RENAME TO {}", rebuild, table), [])?;
            for index in &index_sql {
                tx.execute(index, [])?;
            }
            tx.commit()
        });

        match result {
            Ok(()) => {
                log::info!("Dropped default from {}.{}", table, column);
                true
            }
            Err(_) => false,
        }
    }

    /// Schema version recorded in the `Version` table, if there is one.
    pub fn get_database_version(&self) -> Option<i32> {
        if !self.table_exists(VersionEntity::table_name()) {
            return None;
        }
        VersionEntity::retrieve_entity(self, "").map(|v| v.version)
    }

    pub fn update_database_version(&self, version: i32) -> bool {
        if !self.table_exists(VersionEntity::table_name()) && !VersionEntity::create_table(self) {
            return false;
        }

        let mut entity = VersionEntity::retrieve_entity(self, "").unwrap_or_default();
        entity.version = version;
        entity.save_to_database(self)
    }

    /// Copy this database into `destination` and return an unopened handle on it.
    ///
    /// Sibling files are copied as they are; the SQLite file itself is written
    /// from a serialized image taken on a pooled connection, so the copy is
    /// consistent even while other connections are open.
    pub fn copy_to(&self, destination: &Path) -> Result<Database> {
        fs::copy_dir_filtered(&self.directory, destination, &is_sqlite_file)?;

        let conn = self.borrow_connection()?;
        let image = conn.serialize(DatabaseName::Main)?;
        fs::write_atomic(&destination.join(DATABASE_FILE_NAME), &image)?;

        Ok(Database::new(destination, self.config.clone()))
    }
}

struct TableColumn {
    name: String,
    declared_type: String,
    not_null: bool,
    default: Option<String>,
    primary_key: bool,
}

impl TableColumn {
    fn ddl(&self, without_default: &str) -> String {
        let mut ddl = format!("{} {}", self.name, self.declared_type);
        if self.primary_key {
            ddl.push_str(" PRIMARY KEY");
        } else if self.not_null {
            ddl.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            if !self.name.eq_ignore_ascii_case(without_default) {
                ddl.push_str(" DEFAULT ");
                ddl.push_str(default);
            }
        }
        ddl
    }
}

fn is_sqlite_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(DATABASE_FILE_NAME))
        .unwrap_or(false)
}

fn log_sql_error(statement: &str, err: &(dyn std::error::Error + 'static)) {
    let mut message = format!("Caught SQL error for statement: {}\n{}", statement, err);
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!("\nCaused by: {}", cause));
        source = cause.source();
    }
    log::error!("{}", message);
}
