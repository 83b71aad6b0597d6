use super::{backquote, Cell, ColumnDef, CountStrategy, Datastore, DatastoreError, Row, UpdateStatement};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// SQLite-backed datastore.
#[derive(Clone)]
pub struct SqliteDatastore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatastore {
    /// Open a file-backed datastore.
    pub fn open(path: &Path) -> Result<Self, DatastoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory datastore (for testing).
    pub fn memory() -> Result<Self, DatastoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, DatastoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatastoreError> {
        self.conn.lock().map_err(|_| DatastoreError::Poisoned)
    }

    /// Run `f` against the underlying connection.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, DatastoreError> {
        let conn = self.lock()?;
        Ok(f(&conn)?)
    }

    pub fn execute_batch(&self, sql: &str) -> Result<(), DatastoreError> {
        self.with_connection(|conn| conn.execute_batch(sql))
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, DatastoreError> {
        self.with_connection(|conn| table_exists(conn, table))
    }

    /// Name of an index whose first column is `column`.
    fn index_leading_with(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<Option<String>> {
        for index in index_list(conn, table)? {
            // Expression indexes report a NULL column name.
            let leading: Option<String> = conn
                .query_row(
                    &format!("PRAGMA index_info({})", backquote(&index.name)),
                    [],
                    |row| row.get::<_, Option<String>>(2),
                )
                .optional()?
                .flatten();
            if leading.as_deref() == Some(column) {
                return Ok(Some(index.name));
            }
        }
        Ok(None)
    }
}

struct IndexEntry {
    name: String,
    origin: String,
}

fn index_list(conn: &Connection, table: &str) -> rusqlite::Result<Vec<IndexEntry>> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", backquote(table)))?;
    let rows = stmt.query_map([], |row| {
        Ok(IndexEntry {
            name: row.get(1)?,
            origin: row.get(3)?,
        })
    })?;
    rows.collect()
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn to_cell(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(i) => Cell::Integer(i),
        ValueRef::Real(f) => Cell::Real(f),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => Cell::Text(s.to_string()),
            Err(_) => Cell::RawText(bytes.to_vec()),
        },
        ValueRef::Blob(bytes) => Cell::Blob(bytes.to_vec()),
    }
}

fn to_sql(cell: &Cell) -> SqlValue {
    match cell {
        Cell::Null => SqlValue::Null,
        Cell::Integer(i) => SqlValue::Integer(*i),
        Cell::Real(f) => SqlValue::Real(*f),
        Cell::Text(s) => SqlValue::Text(s.clone()),
        Cell::RawText(b) | Cell::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

/// Placeholder `?n` for `cell`. Raw text is bound as a blob and cast back so
/// the value keeps the TEXT storage class.
fn placeholder(cell: &Cell, n: usize) -> String {
    match cell {
        Cell::RawText(_) => format!("CAST(?{n} AS TEXT)"),
        _ => format!("?{n}"),
    }
}

impl Datastore for SqliteDatastore {
    fn list_tables(&self) -> Result<Vec<String>, DatastoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )?;
            let names = stmt.query_map([], |row| row.get(0))?;
            names.collect()
        })
    }

    fn describe(&self, table: &str) -> Result<Vec<ColumnDef>, DatastoreError> {
        let columns = self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", backquote(table)))?;
            let rows = stmt.query_map([], |row| {
                let pk: i64 = row.get(5)?;
                Ok(ColumnDef {
                    name: row.get(1)?,
                    declared_type: row.get(2)?,
                    primary_key: pk > 0,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;
        if columns.is_empty() {
            return Err(DatastoreError::NoSuchTable(table.to_string()));
        }
        Ok(columns)
    }

    fn count(&self, table: &str, strategy: &CountStrategy) -> Result<u64, DatastoreError> {
        let conn = self.lock()?;
        let index = match strategy {
            CountStrategy::Unindexed => None,
            CountStrategy::PrimaryIndex => {
                let pk = index_list(&conn, table)?
                    .into_iter()
                    .find(|idx| idx.origin == "pk")
                    .map(|idx| idx.name);
                Some(pk.ok_or_else(|| {
                    DatastoreError::Query(format!("no primary key index on {table}"))
                })?)
            }
            CountStrategy::ColumnIndex(column) => {
                let idx = Self::index_leading_with(&conn, table, column)?;
                Some(idx.ok_or_else(|| {
                    DatastoreError::Query(format!("no index on {table}.{column}"))
                })?)
            }
        };

        let sql = match index {
            Some(index) => format!(
                "SELECT COUNT(*) FROM {} INDEXED BY {}",
                backquote(table),
                backquote(&index)
            ),
            None => format!("SELECT COUNT(*) FROM {}", backquote(table)),
        };
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn fetch_page(&self, table: &str, offset: u64, limit: u64) -> Result<Vec<Row>, DatastoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM {} LIMIT ?1 OFFSET ?2",
                backquote(table)
            ))?;
            let width = stmt.column_count();
            let rows = stmt.query_map([limit, offset], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(to_cell))
                    .collect::<rusqlite::Result<Row>>()
            })?;
            rows.collect()
        })
    }

    fn execute(&self, statement: &UpdateStatement) -> Result<usize, DatastoreError> {
        let mut params: Vec<SqlValue> = Vec::with_capacity(statement.set.len() + statement.filter.len());
        let set = statement
            .set
            .iter()
            .map(|(col, cell)| {
                params.push(to_sql(cell));
                format!("{} = {}", backquote(col), placeholder(cell, params.len()))
            })
            .collect::<Vec<_>>()
            .join(", ");
        let filter = statement
            .filter
            .iter()
            .map(|(col, cell)| match cell {
                Cell::Null => format!("{} IS NULL", backquote(col)),
                _ => {
                    params.push(to_sql(cell));
                    format!("{} = {}", backquote(col), placeholder(cell, params.len()))
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            backquote(&statement.table),
            set,
            filter
        );
        self.with_connection(|conn| conn.execute(&sql, params_from_iter(params.iter())))
    }

    fn server_version(&self) -> Result<String, DatastoreError> {
        Ok(rusqlite::version().to_string())
    }

    fn create_statement(&self, table: &str) -> Result<String, DatastoreError> {
        let sql: Option<String> = self.with_connection(|conn| {
            conn.query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()
        })?;
        sql.ok_or_else(|| DatastoreError::NoSuchTable(table.to_string()))
    }
}
