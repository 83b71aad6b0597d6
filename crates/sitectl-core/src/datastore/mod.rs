//! Relational datastore of the managed application.
//!
//! The rewrite engine and the database handlers only see the [`Datastore`]
//! trait; [`SqliteDatastore`] is the bundled implementation.

mod sqlite;

pub use sqlite::SqliteDatastore;
pub(crate) use sqlite::table_exists;

use crate::errors::ErrorKind;
use thiserror::Error;

/// Datastore errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatastoreError {
    #[error("{0}")]
    Query(String),

    #[error("Table not found: {0}")]
    NoSuchTable(String),

    #[error("Datastore lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for DatastoreError {
    fn from(e: rusqlite::Error) -> Self {
        DatastoreError::Query(e.to_string())
    }
}

impl DatastoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSuchTable(_) => ErrorKind::NotFound,
            Self::Query(_) | Self::Poisoned => ErrorKind::FatalStoreError,
        }
    }
}

/// One stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    /// TEXT storage class holding bytes that are not valid UTF-8.
    RawText(Vec<u8>),
    Blob(Vec<u8>),
}

impl Cell {
    /// Raw bytes of textual cells; numeric and NULL cells have none.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Cell::Text(s) => Some(s.as_bytes()),
            Cell::RawText(b) | Cell::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// SQL literal for dumps and rendered statements.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Cell::Null => "NULL".to_string(),
            Cell::Integer(i) => i.to_string(),
            Cell::Real(f) => f.to_string(),
            Cell::Text(s) => format!("'{}'", sql_escape(s)),
            Cell::RawText(b) => format!("CAST(X'{}' AS TEXT)", hex::encode(b)),
            Cell::Blob(b) => format!("X'{}'", hex::encode(b)),
        }
    }
}

/// Column metadata, in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub declared_type: String,
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, primary_key: bool) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            primary_key,
        }
    }

    /// Integer-affinity columns are dumped unquoted.
    pub fn is_integer(&self) -> bool {
        self.declared_type.to_ascii_uppercase().contains("INT")
    }
}

/// Positional row, aligned with [`Datastore::describe`].
pub type Row = Vec<Cell>;

/// How to count a table's rows, cheapest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountStrategy {
    /// Count through the primary-key index.
    PrimaryIndex,
    /// Count through an index whose leading column is the given one.
    ColumnIndex(String),
    /// Plain scan.
    Unindexed,
}

/// `UPDATE <table> SET <set...> WHERE <filter...>`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub set: Vec<(String, Cell)>,
    pub filter: Vec<(String, Cell)>,
}

impl UpdateStatement {
    /// Escaped SQL text, as logged and reported.
    pub fn to_sql(&self) -> String {
        let set = self
            .set
            .iter()
            .map(|(col, cell)| format!("{} = {}", backquote(col), cell.to_sql_literal()))
            .collect::<Vec<_>>()
            .join(", ");
        let filter = self
            .filter
            .iter()
            .map(|(col, cell)| match cell {
                Cell::Null => format!("{} IS NULL", backquote(col)),
                _ => format!("{} = {}", backquote(col), cell.to_sql_literal()),
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        format!("UPDATE {} SET {} WHERE {}", backquote(&self.table), set, filter)
    }
}

/// Query surface the rewrite engine and database handlers depend on.
pub trait Datastore: Send + Sync {
    /// Every table name, sorted.
    fn list_tables(&self) -> Result<Vec<String>, DatastoreError>;

    fn describe(&self, table: &str) -> Result<Vec<ColumnDef>, DatastoreError>;

    fn count(&self, table: &str, strategy: &CountStrategy) -> Result<u64, DatastoreError>;

    fn fetch_page(&self, table: &str, offset: u64, limit: u64) -> Result<Vec<Row>, DatastoreError>;

    /// Returns the number of rows affected.
    fn execute(&self, statement: &UpdateStatement) -> Result<usize, DatastoreError>;

    fn server_version(&self) -> Result<String, DatastoreError>;

    /// DDL that recreates `table`.
    fn create_statement(&self, table: &str) -> Result<String, DatastoreError>;
}

/// Quote an identifier with backquotes, doubling embedded ones.
pub fn backquote(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Backslash-escape backslashes and single quotes.
pub fn sql_addslashes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// [`sql_addslashes`] plus control-character escapes used in dumps.
pub fn sql_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in sql_addslashes(s).chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out
}
