//! Bulk search/replace across the application's tables.
//!
//! Flow:
//! 1. Resolve prefixed tables (optionally restricted to a named subset)
//! 2. Describe each table and find its primary key
//! 3. Count rows, falling back through cheaper-to-riskier strategies
//! 4. Page through rows, shrinking the page on fetch failures
//! 5. Rewrite each row and update it keyed by its original primary key
//!
//! Per-row problems are collected in the report; a table that cannot be
//! described or paged marks the whole report fatal.

pub mod fold;
mod row;

use crate::datastore::{ColumnDef, CountStrategy, Datastore, DatastoreError, Row};
use crate::errors::ErrorKind;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Rows fetched per page.
pub const PAGE_SIZE: u64 = 50_000;

/// Smaller page sizes tried, in order, after a page fetch fails.
pub const FALLBACK_PAGE_SIZES: [u64; 2] = [2_000, 500];

/// Rewrite errors that prevent any table from being processed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RewriteError {
    #[error("Syntax Error")]
    Syntax,

    #[error("Could not get list of tables:{0}")]
    TableListing(DatastoreError),

    #[error("The specified database table(s) could not be found")]
    NoTablesFound,
}

impl RewriteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Syntax => ErrorKind::SyntaxError,
            Self::TableListing(_) => ErrorKind::FatalStoreError,
            Self::NoTablesFound => ErrorKind::NotFound,
        }
    }
}

/// What to replace and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteSpec {
    pub search: String,
    pub replace: String,
    /// Table names without the prefix; empty means every prefixed table.
    pub tables: BTreeSet<String>,
    /// Also rewrite primary-key columns. The WHERE clause still uses the
    /// original values.
    pub include_primary_keys: bool,
}

impl RewriteSpec {
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
            tables: BTreeSet::new(),
            include_primary_keys: false,
        }
    }

    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.is_empty())
            .collect();
        self
    }

    /// Parse `<search>^<replace>[:<t1,t2,...>]`.
    ///
    /// The table list is whatever follows the last `:`, so a replacement
    /// containing a colon must be followed by `:` (an empty table list). The
    /// search term is everything before the first `^`.
    pub fn parse_argument(argument: &str) -> Result<Self, RewriteError> {
        let (body, tables) = match argument.rsplit_once(':') {
            Some((body, tables)) => (body, tables),
            None => (argument, ""),
        };
        let (search, replace) = body.split_once('^').ok_or(RewriteError::Syntax)?;
        if search.is_empty() {
            return Err(RewriteError::Syntax);
        }
        Ok(Self::new(search, replace).with_tables(tables.split(',')))
    }
}

/// Outcome of one rewrite run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteReport {
    pub tables_scanned: u64,
    pub rows_scanned: u64,
    /// Rows with at least one changed column.
    pub rows_changed: u64,
    pub rows_updated: u64,
    #[serde(rename = "duration_secs", serialize_with = "as_secs_f64")]
    pub duration: Duration,
    pub errors: Vec<String>,
    /// A table could not be described or paged; counters are not reported.
    pub fatal: bool,
}

fn as_secs_f64<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl RewriteReport {
    fn fail(&mut self, message: String) {
        tracing::error!(error = %message, "rewrite table failed");
        self.errors.push(message);
        self.fatal = true;
    }

    /// Dominant error kind, if any error was recorded.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        if self.fatal {
            Some(ErrorKind::FatalStoreError)
        } else if !self.errors.is_empty() {
            Some(ErrorKind::PartialFailure)
        } else {
            None
        }
    }
}

/// Runs a [`RewriteSpec`] against a [`Datastore`].
pub struct RewriteEngine<'a> {
    datastore: &'a dyn Datastore,
    table_prefix: &'a str,
}

impl<'a> RewriteEngine<'a> {
    pub fn new(datastore: &'a dyn Datastore, table_prefix: &'a str) -> Self {
        Self {
            datastore,
            table_prefix,
        }
    }

    /// Prefixed tables selected by `spec`, in datastore order.
    pub fn resolve_tables(&self, spec: &RewriteSpec) -> Result<Vec<String>, RewriteError> {
        let all = self
            .datastore
            .list_tables()
            .map_err(RewriteError::TableListing)?;
        let tables: Vec<String> = all
            .into_iter()
            .filter(|table| match table.strip_prefix(self.table_prefix) {
                Some(bare) => spec.tables.is_empty() || spec.tables.contains(bare),
                None => false,
            })
            .collect();
        if tables.is_empty() {
            return Err(RewriteError::NoTablesFound);
        }
        Ok(tables)
    }

    pub fn rewrite(&self, spec: &RewriteSpec) -> Result<RewriteReport, RewriteError> {
        let tables = self.resolve_tables(spec)?;
        let started = Instant::now();
        let mut report = RewriteReport::default();

        tracing::info!(tables = tables.len(), "rewrite started");
        for table in &tables {
            report.tables_scanned += 1;
            self.rewrite_table(table, spec, &mut report);
        }
        report.duration = started.elapsed();

        tracing::info!(
            tables = report.tables_scanned,
            rows = report.rows_scanned,
            changed = report.rows_changed,
            updated = report.rows_updated,
            errors = report.errors.len(),
            fatal = report.fatal,
            "rewrite finished"
        );
        Ok(report)
    }

    fn rewrite_table(&self, table: &str, spec: &RewriteSpec, report: &mut RewriteReport) {
        let columns = match self.datastore.describe(table) {
            Ok(columns) => columns,
            Err(e) => {
                report.fail(format!("\"{table}\": could not read columns: {e}"));
                return;
            }
        };

        let row_count = match self.count_rows(table, &columns) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(table, error = %e, "row count failed");
                report
                    .errors
                    .push(format!("\"{table}\": could not count rows: {e}"));
                return;
            }
        };
        tracing::debug!(table, rows = row_count, "scanning table");

        let mut page_size = PAGE_SIZE;
        let mut offset = 0;
        let mut row_number = 0;
        while offset < row_count {
            let (rows, used) = match self.fetch_page(table, offset, page_size) {
                Ok(page) => page,
                Err(e) => {
                    report.fail(format!("\"{table}\": {e}"));
                    return;
                }
            };
            page_size = used;
            if rows.is_empty() {
                break;
            }

            for row in &rows {
                row_number += 1;
                report.rows_scanned += 1;
                let outcome = row::process_row(self.datastore, table, &columns, row, spec, row_number);
                report.rows_changed += u64::from(outcome.changed);
                report.rows_updated += u64::from(outcome.updated);
                report.errors.extend(outcome.errors);
            }
            offset += page_size;
        }
    }

    fn count_rows(&self, table: &str, columns: &[ColumnDef]) -> Result<u64, DatastoreError> {
        let mut strategies = Vec::with_capacity(3);
        if let Some(pk) = columns.iter().find(|c| c.primary_key) {
            strategies.push(CountStrategy::PrimaryIndex);
            strategies.push(CountStrategy::ColumnIndex(pk.name.clone()));
        }
        strategies.push(CountStrategy::Unindexed);

        let mut last_err = None;
        for strategy in &strategies {
            match self.datastore.count(table, strategy) {
                Ok(n) => return Ok(n),
                Err(e) => {
                    tracing::debug!(table, ?strategy, error = %e, "count strategy failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| DatastoreError::Query(format!("cannot count {table}"))))
    }

    /// Fetch one page, retrying with smaller pages. Returns the rows and the
    /// page size that worked.
    fn fetch_page(&self, table: &str, offset: u64, page_size: u64) -> Result<(Vec<Row>, u64), DatastoreError> {
        let mut size = page_size;
        loop {
            match self.datastore.fetch_page(table, offset, size) {
                Ok(rows) => return Ok((rows, size)),
                Err(e) => match FALLBACK_PAGE_SIZES.iter().copied().find(|s| *s < size) {
                    Some(smaller) => {
                        tracing::warn!(table, offset, size, smaller, error = %e, "page fetch failed, retrying smaller");
                        size = smaller;
                    }
                    None => return Err(e),
                },
            }
        }
    }
}

/// Wire rendering of a finished rewrite.
///
/// Fatal reports print only their errors; otherwise the counters follow
/// `DBSRDONE:` and each partial error gets its own `ERR:` line.
pub fn render_report(report: &RewriteReport) -> String {
    if report.fatal {
        return format!("ERR:{}", report.errors.join("\n"));
    }
    let mut out = format!(
        "DBSRDONE:t{}:r{}:c{}:u{}:d{:.6}:",
        report.tables_scanned,
        report.rows_scanned,
        report.rows_changed,
        report.rows_updated,
        report.duration.as_secs_f64()
    );
    for error in &report.errors {
        out.push_str("\nERR:");
        out.push_str(error);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_argument_forms() {
        let spec = RewriteSpec::parse_argument("old^new").unwrap();
        assert_eq!(spec.search, "old");
        assert_eq!(spec.replace, "new");
        assert!(spec.tables.is_empty());

        let spec = RewriteSpec::parse_argument("http://a^https://b:").unwrap();
        assert_eq!(spec.search, "http://a");
        assert_eq!(spec.replace, "https://b");
        assert!(spec.tables.is_empty());

        let spec = RewriteSpec::parse_argument("old^new:options,posts").unwrap();
        assert_eq!(spec.search, "old");
        assert_eq!(spec.replace, "new");
        assert_eq!(
            spec.tables.iter().cloned().collect::<Vec<_>>(),
            vec!["options", "posts"]
        );
    }

    #[test]
    fn test_parse_argument_tables_after_last_colon() {
        let spec = RewriteSpec::parse_argument("http://a^http://b:options").unwrap();
        assert_eq!(spec.search, "http://a");
        assert_eq!(spec.replace, "http://b");
        assert!(spec.tables.contains("options"));

        // Without the trailing colon the replacement's own colon splits.
        let spec = RewriteSpec::parse_argument("http://a^https://b").unwrap();
        assert_eq!(spec.replace, "https");
        assert!(spec.tables.contains("//b"));
    }

    #[test]
    fn test_parse_argument_rejects_missing_parts() {
        assert_eq!(RewriteSpec::parse_argument("nocaret"), Err(RewriteError::Syntax));
        assert_eq!(RewriteSpec::parse_argument("^x"), Err(RewriteError::Syntax));
    }

    #[test]
    fn test_empty_replacement_allowed() {
        let spec = RewriteSpec::parse_argument("x^").unwrap();
        assert_eq!(spec.replace, "");
    }

    #[test]
    fn test_render_clean_report() {
        let report = RewriteReport {
            tables_scanned: 2,
            rows_scanned: 10,
            rows_changed: 3,
            rows_updated: 3,
            duration: Duration::from_millis(1500),
            ..Default::default()
        };
        assert_eq!(render_report(&report), "DBSRDONE:t2:r10:c3:u3:d1.500000:");
    }

    #[test]
    fn test_render_partial_and_fatal() {
        let mut report = RewriteReport {
            tables_scanned: 1,
            rows_scanned: 1,
            rows_changed: 1,
            errors: vec!["\"app_log\" has no primary key, manual change needed on row 1.".to_string()],
            ..Default::default()
        };
        assert_eq!(
            render_report(&report),
            "DBSRDONE:t1:r1:c1:u0:d0.000000:\nERR:\"app_log\" has no primary key, manual change needed on row 1."
        );

        report.fatal = true;
        assert!(render_report(&report).starts_with("ERR:\"app_log\""));
    }

    #[test]
    fn test_report_serializes_duration_as_seconds() {
        let report = RewriteReport {
            duration: Duration::from_millis(250),
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["duration_secs"], serde_json::json!(0.25));
        assert_eq!(json["fatal"], serde_json::json!(false));
    }
}
