//! RewriteEngine against a real SQLite datastore, with failure injection.

use sitectl_core::datastore::{
    Cell, ColumnDef, CountStrategy, Datastore, DatastoreError, Row, SqliteDatastore,
    UpdateStatement,
};
use sitectl_core::errors::ErrorKind;
use sitectl_core::rewrite::{render_report, RewriteEngine, RewriteError, RewriteSpec};
use std::sync::Mutex;

const PREFIX: &str = "app_";

fn seeded() -> SqliteDatastore {
    let ds = SqliteDatastore::memory().unwrap();
    sitectl_core::app::install_schema(&ds, PREFIX).unwrap();
    ds.execute_batch(
        r#"
        INSERT INTO app_options (option_name, option_value) VALUES
            ('siteurl', 'http://old.test'),
            ('home', 'http://old.test/'),
            ('sidebar', 'a:2:{i:0;s:15:"http://old.test";s:4:"keep";i:7;}'),
            ('unrelated', 'nothing to see');
        INSERT INTO app_posts (post_title, post_content, guid) VALUES
            ('Hello', 'Visit http://old.test today', 'http://old.test/?p=1');
        "#,
    )
    .unwrap();
    ds
}

/// Fails selected calls before delegating to SQLite.
struct Flaky {
    inner: SqliteDatastore,
    /// Page fetches above this size fail.
    max_page: u64,
    fail_listing: bool,
    fail_indexed_counts: bool,
    fail_describe_of: Option<&'static str>,
    /// Updates report zero affected rows without running.
    stale_updates: bool,
    page_sizes: Mutex<Vec<u64>>,
}

impl Flaky {
    fn new(inner: SqliteDatastore) -> Self {
        Self {
            inner,
            max_page: u64::MAX,
            fail_listing: false,
            fail_indexed_counts: false,
            fail_describe_of: None,
            stale_updates: false,
            page_sizes: Mutex::new(Vec::new()),
        }
    }
}

impl Datastore for Flaky {
    fn list_tables(&self) -> Result<Vec<String>, DatastoreError> {
        if self.fail_listing {
            return Err(DatastoreError::Query("server has gone away".into()));
        }
        self.inner.list_tables()
    }

    fn describe(&self, table: &str) -> Result<Vec<ColumnDef>, DatastoreError> {
        if self.fail_describe_of == Some(table) {
            return Err(DatastoreError::Query("describe denied".into()));
        }
        self.inner.describe(table)
    }

    fn count(&self, table: &str, strategy: &CountStrategy) -> Result<u64, DatastoreError> {
        if self.fail_indexed_counts && *strategy != CountStrategy::Unindexed {
            return Err(DatastoreError::Query("no such index".into()));
        }
        self.inner.count(table, strategy)
    }

    fn fetch_page(&self, table: &str, offset: u64, limit: u64) -> Result<Vec<Row>, DatastoreError> {
        self.page_sizes.lock().unwrap().push(limit);
        if limit > self.max_page {
            return Err(DatastoreError::Query("result too large".into()));
        }
        self.inner.fetch_page(table, offset, limit)
    }

    fn execute(&self, statement: &UpdateStatement) -> Result<usize, DatastoreError> {
        if self.stale_updates {
            return Ok(0);
        }
        self.inner.execute(statement)
    }

    fn server_version(&self) -> Result<String, DatastoreError> {
        self.inner.server_version()
    }

    fn create_statement(&self, table: &str) -> Result<String, DatastoreError> {
        self.inner.create_statement(table)
    }
}

fn option(ds: &SqliteDatastore, name: &str) -> String {
    ds.with_connection(|conn| {
        conn.query_row(
            "SELECT option_value FROM app_options WHERE option_name = ?1",
            [name],
            |row| row.get(0),
        )
    })
    .unwrap()
}

// === A) Happy path ===

#[test]
fn test_rewrite_updates_plain_and_serialized_values() {
    let ds = seeded();
    let report = RewriteEngine::new(&ds, PREFIX)
        .rewrite(&RewriteSpec::new("http://old.test", "https://new.example"))
        .unwrap();

    assert_eq!(report.tables_scanned, 3);
    assert_eq!(report.rows_scanned, 5);
    assert_eq!(report.rows_changed, 4);
    assert_eq!(report.rows_updated, 4);
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.error_kind(), None);

    assert_eq!(option(&ds, "siteurl"), "https://new.example");
    assert_eq!(
        option(&ds, "sidebar"),
        r#"a:2:{i:0;s:19:"https://new.example";s:4:"keep";i:7;}"#
    );
    assert_eq!(option(&ds, "unrelated"), "nothing to see");
}

#[test]
fn test_second_pass_changes_nothing() {
    let ds = seeded();
    let engine = RewriteEngine::new(&ds, PREFIX);
    let spec = RewriteSpec::new("http://old.test", "https://new.example");
    engine.rewrite(&spec).unwrap();

    let again = engine.rewrite(&spec).unwrap();
    assert_eq!(again.rows_changed, 0);
    assert_eq!(again.rows_updated, 0);
    assert_eq!(again.rows_scanned, 5);
}

#[test]
fn test_table_filter_uses_unprefixed_names() {
    let ds = seeded();
    let spec = RewriteSpec::new("http://old.test", "https://new.example").with_tables(["posts"]);
    let report = RewriteEngine::new(&ds, PREFIX).rewrite(&spec).unwrap();
    assert_eq!(report.tables_scanned, 1);
    assert_eq!(report.rows_changed, 1);
    assert_eq!(option(&ds, "siteurl"), "http://old.test");
}

#[test]
fn test_foreign_tables_are_ignored() {
    let ds = seeded();
    ds.execute_batch("CREATE TABLE other_log (msg TEXT); INSERT INTO other_log VALUES ('http://old.test');")
        .unwrap();
    let report = RewriteEngine::new(&ds, PREFIX)
        .rewrite(&RewriteSpec::new("http://old.test", "x"))
        .unwrap();
    assert_eq!(report.tables_scanned, 3);
    let untouched: String = ds
        .with_connection(|conn| conn.query_row("SELECT msg FROM other_log", [], |row| row.get(0)))
        .unwrap();
    assert_eq!(untouched, "http://old.test");
}

// === B) Partial failures ===

#[test]
fn test_table_without_primary_key_needs_manual_change() {
    let ds = SqliteDatastore::memory().unwrap();
    ds.execute_batch("CREATE TABLE app_log (msg TEXT); INSERT INTO app_log VALUES ('old value');")
        .unwrap();

    let report = RewriteEngine::new(&ds, PREFIX)
        .rewrite(&RewriteSpec::new("old", "new"))
        .unwrap();
    assert_eq!(report.rows_changed, 1);
    assert_eq!(report.rows_updated, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("app_log"), "{}", report.errors[0]);
    assert_eq!(report.error_kind(), Some(ErrorKind::PartialFailure));
    assert!(render_report(&report).contains("\nERR:\"app_log\" has no primary key"));
}

#[test]
fn test_count_falls_back_to_unindexed() {
    let mut flaky = Flaky::new(seeded());
    flaky.fail_indexed_counts = true;
    let report = RewriteEngine::new(&flaky, PREFIX)
        .rewrite(&RewriteSpec::new("http://old.test", "https://new.example"))
        .unwrap();
    assert_eq!(report.rows_scanned, 5);
    assert!(report.errors.is_empty());
}

#[test]
fn test_page_size_shrinks_after_fetch_failure() {
    let mut flaky = Flaky::new(seeded());
    flaky.max_page = 2_000;
    let report = RewriteEngine::new(&flaky, PREFIX)
        .rewrite(&RewriteSpec::new("http://old.test", "https://new.example"))
        .unwrap();
    assert!(!report.fatal);
    assert_eq!(report.rows_updated, 4);

    let sizes = flaky.page_sizes.lock().unwrap();
    assert_eq!(&sizes[..2], &[50_000, 2_000]);
}

#[test]
fn test_update_matching_no_row_is_not_counted() {
    let mut flaky = Flaky::new(seeded());
    flaky.stale_updates = true;
    let report = RewriteEngine::new(&flaky, PREFIX)
        .rewrite(&RewriteSpec::new("http://old.test", "https://new.example"))
        .unwrap();
    assert_eq!(report.rows_changed, 4);
    assert_eq!(report.rows_updated, 0);
    assert_eq!(report.errors.len(), 4);
    assert!(report.errors[0].contains("not found for update"), "{}", report.errors[0]);
    assert_eq!(report.error_kind(), Some(ErrorKind::PartialFailure));
}

#[test]
fn test_non_utf8_text_keeps_text_storage() {
    let ds = SqliteDatastore::memory().unwrap();
    ds.execute_batch(
        r#"
        CREATE TABLE app_meta (k TEXT PRIMARY KEY, v TEXT);
        INSERT INTO app_meta VALUES (CAST(X'6B6579FF' AS TEXT), 'old value');
        INSERT INTO app_meta VALUES ('plain', CAST(X'6F6C64FF' AS TEXT));
        "#,
    )
    .unwrap();

    let report = RewriteEngine::new(&ds, PREFIX)
        .rewrite(&RewriteSpec::new("old", "new"))
        .unwrap();
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.rows_updated, 2);

    let rows: Vec<(String, Vec<u8>)> = ds
        .with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT typeof(v), CAST(v AS BLOB) FROM app_meta ORDER BY rowid")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
        .unwrap();
    assert_eq!(
        rows,
        vec![
            ("text".to_string(), b"new value".to_vec()),
            ("text".to_string(), b"new\xFF".to_vec()),
        ]
    );
}

#[test]
fn test_deeply_nested_value_is_a_row_error() {
    let ds = seeded();
    let mut nested = "http://old.test".to_string();
    for _ in 0..2_000 {
        nested = format!("s:{}:\"{}\";", nested.len(), nested);
    }
    ds.with_connection(|conn| {
        conn.execute(
            "INSERT INTO app_options (option_name, option_value) VALUES ('deep', ?1)",
            [&nested],
        )
    })
    .unwrap();

    let report = RewriteEngine::new(&ds, PREFIX)
        .rewrite(&RewriteSpec::new("http://old.test", "https://new.example"))
        .unwrap();
    assert!(!report.fatal);
    assert_eq!(report.rows_updated, 4);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("nested deeper"), "{}", report.errors[0]);
    assert_eq!(option(&ds, "deep"), nested);
}

// === C) Fatal failures ===

#[test]
fn test_page_fetch_exhausting_fallbacks_is_fatal() {
    let mut flaky = Flaky::new(seeded());
    flaky.max_page = 100;
    let report = RewriteEngine::new(&flaky, PREFIX)
        .rewrite(&RewriteSpec::new("http://old.test", "x"))
        .unwrap();
    assert!(report.fatal);
    assert_eq!(report.error_kind(), Some(ErrorKind::FatalStoreError));
    assert!(render_report(&report).starts_with("ERR:"));
    assert!(!render_report(&report).contains("DBSRDONE"));

    let sizes = flaky.page_sizes.lock().unwrap();
    assert_eq!(&sizes[..3], &[50_000, 2_000, 500]);
}

#[test]
fn test_describe_failure_is_fatal_but_other_tables_run() {
    let mut flaky = Flaky::new(seeded());
    flaky.fail_describe_of = Some("app_users");
    let report = RewriteEngine::new(&flaky, PREFIX)
        .rewrite(&RewriteSpec::new("http://old.test", "https://new.example"))
        .unwrap();
    assert!(report.fatal);
    assert_eq!(report.rows_updated, 4);
    assert_eq!(report.errors.len(), 1);
}

#[test]
fn test_no_matching_tables() {
    let ds = seeded();
    let spec = RewriteSpec::new("a", "b").with_tables(["missing"]);
    assert_eq!(
        RewriteEngine::new(&ds, PREFIX).rewrite(&spec).unwrap_err(),
        RewriteError::NoTablesFound
    );
}

#[test]
fn test_table_listing_failure() {
    let mut flaky = Flaky::new(seeded());
    flaky.fail_listing = true;
    let err = RewriteEngine::new(&flaky, PREFIX)
        .rewrite(&RewriteSpec::new("a", "b"))
        .unwrap_err();
    assert!(matches!(err, RewriteError::TableListing(_)));
    assert_eq!(err.kind(), ErrorKind::FatalStoreError);
}

#[test]
fn test_numeric_cells_are_never_rewritten() {
    let ds = SqliteDatastore::memory().unwrap();
    ds.execute_batch("CREATE TABLE app_nums (id INTEGER PRIMARY KEY, n INTEGER); INSERT INTO app_nums VALUES (1, 123);")
        .unwrap();
    let report = RewriteEngine::new(&ds, PREFIX)
        .rewrite(&RewriteSpec::new("12", "99"))
        .unwrap();
    assert_eq!(report.rows_changed, 0);
    let cells = ds.fetch_page("app_nums", 0, 10).unwrap();
    assert_eq!(cells, vec![vec![Cell::Integer(1), Cell::Integer(123)]]);
}
