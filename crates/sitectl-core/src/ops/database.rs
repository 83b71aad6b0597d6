use super::{Invocation, OpResult};
use crate::datastore::{backquote, sql_escape, Cell, ColumnDef, Datastore};
use crate::response::Reply;
use crate::rewrite::{render_report, RewriteEngine, RewriteError, RewriteSpec};

/// Rows per `SELECT` while dumping.
pub const DUMP_BATCH_ROWS: u64 = 1_000;

const RULE: &str = "# --------------------------------------------------------\n";

/// Literal for one dumped value. Integer columns stay unquoted when the
/// value is an integer; everything else is quoted and escaped.
fn dump_literal(column: &ColumnDef, cell: &Cell) -> String {
    match cell {
        Cell::Null => "NULL".to_string(),
        Cell::Integer(i) if column.is_integer() => i.to_string(),
        Cell::Text(s) if column.is_integer() && s.parse::<i64>().is_ok() => s.clone(),
        Cell::Integer(i) => format!("'{i}'"),
        Cell::Real(f) => format!("'{f}'"),
        Cell::Text(s) => format!("'{}'", sql_escape(s)),
        Cell::RawText(_) => cell.to_sql_literal(),
        Cell::Blob(b) => format!("X'{}'", hex::encode(b)),
    }
}

fn dump_table(ds: &dyn Datastore, table: &str, reply: &mut Reply<'_>) -> std::io::Result<()> {
    let quoted = backquote(table);
    let columns = match ds.describe(table) {
        Ok(columns) => columns,
        Err(e) => {
            tracing::warn!(table, error = %e, "describe failed; table skipped");
            return reply.text(&format!("#\n# Error getting table details of {quoted}: {e}\n#\n"));
        }
    };

    reply.text(&format!("\n\n# Delete any existing table {quoted}\n#\n\n"))?;
    reply.text(&format!("DROP TABLE IF EXISTS {quoted};\n"))?;
    reply.text(&format!("\n\n# Table structure of table {quoted}\n#\n\n"))?;
    match ds.create_statement(table) {
        Ok(ddl) => reply.text(&format!("{ddl} ;"))?,
        Err(e) => reply.text(&format!("#\n# Error with CREATE statement for {table}: {e}\n#\n"))?,
    }
    reply.text(&format!("\n\n# Data contents of table {quoted}\n#\n"))?;

    let mut offset = 0;
    loop {
        let rows = match ds.fetch_page(table, offset, DUMP_BATCH_ROWS) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(table, offset, error = %e, "dump fetch failed");
                reply.text(&format!("\n#\n# Error reading rows of {quoted} at offset {offset}: {e}\n#"))?;
                break;
            }
        };
        if rows.is_empty() {
            break;
        }
        for row in &rows {
            let values: Vec<String> = columns
                .iter()
                .zip(row)
                .map(|(column, cell)| dump_literal(column, cell))
                .collect();
            reply.text(&format!(" \nINSERT INTO {quoted} VALUES ({});", values.join(", ")))?;
        }
        offset += rows.len() as u64;
    }

    reply.text(&format!("\n#\n# End of data contents of table {quoted}\n{RULE}\n"))
}

/// SQL dump of every prefixed table, streamed without the `AUTHOK:` prefix.
pub fn dump(inv: &Invocation<'_>, _arg: &str, reply: &mut Reply<'_>) -> OpResult {
    let ds = inv.ctx.datastore();
    let prefix = inv.ctx.table_prefix();
    let database = inv
        .ctx
        .config()
        .database
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    reply.text("# Site database backup\n")?;
    reply.text(&format!("# Produced by sitectl (agent version {})\n", crate::AGENT_VERSION))?;
    reply.text("#\n")?;
    reply.text(&format!("# Generated: {}\n", inv.now.format("%A %-d %B %Y %H:%M UTC")))?;
    reply.text(&format!("# Database: {}\n", backquote(&database)))?;
    reply.text(RULE)?;
    reply.text("PRAGMA foreign_keys = OFF;\n")?;

    let tables = ds.list_tables()?;
    for table in &tables {
        reply.text(RULE)?;
        if table.starts_with(prefix) {
            reply.text(&format!("# Table: {}\n", backquote(table)))?;
            reply.text(RULE)?;
            dump_table(ds, table, reply)?;
        } else {
            reply.text(&format!("# Skipping non-app table: {}\n", backquote(table)))?;
            reply.text(RULE)?;
        }
    }
    tracing::info!(tables = tables.len(), bytes = reply.bytes_written(), "database dumped");
    Ok(())
}

/// `dbsearchreplace:<search>^<replace>[:<t1,t2>]`
pub fn search_replace(inv: &Invocation<'_>, arg: &str, reply: &mut Reply<'_>) -> OpResult {
    let spec = match RewriteSpec::parse_argument(arg) {
        Ok(spec) => spec,
        Err(RewriteError::Syntax) => {
            reply.syntax_error()?;
            return Ok(());
        }
        Err(e) => {
            reply.text(&format!("ERR:{e}"))?;
            return Ok(());
        }
    };

    let engine = RewriteEngine::new(inv.ctx.datastore(), inv.ctx.table_prefix());
    match engine.rewrite(&spec) {
        Ok(report) => {
            tracing::info!(
                tables = report.tables_scanned,
                rows = report.rows_scanned,
                changed = report.rows_changed,
                updated = report.rows_updated,
                errors = report.errors.len(),
                "search/replace finished"
            );
            reply.text(&render_report(&report))?;
        }
        Err(e) => {
            tracing::warn!(error = %e, "search/replace aborted");
            reply.text(&format!("ERR:{e}"))?;
        }
    }
    Ok(())
}
