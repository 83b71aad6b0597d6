use super::fold::rewrite_text;
use super::RewriteSpec;
use crate::datastore::{Cell, ColumnDef, Datastore, Row, UpdateStatement};

/// What happened to a single row.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct RowOutcome {
    pub changed: bool,
    pub updated: bool,
    pub errors: Vec<String>,
}

/// Rewrite one row and write it back keyed by its original primary-key
/// values.
pub(crate) fn process_row(
    datastore: &dyn Datastore,
    table: &str,
    columns: &[ColumnDef],
    row: &Row,
    spec: &RewriteSpec,
    row_number: u64,
) -> RowOutcome {
    let mut outcome = RowOutcome::default();
    let mut set = Vec::new();
    let mut filter = Vec::new();

    for (column, cell) in columns.iter().zip(row) {
        if column.primary_key {
            filter.push((column.name.clone(), cell.clone()));
            if !spec.include_primary_keys {
                continue;
            }
        }

        let Some(bytes) = cell.as_bytes() else {
            continue;
        };
        let rewritten = match rewrite_text(bytes, spec.search.as_bytes(), spec.replace.as_bytes()) {
            Ok(Some(rewritten)) => rewritten,
            Ok(None) => continue,
            Err(e) => {
                outcome.errors.push(format!(
                    "\"{table}\": column {} on row {row_number} left unchanged: {e}.",
                    column.name
                ));
                continue;
            }
        };

        let new_cell = match cell {
            Cell::Text(_) => match String::from_utf8(rewritten) {
                Ok(text) => Cell::Text(text),
                Err(_) => {
                    outcome.errors.push(format!(
                        "\"{table}\": rewritten value of column {} on row {row_number} is not valid UTF-8.",
                        column.name
                    ));
                    continue;
                }
            },
            Cell::RawText(_) => match String::from_utf8(rewritten) {
                Ok(text) => Cell::Text(text),
                Err(e) => Cell::RawText(e.into_bytes()),
            },
            _ => Cell::Blob(rewritten),
        };
        set.push((column.name.clone(), new_cell));
    }

    if set.is_empty() {
        return outcome;
    }
    outcome.changed = true;

    if filter.is_empty() {
        outcome.errors.push(format!(
            "\"{table}\" has no primary key, manual change needed on row {row_number}."
        ));
        return outcome;
    }

    let statement = UpdateStatement {
        table: table.to_string(),
        set,
        filter,
    };
    match datastore.execute(&statement) {
        Ok(0) => {
            tracing::warn!(table, row = row_number, "row update matched nothing");
            outcome.errors.push(format!(
                "\"{table}\": row {row_number} not found for update, manual change needed."
            ));
        }
        Ok(_) => outcome.updated = true,
        Err(e) => {
            tracing::warn!(table, row = row_number, error = %e, "row update failed");
            outcome.errors.push(e.to_string());
        }
    }
    outcome
}
