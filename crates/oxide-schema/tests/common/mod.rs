#![allow(dead_code)]

use oxide_schema::prelude::*;

/// Creates `name` in `schema` with the given columns, in order.
pub fn table_with(
    db: &mut Database,
    schema: SchemaId,
    name: &str,
    columns: &[ColumnDefinition],
) -> (TableId, Vec<ColumnId>) {
    let table = db
        .create_table(schema, name)
        .unwrap_or_else(|e| panic!("Failed to create table {name}: {e}"));
    let ids = columns
        .iter()
        .map(|c| {
            db.create_column(table, c.clone())
                .unwrap_or_else(|e| panic!("Failed to create column in {name}: {e}"))
        })
        .collect();
    (table, ids)
}

/// Flushes the batch and drains the action log.
pub fn flush(db: &mut Database) -> Vec<String> {
    db.flush()
        .unwrap_or_else(|e| panic!("Flush failed: {e}"));
    db.take_pending_actions()
}

/// Replays every `RENAME COLUMN` action against a list of column names,
/// failing on a rename from a missing name or onto a taken one.
pub fn replay_column_renames(columns: &[&str], actions: &[String]) -> Vec<String> {
    let mut names: Vec<String> = columns.iter().map(|c| (*c).to_string()).collect();
    for action in actions {
        let Some(rest) = action.split(" RENAME COLUMN ").nth(1) else {
            continue;
        };
        let rest = rest.trim_end_matches(';');
        let (from, to) = rest
            .split_once(" TO ")
            .unwrap_or_else(|| panic!("Malformed rename: {action}"));
        let from = from.trim_matches('"');
        let to = to.trim_matches('"');
        assert!(
            !names.iter().any(|n| n == to),
            "Rename onto existing column: {action}"
        );
        let slot = names
            .iter_mut()
            .find(|n| n.as_str() == from)
            .unwrap_or_else(|| panic!("Rename of missing column: {action}"));
        *slot = to.to_string();
    }
    names
}

/// Position of the first action containing `needle`.
pub fn position(actions: &[String], needle: &str) -> usize {
    actions
        .iter()
        .position(|a| a.contains(needle))
        .unwrap_or_else(|| panic!("No action contains {needle:?} in {actions:#?}"))
}
