//! SQL schema generation.
//!
//! The DDL is derived from the field catalog rather than written by hand, so
//! a new catalog revision (new columns, new child tables) materialises on
//! the next open without code changes. Everything is `IF NOT EXISTS`;
//! running the result against an already-initialised database is a no-op.

use tally_core::catalog::{
  CollectionSpec, FieldCatalog, FieldKind, ObjectSpec, RESERVED_CHILD_COLUMNS,
  RESERVED_ROOT_COLUMNS, column_for,
};

/// Quote an identifier for use in SQL. Field names are stored verbatim
/// (mixed case and all), so every generated identifier is quoted.
pub fn quote_ident(name: &str) -> String {
  format!("\"{}\"", name.replace('"', "\"\""))
}

/// Generate the full schema DDL for one catalog revision.
pub fn schema_sql(catalog: &FieldCatalog) -> String {
  let mut sql = String::new();
  sql.push_str("PRAGMA journal_mode = WAL;\nPRAGMA foreign_keys = ON;\n\n");

  // Root table. Snapshots are strictly append-only: no UPDATE or DELETE is
  // ever issued against this table or any child table.
  sql.push_str(
    "CREATE TABLE IF NOT EXISTS snapshots (\n    \
       id          INTEGER PRIMARY KEY AUTOINCREMENT,\n    \
       filename    TEXT NOT NULL UNIQUE,\n    \
       ingested_at TEXT NOT NULL,\n    \
       game_day    INTEGER",
  );
  for (field, kind) in &catalog.scalars {
    let column = column_for(field, RESERVED_ROOT_COLUMNS);
    sql.push_str(&format!(
      ",\n    {} {}",
      quote_ident(&column),
      kind.sql_type()
    ));
  }
  sql.push_str("\n);\n\n");

  for spec in catalog.collections.values() {
    push_child_table(&mut sql, &spec.table, None, &spec.fields);
  }
  for spec in catalog.objects.values() {
    match spec {
      ObjectSpec::Row { table, fields } => {
        push_child_table(&mut sql, table, None, fields);
      }
      ObjectSpec::KeyedRows { table, key_column, fields, .. } => {
        push_child_table(&mut sql, table, Some(key_column), fields);
      }
      ObjectSpec::Blob => {}
    }
  }

  // Catch-all for top-level fields the catalog does not map.
  sql.push_str(
    "CREATE TABLE IF NOT EXISTS unmapped_fields (\n    \
       id          INTEGER PRIMARY KEY AUTOINCREMENT,\n    \
       snapshot_id INTEGER NOT NULL REFERENCES snapshots(id),\n    \
       \"key\"       TEXT NOT NULL,\n    \
       \"value\"     TEXT NOT NULL\n);\n\n",
  );

  // Record of collision rewrites, so the reverse field mapping survives
  // outside this codebase.
  sql.push_str(
    "CREATE TABLE IF NOT EXISTS column_renames (\n    \
       \"table\"  TEXT NOT NULL,\n    \
       \"field\"  TEXT NOT NULL,\n    \
       \"column\" TEXT NOT NULL,\n    \
       UNIQUE (\"table\", \"field\")\n);\n\n",
  );

  sql.push_str(
    "CREATE INDEX IF NOT EXISTS snapshots_game_day_idx ON snapshots(game_day);\n",
  );
  sql.push_str(
    "CREATE INDEX IF NOT EXISTS unmapped_snapshot_idx ON unmapped_fields(snapshot_id);\n",
  );
  for table in catalog.child_tables() {
    sql.push_str(&format!(
      "CREATE INDEX IF NOT EXISTS {} ON {}(snapshot_id);\n",
      quote_ident(&format!("{table}_snapshot_idx")),
      quote_ident(table),
    ));
  }
  for spec in catalog.objects.values() {
    if let ObjectSpec::KeyedRows { table, key_column, .. } = spec {
      sql.push_str(&format!(
        "CREATE INDEX IF NOT EXISTS {} ON {}({});\n",
        quote_ident(&format!("{table}_key_idx")),
        quote_ident(table),
        quote_ident(key_column),
      ));
    }
  }

  sql.push_str(&format!("\nPRAGMA user_version = {};\n", catalog.version));
  sql
}

fn push_child_table(
  sql: &mut String,
  table: &str,
  key_column: Option<&str>,
  fields: &std::collections::BTreeMap<String, FieldKind>,
) {
  sql.push_str(&format!(
    "CREATE TABLE IF NOT EXISTS {} (\n    \
       id          INTEGER PRIMARY KEY AUTOINCREMENT,\n    \
       snapshot_id INTEGER NOT NULL REFERENCES snapshots(id),\n    \
       idx         INTEGER NOT NULL",
    quote_ident(table),
  ));
  if let Some(key) = key_column {
    sql.push_str(&format!(",\n    {} TEXT NOT NULL", quote_ident(key)));
  }
  for (field, kind) in fields {
    let column = column_for(field, RESERVED_CHILD_COLUMNS);
    sql.push_str(&format!(
      ",\n    {} {}",
      quote_ident(&column),
      kind.sql_type()
    ));
  }
  // Per-row overflow for element fields the catalog does not declare.
  sql.push_str(",\n    extra TEXT\n);\n\n");
}

/// The columns (stored name + declared kind) of one child table, in the
/// order the mapper emits them.
pub fn child_columns(spec_fields: &std::collections::BTreeMap<String, FieldKind>)
-> Vec<(String, FieldKind)> {
  spec_fields
    .iter()
    .map(|(field, kind)| (column_for(field, RESERVED_CHILD_COLUMNS), *kind))
    .collect()
}

/// The scalar columns of the root table, in catalog order.
pub fn root_columns(catalog: &FieldCatalog) -> Vec<(String, FieldKind)> {
  catalog
    .scalars
    .iter()
    .map(|(field, kind)| (column_for(field, RESERVED_ROOT_COLUMNS), *kind))
    .collect()
}

/// Iterate every catalog destination backed by a real table:
/// `(table, key_column, fields)`.
pub fn table_specs(
  catalog: &FieldCatalog,
) -> Vec<(String, Option<String>, std::collections::BTreeMap<String, FieldKind>)> {
  let mut specs: Vec<_> = catalog
    .collections
    .values()
    .map(|CollectionSpec { table, fields, .. }| {
      (table.clone(), None, fields.clone())
    })
    .collect();
  for spec in catalog.objects.values() {
    match spec {
      ObjectSpec::Row { table, fields } => {
        specs.push((table.clone(), None, fields.clone()));
      }
      ObjectSpec::KeyedRows { table, key_column, fields, .. } => {
        specs.push((table.clone(), Some(key_column.clone()), fields.clone()));
      }
      ObjectSpec::Blob => {}
    }
  }
  specs
}
