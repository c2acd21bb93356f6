//! The inverse of the schema mapper: stored rows → save document.
//!
//! Used by diagnostics and by the round-trip tests that prove the mapping
//! loses nothing. Reconstruction is canonical rather than byte-faithful:
//! map-shaped collections come back as arrays (ordered by the stored `idx`)
//! and keyed-rows scalar shorthand comes back in object form, but every
//! value survives with its original type and precision.

use serde_json::{Map, Value};

use crate::{
  Error, Result,
  catalog::{FieldCatalog, ObjectSpec},
  document::SaveDocument,
  plan::{ChildRow, ColumnRename, ColumnValue, StoredSnapshot},
};

/// Rebuild a save document from a snapshot's stored row set.
pub fn reconstruct(
  catalog: &FieldCatalog,
  stored: &StoredSnapshot,
) -> Result<SaveDocument> {
  let mut fields = Map::new();

  // Root scalars: reverse any collision rename, drop NULLs (an absent source
  // field was stored as NULL and comes back absent).
  for (column, value) in &stored.root {
    if value.is_null() {
      continue;
    }
    let field = original_field(&stored.renames, "snapshots", column);
    fields.insert(field.to_owned(), json_value(value)?);
  }

  for (table, rows) in &stored.children {
    let key = catalog
      .key_for_table(table)
      .ok_or_else(|| Error::UnknownTable(table.clone()))?;

    if let Some(spec) = catalog.collections.get(key) {
      let items: Result<Vec<Value>> = rows
        .iter()
        .map(|row| element_value(row, &stored.renames, table, spec.scalar_field.as_deref()))
        .collect();
      fields.insert(key.to_owned(), Value::Array(items?));
    } else if let Some(spec) = catalog.objects.get(key) {
      match spec {
        ObjectSpec::Row { .. } => {
          if let Some(row) = rows.first() {
            fields.insert(
              key.to_owned(),
              element_value(row, &stored.renames, table, None)?,
            );
          }
        }
        ObjectSpec::KeyedRows { .. } => {
          let mut entries = Map::new();
          for row in rows {
            let Some(entry_key) = &row.key else { continue };
            entries.insert(
              entry_key.clone(),
              element_value(row, &stored.renames, table, None)?,
            );
          }
          fields.insert(key.to_owned(), Value::Object(entries));
        }
        ObjectSpec::Blob => {}
      }
    }
  }

  // Unmapped fields (including blob-mode objects) pass through verbatim.
  for u in &stored.unmapped {
    fields.insert(u.key.clone(), u.value.clone());
  }

  SaveDocument::from_value(Value::Object(fields))
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn original_field<'a>(
  renames: &'a [ColumnRename],
  table: &str,
  column: &'a str,
) -> &'a str {
  renames
    .iter()
    .find(|r| r.table == table && r.column == column)
    .map(|r| r.field.as_str())
    .unwrap_or(column)
}

/// Rebuild one element: named columns (reverse-renamed, NULLs dropped)
/// merged with whatever rode along in `extra`. Scalar-shorthand rows whose
/// only content is the declared scalar field collapse back to the bare value.
fn element_value(
  row: &ChildRow,
  renames: &[ColumnRename],
  table: &str,
  scalar_field: Option<&str>,
) -> Result<Value> {
  let mut entries = Map::new();

  for (column, value) in &row.columns {
    if value.is_null() {
      continue;
    }
    let field = original_field(renames, table, column);
    entries.insert(field.to_owned(), json_value(value)?);
  }

  if let Some(Value::Object(extra)) = &row.extra {
    for (field, value) in extra {
      entries.insert(field.clone(), value.clone());
    }
  } else if let Some(extra) = &row.extra {
    // A whole element that never was an object comes back as-is.
    return Ok(extra.clone());
  }

  if let Some(field) = scalar_field
    && entries.len() == 1
    && let Some(value) = entries.get(field)
  {
    return Ok(value.clone());
  }

  Ok(Value::Object(entries))
}

fn json_value(value: &ColumnValue) -> Result<Value> {
  Ok(match value {
    ColumnValue::Null => Value::Null,
    ColumnValue::Integer(i) => Value::from(*i),
    ColumnValue::Real(f) => Value::from(*f),
    // Re-parse the decimal's literal so currency comes back as the same
    // JSON number it arrived as.
    ColumnValue::Decimal(d) => serde_json::from_str(&d.to_string())?,
    ColumnValue::Text(s) => Value::String(s.clone()),
    ColumnValue::Boolean(b) => Value::Bool(*b),
    ColumnValue::Json(v) => v.clone(),
  })
}
