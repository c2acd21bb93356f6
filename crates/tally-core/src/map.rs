//! The schema mapper: save document → relational plan.
//!
//! Mapping is driven entirely by the [`FieldCatalog`]; nothing about the
//! upstream document shape is hardcoded here. The policy for schema drift is
//! capture-don't-crash: unknown top-level keys become `unmapped_fields` rows,
//! and element fields the catalog does not declare (or whose value no longer
//! matches the declared kind) are kept in the row's `extra` JSON column.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{
  Result,
  catalog::{
    CollectionSpec, FieldCatalog, FieldKind, ObjectSpec, RESERVED_CHILD_COLUMNS,
    RESERVED_ROOT_COLUMNS, column_for,
  },
  document::{SaveDocument, decimal_from_value},
  plan::{
    ChildRow, ChildTable, ColumnRename, ColumnValue, RelationalPlan, RootRow,
    UnmappedField,
  },
};

/// Map one save document into the write set for a new snapshot.
pub fn map_document(
  catalog: &FieldCatalog,
  doc: &SaveDocument,
) -> Result<RelationalPlan> {
  catalog.validate()?;

  let mut root = RootRow { game_day: doc.game_day(), columns: Vec::new() };
  let mut children = Vec::new();
  let mut unmapped = Vec::new();

  // Root scalars: every declared column is emitted, NULL when absent, so the
  // row shape is uniform across documents from different game versions.
  for (field, kind) in &catalog.scalars {
    let column = column_for(field, RESERVED_ROOT_COLUMNS);
    let value = match doc.get(field) {
      None => ColumnValue::Null,
      Some(raw) => match coerce(*kind, raw) {
        Some(v) => v,
        None => {
          // Declared kind no longer matches what the game writes; keep the
          // raw value rather than dropping it.
          unmapped
            .push(UnmappedField { key: field.clone(), value: raw.clone() });
          ColumnValue::Null
        }
      },
    };
    root.columns.push((column, value));
  }

  for (key, spec) in &catalog.collections {
    if let Some(raw) = doc.get(key)
      && let Some(table) = map_collection(spec, raw, &mut unmapped, key)
    {
      children.push(table);
    }
  }

  for (key, spec) in &catalog.objects {
    match spec {
      ObjectSpec::Row { table, fields } => {
        if let Some(raw) = doc.get(key) {
          match raw {
            Value::Object(entries) => {
              let (columns, extra) = map_element_object(fields, entries);
              children.push(ChildTable {
                table:      table.clone(),
                key_column: None,
                rows:       vec![ChildRow { idx: 0, key: None, columns, extra }],
              });
            }
            Value::Null => {}
            other => unmapped
              .push(UnmappedField { key: key.clone(), value: other.clone() }),
          }
        }
      }
      ObjectSpec::KeyedRows { table, key_column, fields, scalar_field } => {
        if let Some(raw) = doc.get(key) {
          match raw {
            Value::Object(entries) => {
              let rows = entries
                .iter()
                .enumerate()
                .map(|(idx, (entry_key, entry_value))| {
                  let (columns, extra) = map_element(
                    fields,
                    scalar_field.as_deref(),
                    entry_value,
                  );
                  ChildRow {
                    idx: idx as i64,
                    key: Some(entry_key.clone()),
                    columns,
                    extra,
                  }
                })
                .collect();
              children.push(ChildTable {
                table:      table.clone(),
                key_column: Some(key_column.clone()),
                rows,
              });
            }
            Value::Null => {}
            other => unmapped
              .push(UnmappedField { key: key.clone(), value: other.clone() }),
          }
        }
      }
      ObjectSpec::Blob => {
        if let Some(raw) = doc.get(key)
          && !raw.is_null()
        {
          unmapped.push(UnmappedField { key: key.clone(), value: raw.clone() });
        }
      }
    }
  }

  // Anything the catalog does not know about is captured, never discarded.
  for (key, value) in doc.iter() {
    let known = catalog.scalars.contains_key(key)
      || catalog.collections.contains_key(key)
      || catalog.objects.contains_key(key);
    if !known && !value.is_null() {
      unmapped
        .push(UnmappedField { key: key.to_owned(), value: value.clone() });
    }
  }

  Ok(RelationalPlan {
    catalog_version: catalog.version,
    root,
    children,
    unmapped,
    renames: catalog_renames(catalog),
  })
}

/// Every collision rewrite implied by the catalog, independent of any one
/// document. Recorded in the store so the reverse mapping is durable.
pub fn catalog_renames(catalog: &FieldCatalog) -> Vec<ColumnRename> {
  let mut renames = Vec::new();

  for field in catalog.scalars.keys() {
    if RESERVED_ROOT_COLUMNS.contains(&field.as_str()) {
      renames.push(ColumnRename {
        table:  "snapshots".to_owned(),
        field:  field.clone(),
        column: column_for(field, RESERVED_ROOT_COLUMNS),
      });
    }
  }

  let child_fields = catalog
    .collections
    .values()
    .map(|c| (c.table.as_str(), &c.fields))
    .chain(catalog.objects.values().filter_map(|o| match o {
      ObjectSpec::Row { table, fields }
      | ObjectSpec::KeyedRows { table, fields, .. } => {
        Some((table.as_str(), fields))
      }
      ObjectSpec::Blob => None,
    }));

  for (table, fields) in child_fields {
    for field in fields.keys() {
      if RESERVED_CHILD_COLUMNS.contains(&field.as_str()) {
        renames.push(ColumnRename {
          table:  table.to_owned(),
          field:  field.clone(),
          column: column_for(field, RESERVED_CHILD_COLUMNS),
        });
      }
    }
  }

  renames
}

// ─── Collections ─────────────────────────────────────────────────────────────

fn map_collection(
  spec: &CollectionSpec,
  raw: &Value,
  unmapped: &mut Vec<UnmappedField>,
  key: &str,
) -> Option<ChildTable> {
  let rows = match raw {
    Value::Array(items) => items
      .iter()
      .enumerate()
      .map(|(idx, item)| {
        let (columns, extra) =
          map_element(&spec.fields, spec.scalar_field.as_deref(), item);
        ChildRow { idx: idx as i64, key: None, columns, extra }
      })
      .collect(),
    // Older game versions ship some collections as a map keyed by entity id.
    Value::Object(entries) => entries
      .iter()
      .enumerate()
      .map(|(idx, (entry_key, item))| {
        let item = inject_key_field(spec, entry_key, item);
        let (columns, extra) =
          map_element(&spec.fields, spec.scalar_field.as_deref(), &item);
        ChildRow { idx: idx as i64, key: None, columns, extra }
      })
      .collect(),
    Value::Null => return None,
    other => {
      unmapped.push(UnmappedField { key: key.to_owned(), value: other.clone() });
      return None;
    }
  };

  Some(ChildTable { table: spec.table.clone(), key_column: None, rows })
}

/// For map-shaped collections, carry the map key into the element under the
/// declared `key_field` when the element does not already have it.
fn inject_key_field(spec: &CollectionSpec, entry_key: &str, item: &Value) -> Value {
  match (&spec.key_field, item) {
    (Some(key_field), Value::Object(fields)) if !fields.contains_key(key_field) => {
      let mut fields = fields.clone();
      fields
        .insert(key_field.clone(), Value::String(entry_key.to_owned()));
      Value::Object(fields)
    }
    _ => item.clone(),
  }
}

// ─── Elements ────────────────────────────────────────────────────────────────

/// Map one collection element (or keyed-rows entry value) to its columns.
/// Bare scalars are lifted into `{scalar_field: value}` when the spec
/// declares one; otherwise the whole element lands in `extra`.
fn map_element(
  fields: &BTreeMap<String, FieldKind>,
  scalar_field: Option<&str>,
  item: &Value,
) -> (Vec<(String, ColumnValue)>, Option<Value>) {
  match item {
    Value::Object(entries) => map_element_object(fields, entries),
    other => match scalar_field {
      Some(field) => {
        let mut entries = Map::new();
        entries.insert(field.to_owned(), other.clone());
        map_element_object(fields, &entries)
      }
      None => (null_columns(fields), Some(other.clone())),
    },
  }
}

fn map_element_object(
  fields: &BTreeMap<String, FieldKind>,
  entries: &Map<String, Value>,
) -> (Vec<(String, ColumnValue)>, Option<Value>) {
  let mut extra = Map::new();

  let columns = fields
    .iter()
    .map(|(field, kind)| {
      let column = column_for(field, RESERVED_CHILD_COLUMNS);
      let value = match entries.get(field) {
        None => ColumnValue::Null,
        Some(raw) => match coerce(*kind, raw) {
          Some(v) => v,
          None => {
            extra.insert(field.clone(), raw.clone());
            ColumnValue::Null
          }
        },
      };
      (column, value)
    })
    .collect();

  // Undeclared element fields ride along in `extra`.
  for (field, raw) in entries {
    if !fields.contains_key(field) && !raw.is_null() {
      extra.insert(field.clone(), raw.clone());
    }
  }

  let extra = (!extra.is_empty()).then(|| Value::Object(extra));
  (columns, extra)
}

fn null_columns(
  fields: &BTreeMap<String, FieldKind>,
) -> Vec<(String, ColumnValue)> {
  fields
    .keys()
    .map(|field| {
      (column_for(field, RESERVED_CHILD_COLUMNS), ColumnValue::Null)
    })
    .collect()
}

// ─── Coercion ────────────────────────────────────────────────────────────────

/// Interpret a JSON value under the declared kind. `None` means the value no
/// longer matches the catalog and should be preserved raw instead.
fn coerce(kind: FieldKind, raw: &Value) -> Option<ColumnValue> {
  if raw.is_null() {
    return Some(ColumnValue::Null);
  }
  match kind {
    FieldKind::Integer => raw.as_i64().map(ColumnValue::Integer),
    FieldKind::Decimal => decimal_from_value(raw).map(ColumnValue::Decimal),
    FieldKind::Real => raw.as_f64().map(ColumnValue::Real),
    FieldKind::Text => raw.as_str().map(|s| ColumnValue::Text(s.to_owned())),
    FieldKind::Boolean => match raw {
      Value::Bool(b) => Some(ColumnValue::Boolean(*b)),
      // The game has flip-flopped between true/false and 0/1 across versions.
      Value::Number(n) => match n.as_i64() {
        Some(0) => Some(ColumnValue::Boolean(false)),
        Some(1) => Some(ColumnValue::Boolean(true)),
        _ => None,
      },
      _ => None,
    },
    FieldKind::Json => Some(ColumnValue::Json(raw.clone())),
  }
}
