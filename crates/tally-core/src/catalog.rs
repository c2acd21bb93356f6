//! The field catalog — the versioned mapping table from save-document fields
//! to relational destinations.
//!
//! The catalog is data, not code: the embedded default (`catalog.json`) can
//! be replaced at runtime with a newer revision without touching the mapper.
//! Every known top-level key of the save document is declared here; keys the
//! catalog does not know about are captured as unmapped fields rather than
//! dropped or rejected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default catalog revision shipped with the crate.
const BUILTIN: &str = include_str!("catalog.json");

// ─── Column naming ───────────────────────────────────────────────────────────

/// Structural columns of the root `snapshots` table. Source fields with these
/// names are renamed on the way in.
pub const RESERVED_ROOT_COLUMNS: &[&str] =
  &["id", "filename", "ingested_at", "game_day"];

/// Structural columns present on every child table.
pub const RESERVED_CHILD_COLUMNS: &[&str] = &["id", "snapshot_id", "idx", "extra"];

/// Suffix appended to a source field name that collides with a structural
/// column. The rewrite is recorded in the `column_renames` table so the
/// reverse mapping stays recoverable.
pub const RENAME_SUFFIX: &str = "_src";

/// Resolve the column name for a source field, renaming on collision with
/// `reserved`. Field names are otherwise preserved verbatim — no case
/// transformation — so the mapping stays reversible and debuggable.
pub fn column_for(field: &str, reserved: &[&str]) -> String {
  if reserved.contains(&field) {
    format!("{field}{RENAME_SUFFIX}")
  } else {
    field.to_owned()
  }
}

// ─── Field kinds ─────────────────────────────────────────────────────────────

/// The declared column type of a mapped field.
///
/// Integers stay integers and currency is stored as [`rust_decimal::Decimal`]
/// text, never floating point, so financial aggregates do not accumulate
/// rounding error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
  Integer,
  Decimal,
  Real,
  Text,
  Boolean,
  Json,
}

impl FieldKind {
  /// The SQL column type used for this kind.
  pub fn sql_type(self) -> &'static str {
    match self {
      Self::Integer | Self::Boolean => "INTEGER",
      Self::Real => "REAL",
      Self::Decimal | Self::Text | Self::Json => "TEXT",
    }
  }
}

// ─── Destination specs ───────────────────────────────────────────────────────

/// Destination of an array-of-objects top-level key: one child-table row per
/// element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSpec {
  pub table:  String,
  /// Declared element fields and their column types. Element fields not
  /// listed here land in the row's `extra` JSON column.
  pub fields: BTreeMap<String, FieldKind>,
  /// When the collection arrives as a map keyed by entity id (older game
  /// versions ship `employees` that way), the map key is injected into each
  /// element under this field if the element does not already carry it.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub key_field:    Option<String>,
  /// When elements are bare scalars rather than objects (`employeesOrder` is
  /// an array of id strings), each scalar becomes the value of this field.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub scalar_field: Option<String>,
}

/// Destination of an object-shaped top-level key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ObjectSpec {
  /// A single child-table row holding the object's fields.
  Row {
    table:  String,
    fields: BTreeMap<String, FieldKind>,
  },
  /// One child-table row per (key, value) entry of the object.
  KeyedRows {
    table:      String,
    /// Column that receives the entry key.
    key_column: String,
    fields:     BTreeMap<String, FieldKind>,
    /// Entries whose value is a bare scalar are treated as `{field: value}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scalar_field: Option<String>,
  },
  /// Opaque JSON, stored verbatim in the catch-all table.
  Blob,
}

impl ObjectSpec {
  pub fn table(&self) -> Option<&str> {
    match self {
      Self::Row { table, .. } | Self::KeyedRows { table, .. } => Some(table),
      Self::Blob => None,
    }
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// The full mapping table for one catalog revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCatalog {
  /// Monotonically increasing revision number; written to the database's
  /// `user_version` pragma at schema initialisation.
  pub version:     u32,
  /// Top-level scalar fields → root-row columns.
  pub scalars:     BTreeMap<String, FieldKind>,
  /// Top-level array-of-objects fields → child tables.
  pub collections: BTreeMap<String, CollectionSpec>,
  /// Top-level object fields → child tables or blobs.
  pub objects:     BTreeMap<String, ObjectSpec>,
}

impl FieldCatalog {
  /// The catalog revision embedded in this build.
  pub fn builtin() -> Self {
    serde_json::from_str(BUILTIN).expect("embedded catalog.json is valid")
  }

  /// Parse a catalog from its JSON representation and validate it.
  pub fn from_json_str(raw: &str) -> Result<Self> {
    let catalog: Self = serde_json::from_str(raw)?;
    catalog.validate()?;
    Ok(catalog)
  }

  /// Reject catalogs whose destinations would collide in the database.
  pub fn validate(&self) -> Result<()> {
    let mut seen = std::collections::BTreeSet::new();
    seen.insert("snapshots".to_owned());
    seen.insert("unmapped_fields".to_owned());
    seen.insert("column_renames".to_owned());

    let tables = self
      .collections
      .values()
      .map(|c| c.table.as_str())
      .chain(self.objects.values().filter_map(ObjectSpec::table));

    for table in tables {
      if !seen.insert(table.to_owned()) {
        return Err(Error::Catalog(format!("duplicate table name: {table:?}")));
      }
    }

    for spec in self.objects.values() {
      if let ObjectSpec::KeyedRows { key_column, .. } = spec
        && RESERVED_CHILD_COLUMNS.contains(&key_column.as_str())
      {
        return Err(Error::Catalog(format!(
          "key column {key_column:?} collides with a structural column"
        )));
      }
    }
    Ok(())
  }

  /// The table a top-level key maps to, if it maps to one at all.
  pub fn table_for_key(&self, key: &str) -> Option<&str> {
    if let Some(c) = self.collections.get(key) {
      return Some(&c.table);
    }
    self.objects.get(key).and_then(ObjectSpec::table)
  }

  /// Reverse lookup: the top-level key whose rows live in `table`.
  pub fn key_for_table(&self, table: &str) -> Option<&str> {
    for (key, spec) in &self.collections {
      if spec.table == table {
        return Some(key);
      }
    }
    for (key, spec) in &self.objects {
      if spec.table() == Some(table) {
        return Some(key);
      }
    }
    None
  }

  /// All child-table names declared by this catalog.
  pub fn child_tables(&self) -> Vec<&str> {
    self
      .collections
      .values()
      .map(|c| c.table.as_str())
      .chain(self.objects.values().filter_map(ObjectSpec::table))
      .collect()
  }
}
