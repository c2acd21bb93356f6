//! The relational plan — the typed write set produced by the schema mapper
//! for one save document, and the typed row set read back out of the store.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::snapshot::Snapshot;

// ─── Column values ───────────────────────────────────────────────────────────

/// A single typed cell, ready to bind as a SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
  Null,
  Integer(i64),
  Real(f64),
  /// High-precision decimal, stored as TEXT. Used for all currency fields.
  Decimal(Decimal),
  Text(String),
  Boolean(bool),
  /// Arbitrary JSON, stored as compact TEXT.
  Json(Value),
}

impl ColumnValue {
  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }
}

// ─── Write plan ──────────────────────────────────────────────────────────────

/// The root `snapshots` row: the derived game-day plus one typed column per
/// mapped scalar field. Column names have already had collision renames
/// applied.
#[derive(Debug, Clone, Default)]
pub struct RootRow {
  pub game_day: Option<i64>,
  pub columns:  Vec<(String, ColumnValue)>,
}

/// One child-table row.
#[derive(Debug, Clone)]
pub struct ChildRow {
  /// Element position within the source array (or enumeration order for
  /// map-shaped sources). Preserves ordering through reconstruction.
  pub idx:     i64,
  /// Entry key, for keyed-rows object destinations.
  pub key:     Option<String>,
  pub columns: Vec<(String, ColumnValue)>,
  /// Element fields the catalog does not declare (or whose value did not
  /// match the declared kind), kept as JSON so nothing is silently dropped.
  pub extra:   Option<Value>,
}

/// All rows destined for one child table.
#[derive(Debug, Clone)]
pub struct ChildTable {
  pub table:      String,
  pub key_column: Option<String>,
  pub rows:       Vec<ChildRow>,
}

/// A top-level field with no catalog destination, routed to the catch-all
/// `unmapped_fields` table.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmappedField {
  pub key:   String,
  pub value: Value,
}

/// A recorded collision rewrite: source `field` landed in `column` because
/// the verbatim name clashed with a structural column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRename {
  pub table:  String,
  pub field:  String,
  pub column: String,
}

/// Everything the ingestion engine writes for one save document, in one
/// transaction.
#[derive(Debug, Clone)]
pub struct RelationalPlan {
  /// Catalog revision the plan was derived under.
  pub catalog_version: u32,
  pub root:     RootRow,
  pub children: Vec<ChildTable>,
  pub unmapped: Vec<UnmappedField>,
  pub renames:  Vec<ColumnRename>,
}

impl RelationalPlan {
  /// Total number of child rows across all tables.
  pub fn child_row_count(&self) -> usize {
    self.children.iter().map(|t| t.rows.len()).sum()
  }
}

// ─── Read-side row set ───────────────────────────────────────────────────────

/// A snapshot's full stored row set, as read back from the temporal store.
/// Input to [`crate::reconstruct::reconstruct`].
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
  pub snapshot: Snapshot,
  /// Root scalar columns (stored column names) with their decoded values.
  pub root:     Vec<(String, ColumnValue)>,
  /// Child rows keyed by table name, ordered by `idx`.
  pub children: BTreeMap<String, Vec<ChildRow>>,
  pub unmapped: Vec<UnmappedField>,
  pub renames:  Vec<ColumnRename>,
}
