//! Encoding and decoding between the typed plan values and SQLite storage.
//!
//! Timestamps are RFC 3339 strings. Decimals are stored as their literal
//! text so currency round-trips exactly. JSON-kind columns hold compact
//! JSON text. Booleans are 0/1 integers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rust_decimal::Decimal;
use tally_core::{
  catalog::FieldKind,
  plan::ColumnValue,
  snapshot::Snapshot,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── ColumnValue → SQL ───────────────────────────────────────────────────────

pub fn sql_value(value: &ColumnValue) -> SqlValue {
  match value {
    ColumnValue::Null => SqlValue::Null,
    ColumnValue::Integer(i) => SqlValue::Integer(*i),
    ColumnValue::Real(f) => SqlValue::Real(*f),
    ColumnValue::Decimal(d) => SqlValue::Text(d.to_string()),
    ColumnValue::Text(s) => SqlValue::Text(s.clone()),
    ColumnValue::Boolean(b) => SqlValue::Integer(i64::from(*b)),
    ColumnValue::Json(v) => SqlValue::Text(v.to_string()),
  }
}

// ─── SQL → ColumnValue ───────────────────────────────────────────────────────

/// Decode a stored cell under its declared kind.
pub fn decode_value(
  column: &str,
  kind: FieldKind,
  raw: SqlValue,
) -> Result<ColumnValue> {
  let mismatch = || Error::ColumnDecode { column: column.to_owned(), kind };

  Ok(match (kind, raw) {
    (_, SqlValue::Null) => ColumnValue::Null,
    (FieldKind::Integer, SqlValue::Integer(i)) => ColumnValue::Integer(i),
    (FieldKind::Boolean, SqlValue::Integer(i)) => ColumnValue::Boolean(i != 0),
    (FieldKind::Real, SqlValue::Real(f)) => ColumnValue::Real(f),
    (FieldKind::Real, SqlValue::Integer(i)) => ColumnValue::Real(i as f64),
    (FieldKind::Decimal, SqlValue::Text(s)) => {
      ColumnValue::Decimal(Decimal::from_str(&s).map_err(|_| mismatch())?)
    }
    (FieldKind::Text, SqlValue::Text(s)) => ColumnValue::Text(s),
    (FieldKind::Json, SqlValue::Text(s)) => {
      ColumnValue::Json(serde_json::from_str(&s)?)
    }
    _ => return Err(mismatch()),
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `snapshots` row's structural columns.
pub struct RawSnapshot {
  pub id:          i64,
  pub filename:    String,
  pub ingested_at: String,
  pub game_day:    Option<i64>,
}

impl RawSnapshot {
  pub fn into_snapshot(self) -> Result<Snapshot> {
    Ok(Snapshot {
      id:          self.id,
      filename:    self.filename,
      ingested_at: decode_dt(&self.ingested_at)?,
      game_day:    self.game_day,
    })
  }
}

/// One child row as read from SQLite, before kind-aware decoding.
pub struct RawChildRow {
  pub idx:     i64,
  pub key:     Option<String>,
  pub columns: Vec<(String, SqlValue)>,
  pub extra:   Option<String>,
}
