//! The save document — one parsed JSON snapshot of simulated company state.

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::{Error, Result};

/// A parsed save file. A thin wrapper over the JSON object that adds the
/// typed accessors the loader, mapper, and plausibility check need.
///
/// The wrapper is deliberately permissive: the upstream game evolves its
/// document shape between versions, so nothing here assumes a field exists.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveDocument {
  fields: Map<String, Value>,
}

impl SaveDocument {
  /// Wrap a parsed JSON value. Fails unless the value is an object.
  pub fn from_value(value: Value) -> Result<Self> {
    match value {
      Value::Object(fields) => Ok(Self { fields }),
      _ => Err(Error::NotAnObject),
    }
  }

  /// Parse a document from raw JSON text.
  pub fn parse(raw: &str) -> Result<Self> {
    Self::from_value(serde_json::from_str(raw)?)
  }

  pub fn get(&self, key: &str) -> Option<&Value> { self.fields.get(key) }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.fields.keys().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
    self.fields.iter().map(|(k, v)| (k.as_str(), v))
  }

  /// Consume the document, yielding the underlying JSON object.
  pub fn into_value(self) -> Value { Value::Object(self.fields) }

  // ── Typed accessors ───────────────────────────────────────────────────────

  /// The in-game `date` string, verbatim.
  pub fn game_date(&self) -> Option<&str> {
    self.fields.get("date").and_then(Value::as_str)
  }

  /// The in-game day counter: days since the Unix epoch of the parsed `date`.
  ///
  /// Trend computations key on this value, never on row position, so sparse
  /// or irregular snapshot spacing is harmless.
  pub fn game_day(&self) -> Option<i64> {
    let raw = self.game_date()?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
      return Some(dt.timestamp().div_euclid(86_400));
    }
    // Some saves carry a bare calendar date.
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    Some((date - epoch).num_days())
  }

  /// The company balance, parsed exactly from the JSON literal.
  pub fn balance(&self) -> Option<Decimal> {
    decimal_from_value(self.fields.get("balance")?)
  }

  pub fn company_name(&self) -> Option<&str> {
    self.fields.get("companyName").and_then(Value::as_str)
  }

  /// Number of elements in a collection field, counting both JSON shapes the
  /// game has shipped (array of objects, map keyed by id).
  pub fn collection_len(&self, key: &str) -> usize {
    match self.fields.get(key) {
      Some(Value::Array(items)) => items.len(),
      Some(Value::Object(entries)) => entries.len(),
      _ => 0,
    }
  }

  /// Size of the workforce in this snapshot, whichever field carries it.
  pub fn workforce_size(&self) -> usize {
    let direct = self.collection_len("employees");
    if direct > 0 {
      direct
    } else {
      self.collection_len("employeesOrder")
    }
  }
}

/// Parse a JSON value as an exact [`Decimal`].
///
/// Goes through the number's literal text rather than its `f64` reading so
/// currency survives with the precision the source wrote.
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
  match value {
    Value::Number(n) => {
      let literal = n.to_string();
      Decimal::from_str(&literal)
        .or_else(|_| Decimal::from_scientific(&literal))
        .ok()
    }
    Value::String(s) => Decimal::from_str(s).ok(),
    _ => None,
  }
}
