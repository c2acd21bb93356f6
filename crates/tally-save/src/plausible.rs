//! The domain plausibility check.
//!
//! A file can parse perfectly and still be garbage for our purposes: the
//! game writes a near-empty template save the moment a new company is
//! created, and ingesting one would pollute every trend with a zero row.
//! Rejection here is a skip, logged distinctly from duplicates and parse
//! failures so an operator can tell the cases apart.

use rust_decimal::Decimal;
use tally_core::document::SaveDocument;

/// Why a document was judged implausible.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Implausibility {
  #[error("balance {balance} is below the plausibility floor {floor}")]
  BalanceBelowFloor { balance: Decimal, floor: Decimal },

  #[error("document has no workforce")]
  EmptyWorkforce,
}

/// Tunable thresholds for the plausibility check.
#[derive(Debug, Clone)]
pub struct PlausibilityPolicy {
  /// Documents with a balance below this are treated as templates. The
  /// cutoff is a heuristic with no deeper meaning; it is configuration, not
  /// a constant.
  pub min_balance:       Decimal,
  /// Require at least one employee.
  pub require_workforce: bool,
}

impl Default for PlausibilityPolicy {
  fn default() -> Self {
    Self { min_balance: Decimal::from(1000), require_workforce: true }
  }
}

impl PlausibilityPolicy {
  pub fn with_min_balance(min_balance: Decimal) -> Self {
    Self { min_balance, ..Self::default() }
  }

  /// Judge whether `doc` looks like a real in-progress save.
  pub fn check(&self, doc: &SaveDocument) -> Result<(), Implausibility> {
    if self.require_workforce && doc.workforce_size() == 0 {
      return Err(Implausibility::EmptyWorkforce);
    }

    let balance = doc.balance().unwrap_or_default();
    if balance < self.min_balance {
      return Err(Implausibility::BalanceBelowFloor {
        balance,
        floor: self.min_balance,
      });
    }

    Ok(())
  }

  pub fn is_plausible(&self, doc: &SaveDocument) -> bool {
    self.check(doc).is_ok()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn doc(value: serde_json::Value) -> SaveDocument {
    SaveDocument::from_value(value).unwrap()
  }

  #[test]
  fn active_company_passes() {
    let policy = PlausibilityPolicy::default();
    let save = doc(json!({
      "balance": 50000,
      "employees": [{ "id": "e1" }]
    }));
    assert!(policy.is_plausible(&save));
  }

  #[test]
  fn template_save_is_rejected() {
    let policy = PlausibilityPolicy::default();
    let template = doc(json!({ "balance": 0, "employees": {} }));
    assert_eq!(policy.check(&template), Err(Implausibility::EmptyWorkforce));
  }

  #[test]
  fn low_balance_is_rejected_with_the_floor_named() {
    let policy = PlausibilityPolicy::default();
    let broke = doc(json!({ "balance": 250, "employees": [{ "id": "e1" }] }));
    assert!(matches!(
      policy.check(&broke),
      Err(Implausibility::BalanceBelowFloor { .. })
    ));
  }

  #[test]
  fn the_floor_is_tunable() {
    let policy = PlausibilityPolicy::with_min_balance(Decimal::ZERO);
    let broke = doc(json!({ "balance": 0, "employees": [{ "id": "e1" }] }));
    assert!(policy.is_plausible(&broke));
  }
}
