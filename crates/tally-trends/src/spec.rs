//! Metric specs and trend points.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which derived metric to compute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum MetricSpec {
  /// Balance change between consecutive snapshots.
  BalanceDelta,
  /// Active (non-fired) employees per snapshot.
  Headcount,
  /// Occupied workstations as a percentage of total, per snapshot.
  Utilization,
  /// Net transaction flow summed over fixed day-range buckets, taken from
  /// the newest snapshot's ledger.
  CashFlow { bucket_days: u32 },
  /// Base-price movement of one market component between consecutive
  /// snapshots.
  MarketMovement { component: String },
}

/// One point of a computed trend, keyed by in-game day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
  pub game_day: i64,
  pub value:    Decimal,
}
