//! Trend and metrics analysis over the tally temporal store.
//!
//! Read-only: the analyzer works against any [`SnapshotStore`] and never
//! writes. Every computation is keyed by the recorded in-game day, never by
//! row position, so sparse or irregular snapshot spacing is fine.

pub mod error;
mod spec;

pub use error::{Error, Result};
pub use spec::{MetricSpec, TrendPoint};

use rust_decimal::Decimal;
use tally_core::store::SnapshotStore;

/// Computes derived metrics over the accumulated snapshot history.
pub struct TrendAnalyzer<S> {
  store: S,
}

impl<S: SnapshotStore> TrendAnalyzer<S> {
  pub fn new(store: S) -> Self { Self { store } }

  /// Compute one metric as an ordered `(game_day, value)` sequence.
  ///
  /// With fewer than two snapshots in the store there is no trend to speak
  /// of: every metric yields an empty sequence, not an error. Windowed
  /// metrics over N snapshots yield N−1 deltas; point-in-time metrics yield
  /// one point per snapshot.
  pub async fn compute_trend(&self, spec: &MetricSpec) -> Result<Vec<TrendPoint>> {
    if let MetricSpec::CashFlow { bucket_days: 0 } = spec {
      return Err(Error::InvalidSpec("bucket_days must be positive".into()));
    }

    let snapshots = self.store.snapshots().await.map_err(Error::store)?;
    if snapshots.len() < 2 {
      return Ok(Vec::new());
    }

    match spec {
      MetricSpec::BalanceDelta => {
        let series = self.store.balance_series().await.map_err(Error::store)?;
        Ok(deltas(series.into_iter().map(|p| (p.game_day, p.value))))
      }

      MetricSpec::Headcount => {
        let series =
          self.store.headcount_series().await.map_err(Error::store)?;
        Ok(
          series
            .into_iter()
            .map(|p| TrendPoint {
              game_day: p.game_day,
              value:    Decimal::from(p.count),
            })
            .collect(),
        )
      }

      MetricSpec::Utilization => {
        let series = self.store.office_series().await.map_err(Error::store)?;
        Ok(
          series
            .into_iter()
            .filter(|p| p.workstations_total > 0)
            .map(|p| TrendPoint {
              game_day: p.game_day,
              value:    (Decimal::from(p.workstations_occupied)
                / Decimal::from(p.workstations_total)
                * Decimal::from(100))
              .round_dp(1),
            })
            .collect(),
        )
      }

      MetricSpec::CashFlow { bucket_days } => {
        // The newest snapshot carries the fullest ledger; earlier snapshots
        // hold prefixes of the same transaction list.
        let Some(newest) = snapshots.last() else { return Ok(Vec::new()) };
        let entries =
          self.store.transactions(newest.id).await.map_err(Error::store)?;

        let bucket = i64::from(*bucket_days);
        let mut totals = std::collections::BTreeMap::new();
        for entry in entries {
          let Some(day) = entry.day else { continue };
          let start = day.div_euclid(bucket) * bucket;
          *totals.entry(start).or_insert(Decimal::ZERO) += entry.amount;
        }
        Ok(
          totals
            .into_iter()
            .map(|(game_day, value)| TrendPoint { game_day, value })
            .collect(),
        )
      }

      MetricSpec::MarketMovement { component } => {
        let series =
          self.store.market_series(component).await.map_err(Error::store)?;
        Ok(deltas(series.into_iter().map(|p| (p.game_day, p.base_price))))
      }
    }
  }
}

/// Consecutive differences of a day-ordered series, keyed at the later day.
fn deltas(series: impl Iterator<Item = (i64, Decimal)>) -> Vec<TrendPoint> {
  let points: Vec<(i64, Decimal)> = series.collect();
  points
    .windows(2)
    .map(|pair| TrendPoint {
      game_day: pair[1].0,
      value:    pair[1].1 - pair[0].1,
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::str::FromStr;
  use tally_core::{catalog::FieldCatalog, document::SaveDocument};
  use tally_store_sqlite::TemporalStore;

  async fn store() -> TemporalStore {
    TemporalStore::open_in_memory(FieldCatalog::builtin()).await.unwrap()
  }

  fn save(day: &str, balance: f64, extra: serde_json::Value) -> SaveDocument {
    let mut value = json!({
      "date": format!("{day}T10:30:00.000Z"),
      "balance": balance,
      "employees": [{ "id": "e1" }]
    });
    if let (Some(obj), serde_json::Value::Object(extra)) =
      (value.as_object_mut(), extra)
    {
      obj.extend(extra);
    }
    SaveDocument::from_value(value).unwrap()
  }

  #[tokio::test]
  async fn no_trend_below_two_snapshots() {
    let s = store().await;
    let analyzer = TrendAnalyzer::new(s.clone());

    for spec in [
      MetricSpec::BalanceDelta,
      MetricSpec::Headcount,
      MetricSpec::Utilization,
      MetricSpec::CashFlow { bucket_days: 7 },
      MetricSpec::MarketMovement { component: "UiComponent".into() },
    ] {
      assert!(analyzer.compute_trend(&spec).await.unwrap().is_empty());
    }

    s.ingest("only.json", &save("2021-04-15", 50000.0, json!({})))
      .await
      .unwrap();
    assert!(
      analyzer
        .compute_trend(&MetricSpec::BalanceDelta)
        .await
        .unwrap()
        .is_empty()
    );
  }

  #[tokio::test]
  async fn balance_deltas_are_ordered_and_exact() {
    let s = store().await;
    // Deliberately ingested out of chronological order.
    s.ingest("s3.json", &save("2021-04-25", 61250.50, json!({})))
      .await
      .unwrap();
    s.ingest("s1.json", &save("2021-04-15", 50000.0, json!({})))
      .await
      .unwrap();
    s.ingest("s2.json", &save("2021-04-20", 62000.0, json!({})))
      .await
      .unwrap();

    let analyzer = TrendAnalyzer::new(s);
    let trend =
      analyzer.compute_trend(&MetricSpec::BalanceDelta).await.unwrap();

    // N = 3 snapshots → N − 1 deltas, ordered by game day.
    assert_eq!(trend.len(), 2);
    assert!(trend[0].game_day < trend[1].game_day);
    assert_eq!(trend[0].value, Decimal::from(12000));
    assert_eq!(trend[1].value, Decimal::from_str("-749.50").unwrap());
  }

  #[tokio::test]
  async fn utilization_is_a_per_snapshot_percentage() {
    let s = store().await;
    let office = |occupied: usize, total: usize| {
      let stations: Vec<_> = (0..total)
        .map(|i| {
          if i < occupied {
            json!({ "employee": format!("e{i}") })
          } else {
            json!({ "employee": null })
          }
        })
        .collect();
      json!({ "office": { "workstations": stations } })
    };

    s.ingest("s1.json", &save("2021-04-15", 50000.0, office(3, 4)))
      .await
      .unwrap();
    s.ingest("s2.json", &save("2021-04-20", 62000.0, office(4, 4)))
      .await
      .unwrap();

    let analyzer = TrendAnalyzer::new(s);
    let trend =
      analyzer.compute_trend(&MetricSpec::Utilization).await.unwrap();

    assert_eq!(trend.len(), 2);
    assert_eq!(trend[0].value, Decimal::from(75));
    assert_eq!(trend[1].value, Decimal::from(100));
  }

  #[tokio::test]
  async fn cash_flow_buckets_by_fixed_day_ranges() {
    let s = store().await;
    s.ingest("s1.json", &save("2021-04-15", 50000.0, json!({})))
      .await
      .unwrap();
    s.ingest(
      "s2.json",
      &save(
        "2021-04-20",
        62000.0,
        json!({
          "transactions": [
            { "id": "t1", "day": 700, "amount": 100 },
            { "id": "t2", "day": 703, "amount": -30 },
            { "id": "t3", "day": 707, "amount": 55.5 }
          ]
        }),
      ),
    )
    .await
    .unwrap();

    let analyzer = TrendAnalyzer::new(s);
    let trend = analyzer
      .compute_trend(&MetricSpec::CashFlow { bucket_days: 7 })
      .await
      .unwrap();

    assert_eq!(trend.len(), 2);
    assert_eq!(trend[0].game_day, 700);
    assert_eq!(trend[0].value, Decimal::from(70));
    assert_eq!(trend[1].game_day, 707);
    assert_eq!(trend[1].value, Decimal::from_str("55.5").unwrap());
  }

  #[tokio::test]
  async fn zero_bucket_is_an_invalid_spec() {
    let analyzer = TrendAnalyzer::new(store().await);
    let err = analyzer
      .compute_trend(&MetricSpec::CashFlow { bucket_days: 0 })
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidSpec(_)));
  }

  #[tokio::test]
  async fn market_movement_tracks_one_component() {
    let s = store().await;
    let market = |ui: i64, backend: i64| {
      json!({ "marketValues": {
        "UiComponent": { "basePrice": ui, "change": 0.0 },
        "BackendComponent": { "basePrice": backend, "change": 0.0 }
      }})
    };
    s.ingest("s1.json", &save("2021-04-15", 50000.0, market(12, 20)))
      .await
      .unwrap();
    s.ingest("s2.json", &save("2021-04-20", 62000.0, market(15, 19)))
      .await
      .unwrap();

    let analyzer = TrendAnalyzer::new(s);
    let ui = analyzer
      .compute_trend(&MetricSpec::MarketMovement {
        component: "UiComponent".into(),
      })
      .await
      .unwrap();
    assert_eq!(ui.len(), 1);
    assert_eq!(ui[0].value, Decimal::from(3));

    // A component the store never saw: empty, not an error.
    let unknown = analyzer
      .compute_trend(&MetricSpec::MarketMovement {
        component: "GpuComponent".into(),
      })
      .await
      .unwrap();
    assert!(unknown.is_empty());
  }
}
