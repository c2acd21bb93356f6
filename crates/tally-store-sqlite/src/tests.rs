//! Integration tests for `TemporalStore` against an in-memory database.

use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;

use tally_core::{
  catalog::FieldCatalog,
  document::SaveDocument,
  map::map_document,
  plan::{ChildRow, ChildTable, ColumnValue, RelationalPlan, RootRow},
  reconstruct::reconstruct,
  snapshot::IngestOutcome,
  store::SnapshotStore,
};

use crate::{Error, TemporalStore};

async fn store() -> TemporalStore {
  TemporalStore::open_in_memory(FieldCatalog::builtin())
    .await
    .expect("in-memory store")
}

fn doc(value: serde_json::Value) -> SaveDocument {
  SaveDocument::from_value(value).unwrap()
}

/// The first snapshot of the ingestion scenario: two employees, 50k.
fn save_s1() -> SaveDocument {
  doc(json!({
    "date": "2021-04-15T10:30:00.000Z",
    "companyName": "Momentum",
    "balance": 50000,
    "employees": [
      { "id": "e1", "name": "Ada", "salary": 4200 },
      { "id": "e2", "name": "Grace", "salary": 5100 }
    ],
    "transactions": [
      { "id": "t1", "day": 18731, "amount": -250.50, "label": "rent" }
    ]
  }))
}

/// The second snapshot: one hire and 12k of profit later.
fn save_s2() -> SaveDocument {
  doc(json!({
    "date": "2021-04-20T10:30:00.000Z",
    "companyName": "Momentum",
    "balance": 62000,
    "employees": [
      { "id": "e1", "name": "Ada", "salary": 4200 },
      { "id": "e2", "name": "Grace", "salary": 5100 },
      { "id": "e3", "name": "Edsger", "salary": 3900 }
    ],
    "transactions": [
      { "id": "t1", "day": 18731, "amount": -250.50, "label": "rent" },
      { "id": "t2", "day": 18735, "amount": 12250.50, "label": "contract" }
    ]
  }))
}

fn table_rows(counts: &[tally_core::store::TableCount], table: &str) -> u64 {
  counts.iter().find(|c| c.table == table).map_or(0, |c| c.rows)
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn schema_init_is_idempotent() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("tally.db");

  let first = TemporalStore::open(&path, FieldCatalog::builtin()).await.unwrap();
  first.ingest("s1.json", &save_s1()).await.unwrap();
  drop(first);

  // Reopening an initialised database is a no-op, not an error, and the
  // data is still there.
  let second = TemporalStore::open(&path, FieldCatalog::builtin()).await.unwrap();
  let snapshots = second.snapshots().await.unwrap();
  assert_eq!(snapshots.len(), 1);
  assert_eq!(snapshots[0].filename, "s1.json");
}

// ─── Ingestion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_writes_root_and_children() {
  let s = store().await;

  let outcome = s.ingest("s1.json", &save_s1()).await.unwrap();
  let IngestOutcome::Ingested(id) = outcome else {
    panic!("expected a fresh ingestion")
  };

  let snapshot = s.snapshot(id).await.unwrap().unwrap();
  assert_eq!(snapshot.filename, "s1.json");
  assert!(snapshot.game_day.is_some());

  let counts = s.table_counts().await.unwrap();
  assert_eq!(table_rows(&counts, "snapshots"), 1);
  assert_eq!(table_rows(&counts, "employees"), 2);
  assert_eq!(table_rows(&counts, "transactions"), 1);
}

#[tokio::test]
async fn ingest_same_filename_twice_is_a_noop() {
  let s = store().await;

  let first = s.ingest("s1.json", &save_s1()).await.unwrap();
  assert!(first.is_new());

  // Second call skips before any mutation; even a different document under
  // the same filename writes nothing.
  let second = s.ingest("s1.json", &save_s2()).await.unwrap();
  assert_eq!(
    second,
    IngestOutcome::AlreadyIngested(first.snapshot_id())
  );

  let counts = s.table_counts().await.unwrap();
  assert_eq!(table_rows(&counts, "snapshots"), 1);
  assert_eq!(table_rows(&counts, "employees"), 2);
}

#[tokio::test]
async fn failed_ingestion_leaves_no_partial_state() {
  let s = store().await;

  // A plan that inserts its root row fine and then dies on a child insert:
  // the child column does not exist in the schema.
  let plan = RelationalPlan {
    catalog_version: s.catalog().version,
    root: RootRow { game_day: Some(18731), columns: vec![] },
    children: vec![ChildTable {
      table:      "employees".to_owned(),
      key_column: None,
      rows:       vec![ChildRow {
        idx:     0,
        key:     None,
        columns: vec![(
          "no_such_column".to_owned(),
          ColumnValue::Text("boom".to_owned()),
        )],
        extra:   None,
      }],
    }],
    unmapped: vec![],
    renames: vec![],
  };

  let err = s.ingest_plan("broken.json", plan).await.unwrap_err();
  assert!(matches!(err, Error::Ingestion { ref filename, .. } if filename == "broken.json"));

  // Rollback means no orphaned root row and no child rows.
  let counts = s.table_counts().await.unwrap();
  assert_eq!(table_rows(&counts, "snapshots"), 0);
  assert_eq!(table_rows(&counts, "employees"), 0);
  assert!(s.find_by_filename("broken.json").await.unwrap().is_none());

  // The filename is free for a later, successful retry.
  let retry = s.ingest("broken.json", &save_s1()).await.unwrap();
  assert!(retry.is_new());
}

#[tokio::test]
async fn scenario_two_snapshots_accumulate() {
  let s = store().await;

  let first = s.ingest("s1.json", &save_s1()).await.unwrap();
  let second = s.ingest("s2.json", &save_s2()).await.unwrap();
  assert!(first.is_new() && second.is_new());

  let counts = s.table_counts().await.unwrap();
  assert_eq!(table_rows(&counts, "snapshots"), 2);
  // 2 employees in s1 + 3 in s2; no cross-snapshot merging.
  assert_eq!(table_rows(&counts, "employees"), 5);

  let series = s.balance_series().await.unwrap();
  assert_eq!(series.len(), 2);
  assert_eq!(series[1].value - series[0].value, Decimal::from(12000));

  // Re-ingesting s1 afterwards changes nothing.
  let again = s.ingest("s1.json", &save_s1()).await.unwrap();
  assert!(!again.is_new());
  let counts = s.table_counts().await.unwrap();
  assert_eq!(table_rows(&counts, "snapshots"), 2);
  assert_eq!(table_rows(&counts, "employees"), 5);
}

// ─── Schema drift ────────────────────────────────────────────────────────────

#[tokio::test]
async fn overlapping_documents_both_ingest() {
  let s = store().await;

  // Different (but overlapping) key sets across game versions.
  let old_version = doc(json!({
    "date": "2021-04-15T10:30:00.000Z",
    "balance": 50000,
    "employees": [{ "id": "e1" }],
    "jeets": [{ "id": "j1", "text": "hello", "day": 3 }]
  }));
  let new_version = doc(json!({
    "date": "2021-04-20T10:30:00.000Z",
    "balance": 60000,
    "employees": [{ "id": "e1", "mood": 0.9 }],
    "marketValues": { "UiComponent": { "basePrice": 12, "change": 0.04 } },
    "futureFeature": { "shiny": true }
  }));

  let a = s.ingest("old.json", &old_version).await.unwrap();
  let b = s.ingest("new.json", &new_version).await.unwrap();
  assert!(a.is_new() && b.is_new());

  let counts = s.table_counts().await.unwrap();
  assert_eq!(table_rows(&counts, "snapshots"), 2);
  assert_eq!(table_rows(&counts, "jeets"), 1);
  assert_eq!(table_rows(&counts, "market_values"), 1);
  // The novel key is captured, not dropped.
  assert_eq!(table_rows(&counts, "unmapped_fields"), 1);

  // The earlier snapshot is untouched by the later ingest.
  let stored_a = s.fetch(a.snapshot_id()).await.unwrap().unwrap();
  assert!(stored_a.children.contains_key("jeets"));
  assert!(!stored_a.children.contains_key("market_values"));
  assert!(stored_a.unmapped.is_empty());
}

#[tokio::test]
async fn renames_are_recorded_in_the_store() {
  let s = store().await;
  s.ingest("s1.json", &save_s1()).await.unwrap();

  let stored = s.fetch(1).await.unwrap().unwrap();
  assert!(stored.renames.iter().any(|r| {
    r.table == "snapshots" && r.field == "id" && r.column == "id_src"
  }));
  assert!(stored.renames.iter().any(|r| {
    r.table == "employees" && r.field == "id" && r.column == "id_src"
  }));
}

// ─── Round trip ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn stored_rows_reconstruct_the_document() {
  let s = store().await;

  let original = json!({
    "date": "2021-04-15T10:30:00.000Z",
    "id": "game-7",
    "companyName": "Momentum",
    "balance": 50000.25,
    "xp": 1523.5,
    "researchPoints": 12,
    "paused": false,
    "employees": [
      { "id": "e1", "name": "Ada", "salary": 4200.75, "superstar": true }
    ],
    "employeesOrder": ["e1"],
    "transactions": [
      { "id": "t1", "day": 18731, "amount": -250.50, "label": "rent" }
    ],
    "marketValues": {
      "UiComponent": { "basePrice": 12.5, "change": 0.04 }
    },
    "office": {
      "level": 2,
      "rent": 5000,
      "workstations": [{ "employee": "e1" }, { "employee": null }]
    }
  });

  let outcome =
    s.ingest("round.json", &doc(original.clone())).await.unwrap();
  let stored = s.fetch(outcome.snapshot_id()).await.unwrap().unwrap();
  let rebuilt = reconstruct(s.catalog(), &stored).unwrap().into_value();

  assert_eq!(rebuilt, original);
}

#[tokio::test]
async fn currency_precision_survives_storage() {
  let s = store().await;
  let save = doc(json!({
    "date": "2021-04-15T10:30:00.000Z",
    "balance": 1234567.89,
    "employees": [{ "id": "e1" }]
  }));
  s.ingest("precise.json", &save).await.unwrap();

  let series = s.balance_series().await.unwrap();
  assert_eq!(series[0].value, Decimal::from_str("1234567.89").unwrap());
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn snapshots_are_ordered_by_game_day() {
  let s = store().await;

  // Ingested out of order on purpose.
  s.ingest("s2.json", &save_s2()).await.unwrap();
  s.ingest("s1.json", &save_s1()).await.unwrap();

  let snapshots = s.snapshots().await.unwrap();
  assert_eq!(snapshots.len(), 2);
  assert!(snapshots[0].game_day < snapshots[1].game_day);
  assert_eq!(snapshots[0].filename, "s1.json");
}

#[tokio::test]
async fn latest_is_by_ingestion_time() {
  let s = store().await;
  s.ingest("s2.json", &save_s2()).await.unwrap();
  s.ingest("s1.json", &save_s1()).await.unwrap();

  // s1 is older in game time but was ingested last.
  let latest = s.latest().await.unwrap().unwrap();
  assert_eq!(latest.filename, "s1.json");
}

#[tokio::test]
async fn headcount_excludes_fired_employees() {
  let s = store().await;
  let save = doc(json!({
    "date": "2021-04-15T10:30:00.000Z",
    "balance": 50000,
    "employees": [
      { "id": "e1", "fired": false },
      { "id": "e2", "fired": true },
      { "id": "e3" }
    ]
  }));
  s.ingest("fired.json", &save).await.unwrap();

  let series = s.headcount_series().await.unwrap();
  assert_eq!(series.len(), 1);
  assert_eq!(series[0].count, 2);
}

#[tokio::test]
async fn office_series_counts_workstations() {
  let s = store().await;
  let save = doc(json!({
    "date": "2021-04-15T10:30:00.000Z",
    "balance": 50000,
    "employees": [{ "id": "e1" }],
    "office": {
      "workstations": [
        { "employee": "e1" },
        { "employee": null },
        {}
      ]
    }
  }));
  s.ingest("office.json", &save).await.unwrap();

  let series = s.office_series().await.unwrap();
  assert_eq!(series.len(), 1);
  assert_eq!(series[0].workstations_total, 3);
  assert_eq!(series[0].workstations_occupied, 1);
}

#[tokio::test]
async fn market_series_filters_by_component() {
  let s = store().await;
  s.ingest(
    "m1.json",
    &doc(json!({
      "date": "2021-04-15T10:30:00.000Z",
      "balance": 50000,
      "employees": [{ "id": "e1" }],
      "marketValues": {
        "UiComponent": { "basePrice": 12, "change": 0.04 },
        "BackendComponent": { "basePrice": 20, "change": -0.01 }
      }
    })),
  )
  .await
  .unwrap();

  let ui = s.market_series("UiComponent").await.unwrap();
  assert_eq!(ui.len(), 1);
  assert_eq!(ui[0].base_price, Decimal::from(12));

  let missing = s.market_series("GpuComponent").await.unwrap();
  assert!(missing.is_empty());
}

#[tokio::test]
async fn transactions_come_back_in_source_order() {
  let s = store().await;
  let outcome = s.ingest("s2.json", &save_s2()).await.unwrap();

  let ledger = s.transactions(outcome.snapshot_id()).await.unwrap();
  assert_eq!(ledger.len(), 2);
  assert_eq!(ledger[0].label.as_deref(), Some("rent"));
  assert_eq!(ledger[0].amount, Decimal::from_str("-250.50").unwrap());
  assert_eq!(ledger[1].day, Some(18735));
}

#[tokio::test]
async fn fetch_unknown_snapshot_returns_none() {
  let s = store().await;
  assert!(s.fetch(42).await.unwrap().is_none());
  assert!(s.snapshot(42).await.unwrap().is_none());
}

#[tokio::test]
async fn file_backed_store_serves_concurrent_readers() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("tally.db");
  let s = TemporalStore::open(&path, FieldCatalog::builtin()).await.unwrap();

  s.ingest("s1.json", &save_s1()).await.unwrap();
  s.ingest("s2.json", &save_s2()).await.unwrap();

  // Each of these acquires (and releases) its own read-only connection.
  let (snapshots, series, counts) = tokio::join!(
    s.snapshots(),
    s.balance_series(),
    s.table_counts(),
  );
  assert_eq!(snapshots.unwrap().len(), 2);
  assert_eq!(series.unwrap().len(), 2);
  assert!(table_rows(&counts.unwrap(), "employees") == 5);
}

// ─── Mapper/store agreement ──────────────────────────────────────────────────

#[tokio::test]
async fn mapped_plan_matches_generated_schema() {
  // Every column the mapper can emit for the builtin catalog must exist in
  // the generated schema, or ingestion would fail at runtime.
  let s = store().await;
  let plan = map_document(s.catalog(), &save_s2()).unwrap();
  let outcome = s.ingest_plan("agreement.json", plan).await;
  assert!(outcome.is_ok());
}
