//! The `SnapshotStore` trait and supporting query-result types.
//!
//! The trait is implemented by storage backends (e.g. `tally-store-sqlite`).
//! Higher layers (`tally-trends`, `tally-sync`, `tally-cli`) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use rust_decimal::Decimal;

use crate::{
  document::SaveDocument,
  plan::StoredSnapshot,
  snapshot::{IngestOutcome, Snapshot, SnapshotId},
};

// ─── Query-result types ──────────────────────────────────────────────────────

/// One point of a per-snapshot decimal series (e.g. the balance column).
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
  pub snapshot_id: SnapshotId,
  pub game_day:    i64,
  pub value:       Decimal,
}

/// One point of a per-snapshot count series (e.g. active headcount).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountPoint {
  pub snapshot_id: SnapshotId,
  pub game_day:    i64,
  pub count:       u64,
}

/// Workstation occupancy for one snapshot's office.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficeUsage {
  pub snapshot_id:           SnapshotId,
  pub game_day:              i64,
  pub workstations_total:    u64,
  pub workstations_occupied: u64,
}

/// One component's market price as of one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketPoint {
  pub snapshot_id: SnapshotId,
  pub game_day:    i64,
  pub component:   String,
  pub base_price:  Decimal,
  pub change:      Option<f64>,
}

/// One financial ledger entry from the transactions child table.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
  pub day:    Option<i64>,
  pub amount: Decimal,
  pub label:  Option<String>,
}

/// Row count of one table, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCount {
  pub table: String,
  pub rows:  u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a tally temporal store backend.
///
/// Writes are append-only and happen exclusively through [`ingest`]
/// (single-writer discipline); every other method is read-only and safe to
/// run concurrently with an in-flight ingestion — readers never observe a
/// partially-committed snapshot.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded async runtimes.
///
/// [`ingest`]: SnapshotStore::ingest
pub trait SnapshotStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Write path ────────────────────────────────────────────────────────

  /// Ingest one save document as a new snapshot.
  ///
  /// If `filename` was already ingested, returns
  /// [`IngestOutcome::AlreadyIngested`] without touching the store. On any
  /// mid-write failure the transaction rolls back and the store is exactly
  /// as it was before the call.
  fn ingest<'a>(
    &'a self,
    filename: &'a str,
    doc: &'a SaveDocument,
  ) -> impl Future<Output = Result<IngestOutcome, Self::Error>> + Send + 'a;

  // ── Snapshot reads ────────────────────────────────────────────────────

  /// Retrieve a snapshot by id. Returns `None` if not found.
  fn snapshot(
    &self,
    id: SnapshotId,
  ) -> impl Future<Output = Result<Option<Snapshot>, Self::Error>> + Send + '_;

  /// Look a snapshot up by its unique source filename.
  fn find_by_filename<'a>(
    &'a self,
    filename: &'a str,
  ) -> impl Future<Output = Result<Option<Snapshot>, Self::Error>> + Send + 'a;

  /// All snapshots, ordered by in-game day (then id for stability).
  fn snapshots(
    &self,
  ) -> impl Future<Output = Result<Vec<Snapshot>, Self::Error>> + Send + '_;

  /// The most recently ingested snapshot, if any.
  fn latest(
    &self,
  ) -> impl Future<Output = Result<Option<Snapshot>, Self::Error>> + Send + '_;

  // ── Series reads (trend inputs) ───────────────────────────────────────

  /// Balance per snapshot, ordered by game day. Snapshots without a game
  /// day or balance are omitted.
  fn balance_series(
    &self,
  ) -> impl Future<Output = Result<Vec<SeriesPoint>, Self::Error>> + Send + '_;

  /// Active (non-fired) employee count per snapshot, ordered by game day.
  fn headcount_series(
    &self,
  ) -> impl Future<Output = Result<Vec<CountPoint>, Self::Error>> + Send + '_;

  /// Workstation occupancy per snapshot, ordered by game day.
  fn office_series(
    &self,
  ) -> impl Future<Output = Result<Vec<OfficeUsage>, Self::Error>> + Send + '_;

  /// One component's market price across snapshots, ordered by game day.
  fn market_series<'a>(
    &'a self,
    component: &'a str,
  ) -> impl Future<Output = Result<Vec<MarketPoint>, Self::Error>> + Send + 'a;

  /// The financial ledger recorded in one snapshot, in source order.
  fn transactions(
    &self,
    id: SnapshotId,
  ) -> impl Future<Output = Result<Vec<LedgerEntry>, Self::Error>> + Send + '_;

  // ── Row export & diagnostics ──────────────────────────────────────────

  /// Export a snapshot's full stored row set, for reconstruction and
  /// debugging. Returns `None` if the snapshot does not exist.
  fn fetch(
    &self,
    id: SnapshotId,
  ) -> impl Future<Output = Result<Option<StoredSnapshot>, Self::Error>> + Send + '_;

  /// Row counts of every user table in the database file.
  fn table_counts(
    &self,
  ) -> impl Future<Output = Result<Vec<TableCount>, Self::Error>> + Send + '_;
}
