//! Snapshot — the root record representing one ingested save file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row id of a snapshot in the temporal store.
pub type SnapshotId = i64;

/// One ingested save file at one point in real and in-game time.
///
/// Snapshots and their child rows are created atomically by a single
/// ingestion call and never updated or deleted afterwards; the store grows
/// append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
  pub id:          SnapshotId,
  /// Source filename; unique across all snapshots, which is what makes
  /// ingestion idempotent per file.
  pub filename:    String,
  /// Real-world ingestion timestamp, assigned by the store.
  pub ingested_at: DateTime<Utc>,
  /// Days since the Unix epoch of the in-game date, when the document
  /// carried a parseable one.
  pub game_day:    Option<i64>,
}

/// Result of an ingestion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
  /// A new snapshot was written.
  Ingested(SnapshotId),
  /// The filename was already present; nothing was written. This is a
  /// control-flow signal, not a failure.
  AlreadyIngested(SnapshotId),
}

impl IngestOutcome {
  pub fn snapshot_id(self) -> SnapshotId {
    match self {
      Self::Ingested(id) | Self::AlreadyIngested(id) => id,
    }
  }

  pub fn is_new(self) -> bool { matches!(self, Self::Ingested(_)) }
}
