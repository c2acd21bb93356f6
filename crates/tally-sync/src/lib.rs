//! Save-directory synchronisation for tally.
//!
//! The watcher side ferries save files from the game's save directory into
//! the local working set: debounced copy-on-change, content-hash dedup, an
//! update-signal file for pollers, and a "document ready" queue. The
//! ingestion side consumes that queue (or a whole directory, for historical
//! backfill) and drives documents through load → plausibility → ingest,
//! recording a per-file outcome and never letting one bad file abort the
//! rest.

pub mod backfill;
pub mod error;
pub mod signal;
pub mod watch;

pub use backfill::{BatchReport, FileOutcome, backfill, process_file};
pub use error::{Error, Result};
pub use signal::UpdateSignal;
pub use watch::{DocumentReady, SaveWatcher, WatchConfig};

use tally_core::store::SnapshotStore;
use tally_save::PlausibilityPolicy;
use tokio::sync::mpsc;

/// Consume the watcher's queue until it closes, ingesting each ready
/// document and logging its outcome.
pub async fn run_ingest_loop<S: SnapshotStore>(
  store: &S,
  policy: &PlausibilityPolicy,
  mut rx: mpsc::Receiver<DocumentReady>,
) {
  while let Some(event) = rx.recv().await {
    let outcome = process_file(store, policy, &event.path).await;
    outcome.log(&event.path.display().to_string());
  }
  tracing::info!("ingest queue closed; loop exiting");
}
