//! Historical backfill: drive a whole directory of save files through the
//! ingestion pipeline, oldest first.
//!
//! One bad file never aborts the batch; each file gets a recorded outcome
//! and processing continues. There is no retry logic — re-running the batch
//! naturally retries failures, because ingestion is idempotent per filename
//! and successful files skip as duplicates.

use std::path::Path;

use tally_core::{
  snapshot::{IngestOutcome, SnapshotId},
  store::SnapshotStore,
};
use tally_save::{Implausibility, PlausibilityPolicy};

use crate::{Error, Result};

/// What happened to one file.
#[derive(Debug)]
pub enum FileOutcome {
  Ingested(SnapshotId),
  /// Already in the store; skipped before any mutation.
  Duplicate(SnapshotId),
  /// Parsed fine but failed the plausibility check. Logged distinctly from
  /// hard errors so an operator can tell a template save from a broken one.
  Implausible(Implausibility),
  /// Unparseable or missing mandatory fields.
  Invalid(tally_save::Error),
  /// The write transaction failed and rolled back; eligible for retry.
  Failed(String),
}

impl FileOutcome {
  pub fn log(&self, filename: &str) {
    match self {
      Self::Ingested(id) => {
        tracing::info!(filename, snapshot_id = id, "ingested");
      }
      Self::Duplicate(id) => {
        tracing::debug!(filename, snapshot_id = id, "duplicate; skipped");
      }
      Self::Implausible(reason) => {
        tracing::warn!(filename, %reason, "implausible document; skipped");
      }
      Self::Invalid(error) => {
        tracing::warn!(filename, %error, "invalid document; skipped");
      }
      Self::Failed(error) => {
        tracing::error!(filename, %error, "ingestion failed");
      }
    }
  }
}

/// Per-file outcomes for one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
  pub outcomes: Vec<(String, FileOutcome)>,
}

impl BatchReport {
  fn tally(&self, f: impl Fn(&FileOutcome) -> bool) -> usize {
    self.outcomes.iter().filter(|(_, o)| f(o)).count()
  }

  pub fn ingested(&self) -> usize {
    self.tally(|o| matches!(o, FileOutcome::Ingested(_)))
  }
  pub fn duplicates(&self) -> usize {
    self.tally(|o| matches!(o, FileOutcome::Duplicate(_)))
  }
  pub fn implausible(&self) -> usize {
    self.tally(|o| matches!(o, FileOutcome::Implausible(_)))
  }
  pub fn invalid(&self) -> usize {
    self.tally(|o| matches!(o, FileOutcome::Invalid(_)))
  }
  pub fn failed(&self) -> usize {
    self.tally(|o| matches!(o, FileOutcome::Failed(_)))
  }
}

impl std::fmt::Display for BatchReport {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{} ingested, {} duplicates, {} implausible, {} invalid, {} failed",
      self.ingested(),
      self.duplicates(),
      self.implausible(),
      self.invalid(),
      self.failed(),
    )
  }
}

/// Run one file through load → plausibility → ingest.
pub async fn process_file<S: SnapshotStore>(
  store: &S,
  policy: &PlausibilityPolicy,
  path: &Path,
) -> FileOutcome {
  let doc = match tally_save::load(path) {
    Ok(doc) => doc,
    Err(e) => return FileOutcome::Invalid(e),
  };

  if let Err(reason) = policy.check(&doc) {
    return FileOutcome::Implausible(reason);
  }

  let filename = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| path.display().to_string());

  match store.ingest(&filename, &doc).await {
    Ok(IngestOutcome::Ingested(id)) => FileOutcome::Ingested(id),
    Ok(IngestOutcome::AlreadyIngested(id)) => FileOutcome::Duplicate(id),
    Err(e) => FileOutcome::Failed(e.to_string()),
  }
}

/// Process every `*.json` file under `dir`, oldest modification first.
pub async fn backfill<S: SnapshotStore>(
  store: &S,
  policy: &PlausibilityPolicy,
  dir: &Path,
) -> Result<BatchReport> {
  let entries =
    std::fs::read_dir(dir).map_err(Error::io(dir.to_path_buf()))?;

  let mut files = Vec::new();
  for entry in entries {
    let entry = entry.map_err(Error::io(dir.to_path_buf()))?;
    let path = entry.path();
    if path.extension().is_some_and(|ext| ext == "json") {
      let modified = entry
        .metadata()
        .and_then(|m| m.modified())
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
      files.push((path, modified));
    }
  }
  files.sort_by_key(|(_, modified)| *modified);

  tracing::info!(dir = %dir.display(), files = files.len(), "starting backfill");

  let mut report = BatchReport::default();
  for (path, _) in files {
    let filename = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| path.display().to_string());
    let outcome = process_file(store, policy, &path).await;
    outcome.log(&filename);
    report.outcomes.push((filename, outcome));
  }

  tracing::info!(%report, "backfill complete");
  Ok(report)
}
