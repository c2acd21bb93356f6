//! The update-signal file.
//!
//! A small JSON record rewritten after each successful copy of a new save
//! file. The dashboard polls `update_count` to decide whether to invalidate
//! its cache — this file is the sole coordination channel between the
//! ingestion-side tooling and presentation; no RPC is involved.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSignal {
  pub last_update:  DateTime<Utc>,
  pub source_file:  String,
  pub update_count: u64,
}

impl UpdateSignal {
  /// Read the signal file. A missing or corrupt file reads as `None`; the
  /// next bump starts the count over.
  pub fn read(path: &Path) -> Option<Self> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
  }

  /// Increment the counter and rewrite the file.
  pub fn bump(path: &Path, source_file: &str) -> Result<Self> {
    let previous = Self::read(path).map_or(0, |s| s.update_count);
    let signal = Self {
      last_update:  Utc::now(),
      source_file:  source_file.to_owned(),
      update_count: previous + 1,
    };
    let body = serde_json::to_string_pretty(&signal)?;
    std::fs::write(path, body).map_err(Error::io(path))?;
    Ok(signal)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bump_starts_at_one_and_increments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("update.json");

    let first = UpdateSignal::bump(&path, "company.json").unwrap();
    assert_eq!(first.update_count, 1);
    assert_eq!(first.source_file, "company.json");

    let second = UpdateSignal::bump(&path, "company_autosave.json").unwrap();
    assert_eq!(second.update_count, 2);

    let read = UpdateSignal::read(&path).unwrap();
    assert_eq!(read, second);
  }

  #[test]
  fn corrupt_signal_file_reads_as_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("update.json");
    std::fs::write(&path, "not json").unwrap();

    assert!(UpdateSignal::read(&path).is_none());
    // And bumping recovers rather than failing.
    assert_eq!(UpdateSignal::bump(&path, "x.json").unwrap().update_count, 1);
  }
}
