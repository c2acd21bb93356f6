//! Error type for `tally-trends`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The metric spec itself is malformed (e.g. a zero-width bucket).
  #[error("invalid metric spec: {0}")]
  InvalidSpec(String),

  /// An underlying store query failed. Analyzer access is read-only, so
  /// stored data is never affected.
  #[error("store query failed: {0}")]
  Store(String),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error) -> Self {
    Self::Store(e.to_string())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
