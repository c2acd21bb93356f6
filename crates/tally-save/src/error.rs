//! Error type for the save-file loader.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("cannot read {path}: {source}")]
  Read {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The file is not parseable JSON, not an object, or is missing the
  /// mandatory fields a save document always carries.
  #[error("invalid save format: {0}")]
  InvalidFormat(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
