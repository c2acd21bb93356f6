//! Error types for `tally-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("save document is not a JSON object")]
  NotAnObject,

  #[error("invalid field catalog: {0}")]
  Catalog(String),

  #[error("stored snapshot references unknown table: {0:?}")]
  UnknownTable(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
