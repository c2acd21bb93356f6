//! Error type for `tally-store-sqlite`.

use tally_core::catalog::FieldKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] tally_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// The write transaction for one save file failed and was rolled back;
  /// the store is exactly as it was before the call.
  #[error("ingestion of {filename:?} failed: {source}")]
  Ingestion {
    filename: String,
    #[source]
    source:   tokio_rusqlite::Error,
  },

  #[error("query failed: {0}")]
  Query(String),

  #[error("cannot decode column {column:?} as {kind:?}")]
  ColumnDecode { column: String, kind: FieldKind },

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
