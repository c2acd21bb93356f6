//! SQLite backend for the tally temporal store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. The table layout is generated
//! from the field catalog at open time; initialising an already-initialised
//! database file is a no-op.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::TemporalStore;

#[cfg(test)]
mod tests;
