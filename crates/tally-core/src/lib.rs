//! Core types and trait definitions for the tally temporal store.
//!
//! This crate is deliberately free of database and filesystem dependencies.
//! It holds the save-document model, the field catalog (the versioned
//! schema-mapping table), the relational mapper and its inverse, and the
//! [`store::SnapshotStore`] abstraction the other crates build on.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod map;
pub mod plan;
pub mod reconstruct;
pub mod snapshot;
pub mod store;

pub use error::{Error, Result};
