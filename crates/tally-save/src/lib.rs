//! Save-file loader for tally.
//!
//! Reads a save document from disk, validates that it is a well-formed
//! instance of the expected shape, and applies the domain plausibility check
//! that keeps template/fresh saves out of the history.

pub mod error;
mod load;
mod plausible;

pub use error::{Error, Result};
pub use load::{load, parse_str};
pub use plausible::{Implausibility, PlausibilityPolicy};
