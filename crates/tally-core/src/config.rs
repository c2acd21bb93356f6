//! Runtime configuration.
//!
//! Every component receives its options explicitly at construction; there
//! are no process-wide mutable defaults. The binary deserialises this from
//! `config.toml` (with `TALLY_`-prefixed environment overrides).

use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Top-level configuration for the tally toolchain.
#[derive(Debug, Clone, Deserialize)]
pub struct TallyConfig {
  /// Directory the game writes its save files into (watched).
  #[serde(default = "default_save_dir")]
  pub save_dir:      PathBuf,
  /// Local working directory for copied saves and the update-signal file.
  #[serde(default = "default_data_dir")]
  pub data_dir:      PathBuf,
  /// Manual save file name inside `save_dir`.
  #[serde(default = "default_save_name")]
  pub save_name:     String,
  /// Autosave file name inside `save_dir`; whichever of the two is newer
  /// wins.
  #[serde(default)]
  pub autosave_name: Option<String>,
  /// Path of the SQLite database file.
  #[serde(default = "default_db_path")]
  pub db_path:       PathBuf,
  /// Optional path to a field-catalog revision overriding the built-in one.
  #[serde(default)]
  pub catalog_path:  Option<PathBuf>,
  /// Balance floor below which a document is treated as a fresh template
  /// rather than a real in-progress save. The exact cutoff is a heuristic,
  /// not load-bearing; tune it per installation.
  #[serde(default = "default_min_balance")]
  pub min_plausible_balance: Decimal,
  /// Seconds to wait out rapid successive writes of the save file before
  /// copying it.
  #[serde(default = "default_debounce_secs")]
  pub debounce_secs: u64,
}

impl Default for TallyConfig {
  fn default() -> Self {
    Self {
      save_dir:              default_save_dir(),
      data_dir:              default_data_dir(),
      save_name:             default_save_name(),
      autosave_name:         None,
      db_path:               default_db_path(),
      catalog_path:          None,
      min_plausible_balance: default_min_balance(),
      debounce_secs:         default_debounce_secs(),
    }
  }
}

fn default_save_dir() -> PathBuf { PathBuf::from(".") }
fn default_data_dir() -> PathBuf { PathBuf::from("save_data") }
fn default_save_name() -> String { "company.json".to_owned() }
fn default_db_path() -> PathBuf { PathBuf::from("tally.db") }
fn default_min_balance() -> Decimal { Decimal::from(1000) }
fn default_debounce_secs() -> u64 { 3 }
