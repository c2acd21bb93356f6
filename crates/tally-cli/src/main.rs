//! `tally` — command-line driver for the temporal save-file store.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the
//! SQLite store, and runs one of the subcommands:
//!
//! ```text
//! tally backfill           # ingest every save file in the data directory
//! tally watch              # follow the game's save directory live
//! tally status             # snapshot and table counts
//! tally trend balance-delta
//! tally trend cash-flow --bucket-days 14
//! tally trend market --component UiComponent
//! ```
//!
//! Per-file problems during backfill and watch are reported as log lines
//! and never abort the run; the process exits non-zero only for
//! unrecoverable startup errors.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tally_core::{catalog::FieldCatalog, config::TallyConfig, store::SnapshotStore as _};
use tally_save::PlausibilityPolicy;
use tally_store_sqlite::TemporalStore;
use tally_sync::{SaveWatcher, WatchConfig};
use tally_trends::{MetricSpec, TrendAnalyzer};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
  name = "tally",
  about = "Temporal ingestion and trend analytics for company-sim save files"
)]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Ingest every save file in a directory, oldest first.
  Backfill {
    /// Directory to scan; defaults to the configured data directory.
    #[arg(long)]
    dir: Option<PathBuf>,
  },
  /// Watch the game's save directory and ingest new saves as they appear.
  Watch,
  /// Show snapshot and table counts.
  Status,
  /// Compute a trend metric over the accumulated history.
  Trend {
    /// One of: balance-delta, headcount, utilization, cash-flow, market.
    metric: String,

    /// Bucket width in days for cash-flow.
    #[arg(long, default_value_t = 7)]
    bucket_days: u32,

    /// Component name for market.
    #[arg(long)]
    component: Option<String>,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("TALLY"))
    .build()
    .context("failed to read config")?;
  let cfg: TallyConfig =
    settings.try_deserialize().context("failed to deserialise TallyConfig")?;

  let catalog = match &cfg.catalog_path {
    Some(path) => {
      let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;
      FieldCatalog::from_json_str(&raw).context("parsing catalog")?
    }
    None => FieldCatalog::builtin(),
  };

  let store = TemporalStore::open(&cfg.db_path, catalog)
    .await
    .with_context(|| format!("failed to open store at {}", cfg.db_path.display()))?;

  let policy =
    PlausibilityPolicy::with_min_balance(cfg.min_plausible_balance);

  match cli.command {
    Command::Backfill { dir } => {
      let dir = dir.unwrap_or_else(|| cfg.data_dir.clone());
      let report = tally_sync::backfill(&store, &policy, &dir)
        .await
        .context("backfill failed to scan the directory")?;
      println!("Backfill complete: {report}");
    }

    Command::Watch => {
      let (tx, rx) = tokio::sync::mpsc::channel(16);
      let _watcher = SaveWatcher::spawn(WatchConfig::from_tally(&cfg), tx)
        .context("failed to start save-directory watcher")?;

      tokio::select! {
        _ = tally_sync::run_ingest_loop(&store, &policy, rx) => {}
        _ = tokio::signal::ctrl_c() => {
          tracing::info!("interrupted; shutting down");
        }
      }
    }

    Command::Status => {
      match store.latest().await? {
        Some(latest) => println!(
          "Latest snapshot: {} (id {}, game day {})",
          latest.filename,
          latest.id,
          latest
            .game_day
            .map_or_else(|| "unknown".to_owned(), |d| d.to_string()),
        ),
        None => println!("Store is empty."),
      }
      for count in store.table_counts().await? {
        println!("{:>8}  {}", count.rows, count.table);
      }
    }

    Command::Trend { metric, bucket_days, component } => {
      let spec = metric_spec(&metric, bucket_days, component)?;
      let analyzer = TrendAnalyzer::new(store);
      let points = analyzer.compute_trend(&spec).await?;
      if points.is_empty() {
        println!("Not enough history yet (need at least two snapshots).");
      }
      for point in points {
        println!("day {:>6}  {}", point.game_day, point.value);
      }
    }
  }

  Ok(())
}

fn metric_spec(
  metric: &str,
  bucket_days: u32,
  component: Option<String>,
) -> anyhow::Result<MetricSpec> {
  Ok(match metric {
    "balance-delta" => MetricSpec::BalanceDelta,
    "headcount" => MetricSpec::Headcount,
    "utilization" => MetricSpec::Utilization,
    "cash-flow" => MetricSpec::CashFlow { bucket_days },
    "market" => {
      let component =
        component.context("market requires --component <name>")?;
      MetricSpec::MarketMovement { component }
    }
    other => anyhow::bail!(
      "unknown metric {other:?}; expected balance-delta, headcount, \
       utilization, cash-flow, or market"
    ),
  })
}
