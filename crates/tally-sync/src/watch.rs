//! Watching the game's save directory.
//!
//! The game rewrites its save file several times in quick succession; the
//! watcher debounces those bursts, validates that the file is a fully
//! written document before touching it, and skips byte-identical rewrites
//! via a content digest. Each successful copy bumps the update-signal file
//! and emits a [`DocumentReady`] event into the ingestion queue.

use std::{
  path::PathBuf,
  sync::{Arc, Mutex},
  time::{Duration, Instant},
};

use notify::{RecursiveMode, Watcher as _};
use sha2::{Digest as _, Sha256};
use tally_core::config::TallyConfig;
use tokio::sync::mpsc;

use crate::{Error, Result, signal::UpdateSignal};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Options for one watch session.
#[derive(Debug, Clone)]
pub struct WatchConfig {
  /// Directory the game writes into.
  pub save_dir:      PathBuf,
  /// Manual save file name.
  pub save_name:     String,
  /// Autosave file name; whichever of the two is newer wins.
  pub autosave_name: Option<String>,
  /// Local working directory receiving the copy.
  pub dest_dir:      PathBuf,
  /// Update-signal file path.
  pub signal_path:   PathBuf,
  /// Quiet period required between copies.
  pub debounce:      Duration,
}

impl WatchConfig {
  pub fn from_tally(cfg: &TallyConfig) -> Self {
    Self {
      save_dir:      cfg.save_dir.clone(),
      save_name:     cfg.save_name.clone(),
      autosave_name: cfg.autosave_name.clone(),
      dest_dir:      cfg.data_dir.clone(),
      signal_path:   cfg.data_dir.join("update.json"),
      debounce:      Duration::from_secs(cfg.debounce_secs),
    }
  }

  fn watched_names(&self) -> Vec<&str> {
    let mut names = vec![self.save_name.as_str()];
    if let Some(auto) = &self.autosave_name {
      names.push(auto.as_str());
    }
    names
  }
}

/// Emitted into the ingestion queue once a new document has been copied
/// into the working set and is stable on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReady {
  pub path: PathBuf,
}

// ─── Sync state ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct SyncState {
  last_copied: Option<Instant>,
  last_digest: Option<[u8; 32]>,
}

impl SyncState {
  fn within_debounce(&self, debounce: Duration) -> bool {
    self.last_copied.is_some_and(|t| t.elapsed() < debounce)
  }
}

// ─── One sync pass ───────────────────────────────────────────────────────────

/// Pick whichever watched save file is newest on disk.
fn newest_save(cfg: &WatchConfig) -> Option<PathBuf> {
  cfg
    .watched_names()
    .into_iter()
    .map(|name| cfg.save_dir.join(name))
    .filter_map(|path| {
      let modified = path.metadata().ok()?.modified().ok()?;
      Some((path, modified))
    })
    .max_by_key(|(_, modified)| *modified)
    .map(|(path, _)| path)
}

/// Copy the newest save into the working set if it is new content.
///
/// Returns the destination path when a copy happened. A file that does not
/// parse yet is treated as mid-write and quietly skipped; the next change
/// event will retry it.
pub fn sync_once(
  cfg: &WatchConfig,
  state: &mut SyncState,
) -> Result<Option<PathBuf>> {
  let Some(source) = newest_save(cfg) else { return Ok(None) };

  let raw =
    std::fs::read_to_string(&source).map_err(Error::io(source.clone()))?;
  if let Err(e) = tally_save::parse_str(&raw) {
    tracing::debug!(source = %source.display(), error = %e, "save not stable yet");
    return Ok(None);
  }

  let digest: [u8; 32] = Sha256::digest(raw.as_bytes()).into();
  if state.last_digest == Some(digest) {
    return Ok(None);
  }

  std::fs::create_dir_all(&cfg.dest_dir)
    .map_err(Error::io(cfg.dest_dir.clone()))?;
  let dest = cfg.dest_dir.join(&cfg.save_name);
  std::fs::write(&dest, &raw).map_err(Error::io(dest.clone()))?;

  let signal = UpdateSignal::bump(&cfg.signal_path, &cfg.save_name)?;
  state.last_digest = Some(digest);

  tracing::info!(
    source = %source.display(),
    dest = %dest.display(),
    update_count = signal.update_count,
    "save copied"
  );
  Ok(Some(dest))
}

// ─── Watcher ─────────────────────────────────────────────────────────────────

/// Handle keeping the filesystem watcher alive. Dropping it stops the
/// watch; the ingestion queue then drains and closes.
pub struct SaveWatcher {
  _watcher: notify::RecommendedWatcher,
}

impl SaveWatcher {
  /// Watch the configured save directory, emitting [`DocumentReady`] into
  /// `tx` after every successful copy.
  pub fn spawn(
    cfg: WatchConfig,
    tx: mpsc::Sender<DocumentReady>,
  ) -> Result<Self> {
    let save_dir = cfg.save_dir.clone();
    let state = Arc::new(Mutex::new(SyncState::default()));

    let mut watcher = notify::recommended_watcher(
      move |res: notify::Result<notify::Event>| {
        let event = match res {
          Ok(event) => event,
          Err(e) => {
            tracing::warn!(error = %e, "watch error");
            return;
          }
        };
        if !touches_watched_file(&cfg, &event) {
          return;
        }
        let Ok(mut state) = state.lock() else { return };
        if state.within_debounce(cfg.debounce) {
          return;
        }
        match sync_once(&cfg, &mut state) {
          Ok(Some(path)) => {
            state.last_copied = Some(Instant::now());
            // The handler runs on the notify thread, off the runtime.
            if tx.blocking_send(DocumentReady { path }).is_err() {
              tracing::warn!("ingest queue closed; dropping event");
            }
          }
          Ok(None) => {}
          Err(e) => tracing::warn!(error = %e, "save sync failed"),
        }
      },
    )?;

    watcher.watch(&save_dir, RecursiveMode::NonRecursive)?;
    tracing::info!(dir = %save_dir.display(), "watching save directory");
    Ok(Self { _watcher: watcher })
  }
}

fn touches_watched_file(cfg: &WatchConfig, event: &notify::Event) -> bool {
  event.paths.iter().any(|p| {
    p.file_name()
      .and_then(|n| n.to_str())
      .is_some_and(|name| cfg.watched_names().contains(&name))
  })
}
