// Tally persistence module
// Saves the vote tally to a TOML state file and restores it on startup

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::ballot::Tally;
use crate::config::AppState;
use crate::logger;
use crate::server::shutdown_requested;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to access state file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse state file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// On-disk layout of the state file
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct PersistentState {
    /// RFC 3339 timestamp of the last save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,

    #[serde(default)]
    pub votes: Tally,
}

/// State file handle
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the persisted tally; `None` when no state file exists yet
    pub fn load(&self) -> Result<Option<Tally>, PersistError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        let state: PersistentState =
            toml::from_str(&content).map_err(|source| PersistError::Parse {
                path: self.path.display().to_string(),
                source,
            })?;
        Ok(Some(state.votes))
    }

    /// Write the tally, replacing the previous file atomically
    pub fn save(&self, tally: &Tally) -> Result<(), PersistError> {
        let state = PersistentState {
            saved_at: Some(chrono::Local::now().to_rfc3339()),
            votes: tally.clone(),
        };
        let content = toml::to_string_pretty(&state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
            }
        }

        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, content).map_err(|source| self.io_error(source))?;
        fs::rename(&tmp_path, &self.path).map_err(|source| self.io_error(source))?;
        Ok(())
    }

    /// Get state file path
    #[allow(clippy::missing_const_for_fn)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: io::Error) -> PersistError {
        PersistError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

/// Save the tally if it changed since the last flush
pub async fn flush_if_dirty(state: &Arc<AppState>) {
    let Some(store) = state.store.as_ref() else {
        return;
    };
    if !state.ballot.take_dirty() {
        return;
    }

    let tally = state.ballot.tally();
    let store = Arc::clone(store);
    let result = tokio::task::spawn_blocking(move || store.save(&tally)).await;

    match result {
        Ok(Ok(())) => logger::log_debug("[Persist] Tally flushed"),
        Ok(Err(e)) => {
            // Keep the change pending so the next tick retries
            state.ballot.mark_dirty();
            logger::log_error(&format!("[Persist] {e}"));
        }
        Err(e) => {
            state.ballot.mark_dirty();
            logger::log_error(&format!("[Persist] Flush task failed: {e}"));
        }
    }
}

/// Periodically flush the tally until shutdown is requested.
///
/// Connections still draining may record votes after this returns, so the
/// caller runs [`final_flush`] once the server loop has finished.
pub async fn run_flusher(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let interval = Duration::from_secs(state.config.persistence.flush_interval.max(1));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => flush_if_dirty(&state).await,
            () = shutdown_requested(&mut shutdown) => break,
        }
    }
}

/// Save whatever is still pending after every connection has closed
pub async fn final_flush(state: &Arc<AppState>) {
    let Some(store) = state.store.as_ref() else {
        return;
    };
    flush_if_dirty(state).await;
    logger::log_info(&format!(
        "[Persist] Final tally saved to {}",
        store.path().display()
    ));
}
