// Application state module
// Shared by every connection task across runtime workers

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::types::Config;
use crate::ballot::Ballot;
use crate::logger;
use crate::metrics::AppMetrics;
use crate::persist::{PersistError, StateStore};

/// Application state
pub struct AppState {
    pub config: Config,
    pub ballot: Ballot,
    pub metrics: AppMetrics,

    /// Tally state file, when persistence is enabled
    pub store: Option<Arc<StateStore>>,

    // Cached config values for fast access without locks
    pub cached_access_log: Arc<AtomicBool>,
}

impl AppState {
    /// Create `AppState`, restoring the persisted tally if a state file is configured
    pub fn new(config: &Config) -> Result<Self, PersistError> {
        let ballot = Ballot::new(config.ballot.choices.iter().cloned());

        let store = config
            .persistence
            .state_file
            .as_deref()
            .map(|path| Arc::new(StateStore::new(path)));

        if let Some(store) = store.as_ref() {
            if let Some(saved) = store.load()? {
                for name in ballot.restore(&saved) {
                    logger::log_warning(&format!(
                        "Ignoring persisted votes for '{name}': not on the ballot"
                    ));
                }
                logger::log_info(&format!(
                    "[Persist] Restored {} votes from {}",
                    ballot.total(),
                    store.path().display()
                ));
            }
        }

        Ok(Self {
            config: config.clone(),
            ballot,
            metrics: AppMetrics::new(),
            store,
            cached_access_log: Arc::new(AtomicBool::new(config.logging.access_log)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn test_new_state_without_persistence() {
        let state = AppState::new(&test_config()).unwrap();
        assert!(state.store.is_none());
        assert_eq!(state.ballot.total(), 0);
        assert_eq!(state.ballot.choices(), vec!["Python", "Java", "Go"]);
    }

    #[test]
    fn test_new_state_restores_tally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        std::fs::write(&path, "[votes]\nPython = 4\nGo = 1\nPerl = 9\n").unwrap();

        let mut cfg = test_config();
        cfg.persistence.state_file = Some(path.to_string_lossy().into_owned());
        let state = AppState::new(&cfg).unwrap();

        let tally = state.ballot.tally();
        assert_eq!(tally["Python"], 4);
        assert_eq!(tally["Go"], 1);
        assert_eq!(tally["Java"], 0);
        assert!(!tally.contains_key("Perl"));
    }

    #[test]
    fn test_new_state_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        std::fs::write(&path, "this is not toml [").unwrap();

        let mut cfg = test_config();
        cfg.persistence.state_file = Some(path.to_string_lossy().into_owned());
        assert!(AppState::new(&cfg).is_err());
    }
}
