//! Ballot module
//!
//! Holds the vote tally for a fixed, ordered set of choices. Counts are
//! lock-free atomics so every runtime worker can record votes concurrently.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;

/// Snapshot of all counts, keyed by choice name (sorted)
pub type Tally = BTreeMap<String, u64>;

/// Reasons a vote is refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteError {
    #[error("No language provided")]
    MissingChoice,

    #[error("Invalid choice. Valid: {}", format_choices(.valid))]
    InvalidChoice { choice: String, valid: Vec<String> },
}

/// Render choices as a quoted list: `['Python', 'Java', 'Go']`
fn format_choices(choices: &[String]) -> String {
    let quoted: Vec<String> = choices.iter().map(|c| format!("'{c}'")).collect();
    format!("[{}]", quoted.join(", "))
}

struct Choice {
    name: String,
    count: AtomicU64,
}

/// Vote tally shared across all connections
pub struct Ballot {
    choices: Vec<Choice>,
    /// Set on every change, cleared by the persistence flusher
    dirty: AtomicBool,
}

impl Ballot {
    /// Create a ballot with every count at zero
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            choices: names
                .into_iter()
                .map(|name| Choice {
                    name: name.into(),
                    count: AtomicU64::new(0),
                })
                .collect(),
            dirty: AtomicBool::new(false),
        }
    }

    /// Choice names in configured order
    pub fn choices(&self) -> Vec<String> {
        self.choices.iter().map(|c| c.name.clone()).collect()
    }

    /// Record one vote for `choice` and return the updated tally
    pub fn cast(&self, choice: &str) -> Result<Tally, VoteError> {
        if choice.is_empty() {
            return Err(VoteError::MissingChoice);
        }

        let Some(entry) = self.choices.iter().find(|c| c.name == choice) else {
            return Err(VoteError::InvalidChoice {
                choice: choice.to_string(),
                valid: self.choices(),
            });
        };

        entry.count.fetch_add(1, Ordering::SeqCst);
        self.dirty.store(true, Ordering::Release);
        Ok(self.tally())
    }

    /// Current counts for every choice
    pub fn tally(&self) -> Tally {
        self.choices
            .iter()
            .map(|c| (c.name.clone(), c.count.load(Ordering::SeqCst)))
            .collect()
    }

    /// Seed counts from a persisted tally.
    ///
    /// Returns the names that are not on this ballot; their counts are dropped.
    pub fn restore(&self, tally: &Tally) -> Vec<String> {
        let mut unknown = Vec::new();
        for (name, count) in tally {
            match self.choices.iter().find(|c| &c.name == name) {
                Some(entry) => entry.count.store(*count, Ordering::SeqCst),
                None => unknown.push(name.clone()),
            }
        }
        unknown
    }

    /// Total number of votes recorded
    pub fn total(&self) -> u64 {
        self.choices
            .iter()
            .map(|c| c.count.load(Ordering::SeqCst))
            .sum()
    }

    /// Flag the tally as changed since the last flush
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clear the change flag, returning whether it was set
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ballot() -> Ballot {
        Ballot::new(["Python", "Java", "Go"])
    }

    #[test]
    fn test_new_ballot_starts_at_zero() {
        let tally = ballot().tally();
        assert_eq!(tally.len(), 3);
        assert!(tally.values().all(|&v| v == 0));
    }

    #[test]
    fn test_cast_increments_only_that_choice() {
        let b = ballot();
        b.cast("Go").unwrap();
        let tally = b.cast("Go").unwrap();
        assert_eq!(tally["Go"], 2);
        assert_eq!(tally["Python"], 0);
        assert_eq!(tally["Java"], 0);
        assert_eq!(b.total(), 2);
    }

    #[test]
    fn test_cast_is_case_sensitive() {
        let b = ballot();
        let err = b.cast("python").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid choice. Valid: ['Python', 'Java', 'Go']"
        );
        assert_eq!(b.total(), 0);
    }

    #[test]
    fn test_empty_choice_is_missing() {
        let b = ballot();
        assert_eq!(b.cast(""), Err(VoteError::MissingChoice));
        assert!(!b.take_dirty());
    }

    #[test]
    fn test_tally_keys_are_sorted() {
        let keys: Vec<String> = ballot().tally().into_keys().collect();
        assert_eq!(keys, vec!["Go", "Java", "Python"]);
    }

    #[test]
    fn test_choices_keep_configured_order() {
        assert_eq!(ballot().choices(), vec!["Python", "Java", "Go"]);
    }

    #[test]
    fn test_restore_reports_unknown_names() {
        let b = ballot();
        let mut saved = Tally::new();
        saved.insert("Java".to_string(), 7);
        saved.insert("Cobol".to_string(), 3);

        let unknown = b.restore(&saved);
        assert_eq!(unknown, vec!["Cobol"]);
        assert_eq!(b.tally()["Java"], 7);
        assert_eq!(b.total(), 7);
    }

    #[test]
    fn test_dirty_flag() {
        let b = ballot();
        assert!(!b.take_dirty());
        b.cast("Python").unwrap();
        assert!(b.take_dirty());
        assert!(!b.take_dirty());
    }

    #[test]
    fn test_concurrent_votes_are_not_lost() {
        let b = Arc::new(ballot());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let b = Arc::clone(&b);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        b.cast("Java").unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(b.tally()["Java"], 1000);
    }
}
