//! The set of repositories already harvested, derived from the output directory.
//!
//! There is no separate index: an artifact named `owner_name.<ext>` with a
//! non-empty body *is* the ledger entry for `owner/name`. Loading the ledger is
//! a directory scan that reverses the naming convention.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};

use crate::contract::RepositoryRef;

/// Artifact file name for a repository: `owner_name.ext`.
pub fn artifact_file_name(repo: &RepositoryRef, extension: &str) -> String {
    format!("{}_{}.{}", repo.owner, repo.name, extension)
}

/// Reverse of [`artifact_file_name`]. Splits on the first `_` since owners
/// cannot contain one while repository names can.
pub fn parse_artifact_file_name(file_name: &str, extension: &str) -> Option<RepositoryRef> {
    let base = file_name.strip_suffix(extension)?.strip_suffix('.')?;
    let (owner, name) = base.split_once('_')?;
    if owner.is_empty() || name.is_empty() {
        return None;
    }
    Some(RepositoryRef::new(owner, name))
}

#[derive(Debug, Default)]
pub struct Ledger {
    done: HashSet<String>,
    in_flight: HashSet<String>,
}

impl Ledger {
    /// Rebuild the ledger from artifacts in `dir`. Files that do not follow
    /// the naming convention, and empty artifacts, are ignored.
    pub fn load(dir: &Path, extension: &str) -> io::Result<Self> {
        let mut ledger = Ledger::default();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some(repo) = parse_artifact_file_name(file_name, extension) else {
                debug!(file = file_name, "[LEDGER] Ignoring file outside naming convention");
                continue;
            };
            let metadata = entry.metadata()?;
            if !metadata.is_file() || metadata.len() == 0 {
                debug!(file = file_name, "[LEDGER] Ignoring empty or non-file artifact");
                continue;
            }
            ledger.done.insert(repo.key());
        }
        info!(dir = %dir.display(), entries = ledger.done.len(), "[LEDGER] Loaded");
        Ok(ledger)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.done.contains(key)
    }

    /// Record a completed repository.
    pub fn add(&mut self, key: &str) {
        self.in_flight.remove(key);
        self.done.insert(key.to_string());
    }

    /// Reserve a key for processing. Returns false if it is already done or
    /// another worker holds it.
    pub fn claim(&mut self, key: &str) -> bool {
        if self.done.contains(key) || self.in_flight.contains(key) {
            return false;
        }
        self.in_flight.insert(key.to_string());
        true
    }

    /// Give up a claim without completing it; the key may be retried later.
    pub fn release(&mut self, key: &str) {
        self.in_flight.remove(key);
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    /// Completed keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.done.iter().cloned().collect();
        keys.sort();
        keys
    }
}
