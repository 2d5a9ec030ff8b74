//! Import ledger: basenames of log files that have already been ingested.
//!
//! Persisted as a JSON array of strings in insertion order. Loaded once per
//! run, mutated in memory, and rewritten atomically when the run finishes.

use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, TrackerError};

#[derive(Debug, Clone)]
pub struct ImportLedger {
  path: PathBuf,
  entries: Vec<String>,
  seen: HashSet<String>,
}

impl ImportLedger {
  /// Load the ledger at `path`; a missing file is an empty ledger.
  pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();
    let entries: Vec<String> = match fs::read_to_string(&path) {
      Ok(text) if text.trim().is_empty() => Vec::new(),
      Ok(text) => serde_json::from_str(&text)
        .map_err(|e| TrackerError::ledger(format!("{}: {}", path.display(), e)))?,
      Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
      Err(e) => return Err(TrackerError::io(&path, e)),
    };
    let seen = entries.iter().cloned().collect();
    debug!(path = %path.display(), entries = entries.len(), "ledger loaded");
    Ok(Self {
      path,
      entries,
      seen,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn contains(&self, basename: &str) -> bool {
    self.seen.contains(basename)
  }

  /// Record a basename. Returns false when it was already present.
  pub fn mark(&mut self, basename: &str) -> bool {
    if !self.seen.insert(basename.to_string()) {
      return false;
    }
    self.entries.push(basename.to_string());
    true
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn entries(&self) -> &[String] {
    &self.entries
  }

  /// Rewrite the ledger file via a temp file in the same directory, then rename.
  pub fn save(&self) -> Result<()> {
    let dir = match self.path.parent() {
      Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
      _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| TrackerError::io(&dir, e))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| TrackerError::io(&dir, e))?;
    serde_json::to_writer(&mut tmp, &self.entries)?;
    tmp.flush().map_err(|e| TrackerError::io(tmp.path(), e))?;
    tmp
      .persist(&self.path)
      .map_err(|e| TrackerError::io(&self.path, e.error))?;
    debug!(path = %self.path.display(), entries = self.entries.len(), "ledger saved");
    Ok(())
  }
}

/// True once any log file has been ingested. Read failures count as "no data".
pub fn has_data(path: &Path) -> bool {
  ImportLedger::load(path)
    .map(|ledger| !ledger.is_empty())
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = ImportLedger::load(dir.path().join("processed_logs.json")).unwrap();
    assert!(ledger.is_empty());
    assert!(!has_data(ledger.path()));
  }

  #[test]
  fn save_and_reload_preserves_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats").join("processed_logs.json");

    let mut ledger = ImportLedger::load(&path).unwrap();
    assert!(ledger.mark("b.log"));
    assert!(ledger.mark("a.log"));
    assert!(!ledger.mark("b.log"));
    ledger.save().unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    assert_eq!(raw, r#"["b.log","a.log"]"#);

    let reloaded = ImportLedger::load(&path).unwrap();
    assert_eq!(reloaded.entries(), &["b.log".to_string(), "a.log".to_string()]);
    assert!(reloaded.contains("a.log"));
    assert!(has_data(&path));
  }

  #[test]
  fn corrupt_ledger_is_surfaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed_logs.json");
    fs::write(&path, "{not json").unwrap();
    let err = ImportLedger::load(&path).unwrap_err();
    assert!(err.to_string().starts_with("ledger:"), "{}", err);
  }
}
