//! Append-only event stores, one flat file per category.
//!
//! Each line is `"<YYYY-MM-DD> | <trimmed log line>"`. Ingestion only appends;
//! aggregation and export only read whole files.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::types::{Category, Event, StoredRecord};

#[derive(Debug, Clone)]
pub struct EventStore {
  category: Category,
  path: PathBuf,
}

impl EventStore {
  pub fn new(category: Category, path: impl Into<PathBuf>) -> Self {
    Self {
      category,
      path: path.into(),
    }
  }

  pub fn category(&self) -> Category {
    self.category
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn exists(&self) -> bool {
    self.path.is_file()
  }

  /// Every well-formed record, in file order. A missing store is empty; lines
  /// without a `|` separator are skipped.
  pub fn read(&self) -> Result<Vec<StoredRecord>> {
    let bytes = match fs::read(&self.path) {
      Ok(b) => b,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(TrackerError::io(&self.path, e)),
    };
    Ok(
      String::from_utf8_lossy(&bytes)
        .lines()
        .filter_map(StoredRecord::parse)
        .collect(),
    )
  }

  fn open_append(&self) -> Result<BufWriter<File>> {
    if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(dir).map_err(|e| TrackerError::io(dir, e))?;
    }
    let file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)
      .map_err(|e| TrackerError::io(&self.path, e))?;
    Ok(BufWriter::new(file))
  }
}

/// The three stores of one installation.
#[derive(Debug, Clone)]
pub struct EventStores {
  pub sessions: EventStore,
  pub players: EventStore,
  pub errors: EventStore,
}

impl EventStores {
  pub fn from_config(config: &Config) -> Self {
    Self {
      sessions: EventStore::new(Category::Session, &config.sessions_path),
      players: EventStore::new(Category::PlayerJoin, &config.players_path),
      errors: EventStore::new(Category::ErrorMatch, &config.errors_path),
    }
  }

  pub fn get(&self, category: Category) -> &EventStore {
    match category {
      Category::Session => &self.sessions,
      Category::PlayerJoin => &self.players,
      Category::ErrorMatch => &self.errors,
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = &EventStore> {
    [&self.sessions, &self.players, &self.errors].into_iter()
  }

  /// Start a batch of appends. Store files are opened on first use, so a
  /// batch with no events touches nothing on disk.
  pub fn appender(&self) -> StoreAppender<'_> {
    StoreAppender {
      stores: self,
      writers: [None, None, None],
    }
  }
}

/// Buffered appends to the stores; call [`StoreAppender::finish`] to flush.
pub struct StoreAppender<'a> {
  stores: &'a EventStores,
  writers: [Option<BufWriter<File>>; 3],
}

impl StoreAppender<'_> {
  pub fn append(&mut self, event: &Event) -> Result<()> {
    let category = event.category();
    let slot = match category {
      Category::Session => 0,
      Category::PlayerJoin => 1,
      Category::ErrorMatch => 2,
    };
    let store = self.stores.get(category);
    let writer = match &mut self.writers[slot] {
      Some(w) => w,
      empty => empty.insert(store.open_append()?),
    };
    writeln!(writer, "{}", event.record_line()).map_err(|e| TrackerError::io(store.path(), e))
  }

  pub fn finish(self) -> Result<()> {
    for (store, writer) in self.stores.iter().zip(self.writers) {
      if let Some(mut w) = writer {
        w.flush().map_err(|e| TrackerError::io(store.path(), e))?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::EventDetail;

  fn event(raw: &str, detail: EventDetail) -> Event {
    Event {
      date: "2025-01-15".into(),
      time: "00:00:00".into(),
      raw_line: raw.into(),
      detail,
    }
  }

  #[test]
  fn appends_go_to_the_matching_store() {
    let dir = tempfile::tempdir().unwrap();
    let stores = EventStores::from_config(&Config::from_base_dir(dir.path()));

    let mut appender = stores.appender();
    let join = event(
      "[NETGAME] User 'a' participating",
      EventDetail::PlayerJoin {
        username: "a".into(),
      },
    );
    let err = event(
      "Unable to find MiniDumpWriteDump",
      EventDetail::ErrorMatch { signature: 0 },
    );
    appender.append(&join).unwrap();
    appender.append(&err).unwrap();
    appender.finish().unwrap();

    assert!(!stores.sessions.exists());
    let players = stores.players.read().unwrap();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].date, "2025-01-15");
    assert_eq!(players[0].raw_line, "[NETGAME] User 'a' participating");
    assert_eq!(stores.errors.read().unwrap().len(), 1);
  }

  #[test]
  fn appends_accumulate_across_batches() {
    let dir = tempfile::tempdir().unwrap();
    let stores = EventStores::from_config(&Config::from_base_dir(dir.path()));
    let e = event("Unable to find MiniDumpWriteDump", EventDetail::ErrorMatch { signature: 0 });

    for _ in 0..2 {
      let mut appender = stores.appender();
      appender.append(&e).unwrap();
      appender.finish().unwrap();
    }
    assert_eq!(stores.errors.read().unwrap().len(), 2);
  }

  #[test]
  fn malformed_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("errors.txt");
    fs::write(&path, "no separator here\n2025-01-15 | ok line\n\n").unwrap();
    let store = EventStore::new(Category::ErrorMatch, &path);
    let records = store.read().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].raw_line, "ok line");
  }

  #[test]
  fn missing_store_reads_empty() {
    let store = EventStore::new(Category::Session, "/nonexistent/levels.txt");
    assert!(store.read().unwrap().is_empty());
  }
}
