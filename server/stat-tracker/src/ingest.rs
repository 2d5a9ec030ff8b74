//! Ingestion controller: discover new log files, classify them, append events,
//! and record each file in the ledger.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::classify;
use crate::config::Config;
use crate::error::Result;
use crate::ledger::ImportLedger;
use crate::store::EventStores;
use crate::types::{Category, IngestReport, LogFile};

static FILE_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d{2}-\d{2}-\d{4})\]").unwrap());

/// List `*.<extension>` files in each directory, directories in the given
/// order and paths sorted within each. Missing directories contribute nothing.
pub fn discover(dirs: &[PathBuf], extension: &str) -> Vec<PathBuf> {
  let mut found = Vec::new();
  for dir in dirs {
    let Some(dir_str) = dir.to_str() else {
      warn!(dir = %dir.display(), "skipping non UTF-8 log directory");
      continue;
    };
    let pattern = format!("{}/*.{}", glob::Pattern::escape(dir_str), extension);
    let entries = match glob::glob(&pattern) {
      Ok(paths) => paths,
      Err(e) => {
        warn!(%pattern, error = %e, "bad log file pattern");
        continue;
      }
    };
    let mut paths: Vec<PathBuf> = entries
      .filter_map(|entry| match entry {
        // Dangling links and other unopenable entries stay in, so the run
        // marks them processed instead of rediscovering them every time.
        Ok(p) if !p.is_dir() => Some(p),
        Ok(_) => None,
        Err(e) => {
          warn!(error = %e, "unreadable directory entry");
          None
        }
      })
      .collect();
    paths.sort();
    found.extend(paths);
  }
  found
}

/// Calendar date of a log file: the `[MM-DD-YYYY]` token in its name, else its
/// modification time. A token that does not parse, or an unreadable mtime,
/// falls back to today.
pub fn file_date(path: &Path, basename: &str) -> NaiveDate {
  let today = || Local::now().date_naive();
  if let Some(token) = FILE_DATE_RE.captures(basename).and_then(|c| c.get(1)) {
    return NaiveDate::parse_from_str(token.as_str(), "%m-%d-%Y").unwrap_or_else(|_| today());
  }
  match fs::metadata(path).and_then(|m| m.modified()) {
    Ok(mtime) => DateTime::<Local>::from(mtime).date_naive(),
    Err(_) => today(),
  }
}

fn basename(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default()
}

/// Decode bytes as UTF-8, dropping malformed sequences. Valid text, including
/// any literal U+FFFD, is kept as is.
fn decode_lossy(bytes: &[u8]) -> Cow<'_, str> {
  if let Ok(s) = std::str::from_utf8(bytes) {
    return Cow::Borrowed(s);
  }
  let mut out = String::with_capacity(bytes.len());
  for chunk in bytes.utf8_chunks() {
    out.push_str(chunk.valid());
  }
  Cow::Owned(out)
}

/// Drives one ingestion run over a configured installation.
pub struct Ingestor {
  config: Config,
  stores: EventStores,
}

impl Ingestor {
  pub fn new(config: Config) -> Self {
    let stores = EventStores::from_config(&config);
    Self { config, stores }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn stores(&self) -> &EventStores {
    &self.stores
  }

  /// Ingest every log file not yet in the ledger.
  ///
  /// `on_progress` receives the fraction of new files done after each file
  /// (and `1.0` straight away when there is nothing new). The ledger is only
  /// rewritten after the whole new-file set has been processed.
  pub fn run(&self, mut on_progress: impl FnMut(f64)) -> Result<IngestReport> {
    let candidates = discover(&self.config.log_dirs, &self.config.log_extension);
    let mut ledger = ImportLedger::load(&self.config.ledger_path)?;

    let new_files: Vec<LogFile> = candidates
      .iter()
      .filter_map(|path| {
        let name = basename(path);
        if name.is_empty() || ledger.contains(&name) {
          return None;
        }
        Some(LogFile {
          date: file_date(path, &name),
          path: path.clone(),
          basename: name,
        })
      })
      .collect();

    let mut report = IngestReport {
      candidates: candidates.len(),
      new_files: new_files.len(),
      ..IngestReport::default()
    };

    if new_files.is_empty() {
      info!(candidates = report.candidates, "no new log files");
      on_progress(1.0);
      return Ok(report);
    }

    info!(
      candidates = report.candidates,
      new_files = report.new_files,
      "ingesting log files"
    );

    let total = new_files.len();
    for (done, file) in new_files.iter().enumerate() {
      // Seen-set for player joins, scoped to this one file.
      let mut seen_joins = HashSet::new();
      if self.ingest_file(file, &mut seen_joins, &mut report)? {
        report.files_processed += 1;
      } else {
        report.files_skipped += 1;
      }
      ledger.mark(&file.basename);
      on_progress((done + 1) as f64 / total as f64);
    }

    ledger.save()?;
    info!(
      processed = report.files_processed,
      skipped = report.files_skipped,
      sessions = report.sessions,
      player_joins = report.player_joins,
      errors = report.errors,
      "ingestion complete"
    );
    Ok(report)
  }

  /// Classify one file into the stores. Returns `Ok(false)` when the file
  /// could not be read; the caller still records it as processed.
  fn ingest_file(
    &self,
    file: &LogFile,
    seen_joins: &mut HashSet<String>,
    report: &mut IngestReport,
  ) -> Result<bool> {
    let bytes = match fs::read(&file.path) {
      Ok(b) => b,
      Err(e) => {
        warn!(file = %file.path.display(), error = %e, "unreadable log file, marking processed");
        return Ok(false);
      }
    };
    let text = decode_lossy(&bytes);
    let date = file.date_prefix();

    let mut appender = self.stores.appender();
    let mut appended = 0usize;
    // Bare `\r` also ends a line; the empty piece of a `\r\n` pair is skipped below.
    for line in text.split(['\r', '\n']) {
      let line = line.trim();
      if line.is_empty() {
        continue;
      }
      for event in classify::classify(line, &date) {
        let category = event.category();
        if category == Category::PlayerJoin && !seen_joins.insert(event.raw_line.clone()) {
          continue;
        }
        appender.append(&event)?;
        report.record(category);
        appended += 1;
      }
    }
    appender.finish()?;

    debug!(file = %file.basename, %date, events = appended, "log file ingested");
    Ok(true)
  }
}
