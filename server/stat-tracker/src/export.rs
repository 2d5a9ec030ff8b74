//! CSV export of the event stores. Each table is rewritten in full.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::aggregate::Aggregator;
use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::store::{EventStore, EventStores};

/// Files written by one export, with their data row counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
  pub levels: Option<(PathBuf, usize)>,
  pub players: Option<(PathBuf, usize)>,
  pub errors: Option<(PathBuf, usize)>,
}

fn escape_field(field: &str) -> std::borrow::Cow<'_, str> {
  if field.contains([',', '"', '\n', '\r']) {
    format!("\"{}\"", field.replace('"', "\"\"")).into()
  } else {
    field.into()
  }
}

struct CsvWriter {
  path: PathBuf,
  out: BufWriter<File>,
  rows: usize,
}

impl CsvWriter {
  fn create(path: &Path, header: &[&str]) -> Result<Self> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(dir).map_err(|e| TrackerError::io(dir, e))?;
    }
    let file = File::create(path).map_err(|e| TrackerError::io(path, e))?;
    let mut writer = Self {
      path: path.to_path_buf(),
      out: BufWriter::new(file),
      rows: 0,
    };
    writer.write_fields(header)?;
    Ok(writer)
  }

  fn write_fields(&mut self, fields: &[&str]) -> Result<()> {
    let line: Vec<_> = fields.iter().map(|f| escape_field(f)).collect();
    write!(self.out, "{}\r\n", line.join(",")).map_err(|e| TrackerError::io(&self.path, e))
  }

  fn row(&mut self, fields: &[&str]) -> Result<()> {
    self.write_fields(fields)?;
    self.rows += 1;
    Ok(())
  }

  fn finish(mut self) -> Result<(PathBuf, usize)> {
    self.out.flush().map_err(|e| TrackerError::io(&self.path, e))?;
    Ok((self.path, self.rows))
  }
}

/// `Date,Time,Gametype,Gamemode,Level` over every stored session, codes resolved.
pub fn export_levels(stores: &EventStores, path: &Path) -> Result<(PathBuf, usize)> {
  let rows = Aggregator::new(stores.clone()).sessions(None)?;
  let mut csv = CsvWriter::create(path, &["Date", "Time", "Gametype", "Gamemode", "Level"])?;
  for r in &rows {
    csv.row(&[
      r.date.as_str(),
      r.time.as_str(),
      r.visibility.as_str(),
      r.mode.as_str(),
      r.level.as_str(),
    ])?;
  }
  csv.finish()
}

/// `Date,Time,<column>` rows straight from a store, optionally collapsing
/// identical log lines. `None` when the store does not exist yet.
fn export_raw(
  store: &EventStore,
  path: &Path,
  column: &str,
  dedup: bool,
) -> Result<Option<(PathBuf, usize)>> {
  if !store.exists() {
    return Ok(None);
  }
  let records = store.read()?;
  let mut seen: HashSet<&str> = HashSet::new();
  let mut csv = CsvWriter::create(path, &["Date", "Time", column])?;
  for r in &records {
    if dedup && !seen.insert(r.raw_line.as_str()) {
      continue;
    }
    csv.row(&[r.date.as_str(), r.time(), r.raw_line.as_str()])?;
  }
  csv.finish().map(Some)
}

/// Player joins; identical lines (even from different log files) export once.
pub fn export_players(stores: &EventStores, path: &Path) -> Result<Option<(PathBuf, usize)>> {
  export_raw(&stores.players, path, "Player Log", true)
}

/// Error lines, every occurrence.
pub fn export_errors(stores: &EventStores, path: &Path) -> Result<Option<(PathBuf, usize)>> {
  export_raw(&stores.errors, path, "Error", false)
}

/// Write all three tables next to the stores.
pub fn export_all(config: &Config) -> Result<ExportReport> {
  let stores = EventStores::from_config(config);
  let report = ExportReport {
    levels: Some(export_levels(&stores, &config.levels_csv())?),
    players: export_players(&stores, &config.players_csv())?,
    errors: export_errors(&stores, &config.errors_csv())?,
  };
  info!(dir = %config.stats_dir.display(), "stats exported");
  Ok(report)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fields_quoted_only_when_needed() {
    assert_eq!(escape_field("plain"), "plain");
    assert_eq!(escape_field("a,b"), "\"a,b\"");
    assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
  }

  #[test]
  fn players_dedup_but_errors_do_not() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::from_base_dir(dir.path());
    fs::create_dir_all(&config.stats_dir).unwrap();
    let join = "[09:15:00] [NETGAME] User 'kit' participating";
    fs::write(
      &config.players_path,
      format!("2025-01-01 | {join}\n2025-01-02 | {join}\n"),
    )
    .unwrap();
    let err = "[09:16:00] Unable to find MiniDumpWriteDump";
    fs::write(&config.errors_path, format!("2025-01-01 | {err}\n2025-01-01 | {err}\n")).unwrap();

    let report = export_all(&config).unwrap();
    assert_eq!(report.players.as_ref().unwrap().1, 1);
    assert_eq!(report.errors.as_ref().unwrap().1, 2);
    assert_eq!(report.levels.as_ref().unwrap().1, 0);

    let players = fs::read_to_string(config.players_csv()).unwrap();
    assert_eq!(
      players,
      format!("Date,Time,Player Log\r\n2025-01-01,09:15:00,{join}\r\n")
    );
  }

  #[test]
  fn missing_stores_skip_raw_tables() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::from_base_dir(dir.path());
    let report = export_all(&config).unwrap();
    assert!(report.players.is_none());
    assert!(report.errors.is_none());
    let levels = fs::read_to_string(config.levels_csv()).unwrap();
    assert_eq!(levels, "Date,Time,Gametype,Gamemode,Level\r\n");
  }
}
