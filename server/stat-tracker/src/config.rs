//! Tracker configuration: where logs are read from and where stats are kept.

use std::path::{Path, PathBuf};

/// Environment variable consulted when no base directory is given explicitly.
pub const HOME_ENV: &str = "STAT_TRACKER_HOME";

/// Filesystem layout of one tracker installation.
#[derive(Debug, Clone)]
pub struct Config {
  /// Directories scanned for log files, in discovery order.
  pub log_dirs: Vec<PathBuf>,
  /// Extension (without the dot) a file must carry to be ingested.
  pub log_extension: String,
  /// Directory holding the ledger, event stores and CSV exports.
  pub stats_dir: PathBuf,
  pub ledger_path: PathBuf,
  pub sessions_path: PathBuf,
  pub players_path: PathBuf,
  pub errors_path: PathBuf,
}

impl Config {
  /// Layout rooted at the game server install directory:
  /// logs under `_local/r14logs` (plus its `old` archive), stats under `dashboard/stats`.
  pub fn from_base_dir(base: impl AsRef<Path>) -> Self {
    let base = base.as_ref();
    let log_dir = base.join("_local").join("r14logs");
    let stats_dir = base.join("dashboard").join("stats");
    Self {
      log_dirs: vec![log_dir.clone(), log_dir.join("old")],
      log_extension: "log".into(),
      ledger_path: stats_dir.join("processed_logs.json"),
      sessions_path: stats_dir.join("levels.txt"),
      players_path: stats_dir.join("players.txt"),
      errors_path: stats_dir.join("errors.txt"),
      stats_dir,
    }
  }

  /// Resolve the base directory: explicit value, then `STAT_TRACKER_HOME`, then the cwd.
  pub fn resolve(base: Option<PathBuf>) -> Self {
    let base = base
      .or_else(|| std::env::var_os(HOME_ENV).map(PathBuf::from))
      .unwrap_or_else(|| PathBuf::from("."));
    Self::from_base_dir(base)
  }

  pub fn levels_csv(&self) -> PathBuf {
    self.stats_dir.join("levels.csv")
  }

  pub fn players_csv(&self) -> PathBuf {
    self.stats_dir.join("players.csv")
  }

  pub fn errors_csv(&self) -> PathBuf {
    self.stats_dir.join("errors.csv")
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::from_base_dir(".")
  }
}
