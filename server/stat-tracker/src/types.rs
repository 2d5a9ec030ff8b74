//! Core types for the stat tracker (events, stored records, reports, summaries).

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::TrackerError;

/// Time attached to a stored line that carries no `[HH:MM:SS]` token.
pub const DEFAULT_TIME: &str = "00:00:00";

/// Date format used for store prefixes and exports.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Combined format used when turning a record's date and time into a timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Classified events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
  Session,
  PlayerJoin,
  ErrorMatch,
}

impl Category {
  pub const ALL: [Category; 3] = [Self::Session, Self::PlayerJoin, Self::ErrorMatch];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Session => "session",
      Self::PlayerJoin => "player_join",
      Self::ErrorMatch => "error_match",
    }
  }
}

/// Category-specific payload extracted from a line. Codes stay raw; names are
/// resolved only when aggregating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDetail {
  Session {
    gametype_code: String,
    level_code: String,
  },
  PlayerJoin {
    username: String,
  },
  /// Index into [`crate::lookup::KNOWN_ERRORS`].
  ErrorMatch {
    signature: usize,
  },
}

/// One classified log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
  pub date: String,
  pub time: String,
  pub raw_line: String,
  pub detail: EventDetail,
}

impl Event {
  pub fn category(&self) -> Category {
    match self.detail {
      EventDetail::Session { .. } => Category::Session,
      EventDetail::PlayerJoin { .. } => Category::PlayerJoin,
      EventDetail::ErrorMatch { .. } => Category::ErrorMatch,
    }
  }

  /// Serialized store line, without the trailing newline.
  pub fn record_line(&self) -> String {
    format!("{} | {}", self.date, self.raw_line)
  }
}

// ---------------------------------------------------------------------------
// Source files
// ---------------------------------------------------------------------------

/// A candidate log file for one ingestion pass.
#[derive(Debug, Clone)]
pub struct LogFile {
  pub path: PathBuf,
  pub basename: String,
  pub date: NaiveDate,
}

impl LogFile {
  pub fn date_prefix(&self) -> String {
    self.date.format(DATE_FORMAT).to_string()
  }
}

// ---------------------------------------------------------------------------
// Stored records
// ---------------------------------------------------------------------------

/// One `"<date> | <raw line>"` record read back from an event store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
  pub date: String,
  pub raw_line: String,
}

impl StoredRecord {
  /// Split a store line on its first `|`. Lines without a separator are malformed.
  pub fn parse(line: &str) -> Option<Self> {
    let (date, raw) = line.split_once('|')?;
    Some(Self {
      date: date.trim().to_string(),
      raw_line: raw.trim().to_string(),
    })
  }

  /// The `[HH:MM:SS]` token of the raw line, or [`DEFAULT_TIME`].
  pub fn time(&self) -> &str {
    crate::classify::extract_time(&self.raw_line).unwrap_or(DEFAULT_TIME)
  }

  /// Date and time combined; `None` when either part is malformed.
  pub fn timestamp(&self) -> Option<NaiveDateTime> {
    let joined = format!("{} {}", self.date, self.time());
    NaiveDateTime::parse_from_str(&joined, TIMESTAMP_FORMAT).ok()
  }
}

// ---------------------------------------------------------------------------
// Time windows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeWindow {
  LastHour,
  Last24h,
  Last30d,
  AllTime,
}

impl TimeWindow {
  /// Width of the window; `None` means unbounded.
  pub fn duration(self) -> Option<Duration> {
    match self {
      Self::LastHour => Some(Duration::hours(1)),
      Self::Last24h => Some(Duration::hours(24)),
      Self::Last30d => Some(Duration::days(30)),
      Self::AllTime => None,
    }
  }

  pub fn cutoff(self, now: NaiveDateTime) -> Option<NaiveDateTime> {
    self.duration().map(|d| now - d)
  }
}

impl FromStr for TimeWindow {
  type Err = TrackerError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
      "last-hour" | "hour" | "1h" => Ok(Self::LastHour),
      "last-24h" | "day" | "24h" => Ok(Self::Last24h),
      "last-30d" | "month" | "30d" => Ok(Self::Last30d),
      "all-time" | "all" => Ok(Self::AllTime),
      other => Err(TrackerError::parse(format!(
        "unknown window {:?}; expected last-hour|last-24h|last-30d|all-time",
        other
      ))),
    }
  }
}

impl fmt::Display for TimeWindow {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::LastHour => "Last Hour",
      Self::Last24h => "Last 24h",
      Self::Last30d => "Last 30d",
      Self::AllTime => "All Time",
    };
    f.write_str(s)
  }
}

// ---------------------------------------------------------------------------
// Ingestion reporting
// ---------------------------------------------------------------------------

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
  /// Log files found across all directories.
  pub candidates: usize,
  /// Candidates absent from the ledger at the start of the run.
  pub new_files: usize,
  pub files_processed: usize,
  /// Files that could not be opened; still recorded in the ledger.
  pub files_skipped: usize,
  pub sessions: usize,
  pub player_joins: usize,
  pub errors: usize,
}

impl IngestReport {
  pub fn record(&mut self, category: Category) {
    match category {
      Category::Session => self.sessions += 1,
      Category::PlayerJoin => self.player_joins += 1,
      Category::ErrorMatch => self.errors += 1,
    }
  }

  pub fn events(&self) -> usize {
    self.sessions + self.player_joins + self.errors
  }
}

/// Messages sent from the ingestion worker to the interactive thread.
#[derive(Debug)]
pub enum IngestMessage {
  /// Fraction of new files processed so far, in `0.0..=1.0`.
  Progress(f64),
  Finished(crate::error::Result<IngestReport>),
}

// ---------------------------------------------------------------------------
// Aggregation output
// ---------------------------------------------------------------------------

/// A session event with its codes resolved through the lookup tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRow {
  pub date: String,
  pub time: String,
  /// "Public", "Private" or "Unknown".
  pub visibility: String,
  pub mode: String,
  pub level: String,
}

/// Count per known error signature, in signature list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCount {
  pub signature: &'static str,
  pub alias: &'static str,
  pub count: u64,
}

/// How legend values are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelMode {
  #[default]
  Count,
  Percent,
}

/// One line of a chart legend: `"<name> - <label>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
  pub name: String,
  pub count: u64,
  pub label: String,
}

impl fmt::Display for LegendEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} - {}", self.name, self.label)
  }
}

/// Everything the summary view needs for one window. Recomputed per request.
#[derive(Debug, Clone, Serialize)]
pub struct AggregationResult {
  pub window: TimeWindow,
  pub sessions: Vec<SessionRow>,
  /// Level name -> sessions.
  pub levels: BTreeMap<String, u64>,
  /// Visibility ("Public"/"Private"/"Unknown") -> sessions.
  pub visibility: BTreeMap<String, u64>,
  /// Game mode -> sessions.
  pub modes: BTreeMap<String, u64>,
  pub unique_players: usize,
  pub errors: Vec<ErrorCount>,
  /// Oldest valid timestamp across all stores, ignoring the window.
  pub oldest: Option<NaiveDateTime>,
  /// Start of the range the data actually covers under this window.
  pub since: Option<NaiveDateTime>,
}

impl AggregationResult {
  pub fn games_hosted(&self) -> usize {
    self.sessions.len()
  }

  pub fn total_errors(&self) -> u64 {
    self.errors.iter().map(|e| e.count).sum()
  }
}
