//! Time-window aggregation over the event stores: level and gametype
//! histograms, unique players, error counts, and the covered date range.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;

use crate::classify;
use crate::config::Config;
use crate::error::Result;
use crate::lookup::{self, KNOWN_ERRORS};
use crate::store::EventStores;
use crate::types::{
  AggregationResult, ErrorCount, LabelMode, LegendEntry, SessionRow, StoredRecord, TimeWindow,
};

/// Whether a record falls inside a window starting at `cutoff`.
///
/// No cutoff includes everything; otherwise records whose date/time do not
/// parse are out of range.
pub fn in_window(record: &StoredRecord, cutoff: Option<NaiveDateTime>) -> bool {
  match cutoff {
    None => true,
    Some(cutoff) => record.timestamp().is_some_and(|ts| ts >= cutoff),
  }
}

/// Start of the range shown for `window`: never earlier than the window's
/// cutoff, never earlier than the oldest data actually stored.
pub fn since(
  window: TimeWindow,
  now: NaiveDateTime,
  oldest: Option<NaiveDateTime>,
) -> Option<NaiveDateTime> {
  let oldest = oldest?;
  Some(match window.cutoff(now) {
    Some(cutoff) => cutoff.max(oldest),
    None => oldest,
  })
}

/// Label for `value` out of `total`: the count itself, or a one-decimal
/// percentage. Empty when `total` is zero.
pub fn value_label(value: u64, total: u64, mode: LabelMode) -> String {
  if total == 0 {
    return String::new();
  }
  match mode {
    LabelMode::Count => value.to_string(),
    LabelMode::Percent => format!("{:.1}%", value as f64 / total as f64 * 100.0),
  }
}

/// Largest count first; ties keep the order `items` arrive in.
fn legend_from<'a>(
  items: impl IntoIterator<Item = (&'a str, u64)>,
  mode: LabelMode,
) -> Vec<LegendEntry> {
  let mut items: Vec<(&str, u64)> = items.into_iter().filter(|(_, n)| *n > 0).collect();
  items.sort_by(|a, b| b.1.cmp(&a.1));
  let total: u64 = items.iter().map(|(_, n)| n).sum();
  items
    .into_iter()
    .map(|(name, count)| LegendEntry {
      name: name.to_string(),
      count,
      label: value_label(count, total, mode),
    })
    .collect()
}

/// Legend for a histogram: largest first, ties by name, zero counts dropped.
pub fn legend(histogram: &BTreeMap<String, u64>, mode: LabelMode) -> Vec<LegendEntry> {
  legend_from(histogram.iter().map(|(k, v)| (k.as_str(), *v)), mode)
}

/// Legend for the error histogram, using the short signature aliases. Ties
/// follow the known-error list order.
pub fn error_legend(errors: &[ErrorCount], mode: LabelMode) -> Vec<LegendEntry> {
  legend_from(errors.iter().map(|e| (e.alias, e.count)), mode)
}

/// Public vs. private split of hosted sessions, in that order. Sessions with
/// an unknown gametype are left out of the split.
pub fn visibility_split(result: &AggregationResult, mode: LabelMode) -> Vec<LegendEntry> {
  let count = |k: &str| result.visibility.get(k).copied().unwrap_or(0);
  let (public, private) = (count("Public"), count("Private"));
  let total = public + private;
  [("Public", public), ("Private", private)]
    .into_iter()
    .filter(|(_, n)| *n > 0)
    .map(|(name, n)| LegendEntry {
      name: name.to_string(),
      count: n,
      label: value_label(n, total, mode),
    })
    .collect()
}

/// Read-only view over the event stores.
pub struct Aggregator {
  stores: EventStores,
}

impl Aggregator {
  pub fn new(stores: EventStores) -> Self {
    Self { stores }
  }

  pub fn from_config(config: &Config) -> Self {
    Self::new(EventStores::from_config(config))
  }

  /// Sessions in the window, codes resolved through the lookup tables.
  pub fn sessions(&self, cutoff: Option<NaiveDateTime>) -> Result<Vec<SessionRow>> {
    let rows = self
      .stores
      .sessions
      .read()?
      .into_iter()
      .filter(|r| in_window(r, cutoff))
      .filter_map(|r| {
        let (gametype, level) = classify::session_codes(&r.raw_line)?;
        let (visibility, mode) = lookup::gametype(gametype);
        Some(SessionRow {
          time: r.time().to_string(),
          visibility: visibility.to_string(),
          mode: mode.to_string(),
          level: lookup::level_name(level).to_string(),
          date: r.date,
        })
      })
      .collect();
    Ok(rows)
  }

  /// Distinct usernames among player joins in the window.
  pub fn unique_players(&self, cutoff: Option<NaiveDateTime>) -> Result<usize> {
    let records = self.stores.players.read()?;
    let names: HashSet<&str> = records
      .iter()
      .filter(|r| in_window(r, cutoff))
      .filter_map(|r| classify::player_name(&r.raw_line))
      .collect();
    Ok(names.len())
  }

  /// Count per known signature, every signature present.
  pub fn error_counts(&self, cutoff: Option<NaiveDateTime>) -> Result<Vec<ErrorCount>> {
    let mut counts = vec![0u64; KNOWN_ERRORS.len()];
    for record in self.stores.errors.read()? {
      if !in_window(&record, cutoff) {
        continue;
      }
      if let Some(idx) = lookup::match_signature(&record.raw_line) {
        counts[idx] += 1;
      }
    }
    Ok(
      KNOWN_ERRORS
        .iter()
        .zip(counts)
        .map(|(sig, count)| ErrorCount {
          signature: sig.pattern,
          alias: sig.alias,
          count,
        })
        .collect(),
    )
  }

  /// Oldest valid timestamp across all three stores, ignoring any window.
  pub fn oldest_timestamp(&self) -> Result<Option<NaiveDateTime>> {
    let mut oldest: Option<NaiveDateTime> = None;
    for store in self.stores.iter() {
      let store_min = store.read()?.iter().filter_map(StoredRecord::timestamp).min();
      oldest = match (oldest, store_min) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
      };
    }
    Ok(oldest)
  }

  pub fn aggregate(&self, window: TimeWindow, now: NaiveDateTime) -> Result<AggregationResult> {
    let cutoff = window.cutoff(now);
    let sessions = self.sessions(cutoff)?;

    let mut levels = BTreeMap::new();
    let mut visibility = BTreeMap::new();
    let mut modes = BTreeMap::new();
    for row in &sessions {
      *levels.entry(row.level.clone()).or_insert(0) += 1;
      *visibility.entry(row.visibility.clone()).or_insert(0) += 1;
      *modes.entry(row.mode.clone()).or_insert(0) += 1;
    }

    let oldest = self.oldest_timestamp()?;
    Ok(AggregationResult {
      window,
      unique_players: self.unique_players(cutoff)?,
      errors: self.error_counts(cutoff)?,
      since: since(window, now, oldest),
      oldest,
      sessions,
      levels,
      visibility,
      modes,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveDate;

  fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
  }

  fn record(date: &str, raw: &str) -> StoredRecord {
    StoredRecord {
      date: date.into(),
      raw_line: raw.into(),
    }
  }

  #[test]
  fn labels_in_both_modes() {
    assert_eq!(value_label(3, 4, LabelMode::Percent), "75.0%");
    assert_eq!(value_label(1, 4, LabelMode::Percent), "25.0%");
    assert_eq!(value_label(3, 4, LabelMode::Count), "3");
    assert_eq!(value_label(0, 0, LabelMode::Percent), "");
    assert_eq!(value_label(0, 0, LabelMode::Count), "");
  }

  #[test]
  fn legend_sorted_by_count() {
    let mut hist = BTreeMap::new();
    hist.insert("B".to_string(), 1);
    hist.insert("A".to_string(), 3);
    hist.insert("C".to_string(), 0);
    let entries = legend(&hist, LabelMode::Percent);
    let rendered: Vec<String> = entries.iter().map(|e| e.to_string()).collect();
    assert_eq!(rendered, vec!["A - 75.0%", "B - 25.0%"]);
  }

  #[test]
  fn legend_ties_by_name() {
    let mut hist = BTreeMap::new();
    hist.insert("Lobby".to_string(), 2);
    hist.insert("Arena".to_string(), 2);
    let names: Vec<String> = legend(&hist, LabelMode::Count).into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["Arena", "Lobby"]);
  }

  #[test]
  fn error_legend_ties_follow_signature_order() {
    // Aliases chosen so that alphabetical order would reverse them.
    let errors = vec![
      ErrorCount {
        signature: KNOWN_ERRORS[0].pattern,
        alias: "Zeta",
        count: 1,
      },
      ErrorCount {
        signature: KNOWN_ERRORS[1].pattern,
        alias: "Alpha",
        count: 1,
      },
      ErrorCount {
        signature: KNOWN_ERRORS[2].pattern,
        alias: "Mid",
        count: 3,
      },
    ];
    let names: Vec<String> = error_legend(&errors, LabelMode::Count)
      .into_iter()
      .map(|e| e.name)
      .collect();
    assert_eq!(names, vec!["Mid", "Zeta", "Alpha"]);
  }

  #[test]
  fn empty_histogram_gives_empty_legend() {
    assert!(legend(&BTreeMap::new(), LabelMode::Percent).is_empty());
  }

  #[test]
  fn window_bounds() {
    let now = at(2025, 3, 10, 12);
    let cutoff = TimeWindow::Last24h.cutoff(now);
    assert!(in_window(&record("2025-03-10", "[10:00:00] x"), cutoff));
    assert!(!in_window(&record("2025-03-09", "[11:00:00] x"), cutoff));
    assert!(!in_window(&record("not-a-date", "[10:00:00] x"), cutoff));
    assert!(in_window(&record("not-a-date", "x"), None));
  }

  #[test]
  fn since_never_precedes_cutoff() {
    let now = at(2025, 3, 10, 12);
    let old = at(2025, 1, 1, 0);
    assert_eq!(since(TimeWindow::Last24h, now, Some(old)), Some(at(2025, 3, 9, 12)));
    assert_eq!(since(TimeWindow::AllTime, now, Some(old)), Some(old));
    let recent = at(2025, 3, 10, 11);
    assert_eq!(since(TimeWindow::Last24h, now, Some(recent)), Some(recent));
    assert_eq!(since(TimeWindow::Last30d, now, None), None);
  }
}
