//! Line classification: map one trimmed log line to zero or more events.
//!
//! Rules are checked independently, so one line can yield e.g. both a session
//! and an error event:
//! 1. session start: `[NETLOBBY] Starting session` with both `gametype 0x..` and `level 0x..`;
//! 2. player join: `[NETGAME] User '<name>' participating`;
//! 3. known error: first signature in list order contained in the line.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lookup;
use crate::types::{Event, EventDetail, DEFAULT_TIME};

pub const SESSION_MARKER: &str = "[NETLOBBY] Starting session";

static TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d{2}:\d{2}:\d{2})\]").unwrap());
static GAMETYPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"gametype (0x[0-9A-F]+)").unwrap());
static LEVEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"level (0x[0-9A-F]+)").unwrap());
static PLAYER_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\[NETGAME\] User '(.*?)' participating").unwrap());

/// The `HH:MM:SS` inside the first `[HH:MM:SS]` token, if any.
pub fn extract_time(line: &str) -> Option<&str> {
  TIME_RE
    .captures(line)
    .and_then(|c| c.get(1))
    .map(|m| m.as_str())
}

/// `(gametype_code, level_code)` of a session-start line. Both tokens are
/// required; a line with only one of them is not a session.
pub fn session_codes(line: &str) -> Option<(&str, &str)> {
  if !line.contains(SESSION_MARKER) {
    return None;
  }
  let gametype = GAMETYPE_RE.captures(line)?.get(1)?.as_str();
  let level = LEVEL_RE.captures(line)?.get(1)?.as_str();
  Some((gametype, level))
}

/// Username of a player-join line.
pub fn player_name(line: &str) -> Option<&str> {
  PLAYER_RE
    .captures(line)
    .and_then(|c| c.get(1))
    .map(|m| m.as_str())
}

/// Classify one trimmed, non-empty line read from a file dated `date`.
///
/// Stateless: duplicate suppression is the caller's business.
pub fn classify(line: &str, date: &str) -> Vec<Event> {
  let mut details = Vec::new();

  if let Some((gametype, level)) = session_codes(line) {
    details.push(EventDetail::Session {
      gametype_code: gametype.to_string(),
      level_code: level.to_string(),
    });
  }

  if let Some(name) = player_name(line) {
    details.push(EventDetail::PlayerJoin {
      username: name.to_string(),
    });
  }

  if let Some(signature) = lookup::match_signature(line) {
    details.push(EventDetail::ErrorMatch { signature });
  }

  if details.is_empty() {
    return Vec::new();
  }

  // Lines come from a line reader, but a stray CR/LF must never reach a store.
  let raw_line: String = line.chars().filter(|c| *c != '\n' && *c != '\r').collect();
  let time = extract_time(line).unwrap_or(DEFAULT_TIME).to_string();

  details
    .into_iter()
    .map(|detail| Event {
      date: date.to_string(),
      time: time.clone(),
      raw_line: raw_line.clone(),
      detail,
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Category;

  const SESSION: &str = "[10:30:00] [NETLOBBY] Starting session with gametype 0xCB60A4DE7E1CAF73 \
                         on level 0x576ED3F8428EBC4B";

  #[test]
  fn session_line_keeps_raw_codes() {
    let events = classify(SESSION, "2025-01-15");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].time, "10:30:00");
    assert_eq!(
      events[0].detail,
      EventDetail::Session {
        gametype_code: "0xCB60A4DE7E1CAF73".into(),
        level_code: "0x576ED3F8428EBC4B".into(),
      }
    );
    assert_eq!(events[0].record_line(), format!("2025-01-15 | {}", SESSION));
  }

  #[test]
  fn session_needs_both_codes() {
    let only_level = "[NETLOBBY] Starting session on level 0x576ED3F8428EBC4B";
    let only_gametype = "[NETLOBBY] Starting session gametype 0xCB60A4DE7E1CAF73";
    assert!(classify(only_level, "2025-01-15").is_empty());
    assert!(classify(only_gametype, "2025-01-15").is_empty());
  }

  #[test]
  fn codes_without_marker_are_not_a_session() {
    let line = "gametype 0xCB60A4DE7E1CAF73 level 0x576ED3F8428EBC4B";
    assert!(classify(line, "2025-01-15").is_empty());
  }

  #[test]
  fn player_join_extracts_username() {
    let line = "[12:00:01] [NETGAME] User 'sprocket' participating in match";
    let events = classify(line, "2025-01-15");
    assert_eq!(events.len(), 1);
    assert_eq!(
      events[0].detail,
      EventDetail::PlayerJoin {
        username: "sprocket".into()
      }
    );
  }

  #[test]
  fn error_line_records_first_listed_signature_once() {
    let line = "[00:00:09] [NETGAME] Service status request failed: 0 Unknown \
                Unable to find MiniDumpWriteDump";
    let events = classify(line, "2025-01-15");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].detail, EventDetail::ErrorMatch { signature: 0 });
  }

  #[test]
  fn one_line_can_match_several_rules() {
    let line = format!("{} Unable to find MiniDumpWriteDump", SESSION);
    let categories: Vec<Category> = classify(&line, "2025-01-15")
      .iter()
      .map(|e| e.category())
      .collect();
    assert_eq!(categories, vec![Category::Session, Category::ErrorMatch]);
  }

  #[test]
  fn missing_time_defaults_to_midnight() {
    let events = classify("Unable to find MiniDumpWriteDump", "2025-01-15");
    assert_eq!(events[0].time, DEFAULT_TIME);
  }

  #[test]
  fn unmatched_line_yields_nothing() {
    assert!(classify("[10:00:00] [NETGAME] heartbeat", "2025-01-15").is_empty());
  }
}
