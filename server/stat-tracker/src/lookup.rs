//! Static tables: level and gametype codes, and the ordered known-error signatures.

/// Name used for any code missing from the tables.
pub const UNKNOWN: &str = "Unknown";

const LEVELS: &[(&str, &str)] = &[
  ("0xD09AFD15B1C75C04", "Lobby"),
  ("0x576ED3F8428EBC4B", "Arena"),
  ("0xDF5CA7B7DFA383D4", "Fission"),
  ("0x43E2DA7A0C623A19", "Surge"),
  ("0x43E2DA7914642604", "Dyson"),
  ("0x42670F2BED45703C", "Combustion"),
];

/// Gametype code -> (visibility, mode).
const GAMETYPES: &[(&str, (&str, &str))] = &[
  ("0x042D9CF9CFDDCF76", ("Public", "Lobby")),
  ("0x305D6E37C1589C45", ("Private", "Lobby")),
  ("0xCB60A4DE7E1CAF73", ("Public", "Arena")),
  ("0x09990965F4DB8C03", ("Private", "Arena")),
  ("0x3D5C3976578A321A", ("Public", "Combat")),
  ("0x33BBF6842DF97A3F", ("Private", "Combat")),
];

/// A known error line fragment and the short name shown in legends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
  pub pattern: &'static str,
  pub alias: &'static str,
}

/// Known error signatures. Order is significant: a line is attributed to the
/// earliest entry whose pattern it contains.
pub const KNOWN_ERRORS: &[Signature] = &[
  Signature {
    pattern: "Unable to find MiniDumpWriteDump",
    alias: "Unable to find MiniDumpWriteDump",
  },
  Signature {
    pattern: "[NETGAME] Service status request failed: 400 Bad Request",
    alias: "400 Bad Request [NETGAME]",
  },
  Signature {
    pattern: "[NETGAME] Service status request failed: 404 Not Found",
    alias: "404 Not Found [NETGAME]",
  },
  Signature {
    pattern: "[TCP CLIENT] [R14NETCLIENT] connection to ws:///login",
    alias: "R14 Login Connection Error [TCP]",
  },
  Signature {
    pattern: "[TCP CLIENT] [R14NETCLIENT] connection to failed",
    alias: "R14 Connection Failed [TCP]",
  },
  Signature {
    pattern: "[TCP CLIENT] [R14NETCLIENT] connection to established",
    alias: "R14 Connection Established [TCP]",
  },
  Signature {
    pattern: "[TCP CLIENT] [R14NETCLIENT] connection to restored",
    alias: "R14 Connection Restored [TCP]",
  },
  Signature {
    pattern: "[TCP CLIENT] [R14NETCLIENT] connection to closed",
    alias: "R14 Connection Closed [TCP]",
  },
  Signature {
    pattern: "[TCP CLIENT] [R14NETCLIENT] Lost connection (okay) to peer",
    alias: "R14 Lost Peer Connection [TCP]",
  },
  Signature {
    pattern: "[NETGAME] Service status request failed: 502 Bad Gateway",
    alias: "502 Bad Gateway [NETGAME]",
  },
  Signature {
    pattern: "[NETGAME] Service status request failed: 0 Unknown",
    alias: "0 Unknown [NETGAME]",
  },
];

pub fn level_name(code: &str) -> &'static str {
  LEVELS
    .iter()
    .find(|(c, _)| *c == code)
    .map(|(_, name)| *name)
    .unwrap_or(UNKNOWN)
}

/// Resolve a gametype code to `(visibility, mode)`.
pub fn gametype(code: &str) -> (&'static str, &'static str) {
  GAMETYPES
    .iter()
    .find(|(c, _)| *c == code)
    .map(|(_, pair)| *pair)
    .unwrap_or((UNKNOWN, UNKNOWN))
}

/// Index of the first signature, in list order, contained in `line`.
///
/// A plain linear scan: when a line contains several signatures the earliest
/// listed one wins, wherever the fragments sit in the line.
pub fn match_signature(line: &str) -> Option<usize> {
  KNOWN_ERRORS.iter().position(|sig| line.contains(sig.pattern))
}
