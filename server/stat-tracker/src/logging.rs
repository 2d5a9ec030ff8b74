//! Tracing subscriber setup for the binary.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a stderr subscriber filtered by `RUST_LOG` (default `info`).
///
/// Stdout is left to command output so `--json` summaries stay parseable.
pub fn init_logging(verbose: bool) {
  let default = if verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

  let _ = fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .try_init();
}
