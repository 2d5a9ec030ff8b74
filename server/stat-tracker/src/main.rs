//! Binary entrypoint: `ingest`, `summary` and `export` over one installation.
//!
//! Logs go to stderr; command output (text or `--json`) goes to stdout.

use std::io::{self, Write};
use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand};
use serde::Serialize;

use stat_tracker::aggregate::{self, Aggregator};
use stat_tracker::error::Result;
use stat_tracker::export;
use stat_tracker::ledger;
use stat_tracker::logging;
use stat_tracker::types::{LabelMode, LegendEntry};
use stat_tracker::worker::{progress_text, IngestGate, IngestWorker};
use stat_tracker::{AggregationResult, Config, TimeWindow};

#[derive(Debug, Parser)]
#[command(name = "stat-tracker", version, about = "Game server log stats")]
struct Cli {
  /// Server install directory (holds `_local/r14logs` and `dashboard/stats`).
  #[arg(long, global = true, env = "STAT_TRACKER_HOME")]
  base_dir: Option<PathBuf>,

  /// Debug logging unless RUST_LOG says otherwise.
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Import log files not yet in the ledger.
  Ingest {
    #[arg(long)]
    json: bool,
  },
  /// Aggregate the stores over a time window.
  Summary {
    /// last-hour | last-24h | last-30d | all-time
    #[arg(long, default_value = "all-time")]
    window: TimeWindow,
    /// Show legend values as percentages instead of counts.
    #[arg(long)]
    percent: bool,
    #[arg(long)]
    json: bool,
  },
  /// Write levels.csv, players.csv and errors.csv.
  Export,
}

fn main() {
  let cli = Cli::parse();
  logging::init_logging(cli.verbose);

  if let Err(e) = run_binary(cli) {
    let _ = writeln!(io::stderr(), "stat-tracker error: {}", e);
    std::process::exit(1);
  }
}

fn run_binary(cli: Cli) -> Result<()> {
  let config = Config::resolve(cli.base_dir);
  let stdout = io::stdout();
  let mut out = stdout.lock();

  match cli.command {
    Command::Ingest { json } => {
      let gate = IngestGate::new();
      let worker = IngestWorker::spawn(&gate, config)?;
      let report = worker.wait(|fraction| {
        let text = progress_text(fraction);
        if !text.is_empty() {
          let _ = writeln!(io::stderr(), "progress: {}", text);
        }
      })?;
      if json {
        serde_json::to_writer(&mut out, &report)?;
        let _ = writeln!(out);
      } else {
        let _ = writeln!(
          out,
          "Imported {} of {} new log files ({} unreadable): {} sessions, {} player joins, {} errors",
          report.files_processed,
          report.new_files,
          report.files_skipped,
          report.sessions,
          report.player_joins,
          report.errors
        );
      }
    }
    Command::Summary {
      window,
      percent,
      json,
    } => {
      let mode = if percent {
        LabelMode::Percent
      } else {
        LabelMode::Count
      };
      let has_data = ledger::has_data(&config.ledger_path);
      let result = Aggregator::from_config(&config).aggregate(window, Local::now().naive_local())?;
      let summary = SummaryOutput::new(&result, mode, has_data);
      if json {
        serde_json::to_writer_pretty(&mut out, &summary)?;
        let _ = writeln!(out);
      } else {
        let _ = write_summary(&mut out, &summary);
      }
    }
    Command::Export => {
      let report = export::export_all(&config)?;
      for (path, rows) in [report.levels, report.players, report.errors]
        .into_iter()
        .flatten()
      {
        let _ = writeln!(out, "{}: {} rows", path.display(), rows);
      }
    }
  }

  let _ = out.flush();
  Ok(())
}

/// Everything the summary view shows, in display-ready form.
#[derive(Debug, Serialize)]
struct SummaryOutput {
  window: TimeWindow,
  status: String,
  players_served: usize,
  games_hosted: usize,
  errors_encountered: u64,
  levels: Vec<LegendEntry>,
  errors: Vec<LegendEntry>,
  gametypes: Vec<LegendEntry>,
}

impl SummaryOutput {
  fn new(result: &AggregationResult, mode: LabelMode, has_data: bool) -> Self {
    let status = if !has_data {
      "Please import log data.".to_string()
    } else {
      match result.since {
        Some(ts) => format!("Since: {}", ts.format("%Y-%m-%d at %H:%M")),
        None => "Since: Unknown".to_string(),
      }
    };
    Self {
      window: result.window,
      status,
      players_served: result.unique_players,
      games_hosted: result.games_hosted(),
      errors_encountered: result.total_errors(),
      levels: aggregate::legend(&result.levels, mode),
      errors: aggregate::error_legend(&result.errors, mode),
      gametypes: aggregate::visibility_split(result, mode),
    }
  }
}

fn write_section(
  out: &mut impl Write,
  title: &str,
  entries: &[LegendEntry],
  empty: &str,
) -> io::Result<()> {
  writeln!(out, "\n{}:", title)?;
  if entries.is_empty() {
    writeln!(out, "  {}", empty)?;
  }
  for entry in entries {
    writeln!(out, "  {}", entry)?;
  }
  Ok(())
}

fn write_summary(out: &mut impl Write, s: &SummaryOutput) -> io::Result<()> {
  writeln!(out, "{} ({})", s.status, s.window)?;
  writeln!(
    out,
    "Players Served: {}  Games Hosted: {}  Errors Encountered: {}",
    s.players_served, s.games_hosted, s.errors_encountered
  )?;
  write_section(out, "Hosted Levels", &s.levels, "No Level Data")?;
  write_section(out, "Errors", &s.errors, "No Errors")?;
  write_section(out, "Gametypes (Public / Private)", &s.gametypes, "No Gametype Data")?;
  Ok(())
}
