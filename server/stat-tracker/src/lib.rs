//! Server Stat Tracker: incremental game-server log ingestion and windowed stats.
//!
//! Discovers rotating log files, classifies lines into session, player-join
//! and known-error events, appends them to flat per-category stores, and
//! aggregates those stores over a time window for display or CSV export.
//!
//! No network, no DB; one running instance owns its data directory.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod ledger;
pub mod logging;
pub mod lookup;
pub mod store;
pub mod types;
pub mod worker;

pub use aggregate::Aggregator;
pub use config::Config;
pub use error::TrackerError;
pub use ingest::Ingestor;
pub use types::{AggregationResult, IngestReport, TimeWindow};
pub use worker::{IngestGate, IngestWorker};
