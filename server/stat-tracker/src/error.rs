//! Structured error types for the stat tracker.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
  #[error("io: {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("ledger: {0}")]
  Ledger(String),

  #[error("parse: {0}")]
  Parse(String),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("an ingestion run is already in progress")]
  IngestBusy,

  #[error("spawn ingestion worker: {0}")]
  Spawn(#[source] io::Error),

  #[error("ingestion worker stopped without reporting a result")]
  WorkerLost,
}

impl TrackerError {
  pub fn io(path: &Path, source: io::Error) -> Self {
    Self::Io {
      path: path.to_path_buf(),
      source,
    }
  }

  pub fn ledger(msg: impl Into<String>) -> Self {
    Self::Ledger(msg.into())
  }

  pub fn parse(msg: impl Into<String>) -> Self {
    Self::Parse(msg.into())
  }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
