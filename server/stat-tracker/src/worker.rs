//! Background ingestion: one worker thread at a time, progress handed back
//! over a channel that the interactive thread drains on its own schedule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::error;

use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::ingest::Ingestor;
use crate::types::{IngestMessage, IngestReport};

/// Admission gate: at most one ingestion worker holds it at a time.
#[derive(Debug, Clone, Default)]
pub struct IngestGate {
  busy: Arc<AtomicBool>,
}

impl IngestGate {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_busy(&self) -> bool {
    self.busy.load(Ordering::Acquire)
  }

  fn acquire(&self) -> Option<GateGuard> {
    self
      .busy
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| GateGuard {
        busy: Arc::clone(&self.busy),
      })
  }
}

/// Releases the gate when dropped, including when the worker panics.
struct GateGuard {
  busy: Arc<AtomicBool>,
}

impl Drop for GateGuard {
  fn drop(&mut self) {
    self.busy.store(false, Ordering::Release);
  }
}

/// Handle to a running ingestion.
pub struct IngestWorker {
  rx: Receiver<IngestMessage>,
  handle: Option<JoinHandle<()>>,
  finished: bool,
}

impl IngestWorker {
  /// Start ingesting `config` on a new thread. Fails with
  /// [`TrackerError::IngestBusy`] while another worker holds `gate`.
  pub fn spawn(gate: &IngestGate, config: Config) -> Result<Self> {
    let guard = gate.acquire().ok_or(TrackerError::IngestBusy)?;
    let (tx, rx) = crossbeam_channel::unbounded();

    let handle = thread::Builder::new()
      .name("ingest".into())
      .spawn(move || {
        let _guard = guard;
        let ingestor = Ingestor::new(config);
        let progress_tx = tx.clone();
        let result = ingestor.run(|fraction| {
          let _ = progress_tx.send(IngestMessage::Progress(fraction));
        });
        if let Err(e) = &result {
          error!(error = %e, "ingestion failed");
        }
        let _ = tx.send(IngestMessage::Finished(result));
      })
      .map_err(TrackerError::Spawn)?;

    Ok(Self {
      rx,
      handle: Some(handle),
      finished: false,
    })
  }

  /// Next pending message, without blocking. A worker that goes away without
  /// reporting a result yields one `Finished(Err(WorkerLost))`; after the
  /// final message this returns `None`.
  pub fn try_recv(&mut self) -> Option<IngestMessage> {
    if self.finished {
      return None;
    }
    let msg = match self.rx.try_recv() {
      Ok(msg) => msg,
      Err(TryRecvError::Empty) => return None,
      Err(TryRecvError::Disconnected) => IngestMessage::Finished(Err(TrackerError::WorkerLost)),
    };
    if matches!(msg, IngestMessage::Finished(_)) {
      self.finished = true;
    }
    Some(msg)
  }

  /// Block until the run finishes, passing each progress update to `on_progress`.
  pub fn wait(mut self, mut on_progress: impl FnMut(f64)) -> Result<IngestReport> {
    let outcome = loop {
      match self.rx.recv() {
        Ok(IngestMessage::Progress(fraction)) => on_progress(fraction),
        Ok(IngestMessage::Finished(result)) => break result,
        Err(_) => break Err(TrackerError::WorkerLost),
      }
    };
    if let Some(handle) = self.handle.take() {
      let _ = handle.join();
    }
    outcome
  }
}

/// Percentage text for a progress bar: blank at the ends, whole percent between.
pub fn progress_text(fraction: f64) -> String {
  if fraction <= 0.0 || fraction >= 1.0 {
    String::new()
  } else {
    format!("{}%", (fraction * 100.0) as u32)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn second_worker_is_rejected_while_first_runs() {
    let gate = IngestGate::new();
    let held = gate.acquire().unwrap();
    assert!(gate.is_busy());

    let dir = tempfile::tempdir().unwrap();
    let err = IngestWorker::spawn(&gate, Config::from_base_dir(dir.path())).err().unwrap();
    assert!(matches!(err, TrackerError::IngestBusy));

    drop(held);
    assert!(!gate.is_busy());
  }

  #[test]
  fn gate_released_after_run() {
    let gate = IngestGate::new();
    let dir = tempfile::tempdir().unwrap();
    let worker = IngestWorker::spawn(&gate, Config::from_base_dir(dir.path())).unwrap();

    let mut updates = Vec::new();
    let report = worker.wait(|f| updates.push(f)).unwrap();
    assert_eq!(report.new_files, 0);
    assert_eq!(updates, vec![1.0]);
    assert!(!gate.is_busy());
  }

  #[test]
  fn polling_reports_a_lost_worker() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut worker = IngestWorker {
      rx,
      handle: None,
      finished: false,
    };
    assert!(worker.try_recv().is_none());

    tx.send(IngestMessage::Progress(0.5)).unwrap();
    drop(tx);
    assert!(matches!(worker.try_recv(), Some(IngestMessage::Progress(f)) if f == 0.5));
    assert!(matches!(
      worker.try_recv(),
      Some(IngestMessage::Finished(Err(TrackerError::WorkerLost)))
    ));
    assert!(worker.try_recv().is_none());
  }

  #[test]
  fn polling_stops_after_finished() {
    let gate = IngestGate::new();
    let dir = tempfile::tempdir().unwrap();
    let mut worker = IngestWorker::spawn(&gate, Config::from_base_dir(dir.path())).unwrap();

    let report = loop {
      match worker.try_recv() {
        Some(IngestMessage::Finished(result)) => break result.unwrap(),
        Some(IngestMessage::Progress(_)) | None => thread::yield_now(),
      }
    };
    assert_eq!(report.new_files, 0);
    assert!(worker.try_recv().is_none());
  }

  #[test]
  fn progress_text_blank_at_ends() {
    assert_eq!(progress_text(0.0), "");
    assert_eq!(progress_text(1.0), "");
    assert_eq!(progress_text(0.5), "50%");
  }
}
