//! Progress reporting for tiled prediction. Sinks are best-effort: a failing
//! sink is logged and otherwise ignored.
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
#[error("progress sink error: {0}")]
pub struct ProgressError(pub String);

pub trait ProgressSink {
    /// Announce the (estimated) number of units of the current attempt.
    fn set_total(&mut self, total: usize) -> Result<(), ProgressError>;
    fn advance(&mut self, units: usize) -> Result<(), ProgressError>;
    fn close(&mut self) -> Result<(), ProgressError>;
}

/// Swallow a sink failure after logging it.
pub(crate) fn best_effort(result: Result<(), ProgressError>) {
    if let Err(e) = result {
        warn!("Ignoring progress failure: {}", e);
    }
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_total(&mut self, _total: usize) -> Result<(), ProgressError> {
        Ok(())
    }

    fn advance(&mut self, _units: usize) -> Result<(), ProgressError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), ProgressError> {
        Ok(())
    }
}

/// Logs progress through `tracing` in 10% steps.
#[derive(Debug, Default, Clone)]
pub struct LogProgress {
    total: usize,
    done: usize,
    last_decile: usize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn done(&self) -> usize {
        self.done
    }
}

impl ProgressSink for LogProgress {
    fn set_total(&mut self, total: usize) -> Result<(), ProgressError> {
        // A new total means a new attempt; start over.
        self.total = total;
        self.done = 0;
        self.last_decile = 0;
        info!("Predicting {} tile(s)", total);
        Ok(())
    }

    fn advance(&mut self, units: usize) -> Result<(), ProgressError> {
        self.done += units;
        if self.total == 0 {
            return Ok(());
        }
        let decile = (self.done * 10 / self.total).min(10);
        if decile > self.last_decile {
            self.last_decile = decile;
            info!(
                "Tiles done: {}/{} ({}%)",
                self.done.min(self.total),
                self.total,
                decile * 10
            );
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), ProgressError> {
        info!("Finished {} tile(s)", self.done);
        Ok(())
    }
}
