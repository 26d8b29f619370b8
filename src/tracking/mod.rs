//! Experiment tracking
//!
//! Runs are recorded through an explicit [`TrackingSession`] handed to the
//! trainer as a [`RunRecorder`]. Recording is best-effort for callers: the
//! trainer logs recorder failures and carries on.

mod storage;
mod tracker;

pub use storage::{LocalStorage, StorageBackend};
pub use tracker::{Experiment, ExperimentConfig, ExperimentTracker, Run, RunStatus, TrackingSession};

use crate::error::Result;
use std::path::Path;

/// Sink for the parameters, metrics and artifacts of one training run
pub trait RunRecorder {
    fn log_params(&mut self, params: &[(String, String)]) -> Result<()>;

    fn log_metrics(&mut self, metrics: &[(String, f64)]) -> Result<()>;

    fn log_artifact(&mut self, path: &Path) -> Result<()>;
}
