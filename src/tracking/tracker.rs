//! Experiment tracker and scoped run sessions

use super::storage::{LocalStorage, StorageBackend};
use super::RunRecorder;
use crate::error::{ChurnError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
    /// Session dropped without being finished
    Killed,
}

/// One recorded training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub run_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub artifacts: Vec<String>,
}

/// A named group of runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub runs: Vec<Run>,
    pub tags: BTreeMap<String, String>,
}

/// Where and under which experiment runs are stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub experiment_name: String,
    pub tracking_dir: PathBuf,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            experiment_name: "telco_churn".to_string(),
            tracking_dir: PathBuf::from("mlruns"),
        }
    }
}

/// Owns the experiment store. Runs are recorded through [`TrackingSession`]s.
pub struct ExperimentTracker {
    storage: Box<dyn StorageBackend>,
    experiments: Vec<Experiment>,
}

impl std::fmt::Debug for ExperimentTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentTracker")
            .field("experiments", &self.experiments.len())
            .finish()
    }
}

impl ExperimentTracker {
    /// Open a tracker over any backend, loading what it already holds
    pub fn new(storage: Box<dyn StorageBackend>) -> Result<Self> {
        let experiments = storage.load_experiments()?;
        debug!(experiments = experiments.len(), "Opened experiment tracker");
        Ok(Self {
            storage,
            experiments,
        })
    }

    /// Tracker backed by `experiments.json` under `dir`
    pub fn local(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(Box::new(LocalStorage::new(dir.as_ref())))
    }

    pub fn experiments(&self) -> &[Experiment] {
        &self.experiments
    }

    pub fn experiment(&self, name: &str) -> Option<&Experiment> {
        self.experiments.iter().find(|e| e.name == name)
    }

    pub fn find_run(&self, run_id: &str) -> Option<&Run> {
        self.experiments
            .iter()
            .flat_map(|e| e.runs.iter())
            .find(|r| r.run_id == run_id)
    }

    fn experiment_index(&mut self, name: &str) -> usize {
        if let Some(idx) = self.experiments.iter().position(|e| e.name == name) {
            return idx;
        }
        self.experiments.push(Experiment {
            experiment_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
            runs: Vec::new(),
            tags: BTreeMap::new(),
        });
        self.experiments.len() - 1
    }

    /// Begin a run. The session must be finished explicitly; dropping it
    /// records the run as killed.
    pub fn start_run(&mut self, experiment_name: &str, run_name: &str) -> TrackingSession<'_> {
        let experiment_idx = self.experiment_index(experiment_name);
        let run = Run {
            run_id: Uuid::new_v4().to_string(),
            run_name: run_name.to_string(),
            start_time: Utc::now(),
            end_time: None,
            status: RunStatus::Running,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
        };
        info!(experiment = experiment_name, run_id = %run.run_id, run_name, "Started tracking run");
        TrackingSession {
            tracker: self,
            experiment_idx,
            run: Some(run),
        }
    }

    fn record(&mut self, experiment_idx: usize, run: Run) -> Result<()> {
        self.experiments[experiment_idx].runs.push(run);
        self.storage.save_experiments(&self.experiments)
    }
}

/// A single active run, scoped to the borrow of its tracker
#[derive(Debug)]
pub struct TrackingSession<'a> {
    tracker: &'a mut ExperimentTracker,
    experiment_idx: usize,
    /// `None` once the run has been closed
    run: Option<Run>,
}

impl TrackingSession<'_> {
    fn active(&mut self) -> Result<&mut Run> {
        self.run
            .as_mut()
            .ok_or_else(|| ChurnError::Tracking("run already closed".to_string()))
    }

    pub fn run_id(&self) -> &str {
        self.run.as_ref().map(|r| r.run_id.as_str()).unwrap_or_default()
    }

    pub fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
        self.active()?.params.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Metric values must be finite
    pub fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(ChurnError::Tracking(format!(
                "metric '{}' is not finite: {}",
                key, value
            )));
        }
        self.active()?.metrics.insert(key.to_string(), value);
        Ok(())
    }

    pub fn add_artifact(&mut self, path: &Path) -> Result<()> {
        self.active()?.artifacts.push(path.display().to_string());
        Ok(())
    }

    fn close(&mut self, status: RunStatus) -> Result<Run> {
        let mut run = self
            .run
            .take()
            .ok_or_else(|| ChurnError::Tracking("run already closed".to_string()))?;
        run.status = status;
        run.end_time = Some(Utc::now());
        self.tracker.record(self.experiment_idx, run.clone())?;
        info!(run_id = %run.run_id, status = ?status, "Closed tracking run");
        Ok(run)
    }

    /// Mark the run finished and persist it
    pub fn finish(mut self) -> Result<Run> {
        self.close(RunStatus::Finished)
    }

    /// Mark the run failed and persist it
    pub fn fail(mut self) -> Result<Run> {
        self.close(RunStatus::Failed)
    }
}

impl Drop for TrackingSession<'_> {
    fn drop(&mut self) {
        if self.run.is_some() {
            if let Err(e) = self.close(RunStatus::Killed) {
                warn!(error = %e, "Failed to record dropped run");
            }
        }
    }
}

impl RunRecorder for TrackingSession<'_> {
    fn log_params(&mut self, params: &[(String, String)]) -> Result<()> {
        for (key, value) in params {
            self.log_param(key, value)?;
        }
        Ok(())
    }

    fn log_metrics(&mut self, metrics: &[(String, f64)]) -> Result<()> {
        for (key, value) in metrics {
            self.log_metric(key, *value)?;
        }
        Ok(())
    }

    fn log_artifact(&mut self, path: &Path) -> Result<()> {
        self.add_artifact(path)
    }
}
