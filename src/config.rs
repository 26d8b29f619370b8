//! Application configuration
//!
//! One document drives every command: where the data and artifacts live,
//! how the pipeline cleans and splits, which model to train, and how to
//! search hyperparameters. YAML and JSON are both accepted.

use crate::error::{ChurnError, Result};
use crate::preprocessing::PipelineConfig;
use crate::tracking::ExperimentConfig;
use crate::training::{TrainingConfig, TuningConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Filesystem locations used by the commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub raw_data: PathBuf,
    #[serde(alias = "data_dir")]
    pub processed_dir: PathBuf,
    pub model_dir: PathBuf,
    pub tracking_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from("data/raw/telco_churn.csv"),
            processed_dir: PathBuf::from("data/processed"),
            model_dir: PathBuf::from("models"),
            tracking_dir: PathBuf::from("mlruns"),
        }
    }
}

/// Top-level configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub experiment_name: String,
    pub run_name: String,
    pub random_state: u64,
    pub paths: PathsConfig,
    pub pipeline: PipelineConfig,
    pub model: TrainingConfig,
    pub tuning: TuningConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            experiment_name: "telco_churn".to_string(),
            run_name: "churn_model_v1".to_string(),
            random_state: 42,
            paths: PathsConfig::default(),
            pipeline: PipelineConfig::default(),
            model: TrainingConfig::default(),
            tuning: TuningConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a `.yaml`/`.yml` or `.json` file and validate it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ChurnError::Config(format!("failed to read config {}: {}", path.display(), e))
        })?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let config = match ext.as_str() {
            "json" => Self::from_json(&text)?,
            "yaml" | "yml" => Self::from_yaml(&text)?,
            other => {
                return Err(ChurnError::Config(format!(
                    "unsupported config extension '{}' for {}",
                    other,
                    path.display()
                )))
            }
        };
        debug!(path = %path.display(), experiment = %config.experiment_name, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| ChurnError::Config(format!("invalid YAML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| ChurnError::Config(format!("invalid JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_paths(mut self, paths: PathsConfig) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_model(mut self, model: TrainingConfig) -> Self {
        self.model = model;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn experiment(&self) -> ExperimentConfig {
        ExperimentConfig {
            experiment_name: self.experiment_name.clone(),
            tracking_dir: self.paths.tracking_dir.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.experiment_name.trim().is_empty() {
            return Err(ChurnError::Config("experiment_name must not be empty".to_string()));
        }
        if self.run_name.trim().is_empty() {
            return Err(ChurnError::Config("run_name must not be empty".to_string()));
        }
        self.pipeline.validate()?;
        self.model.validate()?;
        self.tuning.validate()
    }
}
