//! Storage Backend for Experiment Tracking
//!
//! Provides storage backends for persisting experiments.

use super::tracker::Experiment;
use crate::error::{ChurnError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Storage backend trait
pub trait StorageBackend: Send {
    /// Save experiments to storage
    fn save_experiments(&self, experiments: &[Experiment]) -> Result<()>;

    /// Load experiments from storage
    fn load_experiments(&self) -> Result<Vec<Experiment>>;

    /// Delete an experiment
    fn delete_experiment(&self, experiment_id: &str) -> Result<()>;

    /// Check if storage is available
    fn is_available(&self) -> bool;
}

/// Local file system storage backend
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn experiments_file(&self) -> PathBuf {
        self.base_dir.join("experiments.json")
    }
}

fn tracking_err(action: &str, path: &Path, err: impl std::fmt::Display) -> ChurnError {
    ChurnError::Tracking(format!("failed to {} {}: {}", action, path.display(), err))
}

impl StorageBackend for LocalStorage {
    fn save_experiments(&self, experiments: &[Experiment]) -> Result<()> {
        fs::create_dir_all(&self.base_dir).map_err(|e| tracking_err("create", &self.base_dir, e))?;

        let json = serde_json::to_string_pretty(experiments)
            .map_err(|e| ChurnError::Tracking(format!("failed to serialize experiments: {}", e)))?;

        // Write then rename so a reader never sees a half-written file
        let path = self.experiments_file();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| tracking_err("write", &tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| tracking_err("replace", &path, e))?;
        Ok(())
    }

    fn load_experiments(&self) -> Result<Vec<Experiment>> {
        let path = self.experiments_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path).map_err(|e| tracking_err("read", &path, e))?;
        serde_json::from_str(&contents).map_err(|e| tracking_err("parse", &path, e))
    }

    fn delete_experiment(&self, experiment_id: &str) -> Result<()> {
        let mut experiments = self.load_experiments()?;
        experiments.retain(|e| e.experiment_id != experiment_id);
        self.save_experiments(&experiments)
    }

    fn is_available(&self) -> bool {
        fs::create_dir_all(&self.base_dir).is_ok()
    }
}
