//! Training orchestration
//!
//! Moves linearly through [`TrainingStage`]s: load the processed splits, fit
//! the preprocessor on train, fit the model, evaluate on train and val, then
//! persist the paired artifacts. Run tracking is best-effort.

use super::config::TrainingConfig;
use super::metrics::ClassificationMetrics;
use super::model::ChurnModel;
use super::tuning::{HyperparameterSearch, SearchResult, TuningConfig};
use crate::error::{ChurnError, Result};
use crate::preprocessing::{FeaturePreprocessor, PipelineState, ProcessedPaths};
use crate::tracking::RunRecorder;
use crate::utils::frame::target_array;
use crate::utils::{DataLoader, Timer};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const MODEL_FILE: &str = "model.json";
pub const PREPROCESSOR_FILE: &str = "preprocessor.json";
pub const METRICS_FILE: &str = "metrics.json";
/// Importances kept in the report
pub const TOP_FEATURES: usize = 10;

/// Linear progress of one training run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStage {
    ConfigLoaded,
    DataLoaded,
    Preprocessed,
    Fitted,
    Evaluated,
    Persisted,
}

impl fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainingStage::ConfigLoaded => "config_loaded",
            TrainingStage::DataLoaded => "data_loaded",
            TrainingStage::Preprocessed => "preprocessed",
            TrainingStage::Fitted => "fitted",
            TrainingStage::Evaluated => "evaluated",
            TrainingStage::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// Files written into the model directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub preprocessor: PathBuf,
    pub metrics: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join(MODEL_FILE),
            preprocessor: dir.join(PREPROCESSOR_FILE),
            metrics: dir.join(METRICS_FILE),
        }
    }
}

/// Outcome of a training run; also the content of `metrics.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_type: String,
    /// Compatibility tag shared by the model and preprocessor artifacts
    pub tag: String,
    pub n_features: usize,
    pub train: ClassificationMetrics,
    pub val: ClassificationMetrics,
    /// Flat `train_*` / `val_*` view of the metrics
    pub metrics: BTreeMap<String, f64>,
    pub params: BTreeMap<String, String>,
    pub elapsed_ms: u64,
    /// Most important features, largest first
    #[serde(default)]
    pub top_features: Vec<(String, f64)>,
    /// Recorder calls that failed and were skipped
    #[serde(default)]
    pub tracking_failures: usize,
}

/// Drives one training run
#[derive(Debug)]
pub struct Trainer {
    config: TrainingConfig,
    seed: u64,
    stage: TrainingStage,
}

impl Trainer {
    /// Validate the configuration before any data is read
    pub fn new(config: TrainingConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        debug!(model_type = %config.model_type, seed, "Training configuration loaded");
        Ok(Self {
            config,
            seed,
            stage: TrainingStage::ConfigLoaded,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn stage(&self) -> TrainingStage {
        self.stage
    }

    fn advance(&mut self, stage: TrainingStage) {
        debug!(from = %self.stage, to = %stage, "Training stage");
        self.stage = stage;
    }

    /// Train from `train.csv`, `val.csv` and `pipeline_state.json` in `processed_dir`
    pub fn train(
        &mut self,
        processed_dir: impl AsRef<Path>,
        model_dir: impl AsRef<Path>,
        recorder: Option<&mut dyn RunRecorder>,
    ) -> Result<TrainingReport> {
        let paths = ProcessedPaths::in_dir(processed_dir);
        let loader = DataLoader::new();
        let train = loader.load_required(&paths.train, "training split")?;
        let val = loader.load_required(&paths.val, "validation split")?;
        let state = PipelineState::load(&paths.state)?;

        self.train_frames(state, &train, &val, model_dir, recorder)
    }

    /// Cross-validated search over the training split in `processed_dir`.
    /// The scaler is fit on the full training split before folding.
    pub fn search(&self, processed_dir: impl AsRef<Path>, tuning: &TuningConfig) -> Result<SearchResult> {
        let paths = ProcessedPaths::in_dir(processed_dir);
        let train = DataLoader::new().load_required(&paths.train, "training split")?;
        let state = PipelineState::load(&paths.state)?;
        let y = target_array(&train, &state.target_column)?;
        let preprocessor = FeaturePreprocessor::fit(state, &train, self.config.scaler)?;
        let x = preprocessor.transform_encoded(&train)?;

        HyperparameterSearch::new(tuning.clone(), self.seed).run(&x, &y, &self.config.params)
    }

    /// Train from already-encoded frames
    pub fn train_frames(
        &mut self,
        state: PipelineState,
        train: &DataFrame,
        val: &DataFrame,
        model_dir: impl AsRef<Path>,
        mut recorder: Option<&mut dyn RunRecorder>,
    ) -> Result<TrainingReport> {
        let timer = Timer::start();
        self.stage = TrainingStage::ConfigLoaded;
        let target = state.target_column.clone();
        let y_train = target_array(train, &target)?;
        let y_val = target_array(val, &target)?;
        info!(train_rows = train.height(), val_rows = val.height(), "Training data loaded");
        self.advance(TrainingStage::DataLoaded);

        let preprocessor = FeaturePreprocessor::fit(state, train, self.config.scaler)?;
        let x_train = preprocessor.transform_encoded(train)?;
        let x_val = preprocessor.transform_encoded(val)?;
        self.advance(TrainingStage::Preprocessed);

        let mut model = ChurnModel::create(self.config.model_type, self.config.params.clone(), self.seed)?;
        model.bind_preprocessor(preprocessor.tag(), preprocessor.feature_names());
        model.fit(&x_train, &y_train)?;
        self.advance(TrainingStage::Fitted);

        let train_metrics = evaluate(&model, &x_train, &y_train)?;
        let val_metrics = evaluate(&model, &x_val, &y_val)?;
        self.advance(TrainingStage::Evaluated);

        let params = self.config.params.to_params(self.config.model_type);
        let mut flat: Vec<(String, f64)> = train_metrics.to_prefixed("train");
        flat.extend(val_metrics.to_prefixed("val"));

        let mut tracking_failures = 0;
        if let Some(rec) = recorder.as_deref_mut() {
            tracking_failures += best_effort("params", rec.log_params(&params));
            tracking_failures += best_effort("metrics", rec.log_metrics(&flat));
        }

        let mut report = TrainingReport {
            model_type: self.config.model_type.to_string(),
            tag: preprocessor.tag().to_string(),
            n_features: preprocessor.feature_names().len(),
            train: train_metrics,
            val: val_metrics,
            metrics: flat.into_iter().collect(),
            params: params.into_iter().collect(),
            elapsed_ms: 0,
            top_features: model.ranked_importances().into_iter().take(TOP_FEATURES).collect(),
            tracking_failures,
        };

        let artifacts = ArtifactPaths::in_dir(model_dir);
        model.save(&artifacts.model)?;
        preprocessor.save(&artifacts.preprocessor)?;
        report.elapsed_ms = timer.elapsed_ms();
        write_report(&report, &artifacts.metrics)?;
        self.advance(TrainingStage::Persisted);

        if let Some(rec) = recorder.as_deref_mut() {
            for path in [&artifacts.model, &artifacts.preprocessor, &artifacts.metrics] {
                report.tracking_failures += best_effort("artifact", rec.log_artifact(path));
            }
        }

        info!(
            model_type = %report.model_type,
            train_f1 = report.train.f1,
            val_f1 = report.val.f1,
            val_auc = ?report.val.auc,
            elapsed_ms = report.elapsed_ms,
            "Training complete"
        );
        Ok(report)
    }
}

fn evaluate(model: &ChurnModel, x: &ndarray::Array2<f64>, y: &ndarray::Array1<f64>) -> Result<ClassificationMetrics> {
    let proba = model.predict_probability(x)?;
    let pred = proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 });
    ClassificationMetrics::compute(y, &pred, &proba)
}

/// Log a recorder failure and count it instead of propagating
fn best_effort(what: &str, result: Result<()>) -> usize {
    match result {
        Ok(()) => 0,
        Err(e) => {
            warn!(what, error = %e, "Experiment tracking failed; continuing");
            1
        }
    }
}

fn write_report(report: &TrainingReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read a `metrics.json` written by [`Trainer`]
pub fn load_report(path: impl AsRef<Path>) -> Result<TrainingReport> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| {
        ChurnError::Data(format!("failed to read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&json)?)
}
