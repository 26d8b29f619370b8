//! Churn MLOps - Telco customer churn pipeline
//!
//! This crate covers the full lifecycle of a churn classifier:
//! - Schema validation, cleaning, labeling, feature derivation and encoding
//! - Reproducible stratified train/validation/test splits
//! - Random forest, gradient boosting and logistic regression models
//! - Best-effort experiment tracking
//! - Paired model/preprocessor artifacts with a shared compatibility tag
//! - Batch and single-record prediction, in-process or over HTTP
//!
//! # Modules
//!
//! - [`preprocessing`] - Data pipeline stages and the fitted preprocessor
//! - [`training`] - Estimators, metrics, trainer and hyperparameter search
//! - [`tracking`] - Local experiment tracking
//! - [`inference`] - Predictor over persisted artifacts
//! - [`server`] - HTTP prediction service
//! - [`cli`] - Command-line interface
//! - [`config`] - Application configuration document

pub mod config;
pub mod error;

pub mod inference;
pub mod preprocessing;
pub mod tracking;
pub mod training;

pub mod cli;
pub mod server;

pub mod utils;

pub use error::{ChurnError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{AppConfig, PathsConfig};
    pub use crate::error::{ChurnError, Result};

    pub use crate::preprocessing::{
        DataPipeline, FeaturePreprocessor, PipelineConfig, PipelineState, ScalerType,
    };

    pub use crate::training::{
        ChurnModel, ClassificationMetrics, Hyperparameters, HyperparameterSearch, ModelType,
        Trainer, TrainingConfig, TrainingReport, TuningConfig,
    };

    pub use crate::tracking::{ExperimentTracker, RunRecorder};

    pub use crate::inference::{ChurnPrediction, ChurnPredictor, CustomerRecord, RiskLevel};
}
