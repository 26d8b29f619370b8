//! Model wrapper over the supported classifier families

use super::decision_tree::Criterion;
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::logistic::LogisticRegression;
use super::random_forest::{MaxFeatures, RandomForest};
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Supported classifier families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    RandomForest,
    GradientBoosting,
    LogisticRegression,
}

impl ModelType {
    pub const ALL: [ModelType; 3] = [
        ModelType::RandomForest,
        ModelType::GradientBoosting,
        ModelType::LogisticRegression,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::RandomForest => "random_forest",
            ModelType::GradientBoosting => "gradient_boosting",
            ModelType::LogisticRegression => "logistic_regression",
        }
    }

    /// Tree depth used when the configuration leaves it unset
    pub fn default_max_depth(&self) -> Option<usize> {
        match self {
            ModelType::RandomForest => Some(10),
            ModelType::GradientBoosting => Some(5),
            ModelType::LogisticRegression => None,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = ChurnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random_forest" => Ok(ModelType::RandomForest),
            "gradient_boosting" => Ok(ModelType::GradientBoosting),
            "logistic_regression" => Ok(ModelType::LogisticRegression),
            other => Err(ChurnError::Config(format!(
                "unsupported model type '{}' (expected random_forest, gradient_boosting or logistic_regression)",
                other
            ))),
        }
    }
}

/// Estimator hyperparameters; fields a family does not use are ignored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Hyperparameters {
    pub n_estimators: usize,
    /// `None` falls back to the family default
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    /// Inverse L2 strength for logistic regression
    pub c: f64,
    pub max_iter: usize,
    /// Split criterion for forest trees: `gini` or `entropy`
    pub criterion: Criterion,
    /// Features considered at each forest split
    pub max_features: MaxFeatures,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            learning_rate: 0.1,
            subsample: 1.0,
            c: 1.0,
            max_iter: 1000,
            criterion: Criterion::Gini,
            max_features: MaxFeatures::Sqrt,
        }
    }
}

impl Hyperparameters {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, n: usize) -> Self {
        self.min_samples_split = n;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Reject out-of-range values before any data is loaded
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ChurnError::Config("n_estimators must be at least 1".to_string()));
        }
        if self.max_depth == Some(0) {
            return Err(ChurnError::Config("max_depth must be at least 1".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(ChurnError::Config("min_samples_split must be at least 2".to_string()));
        }
        if self.min_samples_leaf == 0 {
            return Err(ChurnError::Config("min_samples_leaf must be at least 1".to_string()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ChurnError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ChurnError::Config(format!(
                "subsample must be in (0, 1], got {}",
                self.subsample
            )));
        }
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(ChurnError::Config(format!("c must be positive, got {}", self.c)));
        }
        if self.max_iter == 0 {
            return Err(ChurnError::Config("max_iter must be at least 1".to_string()));
        }
        if self.criterion == Criterion::MSE {
            return Err(ChurnError::Config(
                "criterion must be gini or entropy for a classifier".to_string(),
            ));
        }
        if self.max_features == MaxFeatures::Fixed(0) {
            return Err(ChurnError::Config("max_features must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Parameters relevant to a family, as strings for run tracking
    pub fn to_params(&self, model_type: ModelType) -> Vec<(String, String)> {
        let depth = self
            .max_depth
            .or(model_type.default_max_depth())
            .map(|d| d.to_string())
            .unwrap_or_else(|| "none".to_string());

        let mut params = vec![("model_type".to_string(), model_type.to_string())];
        match model_type {
            ModelType::RandomForest => {
                params.push(("n_estimators".to_string(), self.n_estimators.to_string()));
                params.push(("max_depth".to_string(), depth));
                params.push(("min_samples_split".to_string(), self.min_samples_split.to_string()));
                params.push(("min_samples_leaf".to_string(), self.min_samples_leaf.to_string()));
                params.push(("criterion".to_string(), self.criterion.as_str().to_string()));
                params.push(("max_features".to_string(), self.max_features.as_param()));
            }
            ModelType::GradientBoosting => {
                params.push(("n_estimators".to_string(), self.n_estimators.to_string()));
                params.push(("max_depth".to_string(), depth));
                params.push(("min_samples_split".to_string(), self.min_samples_split.to_string()));
                params.push(("min_samples_leaf".to_string(), self.min_samples_leaf.to_string()));
                params.push(("learning_rate".to_string(), self.learning_rate.to_string()));
                params.push(("subsample".to_string(), self.subsample.to_string()));
            }
            ModelType::LogisticRegression => {
                params.push(("c".to_string(), self.c.to_string()));
                params.push(("max_iter".to_string(), self.max_iter.to_string()));
                params.push(("learning_rate".to_string(), self.learning_rate.to_string()));
            }
        }
        params
    }
}

/// Closed set of fitted estimator states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    LogisticRegression(LogisticRegression),
}

impl Estimator {
    fn build(model_type: ModelType, params: &Hyperparameters, seed: u64) -> Self {
        let max_depth = params.max_depth.or(model_type.default_max_depth());
        match model_type {
            ModelType::RandomForest => Estimator::RandomForest(
                RandomForest::new(params.n_estimators)
                    .with_max_depth(max_depth)
                    .with_min_samples_split(params.min_samples_split)
                    .with_min_samples_leaf(params.min_samples_leaf)
                    .with_criterion(params.criterion)
                    .with_max_features(params.max_features)
                    .with_random_state(seed),
            ),
            ModelType::GradientBoosting => {
                Estimator::GradientBoosting(GradientBoostingClassifier::new(GradientBoostingConfig {
                    n_estimators: params.n_estimators,
                    learning_rate: params.learning_rate,
                    max_depth: max_depth.unwrap_or(5),
                    min_samples_split: params.min_samples_split,
                    min_samples_leaf: params.min_samples_leaf,
                    subsample: params.subsample,
                    random_state: seed,
                }))
            }
            ModelType::LogisticRegression => Estimator::LogisticRegression(
                LogisticRegression::new()
                    .with_c(params.c)
                    .with_max_iter(params.max_iter)
                    .with_learning_rate(params.learning_rate),
            ),
        }
    }

    fn is_fitted(&self) -> bool {
        match self {
            Estimator::RandomForest(m) => m.is_fitted(),
            Estimator::GradientBoosting(m) => m.is_fitted(),
            Estimator::LogisticRegression(m) => m.is_fitted(),
        }
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Estimator::RandomForest(m) => m.fit(x, y).map(|_| ()),
            Estimator::GradientBoosting(m) => m.fit(x, y).map(|_| ()),
            Estimator::LogisticRegression(m) => m.fit(x, y).map(|_| ()),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::RandomForest(m) => m.predict_proba(x),
            Estimator::GradientBoosting(m) => m.predict_proba(x),
            Estimator::LogisticRegression(m) => m.predict_proba(x),
        }
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        match self {
            Estimator::RandomForest(m) => m.feature_importances().map(|a| a.to_vec()),
            Estimator::GradientBoosting(m) => Some(m.feature_importances().to_vec()),
            Estimator::LogisticRegression(m) => m
                .coefficients
                .as_ref()
                .map(|c| c.iter().map(|w| w.abs()).collect()),
        }
    }
}

/// A churn classifier: one estimator plus the configuration that produced it.
///
/// Created untrained by [`ChurnModel::create`], fitted once, then only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnModel {
    model_type: ModelType,
    params: Hyperparameters,
    seed: u64,
    estimator: Estimator,
    feature_names: Vec<String>,
    /// Compatibility tag of the preprocessor this model was trained with
    tag: Option<String>,
}

impl ChurnModel {
    /// Create an untrained model
    pub fn create(model_type: ModelType, params: Hyperparameters, seed: u64) -> Result<Self> {
        params.validate()?;
        let estimator = Estimator::build(model_type, &params, seed);
        Ok(Self {
            model_type,
            params,
            seed,
            estimator,
            feature_names: Vec::new(),
            tag: None,
        })
    }

    /// Parse the family from a configuration string
    pub fn from_name(name: &str, params: Hyperparameters, seed: u64) -> Result<Self> {
        Self::create(name.parse()?, params, seed)
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn params(&self) -> &Hyperparameters {
        &self.params
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_fitted(&self) -> bool {
        self.estimator.is_fitted()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Record the preprocessor this model pairs with
    pub fn bind_preprocessor(&mut self, tag: &str, feature_names: &[String]) {
        self.tag = Some(tag.to_string());
        self.feature_names = feature_names.to_vec();
    }

    /// Train in place
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        ensure_finite(x)?;
        if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(ChurnError::DataIntegrity(format!(
                "labels must be 0 or 1, found {}",
                bad
            )));
        }
        if !self.feature_names.is_empty() && self.feature_names.len() != x.ncols() {
            return Err(ChurnError::Shape {
                expected: format!("{} features", self.feature_names.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        self.estimator.fit(x, y)?;
        info!(
            model_type = %self.model_type,
            rows = x.nrows(),
            features = x.ncols(),
            "Model fitted"
        );
        Ok(self)
    }

    /// Probability of churn per row, in [0, 1]
    pub fn predict_probability(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(ChurnError::NotFitted);
        }
        ensure_finite(x)?;
        let proba = self.estimator.predict_proba(x)?;
        Ok(proba.mapv(|p| p.clamp(0.0, 1.0)))
    }

    /// Hard {0, 1} predictions at the 0.5 threshold
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_probability(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Per-feature importance paired with names, largest first
    pub fn ranked_importances(&self) -> Vec<(String, f64)> {
        let Some(importances) = self.estimator.feature_importances() else {
            return Vec::new();
        };
        let mut ranked: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(importances)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        if !self.is_fitted() {
            return Err(ChurnError::NotFitted);
        }
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Saved model");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ChurnError::Data(format!("failed to read {}: {}", path.display(), e))
        })?;
        let model: Self = serde_json::from_str(&json)?;
        Ok(model)
    }
}

fn ensure_finite(x: &Array2<f64>) -> Result<()> {
    if let Some(((row, col), v)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(ChurnError::DataIntegrity(format!(
            "non-finite feature value {} at row {}, column {}",
            v, row, col
        )));
    }
    Ok(())
}
