//! Cross-validated hyperparameter search

use super::cross_validation::{CVResults, CVStrategy, CrossValidator};
use super::metrics::ClassificationMetrics;
use super::model::{ChurnModel, Hyperparameters, ModelType};
use crate::error::{ChurnError, Result};
use crate::utils::Timer;
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How candidates are drawn from the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SearchMethod {
    /// Every combination
    Grid,
    /// `n_iter` distinct combinations drawn with the run seed
    Random { n_iter: usize },
}

impl Default for SearchMethod {
    fn default() -> Self {
        SearchMethod::Grid
    }
}

/// Values to try per hyperparameter.
///
/// Tree families search the product of the four tree axes; logistic
/// regression searches `c` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
    pub c: Vec<f64>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![50, 100, 200],
            max_depth: vec![5, 10, 15, 20],
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
            c: vec![0.01, 0.1, 1.0, 10.0],
        }
    }
}

impl ParamGrid {
    /// Number of candidates searched for `model_type`
    pub fn len(&self, model_type: ModelType) -> usize {
        match model_type {
            ModelType::LogisticRegression => self.c.len(),
            ModelType::RandomForest | ModelType::GradientBoosting => {
                self.n_estimators.len()
                    * self.max_depth.len()
                    * self.min_samples_split.len()
                    * self.min_samples_leaf.len()
            }
        }
    }

    pub fn is_empty(&self, model_type: ModelType) -> bool {
        self.len(model_type) == 0
    }

    /// Cartesian product in declaration order, layered over `base`
    pub fn candidates(&self, model_type: ModelType, base: &Hyperparameters) -> Vec<Hyperparameters> {
        if model_type == ModelType::LogisticRegression {
            return self
                .c
                .iter()
                .map(|&c| Hyperparameters { c, ..base.clone() })
                .collect();
        }

        let mut out = Vec::with_capacity(self.len(model_type));
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    for &min_samples_leaf in &self.min_samples_leaf {
                        out.push(Hyperparameters {
                            n_estimators,
                            max_depth: Some(max_depth),
                            min_samples_split,
                            min_samples_leaf,
                            ..base.clone()
                        });
                    }
                }
            }
        }
        out
    }
}

/// Search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TuningConfig {
    pub model_type: ModelType,
    pub method: SearchMethod,
    pub grid: ParamGrid,
    pub cv_folds: usize,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            model_type: ModelType::RandomForest,
            method: SearchMethod::Grid,
            grid: ParamGrid::default(),
            cv_folds: 5,
        }
    }
}

impl TuningConfig {
    pub fn with_method(mut self, method: SearchMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_grid(mut self, grid: ParamGrid) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Candidates the configured method will score
    pub fn candidate_count(&self) -> usize {
        let total = self.grid.len(self.model_type);
        match self.method {
            SearchMethod::Grid => total,
            SearchMethod::Random { n_iter } => n_iter.min(total),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid.is_empty(self.model_type) {
            return Err(ChurnError::Config(format!(
                "parameter grid for {} has no candidates",
                self.model_type
            )));
        }
        if self.cv_folds < 2 {
            return Err(ChurnError::Config("cv_folds must be at least 2".to_string()));
        }
        if let SearchMethod::Random { n_iter } = self.method {
            if n_iter == 0 {
                return Err(ChurnError::Config("n_iter must be at least 1".to_string()));
            }
        }
        for params in self.grid.candidates(self.model_type, &Hyperparameters::default()) {
            params.validate()?;
        }
        Ok(())
    }
}

/// Cross-validated score of one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: Hyperparameters,
    pub cv: CVResults,
}

/// Outcome of a search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub model_type: ModelType,
    pub best_params: Hyperparameters,
    /// Mean F1 over folds of the best candidate
    pub best_score: f64,
    pub candidates: Vec<CandidateScore>,
}

/// Grid or random search scored by stratified k-fold F1
#[derive(Debug, Clone)]
pub struct HyperparameterSearch {
    config: TuningConfig,
    seed: u64,
}

impl HyperparameterSearch {
    pub fn new(config: TuningConfig, seed: u64) -> Self {
        Self { config, seed }
    }

    fn select_candidates(&self, base: &Hyperparameters) -> Vec<Hyperparameters> {
        let all = self.config.grid.candidates(self.config.model_type, base);
        match self.config.method {
            SearchMethod::Grid => all,
            SearchMethod::Random { n_iter } => {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
                let amount = n_iter.min(all.len());
                rand::seq::index::sample(&mut rng, all.len(), amount)
                    .into_iter()
                    .map(|i| all[i].clone())
                    .collect()
            }
        }
    }

    /// Score every candidate; ties keep the earliest candidate
    pub fn run(&self, x: &Array2<f64>, y: &Array1<f64>, base: &Hyperparameters) -> Result<SearchResult> {
        self.config.validate()?;
        if x.nrows() != y.len() {
            return Err(ChurnError::Shape {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        let timer = Timer::start();
        let splits = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: self.config.cv_folds,
            shuffle: true,
        })
        .with_random_state(self.seed)
        .split(x.nrows(), Some(y))?;

        let candidates = self.select_candidates(base);
        info!(
            model_type = %self.config.model_type,
            candidates = candidates.len(),
            folds = splits.len(),
            "Starting hyperparameter search"
        );

        let scored: Vec<CandidateScore> = candidates
            .into_par_iter()
            .map(|params| {
                let scores = splits
                    .iter()
                    .map(|split| {
                        let x_train = x.select(Axis(0), &split.train_indices);
                        let y_train = y.select(Axis(0), &split.train_indices);
                        let x_test = x.select(Axis(0), &split.test_indices);
                        let y_test = y.select(Axis(0), &split.test_indices);

                        let mut model =
                            ChurnModel::create(self.config.model_type, params.clone(), self.seed)?;
                        model.fit(&x_train, &y_train)?;
                        let proba = model.predict_probability(&x_test)?;
                        let pred = proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 });
                        Ok(ClassificationMetrics::compute(&y_test, &pred, &proba)?.f1)
                    })
                    .collect::<Result<Vec<f64>>>()?;
                let cv = CVResults::from_scores(scores);
                debug!(?params, mean_f1 = cv.mean_score, "Scored candidate");
                Ok(CandidateScore { params, cv })
            })
            .collect::<Result<Vec<_>>>()?;

        let best = scored
            .iter()
            .enumerate()
            .fold(None::<(usize, f64)>, |best, (i, c)| match best {
                Some((_, score)) if c.cv.mean_score <= score => best,
                _ => Some((i, c.cv.mean_score)),
            })
            .map(|(i, _)| i)
            .ok_or_else(|| ChurnError::Config("search produced no candidates".to_string()))?;

        let result = SearchResult {
            model_type: self.config.model_type,
            best_params: scored[best].params.clone(),
            best_score: scored[best].cv.mean_score,
            candidates: scored,
        };
        info!(
            best_score = result.best_score,
            elapsed_ms = timer.elapsed_ms(),
            "Hyperparameter search finished"
        );
        Ok(result)
    }
}
