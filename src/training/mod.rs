//! Model training module
//!
//! Three classifier families sit behind [`ChurnModel`]:
//! - Random Forest (bagged CART trees)
//! - Gradient Boosting (log-loss boosting on regression trees)
//! - Logistic Regression (L2-regularized)
//!
//! [`Trainer`] fits one of them on the processed splits and persists the
//! model together with its [`FeaturePreprocessor`](crate::preprocessing::FeaturePreprocessor).

mod config;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod logistic;
pub mod metrics;
pub mod model;
pub mod random_forest;
mod trainer;
pub mod tuning;

pub use config::TrainingConfig;
pub use cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use logistic::LogisticRegression;
pub use metrics::{roc_auc, ClassificationMetrics};
pub use model::{ChurnModel, Estimator, Hyperparameters, ModelType};
pub use random_forest::{MaxFeatures, RandomForest};
pub use trainer::{
    load_report, ArtifactPaths, Trainer, TrainingReport, TrainingStage, METRICS_FILE, MODEL_FILE,
    PREPROCESSOR_FILE, TOP_FEATURES,
};
pub use tuning::{
    CandidateScore, HyperparameterSearch, ParamGrid, SearchMethod, SearchResult, TuningConfig,
};
