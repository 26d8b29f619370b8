//! Integration test: training, artifacts, tracking and search

mod common;

use churn_mlops::error::{ChurnError, Result};
use churn_mlops::inference::ChurnPredictor;
use churn_mlops::preprocessing::{
    FeaturePreprocessor, PipelineState, ProcessedPaths, ScalerType,
};
use churn_mlops::tracking::{ExperimentTracker, RunRecorder, RunStatus};
use churn_mlops::training::{
    load_report, ArtifactPaths, ChurnModel, Hyperparameters, ModelType, ParamGrid, SearchMethod,
    Trainer, TrainingConfig, TrainingStage, TuningConfig, TOP_FEATURES,
};
use churn_mlops::utils::{target_array, DataLoader};
use std::path::Path;

fn encoded_test_matrix(processed: &Path, models: &Path) -> ndarray::Array2<f64> {
    let pre = FeaturePreprocessor::load(ArtifactPaths::in_dir(models).preprocessor).unwrap();
    let test = DataLoader::new()
        .load_csv(ProcessedPaths::in_dir(processed).test)
        .unwrap();
    pre.transform_encoded(&test).unwrap()
}

#[test]
fn test_every_family_trains_and_stays_in_unit_interval() {
    for model_type in ModelType::ALL {
        let dir = tempfile::tempdir().unwrap();
        let ws = common::build_workspace(dir.path(), model_type, 42);

        let artifacts = ArtifactPaths::in_dir(&ws.models);
        assert!(artifacts.model.exists());
        assert!(artifacts.preprocessor.exists());
        assert!(artifacts.metrics.exists());

        let model = ChurnModel::load(&artifacts.model).unwrap();
        assert_eq!(model.model_type(), model_type);
        let proba = model
            .predict_probability(&encoded_test_matrix(&ws.processed, &ws.models))
            .unwrap();
        assert!(!proba.is_empty());
        assert!(
            proba.iter().all(|p| (0.0..=1.0).contains(p)),
            "{} produced an out-of-range probability",
            model_type
        );
    }
}

#[test]
fn test_metrics_report_keys() {
    let dir = tempfile::tempdir().unwrap();
    let ws = common::build_workspace(dir.path(), ModelType::RandomForest, 42);

    let report = load_report(ArtifactPaths::in_dir(&ws.models).metrics).unwrap();
    for split in ["train", "val"] {
        for metric in ["accuracy", "precision", "recall", "f1", "auc"] {
            let key = format!("{}_{}", split, metric);
            let value = report.metrics.get(&key).copied();
            assert!(value.is_some(), "missing {}", key);
            assert!((0.0..=1.0).contains(&value.unwrap_or(-1.0)));
        }
    }
    assert_eq!(report.tag, ws.report.tag);
    assert_eq!(report.params.get("n_estimators").map(String::as_str), Some("15"));
    assert_eq!(report.tracking_failures, 0);

    assert!(!report.top_features.is_empty());
    assert!(report.top_features.len() <= TOP_FEATURES);
    assert!(report
        .top_features
        .windows(2)
        .all(|pair| pair[0].1 >= pair[1].1));
    let state = PipelineState::load(ProcessedPaths::in_dir(&ws.processed).state).unwrap();
    assert!(report
        .top_features
        .iter()
        .all(|(name, _)| state.feature_columns.contains(name)));
}

#[test]
fn test_save_load_preserves_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let ws = common::build_workspace(dir.path(), ModelType::GradientBoosting, 42);

    let paths = ProcessedPaths::in_dir(&ws.processed);
    let train = DataLoader::new().load_csv(&paths.train).unwrap();
    let state = PipelineState::load(&paths.state).unwrap();
    let y = target_array(&train, &state.target_column).unwrap();
    let pre = FeaturePreprocessor::fit(state, &train, ScalerType::Standard).unwrap();
    let x = pre.transform_encoded(&train).unwrap();

    let mut model =
        ChurnModel::create(ModelType::GradientBoosting, common::small_params(), 3).unwrap();
    model.fit(&x, &y).unwrap();

    let path = dir.path().join("roundtrip.json");
    model.save(&path).unwrap();
    let loaded = ChurnModel::load(&path).unwrap();

    assert_eq!(model.predict(&x).unwrap(), loaded.predict(&x).unwrap());
    assert_eq!(
        model.predict_probability(&x).unwrap(),
        loaded.predict_probability(&x).unwrap()
    );
}

/// Recorder whose every call fails
struct FailingRecorder {
    calls: usize,
}

impl RunRecorder for FailingRecorder {
    fn log_params(&mut self, _params: &[(String, String)]) -> Result<()> {
        self.calls += 1;
        Err(ChurnError::Tracking("backend unreachable".to_string()))
    }

    fn log_metrics(&mut self, _metrics: &[(String, f64)]) -> Result<()> {
        self.calls += 1;
        Err(ChurnError::Tracking("backend unreachable".to_string()))
    }

    fn log_artifact(&mut self, _path: &Path) -> Result<()> {
        self.calls += 1;
        Err(ChurnError::Tracking("backend unreachable".to_string()))
    }
}

#[test]
fn test_failing_tracker_still_persists_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let ws = common::build_workspace(dir.path(), ModelType::LogisticRegression, 42);
    let out = dir.path().join("tracked_models");

    let mut recorder = FailingRecorder { calls: 0 };
    let mut trainer = Trainer::new(TrainingConfig::new(ModelType::LogisticRegression), 42).unwrap();
    let report = trainer
        .train(&ws.processed, &out, Some(&mut recorder))
        .unwrap();

    assert_eq!(trainer.stage(), TrainingStage::Persisted);
    assert_eq!(recorder.calls, 5);
    assert_eq!(report.tracking_failures, 5);
    assert!(ChurnPredictor::from_dir(&out).is_ok());
}

#[test]
fn test_tracking_session_records_run() {
    let dir = tempfile::tempdir().unwrap();
    let ws = common::build_workspace(dir.path(), ModelType::RandomForest, 42);
    let tracking_dir = dir.path().join("mlruns");
    let out = dir.path().join("tracked_models");

    let mut tracker = ExperimentTracker::local(&tracking_dir).unwrap();
    let mut session = tracker.start_run("telco_churn", "rf_baseline");
    let config = TrainingConfig::new(ModelType::RandomForest).with_params(common::small_params());
    Trainer::new(config, 42)
        .unwrap()
        .train(&ws.processed, &out, Some(&mut session))
        .unwrap();
    let run = session.finish().unwrap();

    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.params.get("n_estimators").map(String::as_str), Some("15"));
    assert!(run.metrics.contains_key("val_f1"));
    assert!(run.metrics.contains_key("train_auc"));
    assert_eq!(run.artifacts.len(), 3);

    let reopened = ExperimentTracker::local(&tracking_dir).unwrap();
    let stored = reopened.find_run(&run.run_id).unwrap();
    assert_eq!(stored.status, RunStatus::Finished);
    assert_eq!(reopened.experiment("telco_churn").map(|e| e.runs.len()), Some(1));
}

#[test]
fn test_two_runs_in_one_process_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let ws = common::build_workspace(dir.path(), ModelType::LogisticRegression, 42);
    let mut tracker = ExperimentTracker::local(dir.path().join("mlruns")).unwrap();

    let mut ids = Vec::new();
    for name in ["first", "second"] {
        let mut session = tracker.start_run("telco_churn", name);
        Trainer::new(TrainingConfig::new(ModelType::LogisticRegression), 42)
            .unwrap()
            .train(&ws.processed, dir.path().join(name), Some(&mut session))
            .unwrap();
        ids.push(session.finish().unwrap().run_id);
    }

    assert_ne!(ids[0], ids[1]);
    let experiment = tracker.experiment("telco_churn").unwrap();
    assert_eq!(experiment.runs.len(), 2);
    assert!(experiment.runs.iter().all(|r| r.status == RunStatus::Finished));
}

#[test]
fn test_mismatched_artifacts_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let ws = common::build_workspace(dir.path(), ModelType::RandomForest, 42);
    let other = dir.path().join("minmax_models");
    Trainer::new(
        TrainingConfig::new(ModelType::RandomForest)
            .with_params(common::small_params())
            .with_scaler(ScalerType::MinMax),
        42,
    )
    .unwrap()
    .train(&ws.processed, &other, None)
    .unwrap();

    let result = ChurnPredictor::load(
        ArtifactPaths::in_dir(&ws.models).model,
        ArtifactPaths::in_dir(&other).preprocessor,
    );
    assert!(matches!(result, Err(ChurnError::ArtifactMismatch { .. })));
}

#[test]
fn test_invalid_config_rejected_before_reading_data() {
    let params = Hyperparameters::default().with_n_estimators(0);
    let result = Trainer::new(TrainingConfig::new(ModelType::RandomForest).with_params(params), 42);
    assert!(matches!(result, Err(ChurnError::Config(_))));

    assert!(matches!(
        "svm".parse::<ModelType>(),
        Err(ChurnError::Config(_))
    ));
}

#[test]
fn test_missing_processed_data() {
    let dir = tempfile::tempdir().unwrap();
    let mut trainer = Trainer::new(TrainingConfig::default(), 42).unwrap();
    let result = trainer.train(dir.path().join("nothing"), dir.path().join("models"), None);
    assert!(matches!(result, Err(ChurnError::Data(_))));
    assert!(!ArtifactPaths::in_dir(dir.path().join("models")).model.exists());
}

#[test]
fn test_hyperparameter_search_over_processed_split() {
    let dir = tempfile::tempdir().unwrap();
    let ws = common::build_workspace(dir.path(), ModelType::RandomForest, 42);

    let grid = ParamGrid {
        n_estimators: vec![5, 10],
        max_depth: vec![3],
        min_samples_split: vec![2, 4],
        min_samples_leaf: vec![1],
        c: vec![1.0],
    };
    let tuning = TuningConfig::default().with_grid(grid).with_cv_folds(3);
    let trainer = Trainer::new(TrainingConfig::default(), 42).unwrap();

    let result = trainer.search(&ws.processed, &tuning).unwrap();
    assert_eq!(result.candidates.len(), 4);
    let best = result
        .candidates
        .iter()
        .map(|c| c.cv.mean_score)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(result.best_score, best);
    assert!((0.0..=1.0).contains(&result.best_score));

    let random = tuning.with_method(SearchMethod::Random { n_iter: 2 });
    let sampled = trainer.search(&ws.processed, &random).unwrap();
    assert_eq!(sampled.candidates.len(), 2);
    let again = trainer.search(&ws.processed, &random).unwrap();
    assert_eq!(sampled.best_params, again.best_params);
}
