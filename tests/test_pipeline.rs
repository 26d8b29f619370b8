//! Integration test: raw CSV through the data pipeline

mod common;

use churn_mlops::config::AppConfig;
use churn_mlops::error::ChurnError;
use churn_mlops::preprocessing::{
    DataPipeline, FeatureConfig, FeatureEngineer, ImputeStrategy, Normalizer, NormalizerConfig,
    PipelineConfig, PipelineState, ProcessedPaths, SplitConfig, TenureBucket,
};
use churn_mlops::utils::{column_names, numeric_values, text_values, DataLoader};
use std::collections::HashSet;

fn run_default(n: usize) -> (polars::prelude::DataFrame, churn_mlops::preprocessing::PipelineOutput) {
    let raw = common::telco_frame(n, 11, &[]);
    let output = DataPipeline::new(PipelineConfig::default(), 42).run(&raw).unwrap();
    (raw, output)
}

#[test]
fn test_split_is_disjoint_and_covers_source() {
    let (raw, output) = run_default(250);
    let idx = &output.split.indices;

    let mut seen = HashSet::new();
    for i in idx.train.iter().chain(&idx.val).chain(&idx.test) {
        assert!(seen.insert(*i), "row {} assigned twice", i);
    }
    assert_eq!(seen.len(), raw.height());
    assert!(seen.iter().all(|i| *i < raw.height()));

    let split = &output.split;
    assert_eq!(split.train.height() + split.val.height() + split.test.height(), raw.height());
}

#[test]
fn test_split_proportions_within_rounding() {
    let (raw, output) = run_default(250);
    let n = raw.height() as f64;
    let config = SplitConfig::default();

    let val_frac = output.split.val.height() as f64 / n;
    let test_frac = output.split.test.height() as f64 / n;
    assert!((val_frac - config.val_size).abs() < 1.0 / n);
    assert!((test_frac - config.test_size).abs() < 1.0 / n);
}

#[test]
fn test_label_is_binary_and_matches_positive_value() {
    let (raw, output) = run_default(200);
    let labels = text_values(&raw, "Churn").unwrap();
    let split = &output.split;

    for (frame, rows) in [
        (&split.train, &split.indices.train),
        (&split.val, &split.indices.val),
        (&split.test, &split.indices.test),
    ] {
        let encoded = numeric_values(frame, "Churn").unwrap();
        for (value, src) in encoded.iter().zip(rows.iter()) {
            let value = value.unwrap();
            assert!(value == 0.0 || value == 1.0);
            let expected = if labels[*src].as_deref() == Some("Yes") { 1.0 } else { 0.0 };
            assert_eq!(value, expected);
        }
    }
}

#[test]
fn test_one_hot_decodes_to_original_category() {
    let (raw, output) = run_default(200);
    let contracts = text_values(&raw, "Contract").unwrap();
    let vocab = output
        .state
        .encoder
        .vocabularies()
        .iter()
        .find(|v| v.column == "Contract")
        .unwrap()
        .clone();

    let test = &output.split.test;
    let indicators: Vec<(String, Vec<Option<f64>>)> = vocab
        .categories
        .iter()
        .map(|c| (c.clone(), numeric_values(test, &vocab.indicator_name(c)).unwrap()))
        .collect();

    for (row, src) in output.split.indices.test.iter().enumerate() {
        let hot: Vec<&String> = indicators
            .iter()
            .filter(|(_, values)| values[row] == Some(1.0))
            .map(|(category, _)| category)
            .collect();
        assert_eq!(hot.len(), 1, "row {} should have exactly one indicator set", row);
        assert_eq!(Some(hot[0].as_str()), contracts[*src].as_deref());
    }
}

#[test]
fn test_scenario_row() {
    let (_, output) = run_default(200);
    let split = &output.split;

    let (frame, pos) = [
        (&split.train, &split.indices.train),
        (&split.val, &split.indices.val),
        (&split.test, &split.indices.test),
    ]
    .into_iter()
    .find_map(|(frame, rows)| rows.iter().position(|&i| i == 0).map(|pos| (frame, pos)))
    .unwrap();

    assert_eq!(numeric_values(frame, "Churn").unwrap()[pos], Some(1.0));
    assert_eq!(
        numeric_values(frame, "tenure_bin").unwrap()[pos],
        Some(f64::from(TenureBucket::UpToOneYear.ordinal()))
    );

    let contract_columns: Vec<String> = column_names(frame)
        .into_iter()
        .filter(|c| c.starts_with("Contract_"))
        .collect();
    assert_eq!(contract_columns.len(), 3);
    for column in contract_columns {
        let expected = if column == "Contract_Month-to-month" { 1.0 } else { 0.0 };
        assert_eq!(numeric_values(frame, &column).unwrap()[pos], Some(expected), "{}", column);
    }
}

#[test]
fn test_feature_engineering_is_idempotent() {
    let raw = common::telco_frame(60, 3, &[5]);
    let mut normalizer = Normalizer::new(NormalizerConfig::default()).with_excluded("Churn");
    let clean = normalizer.fit_transform(&raw).unwrap();

    let engineer = FeatureEngineer::new(FeatureConfig::default());
    let once = engineer.transform(&clean).unwrap();
    let twice = engineer.transform(&once).unwrap();

    for column in engineer.derived_columns() {
        assert_eq!(
            numeric_values(&once, column).unwrap(),
            numeric_values(&twice, column).unwrap()
        );
    }
    assert_eq!(once.width(), twice.width());
}

#[test]
fn test_blank_total_charges_dropped_by_default() {
    let raw = common::telco_frame(120, 5, &[3, 17, 40]);
    let output = DataPipeline::new(PipelineConfig::default(), 42).run(&raw).unwrap();
    assert_eq!(output.state.source_rows, 120);
    assert_eq!(output.state.clean_rows, 117);
    assert_eq!(output.split.indices.total(), 117);
}

#[test]
fn test_blank_total_charges_imputed_with_median() {
    let raw = common::telco_frame(120, 5, &[3, 17, 40]);
    let config = PipelineConfig::default().with_impute(ImputeStrategy::Median);
    let output = DataPipeline::new(config, 42).run(&raw).unwrap();
    assert_eq!(output.state.clean_rows, 120);
    assert!(output
        .state
        .normalizer
        .fills()
        .iter()
        .any(|(column, _)| column == "TotalCharges"));
}

#[test]
fn test_files_written_and_state_replays() {
    let dir = tempfile::tempdir().unwrap();
    let raw_path = dir.path().join("raw.csv");
    let out_dir = dir.path().join("processed");
    common::write_raw_csv(&common::telco_frame(200, 9, &[12]), &raw_path);

    let output = DataPipeline::new(PipelineConfig::default(), 42)
        .run_file(&raw_path, &out_dir)
        .unwrap();

    let paths = ProcessedPaths::in_dir(&out_dir);
    let loader = DataLoader::new();
    let train = loader.load_csv(&paths.train).unwrap();
    let val = loader.load_csv(&paths.val).unwrap();
    let test = loader.load_csv(&paths.test).unwrap();
    assert_eq!(train.height() + val.height() + test.height(), 199);
    assert_eq!(column_names(&train), column_names(&output.split.train));

    let state = PipelineState::load(&paths.state).unwrap();
    assert_eq!(state.feature_columns, output.state.feature_columns);

    let unlabeled = common::telco_frame(10, 99, &[]).drop("Churn").unwrap();
    let replayed = state.transform(&unlabeled).unwrap();
    assert_eq!(replayed.height(), 10);
    assert_eq!(column_names(&replayed), state.feature_columns);
}

#[test]
fn test_missing_columns_reported_and_nothing_written() {
    let dir = tempfile::tempdir().unwrap();
    let raw_path = dir.path().join("raw.csv");
    let out_dir = dir.path().join("processed");
    let raw = common::telco_frame(50, 1, &[])
        .drop("Contract")
        .unwrap()
        .drop("tenure")
        .unwrap();
    common::write_raw_csv(&raw, &raw_path);

    let err = DataPipeline::new(PipelineConfig::default(), 42)
        .run_file(&raw_path, &out_dir)
        .unwrap_err();
    match err {
        ChurnError::Schema(msg) => {
            assert!(msg.contains("Contract"));
            assert!(msg.contains("tenure"));
        }
        other => panic!("expected schema error, got {:?}", other),
    }
    assert!(!out_dir.exists());
}

#[test]
fn test_missing_raw_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = DataPipeline::new(PipelineConfig::default(), 42)
        .run_file(dir.path().join("absent.csv"), dir.path().join("out"));
    assert!(matches!(result, Err(ChurnError::Data(_))));
}

#[test]
fn test_invalid_config_reported_before_reading_data() {
    let dir = tempfile::tempdir().unwrap();
    let split = SplitConfig {
        val_size: 0.9,
        ..SplitConfig::default()
    };
    let config = PipelineConfig::default().with_split(split);

    let result = DataPipeline::new(config, 42)
        .run_file(dir.path().join("absent.csv"), dir.path().join("out"));
    assert!(matches!(result, Err(ChurnError::Config(_))));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_spreadsheet_input_matches_csv() {
    let dir = tempfile::tempdir().unwrap();
    let raw = common::telco_frame(200, 13, &[6, 44]);
    let csv_path = dir.path().join("raw.csv");
    let xlsx_path = dir.path().join("raw.xlsx");
    common::write_raw_csv(&raw, &csv_path);
    common::write_raw_xlsx(&raw, &xlsx_path);

    let from_csv = DataPipeline::new(PipelineConfig::default(), 42)
        .run_file(&csv_path, dir.path().join("csv"))
        .unwrap();
    let from_xlsx = DataPipeline::new(PipelineConfig::default(), 42)
        .run_file(&xlsx_path, dir.path().join("xlsx"))
        .unwrap();

    assert_eq!(from_xlsx.state.source_rows, 200);
    assert_eq!(from_xlsx.state.clean_rows, 198);
    assert_eq!(from_xlsx.split.indices, from_csv.split.indices);
    assert_eq!(from_xlsx.state.feature_columns, from_csv.state.feature_columns);
    for column in ["tenure", "TotalCharges", "tenure_bin", "Contract_Month-to-month"] {
        assert_eq!(
            numeric_values(&from_xlsx.split.train, column).unwrap(),
            numeric_values(&from_csv.split.train, column).unwrap(),
            "{}",
            column
        );
    }
}

#[test]
fn test_shipped_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/model1.yaml");
    let config = AppConfig::from_file(path).unwrap();
    assert_eq!(config.experiment_name, "telco_churn");
    assert_eq!(config.random_state, 42);
    assert_eq!(config.tuning.grid.len(config.tuning.model_type), 108);
    assert_eq!(config.tuning.grid.c.len(), 4);
}
