//! Data preprocessing pipeline

use super::config::PipelineConfig;
use super::encoder::{CategoricalEncoder, VocabularyPolicy};
use super::features::FeatureEngineer;
use super::normalizer::Normalizer;
use super::splitter::{DataSplit, Splitter};
use super::target::TargetEncoder;
use super::validation::SchemaValidator;
use crate::error::{ChurnError, Result};
use crate::utils::frame::{column_names, is_numeric_dtype};
use crate::utils::{DataLoader, DataSaver, Timer};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const TRAIN_FILE: &str = "train.csv";
pub const VAL_FILE: &str = "val.csv";
pub const TEST_FILE: &str = "test.csv";
pub const PIPELINE_STATE_FILE: &str = "pipeline_state.json";

/// Fitted transforms of one pipeline run.
///
/// Replays cleaning, feature derivation and encoding on unlabeled rows at
/// inference time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub target_column: String,
    pub positive_label: String,
    pub normalizer: Normalizer,
    pub features: FeatureEngineer,
    pub encoder: CategoricalEncoder,
    /// Encoded feature columns in frame order, target excluded
    pub feature_columns: Vec<String>,
    pub seed: u64,
    pub source_rows: usize,
    pub clean_rows: usize,
}

impl PipelineState {
    /// Apply the fitted transforms to raw rows. The label column may be absent.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let df = self.normalizer.transform(df)?;
        let df = self.features.transform(&df)?;
        let df = self.encoder.transform(&df)?;
        let columns: Vec<&str> = self.feature_columns.iter().map(String::as_str).collect();
        df.select(columns).map_err(|e| ChurnError::Schema(e.to_string()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ChurnError::Data(format!("failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Result of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub split: DataSplit,
    pub state: PipelineState,
}

/// Paths written by [`DataPipeline::save`]
#[derive(Debug, Clone)]
pub struct ProcessedPaths {
    pub train: PathBuf,
    pub val: PathBuf,
    pub test: PathBuf,
    pub state: PathBuf,
}

impl ProcessedPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            train: dir.join(TRAIN_FILE),
            val: dir.join(VAL_FILE),
            test: dir.join(TEST_FILE),
            state: dir.join(PIPELINE_STATE_FILE),
        }
    }
}

/// Runs validation, cleaning, labeling, feature derivation, splitting and encoding
#[derive(Debug, Clone)]
pub struct DataPipeline {
    config: PipelineConfig,
    seed: u64,
}

impl DataPipeline {
    pub fn new(config: PipelineConfig, seed: u64) -> Self {
        Self { config, seed }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage on an in-memory raw frame
    pub fn run(&self, raw: &DataFrame) -> Result<PipelineOutput> {
        self.config.validate()?;
        let timer = Timer::start();
        let target = self.config.target_column.as_str();

        SchemaValidator::new(self.config.expected_columns.clone()).validate(raw)?;

        let mut normalizer = Normalizer::new(self.config.normalizer.clone()).with_excluded(target);
        let df = normalizer.fit_transform(raw)?;

        let df = TargetEncoder::new(target, self.config.positive_label.as_str()).encode(&df)?;

        let features = FeatureEngineer::new(self.config.features.clone());
        let df = features.transform(&df)?;

        let splitter = Splitter::new(self.config.split.clone(), self.seed);
        let mut encoder =
            CategoricalEncoder::new(self.config.encoder.encoder_type).with_excluded(target);

        let split = match self.config.encoder.vocabulary {
            VocabularyPolicy::FitOnFull => {
                let encoded = encoder.fit_transform(&df)?;
                splitter.split(&encoded, target)?
            }
            VocabularyPolicy::FitOnTrain => {
                let raw_split = splitter.split(&df, target)?;
                encoder.fit(&raw_split.train)?;
                DataSplit {
                    train: encoder.transform(&raw_split.train)?,
                    val: encoder.transform(&raw_split.val)?,
                    test: encoder.transform(&raw_split.test)?,
                    indices: raw_split.indices,
                }
            }
        };

        let feature_columns: Vec<String> = column_names(&split.train)
            .into_iter()
            .filter(|c| c != target)
            .collect();
        for name in &feature_columns {
            let dtype = split.train.column(name)?.dtype();
            if !is_numeric_dtype(dtype) {
                return Err(ChurnError::Schema(format!(
                    "column '{}' is still {:?} after encoding",
                    name, dtype
                )));
            }
        }

        info!(
            rows_in = raw.height(),
            rows_clean = df.height(),
            features = feature_columns.len(),
            elapsed_ms = timer.elapsed_ms(),
            "Data pipeline complete"
        );

        let state = PipelineState {
            target_column: target.to_string(),
            positive_label: self.config.positive_label.clone(),
            normalizer,
            features,
            encoder,
            feature_columns,
            seed: self.seed,
            source_rows: raw.height(),
            clean_rows: df.height(),
        };
        Ok(PipelineOutput { split, state })
    }

    /// Load the raw file (CSV or spreadsheet), run, and persist splits plus
    /// fitted state. Configuration is checked before the file is touched.
    pub fn run_file(
        &self,
        raw_path: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> Result<PipelineOutput> {
        self.config.validate()?;
        let raw = DataLoader::new().load_required(raw_path, "Raw data")?;
        let mut output = self.run(&raw)?;
        Self::save(&mut output, output_dir)?;
        Ok(output)
    }

    /// Write the three split files and the pipeline state.
    ///
    /// Nothing is written until every stage has succeeded.
    pub fn save(output: &mut PipelineOutput, output_dir: impl AsRef<Path>) -> Result<ProcessedPaths> {
        let paths = ProcessedPaths::in_dir(output_dir.as_ref());
        std::fs::create_dir_all(output_dir.as_ref())?;

        DataSaver::save_csv(&mut output.split.train, &paths.train)?;
        DataSaver::save_csv(&mut output.split.val, &paths.val)?;
        DataSaver::save_csv(&mut output.split.test, &paths.test)?;
        output.state.save(&paths.state)?;

        info!(dir = %output_dir.as_ref().display(), "Saved processed splits");
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::encoder::EncoderType;
    use crate::utils::frame::numeric_values;

    fn small_raw() -> DataFrame {
        let n = 40;
        df!(
            "id" => (0..n).map(|i| format!("c{}", i)).collect::<Vec<_>>(),
            "tenure" => (0..n).map(|i| (i * 2) as i64).collect::<Vec<_>>(),
            "TotalCharges" => (0..n).map(|i| format!("{}.5", i * 30)).collect::<Vec<_>>(),
            "Plan" => (0..n).map(|i| if i % 2 == 0 { "Basic" } else { "Premium" }).collect::<Vec<_>>(),
            "Churn" => (0..n).map(|i| if i % 3 == 0 { "Yes" } else { "No" }).collect::<Vec<_>>()
        )
        .unwrap()
    }

    fn small_config() -> PipelineConfig {
        let mut config = PipelineConfig::default().with_expected_columns(vec![
            "id".to_string(),
            "tenure".to_string(),
            "TotalCharges".to_string(),
            "Plan".to_string(),
            "Churn".to_string(),
        ]);
        config.normalizer.required_columns = vec!["tenure".to_string(), "TotalCharges".to_string()];
        config.normalizer.drop_columns = vec!["id".to_string()];
        config
    }

    #[test]
    fn test_run_produces_numeric_splits() {
        let output = DataPipeline::new(small_config(), 42).run(&small_raw()).unwrap();

        assert_eq!(output.split.indices.total(), 40);
        assert_eq!(
            output.state.feature_columns,
            vec!["tenure", "TotalCharges", "tenure_bin", "avg_monthly_charges", "Plan_Basic", "Plan_Premium"]
        );
        for df in [&output.split.train, &output.split.val, &output.split.test] {
            assert_eq!(df.width(), 7);
            let labels = numeric_values(df, "Churn").unwrap();
            assert!(labels.iter().all(|v| *v == Some(0.0) || *v == Some(1.0)));
        }
    }

    #[test]
    fn test_state_replays_on_unlabeled_rows() {
        let output = DataPipeline::new(small_config(), 42).run(&small_raw()).unwrap();
        let raw = small_raw().drop("Churn").unwrap().head(Some(3));
        let encoded = output.state.transform(&raw).unwrap();

        assert_eq!(column_names(&encoded), output.state.feature_columns);
        assert_eq!(encoded.height(), 3);
    }

    #[test]
    fn test_label_encoding_mode() {
        let config = small_config().with_encoder(EncoderType::Label);
        let output = DataPipeline::new(config, 1).run(&small_raw()).unwrap();
        assert!(output.state.feature_columns.contains(&"Plan".to_string()));
    }

    #[test]
    fn test_schema_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let raw = small_raw().drop("Plan").unwrap();
        let raw_path = dir.path().join("raw.csv");
        DataSaver::save_csv(&mut raw.clone(), &raw_path).unwrap();

        let out_dir = dir.path().join("processed");
        let result = DataPipeline::new(small_config(), 42).run_file(&raw_path, &out_dir);
        assert!(matches!(result, Err(ChurnError::Schema(_))));
        assert!(!out_dir.exists());
    }
}
