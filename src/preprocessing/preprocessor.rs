//! Preprocessor artifact paired with a trained model

use super::pipeline::PipelineState;
use super::scaler::{Scaler, ScalerType};
use crate::error::{ChurnError, Result};
use crate::utils::frame::columns_to_array2;
use crate::utils::sha256_hex;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Everything needed to turn raw or encoded rows into a model-ready matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturePreprocessor {
    pipeline: PipelineState,
    scaler: Scaler,
    feature_names: Vec<String>,
    /// Compatibility tag shared with the model artifact
    tag: String,
}

impl FeaturePreprocessor {
    /// Fit the scaler on the encoded training frame and derive the tag
    pub fn fit(pipeline: PipelineState, train: &DataFrame, scaler_type: ScalerType) -> Result<Self> {
        let feature_names = pipeline.feature_columns.clone();
        let mut scaler = Scaler::new(scaler_type);
        scaler.fit(train, &feature_names)?;

        let tag = Self::compute_tag(&pipeline, &scaler, &feature_names)?;
        debug!(features = feature_names.len(), tag = %tag, "Fitted preprocessor");
        Ok(Self {
            pipeline,
            scaler,
            feature_names,
            tag,
        })
    }

    fn compute_tag(pipeline: &PipelineState, scaler: &Scaler, feature_names: &[String]) -> Result<String> {
        let content = serde_json::to_vec(&(pipeline, scaler, feature_names))?;
        Ok(sha256_hex(&content))
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn pipeline(&self) -> &PipelineState {
        &self.pipeline
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    /// Scale an already-encoded frame (a processed split) into a matrix
    pub fn transform_encoded(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let scaled = self.scaler.transform(df)?;
        columns_to_array2(&scaled, &self.feature_names)
    }

    /// Clean, derive, encode and scale raw rows
    pub fn transform_raw(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let encoded = self.pipeline.transform(df)?;
        self.transform_encoded(&encoded)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load and verify that the stored tag still matches the content
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ChurnError::Data(format!("failed to read {}: {}", path.display(), e))
        })?;
        let preprocessor: Self = serde_json::from_str(&json)?;

        let expected = Self::compute_tag(
            &preprocessor.pipeline,
            &preprocessor.scaler,
            &preprocessor.feature_names,
        )?;
        if expected != preprocessor.tag {
            return Err(ChurnError::Serialization(format!(
                "preprocessor at {} was modified after training",
                path.display()
            )));
        }
        Ok(preprocessor)
    }
}
