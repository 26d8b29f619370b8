//! Data pipeline configuration

use super::encoder::{EncoderConfig, EncoderType, VocabularyPolicy};
use super::features::FeatureConfig;
use super::normalizer::{ImputeStrategy, NormalizerConfig};
use super::splitter::SplitConfig;
use super::validation::TELCO_COLUMNS;
use crate::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the data pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Label column
    pub target_column: String,

    /// Label value encoded as 1
    pub positive_label: String,

    /// Columns the raw file must carry
    pub expected_columns: Vec<String>,

    /// Type coercion and missing values
    pub normalizer: NormalizerConfig,

    /// Derived feature toggles
    pub features: FeatureConfig,

    /// Categorical encoding
    pub encoder: EncoderConfig,

    /// Split proportions
    pub split: SplitConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_column: "Churn".to_string(),
            positive_label: "Yes".to_string(),
            expected_columns: TELCO_COLUMNS.iter().map(|c| c.to_string()).collect(),
            normalizer: NormalizerConfig::default(),
            features: FeatureConfig::default(),
            encoder: EncoderConfig::default(),
            split: SplitConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the expected raw columns
    pub fn with_expected_columns(mut self, columns: Vec<String>) -> Self {
        self.expected_columns = columns;
        self
    }

    /// Builder method to set the impute strategy
    pub fn with_impute(mut self, strategy: ImputeStrategy) -> Self {
        self.normalizer.impute = strategy;
        self
    }

    /// Builder method to set encoder type
    pub fn with_encoder(mut self, encoder_type: EncoderType) -> Self {
        self.encoder.encoder_type = encoder_type;
        self
    }

    /// Builder method to set the vocabulary policy
    pub fn with_vocabulary(mut self, policy: VocabularyPolicy) -> Self {
        self.encoder.vocabulary = policy;
        self
    }

    /// Builder method to set split proportions
    pub fn with_split(mut self, split: SplitConfig) -> Self {
        self.split = split;
        self
    }

    /// Builder method to set feature toggles
    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_column.is_empty() {
            return Err(ChurnError::Config("target_column must not be empty".to_string()));
        }
        if self.positive_label.is_empty() {
            return Err(ChurnError::Config("positive_label must not be empty".to_string()));
        }
        self.normalizer.validate()?;
        self.split.validate()
    }
}
