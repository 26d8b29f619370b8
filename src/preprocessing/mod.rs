//! Data preprocessing module
//!
//! Stages run in a fixed order:
//! - schema validation
//! - type coercion and missing values ([`Normalizer`])
//! - label encoding ([`TargetEncoder`])
//! - derived features ([`FeatureEngineer`])
//! - seeded splitting ([`Splitter`])
//! - categorical encoding ([`CategoricalEncoder`])
//!
//! [`FeaturePreprocessor`] bundles the fitted stages with a [`Scaler`] for inference.

mod config;
pub mod encoder;
pub mod features;
pub mod normalizer;
mod pipeline;
mod preprocessor;
mod scaler;
pub mod splitter;
pub mod target;
pub mod validation;

pub use config::PipelineConfig;
pub use encoder::{CategoricalEncoder, ColumnVocabulary, EncoderConfig, EncoderType, VocabularyPolicy};
pub use features::{FeatureConfig, FeatureEngineer, TenureBucket};
pub use normalizer::{ImputeStrategy, Normalizer, NormalizerConfig};
pub use pipeline::{
    DataPipeline, PipelineOutput, PipelineState, ProcessedPaths, PIPELINE_STATE_FILE, TEST_FILE,
    TRAIN_FILE, VAL_FILE,
};
pub use preprocessor::FeaturePreprocessor;
pub use scaler::{Scaler, ScalerType};
pub use splitter::{DataSplit, SplitConfig, SplitIndices, Splitter};
pub use target::TargetEncoder;
pub use validation::{SchemaValidator, TELCO_COLUMNS};
