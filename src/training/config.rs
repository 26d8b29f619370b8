//! Training configuration

use super::model::{Hyperparameters, ModelType};
use crate::error::Result;
use crate::preprocessing::ScalerType;
use serde::{Deserialize, Serialize};

/// Model family, its hyperparameters and the feature scaling applied before fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    pub model_type: ModelType,
    #[serde(alias = "model_params")]
    pub params: Hyperparameters,
    pub scaler: ScalerType,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_type: ModelType::RandomForest,
            params: Hyperparameters::default(),
            scaler: ScalerType::Standard,
        }
    }
}

impl TrainingConfig {
    pub fn new(model_type: ModelType) -> Self {
        Self {
            model_type,
            ..Default::default()
        }
    }

    pub fn with_params(mut self, params: Hyperparameters) -> Self {
        self.params = params;
        self
    }

    pub fn with_scaler(mut self, scaler: ScalerType) -> Self {
        self.scaler = scaler;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.params.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_with_source_key() {
        let yaml = "model_type: gradient_boosting\nmodel_params:\n  n_estimators: 50\n  max_depth: 3\n";
        let config: TrainingConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.model_type, ModelType::GradientBoosting);
        assert_eq!(config.params.n_estimators, 50);
        assert_eq!(config.params.max_depth, Some(3));
        assert_eq!(config.params.min_samples_split, 2);
        assert_eq!(config.scaler, ScalerType::Standard);
    }

    #[test]
    fn test_unknown_model_type_rejected() {
        let yaml = "model_type: svm\n";
        assert!(serde_yaml::from_str::<TrainingConfig>(yaml).is_err());
    }
}
