//! Feature scaling implementations

use crate::error::{ChurnError, Result};
use crate::utils::frame::numeric_values;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    #[default]
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// No scaling
    None,
}

/// Parameters for one fitted column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    column: String,
    center: f64, // mean or min
    scale: f64,  // std or range
}

/// Feature scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Fit the scaler to the given columns
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.params = columns
            .iter()
            .map(|name| {
                let values: Vec<f64> = numeric_values(df, name)?.into_iter().flatten().collect();
                let (center, scale) = self.compute_params(&values);
                Ok(ScalerParams {
                    column: name.clone(),
                    center,
                    scale,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data. Fitted columns must be present; they come back as `Float64`.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ChurnError::NotFitted);
        }

        let replacements: Vec<Series> = self
            .params
            .iter()
            .map(|p| {
                let scaled: Vec<Option<f64>> = numeric_values(df, &p.column)?
                    .into_iter()
                    .map(|v| v.map(|x| (x - p.center) / p.scale))
                    .collect();
                Ok(Series::new(p.column.as_str().into(), scaled))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result.with_column(scaled)?;
        }
        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Undo the scaling of one value for a fitted column
    pub fn inverse_value(&self, column: &str, value: f64) -> Option<f64> {
        self.params
            .iter()
            .find(|p| p.column == column)
            .map(|p| value * p.scale + p.center)
    }

    fn compute_params(&self, values: &[f64]) -> (f64, f64) {
        if values.is_empty() {
            return (0.0, 1.0);
        }
        match self.scaler_type {
            ScalerType::Standard => {
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let std = if values.len() > 1 {
                    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
                } else {
                    0.0
                };
                (mean, if std == 0.0 { 1.0 } else { std })
            }
            ScalerType::MinMax => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                (min, if range == 0.0 { 1.0 } else { range })
            }
            ScalerType::None => (0.0, 1.0),
        }
    }
}
