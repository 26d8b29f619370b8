//! Derived feature columns

use crate::error::{ChurnError, Result};
use crate::utils::frame::numeric_values;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

pub const TENURE_BIN_COLUMN: &str = "tenure_bin";
pub const AVG_MONTHLY_CHARGES_COLUMN: &str = "avg_monthly_charges";

/// Tenure range in months
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TenureBucket {
    UpToOneYear,
    OneToTwoYears,
    TwoToFourYears,
    OverFourYears,
}

impl TenureBucket {
    pub const ALL: [TenureBucket; 4] = [
        TenureBucket::UpToOneYear,
        TenureBucket::OneToTwoYears,
        TenureBucket::TwoToFourYears,
        TenureBucket::OverFourYears,
    ];

    /// Bucket for a tenure in months. Zero tenure lands in the first bucket.
    pub fn from_tenure(months: f64) -> Self {
        if months <= 12.0 {
            TenureBucket::UpToOneYear
        } else if months <= 24.0 {
            TenureBucket::OneToTwoYears
        } else if months <= 48.0 {
            TenureBucket::TwoToFourYears
        } else {
            TenureBucket::OverFourYears
        }
    }

    pub fn ordinal(self) -> i32 {
        self as i32
    }

    pub fn label(self) -> &'static str {
        match self {
            TenureBucket::UpToOneYear => "0-1yr",
            TenureBucket::OneToTwoYears => "1-2yr",
            TenureBucket::TwoToFourYears => "2-4yr",
            TenureBucket::OverFourYears => "4+yr",
        }
    }
}

/// Feature toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureConfig {
    pub tenure_bins: bool,
    pub avg_monthly_charges: bool,
    pub tenure_column: String,
    pub total_charges_column: String,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            tenure_bins: true,
            avg_monthly_charges: true,
            tenure_column: "tenure".to_string(),
            total_charges_column: "TotalCharges".to_string(),
        }
    }
}

impl FeatureConfig {
    pub fn with_tenure_bins(mut self, enabled: bool) -> Self {
        self.tenure_bins = enabled;
        self
    }

    pub fn with_avg_monthly_charges(mut self, enabled: bool) -> Self {
        self.avg_monthly_charges = enabled;
        self
    }
}

/// Derives columns from numeric inputs only. Re-running overwrites.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureEngineer {
    config: FeatureConfig,
}

impl FeatureEngineer {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Names of the columns this engineer produces
    pub fn derived_columns(&self) -> Vec<&'static str> {
        let mut cols = Vec::new();
        if self.config.tenure_bins {
            cols.push(TENURE_BIN_COLUMN);
        }
        if self.config.avg_monthly_charges {
            cols.push(AVG_MONTHLY_CHARGES_COLUMN);
        }
        cols
    }

    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        if !self.config.tenure_bins && !self.config.avg_monthly_charges {
            return Ok(out);
        }

        let tenure = self.complete_column(df, &self.config.tenure_column)?;

        if self.config.tenure_bins {
            let bins: Vec<i32> = tenure
                .iter()
                .map(|&t| TenureBucket::from_tenure(t).ordinal())
                .collect();
            out.with_column(Series::new(TENURE_BIN_COLUMN.into(), bins))?;
        }

        if self.config.avg_monthly_charges {
            let total = self.complete_column(df, &self.config.total_charges_column)?;
            let avg: Vec<f64> = total
                .iter()
                .zip(tenure.iter())
                .map(|(total, tenure)| total / (tenure + 1.0))
                .collect();
            out.with_column(Series::new(AVG_MONTHLY_CHARGES_COLUMN.into(), avg))?;
        }

        Ok(out)
    }

    fn complete_column(&self, df: &DataFrame, name: &str) -> Result<Vec<f64>> {
        numeric_values(df, name)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.ok_or_else(|| {
                    ChurnError::DataIntegrity(format!(
                        "column '{}' is missing at row {}",
                        name, row
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df!(
            "tenure" => &[0i64, 1, 12, 13, 24, 48, 49, 72],
            "TotalCharges" => &[0.0, 29.85, 130.0, 280.0, 500.0, 4900.0, 5000.0, 7300.0]
        )
        .unwrap()
    }

    #[test]
    fn test_tenure_bins() {
        let out = FeatureEngineer::default().transform(&frame()).unwrap();
        let bins = numeric_values(&out, TENURE_BIN_COLUMN).unwrap();
        let bins: Vec<f64> = bins.into_iter().flatten().collect();
        assert_eq!(bins, vec![0.0, 0.0, 0.0, 1.0, 1.0, 2.0, 3.0, 3.0]);
        assert_eq!(out.column(TENURE_BIN_COLUMN).unwrap().dtype(), &DataType::Int32);
    }

    #[test]
    fn test_avg_monthly_charges() {
        let out = FeatureEngineer::default().transform(&frame()).unwrap();
        let avg = numeric_values(&out, AVG_MONTHLY_CHARGES_COLUMN).unwrap();
        assert_eq!(avg[1], Some(29.85 / 2.0));
        assert_eq!(avg[0], Some(0.0));
    }

    #[test]
    fn test_idempotent() {
        let engineer = FeatureEngineer::default();
        let once = engineer.transform(&frame()).unwrap();
        let twice = engineer.transform(&once).unwrap();

        assert_eq!(once.width(), twice.width());
        assert!(once.equals(&twice));
    }

    #[test]
    fn test_toggles() {
        let engineer = FeatureEngineer::new(
            FeatureConfig::default().with_avg_monthly_charges(false),
        );
        let out = engineer.transform(&frame()).unwrap();
        assert!(out.column(TENURE_BIN_COLUMN).is_ok());
        assert!(out.column(AVG_MONTHLY_CHARGES_COLUMN).is_err());
        assert_eq!(engineer.derived_columns(), vec![TENURE_BIN_COLUMN]);
    }

    #[test]
    fn test_missing_source_column() {
        let df = df!("TotalCharges" => &[1.0]).unwrap();
        assert!(matches!(
            FeatureEngineer::default().transform(&df),
            Err(ChurnError::Schema(_))
        ));
    }

    #[test]
    fn test_bucket_labels() {
        assert_eq!(TenureBucket::from_tenure(1.0).label(), "0-1yr");
        assert_eq!(TenureBucket::ALL[3].label(), "4+yr");
    }
}
