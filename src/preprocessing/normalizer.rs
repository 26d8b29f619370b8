//! Type coercion and missing-value handling

use crate::error::{ChurnError, Result};
use crate::utils::frame::{column_names, is_numeric_dtype, numeric_values, text_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How missing values are resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ImputeStrategy {
    /// Drop any row holding a missing value
    Drop,
    /// Fill numeric columns with the column mean
    Mean,
    /// Fill numeric columns with the column median
    Median,
    /// Fill numeric columns with a fixed value
    Constant { value: f64 },
}

impl Default for ImputeStrategy {
    fn default() -> Self {
        ImputeStrategy::Drop
    }
}

/// Configuration for the normalizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizerConfig {
    /// Columns stored as text that hold numbers
    pub numeric_columns: Vec<String>,
    /// Numeric columns that must be present
    pub required_columns: Vec<String>,
    /// Missing-value strategy
    pub impute: ImputeStrategy,
    /// Tolerated share of unconvertible values per numeric column
    pub max_invalid_fraction: f64,
    /// Identifier columns removed up front
    pub drop_columns: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            numeric_columns: vec!["TotalCharges".to_string()],
            required_columns: vec![
                "tenure".to_string(),
                "MonthlyCharges".to_string(),
                "TotalCharges".to_string(),
            ],
            impute: ImputeStrategy::Drop,
            max_invalid_fraction: 0.05,
            drop_columns: vec!["customerID".to_string()],
        }
    }
}

impl NormalizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the impute strategy
    pub fn with_impute(mut self, impute: ImputeStrategy) -> Self {
        self.impute = impute;
        self
    }

    /// Builder method to set the invalid-value tolerance
    pub fn with_max_invalid_fraction(mut self, fraction: f64) -> Self {
        self.max_invalid_fraction = fraction;
        self
    }

    /// Builder method to set the text-to-numeric columns
    pub fn with_numeric_columns(mut self, columns: Vec<String>) -> Self {
        self.numeric_columns = columns;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.max_invalid_fraction) {
            return Err(ChurnError::Config(format!(
                "max_invalid_fraction must be in [0, 1], got {}",
                self.max_invalid_fraction
            )));
        }
        if let ImputeStrategy::Constant { value } = self.impute {
            if !value.is_finite() {
                return Err(ChurnError::Config(
                    "constant impute value must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Learned fill for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Number(f64),
    Text(String),
}

/// Coerces textual numbers and resolves missing values.
///
/// `fit_transform` learns per-column fills; `transform` replays them on new
/// rows and never drops rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Normalizer {
    config: NormalizerConfig,
    /// Columns never touched (the label)
    exclude: Vec<String>,
    fills: Vec<(String, FillValue)>,
    is_fitted: bool,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            config,
            exclude: Vec::new(),
            fills: Vec::new(),
            is_fitted: false,
        }
    }

    /// Leave a column untouched (typically the target)
    pub fn with_excluded(mut self, column: impl Into<String>) -> Self {
        self.exclude.push(column.into());
        self
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    pub fn fills(&self) -> &[(String, FillValue)] {
        &self.fills
    }

    /// Normalize a training frame, learning fill values
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.check_columns(df)?;
        let n_rows = df.height();
        let mut out = self.drop_identifiers(df)?;
        self.coerce_numeric(&mut out, true)?;

        self.fills.clear();
        if self.config.impute == ImputeStrategy::Drop {
            let out = drop_incomplete_rows(&out, &self.exclude)?;
            info!(
                rows_in = n_rows,
                rows_out = out.height(),
                "Dropped rows with missing values"
            );
            self.is_fitted = true;
            return Ok(out);
        }

        for name in column_names(&out) {
            if self.exclude.contains(&name) {
                continue;
            }
            let fill = self.learn_fill(&out, &name)?;
            if let Some(fill) = fill {
                self.fills.push((name, fill));
            }
        }
        self.is_fitted = true;
        self.apply_fills(&mut out)?;
        Ok(out)
    }

    /// Normalize new rows with the fills learned at fit time
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(ChurnError::NotFitted);
        }
        self.check_columns(df)?;
        let mut out = self.drop_identifiers(df)?;
        self.coerce_numeric(&mut out, false)?;

        if self.config.impute == ImputeStrategy::Drop {
            for name in column_names(&out) {
                if self.exclude.contains(&name) {
                    continue;
                }
                let nulls = out.column(&name)?.null_count();
                if nulls > 0 {
                    return Err(ChurnError::DataIntegrity(format!(
                        "column '{}' has {} missing value(s)",
                        name, nulls
                    )));
                }
            }
            return Ok(out);
        }

        self.apply_fills(&mut out)?;
        Ok(out)
    }

    fn check_columns(&self, df: &DataFrame) -> Result<()> {
        let present = column_names(df);
        let missing: Vec<&String> = self
            .config
            .numeric_columns
            .iter()
            .chain(self.config.required_columns.iter())
            .filter(|c| !present.contains(c))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ChurnError::DataIntegrity(format!(
                "configured column(s) absent: {:?}",
                missing
            )))
        }
    }

    fn drop_identifiers(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        for name in &self.config.drop_columns {
            if out.column(name).is_ok() {
                out = out.drop(name)?;
            }
        }
        Ok(out)
    }

    /// Parse text-encoded numeric columns; blanks and garbage become nulls
    fn coerce_numeric(&self, df: &mut DataFrame, enforce_tolerance: bool) -> Result<()> {
        let n_rows = df.height().max(1);
        for name in &self.config.numeric_columns {
            let dtype = df.column(name)?.dtype().clone();
            if is_numeric_dtype(&dtype) {
                let values = numeric_values(df, name)?;
                df.with_column(Series::new(name.as_str().into(), values))?;
                continue;
            }

            let raw = text_values(df, name)?;
            let mut invalid = 0usize;
            let parsed: Vec<Option<f64>> = raw
                .iter()
                .map(|v| match v {
                    None => None,
                    Some(s) => match s.trim().parse::<f64>() {
                        Ok(x) if x.is_finite() => Some(x),
                        _ => {
                            invalid += 1;
                            None
                        }
                    },
                })
                .collect();

            let fraction = invalid as f64 / n_rows as f64;
            debug!(column = %name, invalid, fraction, "Coerced column to numeric");
            if enforce_tolerance
                && fraction > self.config.max_invalid_fraction
                && self.config.impute != ImputeStrategy::Drop
            {
                return Err(ChurnError::DataIntegrity(format!(
                    "column '{}' has {} unconvertible value(s) ({:.2}% > {:.2}%)",
                    name,
                    invalid,
                    fraction * 100.0,
                    self.config.max_invalid_fraction * 100.0
                )));
            }
            df.with_column(Series::new(name.as_str().into(), parsed))?;
        }
        Ok(())
    }

    fn learn_fill(&self, df: &DataFrame, name: &str) -> Result<Option<FillValue>> {
        let dtype = df.column(name)?.dtype().clone();
        if is_numeric_dtype(&dtype) {
            let mut observed: Vec<f64> = numeric_values(df, name)?.into_iter().flatten().collect();
            let fill = match &self.config.impute {
                ImputeStrategy::Drop => return Ok(None),
                ImputeStrategy::Constant { value } => *value,
                ImputeStrategy::Mean => {
                    if observed.is_empty() {
                        return Ok(None);
                    }
                    observed.iter().sum::<f64>() / observed.len() as f64
                }
                ImputeStrategy::Median => {
                    if observed.is_empty() {
                        return Ok(None);
                    }
                    observed.sort_by(|a, b| a.total_cmp(b));
                    let mid = observed.len() / 2;
                    if observed.len() % 2 == 0 {
                        (observed[mid - 1] + observed[mid]) / 2.0
                    } else {
                        observed[mid]
                    }
                }
            };
            Ok(Some(FillValue::Number(fill)))
        } else if dtype == DataType::String {
            Ok(most_frequent(&text_values(df, name)?).map(FillValue::Text))
        } else {
            Ok(None)
        }
    }

    fn apply_fills(&self, df: &mut DataFrame) -> Result<()> {
        for name in column_names(df) {
            if self.exclude.contains(&name) {
                continue;
            }
            let nulls = df.column(&name)?.null_count();
            if nulls == 0 {
                continue;
            }
            let fill = self
                .fills
                .iter()
                .find(|(col, _)| *col == name)
                .map(|(_, fill)| fill)
                .ok_or_else(|| {
                    ChurnError::DataIntegrity(format!(
                        "column '{}' has missing values and no learned fill",
                        name
                    ))
                })?;

            let series = match fill {
                FillValue::Number(x) => {
                    let filled: Vec<f64> = numeric_values(df, &name)?
                        .into_iter()
                        .map(|v| v.unwrap_or(*x))
                        .collect();
                    Series::new(name.as_str().into(), filled)
                }
                FillValue::Text(s) => {
                    let filled: Vec<String> = text_values(df, &name)?
                        .into_iter()
                        .map(|v| v.unwrap_or_else(|| s.clone()))
                        .collect();
                    Series::new(name.as_str().into(), filled)
                }
            };
            debug!(column = %name, filled = nulls, "Imputed missing values");
            df.with_column(series)?;
        }
        Ok(())
    }
}

/// Remove rows holding a null in any non-excluded column
fn drop_incomplete_rows(df: &DataFrame, exclude: &[String]) -> Result<DataFrame> {
    let mut keep = vec![true; df.height()];
    for column in df.get_columns() {
        if exclude.iter().any(|e| e.as_str() == column.name().as_str()) || column.null_count() == 0 {
            continue;
        }
        let nulls = column.as_materialized_series().is_null();
        for (row, is_null) in nulls.into_iter().enumerate() {
            if is_null.unwrap_or(false) {
                keep[row] = false;
            }
        }
    }
    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok(df.filter(&mask)?)
}

/// Most frequent non-null value, ties broken lexicographically
fn most_frequent(values: &[Option<String>]) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for v in values.iter().flatten() {
        match counts.iter_mut().find(|(s, _)| *s == v.as_str()) {
            Some((_, n)) => *n += 1,
            None => counts.push((v.as_str(), 1)),
        }
    }
    counts
        .into_iter()
        .max_by(|(a, na), (b, nb)| na.cmp(nb).then_with(|| b.cmp(a)))
        .map(|(s, _)| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame() -> DataFrame {
        df!(
            "customerID" => &["a", "b", "c", "d"],
            "tenure" => &[1i64, 0, 24, 60],
            "MonthlyCharges" => &[29.85, 20.0, 56.95, 99.5],
            "TotalCharges" => &["29.85", " ", "1366.8", "5970"],
            "Contract" => &["Month-to-month", "Two year", "One year", "Two year"],
            "Churn" => &["Yes", "No", "No", "No"]
        )
        .unwrap()
    }

    #[test]
    fn test_drop_strategy_removes_blank_rows() {
        let mut normalizer = Normalizer::new(NormalizerConfig::default()).with_excluded("Churn");
        let out = normalizer.fit_transform(&raw_frame()).unwrap();

        assert_eq!(out.height(), 3);
        assert!(out.column("customerID").is_err());
        assert_eq!(out.column("TotalCharges").unwrap().dtype(), &DataType::Float64);
        assert_eq!(out.column("TotalCharges").unwrap().null_count(), 0);
    }

    #[test]
    fn test_median_imputation() {
        let config = NormalizerConfig::default()
            .with_impute(ImputeStrategy::Median)
            .with_max_invalid_fraction(0.5);
        let mut normalizer = Normalizer::new(config);
        let out = normalizer.fit_transform(&raw_frame()).unwrap();

        assert_eq!(out.height(), 4);
        let total = numeric_values(&out, "TotalCharges").unwrap();
        assert_eq!(total[1], Some(1366.8));
    }

    #[test]
    fn test_constant_imputation_is_replayed() {
        let config = NormalizerConfig::default()
            .with_impute(ImputeStrategy::Constant { value: 0.0 })
            .with_max_invalid_fraction(0.5);
        let mut normalizer = Normalizer::new(config);
        normalizer.fit_transform(&raw_frame()).unwrap();

        let fresh = df!(
            "tenure" => &[3i64],
            "MonthlyCharges" => &[20.0],
            "TotalCharges" => &[" "],
            "Contract" => &["One year"]
        )
        .unwrap();
        let out = normalizer.transform(&fresh).unwrap();
        assert_eq!(numeric_values(&out, "TotalCharges").unwrap(), vec![Some(0.0)]);
    }

    #[test]
    fn test_tolerance_exceeded_under_imputation() {
        let config = NormalizerConfig::default().with_impute(ImputeStrategy::Mean);
        let mut normalizer = Normalizer::new(config);
        // 1 of 4 values is blank: 25% > 5%
        assert!(matches!(
            normalizer.fit_transform(&raw_frame()),
            Err(ChurnError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_absent_configured_column() {
        let df = raw_frame().drop("TotalCharges").unwrap();
        let mut normalizer = Normalizer::new(NormalizerConfig::default());
        assert!(matches!(
            normalizer.fit_transform(&df),
            Err(ChurnError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_transform_rejects_missing_under_drop() {
        let mut normalizer = Normalizer::new(NormalizerConfig::default());
        normalizer.fit_transform(&raw_frame()).unwrap();
        assert!(matches!(
            normalizer.transform(&raw_frame()),
            Err(ChurnError::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_text_fill_uses_most_frequent() {
        let values = vec![
            Some("b".to_string()),
            Some("a".to_string()),
            None,
            Some("b".to_string()),
            Some("a".to_string()),
        ];
        // Tie between "a" and "b" resolves to "a"
        assert_eq!(most_frequent(&values), Some("a".to_string()));
    }
}
