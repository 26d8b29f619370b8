//! Binary label encoding

use crate::error::{ChurnError, Result};
use crate::utils::frame::{require_column, text_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maps a two-valued text label to {0, 1}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetEncoder {
    column: String,
    positive_label: String,
    negative_label: Option<String>,
}

impl TargetEncoder {
    pub fn new(column: impl Into<String>, positive_label: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            positive_label: positive_label.into(),
            negative_label: None,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn positive_label(&self) -> &str {
        &self.positive_label
    }

    /// Label mapped to 0, known after the first encode
    pub fn negative_label(&self) -> Option<&str> {
        self.negative_label.as_deref()
    }

    /// Replace the label column with an `Int32` {0, 1} column
    pub fn encode(&mut self, df: &DataFrame) -> Result<DataFrame> {
        let column = require_column(df, &self.column)?;
        if column.dtype() != &DataType::String {
            return Err(ChurnError::Schema(format!(
                "label column '{}' is {:?}, expected text",
                self.column,
                column.dtype()
            )));
        }

        let labels = text_values(df, &self.column)?;
        let mut distinct: Vec<&str> = labels.iter().flatten().map(String::as_str).collect();
        distinct.sort_unstable();
        distinct.dedup();

        if distinct.len() != 2 {
            return Err(ChurnError::Schema(format!(
                "label column '{}' must have exactly 2 distinct values, found {}: {:?}",
                self.column,
                distinct.len(),
                distinct
            )));
        }
        if !distinct.contains(&self.positive_label.as_str()) {
            return Err(ChurnError::Schema(format!(
                "positive label '{}' not among observed values {:?}",
                self.positive_label, distinct
            )));
        }

        let encoded: Vec<i32> = labels
            .iter()
            .enumerate()
            .map(|(row, label)| match label {
                Some(l) => Ok(i32::from(*l == self.positive_label)),
                None => Err(ChurnError::DataIntegrity(format!(
                    "label column '{}' is missing at row {}",
                    self.column, row
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let negative = distinct
            .iter()
            .find(|l| **l != self.positive_label)
            .map(|l| l.to_string());
        debug!(
            column = %self.column,
            positive = %self.positive_label,
            negative = ?negative,
            positives = encoded.iter().filter(|v| **v == 1).count(),
            "Encoded target"
        );
        self.negative_label = negative;

        let mut out = df.clone();
        out.with_column(Series::new(self.column.as_str().into(), encoded))?;
        Ok(out)
    }
}
