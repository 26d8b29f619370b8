//! Input schema checks, run before any transform

use crate::error::{ChurnError, Result};
use crate::utils::frame::column_names;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Columns of the Telco customer dataset
pub const TELCO_COLUMNS: [&str; 21] = [
    "customerID",
    "gender",
    "SeniorCitizen",
    "Partner",
    "Dependents",
    "tenure",
    "PhoneService",
    "MultipleLines",
    "InternetService",
    "OnlineSecurity",
    "OnlineBackup",
    "DeviceProtection",
    "TechSupport",
    "StreamingTV",
    "StreamingMovies",
    "Contract",
    "PaperlessBilling",
    "PaymentMethod",
    "MonthlyCharges",
    "TotalCharges",
    "Churn",
];

/// Checks that a frame carries every expected column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaValidator {
    expected: Vec<String>,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new(TELCO_COLUMNS.iter().map(|c| c.to_string()).collect())
    }
}

impl SchemaValidator {
    pub fn new(expected: Vec<String>) -> Self {
        Self { expected }
    }

    pub fn expected(&self) -> &[String] {
        &self.expected
    }

    /// Fail with every absent column listed
    pub fn validate(&self, df: &DataFrame) -> Result<()> {
        let present = column_names(df);
        let missing: Vec<&str> = self
            .expected
            .iter()
            .filter(|c| !present.contains(c))
            .map(String::as_str)
            .collect();

        if !missing.is_empty() {
            return Err(ChurnError::Schema(format!(
                "missing expected column(s): {}",
                missing.join(", ")
            )));
        }
        if df.height() == 0 {
            return Err(ChurnError::Schema("dataset has no rows".to_string()));
        }

        debug!(columns = present.len(), rows = df.height(), "Schema validated");
        Ok(())
    }

    /// Expected columns minus the given ones, in schema order
    pub fn without(&self, excluded: &[&str]) -> Vec<String> {
        self.expected
            .iter()
            .filter(|c| !excluded.contains(&c.as_str()))
            .cloned()
            .collect()
    }
}
