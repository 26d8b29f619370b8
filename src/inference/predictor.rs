//! Churn predictor over a paired model and preprocessor

use crate::error::{ChurnError, Result};
use crate::preprocessing::FeaturePreprocessor;
use crate::training::{ArtifactPaths, ChurnModel, ClassificationMetrics};
use crate::utils::frame::target_array;
use crate::utils::Timer;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// One customer as submitted for scoring: the raw Telco attributes minus
/// the identifier and the label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub gender: String,
    #[serde(rename = "SeniorCitizen")]
    pub senior_citizen: i64,
    #[serde(rename = "Partner")]
    pub partner: String,
    #[serde(rename = "Dependents")]
    pub dependents: String,
    pub tenure: i64,
    #[serde(rename = "PhoneService")]
    pub phone_service: String,
    #[serde(rename = "MultipleLines")]
    pub multiple_lines: String,
    #[serde(rename = "InternetService")]
    pub internet_service: String,
    #[serde(rename = "OnlineSecurity")]
    pub online_security: String,
    #[serde(rename = "OnlineBackup")]
    pub online_backup: String,
    #[serde(rename = "DeviceProtection")]
    pub device_protection: String,
    #[serde(rename = "TechSupport")]
    pub tech_support: String,
    #[serde(rename = "StreamingTV")]
    pub streaming_tv: String,
    #[serde(rename = "StreamingMovies")]
    pub streaming_movies: String,
    #[serde(rename = "Contract")]
    pub contract: String,
    #[serde(rename = "PaperlessBilling")]
    pub paperless_billing: String,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: String,
    #[serde(rename = "MonthlyCharges")]
    pub monthly_charges: f64,
    #[serde(rename = "TotalCharges")]
    pub total_charges: f64,
}

/// Text attributes in frame order
const TEXT_COLUMNS: [&str; 15] = [
    "gender",
    "Partner",
    "Dependents",
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
];

impl CustomerRecord {
    /// Values for [`TEXT_COLUMNS`], same order
    fn text_values(&self) -> [&str; 15] {
        [
            self.gender.as_str(),
            self.partner.as_str(),
            self.dependents.as_str(),
            self.phone_service.as_str(),
            self.multiple_lines.as_str(),
            self.internet_service.as_str(),
            self.online_security.as_str(),
            self.online_backup.as_str(),
            self.device_protection.as_str(),
            self.tech_support.as_str(),
            self.streaming_tv.as_str(),
            self.streaming_movies.as_str(),
            self.contract.as_str(),
            self.paperless_billing.as_str(),
            self.payment_method.as_str(),
        ]
    }

    /// Range checks on the raw attributes
    pub fn validate(&self) -> Result<()> {
        let values = self.text_values();
        if let Some(idx) = values.iter().position(|v| v.trim().is_empty()) {
            return Err(ChurnError::DataIntegrity(format!(
                "field '{}' cannot be empty",
                TEXT_COLUMNS[idx]
            )));
        }
        if !(0..=1).contains(&self.senior_citizen) {
            return Err(ChurnError::DataIntegrity(format!(
                "SeniorCitizen must be 0 or 1, got {}",
                self.senior_citizen
            )));
        }
        if self.tenure < 0 {
            return Err(ChurnError::DataIntegrity(format!(
                "tenure must be non-negative, got {}",
                self.tenure
            )));
        }
        for (name, value) in [
            ("MonthlyCharges", self.monthly_charges),
            ("TotalCharges", self.total_charges),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ChurnError::DataIntegrity(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Build a raw frame with the Telco column names from validated records
pub fn records_to_frame(records: &[CustomerRecord]) -> Result<DataFrame> {
    for record in records {
        record.validate()?;
    }

    let mut columns: Vec<Column> = Vec::with_capacity(TEXT_COLUMNS.len() + 4);
    for (idx, name) in TEXT_COLUMNS.iter().enumerate() {
        let values: Vec<&str> = records.iter().map(|r| r.text_values()[idx]).collect();
        columns.push(Column::new((*name).into(), values));
    }
    columns.push(Column::new(
        "SeniorCitizen".into(),
        records.iter().map(|r| r.senior_citizen).collect::<Vec<i64>>(),
    ));
    columns.push(Column::new(
        "tenure".into(),
        records.iter().map(|r| r.tenure).collect::<Vec<i64>>(),
    ));
    columns.push(Column::new(
        "MonthlyCharges".into(),
        records.iter().map(|r| r.monthly_charges).collect::<Vec<f64>>(),
    ));
    columns.push(Column::new(
        "TotalCharges".into(),
        records.iter().map(|r| r.total_charges).collect::<Vec<f64>>(),
    ));

    Ok(DataFrame::new(columns)?)
}

/// Risk bucket for a churn probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    /// `< 0.3` low, `< 0.6` medium, otherwise high
    pub fn from_probability(p: f64) -> Self {
        if p < 0.3 {
            RiskLevel::Low
        } else if p < 0.6 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// Prediction for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnPrediction {
    pub will_churn: bool,
    pub churn_probability: f64,
    pub risk_level: RiskLevel,
}

impl ChurnPrediction {
    pub fn from_probability(p: f64) -> Self {
        Self {
            will_churn: p >= 0.5,
            churn_probability: p,
            risk_level: RiskLevel::from_probability(p),
        }
    }
}

/// Scores customers with a model and the preprocessor it was trained with
#[derive(Debug, Clone)]
pub struct ChurnPredictor {
    model: ChurnModel,
    preprocessor: FeaturePreprocessor,
}

impl ChurnPredictor {
    /// Pair a model with a preprocessor, rejecting mismatched artifacts
    pub fn new(model: ChurnModel, preprocessor: FeaturePreprocessor) -> Result<Self> {
        if !model.is_fitted() {
            return Err(ChurnError::NotFitted);
        }
        let model_tag = model.tag().unwrap_or_default();
        if model_tag != preprocessor.tag() || model.feature_names() != preprocessor.feature_names() {
            return Err(ChurnError::ArtifactMismatch {
                model_tag: model_tag.to_string(),
                preprocessor_tag: preprocessor.tag().to_string(),
            });
        }
        Ok(Self {
            model,
            preprocessor,
        })
    }

    pub fn load(model_path: impl AsRef<Path>, preprocessor_path: impl AsRef<Path>) -> Result<Self> {
        let timer = Timer::start();
        let model = ChurnModel::load(model_path)?;
        let preprocessor = FeaturePreprocessor::load(preprocessor_path)?;
        let predictor = Self::new(model, preprocessor)?;
        info!(
            model_type = %predictor.model.model_type(),
            tag = %predictor.tag(),
            elapsed_ms = timer.elapsed_ms(),
            "Loaded predictor"
        );
        Ok(predictor)
    }

    /// Load `model.json` and `preprocessor.json` from a model directory
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let paths = ArtifactPaths::in_dir(dir);
        Self::load(&paths.model, &paths.preprocessor)
    }

    pub fn model(&self) -> &ChurnModel {
        &self.model
    }

    pub fn preprocessor(&self) -> &FeaturePreprocessor {
        &self.preprocessor
    }

    pub fn tag(&self) -> &str {
        self.preprocessor.tag()
    }

    /// Score a raw frame with the Telco column names; the label may be absent
    pub fn predict_frame(&self, df: &DataFrame) -> Result<Vec<ChurnPrediction>> {
        let x = self.preprocessor.transform_raw(df)?;
        let proba = self.model.predict_probability(&x)?;
        debug!(rows = proba.len(), "Scored frame");
        Ok(proba.iter().map(|&p| ChurnPrediction::from_probability(p)).collect())
    }

    pub fn predict(&self, records: &[CustomerRecord]) -> Result<Vec<ChurnPrediction>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        self.predict_frame(&records_to_frame(records)?)
    }

    pub fn predict_one(&self, record: &CustomerRecord) -> Result<ChurnPrediction> {
        self.predict(std::slice::from_ref(record))?
            .into_iter()
            .next()
            .ok_or_else(|| ChurnError::DataIntegrity("no prediction produced".to_string()))
    }

    /// Metrics on an already-encoded split that still carries the label
    pub fn evaluate_encoded(&self, df: &DataFrame) -> Result<ClassificationMetrics> {
        let target = &self.preprocessor.pipeline().target_column;
        let y = target_array(df, target)?;
        let x = self.preprocessor.transform_encoded(df)?;
        let proba = self.model.predict_probability(&x)?;
        let pred = proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 });
        ClassificationMetrics::compute(&y, &pred, &proba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CustomerRecord {
        CustomerRecord {
            gender: "Female".to_string(),
            senior_citizen: 0,
            partner: "Yes".to_string(),
            dependents: "No".to_string(),
            tenure: 1,
            phone_service: "No".to_string(),
            multiple_lines: "No phone service".to_string(),
            internet_service: "DSL".to_string(),
            online_security: "No".to_string(),
            online_backup: "Yes".to_string(),
            device_protection: "No".to_string(),
            tech_support: "No".to_string(),
            streaming_tv: "No".to_string(),
            streaming_movies: "No".to_string(),
            contract: "Month-to-month".to_string(),
            paperless_billing: "Yes".to_string(),
            payment_method: "Electronic check".to_string(),
            monthly_charges: 29.85,
            total_charges: 29.85,
        }
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(RiskLevel::from_probability(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.29), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.3), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.59), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_probability(0.6), RiskLevel::High);
        assert_eq!(RiskLevel::from_probability(1.0), RiskLevel::High);

        let prediction = ChurnPrediction::from_probability(0.55);
        assert!(prediction.will_churn);
        assert_eq!(prediction.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_record_serde_uses_telco_names() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["SeniorCitizen"], 0);
        assert_eq!(json["Contract"], "Month-to-month");
        assert_eq!(json["MonthlyCharges"], 29.85);
        assert!(json.get("senior_citizen").is_none());
    }

    #[test]
    fn test_records_to_frame() {
        let df = records_to_frame(&[record(), record()]).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 19);
        assert!(df.column("StreamingTV").is_ok());
        assert_eq!(df.column("tenure").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn test_record_validation() {
        let mut bad = record();
        bad.senior_citizen = 2;
        assert!(matches!(bad.validate(), Err(ChurnError::DataIntegrity(_))));

        let mut bad = record();
        bad.contract = "  ".to_string();
        assert!(records_to_frame(&[bad]).is_err());

        let mut bad = record();
        bad.total_charges = -1.0;
        assert!(bad.validate().is_err());
    }
}
