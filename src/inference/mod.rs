//! Inference module
//!
//! [`ChurnPredictor`] loads a model artifact together with the preprocessor
//! it was trained with and scores raw customer records.

mod predictor;

pub use predictor::{records_to_frame, ChurnPrediction, ChurnPredictor, CustomerRecord, RiskLevel};
