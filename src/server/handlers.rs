//! HTTP request handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{Result, ServerError};
use super::state::AppState;
use crate::inference::{ChurnPrediction, ChurnPredictor, CustomerRecord, RiskLevel};
use crate::utils::Timer;

/// Upper bound on customers per batch request
pub const MAX_BATCH_SIZE: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct PredictionRequest {
    pub customers: Vec<CustomerRecord>,
}

#[derive(Debug, Serialize)]
pub struct PredictionItem {
    pub customer_index: usize,
    pub will_churn: bool,
    pub churn_probability: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub predictions: Vec<PredictionItem>,
    pub model_version: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct SinglePredictionResponse {
    pub will_churn: bool,
    pub churn_probability: f64,
    pub risk_level: RiskLevel,
    pub model_version: String,
    pub timestamp: String,
}

fn round4(p: f64) -> f64 {
    (p * 10_000.0).round() / 10_000.0
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn loaded_predictor(state: &AppState) -> Result<Arc<ChurnPredictor>> {
    state
        .predictor
        .clone()
        .ok_or_else(|| ServerError::Unavailable("Model not loaded".to_string()))
}

fn parse_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    body.map(|Json(inner)| inner)
        .map_err(|rejection| ServerError::BadRequest(rejection.body_text()))
}

/// Run the predictor off the async runtime
async fn score(
    predictor: Arc<ChurnPredictor>,
    customers: Vec<CustomerRecord>,
) -> Result<Vec<ChurnPrediction>> {
    tokio::task::spawn_blocking(move || predictor.predict(&customers))
        .await
        .map_err(|e| ServerError::Internal(format!("prediction task failed: {}", e)))?
        .map_err(ServerError::from)
}

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Telco Customer Churn Prediction API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let model_loaded = state.predictor.is_some();
    let uptime = chrono::Utc::now() - state.started_at;

    Json(json!({
        "status": if model_loaded { "healthy" } else { "unhealthy" },
        "model_loaded": model_loaded,
        "model_version": state.model_version(),
        "uptime_seconds": uptime.num_seconds(),
        "timestamp": timestamp(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn ready(State(state): State<Arc<AppState>>) -> Response {
    if state.predictor.is_some() {
        (StatusCode::OK, Json(json!({ "status": "ready" }))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready", "reason": "Model not loaded" })),
        )
            .into_response()
    }
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>> {
    let request = parse_body(body)?;
    let n = request.customers.len();
    if n == 0 || n > MAX_BATCH_SIZE {
        return Err(ServerError::BadRequest(format!(
            "customers must contain between 1 and {} records, got {}",
            MAX_BATCH_SIZE, n
        )));
    }

    let predictor = loaded_predictor(&state)?;
    let timer = Timer::start();
    let predictions = score(predictor, request.customers).await?;
    info!(
        batch_size = n,
        elapsed_ms = timer.elapsed_ms(),
        "Batch prediction served"
    );

    let predictions = predictions
        .into_iter()
        .enumerate()
        .map(|(customer_index, p)| PredictionItem {
            customer_index,
            will_churn: p.will_churn,
            churn_probability: round4(p.churn_probability),
            risk_level: p.risk_level,
        })
        .collect();

    Ok(Json(PredictionResponse {
        predictions,
        model_version: state.model_version().unwrap_or_default(),
        timestamp: timestamp(),
    }))
}

pub async fn predict_single(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<CustomerRecord>, JsonRejection>,
) -> Result<Json<SinglePredictionResponse>> {
    let customer = parse_body(body)?;
    let predictor = loaded_predictor(&state)?;

    let prediction = score(predictor, vec![customer])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ServerError::Internal("no prediction produced".to_string()))?;
    debug!(probability = prediction.churn_probability, "Single prediction served");

    Ok(Json(SinglePredictionResponse {
        will_churn: prediction.will_churn,
        churn_probability: round4(prediction.churn_probability),
        risk_level: prediction.risk_level,
        model_version: state.model_version().unwrap_or_default(),
        timestamp: timestamp(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(1.0), 1.0);
        assert_eq!(round4(0.0), 0.0);
    }
}
