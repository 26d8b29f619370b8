//! Error types for the server

use crate::error::ChurnError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Prediction failed: {0}")]
    Prediction(#[from] ChurnError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "model_unavailable"),
            ServerError::Prediction(e) if e.is_input_error() => {
                (StatusCode::BAD_REQUEST, "invalid_input")
            }
            ServerError::Prediction(_) | ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            ServerError::BadRequest(msg) | ServerError::Unavailable(msg) => msg.clone(),
            ServerError::Prediction(e) if e.is_input_error() => e.to_string(),
            ServerError::Prediction(e) => {
                tracing::error!(detail = %e, "Prediction error");
                "Prediction failed. Check server logs for details.".to_string()
            }
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                "An internal error occurred".to_string()
            }
        };

        let body = Json(json!({
            "error": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
