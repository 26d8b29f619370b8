//! Application state management

use std::sync::Arc;
use tracing::{error, info};

use crate::inference::ChurnPredictor;

use super::ServerConfig;

/// Application state shared across handlers; immutable once built
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    pub predictor: Option<Arc<ChurnPredictor>>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Load artifacts from the configured model directory. A failed load
    /// leaves the service up but not ready.
    pub fn load(config: ServerConfig) -> Self {
        let predictor = match ChurnPredictor::from_dir(&config.model_dir) {
            Ok(predictor) => {
                info!(model_dir = %config.model_dir.display(), tag = %predictor.tag(), "Model loaded");
                Some(Arc::new(predictor))
            }
            Err(e) => {
                error!(model_dir = %config.model_dir.display(), error = %e, "Failed to load model");
                None
            }
        };
        Self {
            config,
            predictor,
            started_at: chrono::Utc::now(),
        }
    }

    pub fn with_predictor(config: ServerConfig, predictor: Option<ChurnPredictor>) -> Self {
        Self {
            config,
            predictor: predictor.map(Arc::new),
            started_at: chrono::Utc::now(),
        }
    }

    /// Short model version derived from the artifact tag
    pub fn model_version(&self) -> Option<String> {
        self.predictor
            .as_ref()
            .map(|p| p.tag().chars().take(12).collect())
    }
}
