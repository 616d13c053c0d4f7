//! Shared state handed to every request handler.

use std::sync::Arc;

use sabaiface_core::{FaceStore, Metric};

use crate::config::Config;
use crate::engine::EngineHandle;

/// Per-request image and detection limits.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_image_bytes: usize,
    /// Hard cap on faces per image.
    pub max_faces: usize,
    pub min_confidence: f32,
}

impl From<&Config> for Limits {
    fn from(config: &Config) -> Self {
        Self {
            max_image_bytes: config.max_image_bytes,
            max_faces: config.max_faces,
            min_confidence: config.min_confidence,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FaceStore>,
    pub engine: EngineHandle,
    pub metric: Metric,
    pub limits: Limits,
    /// Client for `image_url` fetches.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: &Config,
        store: Arc<dyn FaceStore>,
        engine: EngineHandle,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .build()?;
        Ok(Self {
            store,
            engine,
            metric: config.metric,
            limits: Limits::from(config),
            http,
        })
    }

    /// Model version reported in every Rekognition response.
    pub fn face_model_version(&self) -> &str {
        self.engine.model()
    }
}
