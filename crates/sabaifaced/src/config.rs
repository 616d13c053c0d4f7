use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use sabaiface_core::extractor::{
    DEFAULT_MAX_FACES_CAP, DEFAULT_MIN_CONFIDENCE, DEFAULT_RECYCLE_INTERVAL,
};
use sabaiface_core::matcher::UnknownMetric;
use sabaiface_core::{Metric, ModelPack};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("SABAIFACE_DISTANCE_METRIC: {0}")]
    Metric(#[from] UnknownMetric),
    #[error("SABAIFACE_HOST: invalid address '{0}'")]
    Host(String),
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    /// Listen port (default: 8087).
    pub port: u16,
    /// Directory containing one sub-directory per model pack.
    pub model_dir: PathBuf,
    /// Model pack name (default: buffalo_l).
    pub model_pack: String,
    /// Square detector input size in pixels.
    pub det_size: usize,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
    /// Detections below this confidence are dropped.
    pub min_confidence: f32,
    /// Hard cap on faces per image, whatever the caller asks for.
    pub max_faces: usize,
    /// Largest accepted image, measured on the decoded bytes.
    pub max_image_bytes: usize,
    /// Inferences between extractor reloads; 0 disables recycling.
    pub recycle_interval: u64,
    pub metric: Metric,
    /// Allowed CORS origins, comma-separated (default: allow all).
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB.
    pub body_limit_mb: usize,
    pub timeout_secs: u64,
    /// Pending requests the engine queue holds before handlers wait.
    pub engine_queue_depth: usize,
    /// Timeout for fetching `image_url` sources.
    pub fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8087,
            model_dir: PathBuf::from("models"),
            model_pack: "buffalo_l".to_string(),
            det_size: 640,
            intra_threads: 2,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_faces: DEFAULT_MAX_FACES_CAP,
            max_image_bytes: 10 * 1024 * 1024,
            recycle_interval: DEFAULT_RECYCLE_INTERVAL,
            metric: Metric::Cosine,
            allowed_origins: None,
            body_limit_mb: 20,
            timeout_secs: 30,
            engine_queue_depth: 32,
            fetch_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from `SABAIFACE_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = parse_host(std::env::var("SABAIFACE_HOST").ok(), defaults.host)?;

        let metric = match std::env::var("SABAIFACE_DISTANCE_METRIC") {
            Ok(m) => m.parse()?,
            Err(_) => defaults.metric,
        };

        let allowed_origins = std::env::var("SABAIFACE_ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Ok(Self {
            host,
            port: env_u16("SABAIFACE_PORT", defaults.port),
            model_dir: std::env::var("SABAIFACE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            model_pack: std::env::var("SABAIFACE_MODEL_PACK").unwrap_or(defaults.model_pack),
            det_size: env_usize("SABAIFACE_DET_SIZE", defaults.det_size),
            intra_threads: env_usize("SABAIFACE_INTRA_THREADS", defaults.intra_threads),
            min_confidence: env_f32("SABAIFACE_MIN_CONFIDENCE", defaults.min_confidence),
            max_faces: env_usize("SABAIFACE_MAX_FACES_PER_IMAGE", defaults.max_faces),
            max_image_bytes: env_usize("SABAIFACE_MAX_IMAGE_BYTES", defaults.max_image_bytes),
            recycle_interval: env_u64("SABAIFACE_RECYCLE_INTERVAL", defaults.recycle_interval),
            metric,
            allowed_origins,
            body_limit_mb: env_usize("SABAIFACE_BODY_LIMIT_MB", defaults.body_limit_mb),
            timeout_secs: env_u64("SABAIFACE_REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            engine_queue_depth: env_usize("SABAIFACE_ENGINE_QUEUE", defaults.engine_queue_depth),
            fetch_timeout_secs: env_u64("SABAIFACE_FETCH_TIMEOUT_SECS", defaults.fetch_timeout_secs),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn model_pack(&self) -> ModelPack {
        ModelPack {
            model_dir: self.model_dir.clone(),
            name: self.model_pack.clone(),
            det_size: self.det_size,
            intra_threads: self.intra_threads,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn parse_host(value: Option<String>, default: IpAddr) -> Result<IpAddr, ConfigError> {
    match value {
        Some(h) => h.trim().parse().map_err(|_| ConfigError::Host(h)),
        None => Ok(default),
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    env_parse(key).unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    env_parse(key).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_parse(key).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env_parse(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
