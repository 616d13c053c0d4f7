//! sabaifaced: face collection and search daemon.
//!
//! Serves a Rekognition-style JSON API over axum. Inference runs on a
//! dedicated engine thread that owns the recycling extractor; collections
//! live in an in-memory store shared by all handlers.

pub mod config;
pub mod decode;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod service;
pub mod state;
pub mod wire;

pub use config::Config;
pub use engine::{spawn_engine, EngineError, EngineHandle, EngineSettings};
pub use error::ApiError;
pub use routes::{create_router, create_router_with_config};
pub use state::AppState;
