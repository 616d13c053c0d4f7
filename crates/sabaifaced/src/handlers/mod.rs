//! HTTP request handlers.

pub mod collections;
pub mod extract;
pub mod faces;
pub mod health;

pub use crate::state::AppState;
pub use collections::{
    create_collection, delete_collection, describe_collection, list_collections, list_faces,
};
pub use extract::extract;
pub use faces::{index_faces, search_faces_by_image};
pub use health::{health, HealthResponse};
