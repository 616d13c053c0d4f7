//! API error handling.
//!
//! Every failure leaving a collection endpoint is an [`ApiError`], rendered as
//! an AWS-style body: `{"__type": "...Exception", "message": "..."}`.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sabaiface_core::StoreError;
use thiserror::Error;

use crate::decode::ImageError;
use crate::engine::EngineError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Collection already exists: {0}")]
    AlreadyExists(String),

    #[error("Collection not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidImage(String),

    #[error("Image is {size} bytes, limit is {max}")]
    ImageTooLarge { size: usize, max: usize },

    #[error("{0}")]
    InvalidParameter(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyExists(_)
            | Self::InvalidImage(_)
            | Self::ImageTooLarge { .. }
            | Self::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Rekognition exception name carried in `__type`.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::AlreadyExists(_) => "ResourceAlreadyExistsException",
            Self::NotFound(_) => "ResourceNotFoundException",
            Self::InvalidImage(_) => "InvalidImageFormatException",
            Self::ImageTooLarge { .. } => "ImageTooLargeException",
            Self::InvalidParameter(_) => "InvalidParameterException",
            Self::ServiceUnavailable(_) => "ServiceUnavailableException",
            Self::Internal(_) => "InternalServerError",
        }
    }

    /// Short snake_case code used by the `/extract` endpoint.
    pub fn extract_code(&self) -> &'static str {
        match self {
            Self::ImageTooLarge { .. } => "image_too_large",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Internal(_) => "internal_error",
            _ => "invalid_image",
        }
    }

    /// Log at warn for client errors and at error for server errors.
    pub fn log(&self) {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error_type = self.error_type(),
                error = %self,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                error_type = self.error_type(),
                error = %self,
                "Client error"
            );
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let body = serde_json::json!({
            "__type": self.error_type(),
            "message": self.to_string(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(id) => Self::AlreadyExists(id),
            StoreError::NotFound(id) => Self::NotFound(id),
        }
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::TooLarge { size, max } => Self::ImageTooLarge { size, max },
            ImageError::Join => Self::Internal(err.to_string()),
            ImageError::Base64(_) | ImageError::Decode(_) | ImageError::Fetch(_) => {
                Self::InvalidImage(err.to_string())
            }
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::ServiceUnavailable(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidParameter(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidParameter(rejection.body_text())
    }
}
