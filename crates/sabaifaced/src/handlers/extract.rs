//! Stateless embedding extraction.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use sabaiface_core::DetectionLimits;

use crate::decode::{self, ImageError, ImageSource};
use crate::engine::EngineError;
use crate::error::ApiError;
use crate::state::AppState;
use crate::wire::{ExtractRequest, ExtractResponse, ExtractedFace};

/// `/extract` reports failures as `{"error": code, "detail": message}`.
#[derive(Debug)]
pub struct ExtractError(pub ApiError);

impl From<ApiError> for ExtractError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ExtractError {
    fn from(err: JsonRejection) -> Self {
        Self(err.into())
    }
}

impl From<ImageError> for ExtractError {
    fn from(err: ImageError) -> Self {
        Self(err.into())
    }
}

impl From<EngineError> for ExtractError {
    fn from(err: EngineError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ExtractError {
    fn into_response(self) -> Response {
        let err = self.0;
        err.log();
        let body = serde_json::json!({
            "error": err.extract_code(),
            "detail": err.to_string(),
        });
        (err.status_code(), Json(body)).into_response()
    }
}

/// POST /extract
///
/// Takes exactly one of `image` (base64) or `image_url`.
pub async fn extract(
    State(state): State<AppState>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<ExtractResponse>, ExtractError> {
    let Json(req) = payload?;
    let limits = state.limits;

    let source = ImageSource::exactly_one(req.image, req.image_url).ok_or_else(|| {
        ApiError::invalid_parameter("Provide exactly one of 'image' (base64) or 'image_url'")
    })?;

    let min_confidence = req.min_confidence.unwrap_or(limits.min_confidence);
    if !(0.0..=1.0).contains(&min_confidence) {
        return Err(ApiError::invalid_parameter(format!(
            "min_confidence must be between 0 and 1, got {min_confidence}"
        ))
        .into());
    }
    // 0 falls back to the default like an absent value.
    let max_faces = match req.max_faces {
        Some(n) if n > 0 => n,
        _ => limits.max_faces,
    }
    .min(limits.max_faces);

    let bytes = match source {
        ImageSource::Inline(data) => decode::decode_base64(&data, limits.max_image_bytes)?,
        ImageSource::Url(url) => decode::fetch(&state.http, &url, limits.max_image_bytes).await?,
    };
    let image = decode::decode_rgb_blocking(bytes).await?;
    let (width, height) = image.dimensions();

    let output = state
        .engine
        .extract(
            image,
            DetectionLimits {
                max_faces,
                min_confidence,
            },
        )
        .await?;

    Ok(Json(ExtractResponse {
        faces: output
            .extraction
            .into_faces()
            .into_iter()
            .map(|face| ExtractedFace::new(face, width, height))
            .collect(),
        image_width: width,
        image_height: height,
        model: state.engine.model().to_string(),
        inference_ms: output.inference_ms,
    }))
}
