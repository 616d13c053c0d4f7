//! Index and search operations behind the Rekognition endpoints.

use image::RgbImage;
use sabaiface_core::{
    DetectionLimits, FaceMatch, FaceRecord, RelativeBox, SearchParams, StoreError,
};

use crate::decode;
use crate::error::ApiError;
use crate::state::AppState;

pub const DEFAULT_INDEX_MAX_FACES: usize = 100;
pub const DEFAULT_SEARCH_MAX_FACES: usize = 20;
pub const DEFAULT_MATCH_THRESHOLD: f32 = 80.0;

/// Reject empty collection IDs.
pub fn collection_id(id: &str) -> Result<&str, ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::invalid_parameter("CollectionId must not be empty"));
    }
    Ok(id)
}

/// Resolve a requested face count against its default and the hard cap.
pub fn max_faces(requested: Option<i64>, default: usize, cap: usize) -> Result<usize, ApiError> {
    match requested {
        None => Ok(default.min(cap)),
        Some(n) if n <= 0 => Err(ApiError::invalid_parameter(format!(
            "MaxFaces must be positive, got {n}"
        ))),
        Some(n) => Ok(usize::try_from(n).unwrap_or(usize::MAX).min(cap)),
    }
}

/// Resolve a search's `MaxFaces`. Only the collection size bounds it.
pub fn result_cap(requested: Option<i64>, default: usize) -> Result<usize, ApiError> {
    max_faces(requested, default, usize::MAX)
}

/// Validate a 0–100 match threshold, defaulting to 80.
pub fn match_threshold(requested: Option<f32>) -> Result<f32, ApiError> {
    let threshold = requested.unwrap_or(DEFAULT_MATCH_THRESHOLD);
    if !(0.0..=100.0).contains(&threshold) {
        return Err(ApiError::invalid_parameter(format!(
            "FaceMatchThreshold must be between 0 and 100, got {threshold}"
        )));
    }
    Ok(threshold)
}

/// The query face found in a search image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryFace {
    pub bbox: RelativeBox,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// `None` when the image held no detectable face.
    pub query: Option<QueryFace>,
    pub matches: Vec<FaceMatch>,
}

fn ensure_exists(state: &AppState, id: &str) -> Result<(), ApiError> {
    if state.store.contains(id) {
        Ok(())
    } else {
        Err(StoreError::NotFound(id.to_string()).into())
    }
}

async fn decode_inline(state: &AppState, data: &str) -> Result<RgbImage, ApiError> {
    let bytes = decode::decode_base64(data, state.limits.max_image_bytes)?;
    Ok(decode::decode_rgb_blocking(bytes).await?)
}

/// Detect faces in an inline image and add them to a collection.
///
/// Returns the new records; a faceless image yields an empty list.
pub async fn index_faces(
    state: &AppState,
    collection_id: &str,
    image_data: &str,
    external_image_id: &str,
    max_faces: usize,
) -> Result<Vec<FaceRecord>, ApiError> {
    ensure_exists(state, collection_id)?;
    let image = decode_inline(state, image_data).await?;
    let (width, height) = image.dimensions();

    let limits = DetectionLimits {
        max_faces,
        min_confidence: state.limits.min_confidence,
    };
    let output = state.engine.extract(image, limits).await?;

    let records: Vec<FaceRecord> = output
        .extraction
        .into_faces()
        .into_iter()
        .map(|face| FaceRecord::from_detection(face, external_image_id, width, height))
        .collect();

    if !records.is_empty() {
        state.store.append(collection_id, records.clone())?;
    }
    tracing::info!(
        collection = collection_id,
        external_image_id,
        indexed = records.len(),
        inference_ms = output.inference_ms,
        "faces indexed"
    );
    Ok(records)
}

/// Find the best face in an inline image and rank the collection against it.
pub async fn search_faces(
    state: &AppState,
    collection_id: &str,
    image_data: &str,
    params: SearchParams,
) -> Result<SearchOutcome, ApiError> {
    ensure_exists(state, collection_id)?;
    let image = decode_inline(state, image_data).await?;
    let (width, height) = image.dimensions();

    let limits = DetectionLimits {
        max_faces: 1,
        min_confidence: state.limits.min_confidence,
    };
    let output = state.engine.extract(image, limits).await?;

    let Some(face) = output.extraction.into_faces().into_iter().next() else {
        tracing::debug!(collection = collection_id, "no face in search image");
        return Ok(SearchOutcome {
            query: None,
            matches: Vec::new(),
        });
    };

    let matches = state
        .store
        .search(collection_id, &face.embedding, &state.metric, &params)?;
    tracing::debug!(
        collection = collection_id,
        metric = %state.metric,
        matches = matches.len(),
        "search complete"
    );

    Ok(SearchOutcome {
        query: Some(QueryFace {
            bbox: face.bbox.normalize(width, height),
            confidence: face.confidence(),
        }),
        matches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_faces_defaults_and_clamps() {
        assert_eq!(max_faces(None, 20, 100).unwrap(), 20);
        assert_eq!(max_faces(None, 100, 10).unwrap(), 10);
        assert_eq!(max_faces(Some(500), 20, 100).unwrap(), 100);
        assert_eq!(max_faces(Some(3), 20, 100).unwrap(), 3);
    }

    #[test]
    fn test_max_faces_rejects_non_positive() {
        assert!(matches!(max_faces(Some(0), 20, 100), Err(ApiError::InvalidParameter(_))));
        assert!(matches!(max_faces(Some(-4), 20, 100), Err(ApiError::InvalidParameter(_))));
    }

    #[test]
    fn test_result_cap_ignores_detection_cap() {
        assert_eq!(result_cap(None, DEFAULT_SEARCH_MAX_FACES).unwrap(), 20);
        assert_eq!(result_cap(Some(500), DEFAULT_SEARCH_MAX_FACES).unwrap(), 500);
        assert!(matches!(
            result_cap(Some(0), DEFAULT_SEARCH_MAX_FACES),
            Err(ApiError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_threshold_bounds_inclusive() {
        assert_eq!(match_threshold(None).unwrap(), 80.0);
        assert_eq!(match_threshold(Some(0.0)).unwrap(), 0.0);
        assert_eq!(match_threshold(Some(100.0)).unwrap(), 100.0);
        assert!(match_threshold(Some(100.5)).is_err());
        assert!(match_threshold(Some(-1.0)).is_err());
        assert!(match_threshold(Some(f32::NAN)).is_err());
    }

    #[test]
    fn test_collection_id_not_empty() {
        assert!(collection_id("team").is_ok());
        assert!(collection_id("").is_err());
        assert!(collection_id("   ").is_err());
    }
}
