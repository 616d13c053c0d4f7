//! IndexFaces and SearchFacesByImage.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use sabaiface_core::SearchParams;

use crate::error::ApiError;
use crate::service::{self, DEFAULT_INDEX_MAX_FACES, DEFAULT_SEARCH_MAX_FACES};
use crate::state::AppState;
use crate::wire::{
    BoundingBox, FaceMatchEntry, IndexFacesRequest, IndexFacesResponse, IndexedFace,
    SearchFacesByImageRequest, SearchFacesByImageResponse, SearchedBoundingBox,
};

/// POST /collections/{id}/index-faces
pub async fn index_faces(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<IndexFacesRequest>, JsonRejection>,
) -> Result<Json<IndexFacesResponse>, ApiError> {
    let Json(req) = payload?;
    let max_faces =
        service::max_faces(req.max_faces, DEFAULT_INDEX_MAX_FACES, state.limits.max_faces)?;

    let records = service::index_faces(
        &state,
        &id,
        &req.image.bytes,
        &req.external_image_id,
        max_faces,
    )
    .await?;

    Ok(Json(IndexFacesResponse {
        face_records: records.iter().map(IndexedFace::from).collect(),
        unindexed_faces: Vec::new(),
        face_model_version: state.face_model_version().to_string(),
    }))
}

/// POST /collections/{id}/search-faces-by-image
pub async fn search_faces_by_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<SearchFacesByImageRequest>, JsonRejection>,
) -> Result<Json<SearchFacesByImageResponse>, ApiError> {
    let Json(req) = payload?;
    let max_results = service::result_cap(req.max_faces, DEFAULT_SEARCH_MAX_FACES)?;
    let threshold = service::match_threshold(req.face_match_threshold)?;
    let params = SearchParams::from_percent(threshold, max_results);

    let outcome = service::search_faces(&state, &id, &req.image.bytes, params).await?;

    let (searched_box, searched_confidence) = match outcome.query {
        Some(q) => (
            SearchedBoundingBox {
                bbox: Some(BoundingBox::from(q.bbox)),
            },
            crate::wire::percent(q.confidence),
        ),
        None => (SearchedBoundingBox::default(), 0.0),
    };

    Ok(Json(SearchFacesByImageResponse {
        searched_face_bounding_box: searched_box,
        searched_face_confidence: searched_confidence,
        face_matches: outcome.matches.into_iter().map(FaceMatchEntry::from).collect(),
        face_model_version: state.face_model_version().to_string(),
    }))
}
