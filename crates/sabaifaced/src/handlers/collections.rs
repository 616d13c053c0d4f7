//! Collection lifecycle and introspection handlers.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    Json,
};

use crate::error::ApiError;
use crate::service;
use crate::state::AppState;
use crate::wire::{
    CreateCollectionRequest, CreateCollectionResponse, DeleteCollectionResponse,
    DescribeCollectionResponse, Face, ListCollectionsResponse, ListFacesQuery, ListFacesResponse,
};

fn collection_arn(id: &str) -> String {
    format!("sabaiface:{id}")
}

/// POST /collections
pub async fn create_collection(
    State(state): State<AppState>,
    payload: Result<Json<CreateCollectionRequest>, JsonRejection>,
) -> Result<Json<CreateCollectionResponse>, ApiError> {
    let Json(req) = payload?;
    let id = service::collection_id(&req.collection_id)?;
    state.store.create(id)?;

    Ok(Json(CreateCollectionResponse {
        status_code: 200,
        collection_arn: collection_arn(id),
        face_model_version: state.face_model_version().to_string(),
    }))
}

/// DELETE /collections/{id}
pub async fn delete_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteCollectionResponse>, ApiError> {
    state.store.delete(&id)?;
    Ok(Json(DeleteCollectionResponse { status_code: 200 }))
}

/// GET /collections
pub async fn list_collections(State(state): State<AppState>) -> Json<ListCollectionsResponse> {
    let collection_ids = state.store.list_collections();
    let version = state.face_model_version().to_string();
    Json(ListCollectionsResponse {
        face_model_versions: vec![version; collection_ids.len()],
        collection_ids,
    })
}

/// GET /collections/{id}
pub async fn describe_collection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DescribeCollectionResponse>, ApiError> {
    let info = state.store.describe(&id)?;
    Ok(Json(DescribeCollectionResponse {
        face_count: info.face_count,
        face_model_version: state.face_model_version().to_string(),
        collection_arn: collection_arn(&info.id),
        creation_timestamp: info.created_at.timestamp(),
    }))
}

/// GET /collections/{id}/faces?MaxResults=
pub async fn list_faces(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<ListFacesQuery>, QueryRejection>,
) -> Result<Json<ListFacesResponse>, ApiError> {
    let Query(query) = query?;
    let records = state.store.list_faces(&id)?;
    let limit = query.max_results.unwrap_or(usize::MAX);

    Ok(Json(ListFacesResponse {
        faces: records.iter().take(limit).map(Face::from).collect(),
        face_model_version: state.face_model_version().to_string(),
    }))
}
