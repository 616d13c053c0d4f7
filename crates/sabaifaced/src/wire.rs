//! JSON request and response bodies.
//!
//! Collection endpoints use Rekognition's PascalCase names; `/extract` uses
//! snake_case. Confidence and similarity are 0–1 internally and 0–100 on
//! the Rekognition endpoints; [`percent`] is the only place that scales them.

use sabaiface_core::{DetectedFace, FaceMatch, FaceRecord, RelativeBox};
use serde::{Deserialize, Serialize};

/// Scale an internal 0–1 value to the 0–100 wire range.
///
/// Clamped, since f32 cosine of identical vectors can land just above 1.
pub fn percent(value: f32) -> f32 {
    (value * 100.0).clamp(0.0, 100.0)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateCollectionRequest {
    pub collection_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImagePayload {
    /// Base64-encoded image file.
    pub bytes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexFacesRequest {
    pub image: ImagePayload,
    #[serde(default)]
    pub external_image_id: String,
    pub max_faces: Option<i64>,
    /// Accepted for compatibility; detection filtering is governed by the
    /// configured minimum confidence.
    pub quality_filter: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchFacesByImageRequest {
    pub image: ImagePayload,
    pub max_faces: Option<i64>,
    pub face_match_threshold: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListFacesQuery {
    pub max_results: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractRequest {
    pub image: Option<String>,
    pub image_url: Option<String>,
    pub max_faces: Option<usize>,
    pub min_confidence: Option<f32>,
}

// ---------------------------------------------------------------------------
// Rekognition responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoundingBox {
    pub width: f32,
    pub height: f32,
    pub left: f32,
    pub top: f32,
}

impl From<RelativeBox> for BoundingBox {
    fn from(b: RelativeBox) -> Self {
        Self {
            width: b.width,
            height: b.height,
            left: b.left,
            top: b.top,
        }
    }
}

/// Serializes as `{}` when no face was found in the query image.
#[derive(Debug, Default, Serialize)]
pub struct SearchedBoundingBox {
    #[serde(flatten)]
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateCollectionResponse {
    pub status_code: u16,
    pub collection_arn: String,
    pub face_model_version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteCollectionResponse {
    pub status_code: u16,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListCollectionsResponse {
    pub collection_ids: Vec<String>,
    pub face_model_versions: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeCollectionResponse {
    pub face_count: usize,
    pub face_model_version: String,
    #[serde(rename = "CollectionARN")]
    pub collection_arn: String,
    /// Seconds since the Unix epoch.
    pub creation_timestamp: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Face {
    pub face_id: String,
    pub bounding_box: BoundingBox,
    pub external_image_id: String,
    pub confidence: f32,
}

impl From<&FaceRecord> for Face {
    fn from(record: &FaceRecord) -> Self {
        Self {
            face_id: record.face_id.clone(),
            bounding_box: record.relative_box().into(),
            external_image_id: record.external_image_id.clone(),
            confidence: percent(record.confidence()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaceDetail {
    pub bounding_box: BoundingBox,
    pub confidence: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexedFace {
    pub face: Face,
    pub face_detail: FaceDetail,
}

impl From<&FaceRecord> for IndexedFace {
    fn from(record: &FaceRecord) -> Self {
        let face = Face::from(record);
        let face_detail = FaceDetail {
            bounding_box: face.bounding_box,
            confidence: face.confidence,
        };
        Self { face, face_detail }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IndexFacesResponse {
    pub face_records: Vec<IndexedFace>,
    /// Always empty: faces below the confidence floor are never reported.
    pub unindexed_faces: Vec<serde_json::Value>,
    pub face_model_version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MatchedFace {
    pub face_id: String,
    pub external_image_id: String,
    pub confidence: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaceMatchEntry {
    pub similarity: f32,
    pub face: MatchedFace,
}

impl From<FaceMatch> for FaceMatchEntry {
    fn from(m: FaceMatch) -> Self {
        Self {
            similarity: percent(m.similarity),
            face: MatchedFace {
                face_id: m.face_id,
                external_image_id: m.external_image_id,
                confidence: percent(m.confidence),
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchFacesByImageResponse {
    pub searched_face_bounding_box: SearchedBoundingBox,
    pub searched_face_confidence: f32,
    pub face_matches: Vec<FaceMatchEntry>,
    pub face_model_version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListFacesResponse {
    pub faces: Vec<Face>,
    pub face_model_version: String,
}

// ---------------------------------------------------------------------------
// /extract responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatioBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl From<RelativeBox> for RatioBox {
    fn from(b: RelativeBox) -> Self {
        Self {
            x: b.left,
            y: b.top,
            width: b.width,
            height: b.height,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExtractedFace {
    pub embedding: Vec<f32>,
    pub bounding_box: RatioBox,
    /// Detection confidence, 0–1.
    pub confidence: f32,
}

impl ExtractedFace {
    pub fn new(face: DetectedFace, image_width: u32, image_height: u32) -> Self {
        Self {
            bounding_box: face.bbox.normalize(image_width, image_height).into(),
            confidence: face.bbox.confidence,
            embedding: face.embedding.values,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub faces: Vec<ExtractedFace>,
    pub image_width: u32,
    pub image_height: u32,
    pub model: String,
    pub inference_ms: u64,
}
