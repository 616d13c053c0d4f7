use serde::{Deserialize, Serialize};

/// Pixel-space bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Detection confidence in [0, 1].
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// Box without landmarks, as produced by detectors that only emit rectangles.
    pub fn new(x: f32, y: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
            landmarks: None,
        }
    }

    /// Convert to coordinates relative to the source image.
    ///
    /// Each component is divided by the matching image dimension. A zero
    /// dimension yields an all-zero box rather than NaN or infinity.
    pub fn normalize(&self, image_width: u32, image_height: u32) -> RelativeBox {
        if image_width == 0 || image_height == 0 {
            return RelativeBox::default();
        }
        let w = image_width as f32;
        let h = image_height as f32;
        RelativeBox {
            left: self.x / w,
            top: self.y / h,
            width: self.width / w,
            height: self.height / h,
        }
    }
}

/// Bounding box expressed as ratios of the image dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RelativeBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Face embedding vector (typically 512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar. A zero-norm
    /// vector on either side yields 0.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Euclidean distance after scaling both vectors to unit length.
    pub fn euclidean_l2_distance(&self, other: &Embedding) -> f32 {
        let a = l2_normalize(&self.values);
        let b = l2_normalize(&other.values);
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }
}

/// Scale a vector to unit L2 norm. Zero vectors are returned unchanged.
pub fn l2_normalize(values: &[f32]) -> Vec<f32> {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.iter().map(|x| x / norm).collect()
    } else {
        values.to_vec()
    }
}

/// A face found by the extractor in a single image. Not stored until indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}

impl DetectedFace {
    pub fn confidence(&self) -> f32 {
        self.bbox.confidence
    }
}

/// An indexed face owned by exactly one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub face_id: String,
    pub external_image_id: String,
    pub embedding: Embedding,
    pub bbox: BoundingBox,
    /// Pixel dimensions of the source image, kept so the box can be
    /// normalized later without the image.
    pub image_width: u32,
    pub image_height: u32,
}

impl FaceRecord {
    /// Mint a record with a fresh random face ID.
    pub fn from_detection(
        face: DetectedFace,
        external_image_id: &str,
        image_width: u32,
        image_height: u32,
    ) -> Self {
        Self {
            face_id: uuid::Uuid::new_v4().to_string(),
            external_image_id: external_image_id.to_string(),
            embedding: face.embedding,
            bbox: face.bbox,
            image_width,
            image_height,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.bbox.confidence
    }

    pub fn relative_box(&self) -> RelativeBox {
        self.bbox.normalize(self.image_width, self.image_height)
    }
}

/// Summary of a collection, without its face records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub id: String,
    pub face_count: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = emb(&[1.0, 0.0, 0.0]);
        let b = emb(&[1.0, 0.0, 0.0]);
        assert!((a.similarity(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = emb(&[1.0, 0.0]);
        let b = emb(&[0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = emb(&[1.0, 0.0]);
        let b = emb(&[-1.0, 0.0]);
        assert!((a.similarity(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = emb(&[0.0, 0.0]);
        let b = emb(&[1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
        assert_eq!(b.similarity(&a), 0.0);
    }

    #[test]
    fn test_cosine_similarity_symmetric() {
        let pairs = [
            (vec![0.3, -1.2, 4.0], vec![2.0, 0.5, -0.7]),
            (vec![1.0, 1.0], vec![3.0, -2.0]),
            (vec![0.01, 0.02, 0.03, 0.04], vec![9.0, 7.0, 5.0, 3.0]),
        ];
        for (a, b) in pairs {
            let (a, b) = (Embedding::new(a), Embedding::new(b));
            assert_eq!(a.similarity(&b), b.similarity(&a));
        }
    }

    #[test]
    fn test_euclidean_l2_ignores_magnitude() {
        let a = emb(&[3.0, 0.0]);
        let b = emb(&[0.5, 0.0]);
        assert!(a.euclidean_l2_distance(&b).abs() < 1e-6);
        assert!((a.euclidean_distance(&b) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_divides_by_dimensions() {
        let bbox = BoundingBox::new(50.0, 25.0, 100.0, 50.0, 0.9);
        let rel = bbox.normalize(200, 100);
        assert_eq!(
            rel,
            RelativeBox { left: 0.25, top: 0.25, width: 0.5, height: 0.5 }
        );
    }

    #[test]
    fn test_normalize_zero_dimension() {
        let bbox = BoundingBox::new(10.0, 10.0, 20.0, 20.0, 0.9);
        assert_eq!(bbox.normalize(0, 100), RelativeBox::default());
        assert_eq!(bbox.normalize(100, 0), RelativeBox::default());
        assert_eq!(bbox.normalize(0, 0), RelativeBox::default());
    }

    #[test]
    fn test_face_ids_are_unique() {
        let face = DetectedFace {
            bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0, 0.9),
            embedding: emb(&[1.0, 0.0]),
        };
        let a = FaceRecord::from_detection(face.clone(), "group.jpg", 4, 4);
        let b = FaceRecord::from_detection(face, "group.jpg", 4, 4);
        assert_ne!(a.face_id, b.face_id);
        assert_eq!(a.external_image_id, "group.jpg");
    }
}
