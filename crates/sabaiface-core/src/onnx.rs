//! ONNX model pack extractor: SCRFD detection followed by ArcFace embedding.

use std::path::PathBuf;

use image::RgbImage;

use crate::detector::{FaceDetector, SCRFD_DEFAULT_INPUT_SIZE};
use crate::extractor::{select_faces, DetectionLimits, Extractor, ExtractorError};
use crate::recognizer::FaceRecognizer;
use crate::types::DetectedFace;

pub const DETECTOR_FILE: &str = "det_10g.onnx";
pub const RECOGNIZER_FILE: &str = "w600k_r50.onnx";

/// Where to find a model pack and how to run it.
#[derive(Debug, Clone)]
pub struct ModelPack {
    /// Directory containing one sub-directory per pack.
    pub model_dir: PathBuf,
    /// Pack name, e.g. `buffalo_l`. Reported as the model on the wire.
    pub name: String,
    /// Square detector input size in pixels.
    pub det_size: usize,
    pub intra_threads: usize,
}

impl ModelPack {
    pub fn new(model_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            model_dir: model_dir.into(),
            name: name.into(),
            det_size: SCRFD_DEFAULT_INPUT_SIZE,
            intra_threads: 2,
        }
    }

    pub fn dir(&self) -> PathBuf {
        self.model_dir.join(&self.name)
    }

    pub fn detector_path(&self) -> PathBuf {
        self.dir().join(DETECTOR_FILE)
    }

    pub fn recognizer_path(&self) -> PathBuf {
        self.dir().join(RECOGNIZER_FILE)
    }

    /// Both model files are present on disk.
    pub fn is_installed(&self) -> bool {
        self.detector_path().exists() && self.recognizer_path().exists()
    }
}

/// Detector and recognizer sessions loaded from one [`ModelPack`].
pub struct OnnxExtractor {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    model_name: String,
}

impl OnnxExtractor {
    pub fn load(pack: &ModelPack) -> Result<Self, ExtractorError> {
        let detector =
            FaceDetector::load(&pack.detector_path(), pack.det_size, pack.intra_threads)?;
        let recognizer = FaceRecognizer::load(&pack.recognizer_path(), pack.intra_threads)?;
        tracing::info!(
            pack = %pack.name,
            dir = %pack.dir().display(),
            embedding_model = recognizer.model_version(),
            "model pack loaded"
        );
        Ok(Self {
            detector,
            recognizer,
            model_name: pack.name.clone(),
        })
    }
}

impl Extractor for OnnxExtractor {
    fn extract(
        &mut self,
        image: &RgbImage,
        limits: &DetectionLimits,
    ) -> Result<Vec<DetectedFace>, ExtractorError> {
        let boxes = self.detector.detect(image, limits.min_confidence)?;
        tracing::trace!(candidates = boxes.len(), "detector pass");

        // Embedding is the expensive step, so only the faces that survive
        // selection get one. Boxes come back sorted by confidence.
        let mut faces = Vec::with_capacity(boxes.len().min(limits.max_faces));
        for bbox in boxes.into_iter().take(limits.max_faces) {
            let embedding = self.recognizer.embed(image, &bbox)?;
            faces.push(DetectedFace { bbox, embedding });
        }
        Ok(select_faces(faces, limits))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
