//! Embedding extractor abstraction and the recycling handle around it.
//!
//! ONNX Runtime's CPU provider keeps a memory arena that grows with every
//! inference and is only returned when the session is dropped. The
//! [`RecyclingExtractor`] counts inferences and, once a threshold is reached,
//! drops the live extractor and loads a fresh one before serving the next
//! call.

use std::time::Instant;

use image::RgbImage;
use thiserror::Error;

use crate::types::DetectedFace;

/// Service-wide upper bound on faces returned per image.
pub const DEFAULT_MAX_FACES_CAP: usize = 100;
/// Detections below this confidence are discarded.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
/// Inferences served before the extractor is reloaded.
pub const DEFAULT_RECYCLE_INTERVAL: u64 = 500;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("detector error: {0}")]
    Detector(#[from] crate::detector::DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] crate::recognizer::RecognizerError),
    #[error("extraction failed: {0}")]
    Failed(String),
}

/// Reloading the extractor failed; the process cannot keep serving.
#[derive(Error, Debug)]
#[error("failed to load extractor after {inferences} inferences: {source}")]
pub struct RecycleError {
    pub inferences: u64,
    #[source]
    pub source: ExtractorError,
}

/// Per-call detection limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionLimits {
    pub max_faces: usize,
    pub min_confidence: f32,
}

impl Default for DetectionLimits {
    fn default() -> Self {
        Self {
            max_faces: DEFAULT_MAX_FACES_CAP,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

/// Produces faces with embeddings from a decoded image.
pub trait Extractor: Send {
    /// Detect faces and compute their embeddings.
    ///
    /// Implementations may use `limits` to skip work, but callers must not
    /// rely on them honouring it; [`select_faces`] is applied afterwards.
    fn extract(
        &mut self,
        image: &RgbImage,
        limits: &DetectionLimits,
    ) -> Result<Vec<DetectedFace>, ExtractorError>;

    /// Identifier of the model pack, reported on the wire.
    fn model_name(&self) -> &str;
}

/// Creates fresh extractor instances, both at startup and on every recycle.
pub trait ExtractorLoader: Send {
    fn load(&mut self) -> Result<Box<dyn Extractor>, ExtractorError>;
}

impl<F> ExtractorLoader for F
where
    F: FnMut() -> Result<Box<dyn Extractor>, ExtractorError> + Send,
{
    fn load(&mut self) -> Result<Box<dyn Extractor>, ExtractorError> {
        self()
    }
}

/// Outcome of one extraction call.
///
/// `NoFaces` and `Failed` both degrade to an empty result at the HTTP
/// boundary but stay distinguishable here.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Faces(Vec<DetectedFace>),
    NoFaces,
    Failed(String),
}

impl Extraction {
    fn from_faces(faces: Vec<DetectedFace>) -> Self {
        if faces.is_empty() {
            Self::NoFaces
        } else {
            Self::Faces(faces)
        }
    }

    /// Faces found, empty for both `NoFaces` and `Failed`.
    pub fn into_faces(self) -> Vec<DetectedFace> {
        match self {
            Self::Faces(faces) => faces,
            Self::NoFaces | Self::Failed(_) => Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Sort by descending confidence, drop faces under the minimum and keep at
/// most `max_faces`.
pub fn select_faces(mut faces: Vec<DetectedFace>, limits: &DetectionLimits) -> Vec<DetectedFace> {
    faces.sort_by(|a, b| {
        b.confidence()
            .partial_cmp(&a.confidence())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    faces.retain(|f| f.confidence() >= limits.min_confidence);
    faces.truncate(limits.max_faces);
    faces
}

/// Lifecycle state of the wrapped extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Ready,
    Reloading,
}

/// Counters exposed for health reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecycleStats {
    pub since_load: u64,
    pub total_inferences: u64,
    pub reloads: u64,
    pub recycle_interval: u64,
}

/// Owns an extractor instance and recycles it every `recycle_interval`
/// inferences.
///
/// All methods take `&mut self`: the maybe-reload-then-infer sequence runs
/// under whatever exclusive owner holds the handle, so two callers can never
/// both trigger a reload or infer against an instance being torn down.
pub struct RecyclingExtractor {
    loader: Box<dyn ExtractorLoader>,
    current: Option<Box<dyn Extractor>>,
    state: HandleState,
    recycle_interval: u64,
    max_faces_cap: usize,
    since_load: u64,
    total_inferences: u64,
    reloads: u64,
    model_name: String,
}

impl RecyclingExtractor {
    /// Load the first extractor instance. A recycle interval of 0 disables
    /// recycling.
    pub fn new(
        mut loader: Box<dyn ExtractorLoader>,
        recycle_interval: u64,
        max_faces_cap: usize,
    ) -> Result<Self, RecycleError> {
        let start = Instant::now();
        let extractor = loader
            .load()
            .map_err(|source| RecycleError { inferences: 0, source })?;
        let model_name = extractor.model_name().to_string();
        tracing::info!(
            model = %model_name,
            recycle_interval,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "extractor loaded"
        );

        Ok(Self {
            loader,
            current: Some(extractor),
            state: HandleState::Ready,
            recycle_interval,
            max_faces_cap,
            since_load: 0,
            total_inferences: 0,
            reloads: 0,
            model_name,
        })
    }

    /// Run one extraction, reloading the extractor first if the interval has
    /// been reached.
    ///
    /// Extractor failures are absorbed into [`Extraction::Failed`]; only a
    /// failed reload is returned as an error.
    pub fn extract(
        &mut self,
        image: &RgbImage,
        limits: &DetectionLimits,
    ) -> Result<Extraction, RecycleError> {
        if self.recycle_interval > 0 && self.since_load >= self.recycle_interval {
            self.recycle()?;
        }

        let limits = DetectionLimits {
            max_faces: limits.max_faces.min(self.max_faces_cap),
            min_confidence: limits.min_confidence,
        };

        // Only empty if a previous reload failed and the caller kept going.
        if self.current.is_none() {
            self.recycle()?;
        }
        let Some(extractor) = self.current.as_mut() else {
            return Err(RecycleError {
                inferences: self.since_load,
                source: ExtractorError::Failed("extractor unavailable".into()),
            });
        };

        let result = extractor.extract(image, &limits);
        self.since_load += 1;
        self.total_inferences += 1;

        Ok(match result {
            Ok(faces) => Extraction::from_faces(select_faces(faces, &limits)),
            Err(e) => {
                tracing::warn!(error = %e, "face extraction failed; treating as no faces");
                Extraction::Failed(e.to_string())
            }
        })
    }

    /// Drop the live extractor, then load a replacement.
    fn recycle(&mut self) -> Result<(), RecycleError> {
        self.state = HandleState::Reloading;
        tracing::info!(inferences = self.since_load, "recycling extractor session");

        // Release the old arena before allocating the new one.
        drop(self.current.take());

        let start = Instant::now();
        let extractor = self.loader.load().map_err(|source| {
            tracing::error!(error = %source, "extractor reload failed");
            RecycleError {
                inferences: self.since_load,
                source,
            }
        })?;

        self.model_name = extractor.model_name().to_string();
        self.current = Some(extractor);
        self.since_load = 0;
        self.reloads += 1;
        self.state = HandleState::Ready;
        tracing::info!(
            reloads = self.reloads,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "extractor reloaded"
        );
        Ok(())
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn stats(&self) -> RecycleStats {
        RecycleStats {
            since_load: self.since_load,
            total_inferences: self.total_inferences,
            reloads: self.reloads,
            recycle_interval: self.recycle_interval,
        }
    }
}
