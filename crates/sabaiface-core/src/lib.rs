//! sabaiface-core: face collections and similarity search.
//!
//! Holds the data model, the collection store, exact nearest-neighbour
//! matching and the recycling extractor handle. The bundled extractor runs
//! SCRFD detection and ArcFace recognition via ONNX Runtime on the CPU.

pub mod alignment;
pub mod detector;
pub mod extractor;
pub mod matcher;
pub mod onnx;
pub mod recognizer;
pub mod store;
pub mod types;

pub use extractor::{
    DetectionLimits, Extraction, Extractor, ExtractorError, ExtractorLoader, HandleState,
    RecycleError, RecycleStats, RecyclingExtractor,
};
pub use matcher::{FaceMatch, Matcher, Metric, SearchParams};
pub use onnx::{ModelPack, OnnxExtractor};
pub use store::{FaceStore, MemoryStore, StoreError};
pub use types::{BoundingBox, CollectionInfo, DetectedFace, Embedding, FaceRecord, RelativeBox};
