use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use sabaiface_core::{
    DetectionLimits, Extraction, ExtractorLoader, RecycleError, RecycleStats, RecyclingExtractor,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to load extractor: {0}")]
    Startup(#[from] RecycleError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("extractor reload failed: {0}")]
    RecycleFailed(String),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Result of one extraction served by the engine thread.
#[derive(Debug)]
pub struct ExtractOutput {
    pub extraction: Extraction,
    pub inference_ms: u64,
}

/// Engine knobs taken from the daemon config.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub recycle_interval: u64,
    pub max_faces_cap: usize,
    pub queue_depth: usize,
}

/// Counters mirrored out of the engine thread after every request.
#[derive(Debug, Default)]
struct SharedStats {
    since_load: AtomicU64,
    total_inferences: AtomicU64,
    reloads: AtomicU64,
    recycle_interval: AtomicU64,
}

impl SharedStats {
    fn publish(&self, stats: RecycleStats) {
        self.since_load.store(stats.since_load, Ordering::Relaxed);
        self.total_inferences.store(stats.total_inferences, Ordering::Relaxed);
        self.reloads.store(stats.reloads, Ordering::Relaxed);
        self.recycle_interval.store(stats.recycle_interval, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RecycleStats {
        RecycleStats {
            since_load: self.since_load.load(Ordering::Relaxed),
            total_inferences: self.total_inferences.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
            recycle_interval: self.recycle_interval.load(Ordering::Relaxed),
        }
    }
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Extract {
        image: RgbImage,
        limits: DetectionLimits,
        reply: oneshot::Sender<Result<ExtractOutput, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    stats: Arc<SharedStats>,
    model: Arc<str>,
}

impl EngineHandle {
    /// Queue an extraction and wait for the engine thread to serve it.
    pub async fn extract(
        &self,
        image: RgbImage,
        limits: DetectionLimits,
    ) -> Result<ExtractOutput, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Extract {
                image,
                limits,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Model pack name, fixed for the life of the engine.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn stats(&self) -> RecycleStats {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Receives the reload error that stopped the engine. The daemon treats it
/// as fatal.
pub type FatalReceiver = oneshot::Receiver<RecycleError>;

/// Spawn the engine on a dedicated OS thread.
///
/// Loads the first extractor synchronously so a missing model fails
/// startup, then serves requests one at a time. If a recycle fails the
/// pending caller gets [`EngineError::RecycleFailed`], the error goes out on
/// the returned [`FatalReceiver`] and the thread exits.
pub fn spawn_engine(
    loader: Box<dyn ExtractorLoader>,
    settings: EngineSettings,
) -> Result<(EngineHandle, FatalReceiver), EngineError> {
    let mut extractor =
        RecyclingExtractor::new(loader, settings.recycle_interval, settings.max_faces_cap)?;
    let model: Arc<str> = Arc::from(extractor.model_name());

    let stats = Arc::new(SharedStats::default());
    stats.publish(extractor.stats());

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(settings.queue_depth.max(1));
    let (fatal_tx, fatal_rx) = oneshot::channel();
    let thread_stats = Arc::clone(&stats);

    std::thread::Builder::new()
        .name("sabaiface-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Extract {
                        image,
                        limits,
                        reply,
                    } => {
                        let start = Instant::now();
                        let result = extractor.extract(&image, &limits);
                        drop(image);
                        thread_stats.publish(extractor.stats());

                        match result {
                            Ok(extraction) => {
                                let _ = reply.send(Ok(ExtractOutput {
                                    extraction,
                                    inference_ms: start.elapsed().as_millis() as u64,
                                }));
                            }
                            Err(err) => {
                                let _ = reply.send(Err(EngineError::RecycleFailed(err.to_string())));
                                let _ = fatal_tx.send(err);
                                break;
                            }
                        }
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok((EngineHandle { tx, stats, model }, fatal_rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sabaiface_core::{BoundingBox, DetectedFace, Embedding, Extractor, ExtractorError};
    use std::sync::atomic::AtomicUsize;

    /// Reports one face whose embedding is the top-left pixel.
    struct CornerExtractor;

    impl Extractor for CornerExtractor {
        fn extract(
            &mut self,
            image: &RgbImage,
            _limits: &DetectionLimits,
        ) -> Result<Vec<DetectedFace>, ExtractorError> {
            let p = image.get_pixel(0, 0);
            if p.0 == [0, 0, 0] {
                return Ok(Vec::new());
            }
            Ok(vec![DetectedFace {
                bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0, 0.9),
                embedding: Embedding::new(p.0.iter().map(|&c| c as f32).collect()),
            }])
        }

        fn model_name(&self) -> &str {
            "corner"
        }
    }

    /// Loader that succeeds `ok_loads` times, then fails.
    fn loader(ok_loads: usize) -> Box<dyn ExtractorLoader> {
        let count = Arc::new(AtomicUsize::new(0));
        Box::new(move || {
            if count.fetch_add(1, Ordering::SeqCst) < ok_loads {
                Ok(Box::new(CornerExtractor) as Box<dyn Extractor>)
            } else {
                Err(ExtractorError::Failed("model vanished".into()))
            }
        })
    }

    fn settings(recycle_interval: u64) -> EngineSettings {
        EngineSettings {
            recycle_interval,
            max_faces_cap: 100,
            queue_depth: 4,
        }
    }

    fn pixel(rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(2, 2, image::Rgb(rgb))
    }

    #[tokio::test]
    async fn test_extract_round_trip() {
        let (engine, _fatal) = spawn_engine(loader(1), settings(0)).unwrap();
        assert_eq!(engine.model(), "corner");

        let out = engine.extract(pixel([1, 2, 3]), DetectionLimits::default()).await.unwrap();
        let faces = out.extraction.into_faces();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].embedding.values, vec![1.0, 2.0, 3.0]);

        let out = engine.extract(pixel([0, 0, 0]), DetectionLimits::default()).await.unwrap();
        assert_eq!(out.extraction, Extraction::NoFaces);
        assert_eq!(engine.stats().total_inferences, 2);
    }

    #[tokio::test]
    async fn test_stats_track_reloads() {
        let (engine, _fatal) = spawn_engine(loader(10), settings(2)).unwrap();
        for _ in 0..5 {
            engine.extract(pixel([9, 9, 9]), DetectionLimits::default()).await.unwrap();
        }
        let stats = engine.stats();
        assert_eq!(stats.total_inferences, 5);
        assert_eq!(stats.reloads, 2);
        assert_eq!(stats.since_load, 1);
        assert_eq!(stats.recycle_interval, 2);
    }

    #[tokio::test]
    async fn test_failed_reload_is_fatal() {
        let (engine, fatal) = spawn_engine(loader(1), settings(1)).unwrap();

        engine.extract(pixel([5, 5, 5]), DetectionLimits::default()).await.unwrap();
        let err = engine
            .extract(pixel([5, 5, 5]), DetectionLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::RecycleFailed(_)));

        let fatal = fatal.await.unwrap();
        assert_eq!(fatal.inferences, 1);

        // The thread is gone; later calls see a closed channel.
        let err = engine
            .extract(pixel([5, 5, 5]), DetectionLimits::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ChannelClosed));
    }

    #[test]
    fn test_startup_failure_surfaces() {
        let err = spawn_engine(loader(0), settings(1)).err();
        assert!(matches!(err, Some(EngineError::Startup(_))));
    }
}
