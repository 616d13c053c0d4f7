//! Exact nearest-neighbour matching of a probe embedding against a gallery.
//!
//! Every gallery entry is scored; there is no index structure. Results are
//! filtered by threshold, stably sorted best-first and truncated.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::types::{Embedding, FaceRecord};

/// Comparison metric between two embeddings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Metric {
    /// Cosine similarity, higher is better.
    #[default]
    Cosine,
    /// Raw Euclidean distance, lower is better.
    Euclidean,
    /// Euclidean distance between unit-normalized vectors, lower is better.
    EuclideanL2,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown distance metric '{0}' (expected cosine, euclidean or euclidean_l2)")]
pub struct UnknownMetric(String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" => Ok(Self::Euclidean),
            "euclidean_l2" => Ok(Self::EuclideanL2),
            other => Err(UnknownMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::EuclideanL2 => "euclidean_l2",
        })
    }
}

impl Metric {
    /// Whether larger raw scores mean more similar faces.
    pub fn higher_is_better(self) -> bool {
        matches!(self, Self::Cosine)
    }

    /// Raw score between two embeddings under this metric.
    pub fn score(self, a: &Embedding, b: &Embedding) -> f32 {
        match self {
            Self::Cosine => a.similarity(b),
            Self::Euclidean => a.euclidean_distance(b),
            Self::EuclideanL2 => a.euclidean_l2_distance(b),
        }
    }

    /// Inclusive threshold test in the metric's own direction.
    pub fn accepts(self, score: f32, threshold: f32) -> bool {
        if self.higher_is_better() {
            score >= threshold
        } else {
            score <= threshold
        }
    }

    /// Map a raw score onto a similarity where higher means more alike.
    ///
    /// Cosine scores pass through unchanged. L2-normalized distances lie in
    /// [0, 2] and map linearly onto [1, 0]; raw distances map to 1 / (1 + d).
    pub fn similarity(self, score: f32) -> f32 {
        match self {
            Self::Cosine => score,
            Self::Euclidean => 1.0 / (1.0 + score.max(0.0)),
            Self::EuclideanL2 => (1.0 - score / 2.0).clamp(0.0, 1.0),
        }
    }

    /// Ordering that puts the better of two scores first.
    fn best_first(self, a: f32, b: f32) -> Ordering {
        let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        if self.higher_is_better() {
            ord.reverse()
        } else {
            ord
        }
    }
}

/// Parameters of a single search, on the internal 0–1 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Minimum similarity (or maximum distance) a match must reach, inclusive.
    pub threshold: f32,
    pub max_results: usize,
}

impl SearchParams {
    /// Build from a 0–100 threshold as used on the wire.
    pub fn from_percent(threshold_pct: f32, max_results: usize) -> Self {
        Self {
            threshold: threshold_pct / 100.0,
            max_results,
        }
    }
}

/// A gallery entry that passed the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceMatch {
    pub face_id: String,
    pub external_image_id: String,
    /// Detection confidence of the stored face, 0–1.
    pub confidence: f32,
    /// Raw metric value (similarity or distance).
    pub score: f32,
    /// Similarity in the "higher is better" sense, 0–1 for cosine matches
    /// above a non-negative threshold.
    pub similarity: f32,
}

/// Strategy for ranking a gallery against a probe embedding.
pub trait Matcher: Send + Sync {
    fn rank(&self, probe: &Embedding, gallery: &[FaceRecord], params: &SearchParams)
        -> Vec<FaceMatch>;
}

impl Matcher for Metric {
    fn rank(
        &self,
        probe: &Embedding,
        gallery: &[FaceRecord],
        params: &SearchParams,
    ) -> Vec<FaceMatch> {
        let metric = *self;

        let mut scored: Vec<(usize, f32)> = gallery
            .iter()
            .enumerate()
            .map(|(i, record)| (i, metric.score(probe, &record.embedding)))
            .filter(|&(_, score)| metric.accepts(score, params.threshold))
            .collect();

        // Stable: equal scores keep gallery order.
        scored.sort_by(|a, b| metric.best_first(a.1, b.1));
        scored.truncate(params.max_results);

        scored
            .into_iter()
            .map(|(i, score)| {
                let record = &gallery[i];
                FaceMatch {
                    face_id: record.face_id.clone(),
                    external_image_id: record.external_image_id.clone(),
                    confidence: record.confidence(),
                    score,
                    similarity: metric.similarity(score),
                }
            })
            .collect()
    }
}
