//! Embedding-based identity matching.
//!
//! A probe is an opaque fixed-length vector; a student may have several
//! stored embeddings. A student matches when ANY of their embeddings is
//! within `tolerance` of the probe.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum embedding distance accepted as a positive identity match.
pub const DEFAULT_TOLERANCE: f32 = 0.6;

/// Face embedding vector (opaque, fixed-length).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean distance between two embeddings. Symmetric; lower = closer.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A stored embedding attributed to a student: one gallery entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrolledFace {
    pub student_id: Uuid,
    pub embedding: Embedding,
}

/// A positive identification.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchHit {
    pub student_id: Uuid,
    pub distance: f32,
}

/// Strategy for resolving a probe against a gallery of enrolled embeddings.
pub trait Matcher {
    fn identify(&self, probe: &Embedding, gallery: &[EnrolledFace], tolerance: f32)
        -> Option<MatchHit>;
}

/// Euclidean-distance matcher with first-match-wins semantics.
///
/// The gallery is scanned in ascending `student_id` order so that the
/// winner is reproducible when more than one student falls within
/// tolerance. Simultaneous multi-student matches are not flagged as
/// ambiguous; the lowest id wins.
pub struct DistanceMatcher;

impl Matcher for DistanceMatcher {
    fn identify(
        &self,
        probe: &Embedding,
        gallery: &[EnrolledFace],
        tolerance: f32,
    ) -> Option<MatchHit> {
        let mut ordered: Vec<&EnrolledFace> = gallery.iter().collect();
        ordered.sort_by_key(|face| face.student_id);

        for face in ordered {
            let distance = probe.euclidean_distance(&face.embedding);
            if distance <= tolerance {
                tracing::debug!(
                    student = %face.student_id,
                    distance,
                    tolerance,
                    "probe matched enrolled embedding"
                );
                return Some(MatchHit {
                    student_id: face.student_id,
                    distance,
                });
            }
        }
        None
    }
}
