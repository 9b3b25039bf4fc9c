use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::period::PeriodId;

/// Face embedding vector (typically 512-dimensional).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    /// Embeddings from different model versions are not comparable.
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar.
    /// Uses constant-time computation: always processes all dimensions.
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
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }

    /// Cosine distance: `1 - similarity`, in [0, 2]. Lower = more similar.
    pub fn cosine_distance(&self, other: &Embedding) -> f32 {
        1.0 - self.similarity(other)
    }
}

/// One enrolled identity with its reference embeddings, as seen by the
/// matcher. A gallery snapshot is immutable; enrollment swaps in a new one.
#[derive(Debug, Clone)]
pub struct GalleryIdentity {
    pub id: String,
    pub display_name: String,
    pub references: Vec<Embedding>,
}

/// Snapshot of all enrolled identities.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    pub identities: Vec<GalleryIdentity>,
}

impl Gallery {
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Total reference embeddings across all identities.
    pub fn reference_count(&self) -> usize {
        self.identities.iter().map(|i| i.references.len()).sum()
    }
}

/// A live recognition event from the frame-processing collaborator.
///
/// Ephemeral: produced continuously (potentially 30/sec per face),
/// consumed exactly once by the decision engine.
#[derive(Debug, Clone)]
pub struct RecognitionEvent {
    pub embedding: Embedding,
    pub captured_at: DateTime<Utc>,
    /// Camera or frame-source identifier, if the collaborator provides one.
    pub source: Option<String>,
}

/// Result of resolving a probe embedding against the gallery.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Matched identity id, or `None` for an open-set non-match.
    pub identity: Option<String>,
    /// Display name of the matched identity (if any).
    pub display_name: Option<String>,
    /// Cosine distance of the best candidate, even when below threshold.
    pub distance: f32,
    /// `max_distance` in force when this result was produced.
    pub threshold: f32,
}

impl MatchResult {
    pub fn matched(&self) -> bool {
        self.identity.is_some()
    }

    /// Confidence as `1 - distance`, mirroring how distance-based
    /// recognizers report it.
    pub fn confidence(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Status of a committed attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(AttendanceStatus::Present),
            _ => None,
        }
    }
}

/// A committed attendance record. Immutable after creation; corrections
/// would be new records, never mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: String,
    pub identity_id: String,
    pub period: PeriodId,
    /// First-seen timestamp: capture time of the event that committed.
    pub marked_at: DateTime<Utc>,
    /// Match confidence at commit time.
    pub confidence: f32,
    pub status: AttendanceStatus,
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = Embedding::new(vec![1.0, 0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!((a.similarity(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![-1.0, 0.0]);
        assert!((a.similarity(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_cosine_distance_range() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let same = Embedding::new(vec![2.0, 0.0]);
        let opposite = Embedding::new(vec![-1.0, 0.0]);
        assert!(a.cosine_distance(&same).abs() < 1e-6);
        assert!((a.cosine_distance(&opposite) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_gallery_reference_count() {
        let gallery = Gallery {
            identities: vec![
                GalleryIdentity {
                    id: "u1".into(),
                    display_name: "One".into(),
                    references: vec![Embedding::new(vec![1.0]), Embedding::new(vec![0.5])],
                },
                GalleryIdentity {
                    id: "u2".into(),
                    display_name: "Two".into(),
                    references: vec![Embedding::new(vec![0.0])],
                },
            ],
        };
        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery.reference_count(), 3);
    }

    #[test]
    fn test_status_roundtrip() {
        assert_eq!(
            AttendanceStatus::parse(AttendanceStatus::Present.as_str()),
            Some(AttendanceStatus::Present)
        );
        assert_eq!(AttendanceStatus::parse("absent"), None);
    }
}
