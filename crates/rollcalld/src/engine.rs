//! Attendance decision engine.
//!
//! Orchestrates matcher → dedup tracker → ledger for each recognition
//! event. Safe to call from any number of concurrent tasks; when events
//! for the same identity race, the ledger's unique constraint decides
//! the winner and every loser is reported as a duplicate.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use rollcall_core::{
    AttendanceRecord, AttendanceStatus, CosineMatcher, DedupTracker, Embedding, Gallery,
    MatchError, Matcher, PeriodId, PeriodPolicy, RecognitionEvent, ThresholdPolicy,
};
use rollcall_store::{AttendanceStore, NewIdentity, StoreError};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("storage failure: {0}")]
    Store(#[from] StoreError),
}

/// Terminal outcome for one recognition event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// A new attendance record was committed.
    Committed {
        identity: String,
        period: PeriodId,
        record_id: String,
        confidence: f32,
    },
    /// Attendance already recorded for this identity and period. The
    /// expected common case for a continuously running camera feed.
    Duplicate { identity: String, period: PeriodId },
    /// Unknown face, ambiguous match, or nothing enrolled.
    LowConfidence { distance: Option<f32> },
}

pub struct DecisionEngine {
    store: AttendanceStore,
    /// Copy-on-write gallery snapshot: matcher reads clone the Arc,
    /// enrollment swaps in a fresh snapshot.
    gallery: RwLock<Arc<Gallery>>,
    dedup: DedupTracker,
    matcher: CosineMatcher,
    thresholds: ThresholdPolicy,
    period: PeriodPolicy,
}

impl DecisionEngine {
    /// Build the engine: load the gallery and rebuild the dedup cache
    /// from ledger contents.
    pub async fn new(
        store: AttendanceStore,
        thresholds: ThresholdPolicy,
        period: PeriodPolicy,
    ) -> Result<Self, EngineError> {
        let gallery = store.load_gallery().await?;
        let dedup = DedupTracker::new();
        dedup.rebuild(store.committed_pairs().await?);
        tracing::info!(
            identities = gallery.len(),
            references = gallery.reference_count(),
            cached_commits = dedup.len(),
            "decision engine ready"
        );
        Ok(Self {
            store,
            gallery: RwLock::new(Arc::new(gallery)),
            dedup,
            matcher: CosineMatcher,
            thresholds,
            period,
        })
    }

    /// Decide one recognition event.
    ///
    /// Only system faults return `Err`; every recognition-level outcome
    /// (unknown face, duplicate, lost race) is a `Decision`.
    pub async fn process(&self, event: RecognitionEvent) -> Result<Decision, EngineError> {
        let gallery = self.gallery.read().await.clone();

        let result = match self.matcher.resolve(&event.embedding, &gallery, &self.thresholds) {
            Ok(result) => result,
            Err(MatchError::NoEnrolledIdentities) => {
                tracing::debug!("no enrolled identities; event discarded");
                return Ok(Decision::LowConfidence { distance: None });
            }
            Err(e @ MatchError::DimensionMismatch { .. }) => {
                tracing::warn!(error = %e, "probe rejected");
                return Ok(Decision::LowConfidence { distance: None });
            }
        };

        let Some(identity) = result.identity.clone() else {
            tracing::debug!(
                distance = result.distance,
                threshold = result.threshold,
                "below threshold; event discarded"
            );
            return Ok(Decision::LowConfidence {
                distance: Some(result.distance),
            });
        };

        let period = self.period.period_for(event.captured_at);

        // Fast path: skip the write when the cache already knows.
        if self.dedup.already_committed(&identity, &period) {
            tracing::debug!(identity = %identity, period = %period, "duplicate event");
            return Ok(Decision::Duplicate { identity, period });
        }

        let record = AttendanceRecord {
            id: Uuid::new_v4().to_string(),
            identity_id: identity.clone(),
            period: period.clone(),
            marked_at: event.captured_at,
            confidence: result.confidence(),
            status: AttendanceStatus::Present,
            source: event.source,
        };
        let record_id = record.id.clone();
        let confidence = record.confidence;

        match self.store.append(record).await {
            Ok(()) => {
                // Best-effort cache warm; correctness came from append.
                self.dedup.mark_committed(&identity, &period);
                tracing::info!(
                    identity = %identity,
                    period = %period,
                    confidence,
                    "attendance committed"
                );
                Ok(Decision::Committed {
                    identity,
                    period,
                    record_id,
                    confidence,
                })
            }
            Err(StoreError::AlreadyExists { .. }) => {
                // Lost the append race to a concurrent event. Same
                // outcome as the fast path, not an error.
                self.dedup.mark_committed(&identity, &period);
                tracing::debug!(identity = %identity, period = %period, "lost append race");
                Ok(Decision::Duplicate { identity, period })
            }
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "ledger append failed; event dropped");
                Err(e.into())
            }
        }
    }

    /// Enroll a new identity and swap in a fresh gallery snapshot.
    pub async fn enroll(
        &self,
        identity: NewIdentity,
        references: Vec<Embedding>,
    ) -> Result<usize, EngineError> {
        let count = self.store.enroll(identity, references).await?;
        self.reload_gallery().await?;
        Ok(count)
    }

    /// Remove an identity. Its committed attendance records remain.
    pub async fn unenroll(&self, identity_id: &str) -> Result<bool, EngineError> {
        let removed = self.store.unenroll(identity_id).await?;
        if removed {
            self.reload_gallery().await?;
        }
        Ok(removed)
    }

    /// (identities, total reference embeddings) in the current snapshot.
    pub async fn gallery_stats(&self) -> (usize, usize) {
        let gallery = self.gallery.read().await;
        (gallery.len(), gallery.reference_count())
    }

    pub fn store(&self) -> &AttendanceStore {
        &self.store
    }

    async fn reload_gallery(&self) -> Result<(), EngineError> {
        let fresh = self.store.load_gallery().await?;
        *self.gallery.write().await = Arc::new(fresh);
        Ok(())
    }
}
