//! Open-set identity matching.
//!
//! Resolves a probe embedding to the nearest enrolled identity, or to
//! "unknown" when the best candidate is too far away or two identities
//! are too close to call apart.

use thiserror::Error;

use crate::types::{Embedding, Gallery, MatchResult};

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("no enrolled identities to match against")]
    NoEnrolledIdentities,
    #[error("probe dimension {probe} does not match reference dimension {reference}")]
    DimensionMismatch { probe: usize, reference: usize },
}

/// Distance thresholds governing open-set acceptance.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdPolicy {
    /// Maximum cosine distance for a positive match.
    pub max_distance: f32,
    /// If the runner-up identity is within this margin of the winner,
    /// the match is ambiguous and resolves to unknown.
    pub ambiguity_margin: f32,
}

/// Strategy for resolving a probe embedding against a gallery snapshot.
pub trait Matcher {
    fn resolve(
        &self,
        probe: &Embedding,
        gallery: &Gallery,
        policy: &ThresholdPolicy,
    ) -> Result<MatchResult, MatchError>;
}

/// Cosine distance matcher with constant-time gallery traversal.
///
/// Always iterates every reference of every identity. Per-identity score
/// is the minimum distance among that identity's references; the winner
/// is the global minimum.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn resolve(
        &self,
        probe: &Embedding,
        gallery: &Gallery,
        policy: &ThresholdPolicy,
    ) -> Result<MatchResult, MatchError> {
        let mut best: Option<(usize, f32)> = None;
        let mut runner_up = f32::INFINITY;

        for (idx, identity) in gallery.identities.iter().enumerate() {
            let mut identity_best = f32::INFINITY;
            for reference in &identity.references {
                if reference.len() != probe.len() {
                    return Err(MatchError::DimensionMismatch {
                        probe: probe.len(),
                        reference: reference.len(),
                    });
                }
                let d = probe.cosine_distance(reference);
                if d < identity_best {
                    identity_best = d;
                }
            }
            if identity.references.is_empty() {
                continue;
            }

            match best {
                None => best = Some((idx, identity_best)),
                Some((_, best_d)) if identity_best < best_d => {
                    runner_up = best_d;
                    best = Some((idx, identity_best));
                }
                Some(_) => {
                    if identity_best < runner_up {
                        runner_up = identity_best;
                    }
                }
            }
        }

        // Empty gallery, or every identity had zero references.
        let Some((idx, distance)) = best else {
            return Err(MatchError::NoEnrolledIdentities);
        };

        if distance > policy.max_distance {
            return Ok(MatchResult {
                identity: None,
                display_name: None,
                distance,
                threshold: policy.max_distance,
            });
        }

        // Two identities within the margin: unknown over an arbitrary pick.
        if runner_up.is_finite() && runner_up - distance < policy.ambiguity_margin {
            return Ok(MatchResult {
                identity: None,
                display_name: None,
                distance,
                threshold: policy.max_distance,
            });
        }

        let winner = &gallery.identities[idx];
        Ok(MatchResult {
            identity: Some(winner.id.clone()),
            display_name: Some(winner.display_name.clone()),
            distance,
            threshold: policy.max_distance,
        })
    }
}
