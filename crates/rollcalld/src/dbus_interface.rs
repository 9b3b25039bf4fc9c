//! D-Bus interface for the rollcall attendance daemon.
//!
//! Bus name: org.rollcall.Attendance1
//! Object path: /org/rollcall/Attendance1
//!
//! Recognition-level rejections (unknown face, duplicate) come back as
//! JSON decisions, not D-Bus errors; only system faults map to errors.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use zbus::interface;

use rollcall_core::{AttendanceStatus, Embedding, PeriodId, RecognitionEvent};
use rollcall_store::{NewIdentity, RecordFilter};

use crate::engine::DecisionEngine;

pub struct AttendanceService {
    engine: Arc<DecisionEngine>,
}

impl AttendanceService {
    pub fn new(engine: Arc<DecisionEngine>) -> Self {
        Self { engine }
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn failed(err: impl std::fmt::Display) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(err.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(failed)
}

#[interface(name = "org.rollcall.Attendance1")]
impl AttendanceService {
    /// Feed one recognition event. `embedding` is the live face
    /// embedding; `captured_at` is RFC 3339 (empty = now); `source` is
    /// the camera id (empty = unset). Returns the decision as JSON.
    async fn mark(
        &self,
        embedding: Vec<f64>,
        captured_at: &str,
        source: &str,
    ) -> zbus::fdo::Result<String> {
        let captured_at = if captured_at.is_empty() {
            Utc::now()
        } else {
            DateTime::parse_from_rfc3339(captured_at)
                .map_err(|e| zbus::fdo::Error::InvalidArgs(format!("captured_at: {e}")))?
                .with_timezone(&Utc)
        };
        let event = RecognitionEvent {
            embedding: Embedding::new(embedding.into_iter().map(|v| v as f32).collect()),
            captured_at,
            source: non_empty(source),
        };

        let decision = self.engine.process(event).await.map_err(failed)?;
        to_json(&decision)
    }

    /// Enroll an identity with one or more reference embeddings.
    /// Returns the number of references stored.
    async fn enroll(
        &self,
        identity: &str,
        display_name: &str,
        email: &str,
        department: &str,
        references: Vec<Vec<f64>>,
    ) -> zbus::fdo::Result<u32> {
        tracing::info!(identity, "enroll requested");
        let references: Vec<Embedding> = references
            .into_iter()
            .map(|values| Embedding::new(values.into_iter().map(|v| v as f32).collect()))
            .collect();
        let count = self
            .engine
            .enroll(
                NewIdentity {
                    id: identity.to_string(),
                    display_name: display_name.to_string(),
                    email: non_empty(email),
                    department: non_empty(department),
                },
                references,
            )
            .await
            .map_err(failed)?;
        Ok(count as u32)
    }

    /// Remove an enrolled identity. Committed attendance records remain.
    async fn unenroll(&self, identity: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(identity, "unenroll requested");
        self.engine.unenroll(identity).await.map_err(failed)
    }

    /// List enrolled identities as JSON.
    async fn list_identities(&self) -> zbus::fdo::Result<String> {
        let identities = self.engine.store().list_identities().await.map_err(failed)?;
        let rows: Vec<_> = identities
            .iter()
            .map(|i| {
                serde_json::json!({
                    "id": i.id,
                    "display_name": i.display_name,
                    "email": i.email,
                    "department": i.department,
                    "created_at": i.created_at.to_rfc3339(),
                    "reference_count": i.reference_count,
                })
            })
            .collect();
        to_json(&rows)
    }

    /// Query attendance records as JSON. Empty strings mean unfiltered.
    async fn report(
        &self,
        identity: &str,
        period_from: &str,
        period_to: &str,
        status: &str,
    ) -> zbus::fdo::Result<String> {
        let status = match status {
            "" => None,
            s => Some(AttendanceStatus::parse(s).ok_or_else(|| {
                zbus::fdo::Error::InvalidArgs(format!("unknown status: {s}"))
            })?),
        };
        let filter = RecordFilter {
            identity: non_empty(identity),
            period_from: non_empty(period_from).map(PeriodId::from),
            period_to: non_empty(period_to).map(PeriodId::from),
            status,
        };
        let records = self.engine.store().query(filter).await.map_err(failed)?;
        to_json(&records)
    }

    /// Per-period attendance counts, most recent first, as JSON.
    async fn summary(&self, limit: u32) -> zbus::fdo::Result<String> {
        let counts = self
            .engine
            .store()
            .summary(limit as usize)
            .await
            .map_err(failed)?;
        let rows: Vec<_> = counts
            .iter()
            .map(|c| {
                serde_json::json!({
                    "period": c.period.as_str(),
                    "attendees": c.attendees,
                })
            })
            .collect();
        to_json(&rows)
    }

    /// Daemon status as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let (identities, references) = self.engine.gallery_stats().await;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "identities": identities,
            "reference_embeddings": references,
        })
        .to_string())
    }
}
