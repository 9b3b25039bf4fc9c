//! rollcall-store — durable embedding store and attendance ledger.
//!
//! Single SQLite database in WAL mode, accessed asynchronously through
//! tokio-rusqlite. The attendance table's UNIQUE(identity_id, period)
//! constraint is the system's consistency authority: concurrent writers
//! racing on the same identity resolve here, not in application locks.

mod error;
mod schema;
mod vector;

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;
use tokio_rusqlite::Connection;
use uuid::Uuid;

use rollcall_core::{
    AttendanceRecord, AttendanceStatus, Embedding, Gallery, GalleryIdentity, PeriodId,
};

pub use error::StoreError;

/// A new identity to enroll.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub department: Option<String>,
}

/// One row of the identity listing.
#[derive(Debug, Clone)]
pub struct IdentitySummary {
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reference_count: usize,
}

/// Ledger query filter. All fields optional; unset means unfiltered.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub identity: Option<String>,
    pub period_from: Option<PeriodId>,
    pub period_to: Option<PeriodId>,
    pub status: Option<AttendanceStatus>,
}

/// Per-period attendance count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodCount {
    pub period: PeriodId,
    pub attendees: i64,
}

/// Handle to the attendance database. Cheap to clone; clones share one
/// connection behind tokio-rusqlite's worker thread.
#[derive(Clone)]
pub struct AttendanceStore {
    conn: Connection,
}

impl AttendanceStore {
    /// Open (or create) the database at the given path and apply the
    /// schema and pragmas.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path.to_path_buf()).await?;
        let store = Self { conn };
        store.init().await?;
        tracing::info!(path = %path.display(), "attendance store opened");
        Ok(store)
    }

    /// In-memory database (tests).
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        let store = Self { conn };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                // synchronous = FULL: append() acknowledges only records
                // that survive a crash.
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = FULL;
                     PRAGMA busy_timeout = 5000;
                     PRAGMA foreign_keys = ON;",
                )?;
                conn.execute_batch(schema::SCHEMA_SQL)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Enroll a new identity with its reference embeddings, atomically.
    /// Returns the number of references stored.
    pub async fn enroll(
        &self,
        identity: NewIdentity,
        references: Vec<Embedding>,
    ) -> Result<usize, StoreError> {
        if references.is_empty() {
            return Err(StoreError::NoReferences);
        }
        let identity_id = identity.id.clone();
        let count = references.len();

        let result = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let now = ts_to_sql(&Utc::now());
                tx.execute(
                    "INSERT INTO identities (id, display_name, email, department, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        identity.id,
                        identity.display_name,
                        identity.email,
                        identity.department,
                        now
                    ],
                )?;
                for embedding in &references {
                    tx.execute(
                        "INSERT INTO reference_embeddings
                             (id, identity_id, vector, dim, model_version, captured_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            Uuid::new_v4().to_string(),
                            identity.id,
                            vector::encode(&embedding.values),
                            embedding.values.len() as i64,
                            embedding.model_version,
                            now
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await;

        match result {
            Ok(()) => {
                tracing::info!(identity = %identity_id, references = count, "identity enrolled");
                Ok(count)
            }
            Err(tokio_rusqlite::Error::Rusqlite(e)) if error::is_unique_violation(&e) => {
                Err(StoreError::IdentityExists(identity_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an identity and its reference embeddings. Attendance
    /// records are retained. Returns whether an identity was removed.
    pub async fn unenroll(&self, identity_id: &str) -> Result<bool, StoreError> {
        let id = identity_id.to_string();
        let removed = self
            .conn
            .call(move |conn| {
                let n = conn.execute("DELETE FROM identities WHERE id = ?1", params![id])?;
                Ok(n > 0)
            })
            .await?;
        if removed {
            tracing::info!(identity = identity_id, "identity unenrolled");
        }
        Ok(removed)
    }

    /// Load a gallery snapshot of all identities and their references.
    pub async fn load_gallery(&self) -> Result<Gallery, StoreError> {
        let gallery = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT id, display_name FROM identities ORDER BY id")?;
                let identities: Vec<(String, String)> = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<rusqlite::Result<_>>()?;

                let mut stmt = conn.prepare(
                    "SELECT identity_id, vector, dim, model_version
                     FROM reference_embeddings ORDER BY identity_id, captured_at",
                )?;
                let rows: Vec<(String, Vec<u8>, i64, Option<String>)> = stmt
                    .query_map([], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<rusqlite::Result<_>>()?;
                Ok((identities, rows))
            })
            .await
            .map_err(StoreError::from)
            .and_then(|(identities, rows)| {
                let mut references: HashMap<String, Vec<Embedding>> = HashMap::new();
                for (identity_id, blob, dim, model_version) in rows {
                    let values = vector::decode(&blob, dim as usize)?;
                    references.entry(identity_id).or_default().push(Embedding {
                        values,
                        model_version,
                    });
                }
                Ok(Gallery {
                    identities: identities
                        .into_iter()
                        .map(|(id, display_name)| GalleryIdentity {
                            references: references.remove(&id).unwrap_or_default(),
                            id,
                            display_name,
                        })
                        .collect(),
                })
            })?;
        Ok(gallery)
    }

    /// List enrolled identities with their reference counts.
    pub async fn list_identities(&self) -> Result<Vec<IdentitySummary>, StoreError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT i.id, i.display_name, i.email, i.department, i.created_at,
                            (SELECT COUNT(*) FROM reference_embeddings r
                              WHERE r.identity_id = i.id)
                     FROM identities i ORDER BY i.display_name",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(IdentitySummary {
                            id: row.get(0)?,
                            display_name: row.get(1)?,
                            email: row.get(2)?,
                            department: row.get(3)?,
                            created_at: ts_from_sql(&row.get::<_, String>(4)?, 4)?,
                            reference_count: row.get::<_, i64>(5)? as usize,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Append one attendance record. Atomic with respect to the
    /// (identity, period) uniqueness invariant: the second writer gets
    /// `AlreadyExists`, never a silent overwrite. On success the record
    /// is durable.
    pub async fn append(&self, record: AttendanceRecord) -> Result<(), StoreError> {
        let identity = record.identity_id.clone();
        let period = record.period.clone();

        let result = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO attendance
                         (id, identity_id, period, marked_at, confidence, status, source)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        record.id,
                        record.identity_id,
                        record.period.as_str(),
                        ts_to_sql(&record.marked_at),
                        record.confidence as f64,
                        record.status.as_str(),
                        record.source
                    ],
                )?;
                Ok(())
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(tokio_rusqlite::Error::Rusqlite(e)) if error::is_unique_violation(&e) => {
                Err(StoreError::AlreadyExists {
                    identity,
                    period: period.as_str().to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Query the ledger. Side-effect free and re-callable; results are
    /// ordered by marked_at ascending.
    pub async fn query(&self, filter: RecordFilter) -> Result<Vec<AttendanceRecord>, StoreError> {
        let records = self
            .conn
            .call(move |conn| {
                let mut sql = String::from(
                    "SELECT id, identity_id, period, marked_at, confidence, status, source
                     FROM attendance",
                );
                let mut clauses: Vec<&str> = Vec::new();
                let mut args: Vec<String> = Vec::new();
                if let Some(identity) = &filter.identity {
                    clauses.push("identity_id = ?");
                    args.push(identity.clone());
                }
                if let Some(from) = &filter.period_from {
                    clauses.push("period >= ?");
                    args.push(from.as_str().to_string());
                }
                if let Some(to) = &filter.period_to {
                    clauses.push("period <= ?");
                    args.push(to.as_str().to_string());
                }
                if let Some(status) = &filter.status {
                    clauses.push("status = ?");
                    args.push(status.as_str().to_string());
                }
                if !clauses.is_empty() {
                    sql.push_str(" WHERE ");
                    sql.push_str(&clauses.join(" AND "));
                }
                sql.push_str(" ORDER BY marked_at ASC");

                let mut stmt = conn.prepare(&sql)?;
                let records = stmt
                    .query_map(rusqlite::params_from_iter(args.iter()), row_to_record)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await?;
        Ok(records)
    }

    /// All committed (identity, period) pairs, oldest commit first.
    /// Used to rebuild the dedup cache at startup.
    pub async fn committed_pairs(&self) -> Result<Vec<(String, PeriodId)>, StoreError> {
        let pairs = self
            .conn
            .call(|conn| {
                let mut stmt = conn
                    .prepare("SELECT identity_id, period FROM attendance ORDER BY marked_at")?;
                let pairs = stmt
                    .query_map([], |row| {
                        Ok((row.get(0)?, PeriodId::from(row.get::<_, String>(1)?)))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(pairs)
            })
            .await?;
        Ok(pairs)
    }

    /// Per-period attendance counts, most recent period first.
    pub async fn summary(&self, limit: usize) -> Result<Vec<PeriodCount>, StoreError> {
        let counts = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT period, COUNT(*) FROM attendance
                     GROUP BY period ORDER BY period DESC LIMIT ?1",
                )?;
                let counts = stmt
                    .query_map(params![limit as i64], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(counts)
            })
            .await?;
        Ok(counts
            .into_iter()
            .map(|(period, attendees)| PeriodCount {
                period: PeriodId::from(period),
                attendees,
            })
            .collect())
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let status_str: String = row.get(5)?;
    let status = AttendanceStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown attendance status: {status_str}").into(),
        )
    })?;
    Ok(AttendanceRecord {
        id: row.get(0)?,
        identity_id: row.get(1)?,
        period: PeriodId::from(row.get::<_, String>(2)?),
        marked_at: ts_from_sql(&row.get::<_, String>(3)?, 3)?,
        confidence: row.get::<_, f64>(4)? as f32,
        status,
        source: row.get(6)?,
    })
}

/// Timestamps are stored as fixed-width RFC 3339 UTC so that string
/// ordering matches chronological ordering.
fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts_from_sql(s: &str, col: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
        })
}
