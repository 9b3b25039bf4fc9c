//! Schema — identities, reference embeddings, attendance ledger.
//! Applied idempotently at open.

pub const SCHEMA_SQL: &str = r#"
-- Enrolled identities. Mutated only by enrollment tooling.
CREATE TABLE IF NOT EXISTS identities (
    id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    email TEXT,
    department TEXT,
    created_at TEXT NOT NULL
) STRICT;

-- Reference embeddings: one or more per identity, immutable once created.
-- Vectors are little-endian f32 bytes; dim is the vector length.
CREATE TABLE IF NOT EXISTS reference_embeddings (
    id TEXT PRIMARY KEY,
    identity_id TEXT NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
    vector BLOB NOT NULL,
    dim INTEGER NOT NULL,
    model_version TEXT,
    captured_at TEXT NOT NULL
) STRICT;

CREATE INDEX IF NOT EXISTS idx_reference_embeddings_identity
    ON reference_embeddings(identity_id);

-- Attendance ledger: append-only, one row per (identity, period).
-- The UNIQUE constraint is the authority for dedup under concurrency.
-- identity_id intentionally carries no foreign key: records outlive
-- unenrollment as an audit trail.
CREATE TABLE IF NOT EXISTS attendance (
    id TEXT PRIMARY KEY,
    identity_id TEXT NOT NULL,
    period TEXT NOT NULL,
    marked_at TEXT NOT NULL,
    confidence REAL NOT NULL,
    status TEXT NOT NULL DEFAULT 'present',
    source TEXT,
    UNIQUE(identity_id, period)
) STRICT;

CREATE INDEX IF NOT EXISTS idx_attendance_period ON attendance(period);
CREATE INDEX IF NOT EXISTS idx_attendance_marked_at ON attendance(marked_at);
"#;
