use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The (identity, period) pair already has a committed record.
    /// Expected under concurrent events; never a fault.
    #[error("attendance already recorded for {identity} in period {period}")]
    AlreadyExists { identity: String, period: String },
    #[error("identity {0} is already enrolled")]
    IdentityExists(String),
    #[error("enrollment requires at least one reference embedding")]
    NoReferences,
    #[error("malformed embedding blob: {0}")]
    BadVector(String),
    #[error("storage: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("storage backend: {0}")]
    Backend(String),
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => StoreError::Sqlite(e),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Whether a rusqlite error is a UNIQUE/PRIMARY KEY constraint failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _)
        if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
}
