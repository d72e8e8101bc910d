//! Error kinds for the I/O layer, grounded on the team-mail inbox error
//! enum's shape (one variant per failure mode, `thiserror`-derived).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("unknown role: {role}")]
    UnknownRole { role: String },

    #[error("send denied: {reason}")]
    SendDenied { reason: String },

    #[error("timed out waiting for lock on {path} after {retries} attempts")]
    LockTimeout { path: PathBuf, retries: u32 },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid schedule: {schedule}")]
    InvalidSchedule { schedule: String },

    #[error("{message}")]
    Invalid { message: String },
}

impl BusError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BusError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        BusError::Json {
            path: path.into(),
            source,
        }
    }
}
