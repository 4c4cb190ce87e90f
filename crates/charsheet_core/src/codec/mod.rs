//! JSON codecs for sheet documents, imports and the tab session blob.
//!
//! # Responsibility
//! - Encode documents as version-2 snapshots (full and diffed forms).
//! - Decode version-2, legacy `fields` and relationship-only shapes.
//! - Encode/decode the persisted tab session blob defensively.
//!
//! # Invariants
//! - Decoding never invents labels outside the `FormSchema`.
//! - Absent keys keep base values; `portrait` is always set or cleared.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod import;
pub mod legacy;
pub mod relationships;
pub mod session_blob;
pub mod snapshot;

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Snapshot decoding error.
#[derive(Debug)]
pub enum SnapshotError {
    InvalidJson(serde_json::Error),
    NotAnObject,
    UnsupportedVersion(i64),
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJson(err) => write!(f, "invalid sheet json: {err}"),
            Self::NotAnObject => write!(f, "sheet json root must be an object"),
            Self::UnsupportedVersion(version) => {
                write!(f, "unsupported sheet version {version}")
            }
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidJson(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidJson(value)
    }
}
