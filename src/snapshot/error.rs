//! Snapshot failure taxonomy.

use crate::history::HistoryError;
use thiserror::Error;

/// Everything that can fail while saving or restoring a history.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot serialization failed: {0}")]
    Serialization(String),

    #[error("snapshot deserialization failed: {0}")]
    Deserialization(String),

    /// The snapshot was written by an incompatible format version.
    #[error("unsupported snapshot version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// The snapshot names a state the catalog does not know.
    #[error("snapshot references unknown state '{name}'")]
    UnknownState { name: String },

    /// The transition's data is not the type its state was registered with.
    #[error("state '{state}' carries data of an unregistered type")]
    UnsupportedData { state: String },

    #[error(transparent)]
    InvalidHistory(#[from] HistoryError),
}
