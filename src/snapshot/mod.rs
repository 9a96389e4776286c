//! History persistence.
//!
//! A [`HistorySnapshot`] is the serializable shadow of a
//! [`History`](crate::history::History): state names plus JSON-encoded data,
//! current first, stamped with a format version and a timestamp. Because a
//! live transition carries closures, snapshots only travel through a
//! [`StateCatalog`] that knows how to encode and decode each registered
//! state's data type.
//!
//! Two codecs are provided: JSON for debuggability and bincode for compact
//! storage. Both are gated on [`SNAPSHOT_VERSION`].

mod error;

pub use error::SnapshotError;

use crate::context::{create_initial_context, Context, ContextOptions};
use crate::history::History;
use crate::state::{BoundState, StateTransition};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One history entry: the state's name and its JSON-encoded data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub name: String,
    pub data: Value,
}

/// A serializable history, current state first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub version: u32,
    pub taken_at: DateTime<Utc>,
    pub entries: Vec<SnapshotEntry>,
}

/// Bincode cannot decode `serde_json::Value` (it is not self-describing),
/// so the binary codec carries entry data as JSON text.
#[derive(Serialize, Deserialize)]
struct BinaryEntry {
    name: String,
    data: String,
}

#[derive(Serialize, Deserialize)]
struct BinarySnapshot {
    version: u32,
    taken_at: DateTime<Utc>,
    entries: Vec<BinaryEntry>,
}

impl HistorySnapshot {
    /// Encode as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(|e| SnapshotError::Serialization(e.to_string()))
    }

    /// Decode from JSON, rejecting incompatible versions.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| SnapshotError::Deserialization(e.to_string()))?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    /// Encode as compact binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                Ok(BinaryEntry {
                    name: entry.name.clone(),
                    data: serde_json::to_string(&entry.data)
                        .map_err(|e| SnapshotError::Serialization(e.to_string()))?,
                })
            })
            .collect::<Result<Vec<_>, SnapshotError>>()?;

        bincode::serialize(&BinarySnapshot {
            version: self.version,
            taken_at: self.taken_at,
            entries,
        })
        .map_err(|e| SnapshotError::Serialization(e.to_string()))
    }

    /// Decode from binary, rejecting incompatible versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let binary: BinarySnapshot = bincode::deserialize(bytes)
            .map_err(|e| SnapshotError::Deserialization(e.to_string()))?;

        let entries = binary
            .entries
            .into_iter()
            .map(|entry| {
                Ok(SnapshotEntry {
                    data: serde_json::from_str(&entry.data)
                        .map_err(|e| SnapshotError::Deserialization(e.to_string()))?,
                    name: entry.name,
                })
            })
            .collect::<Result<Vec<_>, SnapshotError>>()?;

        let snapshot = Self {
            version: binary.version,
            taken_at: binary.taken_at,
            entries,
        };
        snapshot.check_version()?;
        Ok(snapshot)
    }

    fn check_version(&self) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                supported: SNAPSHOT_VERSION,
            });
        }
        Ok(())
    }
}

type Encoder = Arc<dyn Fn(&StateTransition) -> Result<Value, SnapshotError> + Send + Sync>;
type Decoder = Arc<dyn Fn(Value) -> Result<StateTransition, SnapshotError> + Send + Sync>;

struct Codec {
    encode: Encoder,
    decode: Decoder,
}

/// Name → state registry used to take and restore snapshots.
///
/// # Example
///
/// ```rust
/// use flywheel::context::ContextOptions;
/// use flywheel::history::History;
/// use flywheel::snapshot::StateCatalog;
/// use flywheel::state::state;
///
/// let counter = state::<i64>("Counter").build();
///
/// let mut catalog = StateCatalog::new();
/// catalog.register(&counter);
///
/// let history = History::new(vec![counter.with(42)], None).unwrap();
/// let snapshot = catalog.snapshot(&history).unwrap();
///
/// let restored = catalog.restore(&snapshot, ContextOptions::default()).unwrap();
/// let current = restored.current_state().unwrap();
/// assert_eq!(current.data::<i64>(), Some(&42));
/// ```
#[derive(Default)]
pub struct StateCatalog {
    codecs: HashMap<String, Codec>,
}

impl StateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a state whose data type round-trips through serde.
    ///
    /// States with non-serializable data (closures, channels) cannot be
    /// registered; histories containing them cannot be snapshotted. That is
    /// the documented boundary of persistence.
    pub fn register<D>(&mut self, bound: &BoundState<D>)
    where
        D: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let name = bound.name().to_owned();

        let encode_name = name.clone();
        let encode: Encoder = Arc::new(move |transition| {
            let data = transition
                .data::<D>()
                .ok_or_else(|| SnapshotError::UnsupportedData {
                    state: encode_name.clone(),
                })?;
            serde_json::to_value(data).map_err(|e| SnapshotError::Serialization(e.to_string()))
        });

        let decode_bound = bound.clone();
        let decode: Decoder = Arc::new(move |value| {
            let data: D = serde_json::from_value(value)
                .map_err(|e| SnapshotError::Deserialization(e.to_string()))?;
            Ok(decode_bound.with(data))
        });

        self.codecs.insert(name, Codec { encode, decode });
    }

    /// Encode a history, current state first.
    pub fn snapshot(&self, history: &History) -> Result<HistorySnapshot, SnapshotError> {
        let entries = history
            .iter()
            .map(|transition| {
                let codec =
                    self.codecs
                        .get(transition.name())
                        .ok_or_else(|| SnapshotError::UnknownState {
                            name: transition.name().to_owned(),
                        })?;
                Ok(SnapshotEntry {
                    name: transition.name().to_owned(),
                    data: (*codec.encode)(transition)?,
                })
            })
            .collect::<Result<Vec<_>, SnapshotError>>()?;

        Ok(HistorySnapshot {
            version: SNAPSHOT_VERSION,
            taken_at: Utc::now(),
            entries,
        })
    }

    /// Rebuild a context from a snapshot. The returned context is ready to
    /// hand to `create_runtime`.
    pub fn restore(
        &self,
        snapshot: &HistorySnapshot,
        options: ContextOptions,
    ) -> Result<Context, SnapshotError> {
        snapshot.check_version()?;

        let transitions = snapshot
            .entries
            .iter()
            .map(|entry| {
                let codec = self
                    .codecs
                    .get(&entry.name)
                    .ok_or_else(|| SnapshotError::UnknownState {
                        name: entry.name.clone(),
                    })?;
                (*codec.decode)(entry.data.clone())
            })
            .collect::<Result<Vec<_>, SnapshotError>>()?;

        Ok(create_initial_context(transitions, options)?)
    }
}
