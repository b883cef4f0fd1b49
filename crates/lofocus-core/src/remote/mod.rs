//! Remote document store contract.
//!
//! The remote tier is identity-scoped and may be absent, slow or failing.
//! Writes are merge writes: only the listed fields change, and numeric
//! fields can be incremented in place.

mod http;
mod memory;

pub use http::HttpRemoteStore;
pub use memory::MemoryRemoteStore;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::RemoteError;
use crate::identity::UserId;
use crate::stats::DayKey;

/// A stored document: a flat JSON object.
pub type Document = Map<String, Value>;

/// Slash-separated path of a document, e.g. `users/u1/statistik/agregat`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath(String);

impl DocumentPath {
    /// All-time aggregate of a user.
    pub fn stats_aggregate(uid: &UserId) -> Self {
        Self(format!("users/{uid}/statistik/agregat"))
    }

    /// One day's aggregate of a user.
    pub fn stats_daily(uid: &UserId, day: &DayKey) -> Self {
        Self(format!("users/{uid}/statistik/harian/{day}"))
    }

    /// Timer preferences of a user.
    pub fn preferences(uid: &UserId) -> Self {
        Self(format!("users/{uid}/preferensi/app"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operation on one field of a merge write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOp {
    /// Add to the stored number (missing counts as zero).
    Increment(f64),
    /// Replace the stored value.
    Set(Value),
}

/// Partial update of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeWrite {
    ops: BTreeMap<String, FieldOp>,
}

impl MergeWrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(mut self, field: &str, by: f64) -> Self {
        self.ops.insert(field.to_string(), FieldOp::Increment(by));
        self
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.ops.insert(field.to_string(), FieldOp::Set(value.into()));
        self
    }

    pub fn ops(&self) -> &BTreeMap<String, FieldOp> {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply to a stored document in place.
    pub fn apply_to(&self, doc: &mut Document) {
        for (field, op) in &self.ops {
            match op {
                FieldOp::Increment(by) => {
                    let current = doc.get(field).and_then(Value::as_f64).unwrap_or(0.0);
                    match serde_json::Number::from_f64(current + by) {
                        Some(n) => {
                            doc.insert(field.clone(), Value::Number(n));
                        }
                        None => tracing::warn!(field = %field, "ignoring non-finite increment"),
                    }
                }
                FieldOp::Set(value) => {
                    doc.insert(field.clone(), value.clone());
                }
            }
        }
    }

    /// Wire shape: `{"increment": {field: n}, "set": {field: v}}`.
    pub fn to_wire(&self) -> Value {
        let mut increment = Map::new();
        let mut set = Map::new();
        for (field, op) in &self.ops {
            match op {
                FieldOp::Increment(by) => {
                    if let Some(n) = serde_json::Number::from_f64(*by) {
                        increment.insert(field.clone(), Value::Number(n));
                    }
                }
                FieldOp::Set(value) => {
                    set.insert(field.clone(), value.clone());
                }
            }
        }
        serde_json::json!({ "increment": increment, "set": set })
    }
}

/// Asynchronous contract of the remote tier.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// `Ok(None)` when the document does not exist.
    async fn read_document(&self, path: &DocumentPath) -> Result<Option<Document>, RemoteError>;

    async fn merge_write(&self, path: &DocumentPath, write: &MergeWrite) -> Result<(), RemoteError>;
}
