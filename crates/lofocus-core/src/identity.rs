//! Identity as seen by the engine: an optional, stable user id.
//!
//! The engine never authenticates. A host-side provider publishes the
//! current id through a watch channel and the driver re-attaches it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;

/// Stable user id scoping remote documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

/// Longest id accepted as a document path segment.
pub const MAX_USER_ID_LEN: usize = 128;

impl UserId {
    /// `None` for blank or over-long ids, and for ids with characters
    /// outside `[A-Za-z0-9_-]`. The id becomes a single path segment, so
    /// separators, dots, `%`, `?` and `#` are never let through.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let allowed = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
        if trimmed.is_empty() || trimmed.len() > MAX_USER_ID_LEN || !trimmed.chars().all(allowed) {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type IdentitySender = watch::Sender<Option<UserId>>;
pub type IdentityReceiver = watch::Receiver<Option<UserId>>;

/// Channel an identity provider publishes changes on.
pub fn identity_channel(initial: Option<UserId>) -> (IdentitySender, IdentityReceiver) {
    watch::channel(initial)
}
