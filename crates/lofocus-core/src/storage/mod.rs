mod config;
pub mod database;
pub mod lease;
mod memory;
pub mod migrations;
pub mod preferences;

pub use config::{Config, LoggingConfig, RemoteConfig};
pub use database::Database;
pub use lease::{Acquire, CommandMailbox, LeaseInfo, TimerLease};
pub use memory::MemoryStore;
pub use preferences::{PreferenceStore, Preferences};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::StorageError;

/// Key under which the CLI keeps the sequencer snapshot.
pub const ENGINE_KEY: &str = "timer_engine";

/// Closure given to [`LocalStore::update`]: current value in, new value out.
/// Returning `Ok(None)` removes the key; an error leaves it untouched.
pub type UpdateFn<'a> = dyn FnMut(Option<String>) -> Result<Option<String>, StorageError> + 'a;

/// Synchronous key-value contract of the local tier.
///
/// Callers treat an error as "value absent" and log it.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Atomic read-modify-write of one key. No other writer, in this
    /// process or another one sharing the store, can interleave between
    /// the read and the write. Returns the value left in the store.
    fn update(&self, key: &str, apply: &mut UpdateFn<'_>) -> Result<Option<String>, StorageError>;
}

/// Read and decode a JSON value.
pub fn get_json<T: DeserializeOwned>(store: &dyn LocalStore, key: &str) -> Result<Option<T>, StorageError> {
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Serialization {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Encode and write a JSON value.
pub fn set_json<T: Serialize>(store: &dyn LocalStore, key: &str, value: &T) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value).map_err(|source| StorageError::Serialization {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw)
}

/// Returns `~/.config/lofocus[-dev]/` based on LOFOCUS_ENV.
///
/// Set LOFOCUS_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("LOFOCUS_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("lofocus-dev")
    } else {
        base_dir.join("lofocus")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
