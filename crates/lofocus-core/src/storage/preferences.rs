//! User timer preferences: the durations form and the last chosen period.
//!
//! Stored locally as JSON under `preferences_v1` / `period_v1` and, when an
//! identity is attached, remotely at `users/{uid}/preferensi/app`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::{get_json, set_json, LocalStore};
use crate::error::StorageError;
use crate::identity::UserId;
use crate::remote::{Document, DocumentPath, MergeWrite, RemoteStore};
use crate::timer::{PeriodKind, TimerConfig};

pub const PREFERENCES_KEY: &str = "preferences_v1";
pub const PERIOD_KEY: &str = "period_v1";

const REMOTE_FIELDS: [&str; 5] = [
    "focusMinutes",
    "shortBreakMinutes",
    "longBreakMinutes",
    "longBreakInterval",
    "notifyVolume",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub config: TimerConfig,
    pub period: PeriodKind,
}

impl Preferences {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            period: PeriodKind::Focus,
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}

fn config_values(config: &TimerConfig) -> [u32; 5] {
    [
        config.focus_minutes,
        config.short_break_minutes,
        config.long_break_minutes,
        config.long_break_interval,
        config.notify_volume,
    ]
}

/// Overlay remote fields onto `base`. Missing or non-integer fields keep
/// the base value.
fn config_from_document(doc: &Document, base: TimerConfig) -> TimerConfig {
    let field = |name: &str, fallback: u32| {
        doc.get(name)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(fallback)
    };
    TimerConfig {
        focus_minutes: field(REMOTE_FIELDS[0], base.focus_minutes),
        short_break_minutes: field(REMOTE_FIELDS[1], base.short_break_minutes),
        long_break_minutes: field(REMOTE_FIELDS[2], base.long_break_minutes),
        long_break_interval: field(REMOTE_FIELDS[3], base.long_break_interval),
        notify_volume: field(REMOTE_FIELDS[4], base.notify_volume),
    }
}

/// Loads and saves [`Preferences`] across both tiers.
#[derive(Clone)]
pub struct PreferenceStore {
    local: Arc<dyn LocalStore>,
    remote: Option<Arc<dyn RemoteStore>>,
}

impl std::fmt::Debug for PreferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceStore")
            .field("remote", &self.remote.is_some())
            .finish()
    }
}

impl PreferenceStore {
    pub fn new(local: Arc<dyn LocalStore>, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        Self { local, remote }
    }

    /// Remote document (with an identity), then the local key, then `defaults`.
    ///
    /// Invalid stored values fall back with a warning.
    pub async fn load(&self, identity: Option<&UserId>, defaults: TimerConfig) -> Preferences {
        let period = self.load_period();
        if let (Some(uid), Some(remote)) = (identity, self.remote.as_ref()) {
            let path = DocumentPath::preferences(uid);
            match remote.read_document(&path).await {
                Ok(Some(doc)) => {
                    let config = config_from_document(&doc, defaults);
                    match config.validate() {
                        Ok(()) => return Preferences { config, period },
                        Err(e) => tracing::warn!(uid = %uid, error = %e, "invalid remote preferences, ignoring"),
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::error!(uid = %uid, path = %path, error = %e, "remote preferences read failed"),
            }
        }
        Preferences {
            config: self.load_local_config(defaults),
            period,
        }
    }

    /// Local tier only.
    pub fn load_local(&self, defaults: TimerConfig) -> Preferences {
        Preferences {
            config: self.load_local_config(defaults),
            period: self.load_period(),
        }
    }

    fn load_local_config(&self, defaults: TimerConfig) -> TimerConfig {
        match get_json::<TimerConfig>(self.local.as_ref(), PREFERENCES_KEY) {
            Ok(Some(config)) => match config.validate() {
                Ok(()) => config,
                Err(e) => {
                    tracing::warn!(error = %e, "invalid stored preferences, using defaults");
                    defaults
                }
            },
            Ok(None) => defaults,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable stored preferences, using defaults");
                defaults
            }
        }
    }

    fn load_period(&self) -> PeriodKind {
        match get_json::<PeriodKind>(self.local.as_ref(), PERIOD_KEY) {
            Ok(Some(period)) => period,
            Ok(None) => PeriodKind::Focus,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable stored period, using focus");
                PeriodKind::Focus
            }
        }
    }

    /// Remember the last chosen period locally.
    pub fn save_period(&self, period: PeriodKind) -> Result<(), StorageError> {
        set_json(self.local.as_ref(), PERIOD_KEY, &period)
    }

    /// Persist locally, then spawn the remote write when an identity is
    /// attached. The config must already be validated.
    pub fn save(&self, prefs: &Preferences, identity: Option<&UserId>) -> Result<Option<JoinHandle<()>>, StorageError> {
        set_json(self.local.as_ref(), PREFERENCES_KEY, &prefs.config)?;
        self.save_period(prefs.period)?;

        let (Some(uid), Some(remote)) = (identity.cloned(), self.remote.clone()) else {
            return Ok(None);
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(uid = %uid, "no async runtime, skipping remote preferences write");
            return Ok(None);
        };

        let write = REMOTE_FIELDS
            .iter()
            .zip(config_values(&prefs.config))
            .fold(MergeWrite::new(), |write, (field, value)| write.set(field, value));
        let path = DocumentPath::preferences(&uid);
        Ok(Some(runtime.spawn(async move {
            if let Err(e) = remote.merge_write(&path, &write).await {
                tracing::error!(uid = %uid, path = %path, error = %e, "remote preferences write failed");
            }
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteStore;
    use crate::storage::MemoryStore;

    fn custom() -> TimerConfig {
        TimerConfig {
            focus_minutes: 50,
            short_break_minutes: 10,
            long_break_minutes: 30,
            long_break_interval: 3,
            notify_volume: 40,
        }
    }

    #[tokio::test]
    async fn load_falls_back_to_defaults() {
        let store = PreferenceStore::new(Arc::new(MemoryStore::new()), None);
        let prefs = store.load(None, TimerConfig::default()).await;
        assert_eq!(prefs, Preferences::default());
    }

    #[tokio::test]
    async fn save_then_load_locally() {
        let store = PreferenceStore::new(Arc::new(MemoryStore::new()), None);
        let prefs = Preferences {
            config: custom(),
            period: PeriodKind::LongBreak,
        };
        assert!(store.save(&prefs, None).unwrap().is_none());
        assert_eq!(store.load(None, TimerConfig::default()).await, prefs);
    }

    #[tokio::test]
    async fn remote_wins_with_identity() {
        let local = Arc::new(MemoryStore::new());
        let remote = MemoryRemoteStore::new();
        let uid = UserId::new("u1").unwrap();

        let writer = PreferenceStore::new(local.clone(), Some(Arc::new(remote.clone())));
        let prefs = Preferences::new(custom());
        writer.save(&prefs, Some(&uid)).unwrap().unwrap().await.unwrap();
        let doc = remote.document(&DocumentPath::preferences(&uid)).unwrap();
        assert_eq!(doc["focusMinutes"], 50);

        // a fresh local tier on another device still gets the remote values
        let other_device = PreferenceStore::new(Arc::new(MemoryStore::new()), Some(Arc::new(remote)));
        let loaded = other_device.load(Some(&uid), TimerConfig::default()).await;
        assert_eq!(loaded.config, custom());
        let anonymous = other_device.load(None, TimerConfig::default()).await;
        assert_eq!(anonymous.config, TimerConfig::default());
    }

    #[tokio::test]
    async fn invalid_stored_values_fall_back() {
        let local = MemoryStore::new();
        local
            .set(PREFERENCES_KEY, r#"{"focus_minutes": 0, "long_break_interval": 99}"#)
            .unwrap();
        local.set(PERIOD_KEY, "\"nap\"").unwrap();
        let store = PreferenceStore::new(Arc::new(local), None);
        let prefs = store.load(None, TimerConfig::default()).await;
        assert_eq!(prefs, Preferences::default());
    }

    #[tokio::test]
    async fn partial_remote_document_overlays_defaults() {
        let remote = MemoryRemoteStore::new();
        let uid = UserId::new("u1").unwrap();
        let mut doc = Document::new();
        doc.insert("focusMinutes".into(), serde_json::json!(45));
        doc.insert("notifyVolume".into(), serde_json::json!("loud"));
        remote.insert_document(DocumentPath::preferences(&uid), doc);

        let store = PreferenceStore::new(Arc::new(MemoryStore::new()), Some(Arc::new(remote)));
        let prefs = store.load(Some(&uid), TimerConfig::default()).await;
        assert_eq!(prefs.config.focus_minutes, 45);
        assert_eq!(prefs.config.notify_volume, 80);
    }
}
