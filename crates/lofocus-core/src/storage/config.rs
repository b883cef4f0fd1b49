//! TOML-based application configuration.
//!
//! Holds:
//! - default timer durations (seed for preferences)
//! - remote document store endpoint and identity
//! - logging filter
//!
//! Configuration is stored at `~/.config/lofocus/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::identity::UserId;
use crate::timer::TimerConfig;

/// Remote tier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the document store; remote tier disabled when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Identity the statistics are recorded under.
    #[serde(default)]
    pub uid: Option<String>,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `lofocus_core=debug`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/lofocus/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_timeout_secs() -> u64 {
    10
}
fn default_log_filter() -> String {
    "warn".into()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            uid: None,
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl RemoteConfig {
    /// The configured user id. An id that is set but unusable is ignored.
    pub fn identity(&self) -> Option<UserId> {
        let raw = self.uid.as_deref().filter(|uid| !uid.trim().is_empty())?;
        let uid = UserId::new(raw);
        if uid.is_none() {
            tracing::warn!(uid = raw, "ignoring malformed remote.uid");
        }
        uid
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.uid.as_deref().filter(|uid| !uid.trim().is_empty()) {
            Some(raw) if UserId::new(raw).is_none() => Err(ConfigError::invalid(
                "remote.uid",
                "only letters, digits, '_' and '-' are allowed",
            )),
            _ => Ok(()),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => {
                        let b = value
                            .parse::<bool>()
                            .map_err(|e| ConfigError::invalid(key, e.to_string()))?;
                        serde_json::Value::Bool(b)
                    }
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| ConfigError::invalid(key, format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| ConfigError::invalid(key, e.to_string()))?
                    }
                    // optional strings: an empty value clears them
                    serde_json::Value::Null if value.is_empty() => serde_json::Value::Null,
                    serde_json::Value::String(_) | serde_json::Value::Null => {
                        serde_json::Value::String(value.into())
                    }
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// Default location of the config file.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/lofocus"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the default location, writing defaults when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults when the file does not exist.
    ///
    /// An out-of-range `[timer]` section is replaced by defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// default config cannot be written.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let mut cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                if let Err(e) = cfg.timer.validate() {
                    tracing::warn!(path = %path.display(), error = %e, "invalid [timer] section, using defaults");
                    cfg.timer = TimerConfig::default();
                }
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting timer section is out of range. `self` is unchanged
    /// on error.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::invalid(key, e.to_string()))?;
        updated.timer.validate()?;
        updated.remote.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a value by key and save to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if [`Config::apply`] fails or the config cannot be
    /// saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.timer.focus_minutes, 25);
        assert_eq!(parsed.remote.timeout_secs, 10);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.focus_minutes").as_deref(), Some("25"));
        assert_eq!(cfg.get("logging.filter").as_deref(), Some("warn"));
        assert_eq!(cfg.get("remote.uid").as_deref(), Some("null"));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn apply_updates_number() {
        let mut cfg = Config::default();
        cfg.apply("timer.long_break_interval", "6").unwrap();
        assert_eq!(cfg.timer.long_break_interval, 6);
    }

    #[test]
    fn apply_sets_and_clears_optional_string() {
        let mut cfg = Config::default();
        cfg.apply("remote.uid", "alice").unwrap();
        assert_eq!(cfg.remote.uid.as_deref(), Some("alice"));
        assert_eq!(cfg.remote.identity().unwrap().as_str(), "alice");

        // a set string is no longer null, so clearing keeps an empty string
        cfg.apply("remote.uid", "").unwrap();
        assert!(cfg.remote.identity().is_none());
    }

    #[test]
    fn apply_rejects_uid_outside_the_safe_charset() {
        let mut cfg = Config::default();
        for raw in ["..", "a#x", "b?y=1"] {
            let err = cfg.apply("remote.uid", raw).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "remote.uid"));
        }
        assert_eq!(cfg.remote.uid, None);

        cfg.remote.uid = Some("..".to_string());
        assert!(cfg.remote.identity().is_none());
    }

    #[test]
    fn apply_rejects_out_of_range_timer_value() {
        let mut cfg = Config::default();
        let err = cfg.apply("timer.focus_minutes", "0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert_eq!(cfg.timer.focus_minutes, 25);
    }

    #[test]
    fn set_json_value_by_path_rejects_unknown_key() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        let result = Config::set_json_value_by_path(&mut json, "timer.nonexistent", "1");
        assert!(matches!(result, Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_json_value_by_path_rejects_invalid_number() {
        let mut json = serde_json::to_value(Config::default()).unwrap();
        let result = Config::set_json_value_by_path(&mut json, "timer.focus_minutes", "lots");
        assert!(result.is_err());
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn load_from_replaces_invalid_timer_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timer]\nfocus_minutes = 9000\n[logging]\nfilter = \"debug\"\n").unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.timer, TimerConfig::default());
        assert_eq!(cfg.logging.filter, "debug");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[remote]\nbase_url = \"http://localhost:8080\"\n").unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.remote.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(cfg.remote.timeout_secs, 10);
        assert_eq!(cfg.timer.short_break_minutes, 5);
    }
}
