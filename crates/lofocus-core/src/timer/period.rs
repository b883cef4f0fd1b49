use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    Focus,
    ShortBreak,
    LongBreak,
}

impl PeriodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodKind::Focus => "focus",
            PeriodKind::ShortBreak => "short_break",
            PeriodKind::LongBreak => "long_break",
        }
    }

    /// Both break kinds count towards break minutes.
    pub fn is_break(&self) -> bool {
        !matches!(self, PeriodKind::Focus)
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "focus" | "work" => Ok(PeriodKind::Focus),
            "short_break" | "short-break" | "short" => Ok(PeriodKind::ShortBreak),
            "long_break" | "long-break" | "long" => Ok(PeriodKind::LongBreak),
            other => Err(ConfigError::invalid(
                "period",
                format!("unknown period '{other}' (expected focus, short_break or long_break)"),
            )),
        }
    }
}

pub const MINUTES_RANGE: (u32, u32) = (1, 600);
pub const INTERVAL_RANGE: (u32, u32) = (2, 12);
pub const VOLUME_RANGE: (u32, u32) = (0, 100);

/// Durations and long-break cadence for the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    /// Completed focus periods between long breaks.
    #[serde(default = "default_long_break_interval")]
    pub long_break_interval: u32,
    #[serde(default = "default_notify_volume")]
    pub notify_volume: u32,
}

fn default_focus_minutes() -> u32 {
    25
}
fn default_short_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_long_break_interval() -> u32 {
    4
}
fn default_notify_volume() -> u32 {
    80
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            long_break_interval: default_long_break_interval(),
            notify_volume: default_notify_volume(),
        }
    }
}

impl TimerConfig {
    /// Check every field against its allowed range.
    ///
    /// # Errors
    /// Returns the first field that is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("focus_minutes", self.focus_minutes, MINUTES_RANGE)?;
        check_range("short_break_minutes", self.short_break_minutes, MINUTES_RANGE)?;
        check_range("long_break_minutes", self.long_break_minutes, MINUTES_RANGE)?;
        check_range("long_break_interval", self.long_break_interval, INTERVAL_RANGE)?;
        check_range("notify_volume", self.notify_volume, VOLUME_RANGE)?;
        Ok(())
    }

    pub fn minutes_for(&self, kind: PeriodKind) -> u32 {
        match kind {
            PeriodKind::Focus => self.focus_minutes,
            PeriodKind::ShortBreak => self.short_break_minutes,
            PeriodKind::LongBreak => self.long_break_minutes,
        }
    }

    /// Saturating so out-of-range configs never overflow before validation.
    pub fn duration_secs(&self, kind: PeriodKind) -> u64 {
        u64::from(self.minutes_for(kind)).saturating_mul(60)
    }
}

fn check_range(key: &str, value: u32, (min, max): (u32, u32)) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::invalid(
            key,
            format!("{value} is outside {min}..={max}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = TimerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.duration_secs(PeriodKind::Focus), 25 * 60);
        assert_eq!(cfg.duration_secs(PeriodKind::ShortBreak), 5 * 60);
        assert_eq!(cfg.duration_secs(PeriodKind::LongBreak), 15 * 60);
    }

    #[test]
    fn rejects_zero_minutes() {
        let cfg = TimerConfig {
            focus_minutes: 0,
            ..TimerConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("focus_minutes"));
    }

    #[test]
    fn rejects_interval_below_two() {
        let cfg = TimerConfig {
            long_break_interval: 1,
            ..TimerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_loud_volume() {
        let cfg = TimerConfig {
            notify_volume: 101,
            ..TimerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_period_aliases() {
        assert_eq!("work".parse::<PeriodKind>().unwrap(), PeriodKind::Focus);
        assert_eq!("short".parse::<PeriodKind>().unwrap(), PeriodKind::ShortBreak);
        assert_eq!("Long_Break".parse::<PeriodKind>().unwrap(), PeriodKind::LongBreak);
        assert!("nap".parse::<PeriodKind>().is_err());
    }

    #[test]
    fn breaks_are_breaks() {
        assert!(!PeriodKind::Focus.is_break());
        assert!(PeriodKind::ShortBreak.is_break());
        assert!(PeriodKind::LongBreak.is_break());
    }
}
