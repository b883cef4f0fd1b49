use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::identity::UserId;
use crate::remote::DocumentPath;

/// Calendar day in the local timezone, formatted `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    /// Local calendar date of a UTC instant.
    pub fn from_utc(at: DateTime<Utc>) -> Self {
        Self(at.with_timezone(&Local).date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|e| ConfigError::invalid("date", format!("'{s}' is not YYYY-MM-DD: {e}")))
    }
}

/// Which bucket a statistic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "date", rename_all = "snake_case")]
pub enum StatsScope {
    AllTime,
    Day(DayKey),
}

impl StatsScope {
    pub fn today() -> Self {
        StatsScope::Day(DayKey::today())
    }

    pub fn local_key(&self) -> String {
        match self {
            StatsScope::AllTime => super::STATS_TOTAL_KEY.to_string(),
            StatsScope::Day(day) => format!("{}{day}", super::STATS_DAILY_PREFIX),
        }
    }

    pub fn document_path(&self, uid: &UserId) -> DocumentPath {
        match self {
            StatsScope::AllTime => DocumentPath::stats_aggregate(uid),
            StatsScope::Day(day) => DocumentPath::stats_daily(uid, day),
        }
    }
}

impl fmt::Display for StatsScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsScope::AllTime => f.write_str("all_time"),
            StatsScope::Day(day) => write!(f, "day:{day}"),
        }
    }
}
