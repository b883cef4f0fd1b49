use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::SessionCompletionEvent;
use crate::remote::{Document, MergeWrite};
use crate::timer::PeriodKind;

/// Display-ready minutes of one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_minutes: f64,
    pub focus_minutes: f64,
    pub break_minutes: f64,
}

impl AggregateStats {
    /// Deltas contributed by one completed period.
    pub fn from_completion(event: &SessionCompletionEvent) -> Self {
        let minutes = event.minutes;
        if event.period.is_break() {
            Self {
                total_minutes: minutes,
                focus_minutes: 0.0,
                break_minutes: minutes,
            }
        } else {
            Self {
                total_minutes: minutes,
                focus_minutes: minutes,
                break_minutes: 0.0,
            }
        }
    }

    pub fn add(&mut self, delta: &AggregateStats) {
        self.total_minutes += delta.total_minutes;
        self.focus_minutes += delta.focus_minutes;
        self.break_minutes += delta.break_minutes;
    }

    /// Merge write incrementing all three fields by this delta.
    pub fn to_increment(&self) -> MergeWrite {
        MergeWrite::new()
            .increment(FIELD_TOTAL, self.total_minutes)
            .increment(FIELD_FOCUS, self.focus_minutes)
            .increment(FIELD_BREAK, self.break_minutes)
    }
}

pub(crate) const FIELD_TOTAL: &str = "totalMinutes";
pub(crate) const FIELD_FOCUS: &str = "focusMinutes";
pub(crate) const FIELD_BREAK: &str = "breakMinutes";

/// Stored shape of a bucket in either tier.
///
/// Every field is optional: a tier may hold a partially written record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_period: Option<PeriodKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|n| n.is_finite())
}

fn number_field(doc: &Document, key: &str) -> Option<f64> {
    match doc.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

impl StatsRecord {
    /// Lenient decode: fields of the wrong type are treated as absent.
    pub fn from_document(doc: &Document) -> Self {
        Self {
            total_minutes: number_field(doc, FIELD_TOTAL),
            focus_minutes: number_field(doc, FIELD_FOCUS),
            break_minutes: number_field(doc, FIELD_BREAK),
            date: doc.get("date").and_then(Value::as_str).map(String::from),
            last_period: doc
                .get("lastPeriod")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok()),
            updated_at: doc
                .get("updatedAt")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    /// Stored total, or focus + break when the total is missing.
    pub fn total(&self) -> Option<f64> {
        finite(self.total_minutes).or_else(|| Some(self.focus()? + self.breaks()?))
    }

    pub fn focus(&self) -> Option<f64> {
        finite(self.focus_minutes)
    }

    pub fn breaks(&self) -> Option<f64> {
        finite(self.break_minutes)
    }

    /// Add a delta, treating missing fields as zero.
    pub fn add(&mut self, delta: &AggregateStats) {
        self.total_minutes = Some(self.total().unwrap_or(0.0) + delta.total_minutes);
        self.focus_minutes = Some(self.focus().unwrap_or(0.0) + delta.focus_minutes);
        self.break_minutes = Some(self.breaks().unwrap_or(0.0) + delta.break_minutes);
    }

    pub fn to_aggregate(&self) -> AggregateStats {
        AggregateStats {
            total_minutes: self.total().unwrap_or(0.0),
            focus_minutes: self.focus().unwrap_or(0.0),
            break_minutes: self.breaks().unwrap_or(0.0),
        }
    }
}

impl From<AggregateStats> for StatsRecord {
    fn from(stats: AggregateStats) -> Self {
        Self {
            total_minutes: Some(stats.total_minutes),
            focus_minutes: Some(stats.focus_minutes),
            break_minutes: Some(stats.break_minutes),
            ..Self::default()
        }
    }
}
