use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{PeriodKind, TimerConfig};

/// Every sequencer state change produces an Event.
/// Hosts receive them through a `PeriodObserver`; commands also return them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    PeriodStarted {
        period: PeriodKind,
        remaining_secs: u64,
        /// Started by the sequencer right after the previous period ended.
        auto: bool,
        at: DateTime<Utc>,
    },
    PeriodPaused {
        period: PeriodKind,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    PeriodReset {
        period: PeriodKind,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    /// `applied == false` means the clock was running and the selection is
    /// held until the next idle point.
    PeriodSelected {
        period: PeriodKind,
        applied: bool,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    PeriodCompleted {
        period: PeriodKind,
        minutes: f64,
        next_period: PeriodKind,
        completed_focus_count: u64,
        at: DateTime<Utc>,
    },
    ConfigApplied {
        config: TimerConfig,
        /// Staged while running; takes effect at the next idle point.
        staged: bool,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        period: PeriodKind,
        selected_period: PeriodKind,
        running: bool,
        remaining_secs: u64,
        total_secs: u64,
        progress_pct: f64,
        completed_focus_count: u64,
        at: DateTime<Utc>,
    },
}

/// A finished period, handed to the session recorder exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCompletionEvent {
    pub period: PeriodKind,
    /// Full configured length of the period.
    pub minutes: f64,
    pub completed_at: DateTime<Utc>,
}

impl SessionCompletionEvent {
    pub fn new(period: PeriodKind, minutes: f64, completed_at: DateTime<Utc>) -> Self {
        Self {
            period,
            minutes,
            completed_at,
        }
    }
}
