use serde::{Deserialize, Serialize};

use super::period::{PeriodKind, TimerConfig};

/// Mutable timer value object. Owned by the sequencer, lent to the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub current_period: PeriodKind,
    pub remaining_seconds: u64,
    pub running: bool,
    pub completed_focus_count: u64,
}

impl TimerState {
    /// Fresh state: idle at the start of a full focus period.
    pub fn new(config: &TimerConfig) -> Self {
        Self {
            current_period: PeriodKind::Focus,
            remaining_seconds: config.duration_secs(PeriodKind::Focus),
            running: false,
            completed_focus_count: 0,
        }
    }
}
