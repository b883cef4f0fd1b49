//! Drift-corrected countdown.
//!
//! The clock never decrements a counter. `start()` fixes an absolute target
//! end-time and every `sample()` recomputes the remaining seconds from it, so
//! late or skipped samples cannot accumulate rounding error. All operations
//! take the current wall-clock reading explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::state::TimerState;

/// Source of wall-clock time in epoch milliseconds.
pub trait TimeSource: Send + Sync + fmt::Debug {
    fn now_ms(&self) -> u64;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Hand-driven time, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    now: Arc<AtomicU64>,
}

impl ManualTime {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs.saturating_mul(1000));
    }

    pub fn set_ms(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Outcome of a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSignal {
    /// Not running; nothing to do.
    Idle,
    Running { remaining_secs: u64 },
    /// Reached zero on this sample. Returned once per start.
    Elapsed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownClock {
    /// Absolute end of the running countdown (epoch ms).
    target_end_ms: Option<u64>,
}

impl CountdownClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a clock whose target was persisted earlier.
    pub fn with_target(target_end_ms: Option<u64>) -> Self {
        Self { target_end_ms }
    }

    pub fn target_end_ms(&self) -> Option<u64> {
        self.target_end_ms
    }

    /// Returns `false` when already running.
    pub fn start(&mut self, state: &mut TimerState, now_ms: u64) -> bool {
        if state.running {
            return false;
        }
        let span_ms = state.remaining_seconds.saturating_mul(1000);
        self.target_end_ms = Some(now_ms.saturating_add(span_ms));
        state.running = true;
        true
    }

    /// Freeze the remaining time. Returns `false` when not running.
    pub fn pause(&mut self, state: &mut TimerState, now_ms: u64) -> bool {
        if !state.running {
            return false;
        }
        if let Some(target) = self.target_end_ms.take() {
            state.remaining_seconds = remaining_secs(target, now_ms);
        }
        state.running = false;
        true
    }

    pub fn reset(&mut self, state: &mut TimerState, duration_secs: u64) {
        self.target_end_ms = None;
        state.running = false;
        state.remaining_seconds = duration_secs;
    }

    /// Recompute remaining time from the target.
    ///
    /// The target is cleared and `running` dropped before `Elapsed` is
    /// returned, so a late sample after completion reads `Idle`.
    pub fn sample(&mut self, state: &mut TimerState, now_ms: u64) -> ClockSignal {
        if !state.running {
            return ClockSignal::Idle;
        }
        let Some(target) = self.target_end_ms else {
            // running without a target only happens with a corrupt snapshot
            state.running = false;
            return ClockSignal::Idle;
        };

        let remaining = remaining_secs(target, now_ms);
        state.remaining_seconds = remaining;
        if remaining == 0 {
            self.target_end_ms = None;
            state.running = false;
            return ClockSignal::Elapsed;
        }
        ClockSignal::Running {
            remaining_secs: remaining,
        }
    }
}

/// `ceil((target - now) / 1000)`, clamped at zero.
fn remaining_secs(target_end_ms: u64, now_ms: u64) -> u64 {
    target_end_ms.saturating_sub(now_ms).div_ceil(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::period::TimerConfig;

    fn state(secs: u64) -> TimerState {
        TimerState {
            remaining_seconds: secs,
            ..TimerState::new(&TimerConfig::default())
        }
    }

    #[test]
    fn remaining_rounds_up() {
        assert_eq!(remaining_secs(10_000, 0), 10);
        assert_eq!(remaining_secs(10_000, 1), 10);
        assert_eq!(remaining_secs(10_000, 999), 10);
        assert_eq!(remaining_secs(10_000, 1_000), 9);
        assert_eq!(remaining_secs(10_000, 12_000), 0);
    }

    #[test]
    fn start_twice_is_noop() {
        let mut clock = CountdownClock::new();
        let mut st = state(60);
        assert!(clock.start(&mut st, 1_000));
        let target = clock.target_end_ms();
        assert!(!clock.start(&mut st, 5_000));
        assert_eq!(clock.target_end_ms(), target);
    }

    #[test]
    fn pause_freezes_remaining() {
        let mut clock = CountdownClock::new();
        let mut st = state(60);
        clock.start(&mut st, 0);
        assert!(clock.pause(&mut st, 20_500));
        assert_eq!(st.remaining_seconds, 40);
        assert!(!st.running);
        assert_eq!(clock.target_end_ms(), None);

        // time passing while paused changes nothing
        assert_eq!(clock.sample(&mut st, 90_000), ClockSignal::Idle);
        assert_eq!(st.remaining_seconds, 40);
    }

    #[test]
    fn pause_when_idle_is_noop() {
        let mut clock = CountdownClock::new();
        let mut st = state(60);
        assert!(!clock.pause(&mut st, 10_000));
        assert_eq!(st.remaining_seconds, 60);
    }

    #[test]
    fn resume_continues_from_frozen_value() {
        let mut clock = CountdownClock::new();
        let mut st = state(60);
        clock.start(&mut st, 0);
        clock.pause(&mut st, 30_000);
        clock.start(&mut st, 100_000);
        assert_eq!(
            clock.sample(&mut st, 110_000),
            ClockSignal::Running { remaining_secs: 20 }
        );
    }

    #[test]
    fn elapsed_fires_once() {
        let mut clock = CountdownClock::new();
        let mut st = state(2);
        clock.start(&mut st, 0);
        assert_eq!(clock.sample(&mut st, 2_500), ClockSignal::Elapsed);
        assert_eq!(clock.sample(&mut st, 2_700), ClockSignal::Idle);
        assert_eq!(clock.sample(&mut st, 9_000), ClockSignal::Idle);
        assert_eq!(st.remaining_seconds, 0);
        assert!(!st.running);
    }

    #[test]
    fn skipped_samples_do_not_drift() {
        let mut clock = CountdownClock::new();
        let mut st = state(25 * 60);
        clock.start(&mut st, 0);
        // irregular sampling cadence
        for now in [199, 450, 1_310, 60_001, 61_000, 600_250] {
            clock.sample(&mut st, now);
        }
        assert_eq!(st.remaining_seconds, 25 * 60 - 600);
    }

    #[test]
    fn reset_stops_without_elapsing() {
        let mut clock = CountdownClock::new();
        let mut st = state(10);
        clock.start(&mut st, 0);
        clock.reset(&mut st, 300);
        assert!(!st.running);
        assert_eq!(st.remaining_seconds, 300);
        assert_eq!(clock.sample(&mut st, 50_000), ClockSignal::Idle);
    }

    #[test]
    fn manual_time_is_shared() {
        let t = ManualTime::new(5);
        let other = t.clone();
        t.advance_secs(2);
        assert_eq!(other.now_ms(), 2_005);
    }
}
