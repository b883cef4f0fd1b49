//! Period sequencer.
//!
//! A wall-clock-based state machine over focus and break periods. It does not
//! spawn threads; the host calls `tick()` periodically (see
//! [`crate::driver::SessionDriver`]).
//!
//! ## Transitions
//!
//! ```text
//! Focus --(count % interval == 0)--> LongBreak --> Focus
//!       \-------(otherwise)--------> ShortBreak --> Focus
//! ```
//!
//! Every completion resets the clock to the next period's duration and starts
//! it again immediately.
//!
//! ## Usage
//!
//! ```ignore
//! let mut seq = PeriodSequencer::new(TimerConfig::default())?;
//! seq.start();
//! // In a loop:
//! if let Some(done) = seq.tick() {
//!     recorder.record(&done);
//! }
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::clock::{ClockSignal, CountdownClock, SystemTime, TimeSource};
use super::period::{PeriodKind, TimerConfig};
use super::state::TimerState;
use crate::error::ConfigError;
use crate::events::{Event, SessionCompletionEvent};

/// Optional sink for sequencer events.
pub trait PeriodObserver: Send {
    fn on_event(&mut self, event: &Event);
}

impl<F> PeriodObserver for F
where
    F: FnMut(&Event) + Send,
{
    fn on_event(&mut self, event: &Event) {
        self(event)
    }
}

/// Serializable sequencer state, used to persist a timer between processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencerSnapshot {
    pub config: TimerConfig,
    #[serde(default)]
    pub pending_config: Option<TimerConfig>,
    pub state: TimerState,
    #[serde(default)]
    pub pending_selection: Option<PeriodKind>,
    #[serde(default)]
    pub target_end_ms: Option<u64>,
}

/// Which period follows `finished`.
///
/// `completed_focus_count` is the count *after* a finished focus period has
/// been added.
pub fn next_period(finished: PeriodKind, completed_focus_count: u64, long_break_interval: u32) -> PeriodKind {
    match finished {
        PeriodKind::Focus => {
            let interval = u64::from(long_break_interval.max(2));
            if completed_focus_count % interval == 0 {
                PeriodKind::LongBreak
            } else {
                PeriodKind::ShortBreak
            }
        }
        PeriodKind::ShortBreak | PeriodKind::LongBreak => PeriodKind::Focus,
    }
}

pub struct PeriodSequencer {
    config: TimerConfig,
    /// Accepted while running; applied at the next idle point.
    pending_config: Option<TimerConfig>,
    state: TimerState,
    /// Period picked by the user while the clock was running.
    pending_selection: Option<PeriodKind>,
    clock: CountdownClock,
    time: Arc<dyn TimeSource>,
    observer: Option<Box<dyn PeriodObserver>>,
    warned_unwired: bool,
}

impl fmt::Debug for PeriodSequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodSequencer")
            .field("config", &self.config)
            .field("pending_config", &self.pending_config)
            .field("state", &self.state)
            .field("pending_selection", &self.pending_selection)
            .field("clock", &self.clock)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl PeriodSequencer {
    /// Create a sequencer on the system clock, idle at the start of a focus
    /// period.
    ///
    /// # Errors
    /// Returns an error if `config` is out of range.
    pub fn new(config: TimerConfig) -> Result<Self, ConfigError> {
        Self::with_time_source(config, Arc::new(SystemTime))
    }

    pub fn with_time_source(config: TimerConfig, time: Arc<dyn TimeSource>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            pending_config: None,
            state: TimerState::new(&config),
            pending_selection: None,
            clock: CountdownClock::new(),
            time,
            observer: None,
            warned_unwired: false,
        })
    }

    /// Rebuild a sequencer from a persisted snapshot.
    ///
    /// # Errors
    /// Returns an error if the stored config is out of range.
    pub fn restore(snapshot: SequencerSnapshot, time: Arc<dyn TimeSource>) -> Result<Self, ConfigError> {
        snapshot.config.validate()?;
        let pending_config = match snapshot.pending_config {
            Some(cfg) if cfg.validate().is_ok() => Some(cfg),
            Some(_) => {
                tracing::warn!("dropping invalid staged config from snapshot");
                None
            }
            None => None,
        };
        let mut state = snapshot.state;
        if state.running && snapshot.target_end_ms.is_none() {
            state.running = false;
        }
        Ok(Self {
            config: snapshot.config,
            pending_config,
            state,
            pending_selection: snapshot.pending_selection,
            clock: CountdownClock::with_target(snapshot.target_end_ms),
            time,
            observer: None,
            warned_unwired: false,
        })
    }

    pub fn snapshot(&self) -> SequencerSnapshot {
        SequencerSnapshot {
            config: self.config,
            pending_config: self.pending_config,
            state: self.state,
            pending_selection: self.pending_selection,
            target_end_ms: self.clock.target_end_ms(),
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn PeriodObserver>) {
        self.observer = Some(observer);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn pending_config(&self) -> Option<&TimerConfig> {
        self.pending_config.as_ref()
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn period(&self) -> PeriodKind {
        self.state.current_period
    }

    /// The period shown to the user; differs from `period()` only while a
    /// selection is pending.
    pub fn selected_period(&self) -> PeriodKind {
        self.pending_selection.unwrap_or(self.state.current_period)
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.state.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn completed_focus_count(&self) -> u64 {
        self.state.completed_focus_count
    }

    pub fn total_secs(&self) -> u64 {
        self.config.duration_secs(self.state.current_period)
    }

    /// 0.0 .. 100.0 progress within the current period.
    pub fn progress_pct(&self) -> f64 {
        let total = self.total_secs();
        if total == 0 {
            return 0.0;
        }
        let done = total.saturating_sub(self.state.remaining_seconds);
        (done as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Build a full state snapshot event.
    pub fn state_snapshot(&self) -> Event {
        Event::StateSnapshot {
            period: self.state.current_period,
            selected_period: self.selected_period(),
            running: self.state.running,
            remaining_secs: self.state.remaining_seconds,
            total_secs: self.total_secs(),
            progress_pct: self.progress_pct(),
            completed_focus_count: self.state.completed_focus_count,
            at: self.now_utc(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start or resume the countdown. `None` when already running.
    pub fn start(&mut self) -> Option<Event> {
        let now = self.time.now_ms();
        if !self.clock.start(&mut self.state, now) {
            return None;
        }
        let event = Event::PeriodStarted {
            period: self.state.current_period,
            remaining_secs: self.state.remaining_seconds,
            auto: false,
            at: self.now_utc(),
        };
        self.emit(&event);
        Some(event)
    }

    pub fn resume(&mut self) -> Option<Event> {
        self.start()
    }

    /// Pause and apply anything staged while running. `None` when idle.
    pub fn pause(&mut self) -> Option<Event> {
        let now = self.time.now_ms();
        if !self.clock.pause(&mut self.state, now) {
            return None;
        }
        let event = Event::PeriodPaused {
            period: self.state.current_period,
            remaining_secs: self.state.remaining_seconds,
            at: self.now_utc(),
        };
        self.emit(&event);

        // A staged config only changes future periods; the frozen remaining
        // time of this one is kept.
        if let Some(cfg) = self.pending_config.take() {
            self.config = cfg;
        }
        if let Some(kind) = self.pending_selection.take() {
            self.apply_selection(kind);
        }
        Some(event)
    }

    /// Stop and restore the full duration of the current period.
    pub fn reset(&mut self) -> Event {
        if let Some(cfg) = self.pending_config.take() {
            self.config = cfg;
        }
        if let Some(kind) = self.pending_selection.take() {
            self.state.current_period = kind;
        }
        let duration = self.total_secs();
        self.clock.reset(&mut self.state, duration);
        let event = Event::PeriodReset {
            period: self.state.current_period,
            duration_secs: duration,
            at: self.now_utc(),
        };
        self.emit(&event);
        event
    }

    /// Switch to another period.
    ///
    /// While idle the switch is immediate. While running the in-flight
    /// countdown keeps its remaining time and period identity; the choice is
    /// applied on the next pause or dropped when the period completes.
    pub fn select(&mut self, kind: PeriodKind) -> Event {
        if self.state.running {
            self.pending_selection = if kind == self.state.current_period {
                None
            } else {
                Some(kind)
            };
            tracing::debug!(
                running = %self.state.current_period,
                selected = %kind,
                remaining_secs = self.state.remaining_seconds,
                "period selected while running; keeping remaining time"
            );
            let event = Event::PeriodSelected {
                period: kind,
                applied: false,
                remaining_secs: self.state.remaining_seconds,
                at: self.now_utc(),
            };
            self.emit(&event);
            return event;
        }
        self.pending_selection = None;
        self.apply_selection(kind)
    }

    /// Replace the timer configuration.
    ///
    /// # Errors
    /// Returns an error, and changes nothing, if `config` is out of range.
    pub fn update_config(&mut self, config: TimerConfig) -> Result<Event, ConfigError> {
        config.validate()?;
        let staged = self.state.running;
        if staged {
            self.pending_config = Some(config);
        } else {
            self.pending_config = None;
            self.config = config;
            let duration = self.total_secs();
            self.clock.reset(&mut self.state, duration);
        }
        let event = Event::ConfigApplied {
            config,
            staged,
            at: self.now_utc(),
        };
        self.emit(&event);
        Ok(event)
    }

    /// Sample the clock. Returns the finished period when it reached zero on
    /// this sample; the next period is already running by then.
    pub fn tick(&mut self) -> Option<SessionCompletionEvent> {
        let now = self.time.now_ms();
        match self.clock.sample(&mut self.state, now) {
            ClockSignal::Elapsed => Some(self.complete(now)),
            ClockSignal::Idle | ClockSignal::Running { .. } => None,
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete(&mut self, now_ms: u64) -> SessionCompletionEvent {
        let finished = self.state.current_period;
        let at = utc_from_ms(now_ms);
        let completion = SessionCompletionEvent::new(
            finished,
            f64::from(self.config.minutes_for(finished)),
            at,
        );

        if let Some(cfg) = self.pending_config.take() {
            self.config = cfg;
        }
        self.pending_selection = None;

        if finished == PeriodKind::Focus {
            self.state.completed_focus_count += 1;
        }
        let next = next_period(
            finished,
            self.state.completed_focus_count,
            self.config.long_break_interval,
        );
        self.state.current_period = next;
        let duration = self.total_secs();
        self.clock.reset(&mut self.state, duration);

        let completed = Event::PeriodCompleted {
            period: finished,
            minutes: completion.minutes,
            next_period: next,
            completed_focus_count: self.state.completed_focus_count,
            at,
        };
        self.emit(&completed);

        self.clock.start(&mut self.state, now_ms);
        let started = Event::PeriodStarted {
            period: next,
            remaining_secs: self.state.remaining_seconds,
            auto: true,
            at,
        };
        self.emit(&started);

        completion
    }

    fn apply_selection(&mut self, kind: PeriodKind) -> Event {
        self.state.current_period = kind;
        let duration = self.total_secs();
        self.clock.reset(&mut self.state, duration);
        let event = Event::PeriodSelected {
            period: kind,
            applied: true,
            remaining_secs: duration,
            at: self.now_utc(),
        };
        self.emit(&event);
        event
    }

    fn emit(&mut self, event: &Event) {
        tracing::debug!(?event, "sequencer event");
        match self.observer.as_mut() {
            Some(observer) => observer.on_event(event),
            None => {
                if !self.warned_unwired {
                    self.warned_unwired = true;
                    tracing::warn!("no period observer attached; sequencer events are not forwarded");
                }
            }
        }
    }

    fn now_utc(&self) -> DateTime<Utc> {
        utc_from_ms(self.time.now_ms())
    }
}

fn utc_from_ms(ms: u64) -> DateTime<Utc> {
    i64::try_from(ms)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}
