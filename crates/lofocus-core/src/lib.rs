//! # Lofocus Core Library
//!
//! Session timing and statistics for the Lofocus focus timer. The library
//! is host-agnostic: the CLI binary and any other front end drive the same
//! sequencer and recorder.
//!
//! ## Architecture
//!
//! - **Timer**: a drift-corrected countdown clock (target end-time, not
//!   decrement-per-tick) under a Focus / ShortBreak / LongBreak state
//!   machine. The caller samples it with `tick()`.
//! - **Stats**: completed periods become additive updates to an all-time
//!   and a per-day bucket, in a local tier and an identity-scoped remote
//!   tier. Remote writes are fire-and-forget.
//! - **Storage**: SQLite key-value store for the local tier, TOML
//!   configuration, and user preferences. A lease row decides which
//!   process owns the persisted timer.
//! - **Driver**: a tokio loop tying the pieces together for long-running
//!   hosts.
//!
//! ## Key Components
//!
//! - [`PeriodSequencer`]: period state machine
//! - [`SessionRecorder`]: writes completions to both tiers
//! - [`StatisticsReader`]: resolves display-ready aggregates
//! - [`SessionDriver`]: host loop
//! - [`Database`]: local persistence
//! - [`Config`]: application configuration

pub mod driver;
pub mod error;
pub mod events;
pub mod identity;
pub mod remote;
pub mod stats;
pub mod storage;
pub mod timer;

pub use driver::SessionDriver;
pub use error::{ConfigError, CoreError, RemoteError, StorageError};
pub use events::{Event, SessionCompletionEvent};
pub use identity::{identity_channel, UserId};
pub use remote::{DocumentPath, HttpRemoteStore, MemoryRemoteStore, MergeWrite, RemoteStore};
pub use stats::{AggregateStats, DayKey, SessionRecorder, StatisticsReader, StatsRecord, StatsScope};
pub use storage::{
    Acquire, CommandMailbox, Config, Database, LeaseInfo, LocalStore, MemoryStore, PreferenceStore, Preferences,
    TimerLease,
};
pub use timer::{
    ManualTime, PeriodKind, PeriodObserver, PeriodSequencer, SequencerSnapshot, SystemTime, TimeSource,
    TimerCommand, TimerConfig, TimerState,
};
