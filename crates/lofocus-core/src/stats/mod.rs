//! Session statistics.
//!
//! Completed periods are added to two buckets (all-time and per calendar
//! day) in the local tier and, when an identity is attached, in the remote
//! tier. Reading resolves each field from the freshest tier that has it.

mod aggregate;
mod day;
mod local;
mod reader;
mod recorder;

pub use aggregate::{AggregateStats, StatsRecord};
pub use day::{DayKey, StatsScope};
pub use local::{LocalStatsRepository, STATS_DAILY_PREFIX, STATS_TOTAL_KEY};
pub use reader::{resolve, StatisticsReader};
pub use recorder::SessionRecorder;
