mod clock;
mod command;
mod period;
mod sequencer;
mod state;

pub use clock::{ClockSignal, CountdownClock, ManualTime, SystemTime, TimeSource};
pub use command::TimerCommand;
pub use period::{PeriodKind, TimerConfig, INTERVAL_RANGE, MINUTES_RANGE, VOLUME_RANGE};
pub use sequencer::{next_period, PeriodObserver, PeriodSequencer, SequencerSnapshot};
pub use state::TimerState;
