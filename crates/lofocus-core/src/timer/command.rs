use serde::{Deserialize, Serialize};

use super::{PeriodKind, PeriodSequencer, TimerConfig};
use crate::error::ConfigError;
use crate::events::Event;

/// A user command on the sequencer, in a form that can be stored and
/// handed to whichever process currently owns the timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TimerCommand {
    Start,
    Pause,
    Resume,
    Reset,
    Select { period: PeriodKind },
    Configure { config: TimerConfig },
}

impl TimerCommand {
    /// Run the command, returning the event it produced (if any).
    pub fn apply(&self, sequencer: &mut PeriodSequencer) -> Result<Option<Event>, ConfigError> {
        Ok(match self {
            TimerCommand::Start => sequencer.start(),
            TimerCommand::Pause => sequencer.pause(),
            TimerCommand::Resume => sequencer.resume(),
            TimerCommand::Reset => Some(sequencer.reset()),
            TimerCommand::Select { period } => Some(sequencer.select(*period)),
            TimerCommand::Configure { config } => Some(sequencer.update_config(*config)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualTime;
    use std::sync::Arc;

    fn sequencer() -> PeriodSequencer {
        let mut seq =
            PeriodSequencer::with_time_source(TimerConfig::default(), Arc::new(ManualTime::new(0))).unwrap();
        seq.set_observer(Box::new(|_: &Event| {}));
        seq
    }

    #[test]
    fn commands_drive_the_sequencer() {
        let mut seq = sequencer();
        assert!(TimerCommand::Start.apply(&mut seq).unwrap().is_some());
        assert!(seq.is_running());
        TimerCommand::Pause.apply(&mut seq).unwrap();
        assert!(!seq.is_running());
        TimerCommand::Select {
            period: PeriodKind::LongBreak,
        }
        .apply(&mut seq)
        .unwrap();
        assert_eq!(seq.period(), PeriodKind::LongBreak);
    }

    #[test]
    fn configure_rejects_invalid_config() {
        let mut seq = sequencer();
        let config = TimerConfig {
            focus_minutes: 0,
            ..TimerConfig::default()
        };
        assert!(TimerCommand::Configure { config }.apply(&mut seq).is_err());
        assert_eq!(seq.config().focus_minutes, 25);
    }

    #[test]
    fn stored_form_is_tagged() {
        let json = serde_json::to_value(TimerCommand::Select {
            period: PeriodKind::ShortBreak,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"command": "select", "period": "short_break"}));
        let back: TimerCommand = serde_json::from_value(serde_json::json!({"command": "reset"})).unwrap();
        assert_eq!(back, TimerCommand::Reset);
    }
}
