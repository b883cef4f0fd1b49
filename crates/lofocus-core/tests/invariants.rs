//! Property tests for the sequencer and the statistics buckets.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use lofocus_core::stats::LocalStatsRepository;
use lofocus_core::timer::next_period;
use lofocus_core::{
    ManualTime, MemoryStore, PeriodKind, PeriodSequencer, SessionCompletionEvent, SessionRecorder, StatsScope,
    TimerConfig,
};
use proptest::prelude::*;

fn config_with_interval(interval: u32) -> TimerConfig {
    TimerConfig {
        long_break_interval: interval,
        ..TimerConfig::default()
    }
}

fn period_kind() -> impl Strategy<Value = PeriodKind> {
    prop_oneof![
        Just(PeriodKind::Focus),
        Just(PeriodKind::ShortBreak),
        Just(PeriodKind::LongBreak),
    ]
}

#[derive(Debug, Clone)]
enum Op {
    Start,
    Pause,
    Reset,
    Select(PeriodKind),
    Advance(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Start),
        Just(Op::Pause),
        Just(Op::Reset),
        period_kind().prop_map(Op::Select),
        (0u64..4_000_000).prop_map(Op::Advance),
    ]
}

proptest! {
    #[test]
    fn transitions_follow_long_break_cadence(interval in 2u32..=12, completions in 1usize..40) {
        let time = ManualTime::new(0);
        let mut seq = PeriodSequencer::with_time_source(config_with_interval(interval), Arc::new(time.clone())).unwrap();
        seq.start();

        for _ in 0..completions {
            time.advance_secs(seq.remaining_seconds());
            let done = seq.tick().unwrap();
            let next = seq.period();
            if done.period == PeriodKind::Focus {
                let count = seq.completed_focus_count();
                let expected = if count % u64::from(interval) == 0 {
                    PeriodKind::LongBreak
                } else {
                    PeriodKind::ShortBreak
                };
                prop_assert_eq!(next, expected);
            } else {
                prop_assert_eq!(next, PeriodKind::Focus);
            }
            prop_assert_eq!(next, next_period(done.period, seq.completed_focus_count(), interval));
            prop_assert!(seq.is_running());
        }
    }

    #[test]
    fn start_then_pause_keeps_remaining(offset_ms in 0u64..1_000, focus in 1u32..=600) {
        let time = ManualTime::new(1_000);
        let config = TimerConfig { focus_minutes: focus, ..TimerConfig::default() };
        let mut seq = PeriodSequencer::with_time_source(config, Arc::new(time.clone())).unwrap();
        let before = seq.remaining_seconds();
        seq.start();
        time.advance_ms(offset_ms);
        seq.pause();
        prop_assert!(before - seq.remaining_seconds() <= 1);
    }

    #[test]
    fn random_commands_never_double_fire(ops in proptest::collection::vec(op(), 1..60)) {
        let time = ManualTime::new(0);
        let mut seq = PeriodSequencer::with_time_source(TimerConfig::default(), Arc::new(time.clone())).unwrap();
        let mut focus_count = 0;

        for op in ops {
            match op {
                Op::Start => { seq.start(); }
                Op::Pause => { seq.pause(); }
                Op::Reset => { seq.reset(); }
                Op::Select(kind) => { seq.select(kind); }
                Op::Advance(ms) => time.advance_ms(ms),
            }
            let was_running = seq.is_running();
            let fired = seq.tick().is_some();
            prop_assert!(!fired || was_running);
            // a second sample at the same instant never completes again
            prop_assert!(seq.tick().is_none());
            prop_assert!(seq.completed_focus_count() >= focus_count);
            focus_count = seq.completed_focus_count();
        }
    }

    #[test]
    fn aggregates_grow_and_stay_consistent(
        sessions in proptest::collection::vec((period_kind(), 1u32..=600, 0i64..86_400 * 30), 1..30)
    ) {
        let store = MemoryStore::new();
        let mut recorder = SessionRecorder::new(Arc::new(store.clone()), None);
        // what a restarted process would read back
        let persisted = LocalStatsRepository::new(Arc::new(store));
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut previous = None;
        let mut previous_daily: HashMap<StatsScope, lofocus_core::AggregateStats> = HashMap::new();

        for (kind, minutes, offset) in sessions {
            let at = base + chrono::Duration::seconds(offset);
            let event = SessionCompletionEvent::new(kind, f64::from(minutes), at);
            recorder.record(&event);

            let all_time = recorder.fresh_totals(&StatsScope::AllTime).unwrap();
            prop_assert_eq!(all_time.total_minutes, all_time.focus_minutes + all_time.break_minutes);
            if let Some(prev) = previous {
                let prev: lofocus_core::AggregateStats = prev;
                prop_assert!(all_time.total_minutes >= prev.total_minutes);
                prop_assert!(all_time.focus_minutes >= prev.focus_minutes);
                prop_assert!(all_time.break_minutes >= prev.break_minutes);
            }
            previous = Some(all_time);

            let day = StatsScope::Day(lofocus_core::DayKey::from_utc(at));
            let daily = recorder.fresh_totals(&day).unwrap();
            prop_assert_eq!(daily.total_minutes, daily.focus_minutes + daily.break_minutes);

            let stored = persisted.load(&day).unwrap().unwrap().to_aggregate();
            prop_assert_eq!(stored.total_minutes, stored.focus_minutes + stored.break_minutes);
            prop_assert_eq!(stored, daily);
            if let Some(prev) = previous_daily.get(&day) {
                prop_assert!(stored.total_minutes > prev.total_minutes);
                prop_assert!(stored.focus_minutes >= prev.focus_minutes);
                prop_assert!(stored.break_minutes >= prev.break_minutes);
            }
            previous_daily.insert(day, stored);

            let stored_all_time = persisted.load(&StatsScope::AllTime).unwrap().unwrap().to_aggregate();
            prop_assert_eq!(stored_all_time, all_time);
        }
    }
}
