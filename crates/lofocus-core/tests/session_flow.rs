//! End-to-end session flows: sequencer completions feeding the recorder,
//! and the reader resolving what a user would see.

use std::sync::Arc;

use lofocus_core::{
    AggregateStats, Database, DocumentPath, ManualTime, MemoryRemoteStore, MemoryStore, PeriodKind,
    PeriodSequencer, SessionCompletionEvent, SessionRecorder, StatisticsReader, StatsScope, TimerConfig,
    UserId,
};

fn sequencer(time: &ManualTime, config: TimerConfig) -> PeriodSequencer {
    PeriodSequencer::with_time_source(config, Arc::new(time.clone())).unwrap()
}

/// Let the running period run out and return its completion.
fn finish_period(seq: &mut PeriodSequencer, time: &ManualTime) -> SessionCompletionEvent {
    time.advance_secs(seq.remaining_seconds());
    seq.tick().expect("period should complete")
}

#[tokio::test]
async fn four_focus_three_short_breaks() {
    let time = ManualTime::new(1_700_000_000_000);
    let config = TimerConfig {
        focus_minutes: 25,
        short_break_minutes: 5,
        long_break_minutes: 15,
        long_break_interval: 4,
        notify_volume: 80,
    };
    let mut seq = sequencer(&time, config);
    let db = Arc::new(Database::open_memory().unwrap());
    let mut recorder = SessionRecorder::new(db.clone(), None);

    seq.start();
    let mut kinds = Vec::new();
    for _ in 0..7 {
        let completion = finish_period(&mut seq, &time);
        kinds.push(completion.period);
        recorder.record(&completion);
    }

    use PeriodKind::{Focus, ShortBreak};
    assert_eq!(kinds, vec![Focus, ShortBreak, Focus, ShortBreak, Focus, ShortBreak, Focus]);
    assert_eq!(seq.period(), PeriodKind::LongBreak);
    assert_eq!(seq.remaining_seconds(), 15 * 60);
    assert!(seq.is_running());
    assert_eq!(seq.completed_focus_count(), 4);

    let expected = AggregateStats {
        total_minutes: 115.0,
        focus_minutes: 100.0,
        break_minutes: 15.0,
    };
    assert_eq!(recorder.fresh_totals(&StatsScope::AllTime), Some(expected));

    // a reader without fresh totals sees the same numbers from the local tier
    let reader = StatisticsReader::new(db, None);
    assert_eq!(reader.read(&StatsScope::AllTime, None, None).await, expected);
}

#[tokio::test]
async fn offline_remote_misses_delta_but_local_keeps_it() {
    let time = ManualTime::new(1_700_000_000_000);
    let mut seq = sequencer(&time, TimerConfig::default());
    let local = MemoryStore::new();
    let remote = MemoryRemoteStore::new();
    let uid = UserId::new("offline-user").unwrap();
    let mut recorder = SessionRecorder::new(Arc::new(local.clone()), Some(Arc::new(remote.clone())))
        .with_identity(Some(uid.clone()));

    seq.start();
    remote.set_offline(true);
    let focus = finish_period(&mut seq, &time);
    recorder.record(&focus).unwrap().await.unwrap();

    remote.set_offline(false);
    let short_break = finish_period(&mut seq, &time);
    recorder.record(&short_break).unwrap().await.unwrap();

    let doc = remote.document(&DocumentPath::stats_aggregate(&uid)).unwrap();
    assert_eq!(doc["focusMinutes"].as_f64(), Some(0.0));
    assert_eq!(doc["breakMinutes"].as_f64(), Some(5.0));
    assert_eq!(doc["totalMinutes"].as_f64(), Some(5.0));

    let reader = StatisticsReader::new(Arc::new(local), Some(Arc::new(remote)));
    let anonymous = reader.read(&StatsScope::AllTime, None, None).await;
    assert_eq!(anonymous.focus_minutes, 25.0);
    assert_eq!(anonymous.total_minutes, 30.0);

    // the remote tier wins for a signed-in read, so the missed focus stays missing
    let signed_in = reader.read(&StatsScope::AllTime, Some(&uid), None).await;
    assert_eq!(signed_in.focus_minutes, 0.0);
}

#[test]
fn selection_while_running_waits_for_pause() {
    let time = ManualTime::new(1_700_000_000_000);
    let mut seq = sequencer(&time, TimerConfig::default());
    seq.start();
    time.advance_secs(25 * 60 - 600);
    assert!(seq.tick().is_none());
    assert_eq!(seq.remaining_seconds(), 600);

    seq.select(PeriodKind::ShortBreak);
    assert_eq!(seq.period(), PeriodKind::Focus);
    assert_eq!(seq.selected_period(), PeriodKind::ShortBreak);
    assert_eq!(seq.remaining_seconds(), 600);

    time.advance_secs(100);
    assert!(seq.tick().is_none());
    assert_eq!(seq.remaining_seconds(), 500);

    seq.pause();
    assert_eq!(seq.period(), PeriodKind::ShortBreak);
    assert_eq!(seq.remaining_seconds(), 5 * 60);
    assert!(!seq.is_running());
}

#[test]
fn selection_while_running_is_dropped_on_completion() {
    let time = ManualTime::new(1_700_000_000_000);
    let mut seq = sequencer(&time, TimerConfig::default());
    seq.start();
    time.advance_secs(25 * 60 - 600);
    seq.tick();
    seq.select(PeriodKind::LongBreak);

    let completion = finish_period(&mut seq, &time);
    assert_eq!(completion.period, PeriodKind::Focus);
    assert_eq!(completion.minutes, 25.0);
    assert_eq!(seq.period(), PeriodKind::ShortBreak);
    assert_eq!(seq.selected_period(), PeriodKind::ShortBreak);
}

#[test]
fn invalid_config_changes_nothing() {
    let time = ManualTime::new(1_700_000_000_000);
    let mut seq = sequencer(&time, TimerConfig::default());
    seq.start();
    time.advance_secs(60);
    seq.tick();
    let before = *seq.state();

    let bad = TimerConfig {
        long_break_interval: 1,
        ..TimerConfig::default()
    };
    assert!(seq.update_config(bad).is_err());
    assert_eq!(*seq.state(), before);
    assert_eq!(*seq.config(), TimerConfig::default());
    assert!(seq.pending_config().is_none());
}

#[tokio::test]
async fn reading_twice_is_idempotent() {
    let time = ManualTime::new(1_700_000_000_000);
    let mut seq = sequencer(&time, TimerConfig::default());
    let local = Arc::new(MemoryStore::new());
    let remote = Arc::new(MemoryRemoteStore::new());
    let uid = UserId::new("reader").unwrap();
    let mut recorder = SessionRecorder::new(local.clone(), Some(remote.clone())).with_identity(Some(uid.clone()));

    seq.start();
    let completion = finish_period(&mut seq, &time);
    recorder.record(&completion).unwrap().await.unwrap();

    let reader = StatisticsReader::new(local, Some(remote));
    let scope = StatsScope::today();
    let fresh = recorder.fresh_totals(&StatsScope::AllTime);
    let first = reader.read(&StatsScope::AllTime, Some(&uid), fresh.as_ref()).await;
    let second = reader.read(&StatsScope::AllTime, Some(&uid), fresh.as_ref()).await;
    assert_eq!(first, second);
    assert_eq!(
        reader.read(&scope, Some(&uid), None).await,
        reader.read(&scope, Some(&uid), None).await
    );
}
