//! SessionDriver: the host loop around a sequencer and a recorder.
//!
//! One task samples the sequencer on a fixed interval, hands completions to
//! the recorder and follows identity changes. Remote writes spawned by the
//! recorder are awaited (bounded) when the loop shuts down.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::events::SessionCompletionEvent;
use crate::identity::IdentityReceiver;
use crate::stats::SessionRecorder;
use crate::timer::PeriodSequencer;

pub const TICK_INTERVAL: Duration = Duration::from_millis(200);
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct SessionDriver {
    sequencer: PeriodSequencer,
    recorder: SessionRecorder,
    identity: IdentityReceiver,
    in_flight: Vec<JoinHandle<()>>,
    tick_every: Duration,
    grace: Duration,
}

impl SessionDriver {
    /// The identity currently published on `identity` is attached right away.
    pub fn new(sequencer: PeriodSequencer, mut recorder: SessionRecorder, mut identity: IdentityReceiver) -> Self {
        recorder.set_identity(identity.borrow_and_update().clone());
        Self {
            sequencer,
            recorder,
            identity,
            in_flight: Vec::new(),
            tick_every: TICK_INTERVAL,
            grace: SHUTDOWN_GRACE,
        }
    }

    pub fn with_tick_interval(mut self, every: Duration) -> Self {
        self.tick_every = every;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn sequencer(&self) -> &PeriodSequencer {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut PeriodSequencer {
        &mut self.sequencer
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    /// Sample once and record a completion if one fired.
    pub fn step(&mut self) -> Option<SessionCompletionEvent> {
        let completion = self.sequencer.tick()?;
        tracing::info!(
            period = %completion.period,
            minutes = completion.minutes,
            next = %self.sequencer.period(),
            "period completed"
        );
        self.in_flight.retain(|handle| !handle.is_finished());
        if let Some(handle) = self.recorder.record(&completion) {
            self.in_flight.push(handle);
        }
        Some(completion)
    }

    /// Drive until `shutdown` resolves, then wait for pending remote writes.
    ///
    /// Returns the number of completions recorded.
    pub async fn run<F>(&mut self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        self.run_with(shutdown, |_, _| ControlFlow::Continue(())).await
    }

    /// Like [`SessionDriver::run`], calling `on_tick` after every sample
    /// with the completion it produced. The host persists state and takes
    /// queued commands from there; `Break` stops the loop.
    pub async fn run_with<F, H>(&mut self, shutdown: F, mut on_tick: H) -> usize
    where
        F: Future<Output = ()>,
        H: FnMut(&mut PeriodSequencer, Option<&SessionCompletionEvent>) -> ControlFlow<()>,
    {
        let mut ticker = tokio::time::interval(self.tick_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut completions = 0;
        let mut identity_open = true;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                changed = self.identity.changed(), if identity_open => match changed {
                    Ok(()) => {
                        let uid = self.identity.borrow_and_update().clone();
                        self.recorder.set_identity(uid);
                    }
                    // provider gone: keep the last identity
                    Err(_) => identity_open = false,
                },
                _ = ticker.tick() => {
                    let completion = self.step();
                    if completion.is_some() {
                        completions += 1;
                    }
                    if on_tick(&mut self.sequencer, completion.as_ref()).is_break() {
                        break;
                    }
                }
            }
        }

        self.drain().await;
        completions
    }

    /// Await in-flight remote writes for at most the shutdown grace.
    pub async fn drain(&mut self) {
        let deadline = Instant::now() + self.grace;
        let pending = std::mem::take(&mut self.in_flight);
        let total = pending.len();
        let mut abandoned = 0;
        for handle in pending {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "remote write task failed"),
                Err(_) => abandoned += 1,
            }
        }
        if abandoned > 0 {
            tracing::warn!(abandoned, total, "remote writes still pending at shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{identity_channel, UserId};
    use crate::remote::{DocumentPath, MemoryRemoteStore};
    use crate::stats::StatsScope;
    use crate::storage::MemoryStore;
    use crate::timer::{ManualTime, PeriodKind, TimerConfig};
    use std::sync::Arc;

    fn driver(time: &ManualTime, remote: &MemoryRemoteStore) -> (crate::identity::IdentitySender, SessionDriver) {
        let sequencer = PeriodSequencer::with_time_source(TimerConfig::default(), Arc::new(time.clone())).unwrap();
        let recorder = SessionRecorder::new(Arc::new(MemoryStore::new()), Some(Arc::new(remote.clone())));
        let (tx, rx) = identity_channel(None);
        let driver = SessionDriver::new(sequencer, recorder, rx).with_tick_interval(Duration::from_millis(5));
        (tx, driver)
    }

    #[test]
    fn step_records_completion() {
        let time = ManualTime::new(1_000_000);
        let (_tx, mut driver) = driver(&time, &MemoryRemoteStore::new());
        driver.sequencer_mut().start();
        assert!(driver.step().is_none());

        time.advance_secs(25 * 60);
        let completion = driver.step().unwrap();
        assert_eq!(completion.period, PeriodKind::Focus);
        assert_eq!(driver.sequencer().period(), PeriodKind::ShortBreak);
        assert!(driver.sequencer().is_running());
        let fresh = driver.recorder().fresh_totals(&StatsScope::AllTime).unwrap();
        assert_eq!(fresh.focus_minutes, 25.0);

        // sampling again does not re-fire
        assert!(driver.step().is_none());
    }

    #[tokio::test]
    async fn run_follows_identity_and_drains_writes() {
        let time = ManualTime::new(1_000_000);
        let remote = MemoryRemoteStore::new();
        let (tx, mut driver) = driver(&time, &remote);
        driver.sequencer_mut().start();

        let uid = UserId::new("u1").unwrap();
        tx.send_replace(Some(uid.clone()));
        assert_eq!(driver.run(tokio::time::sleep(Duration::from_millis(30))).await, 0);
        assert_eq!(driver.recorder().identity(), Some(&uid));

        time.advance_secs(25 * 60);
        let recorded = driver.run(tokio::time::sleep(Duration::from_millis(30))).await;
        assert_eq!(recorded, 1);

        let doc = remote.document(&DocumentPath::stats_aggregate(&uid)).unwrap();
        assert_eq!(doc["focusMinutes"].as_f64(), Some(25.0));
    }

    #[tokio::test]
    async fn tick_hook_sees_completions_and_can_stop_the_loop() {
        let time = ManualTime::new(1_000_000);
        let (_tx, mut driver) = driver(&time, &MemoryRemoteStore::new());
        driver.sequencer_mut().start();
        time.advance_secs(25 * 60);

        let mut seen = Vec::new();
        let recorded = driver
            .run_with(std::future::pending::<()>(), |seq, completion| {
                if let Some(done) = completion {
                    seen.push(done.period);
                    seq.pause();
                    return ControlFlow::Break(());
                }
                ControlFlow::Continue(())
            })
            .await;

        assert_eq!(recorded, 1);
        assert_eq!(seen, vec![PeriodKind::Focus]);
        assert!(!driver.sequencer().is_running());
        assert_eq!(driver.sequencer().period(), PeriodKind::ShortBreak);
    }

    #[tokio::test]
    async fn shutdown_stops_loop_without_completions() {
        let time = ManualTime::new(0);
        let (_tx, mut driver) = driver(&time, &MemoryRemoteStore::new());
        driver.sequencer_mut().start();
        assert_eq!(driver.run(std::future::ready(())).await, 0);
        assert_eq!(driver.sequencer().remaining_seconds(), 25 * 60);
    }
}
