//! Timer commands.
//!
//! The persisted sequencer has one owner at a time, decided by the timer
//! lease. `timer run` holds it for as long as it drives the countdown and
//! saves the sequencer after every change. A one-shot command that finds
//! such a driver does not touch the sequencer: it posts its command to the
//! mailbox and reports the driver's saved state.

use clap::Subcommand;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use lofocus_core::storage::{get_json, set_json, ENGINE_KEY};
use lofocus_core::{
    identity_channel, Acquire, Database, Event, LeaseInfo, PeriodKind, PeriodObserver, PeriodSequencer,
    SequencerSnapshot, SessionDriver, SessionRecorder, SystemTime, TimerCommand, TimerConfig, TimerLease,
};

use super::AppContext;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// How long a one-shot command waits for another one-shot to finish.
const LEASE_WAIT: Duration = Duration::from_secs(3);
const LEASE_POLL: Duration = Duration::from_millis(50);
const HEARTBEAT_EVERY: Duration = Duration::from_secs(1);
/// How long a forwarded command waits for the driver to pick it up.
const FORWARD_WAIT: Duration = Duration::from_secs(2);

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the countdown of the current period
    Start,
    /// Pause the countdown
    Pause,
    /// Resume a paused countdown
    Resume,
    /// Stop and restore the full duration of the current period
    Reset,
    /// Print current timer state as JSON
    Status,
    /// Switch period (focus, short_break, long_break)
    Select {
        /// Period to switch to
        period: PeriodKind,
    },
    /// Drive the timer in the foreground until Ctrl-C
    Run,
}

type EventLog = Arc<Mutex<Vec<Event>>>;

enum Ownership {
    Owner(TimerLease),
    Driven(LeaseInfo),
}

/// Result of one command against the timer, whoever ran it.
struct Outcome {
    events: Vec<Event>,
    state: Event,
    driven_by: Option<u32>,
}

impl Outcome {
    fn to_json(&self) -> serde_json::Value {
        let mut out = serde_json::json!({
            "events": self.events,
            "state": self.state,
        });
        if let Some(pid) = self.driven_by {
            out["driven_by"] = pid.into();
        }
        out
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Take the timer lease. One-shot holders are short-lived, so wait for
/// them; a driving holder is returned to the caller right away.
async fn claim(ctx: &AppContext, driving: bool) -> CliResult<Ownership> {
    let deadline = Instant::now() + LEASE_WAIT;
    loop {
        match TimerLease::try_acquire(ctx.store(), std::process::id(), driving, now_ms())? {
            Acquire::Acquired(lease) => return Ok(Ownership::Owner(lease)),
            Acquire::Held(info) if info.driving => return Ok(Ownership::Driven(info)),
            Acquire::Held(info) => {
                if Instant::now() >= deadline {
                    return Err(format!("timer is busy in process {}", info.holder).into());
                }
                tokio::time::sleep(LEASE_POLL).await;
            }
        }
    }
}

fn load_sequencer(db: &Database, fallback: TimerConfig) -> CliResult<PeriodSequencer> {
    match get_json::<SequencerSnapshot>(db, ENGINE_KEY) {
        Ok(Some(snapshot)) => match PeriodSequencer::restore(snapshot, Arc::new(SystemTime)) {
            Ok(seq) => return Ok(seq),
            Err(e) => tracing::warn!(error = %e, "stored timer unusable, starting fresh"),
        },
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "stored timer unreadable, starting fresh"),
    }
    Ok(PeriodSequencer::new(fallback)?)
}

fn save_sequencer(db: &Database, seq: &PeriodSequencer) -> CliResult<()> {
    set_json(db, ENGINE_KEY, &seq.snapshot())?;
    Ok(())
}

fn apply_all(seq: &mut PeriodSequencer, commands: Vec<TimerCommand>) -> bool {
    let applied = !commands.is_empty();
    for command in commands {
        if let Err(e) = command.apply(seq) {
            tracing::warn!(?command, error = %e, "timer command rejected");
        }
    }
    applied
}

/// Build the driver for the lease holder: restore the stored sequencer (or
/// seed a new one from the user's preferences) and run commands left
/// behind by a driver that went away.
async fn open_driver(ctx: &AppContext, observer: Box<dyn PeriodObserver>) -> CliResult<SessionDriver> {
    let mut sequencer;
    let mut start_period = None;
    if ctx.db.kv_get(ENGINE_KEY)?.is_some() {
        sequencer = load_sequencer(&ctx.db, ctx.config.timer)?;
    } else {
        let loaded = ctx.preferences().load(ctx.identity.as_ref(), ctx.config.timer).await;
        start_period = Some(loaded.period).filter(|p| *p != PeriodKind::Focus);
        sequencer = PeriodSequencer::new(loaded.config)?;
    }
    sequencer.set_observer(observer);
    if let Some(period) = start_period {
        sequencer.select(period);
    }
    apply_all(&mut sequencer, ctx.mailbox().take_all()?);

    let recorder = SessionRecorder::new(ctx.db.clone(), ctx.remote.clone());
    let (_identity_tx, identity_rx) = identity_channel(ctx.identity.clone());
    Ok(SessionDriver::new(sequencer, recorder, identity_rx).with_shutdown_grace(ctx.write_grace()))
}

fn collector() -> (EventLog, Box<dyn PeriodObserver>) {
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let observer: Box<dyn PeriodObserver> = Box::new(move |event: &Event| {
        if let Ok(mut events) = sink.lock() {
            events.push(event.clone());
        }
    });
    (log, observer)
}

/// Post `command` to the driver and give it a moment to run it.
async fn forward(ctx: &AppContext, command: &TimerCommand, driver: &LeaseInfo) -> CliResult<()> {
    let mailbox = ctx.mailbox();
    mailbox.post(command)?;
    let deadline = Instant::now() + FORWARD_WAIT;
    while !mailbox.is_empty()? {
        if Instant::now() >= deadline {
            tracing::warn!(?command, driver = driver.holder, "command still queued for the timer driver");
            break;
        }
        tokio::time::sleep(LEASE_POLL).await;
    }
    Ok(())
}

/// Run one command (or none, for a status read) against the timer.
///
/// As lease holder this catches up on a period that ran out since the last
/// invocation, recording it, before applying the command. Under a live
/// driver it only forwards the command and reads the saved state.
async fn execute(ctx: &AppContext, command: Option<TimerCommand>) -> CliResult<Outcome> {
    match claim(ctx, false).await? {
        Ownership::Owner(lease) => {
            let (log, observer) = collector();
            let mut driver = open_driver(ctx, observer).await?;
            driver.step();
            let applied = match &command {
                Some(command) => command.apply(driver.sequencer_mut()).map(|_| ()),
                None => Ok(()),
            };
            // a recorded catch-up must be saved even if the command failed
            save_sequencer(&ctx.db, driver.sequencer())?;
            drop(lease);
            driver.drain().await;
            applied?;

            let events = log.lock().map(|events| events.clone()).unwrap_or_default();
            Ok(Outcome {
                events,
                state: driver.sequencer().state_snapshot(),
                driven_by: None,
            })
        }
        Ownership::Driven(info) => {
            if let Some(command) = &command {
                forward(ctx, command, &info).await?;
            }
            let seq = load_sequencer(&ctx.db, ctx.config.timer)?;
            Ok(Outcome {
                events: Vec::new(),
                state: seq.state_snapshot(),
                driven_by: Some(info.holder),
            })
        }
    }
}

/// Stage `config` on the persisted timer, if there is one.
pub(crate) async fn apply_config_to_saved_timer(ctx: &AppContext, config: TimerConfig) -> CliResult<()> {
    let driven = TimerLease::current(ctx.db.as_ref(), now_ms())?.is_some_and(|info| info.driving);
    if !driven && ctx.db.kv_get(ENGINE_KEY)?.is_none() {
        return Ok(());
    }
    execute(ctx, Some(TimerCommand::Configure { config })).await?;
    Ok(())
}

fn print_json_line(event: &Event) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::error!(error = %e, "failed to encode event"),
    }
}

/// Own the timer until Ctrl-C, then pause it and hand the lease back.
async fn drive(ctx: &AppContext) -> CliResult<()> {
    let mut lease = match claim(ctx, true).await? {
        Ownership::Owner(lease) => lease,
        Ownership::Driven(info) => {
            return Err(format!("timer is already running in process {}", info.holder).into());
        }
    };

    let mut driver = open_driver(ctx, Box::new(print_json_line)).await?;
    driver.step();
    driver.sequencer_mut().start();
    save_sequencer(&ctx.db, driver.sequencer())?;

    let mailbox = ctx.mailbox();
    let mut last_beat = Instant::now();
    let mut lost = false;
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl-C");
        }
    };
    let completions = driver
        .run_with(shutdown, |seq, completion| {
            let mut changed = completion.is_some();
            let queued = match mailbox.pending() {
                Ok(commands) => commands,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot read queued timer commands");
                    Vec::new()
                }
            };
            let queued_count = queued.len();
            changed |= apply_all(seq, queued);
            if last_beat.elapsed() >= HEARTBEAT_EVERY {
                last_beat = Instant::now();
                match lease.heartbeat(now_ms()) {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::error!("timer lease lost to another process, stopping");
                        lost = true;
                        return ControlFlow::Break(());
                    }
                    Err(e) => tracing::warn!(error = %e, "timer lease heartbeat failed"),
                }
            }
            if changed {
                if let Err(e) = save_sequencer(&ctx.db, seq) {
                    tracing::error!(error = %e, "failed to save timer");
                    return ControlFlow::Continue(());
                }
            }
            // only once their effect is saved; posters poll for this
            if let Err(e) = mailbox.acknowledge(queued_count) {
                tracing::warn!(error = %e, "cannot clear queued timer commands");
            }
            ControlFlow::Continue(())
        })
        .await;
    tracing::info!(completions, "timer stopped");
    if lost {
        return Ok(());
    }

    let seq = driver.sequencer_mut();
    apply_all(seq, mailbox.take_all()?);
    seq.pause();
    save_sequencer(&ctx.db, seq)?;
    drop(lease);
    Ok(())
}

pub async fn run(action: TimerAction, ctx: &AppContext) -> CliResult<()> {
    let command = match action {
        TimerAction::Run => return drive(ctx).await,
        TimerAction::Status => None,
        TimerAction::Start => Some(TimerCommand::Start),
        TimerAction::Pause => Some(TimerCommand::Pause),
        TimerAction::Resume => Some(TimerCommand::Resume),
        TimerAction::Reset => Some(TimerCommand::Reset),
        TimerAction::Select { period } => {
            if let Err(e) = ctx.preferences().save_period(period) {
                tracing::error!(error = %e, "failed to remember selected period");
            }
            Some(TimerCommand::Select { period })
        }
    };

    let outcome = execute(ctx, command).await?;
    println!("{}", serde_json::to_string_pretty(&outcome.to_json())?);
    Ok(())
}
