//! Ownership of the persisted timer across processes sharing one store.
//!
//! Only the holder of a live lease may restore the stored sequencer, sample
//! it and record what it completes. Everyone else reads the snapshot or
//! posts a [`TimerCommand`] to the [`CommandMailbox`] for the holder to run.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::LocalStore;
use crate::error::StorageError;
use crate::timer::TimerCommand;

pub const TIMER_LEASE_KEY: &str = "timer_lease";
pub const TIMER_COMMANDS_KEY: &str = "timer_commands";

/// A lease whose heartbeat is older than this is dead.
pub const LEASE_TTL_MS: i64 = 5_000;

/// The stored lease row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseInfo {
    /// Process id of the holder.
    pub holder: u32,
    /// Held by a long-running driver rather than a one-shot command.
    pub driving: bool,
    pub heartbeat_ms: i64,
}

impl LeaseInfo {
    pub fn is_live(&self, now_ms: i64) -> bool {
        now_ms - self.heartbeat_ms < LEASE_TTL_MS
    }
}

fn decode_lease(raw: Option<&str>) -> Option<LeaseInfo> {
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable timer lease");
            None
        }
    }
}

fn encode_lease(info: &LeaseInfo) -> Result<String, StorageError> {
    serde_json::to_string(info).map_err(|source| StorageError::Serialization {
        key: TIMER_LEASE_KEY.to_string(),
        source,
    })
}

#[derive(Debug)]
pub enum Acquire {
    Acquired(TimerLease),
    /// Someone else holds a live lease.
    Held(LeaseInfo),
}

/// A held lease. Dropping it releases the row if it is still ours.
pub struct TimerLease {
    store: Arc<dyn LocalStore>,
    info: LeaseInfo,
}

impl std::fmt::Debug for TimerLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerLease").field("info", &self.info).finish_non_exhaustive()
    }
}

impl TimerLease {
    /// Take the lease unless another holder's lease is still live. A dead
    /// or unreadable lease is taken over.
    pub fn try_acquire(
        store: Arc<dyn LocalStore>,
        holder: u32,
        driving: bool,
        now_ms: i64,
    ) -> Result<Acquire, StorageError> {
        let ours = LeaseInfo {
            holder,
            driving,
            heartbeat_ms: now_ms,
        };
        let mut held = None;
        store.update(TIMER_LEASE_KEY, &mut |current: Option<String>| -> Result<Option<String>, StorageError> {
            match decode_lease(current.as_deref()) {
                Some(other) if other.holder != holder && other.is_live(now_ms) => {
                    held = Some(other);
                    Ok(current)
                }
                _ => encode_lease(&ours).map(Some),
            }
        })?;
        Ok(match held {
            Some(other) => Acquire::Held(other),
            None => {
                tracing::debug!(holder, driving, "timer lease acquired");
                Acquire::Acquired(TimerLease { store, info: ours })
            }
        })
    }

    /// The live lease in `store`, if any.
    pub fn current(store: &dyn LocalStore, now_ms: i64) -> Result<Option<LeaseInfo>, StorageError> {
        let info = decode_lease(store.get(TIMER_LEASE_KEY)?.as_deref());
        Ok(info.filter(|info| info.is_live(now_ms)))
    }

    pub fn info(&self) -> &LeaseInfo {
        &self.info
    }

    /// Refresh the heartbeat. `Ok(false)` when the lease was lost to
    /// another holder in the meantime.
    pub fn heartbeat(&mut self, now_ms: i64) -> Result<bool, StorageError> {
        let mine = self.info;
        let mut kept = false;
        self.store.update(TIMER_LEASE_KEY, &mut |current: Option<String>| -> Result<Option<String>, StorageError> {
            match decode_lease(current.as_deref()) {
                Some(other) if other.holder == mine.holder => {
                    kept = true;
                    encode_lease(&LeaseInfo {
                        heartbeat_ms: now_ms,
                        ..mine
                    })
                    .map(Some)
                }
                _ => Ok(current),
            }
        })?;
        if kept {
            self.info.heartbeat_ms = now_ms;
        }
        Ok(kept)
    }

    fn release(&self) -> Result<(), StorageError> {
        let holder = self.info.holder;
        self.store.update(TIMER_LEASE_KEY, &mut |current: Option<String>| -> Result<Option<String>, StorageError> {
            match decode_lease(current.as_deref()) {
                Some(other) if other.holder == holder => Ok(None),
                _ => Ok(current),
            }
        })?;
        Ok(())
    }
}

impl Drop for TimerLease {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "failed to release timer lease");
        }
    }
}

/// Queue of commands waiting for the lease holder.
#[derive(Clone)]
pub struct CommandMailbox {
    store: Arc<dyn LocalStore>,
}

impl std::fmt::Debug for CommandMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandMailbox").finish_non_exhaustive()
    }
}

fn decode_commands(raw: Option<&str>) -> Vec<TimerCommand> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "discarding unreadable timer commands");
        Vec::new()
    })
}

impl CommandMailbox {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Append a command for the lease holder.
    pub fn post(&self, command: &TimerCommand) -> Result<(), StorageError> {
        self.store.update(TIMER_COMMANDS_KEY, &mut |current: Option<String>| -> Result<Option<String>, StorageError> {
            let mut queued = decode_commands(current.as_deref());
            queued.push(command.clone());
            serde_json::to_string(&queued)
                .map(Some)
                .map_err(|source| StorageError::Serialization {
                    key: TIMER_COMMANDS_KEY.to_string(),
                    source,
                })
        })?;
        Ok(())
    }

    /// Remove and return every queued command, oldest first.
    pub fn take_all(&self) -> Result<Vec<TimerCommand>, StorageError> {
        // plain read first; the holder polls this on every tick
        if self.is_empty()? {
            return Ok(Vec::new());
        }
        let mut taken = Vec::new();
        self.store.update(TIMER_COMMANDS_KEY, &mut |current: Option<String>| -> Result<Option<String>, StorageError> {
            taken = decode_commands(current.as_deref());
            Ok(None)
        })?;
        Ok(taken)
    }

    /// Queued commands, left in place until [`CommandMailbox::acknowledge`].
    /// A poster that sees the mailbox empty can rely on the holder having
    /// saved their effect first.
    pub fn pending(&self) -> Result<Vec<TimerCommand>, StorageError> {
        Ok(decode_commands(self.store.get(TIMER_COMMANDS_KEY)?.as_deref()))
    }

    /// Drop the `count` oldest commands; newer posts stay queued.
    pub fn acknowledge(&self, count: usize) -> Result<(), StorageError> {
        if count == 0 {
            return Ok(());
        }
        self.store.update(TIMER_COMMANDS_KEY, &mut |current: Option<String>| -> Result<Option<String>, StorageError> {
            let queued = decode_commands(current.as_deref());
            let rest = queued.get(count..).unwrap_or_default();
            if rest.is_empty() {
                return Ok(None);
            }
            serde_json::to_string(rest)
                .map(Some)
                .map_err(|source| StorageError::Serialization {
                    key: TIMER_COMMANDS_KEY.to_string(),
                    source,
                })
        })?;
        Ok(())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.store.get(TIMER_COMMANDS_KEY)?.is_none())
    }
}
