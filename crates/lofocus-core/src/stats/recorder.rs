//! SessionRecorder: turns completion events into aggregate updates.
//!
//! Local writes happen inline and never fail the caller. Remote writes are
//! spawned on the ambient tokio runtime; the returned handle may be awaited
//! or dropped.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::{AggregateStats, DayKey, LocalStatsRepository, StatsScope};
use crate::events::SessionCompletionEvent;
use crate::identity::UserId;
use crate::remote::RemoteStore;
use crate::storage::LocalStore;

pub struct SessionRecorder {
    local: LocalStatsRepository,
    remote: Option<Arc<dyn RemoteStore>>,
    identity: Option<UserId>,
    fresh: HashMap<StatsScope, AggregateStats>,
}

impl std::fmt::Debug for SessionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecorder")
            .field("remote", &self.remote.is_some())
            .field("identity", &self.identity)
            .field("fresh", &self.fresh)
            .finish()
    }
}

impl SessionRecorder {
    pub fn new(local: Arc<dyn LocalStore>, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        Self {
            local: LocalStatsRepository::new(local),
            remote,
            identity: None,
            fresh: HashMap::new(),
        }
    }

    pub fn with_identity(mut self, identity: Option<UserId>) -> Self {
        self.identity = identity;
        self
    }

    /// Attach or detach the identity remote writes are scoped to.
    pub fn set_identity(&mut self, identity: Option<UserId>) {
        if self.identity != identity {
            tracing::debug!(uid = ?identity.as_ref().map(UserId::as_str), "recorder identity changed");
        }
        self.identity = identity;
    }

    pub fn identity(&self) -> Option<&UserId> {
        self.identity.as_ref()
    }

    /// In-process totals of a bucket, once this recorder has written to it.
    pub fn fresh_totals(&self, scope: &StatsScope) -> Option<AggregateStats> {
        self.fresh.get(scope).copied()
    }

    /// Record one completed period in every tier.
    ///
    /// Returns the handle of the spawned remote write, if one was issued.
    pub fn record(&mut self, event: &SessionCompletionEvent) -> Option<JoinHandle<()>> {
        let delta = AggregateStats::from_completion(event);
        let day = DayKey::from_utc(event.completed_at);

        for scope in [StatsScope::AllTime, StatsScope::Day(day)] {
            let seed = self.seed(&scope);
            if let Err(e) = self.local.add(&scope, &delta, event.period, event.completed_at) {
                tracing::error!(scope = %scope, error = %e, "failed to write local statistics");
            }
            self.fresh.entry(scope).or_insert(seed).add(&delta);
        }

        tracing::debug!(
            period = %event.period,
            minutes = event.minutes,
            day = %day,
            "session recorded"
        );

        self.spawn_remote(event, &delta, day)
    }

    /// Starting point of the fresh totals: the local bucket before this write.
    fn seed(&self, scope: &StatsScope) -> AggregateStats {
        if let Some(fresh) = self.fresh.get(scope) {
            return *fresh;
        }
        match self.local.load(scope) {
            Ok(record) => record.map(|r| r.to_aggregate()).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(scope = %scope, error = %e, "could not seed fresh totals");
                AggregateStats::default()
            }
        }
    }

    fn spawn_remote(
        &self,
        event: &SessionCompletionEvent,
        delta: &AggregateStats,
        day: DayKey,
    ) -> Option<JoinHandle<()>> {
        let (Some(remote), Some(uid)) = (self.remote.clone(), self.identity.clone()) else {
            return None;
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(uid = %uid, "no async runtime, skipping remote statistics write");
                return None;
            }
        };

        let updated_at = event.completed_at.to_rfc3339();
        let aggregate_path = StatsScope::AllTime.document_path(&uid);
        let aggregate_write = delta
            .to_increment()
            .set("lastPeriod", event.period.as_str())
            .set("updatedAt", updated_at.clone());
        let daily_path = StatsScope::Day(day).document_path(&uid);
        let daily_write = delta
            .to_increment()
            .set("date", day.to_string())
            .set("updatedAt", updated_at);

        Some(runtime.spawn(async move {
            let (aggregate, daily) = tokio::join!(
                remote.merge_write(&aggregate_path, &aggregate_write),
                remote.merge_write(&daily_path, &daily_write),
            );
            for (path, result) in [(&aggregate_path, aggregate), (&daily_path, daily)] {
                if let Err(e) = result {
                    tracing::error!(uid = %uid, path = %path, error = %e, "remote statistics write failed");
                }
            }
        }))
    }
}
