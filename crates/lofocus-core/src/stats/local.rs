use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{AggregateStats, StatsRecord, StatsScope};
use crate::error::StorageError;
use crate::remote::Document;
use crate::storage::LocalStore;
use crate::timer::PeriodKind;

/// Local key of the all-time bucket.
pub const STATS_TOTAL_KEY: &str = "stats_total_v1";
/// Prefix of the per-day bucket keys, followed by `YYYY-MM-DD`.
pub const STATS_DAILY_PREFIX: &str = "stats_daily_";

/// Statistics buckets in the local tier.
#[derive(Clone)]
pub struct LocalStatsRepository {
    store: Arc<dyn LocalStore>,
}

impl std::fmt::Debug for LocalStatsRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStatsRepository").finish_non_exhaustive()
    }
}

impl LocalStatsRepository {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Stored record of a bucket, decoded leniently.
    pub fn load(&self, scope: &StatsScope) -> Result<Option<StatsRecord>, StorageError> {
        let key = scope.local_key();
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };
        let doc: Document = serde_json::from_str(&raw).map_err(|source| StorageError::Serialization { key, source })?;
        Ok(Some(StatsRecord::from_document(&doc)))
    }

    /// Add `delta` to one bucket as a single atomic update of the store.
    /// An unreadable stored value is replaced rather than blocking the
    /// write.
    pub fn add(
        &self,
        scope: &StatsScope,
        delta: &AggregateStats,
        period: PeriodKind,
        at: DateTime<Utc>,
    ) -> Result<StatsRecord, StorageError> {
        let key = scope.local_key();
        let mut written = StatsRecord::default();
        self.store.update(&key, &mut |current: Option<String>| -> Result<Option<String>, StorageError> {
            let mut record = match current.as_deref().map(serde_json::from_str::<Document>) {
                None => StatsRecord::default(),
                Some(Ok(doc)) => StatsRecord::from_document(&doc),
                Some(Err(e)) => {
                    tracing::warn!(scope = %scope, error = %e, "discarding unreadable local statistics");
                    StatsRecord::default()
                }
            };

            record.add(delta);
            record.updated_at = Some(at);
            match scope {
                StatsScope::AllTime => record.last_period = Some(period),
                StatsScope::Day(day) => record.date = Some(day.to_string()),
            }

            let raw = serde_json::to_string(&record).map_err(|source| StorageError::Serialization {
                key: key.clone(),
                source,
            })?;
            written = record;
            Ok(Some(raw))
        })?;
        Ok(written)
    }
}
