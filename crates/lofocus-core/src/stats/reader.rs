use std::sync::Arc;

use super::{AggregateStats, LocalStatsRepository, StatsRecord, StatsScope};
use crate::identity::UserId;
use crate::remote::RemoteStore;
use crate::storage::LocalStore;

/// Resolve each field from the first layer that has a finite value.
///
/// Layers are given in precedence order; a field nobody has reads as zero.
pub fn resolve(layers: &[Option<&StatsRecord>]) -> AggregateStats {
    let pick = |field: fn(&StatsRecord) -> Option<f64>| {
        layers
            .iter()
            .flatten()
            .find_map(|record| field(record))
            .unwrap_or(0.0)
    };
    AggregateStats {
        total_minutes: pick(StatsRecord::total),
        focus_minutes: pick(StatsRecord::focus),
        break_minutes: pick(StatsRecord::breaks),
    }
}

/// Read side of the statistics tiers. Never writes.
#[derive(Clone)]
pub struct StatisticsReader {
    local: LocalStatsRepository,
    remote: Option<Arc<dyn RemoteStore>>,
}

impl std::fmt::Debug for StatisticsReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticsReader")
            .field("remote", &self.remote.is_some())
            .finish()
    }
}

impl StatisticsReader {
    pub fn new(local: Arc<dyn LocalStore>, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        Self {
            local: LocalStatsRepository::new(local),
            remote,
        }
    }

    /// Display-ready stats: fresh totals, then remote, then local, then zero.
    pub async fn read(
        &self,
        scope: &StatsScope,
        identity: Option<&UserId>,
        fresh: Option<&AggregateStats>,
    ) -> AggregateStats {
        let fresh = fresh.map(|stats| StatsRecord::from(*stats));
        let remote = match identity {
            Some(uid) => self.read_remote(scope, uid).await,
            None => None,
        };
        let local = self.read_local(scope);
        resolve(&[fresh.as_ref(), remote.as_ref(), local.as_ref()])
    }

    async fn read_remote(&self, scope: &StatsScope, uid: &UserId) -> Option<StatsRecord> {
        let remote = self.remote.as_ref()?;
        let path = scope.document_path(uid);
        match remote.read_document(&path).await {
            Ok(doc) => doc.map(|d| StatsRecord::from_document(&d)),
            Err(e) => {
                tracing::error!(uid = %uid, path = %path, error = %e, "remote statistics read failed");
                None
            }
        }
    }

    fn read_local(&self, scope: &StatsScope) -> Option<StatsRecord> {
        match self.local.load(scope) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(scope = %scope, error = %e, "local statistics read failed");
                None
            }
        }
    }
}
