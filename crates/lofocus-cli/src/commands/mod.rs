pub mod completions;
pub mod config;
pub mod stats;
pub mod timer;

use std::sync::Arc;
use std::time::Duration;

use lofocus_core::{
    CommandMailbox, Config, Database, HttpRemoteStore, LocalStore, PreferenceStore, RemoteStore, UserId,
};

/// Stores shared by the commands that touch the timer or statistics.
pub struct AppContext {
    pub config: Config,
    pub db: Arc<Database>,
    pub remote: Option<Arc<dyn RemoteStore>>,
    pub identity: Option<UserId>,
}

impl AppContext {
    /// Open the local database and, if configured, the remote store.
    ///
    /// A broken remote configuration only disables the remote tier.
    pub fn open(config: Config) -> lofocus_core::error::Result<Self> {
        let db = Arc::new(Database::open()?);
        let remote: Option<Arc<dyn RemoteStore>> = match HttpRemoteStore::from_config(&config.remote) {
            Ok(Some(store)) => Some(Arc::new(store)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "remote store disabled");
                None
            }
        };
        let identity = config.remote.identity();
        Ok(Self {
            config,
            db,
            remote,
            identity,
        })
    }

    pub fn preferences(&self) -> PreferenceStore {
        PreferenceStore::new(self.db.clone(), self.remote.clone())
    }

    pub fn store(&self) -> Arc<dyn LocalStore> {
        self.db.clone()
    }

    pub fn mailbox(&self) -> CommandMailbox {
        CommandMailbox::new(self.store())
    }

    /// How long to wait for remote writes before exiting: one request timeout.
    pub fn write_grace(&self) -> Duration {
        Duration::from_secs(self.config.remote.timeout_secs.max(1))
    }
}
