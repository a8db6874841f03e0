mod orchestrator;

use std::{path::Path, sync::Arc};

use anyhow::Context;

use crate::{
    config::SyncConfig,
    db::Database,
    error::Result,
    pending::PendingWriteLog,
    reachability::ReachabilityMonitor,
    remote::{RecordStore, RemoteGateway},
    settings::SettingsStore,
};

pub use orchestrator::{SyncOrchestrator, UploadOutcome};

pub const CACHE_FILE: &str = "cache.sqlite3";
pub const PENDING_FILE: &str = "pending_uploads.json";
pub const SETTINGS_FILE: &str = "settings.json";

/// Process-wide services, built once at startup and shared by reference.
pub struct SyncServices {
    pub cache: Database,
    pub pending: PendingWriteLog,
    pub gateway: RemoteGateway,
    pub settings: Arc<SettingsStore>,
    pub reachability: Arc<ReachabilityMonitor>,
}

impl SyncServices {
    pub async fn open(
        app_data_dir: &Path,
        store: Arc<dyn RecordStore>,
        config: SyncConfig,
    ) -> Result<Self> {
        std::fs::create_dir_all(app_data_dir).with_context(|| {
            format!("failed to create data directory {}", app_data_dir.display())
        })?;

        let cache = Database::new(app_data_dir.join(CACHE_FILE), config.cache_ceiling)?;
        let pending = PendingWriteLog::open(app_data_dir.join(PENDING_FILE)).await?;
        let settings = Arc::new(SettingsStore::new(app_data_dir.join(SETTINGS_FILE))?);
        let gateway = RemoteGateway::new(store, settings.clone(), config);

        Ok(Self {
            cache,
            pending,
            gateway,
            settings,
            reachability: Arc::new(ReachabilityMonitor::new()),
        })
    }
}
