//! Team usage sync engine.
//!
//! Sessions recorded on this device are pushed to a shared record store,
//! queued locally while the store is unreachable, cached for offline reads
//! and merged per task when read back.

pub mod config;
pub mod db;
pub mod error;
pub mod merge;
pub mod models;
pub mod pending;
pub mod reachability;
pub mod remote;
pub mod settings;
pub mod sync;
pub mod utils;

use std::path::PathBuf;

pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use models::{AppUsage, SessionRecord, TaskKind, TaskUsageSummary};
pub use pending::FlushReport;
pub use remote::{MemoryRecordStore, RecordStore};
pub use sync::{SyncOrchestrator, SyncServices, UploadOutcome};
pub use utils::init_logging;

const APP_DIR_NAME: &str = "teamsync";

/// Per-user application data directory, e.g. `~/Library/Application Support/teamsync`.
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| SyncError::Storage(anyhow::anyhow!("no data directory for this platform")))
}
