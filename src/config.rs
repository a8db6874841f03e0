use std::time::Duration;

use log::warn;

/// Tunable limits for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum records per remote save/delete call
    pub max_batch_size: usize,

    /// Records requested per remote query page
    pub query_page_size: usize,

    /// Row ceiling for the local cache before recency-based pruning
    pub cache_ceiling: usize,

    /// Reachability probe target and cadence
    pub probe_addr: String,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,

    /// Zone used when the user is not operating inside a shared group
    pub private_zone_name: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 400,
            query_page_size: 200,
            cache_ceiling: 10_000,
            probe_addr: "1.1.1.1:443".into(),
            probe_interval: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(3),
            private_zone_name: "TeamSyncZone".into(),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `TEAMSYNC_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("TEAMSYNC_PROBE_ADDR") {
            if !addr.trim().is_empty() {
                config.probe_addr = addr;
            }
        }
        if let Some(ceiling) = read_usize("TEAMSYNC_CACHE_CEILING") {
            config.cache_ceiling = ceiling;
        }
        if let Some(batch) = read_usize("TEAMSYNC_BATCH_SIZE") {
            config.max_batch_size = batch;
        }

        config
    }
}

fn read_usize(key: &str) -> Option<usize> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            warn!("Ignoring invalid {key}={raw}");
            None
        }
    }
}
