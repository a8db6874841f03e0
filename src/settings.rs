use std::{
    collections::BTreeMap,
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SharingMode {
    #[default]
    Solo,
    Shared,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum WriteAccess {
    #[default]
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SharedZone {
    pub name: String,
    pub owner: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    pub current_group_id: Option<String>,
    pub user_name: Option<String>,
    pub sharing_mode: SharingMode,
    pub shared_zone: Option<SharedZone>,
    pub write_access: WriteAccess,
    /// Member ids minted locally when the remote store refused registration.
    pub local_member_ids: BTreeMap<String, String>,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<SyncSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Settings at {} are unreadable ({err}); using defaults", path.display());
                SyncSettings::default()
            })
        } else {
            SyncSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn snapshot(&self) -> SyncSettings {
        self.read().clone()
    }

    pub fn current_group_id(&self) -> Option<String> {
        self.read().current_group_id.clone()
    }

    pub fn user_name(&self) -> Option<String> {
        self.read().user_name.clone()
    }

    /// Applies `change` and persists the whole settings file.
    pub fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut SyncSettings),
    {
        let mut guard = self.write();
        change(&mut guard);
        self.persist(&guard)
    }

    pub fn join_group(&self, group_id: &str, zone: Option<SharedZone>) -> Result<()> {
        let group_id = group_id.to_string();
        self.update(move |settings| {
            settings.current_group_id = Some(group_id);
            settings.sharing_mode = if zone.is_some() {
                SharingMode::Shared
            } else {
                SharingMode::Solo
            };
            settings.shared_zone = zone;
        })
    }

    pub fn leave_group(&self) -> Result<()> {
        self.update(|settings| {
            if let Some(group_id) = settings.current_group_id.take() {
                settings.local_member_ids.remove(&group_id);
            }
            settings.sharing_mode = SharingMode::Solo;
            settings.shared_zone = None;
            settings.write_access = WriteAccess::ReadWrite;
        })
    }

    pub fn reset(&self) -> Result<()> {
        self.update(|settings| *settings = SyncSettings::default())
    }

    fn persist(&self, data: &SyncSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, SyncSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SyncSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
