use serde::{Deserialize, Serialize};

use crate::{
    config::SyncConfig,
    settings::{SharingMode, SyncSettings, WriteAccess},
};

const DEFAULT_OWNER: &str = "__defaultOwner__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseScope {
    Private,
    Shared,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneId {
    pub name: String,
    pub owner: String,
}

/// Database and zone an operation is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub database: DatabaseScope,
    pub zone: ZoneId,
    pub writable: bool,
}

impl Route {
    pub fn private(zone_name: &str) -> Self {
        Self {
            database: DatabaseScope::Private,
            zone: ZoneId {
                name: zone_name.to_string(),
                owner: DEFAULT_OWNER.to_string(),
            },
            writable: true,
        }
    }
}

/// Derives the route from a settings snapshot. Never cache the result across
/// settings changes.
///
/// Shared mode with a known zone addresses the shared database; everything else
/// falls back to the private zone.
pub fn resolve_route(settings: &SyncSettings, config: &SyncConfig) -> Route {
    let writable = settings.write_access == WriteAccess::ReadWrite;

    match (&settings.sharing_mode, &settings.shared_zone) {
        (SharingMode::Shared, Some(zone)) if !zone.name.is_empty() => Route {
            database: DatabaseScope::Shared,
            zone: ZoneId {
                name: zone.name.clone(),
                owner: zone.owner.clone(),
            },
            writable,
        },
        _ => Route {
            writable,
            ..Route::private(&config.private_zone_name)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SharedZone;

    #[test]
    fn solo_uses_private_zone() {
        let config = SyncConfig::default();
        let route = resolve_route(&SyncSettings::default(), &config);
        assert_eq!(route.database, DatabaseScope::Private);
        assert_eq!(route.zone.name, config.private_zone_name);
        assert!(route.writable);
    }

    #[test]
    fn shared_mode_uses_shared_zone_and_access() {
        let settings = SyncSettings {
            current_group_id: Some("g1".into()),
            sharing_mode: SharingMode::Shared,
            shared_zone: Some(SharedZone {
                name: "zone-g1".into(),
                owner: "alice".into(),
            }),
            write_access: WriteAccess::ReadOnly,
            ..SyncSettings::default()
        };
        let route = resolve_route(&settings, &SyncConfig::default());
        assert_eq!(route.database, DatabaseScope::Shared);
        assert_eq!(route.zone.owner, "alice");
        assert!(!route.writable);

        assert_eq!(route, resolve_route(&settings, &SyncConfig::default()));
    }

    #[test]
    fn shared_mode_without_zone_falls_back() {
        let settings = SyncSettings {
            sharing_mode: SharingMode::Shared,
            ..SyncSettings::default()
        };
        let route = resolve_route(&settings, &SyncConfig::default());
        assert_eq!(route.database, DatabaseScope::Private);
    }
}
