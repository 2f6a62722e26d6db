//! Device/app metadata sent with every update check.
//!
//! The installation `guid` and the last seen app version live in the
//! key-value store so they survive restarts; `old_version` is the version the
//! previous run reported, which lets the server tell upgrades apart.

use crate::cache::{format_timestamp, parse_timestamp, KeyValueStore, LAST_UPDATED_KEY};
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

pub const GUID_KEY: &str = "localize_guid";
pub const VERSION_KEY: &str = "localize_app_version";

/// Identifies the running application to the update service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub version: String,
    pub platform: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: std::env::consts::OS.to_string(),
        }
    }
}

/// Everything the update-check form needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSettings {
    pub guid: String,
    pub version: String,
    pub old_version: String,
    pub platform: String,
    /// `None` until a translation has been fetched on this device
    pub last_updated: Option<DateTime<Utc>>,
}

impl UpdateSettings {
    /// Build settings for this run from the store, creating the guid on
    /// first use and recording the current version.
    ///
    /// Failing to record the guid or version is logged and does not stop
    /// the update check; this run then uses the in-memory values.
    pub fn load(store: &mut dyn KeyValueStore, app: &AppInfo) -> Self {
        let guid = match store.get(GUID_KEY).filter(|g| !g.is_empty()) {
            Some(guid) => guid,
            None => {
                let guid = Uuid::new_v4().to_string();
                info!("Generated installation guid {}", guid);
                if let Err(e) = store.set(GUID_KEY, &guid) {
                    warn!("Failed to persist installation guid: {}", e);
                }
                guid
            }
        };

        let old_version = store
            .get(VERSION_KEY)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| app.version.clone());
        if old_version != app.version {
            info!("App version changed from {} to {}", old_version, app.version);
        }
        if let Err(e) = store.set(VERSION_KEY, &app.version) {
            warn!("Failed to persist app version {}: {}", app.version, e);
        }

        let last_updated = store
            .get(LAST_UPDATED_KEY)
            .and_then(|text| parse_timestamp(&text));

        Self {
            guid,
            version: app.version.clone(),
            old_version,
            platform: app.platform.clone(),
            last_updated,
        }
    }

    /// `last_updated` as sent on the wire; the Unix epoch when never updated.
    pub fn last_updated_formatted(&self) -> String {
        format_timestamp(&self.last_updated.unwrap_or(DateTime::<Utc>::UNIX_EPOCH))
    }

    /// Form fields in request order.
    pub fn form_fields(&self, dev: bool) -> Vec<(&'static str, String)> {
        vec![
            ("guid", self.guid.clone()),
            ("version", self.version.clone()),
            ("old_version", self.old_version.clone()),
            ("platform", self.platform.clone()),
            ("last_updated", self.last_updated_formatted()),
            ("dev", dev.to_string()),
        ]
    }
}
