use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Storage key holding an optional JSON override of [`SyncConfig`].
pub const SETTINGS_STORAGE_KEY: &str = "settings";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum LookupPolicy {
    /// Only identifiers missing from the cache are looked up.
    #[default]
    MissesOnly,
    /// Every visible row is looked up on every pass; cached values are
    /// painted first and replaced when the batch lands.
    AllVisible,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedOperation {
    pub name: String,
    pub sha256_hash: String,
}

impl PersistedOperation {
    fn new(name: &str, sha256_hash: &str) -> Self {
        Self {
            name: name.to_string(),
            sha256_hash: sha256_hash.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiConfig {
    /// webRequest match pattern for the observed API host.
    pub host_pattern: String,
    pub query_endpoint: String,
    pub app_platform: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host_pattern: "https://api-partner.spotify.com/*".to_string(),
            query_endpoint: "https://api-partner.spotify.com/pathfinder/v2/query".to_string(),
            app_platform: "WebPlayer".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default, rename_all = "camelCase")]
pub struct OperationsConfig {
    pub lookup: PersistedOperation,
    pub add: PersistedOperation,
    pub remove: PersistedOperation,
    /// Host-page operations after which the whole cache is dropped.
    pub refresh_triggers: Vec<String>,
}

const LOOKUP_HASH: &str = "134337999233cc6fdd6b1e6dbf94841409f04a946c5c7b744b09ba0dfe5a85ed";
const MUTATION_HASH: &str = "a3c1ff58e6a36fec5fe1e3a193dc95d9071d96b9ba53c5ba9c1494fb1ee73915";

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            lookup: PersistedOperation::new("areEntitiesInLibrary", LOOKUP_HASH),
            add: PersistedOperation::new("addToLibrary", MUTATION_HASH),
            remove: PersistedOperation::new("removeFromLibrary", MUTATION_HASH),
            refresh_triggers: vec!["addToLibrary".to_string(), "removeFromLibrary".to_string()],
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default, rename_all = "camelCase")]
pub struct Selectors {
    pub playlist_section: String,
    pub album_section: String,
    pub artist_section: String,
    pub track_row: String,
    pub track_link: String,
    pub add_control: String,
    pub now_playing: String,
    pub now_playing_link: String,
    pub now_playing_add_control: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            playlist_section: "section[data-testid='playlist-page']".to_string(),
            album_section: "section[data-testid='album-page']".to_string(),
            artist_section: "section[data-testid='artist-page']".to_string(),
            track_row: format!("{}div[data-testid='tracklist-row']", "div > ".repeat(6)),
            track_link: "a[data-testid='internal-track-link']".to_string(),
            add_control:
                "button[aria-label='Add to playlist'], button[aria-label='Add to Liked Songs']"
                    .to_string(),
            now_playing: "div[data-testid='now-playing-widget']".to_string(),
            now_playing_link: "a[data-testid='context-item-link']".to_string(),
            now_playing_add_control: "button[data-testid='add-button']".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default, rename_all = "camelCase")]
pub struct IconConfig {
    /// Extension-relative paths, resolved through `runtime.getURL`.
    pub saved: String,
    pub unsaved: String,
    pub class_name: String,
}

impl Default for IconConfig {
    fn default() -> Self {
        Self {
            saved: "/assets/heart_filled.svg".to_string(),
            unsaved: "/assets/heart_unfilled.svg".to_string(),
            class_name: "heart-btn".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    pub api: ApiConfig,
    pub operations: OperationsConfig,
    pub selectors: Selectors,
    pub icons: IconConfig,
    pub debounce_ms: u32,
    pub lookup_policy: LookupPolicy,
    /// Query keys under which a link may carry a `spotify:track:` URI.
    pub track_query_keys: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            operations: OperationsConfig::default(),
            selectors: Selectors::default(),
            icons: IconConfig::default(),
            debounce_ms: 200,
            lookup_policy: LookupPolicy::default(),
            track_query_keys: vec!["uri".to_string(), "highlight".to_string()],
        }
    }
}

impl SyncConfig {
    /// Parses a settings override. Missing fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: SyncConfig = serde_json::from_str(raw)?;
        if config.debounce_ms == 0 {
            return Err(SyncError::Config("debounceMs must be positive".to_string()));
        }
        Ok(config)
    }

    /// Like [`SyncConfig::from_json`], but never fails.
    pub fn from_json_or_default(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) => Self::from_json(raw).unwrap_or_else(|err| {
                log::warn!("ignoring stored settings: {err}");
                Self::default()
            }),
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_keeps_defaults() {
        let config =
            SyncConfig::from_json(r#"{"debounceMs": 50, "lookupPolicy": "allVisible"}"#).unwrap();
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.lookup_policy, LookupPolicy::AllVisible);
        assert_eq!(config.operations.lookup.name, "areEntitiesInLibrary");
        assert!(config.selectors.track_row.ends_with("div[data-testid='tracklist-row']"));
    }

    #[test]
    fn nested_override_is_merged() {
        let config = SyncConfig::from_json(r#"{"icons": {"className": "liked"}}"#).unwrap();
        assert_eq!(config.icons.class_name, "liked");
        assert_eq!(config.icons.saved, "/assets/heart_filled.svg");
    }

    #[test]
    fn invalid_settings_fall_back_to_defaults() {
        assert!(matches!(
            SyncConfig::from_json(r#"{"debounceMs": 0}"#),
            Err(SyncError::Config(_))
        ));
        let config = SyncConfig::from_json_or_default(Some("not json"));
        assert_eq!(config.debounce_ms, 200);
        assert_eq!(SyncConfig::from_json_or_default(None).lookup_policy, LookupPolicy::MissesOnly);
    }

    #[test]
    fn default_row_selector_is_six_levels_deep() {
        let selectors = Selectors::default();
        assert_eq!(selectors.track_row.matches("div > ").count(), 6);
    }
}
