//! Configuration loading for the catalog cache
//!
//! Settings are loaded from (in order of priority):
//! 1. `catalog.json` in the Ting config directory
//! 2. Runtime environment variables layered over the defaults
//! 3. Built-in defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config filename in the Ting config directory
const CONFIG_FILE: &str = "catalog.json";

/// Endpoint used to fetch one kind of list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Path below the base URL's path (a leading `/` is ignored); `{key}` is replaced by the list key
    pub path: String,
    /// Whether the endpoint honors `after`/`before` cursors
    #[serde(default)]
    pub cursor_aware: bool,
}

impl Route {
    pub fn new(path: impl Into<String>, cursor_aware: bool) -> Self {
        Self {
            path: path.into(),
            cursor_aware,
        }
    }
}

/// Paging behavior of the page store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    /// Rows read from the cache per lazy page, also the remote page size
    pub page_size: usize,
    /// How close to the end of the loaded items the UI may scroll before appending
    pub prefetch_distance: usize,
    /// Minimum seconds between pull-to-refresh loads (0 disables the cooldown)
    pub refresh_cooldown_secs: u64,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            prefetch_distance: 5,
            refresh_cooldown_secs: 0,
        }
    }
}

/// Catalog API and cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog API base URL
    pub base_url: String,
    /// Fixed scope key mixed into request signatures
    pub scope_key: String,
    /// Endpoint per list kind (`ListIdentity::kind`)
    pub routes: HashMap<String, Route>,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// `host:port` probed by the TCP connectivity check
    pub probe_addr: String,
    pub paging: PagingConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let routes = HashMap::from([
            (
                "recommendations".to_string(),
                Route::new("v2/albums/guess_like", false),
            ),
            ("album".to_string(), Route::new("albums/{key}/tracks", true)),
            ("playlist".to_string(), Route::new("playlists/{key}/tracks", true)),
        ]);

        Self {
            base_url: "https://api.ximalaya.com".to_string(),
            scope_key: String::new(),
            routes,
            connect_timeout_secs: 15,
            read_timeout_secs: 5,
            probe_addr: "api.ximalaya.com:443".to_string(),
            paging: PagingConfig::default(),
        }
    }
}

impl CatalogConfig {
    /// Load settings from the config file, falling back to environment and defaults
    pub fn load() -> Result<Self> {
        if config::config_exists(CONFIG_FILE) {
            return config::load_json(CONFIG_FILE);
        }
        Ok(Self::from_env())
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse settings from a JSON string; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse catalog config JSON")
    }

    /// Defaults overridden by `TING_BASE_URL` and `TING_SCOPE_KEY` when set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("TING_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(scope_key) = std::env::var("TING_SCOPE_KEY") {
            config.scope_key = scope_key;
        }
        config
    }

    /// Write these settings to the config directory
    pub fn save(&self) -> Result<()> {
        config::save_json(CONFIG_FILE, self)
    }

    /// Default config file path (~/.config/ting/catalog.json)
    pub fn default_path() -> Option<PathBuf> {
        config::config_path(CONFIG_FILE)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}
