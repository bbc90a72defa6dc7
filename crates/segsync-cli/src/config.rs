use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use segsync::{AncillaryFiles, RemoteLayout};
use segsync_http::DownloaderConfig;
use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Local root holding `profiles2/` and `segments4/`.
    pub base_dir: Option<PathBuf>,
    /// Smallest acceptable segment when no external verifier is configured.
    pub min_segment_size: u64,
    pub server: ServerConfig,
    pub download: DownloaderConfig,
    pub tools: ToolsConfig,
}

/// Where segments, lookups and profiles are served from.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub lookup_url: String,
    pub profiles_url: String,
    pub segment_url: String,
    pub lookups: Vec<String>,
    pub profiles: Vec<String>,
}

/// External programs. An empty argv disables the tool.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Invoked as `argv... <base> <delta> <output>`.
    pub delta_apply: Vec<String>,
    /// Invoked as `argv... <file>`.
    pub verify: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let remote = RemoteLayout::default();
        Self {
            lookup_url: remote.lookup_url,
            profiles_url: remote.profiles_url,
            segment_url: remote.segment_url,
            lookups: vec!["lookups.dat".into()],
            profiles: default_profiles(),
        }
    }
}

impl ServerConfig {
    pub fn remote(&self) -> RemoteLayout {
        RemoteLayout {
            lookup_url: self.lookup_url.clone(),
            profiles_url: self.profiles_url.clone(),
            segment_url: self.segment_url.clone(),
        }
    }

    pub fn ancillary(&self) -> AncillaryFiles {
        AncillaryFiles {
            lookups: self.lookups.clone(),
            profiles: self.profiles.clone(),
        }
    }
}

impl AppConfig {
    /// The configured base directory, or `<data_dir>/segsync/brouter`.
    pub fn base_dir(&self) -> Result<PathBuf> {
        match &self.base_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_base_dir().context("could not determine data directory"),
        }
    }
}

fn default_profiles() -> Vec<String> {
    ["car-fast.brf", "fastbike.brf", "shortest.brf", "trekking.brf"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub fn default_base_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("segsync").join("brouter"))
}

/// Config file path: `~/.config/segsync/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("segsync").join("config.toml"))
}

/// Load config from `path`, falling back to defaults if missing or invalid.
pub fn load_config(path: Option<&Path>) -> AppConfig {
    if let Some(path) = path
        && let Ok(contents) = std::fs::read_to_string(path)
    {
        match toml::from_str::<AppConfig>(&contents) {
            Ok(config) => return config,
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config, using defaults"
            ),
        }
    }

    AppConfig::default()
}
