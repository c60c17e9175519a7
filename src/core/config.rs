//! Configuration handling for Packwright
//!
//! Supports packwright.toml, .packwrightrc, and environment variable overrides.

use std::env;
use std::path::{Path, PathBuf};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};

use crate::core::{PackwrightError, PackwrightResult};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Content platform endpoints and limits
    pub platforms: PlatformsConfig,

    /// Network configuration
    pub network: NetworkConfig,

    /// Filesystem locations
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    /// Modrinth API base URL
    pub modrinth_url: String,

    /// CurseForge API base URL
    pub curseforge_url: String,

    /// CurseForge API key (required by CurseForge for every request)
    pub curseforge_api_key: Option<String>,

    /// Largest page Modrinth accepts
    pub modrinth_page_size_max: u32,

    /// Largest page CurseForge accepts
    pub curseforge_page_size_max: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// API request timeout in seconds
    pub timeout: u64,

    /// Per-file download timeout in seconds
    pub download_timeout: u64,

    /// Maximum concurrent downloads
    pub concurrency: usize,

    /// Retry attempts for connection-level failures
    pub retries: u32,

    /// User agent sent to the platforms
    pub user_agent: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root for instances and scratch files
    pub data_dir: Option<PathBuf>,

    /// Where manually downloaded (blocked) files are looked up
    pub blocked_downloads_dir: Option<PathBuf>,
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            modrinth_url: "https://api.modrinth.com/v2".to_string(),
            curseforge_url: "https://api.curseforge.com/v1".to_string(),
            curseforge_api_key: None,
            modrinth_page_size_max: 100,
            curseforge_page_size_max: 50,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            download_timeout: 300,
            concurrency: 8,
            retries: 2,
            user_agent: format!("packwright/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    /// Load configuration from a directory and merge with defaults
    pub fn load(dir: &Path) -> PackwrightResult<Self> {
        let mut config = Config::default();

        let toml_path = dir.join("packwright.toml");
        if toml_path.exists() {
            let content = std::fs::read_to_string(&toml_path)?;
            let file_config: Config = toml::from_str(&content)?;
            config = config.merge(file_config);
        }

        // .packwrightrc is JSON
        let rc_path = dir.join(".packwrightrc");
        if rc_path.exists() {
            let content = std::fs::read_to_string(&rc_path)?;
            let file_config: Config = serde_json::from_str(&content)?;
            config = config.merge(file_config);
        }

        config = config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(self, other: Config) -> Self {
        let defaults = PlatformsConfig::default();
        Self {
            platforms: PlatformsConfig {
                modrinth_url: if other.platforms.modrinth_url != defaults.modrinth_url {
                    other.platforms.modrinth_url
                } else {
                    self.platforms.modrinth_url
                },
                curseforge_url: if other.platforms.curseforge_url != defaults.curseforge_url {
                    other.platforms.curseforge_url
                } else {
                    self.platforms.curseforge_url
                },
                curseforge_api_key: other
                    .platforms
                    .curseforge_api_key
                    .or(self.platforms.curseforge_api_key),
                modrinth_page_size_max: other.platforms.modrinth_page_size_max,
                curseforge_page_size_max: other.platforms.curseforge_page_size_max,
            },
            network: other.network,
            paths: PathsConfig {
                data_dir: other.paths.data_dir.or(self.paths.data_dir),
                blocked_downloads_dir: other
                    .paths
                    .blocked_downloads_dir
                    .or(self.paths.blocked_downloads_dir),
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(dir) = env::var("PACKWRIGHT_DATA_DIR") {
            self.paths.data_dir = Some(PathBuf::from(dir));
        }

        if let Ok(key) = env::var("PACKWRIGHT_CURSEFORGE_API_KEY") {
            if !key.trim().is_empty() {
                self.platforms.curseforge_api_key = Some(key);
            }
        }

        if let Ok(url) = env::var("PACKWRIGHT_MODRINTH_URL") {
            self.platforms.modrinth_url = url;
        }

        if let Ok(url) = env::var("PACKWRIGHT_CURSEFORGE_URL") {
            self.platforms.curseforge_url = url;
        }

        if let Ok(concurrency) = env::var("PACKWRIGHT_CONCURRENCY") {
            if let Ok(n) = concurrency.parse() {
                self.network.concurrency = n;
            }
        }

        if let Ok(timeout) = env::var("PACKWRIGHT_TIMEOUT") {
            if let Ok(n) = timeout.parse() {
                self.network.timeout = n;
            }
        }

        self
    }

    fn validate(&self) -> PackwrightResult<()> {
        if self.network.concurrency == 0 {
            return Err(PackwrightError::config("network.concurrency must be at least 1"));
        }
        if self.platforms.modrinth_page_size_max == 0 || self.platforms.curseforge_page_size_max == 0 {
            return Err(PackwrightError::config("page size limits must be at least 1"));
        }
        Ok(())
    }

    /// Get the data directory, creating it if necessary
    pub fn data_dir(&self) -> PackwrightResult<PathBuf> {
        if let Some(ref dir) = self.paths.data_dir {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        let project_dirs = ProjectDirs::from("com", "packwright", "packwright")
            .ok_or_else(|| PackwrightError::config("Could not determine data directory"))?;

        let data_dir = project_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    /// Folder scanned for manually downloaded files
    pub fn blocked_downloads_dir(&self) -> Option<PathBuf> {
        if let Some(ref dir) = self.paths.blocked_downloads_dir {
            return Some(dir.clone());
        }
        UserDirs::new().and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
    }
}
