//! Instance directory store
//!
//! Layout: `<data_dir>/instances/<uuid>/instance.json` plus one content
//! subfolder per package kind.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{PackwrightError, PackwrightResult};
use crate::platform::ContentType;

const METADATA_FILE: &str = "instance.json";

/// Mod loader an instance runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModLoader {
    #[default]
    Vanilla,
    Fabric,
    Forge,
    Quilt,
    NeoForge,
}

impl ModLoader {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModLoader::Vanilla => "vanilla",
            ModLoader::Fabric => "fabric",
            ModLoader::Forge => "forge",
            ModLoader::Quilt => "quilt",
            ModLoader::NeoForge => "neoforge",
        }
    }

    /// Loader filter for platform queries; vanilla has none
    pub fn as_filter(&self) -> Option<&'static str> {
        match self {
            ModLoader::Vanilla => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for ModLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModLoader {
    type Err = PackwrightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vanilla" | "" => Ok(ModLoader::Vanilla),
            "fabric" | "fabric-loader" => Ok(ModLoader::Fabric),
            "forge" => Ok(ModLoader::Forge),
            "quilt" | "quilt-loader" => Ok(ModLoader::Quilt),
            "neoforge" => Ok(ModLoader::NeoForge),
            other => Err(PackwrightError::other(format!("Unknown mod loader: {}", other))),
        }
    }
}

/// Instance metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub minecraft_version: String,
    #[serde(default)]
    pub loader: ModLoader,
    #[serde(default)]
    pub loader_version: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Parameters for a new instance
#[derive(Debug, Clone, Default)]
pub struct NewInstance {
    pub name: String,
    pub minecraft_version: String,
    pub loader: ModLoader,
    pub loader_version: Option<String>,
    pub icon_url: Option<String>,
}

/// Reads and writes instances under one root directory
#[derive(Debug, Clone)]
pub struct InstanceStore {
    root: PathBuf,
}

impl InstanceStore {
    /// Store rooted at `<data_dir>/instances`
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join("instances"),
        }
    }

    /// Create an instance with empty content folders
    pub fn create(&self, new: NewInstance) -> PackwrightResult<Instance> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(PackwrightError::other("Instance name must not be empty"));
        }

        let instance = Instance {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            minecraft_version: new.minecraft_version,
            loader: new.loader,
            loader_version: new.loader_version,
            icon_url: new.icon_url,
            created_at: Utc::now(),
        };

        let dir = self.root.join(&instance.id);
        for kind in [ContentType::Mod, ContentType::ResourcePack, ContentType::ShaderPack] {
            std::fs::create_dir_all(dir.join(kind.subfolder()))?;
        }
        self.save(&instance)?;

        tracing::info!("Created instance {} ({})", instance.name, instance.id);
        Ok(instance)
    }

    /// Persist instance metadata
    pub fn save(&self, instance: &Instance) -> PackwrightResult<()> {
        let dir = self.dir(&instance.id)?;
        std::fs::create_dir_all(&dir)?;
        let content = serde_json::to_string_pretty(instance)?;
        std::fs::write(dir.join(METADATA_FILE), content)?;
        Ok(())
    }

    /// Load one instance
    pub fn get(&self, id: &str) -> PackwrightResult<Instance> {
        let path = self.dir(id)?.join(METADATA_FILE);
        if !path.exists() {
            return Err(PackwrightError::InstanceNotFound(id.to_string()));
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// All readable instances, oldest first
    pub fn list(&self) -> PackwrightResult<Vec<Instance>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut instances = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            match self.get(&id) {
                Ok(instance) => instances.push(instance),
                Err(e) => tracing::warn!("Skipping unreadable instance {}: {}", id, e),
            }
        }
        instances.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(instances)
    }

    /// Root directory of an instance. Ids that are not UUIDs are rejected
    /// so they can never address paths outside the store.
    pub fn dir(&self, id: &str) -> PackwrightResult<PathBuf> {
        let uuid = Uuid::parse_str(id).map_err(|_| PackwrightError::InstanceNotFound(id.to_string()))?;
        Ok(self.root.join(uuid.to_string()))
    }

    /// Content folder for one package kind, created on demand
    pub fn content_dir(&self, id: &str, kind: ContentType) -> PackwrightResult<PathBuf> {
        let dir = self.dir(id)?.join(kind.subfolder());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}
