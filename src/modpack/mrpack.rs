//! Modrinth `.mrpack` index

use std::collections::HashMap;
use std::path::Path;
use serde::Deserialize;

use crate::core::{PackwrightError, PackwrightResult};
use crate::instance::ModLoader;
use crate::modpack::ModpackImport;
use crate::platform::{ContentType, FileHashes, PackageFile, Platform};
use crate::queue::{InstallPlan, PlanItem};
use crate::utils::is_safe_path;

pub const INDEX_FILE: &str = "modrinth.index.json";

/// Loader keys of the `dependencies` map, in lookup order
const LOADER_KEYS: &[(&str, ModLoader)] = &[
    ("fabric-loader", ModLoader::Fabric),
    ("quilt-loader", ModLoader::Quilt),
    ("neoforge", ModLoader::NeoForge),
    ("forge", ModLoader::Forge),
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MrpackIndex {
    pub format_version: u32,
    pub game: String,
    pub version_id: String,
    pub name: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub files: Vec<MrpackFile>,
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MrpackFile {
    pub path: String,
    #[serde(default)]
    pub hashes: HashMap<String, String>,
    #[serde(default)]
    pub env: Option<MrpackEnv>,
    #[serde(default)]
    pub downloads: Vec<String>,
    #[serde(default)]
    pub file_size: u64,
}

#[derive(Debug, Deserialize)]
pub struct MrpackEnv {
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
}

impl MrpackIndex {
    /// Convert into an import: one plan item per client-side file
    pub fn into_import(self) -> PackwrightResult<ModpackImport> {
        if self.game != "minecraft" {
            return Err(PackwrightError::modpack(format!("unsupported game '{}'", self.game)));
        }
        if self.format_version != 1 {
            tracing::warn!("Unknown mrpack format version {}", self.format_version);
        }

        let minecraft_version = self
            .dependencies
            .get("minecraft")
            .cloned()
            .ok_or_else(|| PackwrightError::modpack("index does not name a minecraft version"))?;
        let (loader, loader_version) = LOADER_KEYS
            .iter()
            .find_map(|(key, loader)| self.dependencies.get(*key).map(|v| (*loader, Some(v.clone()))))
            .unwrap_or((ModLoader::Vanilla, None));

        let mut plan = InstallPlan::new();
        for file in self.files {
            if file.env.as_ref().and_then(|e| e.client.as_deref()) == Some("unsupported") {
                let warning = format!("Skipped server-only file {}", file.path);
                tracing::debug!("{}", warning);
                plan.warnings.push(warning);
                continue;
            }
            if !is_safe_path(Path::new(&file.path)) {
                return Err(PackwrightError::PathTraversal(file.path));
            }
            plan.push(file.into_plan_item());
        }

        Ok(ModpackImport {
            name: self.name,
            version: Some(self.version_id),
            summary: self.summary,
            minecraft_version,
            loader,
            loader_version,
            plan,
            override_prefixes: vec!["overrides/".to_string(), "client-overrides/".to_string()],
        })
    }
}

impl MrpackFile {
    fn into_plan_item(self) -> PlanItem {
        let filename = Path::new(&self.path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.clone());
        let content_type = match self.path.split('/').next() {
            Some("resourcepacks") => ContentType::ResourcePack,
            Some("shaderpacks") => ContentType::ShaderPack,
            _ => ContentType::Mod,
        };
        let hashes = FileHashes {
            sha1: self.hashes.get("sha1").cloned(),
            sha512: self.hashes.get("sha512").cloned(),
        };

        PlanItem {
            package_id: self.path.clone(),
            version_id: hashes.sha1.clone().unwrap_or_default(),
            platform: Platform::Modrinth,
            content_type,
            name: filename.clone(),
            file: Some(PackageFile {
                filename,
                url: self.downloads.into_iter().next(),
                size: self.file_size,
                primary: true,
                hashes,
            }),
            deferred: false,
            path: Some(self.path),
            infer_kind: false,
        }
    }
}
