//! CurseForge `manifest.json`

use serde::Deserialize;

use crate::core::{PackwrightError, PackwrightResult};
use crate::instance::ModLoader;
use crate::modpack::ModpackImport;
use crate::platform::{ContentType, Platform};
use crate::queue::{InstallPlan, PlanItem};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurseForgeManifest {
    pub minecraft: ManifestMinecraft,
    #[serde(default)]
    pub manifest_type: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub files: Vec<ManifestFile>,
    #[serde(default = "default_overrides")]
    pub overrides: String,
}

fn default_overrides() -> String {
    "overrides".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMinecraft {
    pub version: String,
    #[serde(default)]
    pub mod_loaders: Vec<ManifestLoader>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestLoader {
    pub id: String,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Deserialize)]
pub struct ManifestFile {
    #[serde(rename = "projectID")]
    pub project_id: u64,
    #[serde(rename = "fileID")]
    pub file_id: u64,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Split a loader id such as `forge-47.2.0` into loader and version
pub fn parse_loader_id(id: &str) -> PackwrightResult<(ModLoader, Option<String>)> {
    match id.split_once('-') {
        Some((loader, version)) => Ok((loader.parse()?, Some(version.to_string()))),
        None => Ok((id.parse()?, None)),
    }
}

impl CurseForgeManifest {
    /// Convert into an import. Files are resolved against CurseForge at
    /// install time; their kind follows from the resolved file name.
    pub fn into_import(self) -> PackwrightResult<ModpackImport> {
        if let Some(ref kind) = self.manifest_type {
            if kind != "minecraftModpack" {
                return Err(PackwrightError::modpack(format!("unsupported manifest type '{}'", kind)));
            }
        }

        let loader_entry = self
            .minecraft
            .mod_loaders
            .iter()
            .find(|l| l.primary)
            .or_else(|| self.minecraft.mod_loaders.first());
        let (loader, loader_version) = match loader_entry {
            Some(entry) => parse_loader_id(&entry.id)?,
            None => (ModLoader::Vanilla, None),
        };

        let mut plan = InstallPlan::new();
        for file in &self.files {
            let project_id = file.project_id.to_string();
            let file_id = file.file_id.to_string();
            if !file.required {
                let warning = format!("Skipped optional file {} of project {}", file_id, project_id);
                tracing::debug!("{}", warning);
                plan.warnings.push(warning);
                continue;
            }
            let mut item = PlanItem::unresolved(&project_id, &file_id, Platform::CurseForge, ContentType::Mod);
            item.infer_kind = true;
            plan.push(item);
        }

        let overrides = self.overrides.trim_matches('/');
        let name = if self.name.trim().is_empty() {
            "Imported modpack".to_string()
        } else {
            self.name
        };

        Ok(ModpackImport {
            name,
            version: self.version,
            summary: self.author.map(|a| format!("by {}", a)),
            minecraft_version: self.minecraft.version,
            loader,
            loader_version,
            plan,
            override_prefixes: vec![format!("{}/", overrides)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "minecraft": {
            "version": "1.20.1",
            "modLoaders": [
                {"id": "fabric-0.14.0", "primary": false},
                {"id": "forge-47.2.0", "primary": true}
            ]
        },
        "manifestType": "minecraftModpack",
        "manifestVersion": 1,
        "name": "All the Mods 9",
        "version": "0.2.44",
        "author": "ATMTeam",
        "files": [
            {"projectID": 238222, "fileID": 4567, "required": true},
            {"projectID": 32274, "fileID": 111, "required": false},
            {"projectID": 238222, "fileID": 4567, "required": true}
        ],
        "overrides": "overrides"
    }"#;

    #[test]
    fn test_manifest_becomes_unresolved_plan() {
        let manifest: CurseForgeManifest = serde_json::from_str(MANIFEST).unwrap();
        let import = manifest.into_import().unwrap();

        assert_eq!(import.loader, ModLoader::Forge);
        assert_eq!(import.loader_version.as_deref(), Some("47.2.0"));
        assert_eq!(import.plan.len(), 1);
        assert_eq!(import.plan.warnings.len(), 1);

        let item = &import.plan.items[0];
        assert_eq!(item.platform, Platform::CurseForge);
        assert!(item.file.is_none());
        assert!(item.infer_kind);
        assert_eq!(import.override_prefixes, vec!["overrides/"]);
    }

    #[test]
    fn test_loader_ids() {
        assert_eq!(parse_loader_id("neoforge-20.4.80").unwrap(), (ModLoader::NeoForge, Some("20.4.80".into())));
        assert_eq!(parse_loader_id("fabric").unwrap(), (ModLoader::Fabric, None));
        assert!(parse_loader_id("rift-1.0").is_err());
    }

    #[test]
    fn test_non_modpack_manifest_is_rejected() {
        let json = MANIFEST.replace("minecraftModpack", "minecraftWorld");
        let manifest: CurseForgeManifest = serde_json::from_str(&json).unwrap();
        assert!(manifest.into_import().is_err());
    }
}
