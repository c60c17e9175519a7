//! Modpack archives
//!
//! Reads Modrinth `.mrpack` and CurseForge zip archives into an install
//! plan plus the override folders to extract.

pub mod manifest;
pub mod mrpack;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use serde::de::DeserializeOwned;
use zip::ZipArchive;

use crate::core::{PackwrightError, PackwrightResult};
use crate::installer::InstallResult;
use crate::instance::ModLoader;
use crate::queue::InstallPlan;
use crate::utils::is_safe_path;

pub use manifest::CurseForgeManifest;
pub use mrpack::MrpackIndex;

/// What an import command reports back
pub type ImportResultInfo = InstallResult;

/// A parsed modpack archive
#[derive(Debug)]
pub struct ModpackImport {
    pub name: String,
    pub version: Option<String>,
    pub summary: Option<String>,
    pub minecraft_version: String,
    pub loader: ModLoader,
    pub loader_version: Option<String>,
    pub plan: InstallPlan,
    /// Archive folders copied verbatim into the instance, in order
    pub override_prefixes: Vec<String>,
}

/// Detect the archive format and parse its index
pub fn read_archive(path: &Path) -> PackwrightResult<ModpackImport> {
    let mut archive = ZipArchive::new(File::open(path)?)?;

    if let Some(index) = read_json::<MrpackIndex>(&mut archive, mrpack::INDEX_FILE)? {
        tracing::info!("Reading Modrinth modpack {}", index.name);
        return index.into_import();
    }
    if let Some(manifest) = read_json::<CurseForgeManifest>(&mut archive, manifest::MANIFEST_FILE)? {
        tracing::info!("Reading CurseForge modpack {}", manifest.name);
        return manifest.into_import();
    }

    Err(PackwrightError::modpack(format!(
        "{} contains neither {} nor {}",
        path.display(),
        mrpack::INDEX_FILE,
        manifest::MANIFEST_FILE
    )))
}

fn read_json<T: DeserializeOwned>(archive: &mut ZipArchive<File>, name: &str) -> PackwrightResult<Option<T>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut contents = String::new();
    entry.read_to_string(&mut contents)?;
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| PackwrightError::modpack(format!("{}: {}", name, e)))
}

/// Extract every file under the given prefixes into `instance_dir`.
/// Later prefixes overwrite earlier ones. Entries that would land outside
/// the instance are skipped. Returns the number of files written.
pub fn extract_overrides(archive_path: &Path, instance_dir: &Path, prefixes: &[String]) -> PackwrightResult<usize> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    let mut written = 0;

    for prefix in prefixes {
        let root = Path::new(prefix.trim_end_matches('/'));
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() || !entry.name().starts_with(prefix.as_str()) {
                continue;
            }

            let Some(relative) = entry
                .enclosed_name()
                .and_then(|p| p.strip_prefix(root).ok().map(PathBuf::from))
                .filter(|p| is_safe_path(p))
            else {
                tracing::warn!("Skipping unsafe archive entry {}", entry.name());
                continue;
            };

            let destination = instance_dir.join(&relative);
            if let Some(parent) = destination.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&destination)?;
            std::io::copy(&mut entry, &mut out)?;
            written += 1;
        }
    }

    tracing::debug!("Extracted {} override files", written);
    Ok(written)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    use super::*;

    /// Write a zip archive holding the given entries
    pub(crate) fn write_archive(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    pub(crate) const MRPACK_INDEX: &str = r#"{
        "formatVersion": 1,
        "game": "minecraft",
        "versionId": "1.0.0",
        "name": "Tiny Pack",
        "files": [{
            "path": "mods/lithium.jar",
            "hashes": {},
            "downloads": ["https://cdn.test/lithium.jar"],
            "fileSize": 7
        }],
        "dependencies": {"minecraft": "1.20.1", "fabric-loader": "0.15.0"}
    }"#;

    #[test]
    fn test_mrpack_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.mrpack");
        write_archive(&path, &[("modrinth.index.json", MRPACK_INDEX.as_bytes())]);

        let import = read_archive(&path).unwrap();
        assert_eq!(import.name, "Tiny Pack");
        assert_eq!(import.plan.len(), 1);
    }

    #[test]
    fn test_curseforge_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.zip");
        let manifest = r#"{"minecraft": {"version": "1.19.2", "modLoaders": [{"id": "forge-43.2.0", "primary": true}]},
            "name": "CF Pack", "files": [{"projectID": 1, "fileID": 2}], "overrides": "overrides"}"#;
        write_archive(&path, &[("manifest.json", manifest.as_bytes())]);

        let import = read_archive(&path).unwrap();
        assert_eq!(import.loader, ModLoader::Forge);
        assert_eq!(import.minecraft_version, "1.19.2");
    }

    #[test]
    fn test_unknown_archive_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("random.zip");
        write_archive(&path, &[("readme.txt", b"hi")]);
        assert!(matches!(read_archive(&path), Err(PackwrightError::InvalidModpack(_))));
    }

    #[test]
    fn test_overrides_extracted_with_client_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pack.mrpack");
        write_archive(
            &path,
            &[
                ("overrides/config/sodium.json", b"base"),
                ("client-overrides/config/sodium.json", b"client"),
                ("overrides/options.txt", b"fov:90"),
                ("overrides/../../escape.txt", b"nope"),
                ("other/ignored.txt", b"x"),
            ],
        );
        let instance = dir.path().join("instance");

        let written = extract_overrides(
            &path,
            &instance,
            &["overrides/".to_string(), "client-overrides/".to_string()],
        )
        .unwrap();

        assert_eq!(written, 3);
        assert_eq!(std::fs::read(instance.join("config/sodium.json")).unwrap(), b"client");
        assert!(instance.join("options.txt").is_file());
        assert!(!dir.path().join("escape.txt").exists());
        assert!(!instance.join("ignored.txt").exists());
    }
}
