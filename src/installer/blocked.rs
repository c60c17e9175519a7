//! Files the platform refuses to serve programmatically
//!
//! The user downloads them by hand; matching finds them in a local folder
//! and copying moves them into the instance.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::core::{PackwrightError, PackwrightResult};
use crate::platform::{ContentType, Platform};
use crate::utils::{is_safe_path, sanitize_filename};

/// How deep to look inside the search folder
const SEARCH_DEPTH: usize = 3;

/// Browser duplicate suffix such as `name (1).jar`
static DUPLICATE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(\d+\)(\.[^.]+)?$").expect("valid regex"));

/// A file without a download URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedFile {
    pub project_id: String,
    pub file_id: String,
    pub filename: String,
    pub platform: Platform,
    pub content_type: ContentType,
    /// Destination relative to the instance directory, when the source
    /// dictated one
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
    /// Where the user can fetch it manually
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub matched: bool,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

impl BlockedFile {
    /// Destination relative to the instance directory, named the way a
    /// regular download of the same file would be
    pub fn relative_destination(&self) -> PathBuf {
        match self.path {
            Some(ref path) => PathBuf::from(path),
            None => Path::new(self.content_type.subfolder()).join(sanitize_filename(&self.filename)),
        }
    }

    fn unmatched(mut self) -> Self {
        self.matched = false;
        self.local_path = None;
        self
    }
}

/// What the user chose after matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockedDecision {
    /// Copy what matched and keep waiting on nothing else
    Continue,
    /// Give up on unmatched files
    Skip,
}

/// Result of copying matched files into an instance
#[derive(Debug, Clone, Default, Serialize)]
pub struct CopyReport {
    pub copied: Vec<String>,
    pub skipped: Vec<String>,
}

/// Lowercase, treat space, underscore and plus alike, drop a browser
/// duplicate suffix
pub fn normalize_filename(name: &str) -> String {
    let stripped = DUPLICATE_SUFFIX.replace(name, "$1");
    stripped
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, ' ' | '_' | '+') { '-' } else { c })
        .collect()
}

struct Candidate {
    path: PathBuf,
    name: String,
    size: u64,
}

/// Every file back with `matched = false`, for when there is nowhere to look
pub fn all_unmatched(blocked: Vec<BlockedFile>) -> Vec<BlockedFile> {
    blocked.into_iter().map(BlockedFile::unmatched).collect()
}

/// Match blocked files against files under `folder`. Each file is matched
/// independently; unmatched files come back with `matched = false`. A
/// missing folder matches nothing.
pub fn resolve_blocked_files(blocked: Vec<BlockedFile>, folder: &Path) -> Vec<BlockedFile> {
    if !folder.is_dir() {
        tracing::warn!(
            "Blocked file folder {} does not exist; {} files left unmatched",
            folder.display(),
            blocked.len()
        );
        return all_unmatched(blocked);
    }

    let candidates: Vec<Candidate> = WalkDir::new(folder)
        .max_depth(SEARCH_DEPTH)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !e.file_name().to_string_lossy().ends_with(".part"))
        .filter_map(|e| {
            let size = e.metadata().ok()?.len();
            Some(Candidate {
                name: e.file_name().to_string_lossy().to_string(),
                path: e.into_path(),
                size,
            })
        })
        .collect();

    let by_name: HashMap<&str, &Candidate> = candidates.iter().map(|c| (c.name.as_str(), c)).collect();
    let by_normalized: HashMap<String, &Candidate> =
        candidates.iter().map(|c| (normalize_filename(&c.name), c)).collect();

    blocked
        .into_iter()
        .map(|mut file| {
            let found = by_name
                .get(file.filename.as_str())
                .copied()
                .or_else(|| by_normalized.get(&normalize_filename(&file.filename)).copied())
                .or_else(|| match_by_digest(&file, &candidates));

            match found {
                Some(candidate) => {
                    tracing::debug!("Matched {} -> {}", file.filename, candidate.path.display());
                    file.matched = true;
                    file.local_path = Some(candidate.path.clone());
                }
                None => {
                    tracing::warn!("No local copy of blocked file {}", file.filename);
                    return file.unmatched();
                }
            }
            file
        })
        .collect()
}

/// Renamed downloads still match when size and SHA-1 agree
fn match_by_digest<'a>(file: &BlockedFile, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    let expected = file.sha1.as_deref()?;
    candidates
        .iter()
        .filter(|c| file.size == 0 || c.size == file.size)
        .find(|c| {
            crate::utils::sha1_file(&c.path)
                .map(|actual| actual.eq_ignore_ascii_case(expected))
                .unwrap_or(false)
        })
}

/// Copy every matched file into the instance. Unmatched files, and files
/// whose copy fails, are reported as skipped; one failure never stops the
/// others.
pub fn copy_matched_to_instance(blocked: &[BlockedFile], instance_dir: &Path) -> CopyReport {
    let mut report = CopyReport::default();

    for file in blocked {
        let source = match (file.matched, file.local_path.as_ref()) {
            (true, Some(path)) => path,
            _ => {
                report.skipped.push(file.filename.clone());
                continue;
            }
        };

        match copy_one(file, source, instance_dir) {
            Ok(destination) => {
                tracing::info!("Copied {} into {}", file.filename, destination.display());
                report.copied.push(file.filename.clone());
            }
            Err(e) => {
                tracing::warn!("Could not copy blocked file {}: {}", file.filename, e);
                report.skipped.push(file.filename.clone());
            }
        }
    }

    report
}

fn copy_one(file: &BlockedFile, source: &Path, instance_dir: &Path) -> PackwrightResult<PathBuf> {
    let relative = file.relative_destination();
    if !is_safe_path(&relative) {
        return Err(PackwrightError::PathTraversal(relative.display().to_string()));
    }
    let destination = instance_dir.join(&relative);
    let parent = destination.parent().unwrap_or(instance_dir);
    std::fs::create_dir_all(parent)?;

    let tmp = tempfile::NamedTempFile::new_in(parent)?;
    std::fs::copy(source, tmp.path())?;
    tmp.persist(&destination).map_err(|e| PackwrightError::Io(e.error))?;
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked(filename: &str) -> BlockedFile {
        BlockedFile {
            project_id: "238222".into(),
            file_id: "4567".into(),
            filename: filename.into(),
            platform: Platform::CurseForge,
            content_type: ContentType::Mod,
            path: None,
            sha1: None,
            size: 0,
            website_url: None,
            matched: false,
            local_path: None,
        }
    }

    #[test]
    fn test_normalize_filename() {
        assert_eq!(normalize_filename("Create 1.20.1 (1).jar"), "create-1.20.1.jar");
        assert_eq!(normalize_filename("jei_1.20+forge.jar"), "jei-1.20-forge.jar");
    }

    #[test]
    fn test_matching_strategies() {
        let folder = tempfile::tempdir().unwrap();
        std::fs::write(folder.path().join("exact.jar"), b"1").unwrap();
        std::fs::write(folder.path().join("Fuzzy Name (2).jar"), b"2").unwrap();
        std::fs::write(folder.path().join("renamed.jar"), b"payload").unwrap();

        let mut by_digest = blocked("original-name.jar");
        by_digest.sha1 = Some(crate::utils::sha1_hex(b"payload"));
        by_digest.size = 7;

        let resolved = resolve_blocked_files(
            vec![blocked("exact.jar"), blocked("fuzzy_name.jar"), by_digest, blocked("missing.jar")],
            folder.path(),
        );

        let matched: Vec<bool> = resolved.iter().map(|f| f.matched).collect();
        assert_eq!(matched, vec![true, true, true, false]);
        assert_eq!(
            resolved[2].local_path.as_ref().unwrap().file_name().unwrap(),
            "renamed.jar"
        );
    }

    #[test]
    fn test_missing_folder_leaves_everything_unmatched() {
        let folder = tempfile::tempdir().unwrap();
        let missing = folder.path().join("Downloads");

        let mut stale = blocked("create.jar");
        stale.matched = true;
        stale.local_path = Some(folder.path().join("old/create.jar"));

        let resolved = resolve_blocked_files(vec![blocked("jei.jar"), stale], &missing);
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|f| !f.matched && f.local_path.is_none()));
    }

    #[test]
    fn test_copy_places_matched_files_in_subfolders() {
        let downloads = tempfile::tempdir().unwrap();
        let instance = tempfile::tempdir().unwrap();
        std::fs::write(downloads.path().join("a.jar"), b"mod").unwrap();
        std::fs::write(downloads.path().join("pack.zip"), b"zip").unwrap();

        let mut pack = blocked("pack.zip");
        pack.content_type = ContentType::ResourcePack;
        let resolved = resolve_blocked_files(
            vec![blocked("a.jar"), pack, blocked("missing.jar")],
            downloads.path(),
        );

        let report = copy_matched_to_instance(&resolved, instance.path());
        assert_eq!(report.copied, vec!["a.jar", "pack.zip"]);
        assert_eq!(report.skipped, vec!["missing.jar"]);
        assert_eq!(std::fs::read(instance.path().join("mods/a.jar")).unwrap(), b"mod");
        assert!(instance.path().join("resourcepacks/pack.zip").is_file());
    }

    #[test]
    fn test_copy_rejects_escaping_paths() {
        let downloads = tempfile::tempdir().unwrap();
        let instance = tempfile::tempdir().unwrap();
        std::fs::write(downloads.path().join("a.jar"), b"mod").unwrap();

        let mut file = blocked("a.jar");
        file.path = Some("../../outside.jar".into());
        file.matched = true;
        file.local_path = Some(downloads.path().join("a.jar"));

        let report = copy_matched_to_instance(&[file], instance.path());
        assert!(report.copied.is_empty());
        assert_eq!(report.skipped, vec!["a.jar"]);
        assert!(!instance.path().join("../../outside.jar").exists());
    }

    #[test]
    fn test_failed_copy_does_not_stop_the_rest() {
        let downloads = tempfile::tempdir().unwrap();
        let instance = tempfile::tempdir().unwrap();
        std::fs::write(downloads.path().join("jei.jar"), b"jei").unwrap();

        let mut vanished = blocked("create.jar");
        vanished.matched = true;
        vanished.local_path = Some(downloads.path().join("create.jar"));
        let mut present = blocked("jei.jar");
        present.matched = true;
        present.local_path = Some(downloads.path().join("jei.jar"));

        let report = copy_matched_to_instance(&[vanished, present], instance.path());
        assert_eq!(report.skipped, vec!["create.jar"]);
        assert_eq!(report.copied, vec!["jei.jar"]);
        assert_eq!(std::fs::read(instance.path().join("mods/jei.jar")).unwrap(), b"jei");
    }

    #[test]
    fn test_destination_name_is_sanitized() {
        let downloads = tempfile::tempdir().unwrap();
        let instance = tempfile::tempdir().unwrap();
        std::fs::write(downloads.path().join("odd.jar"), b"odd").unwrap();

        let mut file = blocked("mods/odd:name.jar");
        file.matched = true;
        file.local_path = Some(downloads.path().join("odd.jar"));
        assert_eq!(file.relative_destination(), Path::new("mods").join("mods_odd_name.jar"));

        let report = copy_matched_to_instance(&[file], instance.path());
        assert_eq!(report.copied, vec!["mods/odd:name.jar"]);
        assert!(instance.path().join("mods/mods_odd_name.jar").is_file());
    }
}
