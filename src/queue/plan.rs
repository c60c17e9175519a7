//! Flattened install plan

use serde::{Deserialize, Serialize};

use crate::platform::{ContentType, PackageFile, PackageVersion, Platform};

/// One file to install
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItem {
    pub package_id: String,
    pub version_id: String,
    pub platform: Platform,
    pub content_type: ContentType,
    pub name: String,
    /// File known at plan time
    #[serde(default)]
    pub file: Option<PackageFile>,
    /// The file is looked up just in time from `package_id`/`version_id`
    #[serde(default)]
    pub deferred: bool,
    /// Destination relative to the instance directory. Defaults to
    /// `<subfolder>/<filename>`.
    #[serde(default)]
    pub path: Option<String>,
    /// Decide the content type from the resolved filename
    #[serde(default)]
    pub infer_kind: bool,
}

impl PlanItem {
    /// Plan item for a chosen version of a package
    pub fn from_version(
        version: &PackageVersion,
        platform: Platform,
        content_type: ContentType,
        name: &str,
    ) -> Self {
        Self {
            package_id: version.project_id.clone(),
            version_id: version.id.clone(),
            platform,
            content_type,
            name: name.to_string(),
            file: version.primary_file().cloned(),
            deferred: false,
            path: None,
            infer_kind: false,
        }
    }

    /// Plan item naming only a project and file id
    pub fn unresolved(package_id: &str, version_id: &str, platform: Platform, content_type: ContentType) -> Self {
        Self {
            package_id: package_id.to_string(),
            version_id: version_id.to_string(),
            platform,
            content_type,
            name: package_id.to_string(),
            file: None,
            deferred: true,
            path: None,
            infer_kind: false,
        }
    }
}

/// Deduplicated, ordered list of files to install
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallPlan {
    pub items: Vec<PlanItem>,
    /// Non-fatal notices collected while planning
    pub warnings: Vec<String>,
}

impl InstallPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item unless its package is already planned. Returns whether
    /// the item was added.
    pub fn push(&mut self, item: PlanItem) -> bool {
        if let Some(existing) = self.items.iter().find(|i| i.package_id == item.package_id) {
            if existing.version_id != item.version_id {
                let warning = format!(
                    "{} requested at versions {} and {}; keeping {}",
                    item.package_id, existing.version_id, item.version_id, existing.version_id
                );
                tracing::warn!("{}", warning);
                self.warnings.push(warning);
            }
            return false;
        }
        self.items.push(item);
        true
    }

    /// First item that neither carries a file nor can look one up
    pub fn first_without_file(&self) -> Option<&PlanItem> {
        self.items.iter().find(|i| i.file.is_none() && !i.deferred)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
