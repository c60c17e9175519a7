//! Session-scoped install queue
//!
//! Entries are added by the caller with their resolved dependencies attached.
//! "Queued" is transitive: a package nested under any entry counts as queued.

pub mod plan;

use std::collections::HashSet;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::PackwrightResult;
use crate::platform::{ContentType, PackageVersion, Platform};

pub use plan::{InstallPlan, PlanItem};

/// A package chosen for installation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub package_id: String,
    pub name: String,
    pub platform: Platform,
    pub content_type: ContentType,
    pub chosen_version: PackageVersion,
    /// Resolved required dependencies; always one level deep
    #[serde(default)]
    pub dependencies: Vec<QueueEntry>,
}

impl QueueEntry {
    pub fn new(
        name: &str,
        platform: Platform,
        content_type: ContentType,
        chosen_version: PackageVersion,
    ) -> Self {
        Self {
            package_id: chosen_version.project_id.clone(),
            name: name.to_string(),
            platform,
            content_type,
            chosen_version,
            dependencies: Vec::new(),
        }
    }

    /// Whether this entry's version declares `package_id` as required
    pub fn requires(&self, package_id: &str) -> bool {
        self.chosen_version
            .required_dependencies()
            .any(|d| d.project_id.as_deref() == Some(package_id))
    }

    fn plan_item(&self) -> PlanItem {
        PlanItem::from_version(&self.chosen_version, self.platform, self.content_type, &self.name)
    }
}

/// Packages waiting to be installed
#[derive(Debug, Default)]
pub struct InstallQueue {
    entries: RwLock<Vec<QueueEntry>>,
}

impl InstallQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level entry.
    ///
    /// Versions without files are rejected. Dependencies already queued
    /// elsewhere are dropped from the entry. Returns `false` when the
    /// package is already a top-level entry.
    pub fn add(&self, mut entry: QueueEntry) -> PackwrightResult<bool> {
        entry.chosen_version.ensure_installable()?;
        for dep in &entry.dependencies {
            dep.chosen_version.ensure_installable()?;
        }

        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.package_id == entry.package_id) {
            tracing::debug!("{} is already queued", entry.package_id);
            return Ok(false);
        }

        let queued = Self::collect_ids(&entries);
        let mut seen = HashSet::new();
        entry.dependencies.retain(|dep| {
            dep.package_id != entry.package_id
                && !queued.contains(&dep.package_id)
                && seen.insert(dep.package_id.clone())
        });
        entry.dependencies.iter_mut().for_each(|dep| dep.dependencies.clear());

        tracing::info!(
            "Queued {} ({}) with {} dependencies",
            entry.name,
            entry.chosen_version.version_number,
            entry.dependencies.len()
        );
        entries.push(entry);
        Ok(true)
    }

    /// Remove a top-level entry.
    ///
    /// Its dependencies stay queued when another remaining entry requires
    /// them; the rest leave with it. Returns the removed entry.
    pub fn remove(&self, package_id: &str) -> Option<QueueEntry> {
        let mut entries = self.entries.write();
        let index = entries.iter().position(|e| e.package_id == package_id)?;
        let mut removed = entries.remove(index);

        for dep in std::mem::take(&mut removed.dependencies) {
            if Self::collect_ids(&entries).contains(&dep.package_id) {
                continue;
            }
            match entries.iter_mut().find(|e| e.requires(&dep.package_id)) {
                Some(owner) => {
                    tracing::debug!("Keeping {} queued for {}", dep.package_id, owner.package_id);
                    owner.dependencies.push(dep);
                }
                None => tracing::debug!("Dropping orphaned dependency {}", dep.package_id),
            }
        }

        Some(removed)
    }

    /// Whether a package is queued, at top level or as a dependency
    pub fn contains(&self, package_id: &str) -> bool {
        self.entries.read().iter().any(|e| {
            e.package_id == package_id || e.dependencies.iter().any(|d| d.package_id == package_id)
        })
    }

    /// Every queued package id, nested dependencies included
    pub fn queued_ids(&self) -> HashSet<String> {
        Self::collect_ids(&self.entries.read())
    }

    fn collect_ids(entries: &[QueueEntry]) -> HashSet<String> {
        entries
            .iter()
            .flat_map(|e| std::iter::once(&e.package_id).chain(e.dependencies.iter().map(|d| &d.package_id)))
            .cloned()
            .collect()
    }

    /// Snapshot of the top-level entries
    pub fn entries(&self) -> Vec<QueueEntry> {
        self.entries.read().clone()
    }

    /// Flatten into an install plan: each entry's dependencies, then the
    /// entry. The first occurrence of a package wins.
    pub fn flatten(&self) -> InstallPlan {
        let entries = self.entries.read();
        let mut plan = InstallPlan::new();
        for entry in entries.iter() {
            for dep in &entry.dependencies {
                plan.push(dep.plan_item());
            }
            plan.push(entry.plan_item());
        }
        plan
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
