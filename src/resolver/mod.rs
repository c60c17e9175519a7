//! Required-dependency resolver
//!
//! Resolution is one level deep: a dependency's own dependencies are not
//! followed. Failures are per dependency and never abort siblings.

use std::collections::HashSet;
use std::sync::Arc;
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::core::{PackwrightError, PackwrightResult};
use crate::platform::{ContentType, Dependency, PackageVersion, Platform, PlatformAdapter};
use crate::queue::QueueEntry;

/// Parallel lookups per resolution
const LOOKUP_CONCURRENCY: usize = 4;

/// A required dependency that could not be queued
#[derive(Debug, Clone, Serialize)]
pub struct SkippedDependency {
    pub project_id: String,
    pub reason: String,
}

/// Outcome of resolving one version's required dependencies
#[derive(Debug, Default)]
pub struct ResolvedDependencies {
    /// New queue entries, in declaration order, without nested dependencies
    pub entries: Vec<QueueEntry>,
    pub skipped: Vec<SkippedDependency>,
}

enum Lookup {
    Resolved(QueueEntry),
    AlreadyQueued,
    Skipped(SkippedDependency),
}

/// Dependency resolver
pub struct DependencyResolver {
    adapter: Arc<PlatformAdapter>,
}

impl DependencyResolver {
    /// Create a new resolver
    pub fn new(adapter: Arc<PlatformAdapter>) -> Self {
        Self { adapter }
    }

    /// Resolve the required dependencies of `version` that are not already
    /// in `already_queued`, picking the first compatible version of each.
    pub async fn resolve_required_dependencies(
        &self,
        version: &PackageVersion,
        game_version: Option<&str>,
        loader: Option<&str>,
        platform: Platform,
        kind: ContentType,
        already_queued: &HashSet<String>,
    ) -> ResolvedDependencies {
        let dep_kind = match kind {
            ContentType::Modpack => ContentType::Mod,
            other => other,
        };

        let mut declared = HashSet::new();
        let required: Vec<&Dependency> = version
            .required_dependencies()
            .filter(|d| match d.project_id {
                Some(ref id) => {
                    *id != version.project_id && !already_queued.contains(id) && declared.insert(id.clone())
                }
                None => d.version_id.is_some(),
            })
            .collect();

        if required.is_empty() {
            return ResolvedDependencies::default();
        }
        tracing::debug!(
            "Resolving {} required dependencies of {}",
            required.len(),
            version.project_id
        );

        let lookups: Vec<Lookup> = stream::iter(required)
            .map(|dep| self.lookup(dep, game_version, loader, platform, dep_kind, already_queued, &version.project_id))
            .buffered(LOOKUP_CONCURRENCY)
            .collect()
            .await;

        let mut resolved = ResolvedDependencies::default();
        let mut seen = HashSet::new();
        for lookup in lookups {
            match lookup {
                Lookup::Resolved(entry) => {
                    if seen.insert(entry.package_id.clone()) {
                        resolved.entries.push(entry);
                    }
                }
                Lookup::AlreadyQueued => {}
                Lookup::Skipped(skip) => {
                    tracing::warn!("Skipping dependency {}: {}", skip.project_id, skip.reason);
                    resolved.skipped.push(skip);
                }
            }
        }
        resolved
    }

    #[allow(clippy::too_many_arguments)]
    async fn lookup(
        &self,
        dep: &Dependency,
        game_version: Option<&str>,
        loader: Option<&str>,
        platform: Platform,
        kind: ContentType,
        already_queued: &HashSet<String>,
        parent: &str,
    ) -> Lookup {
        let project_id = match self.project_id(dep, platform).await {
            Ok(id) => id,
            Err(e) => {
                return Lookup::Skipped(SkippedDependency {
                    project_id: dep.version_id.clone().unwrap_or_default(),
                    reason: e.to_string(),
                })
            }
        };
        if project_id == parent || already_queued.contains(&project_id) {
            return Lookup::AlreadyQueued;
        }

        match self.first_compatible(&project_id, game_version, loader, platform, kind).await {
            Ok(entry) => Lookup::Resolved(entry),
            Err(e) => Lookup::Skipped(SkippedDependency {
                project_id,
                reason: e.to_string(),
            }),
        }
    }

    /// Some dependencies only name a version; its project id is looked up
    async fn project_id(&self, dep: &Dependency, platform: Platform) -> PackwrightResult<String> {
        if let Some(ref id) = dep.project_id {
            return Ok(id.clone());
        }
        let version_id = dep
            .version_id
            .as_deref()
            .ok_or_else(|| PackwrightError::other("dependency names neither a project nor a version"))?;
        Ok(self.adapter.version(platform, "", version_id).await?.project_id)
    }

    async fn first_compatible(
        &self,
        project_id: &str,
        game_version: Option<&str>,
        loader: Option<&str>,
        platform: Platform,
        kind: ContentType,
    ) -> PackwrightResult<QueueEntry> {
        let (details, versions) = futures::try_join!(
            self.adapter.details(platform, project_id),
            self.adapter.versions(platform, project_id, kind, game_version, loader)
        )?;

        let chosen = versions
            .into_iter()
            .find(|v| !v.files.is_empty())
            .ok_or_else(|| PackwrightError::VersionNotFound {
                package: project_id.to_string(),
                version: format!(
                    "{} {}",
                    game_version.unwrap_or("any"),
                    loader.unwrap_or("any loader")
                ),
            })?;

        tracing::debug!("Resolved dependency {} -> {}", details.name, chosen.version_number);
        Ok(QueueEntry::new(&details.name, platform, kind, chosen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::{hit, version, FakePlatform};
    use crate::platform::{DependencyType, PlatformClient};

    fn resolver(fake: FakePlatform) -> (DependencyResolver, Arc<FakePlatform>) {
        let fake = Arc::new(fake);
        let client: Arc<dyn PlatformClient> = fake.clone();
        let adapter = Arc::new(PlatformAdapter::with_clients(vec![client]));
        (DependencyResolver::new(adapter), fake)
    }

    fn catalog() -> FakePlatform {
        FakePlatform::new(Platform::Modrinth)
            .with_hit(hit("sodium", &[]))
            .with_hit(hit("fabric-api", &[]))
            .with_hit(hit("indium", &[]))
            .with_version(version("sodium", "sodium-2", &["fabric-api"]))
            .with_version(version("sodium", "sodium-1", &[]))
            .with_version(version("fabric-api", "api-1", &[]))
            .with_version(version("indium", "indium-1", &[]))
    }

    async fn resolve(
        resolver: &DependencyResolver,
        version: &PackageVersion,
        queued: &[&str],
    ) -> ResolvedDependencies {
        let queued: HashSet<String> = queued.iter().map(|s| s.to_string()).collect();
        resolver
            .resolve_required_dependencies(
                version,
                Some("1.20.1"),
                Some("fabric"),
                Platform::Modrinth,
                ContentType::Mod,
                &queued,
            )
            .await
    }

    #[tokio::test]
    async fn test_first_compatible_version_is_chosen() {
        let (resolver, _) = resolver(catalog());
        let iris = version("iris", "iris-1", &["sodium"]);

        let resolved = resolve(&resolver, &iris, &[]).await;
        assert_eq!(resolved.entries.len(), 1);
        assert_eq!(resolved.entries[0].package_id, "sodium");
        assert_eq!(resolved.entries[0].chosen_version.id, "sodium-2");
        assert_eq!(resolved.entries[0].name, "Project sodium");
    }

    #[tokio::test]
    async fn test_resolution_stops_at_depth_one() {
        let (resolver, fake) = resolver(catalog());
        let iris = version("iris", "iris-1", &["sodium"]);

        let resolved = resolve(&resolver, &iris, &[]).await;
        assert!(resolved.entries[0].dependencies.is_empty());
        assert_eq!(fake.version_calls(), vec!["sodium"]);
    }

    #[tokio::test]
    async fn test_already_queued_dependencies_are_not_fetched() {
        let (resolver, fake) = resolver(catalog());
        let pack = version("pack", "pack-1", &["sodium", "indium"]);

        let resolved = resolve(&resolver, &pack, &["sodium"]).await;
        let ids: Vec<_> = resolved.entries.iter().map(|e| e.package_id.as_str()).collect();
        assert_eq!(ids, vec!["indium"]);
        assert_eq!(fake.version_calls(), vec!["indium"]);
    }

    #[tokio::test]
    async fn test_missing_dependency_does_not_abort_siblings() {
        let (resolver, _) = resolver(catalog());
        let pack = version("pack", "pack-1", &["ghost", "indium", "fabric-api"]);

        let resolved = resolve(&resolver, &pack, &[]).await;
        let ids: Vec<_> = resolved.entries.iter().map(|e| e.package_id.as_str()).collect();
        assert_eq!(ids, vec!["indium", "fabric-api"]);
        assert_eq!(resolved.skipped.len(), 1);
        assert_eq!(resolved.skipped[0].project_id, "ghost");
    }

    #[tokio::test]
    async fn test_optional_and_self_dependencies_are_ignored() {
        let (resolver, fake) = resolver(catalog());
        let mut v = version("sodium", "sodium-3", &["sodium"]);
        v.dependencies.push(Dependency {
            project_id: Some("indium".into()),
            version_id: None,
            dependency_type: DependencyType::Optional,
        });

        let resolved = resolve(&resolver, &v, &[]).await;
        assert!(resolved.entries.is_empty());
        assert!(fake.version_calls().is_empty());
    }

    #[tokio::test]
    async fn test_version_only_dependency_is_resolved_to_its_project() {
        let (resolver, _) = resolver(catalog());
        let mut v = version("iris", "iris-1", &[]);
        v.dependencies.push(Dependency {
            project_id: None,
            version_id: Some("api-1".into()),
            dependency_type: DependencyType::Required,
        });

        let resolved = resolve(&resolver, &v, &[]).await;
        assert_eq!(resolved.entries[0].package_id, "fabric-api");
    }
}
