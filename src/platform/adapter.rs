//! Platform dispatch and normalization

use std::collections::HashMap;
use std::sync::Arc;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::core::config::Config;
use crate::core::PackwrightResult;
use crate::platform::{
    ContentType, CurseForgeClient, ModrinthClient, PackageDetails, PackageSearchResult,
    PackageVersion, PaginatedResult, Platform, PlatformClient, SearchFilters,
};

/// Page size used when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A search page plus the error that replaced it, if any.
///
/// Serializes with the hit list under a key named after the content kind
/// (`mods`, `modpacks` or `resources`).
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub kind: ContentType,
    pub page: PaginatedResult<PackageSearchResult>,
    pub error: Option<String>,
}

impl Serialize for SearchOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(self.kind.results_key(), &self.page.hits)?;
        map.serialize_entry("total_hits", &self.page.total_hits)?;
        map.serialize_entry("offset", &self.page.offset)?;
        map.serialize_entry("limit", &self.page.limit)?;
        if let Some(ref error) = self.error {
            map.serialize_entry("error", error)?;
        }
        map.end()
    }
}

/// Uniform access to every configured platform
#[derive(Clone)]
pub struct PlatformAdapter {
    clients: HashMap<Platform, Arc<dyn PlatformClient>>,
}

impl PlatformAdapter {
    /// Build clients for every platform from configuration
    pub fn from_config(config: &Config) -> PackwrightResult<Self> {
        let modrinth = ModrinthClient::new(&config.platforms, &config.network)?;
        let curseforge = CurseForgeClient::new(&config.platforms, &config.network)?;
        let clients: Vec<Arc<dyn PlatformClient>> = vec![Arc::new(modrinth), Arc::new(curseforge)];
        Ok(Self::with_clients(clients))
    }

    /// Build an adapter over explicit clients
    pub fn with_clients(clients: Vec<Arc<dyn PlatformClient>>) -> Self {
        Self {
            clients: clients.into_iter().map(|c| (c.platform(), c)).collect(),
        }
    }

    /// Client for one platform
    pub fn client(&self, platform: Platform) -> PackwrightResult<&Arc<dyn PlatformClient>> {
        self.clients.get(&platform).ok_or_else(|| {
            crate::core::PackwrightError::platform(platform, "platform is not configured")
        })
    }

    /// Search one platform. Failures become an empty page carrying the error
    /// message so a single bad platform never breaks a browse view.
    pub async fn search(
        &self,
        platform: Platform,
        kind: ContentType,
        filters: &SearchFilters,
    ) -> SearchOutcome {
        match self.try_search(platform, kind, filters).await {
            Ok(page) => SearchOutcome {
                kind,
                page,
                error: None,
            },
            Err(e) => {
                tracing::warn!("{} {} search for '{}' failed: {}", platform, kind.results_key(), filters.query, e);
                SearchOutcome {
                    kind,
                    page: PaginatedResult::empty(filters.offset, filters.limit),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn try_search(
        &self,
        platform: Platform,
        kind: ContentType,
        filters: &SearchFilters,
    ) -> PackwrightResult<PaginatedResult<PackageSearchResult>> {
        let client = self.client(platform)?;

        let mut filters = filters.clone();
        let requested = if filters.limit == 0 { DEFAULT_PAGE_SIZE } else { filters.limit };
        filters.limit = requested.min(client.max_page_size());
        if filters.limit < requested {
            tracing::debug!("Clamped {} page size from {} to {}", platform, requested, filters.limit);
        }

        let mut page = client.search(kind, &filters).await?;

        if !filters.categories.is_empty() && !client.filters_categories() {
            page.hits.retain(|hit| hit.has_any_category(&filters.categories));
        }

        Ok(page)
    }

    /// Full details of one project
    pub async fn details(&self, platform: Platform, project_id: &str) -> PackwrightResult<PackageDetails> {
        self.client(platform)?.details(project_id).await
    }

    /// Versions of one project, filtered by game version and loader
    pub async fn versions(
        &self,
        platform: Platform,
        project_id: &str,
        kind: ContentType,
        game_version: Option<&str>,
        loader: Option<&str>,
    ) -> PackwrightResult<Vec<PackageVersion>> {
        self.client(platform)?
            .versions(project_id, kind, game_version, loader)
            .await
    }

    /// One version by id
    pub async fn version(
        &self,
        platform: Platform,
        project_id: &str,
        version_id: &str,
    ) -> PackwrightResult<PackageVersion> {
        self.client(platform)?.version(project_id, version_id).await
    }
}
