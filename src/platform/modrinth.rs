//! Modrinth API v2 client

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;

use crate::core::config::{NetworkConfig, PlatformsConfig};
use crate::core::{PackwrightError, PackwrightResult};
use crate::platform::http::ApiClient;
use crate::platform::{
    ContentType, Dependency, DependencyType, FileHashes, PackageDetails, PackageFile,
    PackageSearchResult, PackageVersion, PaginatedResult, Platform, PlatformClient,
    SearchFilters, SortKey,
};

/// Modrinth client
pub struct ModrinthClient {
    api: ApiClient,
    base_url: String,
    max_page_size: u32,
}

impl ModrinthClient {
    /// Create a new Modrinth client
    pub fn new(platforms: &PlatformsConfig, network: &NetworkConfig) -> PackwrightResult<Self> {
        Ok(Self {
            api: ApiClient::new(Platform::Modrinth, network, HeaderMap::new())?,
            base_url: platforms.modrinth_url.trim_end_matches('/').to_string(),
            max_page_size: platforms.modrinth_page_size_max,
        })
    }
}

#[async_trait]
impl PlatformClient for ModrinthClient {
    fn platform(&self) -> Platform {
        Platform::Modrinth
    }

    fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    fn filters_categories(&self) -> bool {
        true
    }

    async fn search(
        &self,
        kind: ContentType,
        filters: &SearchFilters,
    ) -> PackwrightResult<PaginatedResult<PackageSearchResult>> {
        let facets = serde_json::to_string(&build_facets(kind, filters))?;
        let limit = filters.limit.to_string();
        let offset = filters.offset.to_string();
        let url = reqwest::Url::parse_with_params(
            &format!("{}/search", self.base_url),
            &[
                ("query", filters.query.as_str()),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
                ("index", sort_index(filters.sort)),
                ("facets", facets.as_str()),
            ],
        )
        .map_err(|e| PackwrightError::platform(Platform::Modrinth, format!("Bad search URL: {}", e)))?;

        tracing::debug!("Modrinth search: {}", url);
        let response: SearchResponse = self.api.get_json(url.as_str()).await?;

        Ok(PaginatedResult {
            hits: response.hits.into_iter().map(SearchHit::into_result).collect(),
            total_hits: response.total_hits,
            offset: response.offset,
            limit: response.limit,
        })
    }

    async fn details(&self, project_id: &str) -> PackwrightResult<PackageDetails> {
        let url = format!("{}/project/{}", self.base_url, project_id);
        let project: Project = self.api.get_json(&url).await?;
        Ok(project.into_details())
    }

    async fn versions(
        &self,
        project_id: &str,
        kind: ContentType,
        game_version: Option<&str>,
        loader: Option<&str>,
    ) -> PackwrightResult<Vec<PackageVersion>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(game_version) = game_version {
            params.push(("game_versions", serde_json::to_string(&[game_version])?));
        }
        if let Some(loader) = loader.filter(|_| kind.uses_loader()) {
            params.push(("loaders", serde_json::to_string(&[loader.to_ascii_lowercase()])?));
        }

        let url = reqwest::Url::parse_with_params(
            &format!("{}/project/{}/version", self.base_url, project_id),
            params.iter().map(|(k, v)| (*k, v.as_str())),
        )
        .map_err(|e| PackwrightError::platform(Platform::Modrinth, format!("Bad versions URL: {}", e)))?;

        let versions: Vec<Version> = self.api.get_json(url.as_str()).await?;
        Ok(versions.into_iter().map(Version::into_version).collect())
    }

    async fn version(&self, project_id: &str, version_id: &str) -> PackwrightResult<PackageVersion> {
        let url = format!("{}/version/{}", self.base_url, version_id);
        let version: Version = self.api.get_json(&url).await.map_err(|e| match e {
            PackwrightError::PackageNotFound(_) => PackwrightError::VersionNotFound {
                package: project_id.to_string(),
                version: version_id.to_string(),
            },
            other => other,
        })?;
        Ok(version.into_version())
    }
}

fn sort_index(sort: SortKey) -> &'static str {
    match sort {
        SortKey::Relevance => "relevance",
        SortKey::Downloads => "downloads",
        SortKey::Follows => "follows",
        SortKey::Newest => "newest",
        SortKey::Updated => "updated",
    }
}

fn project_type(kind: ContentType) -> &'static str {
    match kind {
        ContentType::Mod => "mod",
        ContentType::Modpack => "modpack",
        ContentType::ResourcePack => "resourcepack",
        ContentType::ShaderPack => "shader",
    }
}

/// Facets are AND-ed across the outer array and OR-ed within each inner array
fn build_facets(kind: ContentType, filters: &SearchFilters) -> Vec<Vec<String>> {
    let mut facets = vec![vec![format!("project_type:{}", project_type(kind))]];

    if let Some(ref game_version) = filters.game_version {
        facets.push(vec![format!("versions:{}", game_version)]);
    }
    if let Some(loader) = filters.loader.as_ref().filter(|_| kind.uses_loader()) {
        facets.push(vec![format!("categories:{}", loader.to_ascii_lowercase())]);
    }
    if !filters.categories.is_empty() {
        facets.push(
            filters
                .categories
                .iter()
                .map(|c| format!("categories:{}", c.to_ascii_lowercase()))
                .collect(),
        );
    }
    if kind == ContentType::Mod {
        if let Some(side) = filters.client_side {
            facets.push(vec![format!("client_side:{}", side.as_str())]);
        }
        if let Some(side) = filters.server_side {
            facets.push(vec![format!("server_side:{}", side.as_str())]);
        }
    }

    facets
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Vec<SearchHit>,
    offset: u32,
    limit: u32,
    total_hits: u32,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    project_id: String,
    slug: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    follows: u64,
    icon_url: Option<String>,
    #[serde(default)]
    author: String,
    #[serde(default)]
    date_created: String,
    #[serde(default)]
    date_modified: String,
}

impl SearchHit {
    fn into_result(self) -> PackageSearchResult {
        PackageSearchResult {
            id: self.project_id,
            slug: self.slug,
            name: self.title,
            description: self.description,
            author: self.author,
            downloads: self.downloads,
            follows: self.follows,
            icon_url: self.icon_url.filter(|u| !u.is_empty()),
            categories: self.categories,
            platform: Platform::Modrinth,
            date_created: self.date_created,
            date_modified: self.date_modified,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Project {
    id: String,
    slug: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    followers: u64,
    icon_url: Option<String>,
    source_url: Option<String>,
    #[serde(default)]
    published: String,
    #[serde(default)]
    updated: String,
}

impl Project {
    fn into_details(self) -> PackageDetails {
        let website_url = Some(format!("https://modrinth.com/project/{}", self.slug));
        PackageDetails {
            id: self.id,
            slug: self.slug,
            name: self.title,
            description: self.description,
            body: self.body,
            author: None,
            downloads: self.downloads,
            follows: self.followers,
            icon_url: self.icon_url,
            categories: self.categories,
            platform: Platform::Modrinth,
            website_url,
            source_url: self.source_url,
            date_created: self.published,
            date_modified: self.updated,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Version {
    id: String,
    project_id: String,
    #[serde(default)]
    name: String,
    version_number: String,
    #[serde(default)]
    game_versions: Vec<String>,
    #[serde(default)]
    loaders: Vec<String>,
    #[serde(default)]
    files: Vec<VersionFile>,
    #[serde(default)]
    dependencies: Vec<VersionDependency>,
    #[serde(default)]
    date_published: String,
    #[serde(default)]
    version_type: String,
}

#[derive(Debug, Deserialize)]
struct VersionFile {
    url: String,
    filename: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    hashes: VersionHashes,
}

#[derive(Debug, Default, Deserialize)]
struct VersionHashes {
    sha1: Option<String>,
    sha512: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionDependency {
    version_id: Option<String>,
    project_id: Option<String>,
    dependency_type: String,
}

impl Version {
    fn into_version(self) -> PackageVersion {
        PackageVersion {
            id: self.id,
            project_id: self.project_id,
            name: self.name,
            version_number: self.version_number,
            game_versions: self.game_versions,
            loaders: self.loaders,
            files: self
                .files
                .into_iter()
                .map(|f| PackageFile {
                    filename: f.filename,
                    url: Some(f.url).filter(|u| !u.is_empty()),
                    size: f.size,
                    primary: f.primary,
                    hashes: FileHashes {
                        sha1: f.hashes.sha1,
                        sha512: f.hashes.sha512,
                    },
                })
                .collect(),
            dependencies: self
                .dependencies
                .into_iter()
                .filter_map(|d| {
                    let dependency_type = match d.dependency_type.as_str() {
                        "required" => DependencyType::Required,
                        "optional" => DependencyType::Optional,
                        "incompatible" => DependencyType::Incompatible,
                        "embedded" => DependencyType::Embedded,
                        other => {
                            tracing::debug!("Ignoring unknown dependency type '{}'", other);
                            return None;
                        }
                    };
                    Some(Dependency {
                        project_id: d.project_id,
                        version_id: d.version_id,
                        dependency_type,
                    })
                })
                .collect(),
            date_published: self.date_published,
            version_type: self.version_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SideRequirement;

    #[test]
    fn test_facets_for_mod_search() {
        let filters = SearchFilters {
            game_version: Some("1.20.1".into()),
            loader: Some("Fabric".into()),
            categories: vec!["optimization".into(), "utility".into()],
            client_side: Some(SideRequirement::Required),
            ..Default::default()
        };

        let facets = build_facets(ContentType::Mod, &filters);
        assert_eq!(facets[0], vec!["project_type:mod"]);
        assert_eq!(facets[1], vec!["versions:1.20.1"]);
        assert_eq!(facets[2], vec!["categories:fabric"]);
        assert_eq!(facets[3], vec!["categories:optimization", "categories:utility"]);
        assert_eq!(facets[4], vec!["client_side:required"]);
    }

    #[test]
    fn test_resource_pack_facets_ignore_loader_and_sides() {
        let filters = SearchFilters {
            loader: Some("fabric".into()),
            server_side: Some(SideRequirement::Optional),
            ..Default::default()
        };
        let facets = build_facets(ContentType::ResourcePack, &filters);
        assert_eq!(facets, vec![vec!["project_type:resourcepack".to_string()]]);
    }

    #[test]
    fn test_version_conversion() {
        let json = r#"{
            "id": "ver1",
            "project_id": "AANobbMI",
            "name": "Sodium 0.5.3",
            "version_number": "mc1.20.1-0.5.3",
            "game_versions": ["1.20.1"],
            "loaders": ["fabric"],
            "files": [{
                "url": "https://cdn.modrinth.com/data/AANobbMI/versions/ver1/sodium.jar",
                "filename": "sodium.jar",
                "primary": true,
                "size": 1024,
                "hashes": {"sha1": "abc", "sha512": "def"}
            }],
            "dependencies": [
                {"version_id": null, "project_id": "P7dR8mSH", "dependency_type": "required"},
                {"version_id": null, "project_id": "x", "dependency_type": "optional"}
            ],
            "date_published": "2023-09-01T00:00:00Z",
            "version_type": "release"
        }"#;

        let version: Version = serde_json::from_str(json).unwrap();
        let version = version.into_version();
        assert_eq!(version.project_id, "AANobbMI");
        assert_eq!(version.files[0].hashes.sha1.as_deref(), Some("abc"));
        let required: Vec<_> = version.required_dependencies().collect();
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].project_id.as_deref(), Some("P7dR8mSH"));
    }

    #[test]
    fn test_search_hit_conversion_sets_platform() {
        let json = r#"{
            "project_id": "AANobbMI", "slug": "sodium", "title": "Sodium",
            "description": "Fast", "categories": ["optimization"], "downloads": 5,
            "follows": 2, "icon_url": "", "author": "jellysquid3",
            "date_created": "2020", "date_modified": "2023"
        }"#;
        let hit: SearchHit = serde_json::from_str(json).unwrap();
        let result = hit.into_result();
        assert_eq!(result.platform, Platform::Modrinth);
        assert_eq!(result.id, "AANobbMI");
        assert!(result.icon_url.is_none());
    }

    #[tokio::test]
    #[ignore = "requires network access to api.modrinth.com"]
    async fn test_live_search_sodium() {
        let client = ModrinthClient::new(&PlatformsConfig::default(), &NetworkConfig::default()).unwrap();
        let filters = SearchFilters {
            query: "sodium".into(),
            game_version: Some("1.20.1".into()),
            loader: Some("fabric".into()),
            limit: 20,
            ..Default::default()
        };
        let page = client.search(ContentType::Mod, &filters).await.unwrap();
        assert!(!page.hits.is_empty());
        assert!(page.hits.iter().all(|h| h.platform == Platform::Modrinth));
    }
}
