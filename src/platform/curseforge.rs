//! CurseForge API v1 client

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::core::config::{NetworkConfig, PlatformsConfig};
use crate::core::{PackwrightError, PackwrightResult};
use crate::platform::http::ApiClient;
use crate::platform::{
    ContentType, Dependency, DependencyType, FileHashes, PackageDetails, PackageFile,
    PackageSearchResult, PackageVersion, PaginatedResult, Platform, PlatformClient,
    SearchFilters, SortKey,
};

/// CurseForge game id for Minecraft
const MINECRAFT_GAME_ID: u32 = 432;

/// CurseForge rejects searches where index + pageSize exceeds this
const MAX_SEARCH_WINDOW: u32 = 10_000;

/// Loader names CurseForge mixes into a file's `gameVersions`
const KNOWN_LOADERS: &[&str] = &["forge", "fabric", "quilt", "neoforge", "liteloader", "cauldron"];

/// CurseForge client
pub struct CurseForgeClient {
    api: Option<ApiClient>,
    base_url: String,
    max_page_size: u32,
}

impl CurseForgeClient {
    /// Create a new CurseForge client. Without an API key every call fails
    /// with a platform error instead of an HTTP 403.
    pub fn new(platforms: &PlatformsConfig, network: &NetworkConfig) -> PackwrightResult<Self> {
        let api = match platforms.curseforge_api_key.as_deref() {
            Some(key) => {
                let mut headers = HeaderMap::new();
                let value = HeaderValue::from_str(key)
                    .map_err(|_| PackwrightError::config("Invalid CurseForge API key format"))?;
                headers.insert("x-api-key", value);
                Some(ApiClient::new(Platform::CurseForge, network, headers)?)
            }
            None => None,
        };

        Ok(Self {
            api,
            base_url: platforms.curseforge_url.trim_end_matches('/').to_string(),
            max_page_size: platforms.curseforge_page_size_max,
        })
    }

    fn api(&self) -> PackwrightResult<&ApiClient> {
        self.api.as_ref().ok_or_else(|| {
            PackwrightError::platform(
                Platform::CurseForge,
                "no API key configured (set PACKWRIGHT_CURSEFORGE_API_KEY)",
            )
        })
    }

    fn parse_id(id: &str) -> PackwrightResult<u64> {
        id.trim()
            .parse()
            .map_err(|_| PackwrightError::platform(Platform::CurseForge, format!("'{}' is not a numeric id", id)))
    }
}

#[async_trait]
impl PlatformClient for CurseForgeClient {
    fn platform(&self) -> Platform {
        Platform::CurseForge
    }

    fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    // Category filters take numeric ids that differ per class, so they are
    // matched against category slugs after the fact.
    fn filters_categories(&self) -> bool {
        false
    }

    async fn search(
        &self,
        kind: ContentType,
        filters: &SearchFilters,
    ) -> PackwrightResult<PaginatedResult<PackageSearchResult>> {
        let api = self.api()?;

        let page_size = filters.limit.min(MAX_SEARCH_WINDOW.saturating_sub(filters.offset));
        if page_size == 0 {
            return Ok(PaginatedResult::empty(filters.offset, filters.limit));
        }

        let mut params = vec![
            ("gameId", MINECRAFT_GAME_ID.to_string()),
            ("classId", class_id(kind).to_string()),
            ("searchFilter", filters.query.clone()),
            ("pageSize", page_size.to_string()),
            ("index", filters.offset.to_string()),
            ("sortField", sort_field(filters.sort).to_string()),
            ("sortOrder", "desc".to_string()),
        ];
        if let Some(ref game_version) = filters.game_version {
            params.push(("gameVersion", game_version.clone()));
        }
        if let Some(loader_id) = filters
            .loader
            .as_deref()
            .filter(|_| kind.uses_loader())
            .and_then(loader_type)
        {
            params.push(("modLoaderType", loader_id.to_string()));
        }

        let url = reqwest::Url::parse_with_params(
            &format!("{}/mods/search", self.base_url),
            params.iter().map(|(k, v)| (*k, v.as_str())),
        )
        .map_err(|e| PackwrightError::platform(Platform::CurseForge, format!("Bad search URL: {}", e)))?;

        tracing::debug!("CurseForge search: {}", url);
        let response: SearchResponse = api.get_json(url.as_str()).await?;

        Ok(PaginatedResult {
            hits: response.data.into_iter().map(Mod::into_result).collect(),
            total_hits: response.pagination.total_count,
            offset: response.pagination.index,
            limit: response.pagination.page_size,
        })
    }

    async fn details(&self, project_id: &str) -> PackwrightResult<PackageDetails> {
        let api = self.api()?;
        let id = Self::parse_id(project_id)?;

        let url = format!("{}/mods/{}", self.base_url, id);
        let project: Envelope<Mod> = api.get_json(&url).await?;

        // The description lives behind its own endpoint; a failure there is cosmetic
        let body = match api
            .get_json::<Envelope<String>>(&format!("{}/mods/{}/description", self.base_url, id))
            .await
        {
            Ok(description) => description.data,
            Err(e) => {
                tracing::debug!("No description for CurseForge project {}: {}", id, e);
                String::new()
            }
        };

        Ok(project.data.into_details(body))
    }

    async fn versions(
        &self,
        project_id: &str,
        kind: ContentType,
        game_version: Option<&str>,
        loader: Option<&str>,
    ) -> PackwrightResult<Vec<PackageVersion>> {
        let api = self.api()?;
        let id = Self::parse_id(project_id)?;

        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(game_version) = game_version {
            params.push(("gameVersion", game_version.to_string()));
        }
        if let Some(loader_id) = loader.filter(|_| kind.uses_loader()).and_then(loader_type) {
            params.push(("modLoaderType", loader_id.to_string()));
        }

        let url = reqwest::Url::parse_with_params(
            &format!("{}/mods/{}/files", self.base_url, id),
            params.iter().map(|(k, v)| (*k, v.as_str())),
        )
        .map_err(|e| PackwrightError::platform(Platform::CurseForge, format!("Bad files URL: {}", e)))?;

        let files: Envelope<Vec<File>> = api.get_json(url.as_str()).await?;
        Ok(files.data.into_iter().map(|f| f.into_version(id)).collect())
    }

    async fn version(&self, project_id: &str, version_id: &str) -> PackwrightResult<PackageVersion> {
        let api = self.api()?;
        let id = Self::parse_id(project_id)?;
        let file_id = Self::parse_id(version_id)?;

        let url = format!("{}/mods/{}/files/{}", self.base_url, id, file_id);
        let file: Envelope<File> = api.get_json(&url).await.map_err(|e| match e {
            PackwrightError::PackageNotFound(_) => PackwrightError::VersionNotFound {
                package: project_id.to_string(),
                version: version_id.to_string(),
            },
            other => other,
        })?;
        Ok(file.data.into_version(id))
    }
}

fn class_id(kind: ContentType) -> u32 {
    match kind {
        ContentType::Mod => 6,
        ContentType::Modpack => 4471,
        ContentType::ResourcePack => 12,
        ContentType::ShaderPack => 6552,
    }
}

fn sort_field(sort: SortKey) -> u32 {
    match sort {
        SortKey::Relevance => 1,
        SortKey::Follows => 2,
        SortKey::Updated => 3,
        SortKey::Downloads => 6,
        SortKey::Newest => 11,
    }
}

fn loader_type(loader: &str) -> Option<u32> {
    match loader.to_ascii_lowercase().as_str() {
        "forge" => Some(1),
        "fabric" => Some(4),
        "quilt" => Some(5),
        "neoforge" => Some(6),
        _ => None,
    }
}

fn dependency_type(relation: u32) -> Option<DependencyType> {
    match relation {
        1 | 6 => Some(DependencyType::Embedded),
        2 | 4 => Some(DependencyType::Optional),
        3 => Some(DependencyType::Required),
        5 => Some(DependencyType::Incompatible),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<Mod>,
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    index: u32,
    page_size: u32,
    total_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Mod {
    id: u64,
    name: String,
    slug: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    download_count: u64,
    #[serde(default)]
    thumbs_up_count: u64,
    logo: Option<Logo>,
    #[serde(default)]
    authors: Vec<Author>,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    date_created: String,
    #[serde(default)]
    date_modified: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Logo {
    #[serde(default)]
    url: String,
    #[serde(default)]
    thumbnail_url: String,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Category {
    slug: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Links {
    website_url: Option<String>,
    source_url: Option<String>,
}

impl Mod {
    fn author(&self) -> Option<String> {
        self.authors.first().map(|a| a.name.clone())
    }

    fn into_result(self) -> PackageSearchResult {
        PackageSearchResult {
            author: self.author().unwrap_or_default(),
            id: self.id.to_string(),
            slug: self.slug,
            name: self.name,
            description: self.summary,
            downloads: self.download_count,
            follows: self.thumbs_up_count,
            icon_url: self.logo.map(|l| l.thumbnail_url),
            categories: self.categories.into_iter().map(|c| c.slug).collect(),
            platform: Platform::CurseForge,
            date_created: self.date_created,
            date_modified: self.date_modified,
        }
    }

    fn into_details(self, body: String) -> PackageDetails {
        PackageDetails {
            author: self.author(),
            id: self.id.to_string(),
            slug: self.slug,
            name: self.name,
            description: self.summary,
            body,
            downloads: self.download_count,
            follows: self.thumbs_up_count,
            icon_url: self.logo.map(|l| l.url),
            categories: self.categories.into_iter().map(|c| c.slug).collect(),
            platform: Platform::CurseForge,
            website_url: self.links.website_url,
            source_url: self.links.source_url,
            date_created: self.date_created,
            date_modified: self.date_modified,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct File {
    id: u64,
    #[serde(default)]
    display_name: String,
    file_name: String,
    #[serde(default)]
    file_date: String,
    #[serde(default)]
    file_length: u64,
    download_url: Option<String>,
    #[serde(default)]
    game_versions: Vec<String>,
    #[serde(default)]
    dependencies: Vec<FileDependency>,
    #[serde(default)]
    hashes: Vec<FileHash>,
    #[serde(default = "default_release_type")]
    release_type: u8,
}

fn default_release_type() -> u8 {
    1
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileDependency {
    mod_id: u64,
    relation_type: u32,
}

#[derive(Debug, Deserialize, Serialize)]
struct FileHash {
    value: String,
    /// 1 = SHA1, 2 = MD5
    algo: u32,
}

impl File {
    fn into_version(self, project_id: u64) -> PackageVersion {
        let (loaders, game_versions): (Vec<String>, Vec<String>) = self
            .game_versions
            .into_iter()
            .partition(|v| KNOWN_LOADERS.contains(&v.to_ascii_lowercase().as_str()));

        let sha1 = self.hashes.iter().find(|h| h.algo == 1).map(|h| h.value.clone());

        PackageVersion {
            id: self.id.to_string(),
            project_id: project_id.to_string(),
            name: self.display_name.clone(),
            version_number: self.display_name,
            game_versions: game_versions
                .into_iter()
                .filter(|v| v.starts_with(|c: char| c.is_ascii_digit()))
                .collect(),
            loaders: loaders.into_iter().map(|l| l.to_ascii_lowercase()).collect(),
            files: vec![PackageFile {
                filename: self.file_name,
                url: self.download_url.filter(|u| !u.is_empty()),
                size: self.file_length,
                primary: true,
                hashes: FileHashes { sha1, sha512: None },
            }],
            dependencies: self
                .dependencies
                .into_iter()
                .filter_map(|d| {
                    dependency_type(d.relation_type).map(|dependency_type| Dependency {
                        project_id: Some(d.mod_id.to_string()),
                        version_id: None,
                        dependency_type,
                    })
                })
                .collect(),
            date_published: self.file_date,
            version_type: match self.release_type {
                2 => "beta",
                3 => "alpha",
                _ => "release",
            }
            .to_string(),
        }
    }
}
