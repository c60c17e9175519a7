//! In-memory platform used by unit tests

use std::collections::HashMap;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{PackwrightError, PackwrightResult};
use crate::platform::{
    ContentType, Dependency, DependencyType, FileHashes, PackageDetails, PackageFile,
    PackageSearchResult, PackageVersion, PaginatedResult, Platform, PlatformClient,
    SearchFilters,
};

/// Scriptable [`PlatformClient`]
pub struct FakePlatform {
    platform: Platform,
    hits: Vec<PackageSearchResult>,
    versions: HashMap<String, Vec<PackageVersion>>,
    search_error: Option<String>,
    last_limit: Mutex<Option<u32>>,
    version_calls: Mutex<Vec<String>>,
}

impl FakePlatform {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            hits: Vec::new(),
            versions: HashMap::new(),
            search_error: None,
            last_limit: Mutex::new(None),
            version_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_hit(mut self, hit: PackageSearchResult) -> Self {
        self.hits.push(hit);
        self
    }

    /// Register a version; versions of a project are returned in insertion order
    pub fn with_version(mut self, version: PackageVersion) -> Self {
        self.versions
            .entry(version.project_id.clone())
            .or_default()
            .push(version);
        self
    }

    pub fn failing_search(mut self, message: &str) -> Self {
        self.search_error = Some(message.to_string());
        self
    }

    /// Page size requested by the most recent search
    pub fn last_limit(&self) -> Option<u32> {
        *self.last_limit.lock()
    }

    /// Project ids passed to `versions`, in call order
    pub fn version_calls(&self) -> Vec<String> {
        self.version_calls.lock().clone()
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn max_page_size(&self) -> u32 {
        match self.platform {
            Platform::Modrinth => 100,
            Platform::CurseForge => 50,
        }
    }

    fn filters_categories(&self) -> bool {
        self.platform == Platform::Modrinth
    }

    async fn search(
        &self,
        _kind: ContentType,
        filters: &SearchFilters,
    ) -> PackwrightResult<PaginatedResult<PackageSearchResult>> {
        *self.last_limit.lock() = Some(filters.limit);
        if let Some(ref message) = self.search_error {
            return Err(PackwrightError::platform(self.platform, message.clone()));
        }
        Ok(PaginatedResult {
            hits: self.hits.clone(),
            total_hits: self.hits.len() as u32,
            offset: filters.offset,
            limit: filters.limit,
        })
    }

    async fn details(&self, project_id: &str) -> PackwrightResult<PackageDetails> {
        let hit = self
            .hits
            .iter()
            .find(|h| h.id == project_id)
            .ok_or_else(|| PackwrightError::PackageNotFound(project_id.to_string()))?;
        Ok(PackageDetails {
            id: hit.id.clone(),
            slug: hit.slug.clone(),
            name: hit.name.clone(),
            description: hit.description.clone(),
            body: String::new(),
            author: Some(hit.author.clone()),
            downloads: hit.downloads,
            follows: hit.follows,
            icon_url: None,
            categories: hit.categories.clone(),
            platform: self.platform,
            website_url: None,
            source_url: None,
            date_created: String::new(),
            date_modified: String::new(),
        })
    }

    async fn versions(
        &self,
        project_id: &str,
        _kind: ContentType,
        game_version: Option<&str>,
        loader: Option<&str>,
    ) -> PackwrightResult<Vec<PackageVersion>> {
        self.version_calls.lock().push(project_id.to_string());
        let versions = self
            .versions
            .get(project_id)
            .ok_or_else(|| PackwrightError::PackageNotFound(project_id.to_string()))?;
        Ok(versions
            .iter()
            .filter(|v| game_version.map_or(true, |g| v.game_versions.iter().any(|x| x == g)))
            .filter(|v| loader.map_or(true, |l| v.loaders.iter().any(|x| x == l)))
            .cloned()
            .collect())
    }

    async fn version(&self, project_id: &str, version_id: &str) -> PackwrightResult<PackageVersion> {
        self.versions
            .values()
            .flatten()
            .find(|v| v.id == version_id && (project_id.is_empty() || v.project_id == project_id))
            .cloned()
            .ok_or_else(|| PackwrightError::VersionNotFound {
                package: project_id.to_string(),
                version: version_id.to_string(),
            })
    }
}

/// A search hit with the given categories
pub fn hit(id: &str, categories: &[&str]) -> PackageSearchResult {
    PackageSearchResult {
        id: id.to_string(),
        slug: format!("project-{}", id),
        name: format!("Project {}", id),
        description: String::new(),
        author: "tester".to_string(),
        downloads: 0,
        follows: 0,
        icon_url: None,
        categories: categories.iter().map(|c| c.to_string()).collect(),
        platform: Platform::Modrinth,
        date_created: String::new(),
        date_modified: String::new(),
    }
}

/// A fabric 1.20.1 version with one downloadable file and the given required dependencies
pub fn version(project_id: &str, version_id: &str, required: &[&str]) -> PackageVersion {
    PackageVersion {
        id: version_id.to_string(),
        project_id: project_id.to_string(),
        name: format!("{} {}", project_id, version_id),
        version_number: version_id.to_string(),
        game_versions: vec!["1.20.1".to_string()],
        loaders: vec!["fabric".to_string()],
        files: vec![file(&format!("{}-{}.jar", project_id, version_id))],
        dependencies: required
            .iter()
            .map(|id| Dependency {
                project_id: Some(id.to_string()),
                version_id: None,
                dependency_type: DependencyType::Required,
            })
            .collect(),
        date_published: String::new(),
        version_type: "release".to_string(),
    }
}

/// A downloadable primary file
pub fn file(filename: &str) -> PackageFile {
    PackageFile {
        filename: filename.to_string(),
        url: Some(format!("https://cdn.test/{}", filename)),
        size: 0,
        primary: true,
        hashes: FileHashes::default(),
    }
}
