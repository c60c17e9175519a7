//! Platform-neutral package types

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::core::{PackwrightError, PackwrightResult};

/// Supported content hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Primary, metadata-rich platform
    Modrinth,
    /// Secondary platform with looser project/version semantics
    #[serde(rename = "curseforge")]
    CurseForge,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Modrinth => "modrinth",
            Platform::CurseForge => "curseforge",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PackwrightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "modrinth" | "mr" => Ok(Platform::Modrinth),
            "curseforge" | "cf" => Ok(Platform::CurseForge),
            other => Err(PackwrightError::other(format!("Unknown platform: {}", other))),
        }
    }
}

/// Kind of package, which decides the instance subfolder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Mod,
    Modpack,
    #[serde(rename = "resourcepack")]
    ResourcePack,
    #[serde(rename = "shader")]
    ShaderPack,
}

impl ContentType {
    /// Instance subfolder receiving files of this kind
    pub fn subfolder(&self) -> &'static str {
        match self {
            ContentType::Mod | ContentType::Modpack => "mods",
            ContentType::ResourcePack => "resourcepacks",
            ContentType::ShaderPack => "shaderpacks",
        }
    }

    /// Key the search response uses for its hit list
    pub fn results_key(&self) -> &'static str {
        match self {
            ContentType::Mod => "mods",
            ContentType::Modpack => "modpacks",
            ContentType::ResourcePack | ContentType::ShaderPack => "resources",
        }
    }

    /// Whether versions of this kind are filtered by mod loader
    pub fn uses_loader(&self) -> bool {
        matches!(self, ContentType::Mod | ContentType::Modpack)
    }

    /// Guess the kind of a file listed in a modpack manifest from its name
    pub fn infer_from_filename(filename: &str) -> Self {
        if filename.to_ascii_lowercase().ends_with(".zip") {
            ContentType::ResourcePack
        } else {
            ContentType::Mod
        }
    }
}

impl FromStr for ContentType {
    type Err = PackwrightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mod" | "mods" => Ok(ContentType::Mod),
            "modpack" | "modpacks" => Ok(ContentType::Modpack),
            "resourcepack" | "resourcepacks" | "resource" => Ok(ContentType::ResourcePack),
            "shader" | "shaders" | "shaderpack" | "shaderpacks" => Ok(ContentType::ShaderPack),
            other => Err(PackwrightError::other(format!("Unknown content type: {}", other))),
        }
    }
}

/// Search ordering passed through to the platform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Relevance,
    Downloads,
    Follows,
    Newest,
    Updated,
}

impl FromStr for SortKey {
    type Err = PackwrightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relevance" => Ok(SortKey::Relevance),
            "downloads" => Ok(SortKey::Downloads),
            "follows" => Ok(SortKey::Follows),
            "newest" => Ok(SortKey::Newest),
            "updated" => Ok(SortKey::Updated),
            other => Err(PackwrightError::other(format!("Unknown sort key: {}", other))),
        }
    }
}

/// Client/server side requirement filter (mods only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SideRequirement {
    Required,
    Optional,
    Unsupported,
}

impl SideRequirement {
    pub fn as_str(&self) -> &'static str {
        match self {
            SideRequirement::Required => "required",
            SideRequirement::Optional => "optional",
            SideRequirement::Unsupported => "unsupported",
        }
    }
}

impl FromStr for SideRequirement {
    type Err = PackwrightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "required" => Ok(SideRequirement::Required),
            "optional" => Ok(SideRequirement::Optional),
            "unsupported" => Ok(SideRequirement::Unsupported),
            other => Err(PackwrightError::other(format!("Unknown side requirement: {}", other))),
        }
    }
}

/// Search query and filters
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub query: String,
    pub game_version: Option<String>,
    pub loader: Option<String>,
    pub sort: SortKey,
    /// Match results carrying at least one of these categories
    pub categories: Vec<String>,
    pub offset: u32,
    pub limit: u32,
    pub client_side: Option<SideRequirement>,
    pub server_side: Option<SideRequirement>,
}

/// One page of platform results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub hits: Vec<T>,
    pub total_hits: u32,
    pub offset: u32,
    pub limit: u32,
}

impl<T> PaginatedResult<T> {
    pub fn empty(offset: u32, limit: u32) -> Self {
        Self {
            hits: Vec::new(),
            total_hits: 0,
            offset,
            limit,
        }
    }
}

/// One entry from a platform search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSearchResult {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub author: String,
    pub downloads: u64,
    pub follows: u64,
    pub icon_url: Option<String>,
    pub categories: Vec<String>,
    pub platform: Platform,
    pub date_created: String,
    pub date_modified: String,
}

impl PackageSearchResult {
    /// Whether the result carries at least one of the given categories
    pub fn has_any_category(&self, wanted: &[String]) -> bool {
        self.categories
            .iter()
            .any(|c| wanted.iter().any(|w| w.eq_ignore_ascii_case(c)))
    }
}

/// Full project information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDetails {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    /// Long-form description (markdown or HTML)
    pub body: String,
    pub author: Option<String>,
    pub downloads: u64,
    pub follows: u64,
    pub icon_url: Option<String>,
    pub categories: Vec<String>,
    pub platform: Platform,
    pub website_url: Option<String>,
    pub source_url: Option<String>,
    pub date_created: String,
    pub date_modified: String,
}

/// How a version relates to another project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    Required,
    Optional,
    Incompatible,
    Embedded,
}

/// A dependency declared by a version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Depended-upon project; some Modrinth entries only name a version
    pub project_id: Option<String>,
    pub version_id: Option<String>,
    pub dependency_type: DependencyType,
}

/// Digests published for a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHashes {
    pub sha1: Option<String>,
    pub sha512: Option<String>,
}

/// A file attached to a version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageFile {
    pub filename: String,
    /// None when the platform forbids programmatic download
    pub url: Option<String>,
    pub size: u64,
    pub primary: bool,
    #[serde(default)]
    pub hashes: FileHashes,
}

/// One downloadable release of a package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageVersion {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub version_number: String,
    pub game_versions: Vec<String>,
    pub loaders: Vec<String>,
    pub files: Vec<PackageFile>,
    pub dependencies: Vec<Dependency>,
    pub date_published: String,
    pub version_type: String,
}

impl PackageVersion {
    /// The file to install: first primary, else first file
    pub fn primary_file(&self) -> Option<&PackageFile> {
        self.files
            .iter()
            .find(|f| f.primary)
            .or_else(|| self.files.first())
    }

    /// Reject versions that cannot be installed
    pub fn ensure_installable(&self) -> PackwrightResult<()> {
        if self.files.is_empty() {
            return Err(PackwrightError::NoFiles {
                package: self.project_id.clone(),
                version: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Dependencies that must be installed alongside this version
    pub fn required_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies
            .iter()
            .filter(|d| d.dependency_type == DependencyType::Required)
    }
}
