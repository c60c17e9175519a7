//! Content platform clients
//!
//! Each supported host implements [`PlatformClient`]; the [`PlatformAdapter`]
//! dispatches on [`Platform`] and smooths over per-platform quirks.

pub mod adapter;
pub mod curseforge;
pub mod http;
pub mod modrinth;
pub mod types;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;

use crate::core::PackwrightResult;

pub use adapter::{PlatformAdapter, SearchOutcome};
pub use curseforge::CurseForgeClient;
pub use modrinth::ModrinthClient;
pub use types::{
    ContentType, Dependency, DependencyType, FileHashes, PackageDetails, PackageFile,
    PackageSearchResult, PackageVersion, PaginatedResult, Platform, SearchFilters,
    SideRequirement, SortKey,
};

/// Search, details and version queries against one content host
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Which platform this client talks to
    fn platform(&self) -> Platform;

    /// Largest page size the platform accepts
    fn max_page_size(&self) -> u32;

    /// Whether category filters are applied server-side
    fn filters_categories(&self) -> bool;

    /// Search projects of one kind
    async fn search(
        &self,
        kind: ContentType,
        filters: &SearchFilters,
    ) -> PackwrightResult<PaginatedResult<PackageSearchResult>>;

    /// Full project details
    async fn details(&self, project_id: &str) -> PackwrightResult<PackageDetails>;

    /// Versions compatible with the given game version and loader, newest first
    async fn versions(
        &self,
        project_id: &str,
        kind: ContentType,
        game_version: Option<&str>,
        loader: Option<&str>,
    ) -> PackwrightResult<Vec<PackageVersion>>;

    /// A single version, with current download URLs
    async fn version(&self, project_id: &str, version_id: &str) -> PackwrightResult<PackageVersion>;
}
