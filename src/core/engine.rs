//! Core engine coordinating all Packwright operations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use futures::try_join;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::{Config, PackwrightError, PackwrightResult};
use crate::events::{EventBus, InstallPhase, LauncherEvent};
use crate::installer::{
    blocked, BlockedDecision, BlockedFile, CopyReport, DownloadTask, Downloader, HttpTransport,
    InstallResult, Installer, ProgressTracker, Transport,
};
use crate::instance::{Instance, InstanceStore, NewInstance};
use crate::modpack::{self, ImportResultInfo};
use crate::platform::{
    ContentType, PackageDetails, PackageVersion, Platform, PlatformAdapter, SearchFilters, SearchOutcome,
};
use crate::queue::{InstallPlan, InstallQueue, PlanItem, QueueEntry};
use crate::resolver::{DependencyResolver, SkippedDependency};
use crate::utils::sanitize_filename;

/// One item of a batch resource or shader pack install
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub resource_id: String,
    pub version_id: String,
    pub platform: Platform,
}

/// A package to add to an install queue
#[derive(Debug, Clone)]
pub struct QueueRequest {
    pub platform: Platform,
    pub kind: ContentType,
    pub project_id: String,
    /// Pick the newest compatible version when unset
    pub version_id: Option<String>,
    pub game_version: Option<String>,
    pub loader: Option<String>,
    pub with_dependencies: bool,
}

/// What adding to a queue did
#[derive(Debug, Clone, Serialize)]
pub struct QueueOutcome {
    pub package_id: String,
    pub name: String,
    pub version: String,
    /// False when the package was already queued
    pub added: bool,
    pub dependencies: Vec<String>,
    pub skipped: Vec<SkippedDependency>,
}

/// Main engine for Packwright operations
pub struct Engine {
    /// Configuration
    pub config: Config,

    /// Platform access
    pub adapter: Arc<PlatformAdapter>,

    /// Instance directories
    pub instances: InstanceStore,

    /// Event stream shared by every operation
    pub events: EventBus,

    resolver: DependencyResolver,
    installer: Installer,
    downloader: Downloader,
}

impl Engine {
    /// Create an engine from the configuration found in `dir`
    pub fn new(dir: &Path) -> PackwrightResult<Self> {
        let config = Config::load(dir)?;
        Self::from_config(config)
    }

    /// Create an engine talking to the real platforms
    pub fn from_config(config: Config) -> PackwrightResult<Self> {
        let adapter = Arc::new(PlatformAdapter::from_config(&config)?);
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.network)?);
        Self::with_services(config, adapter, transport)
    }

    /// Create an engine over explicit platform and transport implementations
    pub fn with_services(
        config: Config,
        adapter: Arc<PlatformAdapter>,
        transport: Arc<dyn Transport>,
    ) -> PackwrightResult<Self> {
        let data_dir = config.data_dir()?;
        let instances = InstanceStore::new(&data_dir);
        let events = EventBus::new();
        let retries = config.network.retries;

        let installer = Installer::new(
            adapter.clone(),
            Downloader::new(transport.clone(), retries),
            instances.clone(),
            events.clone(),
            config.network.concurrency,
        );

        Ok(Self {
            resolver: DependencyResolver::new(adapter.clone()),
            downloader: Downloader::new(transport, retries),
            installer,
            adapter,
            instances,
            events,
            config,
        })
    }

    // Search

    /// Search any content kind on one platform
    pub async fn search(&self, platform: Platform, kind: ContentType, filters: &SearchFilters) -> SearchOutcome {
        self.adapter.search(platform, kind, filters).await
    }

    pub async fn search_mods_detailed(&self, platform: Platform, filters: &SearchFilters) -> SearchOutcome {
        self.search(platform, ContentType::Mod, filters).await
    }

    pub async fn search_modpacks(&self, platform: Platform, filters: &SearchFilters) -> SearchOutcome {
        self.search(platform, ContentType::Modpack, &without_sides(filters)).await
    }

    pub async fn search_resource_packs(&self, platform: Platform, filters: &SearchFilters) -> SearchOutcome {
        self.search(platform, ContentType::ResourcePack, &without_sides(filters)).await
    }

    pub async fn search_shader_packs(&self, platform: Platform, filters: &SearchFilters) -> SearchOutcome {
        self.search(platform, ContentType::ShaderPack, &without_sides(filters)).await
    }

    // Details and versions

    pub async fn get_mod_details(&self, mod_id: &str, platform: Platform) -> PackwrightResult<PackageDetails> {
        self.adapter.details(platform, mod_id).await
    }

    pub async fn get_mod_versions(
        &self,
        mod_id: &str,
        platform: Platform,
        game_version: Option<&str>,
        loader: Option<&str>,
    ) -> PackwrightResult<Vec<PackageVersion>> {
        self.adapter
            .versions(platform, mod_id, ContentType::Mod, game_version, loader)
            .await
    }

    pub async fn get_modpack_details(&self, modpack_id: &str, platform: Platform) -> PackwrightResult<PackageDetails> {
        self.adapter.details(platform, modpack_id).await
    }

    pub async fn get_modpack_versions(
        &self,
        modpack_id: &str,
        platform: Platform,
        game_version: Option<&str>,
        loader: Option<&str>,
    ) -> PackwrightResult<Vec<PackageVersion>> {
        self.adapter
            .versions(platform, modpack_id, ContentType::Modpack, game_version, loader)
            .await
    }

    pub async fn get_resource_pack_details(&self, pack_id: &str, platform: Platform) -> PackwrightResult<PackageDetails> {
        self.adapter.details(platform, pack_id).await
    }

    pub async fn get_resource_pack_versions(
        &self,
        pack_id: &str,
        platform: Platform,
        game_version: Option<&str>,
    ) -> PackwrightResult<Vec<PackageVersion>> {
        self.adapter
            .versions(platform, pack_id, ContentType::ResourcePack, game_version, None)
            .await
    }

    pub async fn get_shader_pack_details(&self, pack_id: &str, platform: Platform) -> PackwrightResult<PackageDetails> {
        self.adapter.details(platform, pack_id).await
    }

    pub async fn get_shader_pack_versions(
        &self,
        pack_id: &str,
        platform: Platform,
        game_version: Option<&str>,
    ) -> PackwrightResult<Vec<PackageVersion>> {
        self.adapter
            .versions(platform, pack_id, ContentType::ShaderPack, game_version, None)
            .await
    }

    // Queue

    /// Resolve a package version, and optionally its required dependencies,
    /// then add it to `queue`. Dependency failures are reported, not raised.
    pub async fn add_to_queue(&self, queue: &InstallQueue, request: &QueueRequest) -> PackwrightResult<QueueOutcome> {
        let details = self.adapter.details(request.platform, &request.project_id).await?;
        let version = match request.version_id {
            Some(ref version_id) => {
                self.adapter
                    .version(request.platform, &request.project_id, version_id)
                    .await?
            }
            None => self.latest_version(request).await?,
        };
        version.ensure_installable()?;

        let mut entry = QueueEntry::new(&details.name, request.platform, request.kind, version);
        let mut skipped = Vec::new();
        if request.with_dependencies {
            let resolved = self
                .resolver
                .resolve_required_dependencies(
                    &entry.chosen_version,
                    request.game_version.as_deref(),
                    request.loader.as_deref(),
                    request.platform,
                    request.kind,
                    &queue.queued_ids(),
                )
                .await;
            entry.dependencies = resolved.entries;
            skipped = resolved.skipped;
        }

        let outcome = QueueOutcome {
            package_id: entry.package_id.clone(),
            name: entry.name.clone(),
            version: entry.chosen_version.version_number.clone(),
            added: false,
            dependencies: entry.dependencies.iter().map(|d| d.name.clone()).collect(),
            skipped,
        };
        let added = queue.add(entry)?;
        Ok(QueueOutcome { added, ..outcome })
    }

    /// Newest version of the requested package that has files and matches
    /// its game version and, for loader-bound kinds, its loader
    pub async fn latest_version(&self, request: &QueueRequest) -> PackwrightResult<PackageVersion> {
        let loader = if request.kind.uses_loader() {
            request.loader.as_deref()
        } else {
            None
        };
        self.adapter
            .versions(
                request.platform,
                &request.project_id,
                request.kind,
                request.game_version.as_deref(),
                loader,
            )
            .await?
            .into_iter()
            .find(|v| !v.files.is_empty())
            .ok_or_else(|| PackwrightError::VersionNotFound {
                package: request.project_id.clone(),
                version: request.game_version.clone().unwrap_or_else(|| "latest".to_string()),
            })
    }

    /// Flatten and install a queue. The queue is consumed unless the
    /// install fails, so the caller can retry.
    pub async fn install_queue(
        &self,
        instance_id: &str,
        queue: &InstallQueue,
        cancel: &CancellationToken,
    ) -> PackwrightResult<InstallResult> {
        let plan = queue.flatten();
        let result = self.installer.install(instance_id, &plan, cancel).await?;
        queue.clear();
        Ok(result)
    }

    // Downloads

    /// Install one version of one mod
    pub async fn download_mod_version(
        &self,
        instance_id: &str,
        mod_id: &str,
        version_id: &str,
        platform: Platform,
        cancel: &CancellationToken,
    ) -> PackwrightResult<InstallResult> {
        let version = self.adapter.version(platform, mod_id, version_id).await?;
        version.ensure_installable()?;

        let mut plan = InstallPlan::new();
        plan.push(PlanItem::from_version(&version, platform, ContentType::Mod, &version.name));
        self.installer.install(instance_id, &plan, cancel).await
    }

    pub async fn download_resource_packs_batch(
        &self,
        instance_id: &str,
        resources: &[BatchItem],
        cancel: &CancellationToken,
    ) -> PackwrightResult<InstallResult> {
        self.download_batch(instance_id, ContentType::ResourcePack, resources, cancel)
            .await
    }

    pub async fn download_shader_packs_batch(
        &self,
        instance_id: &str,
        shaders: &[BatchItem],
        cancel: &CancellationToken,
    ) -> PackwrightResult<InstallResult> {
        self.download_batch(instance_id, ContentType::ShaderPack, shaders, cancel)
            .await
    }

    /// Batch items are resolved by the installer just in time, in parallel
    async fn download_batch(
        &self,
        instance_id: &str,
        kind: ContentType,
        items: &[BatchItem],
        cancel: &CancellationToken,
    ) -> PackwrightResult<InstallResult> {
        let mut plan = InstallPlan::new();
        for item in items {
            plan.push(PlanItem::unresolved(&item.resource_id, &item.version_id, item.platform, kind));
        }
        self.installer.install(instance_id, &plan, cancel).await
    }

    // Modpacks

    /// Import a modpack archive from an http(s) URL, a `file://` URL or a
    /// local path into a new instance
    pub async fn import_instance_from_url(
        &self,
        source: &str,
        name_override: Option<&str>,
        icon_url: Option<&str>,
        cancel: &CancellationToken,
    ) -> PackwrightResult<ImportResultInfo> {
        let scratch = tempfile::tempdir()?;
        let archive = self.fetch_archive(source, scratch.path(), cancel).await?;

        let archive_path = archive.clone();
        let import = tokio::task::spawn_blocking(move || modpack::read_archive(&archive_path)).await??;

        let name = name_override
            .map(str::to_string)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| import.name.clone());
        let instance = self.create_instance(NewInstance {
            name,
            minecraft_version: import.minecraft_version.clone(),
            loader: import.loader,
            loader_version: import.loader_version.clone(),
            icon_url: icon_url.map(str::to_string),
        })?;

        let instance_dir = self.instances.dir(&instance.id)?;
        let prefixes = import.override_prefixes.clone();
        let extracted =
            tokio::task::spawn_blocking(move || modpack::extract_overrides(&archive, &instance_dir, &prefixes)).await??;
        tracing::info!(
            "Imported {} ({} files, {} overrides)",
            instance.name,
            import.plan.len(),
            extracted
        );

        if import.plan.is_empty() {
            let mut result = InstallResult::for_instance(&instance);
            result.warnings = import.plan.warnings;
            return Ok(result);
        }
        self.installer.install(&instance.id, &import.plan, cancel).await
    }

    /// Import one version of a modpack found through search
    pub async fn install_modpack_version(
        &self,
        platform: Platform,
        modpack_id: &str,
        version_id: &str,
        name_override: Option<&str>,
        cancel: &CancellationToken,
    ) -> PackwrightResult<ImportResultInfo> {
        let (details, version) = try_join!(
            self.adapter.details(platform, modpack_id),
            self.adapter.version(platform, modpack_id, version_id)
        )?;
        version.ensure_installable()?;

        let url = version
            .primary_file()
            .and_then(|f| f.url.clone())
            .ok_or_else(|| PackwrightError::ModpackUnavailable(details.name.clone()))?;
        let name = name_override.unwrap_or(&details.name);
        self.import_instance_from_url(&url, Some(name), details.icon_url.as_deref(), cancel)
            .await
    }

    async fn fetch_archive(&self, source: &str, scratch: &Path, cancel: &CancellationToken) -> PackwrightResult<PathBuf> {
        match url::Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                let filename = url
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .filter(|s| !s.is_empty())
                    .map(sanitize_filename)
                    .unwrap_or_else(|| "modpack.zip".to_string());
                let task = DownloadTask {
                    url: source.to_string(),
                    destination: scratch.join(&filename),
                    label: filename,
                    hashes: Default::default(),
                };

                let progress = ProgressTracker::new(self.events.clone());
                progress.set_phase(InstallPhase::Preparing, 1);
                progress.start_file(&task.label);
                self.downloader.download(&task, &progress, cancel).await?;
                Ok(task.destination)
            }
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map_err(|_| PackwrightError::modpack(format!("invalid file URL {}", source))),
            _ => {
                let path = PathBuf::from(source);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(PackwrightError::modpack(format!("{} is not a file or URL", source)))
                }
            }
        }
    }

    // Blocked files

    /// Match blocked files against a local folder, by default the
    /// configured downloads folder. Without a folder to look in every file
    /// comes back unmatched.
    pub async fn resolve_blocked_files(
        &self,
        blocked_files: Vec<BlockedFile>,
        folder: Option<&Path>,
    ) -> PackwrightResult<Vec<BlockedFile>> {
        let folder = match folder {
            Some(folder) => folder.to_path_buf(),
            None => match self.config.blocked_downloads_dir() {
                Some(folder) => folder,
                None => {
                    tracing::warn!("No downloads folder configured; blocked files left unmatched");
                    return Ok(blocked::all_unmatched(blocked_files));
                }
            },
        };
        Ok(tokio::task::spawn_blocking(move || blocked::resolve_blocked_files(blocked_files, &folder)).await?)
    }

    /// Copy matched blocked files into an instance
    pub async fn copy_blocked_mods_to_instance(
        &self,
        blocked_mods: &[BlockedFile],
        instance_id: &str,
    ) -> PackwrightResult<CopyReport> {
        self.finalize_blocked(instance_id, blocked_mods, BlockedDecision::Continue)
            .await
    }

    /// Close an install after the user decided what to do with blocked files
    pub async fn finalize_blocked(
        &self,
        instance_id: &str,
        resolved: &[BlockedFile],
        decision: BlockedDecision,
    ) -> PackwrightResult<CopyReport> {
        self.installer.finalize_blocked(instance_id, resolved, decision).await
    }

    // Instances

    /// Create an instance and announce it
    pub fn create_instance(&self, new: NewInstance) -> PackwrightResult<Instance> {
        let instance = self.instances.create(new)?;
        self.events.emit(LauncherEvent::InstancesChanged {});
        Ok(instance)
    }

    pub fn list_instances(&self) -> PackwrightResult<Vec<Instance>> {
        self.instances.list()
    }

    pub fn get_instance(&self, id: &str) -> PackwrightResult<Instance> {
        self.instances.get(id)
    }
}

/// Side filters only apply to mods
fn without_sides(filters: &SearchFilters) -> SearchFilters {
    SearchFilters {
        client_side: None,
        server_side: None,
        ..filters.clone()
    }
}
