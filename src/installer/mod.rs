//! Download and install orchestrator
//!
//! Runs an install plan against one instance in three phases: preparing,
//! resolving (just-in-time download URLs) and downloading (bounded
//! parallelism). Blocked files are collected, not fatal. The first hard
//! download failure stops scheduling and is returned; files already written
//! stay in place.

pub mod blocked;
pub mod downloader;
pub mod integrity;
pub mod progress;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::{PackwrightError, PackwrightResult};
use crate::events::{EventBus, InstallPhase, LauncherEvent};
use crate::instance::{Instance, InstanceStore};
use crate::platform::{ContentType, PackageFile, Platform, PlatformAdapter};
use crate::queue::{InstallPlan, PlanItem};
use crate::utils::{is_safe_path, sanitize_filename};

pub use blocked::{BlockedDecision, BlockedFile, CopyReport};
pub use downloader::{DownloadStatus, DownloadTask, Downloader, HttpTransport, Transport};
pub use progress::ProgressTracker;

/// Result of an installation
#[derive(Debug, Clone, Serialize)]
pub struct InstallResult {
    pub instance_id: String,
    pub name: String,
    pub minecraft_version: String,
    pub mod_loader_type: Option<String>,
    pub mod_loader_version: Option<String>,
    /// Files scheduled for transfer, blocked files excluded
    pub files_to_download: usize,
    pub warnings: Vec<String>,
    pub blocked_files: Vec<BlockedFile>,
    /// Files now present, fetched or already up to date
    pub downloaded: usize,
    pub bytes_downloaded: u64,
    /// The install was aborted before every file was scheduled
    pub cancelled: bool,
}

impl InstallResult {
    /// Empty result describing an instance
    pub fn for_instance(instance: &Instance) -> Self {
        Self {
            instance_id: instance.id.clone(),
            name: instance.name.clone(),
            minecraft_version: instance.minecraft_version.clone(),
            mod_loader_type: instance.loader.as_filter().map(str::to_string),
            mod_loader_version: instance.loader_version.clone(),
            files_to_download: 0,
            warnings: Vec::new(),
            blocked_files: Vec::new(),
            downloaded: 0,
            bytes_downloaded: 0,
            cancelled: false,
        }
    }
}

struct PlannedDownload {
    task: DownloadTask,
    kind: ContentType,
}

/// Install orchestrator
pub struct Installer {
    adapter: Arc<PlatformAdapter>,
    downloader: Downloader,
    instances: InstanceStore,
    events: EventBus,
    concurrency: usize,
}

impl Installer {
    /// Create a new installer
    pub fn new(
        adapter: Arc<PlatformAdapter>,
        downloader: Downloader,
        instances: InstanceStore,
        events: EventBus,
        concurrency: usize,
    ) -> Self {
        Self {
            adapter,
            downloader,
            instances,
            events,
            concurrency: concurrency.max(1),
        }
    }

    /// Install every item of `plan` into an instance.
    ///
    /// Cancelling `cancel` stops new downloads and returns the partial
    /// result with `cancelled` set.
    pub async fn install(
        &self,
        instance_id: &str,
        plan: &InstallPlan,
        cancel: &CancellationToken,
    ) -> PackwrightResult<InstallResult> {
        let progress = ProgressTracker::new(self.events.clone());

        // Preparing
        progress.set_phase(InstallPhase::Preparing, plan.len());
        if plan.is_empty() {
            return Err(PackwrightError::EmptyPlan);
        }
        if let Some(item) = plan.first_without_file() {
            return Err(PackwrightError::NoFiles {
                package: item.package_id.clone(),
                version: item.version_id.clone(),
            });
        }
        let instance = self.instances.get(instance_id)?;
        let instance_dir = self.instances.dir(instance_id)?;
        let mut result = InstallResult::for_instance(&instance);
        result.warnings.extend(plan.warnings.iter().cloned());

        // Resolving
        progress.set_phase(InstallPhase::Resolving, plan.len());
        let files = self.resolve_files(plan, cancel, &mut result.warnings).await;
        if cancel.is_cancelled() {
            tracing::info!("Install into {} aborted while resolving", instance.name);
            result.cancelled = true;
            return Ok(result);
        }

        let downloads = self.plan_downloads(files, &instance_dir, &mut result)?;
        result.files_to_download = downloads.len();

        // Downloading
        progress.set_phase(InstallPhase::Downloading, downloads.len());
        let stop = cancel.child_token();
        let progress_ref = &progress;
        let outcomes: Vec<(ContentType, Option<PackwrightResult<DownloadStatus>>)> = stream::iter(downloads)
            .map(|planned| {
                let stop = stop.clone();
                async move {
                    if stop.is_cancelled() {
                        return (planned.kind, None);
                    }
                    progress_ref.start_file(&planned.task.label);
                    let outcome = self.downloader.download(&planned.task, progress_ref, &stop).await;
                    match outcome {
                        Ok(_) => progress_ref.finish_file(),
                        Err(PackwrightError::Cancelled) => {}
                        Err(ref e) => {
                            tracing::error!("{}", e);
                            stop.cancel();
                        }
                    }
                    (planned.kind, Some(outcome))
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut first_error = None;
        let mut changed = HashSet::new();
        for (kind, outcome) in outcomes {
            match outcome {
                Some(Ok(_)) => {
                    changed.insert(kind);
                }
                Some(Err(PackwrightError::Cancelled)) | None => {}
                Some(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        result.downloaded = progress.downloaded();
        result.bytes_downloaded = progress.bytes_downloaded();
        self.emit_changed(instance_id, changed);
        progress.emit();

        if let Some(e) = first_error {
            return Err(e);
        }
        if cancel.is_cancelled() {
            tracing::info!(
                "Install into {} aborted after {}/{} files",
                instance.name,
                result.downloaded,
                result.files_to_download
            );
            result.cancelled = true;
        } else {
            tracing::info!(
                "Installed {} files into {} ({} blocked)",
                result.downloaded,
                instance.name,
                result.blocked_files.len()
            );
        }
        Ok(result)
    }

    /// Fetch download URLs for items that do not carry a file yet. Items
    /// that cannot be resolved are skipped with a warning.
    async fn resolve_files(
        &self,
        plan: &InstallPlan,
        cancel: &CancellationToken,
        warnings: &mut Vec<String>,
    ) -> Vec<(PlanItem, PackageFile)> {
        let lookups: Vec<(&PlanItem, PackwrightResult<PackageFile>)> = stream::iter(plan.items.iter())
            .map(|item| async move {
                if let Some(ref file) = item.file {
                    return (item, Ok(file.clone()));
                }
                if cancel.is_cancelled() {
                    return (item, Err(PackwrightError::Cancelled));
                }
                let file = self
                    .adapter
                    .version(item.platform, &item.package_id, &item.version_id)
                    .await
                    .and_then(|version| {
                        version.ensure_installable()?;
                        version
                            .primary_file()
                            .cloned()
                            .ok_or_else(|| PackwrightError::other("no primary file"))
                    });
                (item, file)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut files = Vec::with_capacity(lookups.len());
        for (item, lookup) in lookups {
            match lookup {
                Ok(file) => files.push((item.clone(), file)),
                Err(PackwrightError::Cancelled) => {}
                Err(e) => {
                    let warning = format!("Skipped {} ({}): {}", item.name, item.version_id, e);
                    tracing::warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }
        files
    }

    /// Turn resolved files into download tasks, setting blocked files and
    /// duplicate destinations aside
    fn plan_downloads(
        &self,
        files: Vec<(PlanItem, PackageFile)>,
        instance_dir: &Path,
        result: &mut InstallResult,
    ) -> PackwrightResult<Vec<PlannedDownload>> {
        let mut destinations = HashSet::new();
        let mut downloads = Vec::new();

        for (item, file) in files {
            let kind = if item.infer_kind {
                ContentType::infer_from_filename(&file.filename)
            } else {
                item.content_type
            };
            let relative = match item.path {
                Some(ref path) => PathBuf::from(path),
                None => Path::new(kind.subfolder()).join(sanitize_filename(&file.filename)),
            };
            if !is_safe_path(&relative) {
                return Err(PackwrightError::PathTraversal(relative.display().to_string()));
            }

            let Some(url) = file.url.clone() else {
                tracing::warn!("{} must be downloaded manually", file.filename);
                result.blocked_files.push(BlockedFile {
                    project_id: item.package_id.clone(),
                    file_id: item.version_id.clone(),
                    filename: file.filename.clone(),
                    platform: item.platform,
                    content_type: kind,
                    path: item.path.clone(),
                    sha1: file.hashes.sha1.clone(),
                    size: file.size,
                    website_url: manual_download_url(&item),
                    matched: false,
                    local_path: None,
                });
                continue;
            };

            let destination = instance_dir.join(&relative);
            if !destinations.insert(destination.clone()) {
                let warning = format!(
                    "{} resolves to {} which is already being installed; skipped",
                    item.name,
                    relative.display()
                );
                tracing::warn!("{}", warning);
                result.warnings.push(warning);
                continue;
            }

            downloads.push(PlannedDownload {
                task: DownloadTask {
                    url,
                    destination,
                    label: file.filename.clone(),
                    hashes: file.hashes.clone(),
                },
                kind,
            });
        }

        Ok(downloads)
    }

    /// Copy matched blocked files into the instance and close the install.
    /// Both decisions copy whatever matched; they differ only in how the
    /// leftovers are reported.
    pub async fn finalize_blocked(
        &self,
        instance_id: &str,
        resolved: &[BlockedFile],
        decision: BlockedDecision,
    ) -> PackwrightResult<CopyReport> {
        self.instances.get(instance_id)?;
        let instance_dir = self.instances.dir(instance_id)?;

        let files = resolved.to_vec();
        let report =
            tokio::task::spawn_blocking(move || blocked::copy_matched_to_instance(&files, &instance_dir)).await?;

        match decision {
            BlockedDecision::Continue if !report.skipped.is_empty() => tracing::warn!(
                "{} blocked files are still missing: {}",
                report.skipped.len(),
                report.skipped.join(", ")
            ),
            BlockedDecision::Skip if !report.skipped.is_empty() => {
                tracing::info!("Skipped {} blocked files", report.skipped.len())
            }
            _ => {}
        }

        let changed: HashSet<ContentType> = resolved
            .iter()
            .filter(|f| report.copied.contains(&f.filename))
            .map(|f| f.content_type)
            .collect();
        self.emit_changed(instance_id, changed);

        let progress = ProgressTracker::new(self.events.clone());
        progress.set_phase(InstallPhase::Downloading, resolved.len());
        for _ in &report.copied {
            progress.finish_file();
        }

        Ok(report)
    }

    fn emit_changed(&self, instance_id: &str, kinds: HashSet<ContentType>) {
        let mut names = HashSet::new();
        for kind in kinds {
            let event = LauncherEvent::content_changed(kind, instance_id);
            if names.insert(event.name()) {
                self.events.emit(event);
            }
        }
    }
}

/// Page where a blocked file can be fetched by hand
fn manual_download_url(item: &PlanItem) -> Option<String> {
    match item.platform {
        Platform::CurseForge => Some(format!(
            "https://www.curseforge.com/api/v1/mods/{}/files/{}/download",
            item.package_id, item.version_id
        )),
        Platform::Modrinth => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::downloader::testing::FakeTransport;
    use super::*;
    use crate::instance::{ModLoader, NewInstance};
    use crate::platform::testing::{file, version, FakePlatform};
    use crate::platform::PlatformClient;

    struct Fixture {
        _dir: tempfile::TempDir,
        installer: Installer,
        instance_id: String,
        instance_dir: PathBuf,
        transport: Arc<FakeTransport>,
        events: EventBus,
    }

    fn fixture(platform: FakePlatform, transport: FakeTransport, concurrency: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let instances = InstanceStore::new(dir.path());
        let instance = instances
            .create(NewInstance {
                name: "Test".into(),
                minecraft_version: "1.20.1".into(),
                loader: ModLoader::Fabric,
                loader_version: Some("0.15.0".into()),
                icon_url: None,
            })
            .unwrap();
        let instance_dir = instances.dir(&instance.id).unwrap();

        let client: Arc<dyn PlatformClient> = Arc::new(platform);
        let adapter = Arc::new(PlatformAdapter::with_clients(vec![client]));
        let transport = Arc::new(transport);
        let events = EventBus::new();
        let installer = Installer::new(
            adapter,
            Downloader::new(transport.clone(), 0),
            instances,
            events.clone(),
            concurrency,
        );

        Fixture {
            _dir: dir,
            installer,
            instance_id: instance.id,
            instance_dir,
            transport,
            events,
        }
    }

    fn item(name: &str) -> PlanItem {
        PlanItem::from_version(&version(name, "v1", &[]), Platform::Modrinth, ContentType::Mod, name)
    }

    fn url(name: &str) -> String {
        format!("https://cdn.test/{}-v1.jar", name)
    }

    fn plan(items: Vec<PlanItem>) -> InstallPlan {
        let mut plan = InstallPlan::new();
        for item in items {
            plan.push(item);
        }
        plan
    }

    fn mods(f: &Fixture) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(f.instance_dir.join("mods"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_empty_plan_fails_fast() {
        let f = fixture(FakePlatform::new(Platform::Modrinth), FakeTransport::new(), 2);
        let err = f
            .installer
            .install(&f.instance_id, &InstallPlan::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PackwrightError::EmptyPlan));
        assert!(f.transport.opened().is_empty());
    }

    #[tokio::test]
    async fn test_blocked_file_is_reported_and_others_installed() {
        let transport = FakeTransport::new()
            .with_body(&url("a"), b"a")
            .with_body(&url("c"), b"c");
        let f = fixture(FakePlatform::new(Platform::Modrinth), transport, 4);

        let mut blocked = item("b");
        blocked.file.as_mut().unwrap().url = None;
        let result = f
            .installer
            .install(&f.instance_id, &plan(vec![item("a"), blocked, item("c")]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.blocked_files.len(), 1);
        assert_eq!(result.blocked_files[0].filename, "b-v1.jar");
        assert_eq!(result.files_to_download, 2);
        assert_eq!(mods(&f), vec!["a-v1.jar", "c-v1.jar"]);
        assert_eq!(result.mod_loader_type.as_deref(), Some("fabric"));
    }

    #[tokio::test]
    async fn test_hard_failure_raises_and_keeps_completed_files() {
        let transport = FakeTransport::new()
            .with_body(&url("a"), b"a")
            .with_connect_failure(&url("b"))
            .with_body(&url("c"), b"c");
        let f = fixture(FakePlatform::new(Platform::Modrinth), transport, 1);

        let err = f
            .installer
            .install(
                &f.instance_id,
                &plan(vec![item("a"), item("b"), item("c")]),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PackwrightError::DownloadFailed { ref file, .. } if file == "b-v1.jar"));
        assert_eq!(mods(&f), vec!["a-v1.jar"]);
        assert!(!f.transport.opened().contains(&url("c")));
    }

    #[tokio::test]
    async fn test_install_is_idempotent() {
        let transport = FakeTransport::new()
            .with_body(&url("a"), b"a")
            .with_body(&url("b"), b"b");
        let f = fixture(FakePlatform::new(Platform::Modrinth), transport, 2);
        let p = plan(vec![item("a"), item("b")]);

        f.installer.install(&f.instance_id, &p, &CancellationToken::new()).await.unwrap();
        let first = mods(&f);
        f.installer.install(&f.instance_id, &p, &CancellationToken::new()).await.unwrap();

        assert_eq!(mods(&f), first);
        assert_eq!(std::fs::read(f.instance_dir.join("mods/a-v1.jar")).unwrap(), b"a");
    }

    #[tokio::test]
    async fn test_abort_stops_scheduling_without_error() {
        let transport = FakeTransport::new()
            .with_body(&url("a"), b"a")
            .with_slow_body(&url("b"), b"bbbb", Duration::from_millis(500))
            .with_body(&url("c"), b"c")
            .with_body(&url("d"), b"d");
        let f = fixture(FakePlatform::new(Platform::Modrinth), transport, 1);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = f
            .installer
            .install(
                &f.instance_id,
                &plan(vec![item("a"), item("b"), item("c"), item("d")]),
                &cancel,
            )
            .await
            .unwrap();

        assert!(result.cancelled);
        assert_eq!(result.downloaded, 1);
        assert_eq!(mods(&f), vec!["a-v1.jar"]);
        assert_eq!(f.transport.opened(), vec![url("a"), url("b")]);
    }

    #[tokio::test]
    async fn test_abort_with_parallel_downloads_opens_nothing_new() {
        let transport = FakeTransport::new()
            .with_body(&url("a"), b"a")
            .with_slow_body(&url("b"), b"bbbb", Duration::from_millis(500))
            .with_slow_body(&url("c"), b"cccc", Duration::from_millis(500))
            .with_body(&url("d"), b"d")
            .with_body(&url("e"), b"e");
        let f = fixture(FakePlatform::new(Platform::Modrinth), transport, 2);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = f
            .installer
            .install(
                &f.instance_id,
                &plan(vec![item("a"), item("b"), item("c"), item("d"), item("e")]),
                &cancel,
            )
            .await
            .unwrap();

        assert!(result.cancelled);
        assert_eq!(result.downloaded, 1);
        let mut opened = f.transport.opened();
        opened.sort();
        assert_eq!(opened, vec![url("a"), url("b"), url("c")]);
        assert_eq!(mods(&f), vec!["a-v1.jar"]);
    }

    #[tokio::test]
    async fn test_version_without_files_fails_before_any_lookup() {
        let f = fixture(FakePlatform::new(Platform::Modrinth), FakeTransport::new(), 2);
        let mut empty = version("ghost", "g1", &[]);
        empty.files.clear();
        let ghost = PlanItem::from_version(&empty, Platform::Modrinth, ContentType::Mod, "ghost");

        let err = f
            .installer
            .install(&f.instance_id, &plan(vec![item("a"), ghost]), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PackwrightError::NoFiles { ref package, .. } if package == "ghost"));
        assert!(f.transport.opened().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_items_are_looked_up_just_in_time() {
        let platform = FakePlatform::new(Platform::CurseForge).with_version(version("238222", "4567", &[]));
        let transport = FakeTransport::new()
            .with_body("https://cdn.test/238222-4567.jar", b"jar")
            .with_body(&url("a"), b"a");
        let f = fixture(platform, transport, 2);

        let mut p = plan(vec![
            PlanItem::unresolved("238222", "4567", Platform::CurseForge, ContentType::Mod),
            PlanItem::unresolved("999", "1", Platform::CurseForge, ContentType::Mod),
        ]);
        p.items[0].infer_kind = true;

        let result = f.installer.install(&f.instance_id, &p, &CancellationToken::new()).await.unwrap();
        assert_eq!(mods(&f), vec!["238222-4567.jar"]);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("999"));
    }

    #[tokio::test]
    async fn test_duplicate_destinations_collapse_with_warning() {
        let transport = FakeTransport::new().with_body("https://cdn.test/same.jar", b"x");
        let f = fixture(FakePlatform::new(Platform::Modrinth), transport, 2);

        let mut a = item("a");
        a.file = Some(file("same.jar"));
        let mut b = item("b");
        b.file = Some(file("same.jar"));

        let result = f
            .installer
            .install(&f.instance_id, &plan(vec![a, b]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.files_to_download, 1);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(f.transport.opened().len(), 1);
    }

    #[tokio::test]
    async fn test_escaping_plan_path_is_rejected() {
        let f = fixture(FakePlatform::new(Platform::Modrinth), FakeTransport::new(), 1);
        let mut evil = item("a");
        evil.path = Some("../../outside.jar".into());

        let err = f
            .installer
            .install(&f.instance_id, &plan(vec![evil]), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PackwrightError::PathTraversal(_)));
    }

    #[tokio::test]
    async fn test_changed_event_emitted_once_per_folder() {
        let transport = FakeTransport::new()
            .with_body(&url("a"), b"a")
            .with_body(&url("b"), b"b");
        let f = fixture(FakePlatform::new(Platform::Modrinth), transport, 2);
        let mut rx = f.events.subscribe();

        f.installer
            .install(&f.instance_id, &plan(vec![item("a"), item("b")]), &CancellationToken::new())
            .await
            .unwrap();

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        assert_eq!(names.iter().filter(|n| **n == "mods-changed").count(), 1);
        assert!(names.contains(&"modpack-download-progress"));
    }

    #[tokio::test]
    async fn test_finalize_blocked_copies_matches_for_both_decisions() {
        let f = fixture(FakePlatform::new(Platform::CurseForge), FakeTransport::new(), 1);
        let downloads = tempfile::tempdir().unwrap();
        std::fs::write(downloads.path().join("create.jar"), b"create").unwrap();

        let blocked_file = |name: &str| BlockedFile {
            project_id: "1".into(),
            file_id: "2".into(),
            filename: name.into(),
            platform: Platform::CurseForge,
            content_type: ContentType::Mod,
            path: None,
            sha1: None,
            size: 0,
            website_url: None,
            matched: false,
            local_path: None,
        };
        let resolved = blocked::resolve_blocked_files(
            vec![blocked_file("create.jar"), blocked_file("jei.jar")],
            downloads.path(),
        );

        for decision in [BlockedDecision::Skip, BlockedDecision::Continue] {
            let report = f
                .installer
                .finalize_blocked(&f.instance_id, &resolved, decision)
                .await
                .unwrap();
            assert_eq!(report.copied, vec!["create.jar"]);
            assert_eq!(report.skipped, vec!["jei.jar"]);
        }
        assert_eq!(mods(&f), vec!["create.jar"]);
    }
}
