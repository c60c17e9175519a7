//! packwright install - Install packages into an instance

use std::future::Future;
use std::time::Instant;
use clap::Args;
use console::style;
use dialoguer::MultiSelect;

use crate::cli::output;
use crate::core::engine::{BatchItem, QueueOutcome, QueueRequest};
use crate::core::{Engine, PackwrightError, PackwrightResult};
use crate::installer::InstallResult;
use crate::instance::Instance;
use crate::platform::{ContentType, Platform};
use crate::queue::InstallQueue;
use crate::utils::format_duration;

use super::BlockedOptions;

#[derive(Args)]
pub struct InstallArgs {
    /// Instance id or name
    pub instance: String,

    /// Project ids or slugs to install
    #[arg(required = true)]
    pub packages: Vec<String>,

    /// Content kind: mod, resourcepack or shader
    #[arg(short, long, default_value = "mod")]
    pub kind: ContentType,

    /// Platform: modrinth or curseforge
    #[arg(short, long, default_value = "modrinth")]
    pub platform: Platform,

    /// Exact version id (single package only)
    #[arg(long)]
    pub version: Option<String>,

    /// Do not install required dependencies
    #[arg(long)]
    pub no_deps: bool,

    /// Pick which queued packages to keep before installing
    #[arg(long)]
    pub review: bool,

    #[command(flatten)]
    pub blocked: BlockedOptions,
}

pub async fn execute(args: InstallArgs, json_output: bool) -> PackwrightResult<()> {
    let start_time = Instant::now();

    if args.kind == ContentType::Modpack {
        return Err(PackwrightError::other("Use 'packwright modpack' to install modpacks"));
    }
    if args.version.is_some() && args.packages.len() > 1 {
        return Err(PackwrightError::other("--version needs exactly one package"));
    }

    let engine = super::load_engine()?;
    let instance = super::find_instance(&engine, &args.instance)?;
    let cancel = super::cancel_on_ctrl_c();

    let (queued, result) = match (args.kind, args.version.as_deref()) {
        (ContentType::ResourcePack | ContentType::ShaderPack, _) => {
            let batch = pick_pack_versions(&engine, &instance, &args, json_output).await?;
            let install = async {
                if args.kind == ContentType::ShaderPack {
                    engine.download_shader_packs_batch(&instance.id, &batch, &cancel).await
                } else {
                    engine.download_resource_packs_batch(&instance.id, &batch, &cancel).await
                }
            };
            (Vec::new(), with_progress(&engine, json_output, install).await?)
        }
        (_, Some(version)) if args.no_deps => {
            let install = engine.download_mod_version(&instance.id, &args.packages[0], version, args.platform, &cancel);
            (Vec::new(), with_progress(&engine, json_output, install).await?)
        }
        _ => {
            let (queue, queued) = build_queue(&engine, &instance, &args, json_output).await?;
            if args.review && !json_output {
                review_queue(&queue)?;
            }
            if queue.is_empty() {
                output::info("Nothing left to install");
                return Ok(());
            }
            let install = engine.install_queue(&instance.id, &queue, &cancel);
            (queued, with_progress(&engine, json_output, install).await?)
        }
    };

    let report = if !result.blocked_files.is_empty() && !result.cancelled {
        Some(
            super::reconcile_blocked(
                &engine,
                &instance.id,
                result.blocked_files.clone(),
                &args.blocked,
                json_output,
            )
            .await?,
        )
    } else {
        None
    };

    let duration = start_time.elapsed();

    if json_output {
        output::json(&serde_json::json!({
            "success": !result.cancelled,
            "queued": queued,
            "result": result,
            "blocked": report,
            "duration_ms": duration.as_millis()
        }))?;
    } else {
        output::install_summary(&result);
        if let Some(report) = report {
            output::info(&format!(
                "Copied {} blocked files, {} still missing",
                report.copied.len(),
                report.skipped.len()
            ));
        }
        println!(
            "{} {}",
            style("Done in").dim(),
            format_duration(duration.as_millis())
        );
    }

    Ok(())
}

fn request_for(args: &InstallArgs, instance: &Instance, package: &str) -> QueueRequest {
    QueueRequest {
        platform: args.platform,
        kind: args.kind,
        project_id: package.to_string(),
        version_id: args.version.clone(),
        game_version: Some(instance.minecraft_version.clone()),
        loader: instance.loader.as_filter().map(str::to_string),
        with_dependencies: !args.no_deps,
    }
}

/// Resolve every package and its dependencies into a fresh queue
async fn build_queue(
    engine: &Engine,
    instance: &Instance,
    args: &InstallArgs,
    json_output: bool,
) -> PackwrightResult<(InstallQueue, Vec<QueueOutcome>)> {
    let spinner = (!json_output).then(|| output::spinner("Resolving packages..."));

    let queue = InstallQueue::new();
    let mut queued = Vec::new();
    for package in &args.packages {
        if let Some(ref pb) = spinner {
            pb.set_message(format!("Resolving {}...", package));
        }
        queued.push(engine.add_to_queue(&queue, &request_for(args, instance, package)).await?);
    }

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    if !json_output {
        for outcome in &queued {
            output::info(&format!(
                "Queued {}{}",
                output::package_version(&outcome.name, &outcome.version),
                if outcome.dependencies.is_empty() {
                    String::new()
                } else {
                    format!(" with {}", outcome.dependencies.join(", "))
                }
            ));
            for skipped in &outcome.skipped {
                output::warning(&format!("Dependency {} skipped: {}", skipped.project_id, skipped.reason));
            }
        }
    }

    Ok((queue, queued))
}

/// Let the user drop top-level entries from the queue
fn review_queue(queue: &InstallQueue) -> PackwrightResult<()> {
    let entries = queue.entries();
    let labels: Vec<String> = entries
        .iter()
        .map(|entry| {
            let label = output::package_version(&entry.name, &entry.chosen_version.version_number);
            if entry.dependencies.is_empty() {
                label
            } else {
                let deps: Vec<&str> = entry.dependencies.iter().map(|d| d.name.as_str()).collect();
                format!("{} (+ {})", label, deps.join(", "))
            }
        })
        .collect();
    let defaults = vec![true; labels.len()];

    let keep = MultiSelect::new()
        .with_prompt(format!("Packages to install ({} queued)", queue.len()))
        .items(&labels)
        .defaults(&defaults)
        .interact()?;

    for (index, entry) in entries.iter().enumerate() {
        if keep.contains(&index) {
            continue;
        }
        queue.remove(&entry.package_id);
        if queue.contains(&entry.package_id) {
            output::info(&format!("{} stays queued as a dependency", entry.name));
        } else {
            output::info(&format!("Removed {}", entry.name));
        }
    }
    Ok(())
}

/// Pinned or newest compatible version of each resource or shader pack
async fn pick_pack_versions(
    engine: &Engine,
    instance: &Instance,
    args: &InstallArgs,
    json_output: bool,
) -> PackwrightResult<Vec<BatchItem>> {
    let mut batch = Vec::with_capacity(args.packages.len());
    for package in &args.packages {
        let item = match args.version {
            Some(ref version_id) => BatchItem {
                resource_id: package.clone(),
                version_id: version_id.clone(),
                platform: args.platform,
            },
            None => {
                let version = engine.latest_version(&request_for(args, instance, package)).await?;
                BatchItem {
                    resource_id: version.project_id,
                    version_id: version.id,
                    platform: args.platform,
                }
            }
        };
        if !json_output {
            output::info(&format!("Queued {} ({})", package, item.version_id));
        }
        batch.push(item);
    }
    Ok(batch)
}

/// Drive a download progress bar from the event bus while `install` runs
async fn with_progress<F>(engine: &Engine, json_output: bool, install: F) -> PackwrightResult<InstallResult>
where
    F: Future<Output = PackwrightResult<InstallResult>>,
{
    let listener = (!json_output).then(|| output::follow_progress(&engine.events, output::download_progress()));
    let result = install.await;
    if let Some(listener) = listener {
        listener.abort();
    }
    result
}
