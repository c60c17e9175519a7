//! CLI command implementations

pub mod blocked;
pub mod import;
pub mod install;
pub mod instance;
pub mod modpack;
pub mod search;
pub mod show;
pub mod versions;

use std::env;
use std::path::PathBuf;
use clap::Args;
use dialoguer::Select;
use tokio_util::sync::CancellationToken;

use crate::cli::output;
use crate::core::{Engine, PackwrightError, PackwrightResult};
use crate::installer::{BlockedDecision, BlockedFile, CopyReport};
use crate::instance::Instance;

/// How blocked files are handled after an install
#[derive(Args, Debug, Clone, Default)]
pub struct BlockedOptions {
    /// Folder holding manually downloaded files (default: Downloads)
    #[arg(long)]
    pub blocked_dir: Option<PathBuf>,

    /// Leave unmatched blocked files out without asking
    #[arg(long)]
    pub skip_blocked: bool,
}

/// Engine configured from the working directory
pub(crate) fn load_engine() -> PackwrightResult<Engine> {
    Engine::new(&env::current_dir()?)
}

/// Look an instance up by id, then by name
pub(crate) fn find_instance(engine: &Engine, key: &str) -> PackwrightResult<Instance> {
    match engine.get_instance(key) {
        Ok(instance) => Ok(instance),
        Err(PackwrightError::InstanceNotFound(_)) => engine
            .list_instances()?
            .into_iter()
            .find(|i| i.name.eq_ignore_ascii_case(key))
            .ok_or_else(|| PackwrightError::InstanceNotFound(key.to_string())),
        Err(e) => Err(e),
    }
}

/// Token cancelled on Ctrl-C
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping downloads");
            trigger.cancel();
        }
    });
    token
}

/// Match blocked files locally, ask what to do with the rest and copy
/// whatever matched into the instance
pub(crate) async fn reconcile_blocked(
    engine: &Engine,
    instance_id: &str,
    blocked: Vec<BlockedFile>,
    options: &BlockedOptions,
    json_output: bool,
) -> PackwrightResult<CopyReport> {
    let resolved = engine
        .resolve_blocked_files(blocked, options.blocked_dir.as_deref())
        .await?;
    let missing = resolved.iter().filter(|f| !f.matched).count();

    let decision = if options.skip_blocked || json_output || missing == 0 {
        BlockedDecision::Skip
    } else {
        output::warning(&format!("{} of {} blocked files were not found", missing, resolved.len()));
        for file in resolved.iter().filter(|f| !f.matched) {
            println!("  {}", file.filename);
        }
        let choice = Select::new()
            .with_prompt("How do you want to continue?")
            .items(&["Copy what matched and finish", "Skip missing files"])
            .default(0)
            .interact()?;
        if choice == 0 {
            BlockedDecision::Continue
        } else {
            BlockedDecision::Skip
        }
    };

    engine.finalize_blocked(instance_id, &resolved, decision).await
}
