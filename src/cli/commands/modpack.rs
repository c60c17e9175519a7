//! packwright modpack - Install a published modpack

use clap::Args;

use crate::cli::output;
use crate::core::{PackwrightError, PackwrightResult};
use crate::platform::Platform;

use super::BlockedOptions;

#[derive(Args)]
pub struct ModpackArgs {
    /// Modpack project id or slug
    pub id: String,

    /// Version id (default: newest)
    #[arg(long)]
    pub version: Option<String>,

    /// Platform: modrinth or curseforge
    #[arg(short, long, default_value = "modrinth")]
    pub platform: Platform,

    /// Minecraft version used to pick the newest version
    #[arg(short, long)]
    pub game_version: Option<String>,

    /// Instance name (default: the modpack's name)
    #[arg(short, long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub blocked: BlockedOptions,
}

pub async fn execute(args: ModpackArgs, json_output: bool) -> PackwrightResult<()> {
    let engine = super::load_engine()?;

    let version_id = match args.version {
        Some(version) => version,
        None => engine
            .get_modpack_versions(&args.id, args.platform, args.game_version.as_deref(), None)
            .await?
            .into_iter()
            .next()
            .map(|v| v.id)
            .ok_or_else(|| PackwrightError::VersionNotFound {
                package: args.id.clone(),
                version: args.game_version.clone().unwrap_or_else(|| "latest".to_string()),
            })?,
    };

    let cancel = super::cancel_on_ctrl_c();
    let listener = if !json_output {
        output::info(&format!("Installing modpack {} ({})...", args.id, version_id));
        Some(output::follow_progress(&engine.events, output::download_progress()))
    } else {
        None
    };

    let result = engine
        .install_modpack_version(args.platform, &args.id, &version_id, args.name.as_deref(), &cancel)
        .await;
    if let Some(listener) = listener {
        listener.abort();
    }
    let result = result?;

    let report = if !result.blocked_files.is_empty() && !result.cancelled {
        Some(
            super::reconcile_blocked(
                &engine,
                &result.instance_id,
                result.blocked_files.clone(),
                &args.blocked,
                json_output,
            )
            .await?,
        )
    } else {
        None
    };

    if json_output {
        output::json(&serde_json::json!({
            "result": result,
            "blocked": report
        }))?;
    } else {
        output::install_summary(&result);
    }

    Ok(())
}
