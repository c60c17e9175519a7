//! packwright import - Import a modpack archive

use clap::Args;

use crate::cli::output;
use crate::core::PackwrightResult;

use super::BlockedOptions;

#[derive(Args)]
pub struct ImportArgs {
    /// http(s) URL, file:// URL or path of a .mrpack or CurseForge zip
    pub source: String,

    /// Instance name (default: the pack's name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Icon URL stored with the instance
    #[arg(long)]
    pub icon_url: Option<String>,

    #[command(flatten)]
    pub blocked: BlockedOptions,
}

pub async fn execute(args: ImportArgs, json_output: bool) -> PackwrightResult<()> {
    let engine = super::load_engine()?;
    let cancel = super::cancel_on_ctrl_c();

    let listener = if !json_output {
        output::info(&format!("Importing {}...", args.source));
        Some(output::follow_progress(&engine.events, output::download_progress()))
    } else {
        None
    };

    let result = engine
        .import_instance_from_url(&args.source, args.name.as_deref(), args.icon_url.as_deref(), &cancel)
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
        output::info(&format!(
            "Instance {} ({} {})",
            result.instance_id,
            result.minecraft_version,
            result.mod_loader_type.as_deref().unwrap_or("vanilla")
        ));
    }

    Ok(())
}
