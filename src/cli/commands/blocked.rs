//! packwright blocked - Resolve files that need a manual download

use std::path::PathBuf;
use clap::Args;

use crate::cli::output;
use crate::core::{PackwrightError, PackwrightResult};
use crate::installer::{BlockedDecision, BlockedFile};

#[derive(Args)]
pub struct BlockedArgs {
    /// Instance id or name
    pub instance: String,

    /// JSON file with the blocked files, either a list or an install result
    pub report: PathBuf,

    /// Folder holding manually downloaded files (default: Downloads)
    #[arg(long)]
    pub folder: Option<PathBuf>,

    /// Give up on files that did not match instead of leaving them pending
    #[arg(long)]
    pub skip: bool,
}

pub async fn execute(args: BlockedArgs, json_output: bool) -> PackwrightResult<()> {
    let engine = super::load_engine()?;
    let instance = super::find_instance(&engine, &args.instance)?;
    let blocked = read_report(&std::fs::read_to_string(&args.report)?)?;

    if blocked.is_empty() {
        if json_output {
            output::json(&serde_json::json!({ "copied": [], "skipped": [] }))?;
        } else {
            output::success("No blocked files to resolve");
        }
        return Ok(());
    }

    let resolved = engine.resolve_blocked_files(blocked, args.folder.as_deref()).await?;
    let report = if args.skip {
        engine
            .finalize_blocked(&instance.id, &resolved, BlockedDecision::Skip)
            .await?
    } else {
        engine.copy_blocked_mods_to_instance(&resolved, &instance.id).await?
    };

    if json_output {
        output::json(&report)?;
    } else {
        for name in &report.copied {
            output::success(&format!("Copied {}", name));
        }
        for name in &report.skipped {
            output::warning(&format!("Missing {}", name));
        }
    }

    Ok(())
}

/// Blocked files from a bare list or from the `blocked_files` of an
/// install result, optionally nested under `result`
fn read_report(content: &str) -> PackwrightResult<Vec<BlockedFile>> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let list = if value.is_array() {
        value
    } else {
        let result = value.get("result").unwrap_or(&value);
        result
            .get("blocked_files")
            .cloned()
            .ok_or_else(|| PackwrightError::other("Report has no blocked_files"))?
    };
    Ok(serde_json::from_value(list)?)
}
