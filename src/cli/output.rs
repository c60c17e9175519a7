//! Output formatting for CLI

use std::time::Duration;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::events::{EventBus, InstallPhase, LauncherEvent};
use crate::installer::InstallResult;
use crate::utils::format_bytes;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", style("ℹ").blue().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", style("⚠").yellow().bold(), message);
}

/// Print JSON output
pub fn json<T: Serialize>(data: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Print a table header
pub fn table_header(columns: &[&str]) {
    let header: Vec<String> = columns.iter().map(|c| style(*c).bold().to_string()).collect();
    println!("{}", header.join("  "));
}

/// Print a divider line
pub fn divider() {
    println!("{}", style("─".repeat(60)).dim());
}

/// Format a project name with version
pub fn package_version(name: &str, version: &str) -> String {
    format!("{} {}", style(name).cyan(), style(version).green())
}

/// Create a progress spinner
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Create a progress bar for file downloads
pub fn download_progress() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(template) = ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:>11} [{bar:40.cyan/blue}] {pos}/{len} files {msg}")
    {
        bar.set_style(template.progress_chars("█▓▒░"));
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Drive `bar` from progress events until the returned task is aborted
pub fn follow_progress(events: &EventBus, bar: ProgressBar) -> JoinHandle<()> {
    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(LauncherEvent::ModpackDownloadProgress(progress)) => {
                    bar.set_prefix(phase_label(progress.phase));
                    bar.set_length(progress.total as u64);
                    bar.set_position(progress.downloaded as u64);
                    let file = progress.current_file.unwrap_or_default();
                    bar.set_message(format!("{}/s {}", format_bytes(progress.speed_bps), file));
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn phase_label(phase: InstallPhase) -> &'static str {
    match phase {
        InstallPhase::Preparing => "preparing",
        InstallPhase::Resolving => "resolving",
        InstallPhase::Downloading => "downloading",
    }
}

/// Human summary of an install
pub fn install_summary(result: &InstallResult) {
    for warning in &result.warnings {
        self::warning(warning);
    }
    if result.cancelled {
        warning(&format!(
            "Aborted after {}/{} files; completed files were kept",
            result.downloaded, result.files_to_download
        ));
    } else {
        success(&format!(
            "Installed {} files into {} ({})",
            result.downloaded,
            style(&result.name).cyan(),
            format_bytes(result.bytes_downloaded)
        ));
    }
    if !result.blocked_files.is_empty() {
        warning(&format!(
            "{} files must be downloaded by hand:",
            result.blocked_files.len()
        ));
        for file in &result.blocked_files {
            println!(
                "  {} {}",
                file.filename,
                style(file.website_url.as_deref().unwrap_or("")).dim()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_labels_fit_prefix() {
        for phase in [InstallPhase::Preparing, InstallPhase::Resolving, InstallPhase::Downloading] {
            assert!(phase_label(phase).len() <= 11);
        }
    }

    #[test]
    fn test_package_version_contains_both_parts() {
        let text = console::strip_ansi_codes(&package_version("sodium", "0.5.3")).to_string();
        assert_eq!(text, "sodium 0.5.3");
    }
}
