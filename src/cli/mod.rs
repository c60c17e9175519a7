//! CLI module for Packwright
//!
//! Provides command-line interface using clap.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use commands::*;

/// Packwright - Minecraft content installer
#[derive(Parser)]
#[command(name = "packwright")]
#[command(author = "Packwright Contributors")]
#[command(version)]
#[command(about = "Install mods, modpacks, resource packs and shaders from Modrinth and CurseForge", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search a platform for content
    #[command(visible_alias = "s")]
    Search(search::SearchArgs),

    /// Show project details
    Show(show::ShowArgs),

    /// List the versions of a project
    Versions(versions::VersionsArgs),

    /// Install packages and their required dependencies into an instance
    #[command(visible_alias = "i")]
    Install(install::InstallArgs),

    /// Import a modpack archive from a URL or file
    Import(import::ImportArgs),

    /// Install a modpack published on a platform
    Modpack(modpack::ModpackArgs),

    /// Match blocked files against a local folder and copy them
    Blocked(blocked::BlockedArgs),

    /// Manage instances
    Instance(instance::InstanceArgs),
}
