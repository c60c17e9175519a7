//! packwright versions - List compatible versions

use clap::Args;
use console::style;

use crate::cli::output;
use crate::core::PackwrightResult;
use crate::platform::{ContentType, Platform};

#[derive(Args)]
pub struct VersionsArgs {
    /// Project id or slug
    pub id: String,

    /// Content kind: mod, modpack, resourcepack or shader
    #[arg(short, long, default_value = "mod")]
    pub kind: ContentType,

    /// Platform: modrinth or curseforge
    #[arg(short, long, default_value = "modrinth")]
    pub platform: Platform,

    /// Minecraft version
    #[arg(short, long)]
    pub game_version: Option<String>,

    /// Mod loader
    #[arg(short, long)]
    pub loader: Option<String>,
}

pub async fn execute(args: VersionsArgs, json_output: bool) -> PackwrightResult<()> {
    let engine = super::load_engine()?;
    let game_version = args.game_version.as_deref();
    let loader = args.loader.as_deref();

    let versions = match args.kind {
        ContentType::Mod => engine.get_mod_versions(&args.id, args.platform, game_version, loader).await?,
        ContentType::Modpack => {
            engine
                .get_modpack_versions(&args.id, args.platform, game_version, loader)
                .await?
        }
        ContentType::ResourcePack => {
            engine
                .get_resource_pack_versions(&args.id, args.platform, game_version)
                .await?
        }
        ContentType::ShaderPack => {
            engine
                .get_shader_pack_versions(&args.id, args.platform, game_version)
                .await?
        }
    };

    if json_output {
        output::json(&versions)?;
        return Ok(());
    }

    if versions.is_empty() {
        output::info("No compatible versions");
        return Ok(());
    }

    output::table_header(&["ID", "VERSION", "TYPE", "GAME VERSIONS", "LOADERS"]);
    output::divider();
    for version in &versions {
        println!(
            "{}  {}  {}  {}  {}",
            style(&version.id).dim(),
            style(&version.version_number).green(),
            version.version_type,
            version.game_versions.join(","),
            version.loaders.join(",")
        );
    }

    Ok(())
}
