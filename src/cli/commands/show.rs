//! packwright show - Show project details

use clap::Args;
use console::style;

use crate::cli::output;
use crate::core::PackwrightResult;
use crate::platform::{ContentType, Platform};

#[derive(Args)]
pub struct ShowArgs {
    /// Project id or slug
    pub id: String,

    /// Content kind: mod, modpack, resourcepack or shader
    #[arg(short, long, default_value = "mod")]
    pub kind: ContentType,

    /// Platform: modrinth or curseforge
    #[arg(short, long, default_value = "modrinth")]
    pub platform: Platform,
}

pub async fn execute(args: ShowArgs, json_output: bool) -> PackwrightResult<()> {
    let engine = super::load_engine()?;

    let details = match args.kind {
        ContentType::Mod => engine.get_mod_details(&args.id, args.platform).await?,
        ContentType::Modpack => engine.get_modpack_details(&args.id, args.platform).await?,
        ContentType::ResourcePack => engine.get_resource_pack_details(&args.id, args.platform).await?,
        ContentType::ShaderPack => engine.get_shader_pack_details(&args.id, args.platform).await?,
    };

    if json_output {
        output::json(&details)?;
        return Ok(());
    }

    println!("{} {}", style(&details.name).cyan().bold(), style(&details.id).dim());
    if let Some(ref author) = details.author {
        println!("  by {}", author);
    }
    println!("  {}", details.description);
    output::divider();
    println!("  Downloads:  {}", details.downloads);
    println!("  Followers:  {}", details.follows);
    if !details.categories.is_empty() {
        println!("  Categories: {}", details.categories.join(", "));
    }
    if let Some(ref url) = details.website_url {
        println!("  Website:    {}", url);
    }
    if let Some(ref url) = details.source_url {
        println!("  Source:     {}", url);
    }

    Ok(())
}
