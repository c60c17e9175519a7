//! packwright search - Search a platform

use clap::Args;
use console::style;

use crate::cli::output;
use crate::core::PackwrightResult;
use crate::platform::{ContentType, Platform, SearchFilters, SideRequirement, SortKey};

#[derive(Args)]
pub struct SearchArgs {
    /// Search text
    #[arg(default_value = "")]
    pub query: String,

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

    /// Sort by relevance, downloads, follows, newest or updated
    #[arg(long, default_value = "relevance")]
    pub sort: SortKey,

    /// Results per page
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Results to skip
    #[arg(long, default_value_t = 0)]
    pub offset: u32,

    /// Only results carrying one of these categories
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Client side requirement (mods only)
    #[arg(long)]
    pub client_side: Option<SideRequirement>,

    /// Server side requirement (mods only)
    #[arg(long)]
    pub server_side: Option<SideRequirement>,
}

pub async fn execute(args: SearchArgs, json_output: bool) -> PackwrightResult<()> {
    let engine = super::load_engine()?;

    let filters = SearchFilters {
        query: args.query.clone(),
        game_version: args.game_version,
        loader: args.loader,
        sort: args.sort,
        categories: args.categories,
        offset: args.offset,
        limit: args.limit,
        client_side: args.client_side,
        server_side: args.server_side,
    };

    let progress = if !json_output {
        Some(output::spinner(&format!("Searching {}...", args.platform)))
    } else {
        None
    };

    let outcome = match args.kind {
        ContentType::Mod => engine.search_mods_detailed(args.platform, &filters).await,
        ContentType::Modpack => engine.search_modpacks(args.platform, &filters).await,
        ContentType::ResourcePack => engine.search_resource_packs(args.platform, &filters).await,
        ContentType::ShaderPack => engine.search_shader_packs(args.platform, &filters).await,
    };

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if json_output {
        output::json(&outcome)?;
        return Ok(());
    }

    if let Some(ref error) = outcome.error {
        output::warning(&format!("Search failed: {}", error));
        return Ok(());
    }
    if outcome.page.hits.is_empty() {
        output::info(&format!("No results for '{}'", args.query));
        return Ok(());
    }

    output::table_header(&["ID", "NAME", "DOWNLOADS", "AUTHOR"]);
    output::divider();
    for hit in &outcome.page.hits {
        println!(
            "{}  {}  {}  {}",
            style(&hit.id).dim(),
            style(&hit.name).cyan(),
            hit.downloads,
            hit.author
        );
    }
    output::divider();
    println!(
        "{} {}-{} of {}",
        style("Showing").dim(),
        outcome.page.offset + 1,
        outcome.page.offset + outcome.page.hits.len() as u32,
        outcome.page.total_hits
    );

    Ok(())
}
