//! Packwright - Minecraft content installer
//!
//! Searches Modrinth and CurseForge, resolves required dependencies, and
//! installs mods, resource packs, shader packs and whole modpacks into
//! instance directories.

mod cli;
mod core;
mod events;
mod installer;
mod instance;
mod modpack;
mod platform;
mod queue;
mod resolver;
mod utils;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let json_output = cli.json;

    // Execute command
    let result = match cli.command {
        Commands::Search(args) => cli::commands::search::execute(args, json_output).await,
        Commands::Show(args) => cli::commands::show::execute(args, json_output).await,
        Commands::Versions(args) => cli::commands::versions::execute(args, json_output).await,
        Commands::Install(args) => cli::commands::install::execute(args, json_output).await,
        Commands::Import(args) => cli::commands::import::execute(args, json_output).await,
        Commands::Modpack(args) => cli::commands::modpack::execute(args, json_output).await,
        Commands::Blocked(args) => cli::commands::blocked::execute(args, json_output).await,
        Commands::Instance(args) => cli::commands::instance::execute(args, json_output).await,
    };

    if let Err(ref e) = result {
        if json_output {
            let error_json = serde_json::json!({
                "error": true,
                "message": e.to_string()
            });
            eprintln!("{}", serde_json::to_string_pretty(&error_json).unwrap_or_default());
        } else {
            eprintln!("{} {}", console::style("error:").red().bold(), e);
        }
        std::process::exit(e.exit_code());
    }
}
