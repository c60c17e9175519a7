//! packwright instance - Manage instances

use clap::{Args, Subcommand};
use console::style;

use crate::cli::output;
use crate::core::PackwrightResult;
use crate::instance::{ModLoader, NewInstance};
use crate::platform::ContentType;

#[derive(Args)]
pub struct InstanceArgs {
    #[command(subcommand)]
    pub command: InstanceCommands,
}

#[derive(Subcommand)]
pub enum InstanceCommands {
    /// Create an empty instance
    Create {
        /// Instance name
        name: String,

        /// Minecraft version
        #[arg(short = 'm', long)]
        minecraft_version: String,

        /// Mod loader: vanilla, fabric, forge, quilt or neoforge
        #[arg(short, long, default_value = "vanilla")]
        loader: ModLoader,

        /// Mod loader version
        #[arg(long)]
        loader_version: Option<String>,
    },

    /// List instances
    #[command(visible_alias = "ls")]
    List,

    /// Show one instance
    Show {
        /// Instance id or name
        instance: String,
    },
}

pub async fn execute(args: InstanceArgs, json_output: bool) -> PackwrightResult<()> {
    let engine = super::load_engine()?;

    match args.command {
        InstanceCommands::Create {
            name,
            minecraft_version,
            loader,
            loader_version,
        } => {
            let instance = engine.create_instance(NewInstance {
                name,
                minecraft_version,
                loader,
                loader_version,
                icon_url: None,
            })?;
            if json_output {
                output::json(&instance)?;
            } else {
                output::success(&format!(
                    "Created {} ({})",
                    style(&instance.name).cyan(),
                    style(&instance.id).dim()
                ));
            }
        }
        InstanceCommands::List => {
            let instances = engine.list_instances()?;
            if json_output {
                output::json(&instances)?;
            } else if instances.is_empty() {
                output::info("No instances yet");
            } else {
                output::table_header(&["ID", "NAME", "MINECRAFT", "LOADER"]);
                output::divider();
                for instance in &instances {
                    println!(
                        "{}  {}  {}  {}",
                        style(&instance.id).dim(),
                        style(&instance.name).cyan(),
                        instance.minecraft_version,
                        instance.loader
                    );
                }
            }
        }
        InstanceCommands::Show { instance } => {
            let instance = super::find_instance(&engine, &instance)?;
            if json_output {
                output::json(&instance)?;
            } else {
                let dir = engine.instances.dir(&instance.id)?;
                println!("{} {}", style(&instance.name).cyan().bold(), style(&instance.id).dim());
                output::divider();
                println!("  Minecraft: {}", instance.minecraft_version);
                println!(
                    "  Loader:    {} {}",
                    instance.loader,
                    instance.loader_version.as_deref().unwrap_or("")
                );
                println!("  Created:   {}", instance.created_at.format("%Y-%m-%d %H:%M"));
                println!("  Path:      {}", dir.display());
                for (label, kind) in [
                    ("Mods", ContentType::Mod),
                    ("Resources", ContentType::ResourcePack),
                    ("Shaders", ContentType::ShaderPack),
                ] {
                    let count = std::fs::read_dir(engine.instances.content_dir(&instance.id, kind)?)?
                        .filter_map(|e| e.ok())
                        .filter(|e| e.path().is_file())
                        .count();
                    println!("  {:<10} {}", format!("{}:", label), count);
                }
            }
        }
    }

    Ok(())
}
