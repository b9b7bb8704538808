use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use vkoverlay_cli::manifest::{self, Manifest};
use vkoverlay_cli::report;
use vkoverlay_core::config::{default_config_path, LayerConfig};

#[derive(Parser)]
#[command(name = "vkoverlay")]
#[command(about = "Manifest and configuration tool for the vkoverlay Vulkan layer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the loader manifest that registers the layer
    Manifest {
        /// Path of the layer library as the loader should see it
        #[arg(short, long)]
        library: Option<String>,

        /// Write the manifest to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the default configuration as TOML
    Config,

    /// Parse a configuration file and show the effective settings
    Check {
        /// Configuration file (defaults to the path the layer searches)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    vkoverlay_common::init_logging("info");

    let cli = Cli::parse();

    match cli.command {
        Commands::Manifest { library, output } => {
            let library = library.unwrap_or_else(manifest::default_library_path);
            let json = Manifest::new(&library).to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, format!("{json}\n"))
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!("manifest written to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Config => {
            print!("{}", LayerConfig::default().to_toml()?);
        }
        Commands::Check { config } => {
            let path = config
                .or_else(default_config_path)
                .context("no configuration path given and no config directory found")?;
            let config = LayerConfig::load(&path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            println!("{}", path.display());
            print!("{}", report::summarize(&config));
        }
    }

    Ok(())
}
