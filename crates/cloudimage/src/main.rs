mod commands;
mod console;
mod utils;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cloudimage")]
#[command(about = "Build, import and export CloudControl customer images", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: discovered from CLOUDIMAGE_CONFIG_PATH,
    /// the current directory or ~/.config/cloudimage)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the produced artifact's description as JSON to this file
    #[arg(short, long, global = true, value_name = "PATH")]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a temporary server, provision it and clone it into a customer image
    Build,
    /// Convert a local VMware build to OVF and import it as a customer image
    Import {
        /// Directory containing the VMware build (.vmx and disks)
        #[arg(short, long, value_name = "DIR")]
        source_dir: PathBuf,
    },
    /// Export a customer image to an OVF package on the datacenter's FTPS host
    Export,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    utils::init_tracing(cli.verbose);

    // Only the pipeline commands read a configuration file
    let load_config = || cloudimage_config::load(cli.config.as_deref());
    let manifest = cli.manifest.as_deref();

    match &cli.command {
        Commands::Version => println!("cloudimage {}", env!("CARGO_PKG_VERSION")),
        Commands::Build => commands::build::handle(&load_config()?, manifest).await?,
        Commands::Import { source_dir } => {
            commands::import::handle(&load_config()?, source_dir, manifest).await?
        }
        Commands::Export => commands::export::handle(&load_config()?, manifest).await?,
    }

    Ok(())
}
