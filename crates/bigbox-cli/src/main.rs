//! BigBox CLI - build and flash Marlin firmware for BigBox printers.

mod colors;
mod deps;
mod make;
mod output;
mod profiles;
mod serve;

use std::path::{Path, PathBuf};

use bigbox_core::{FirmwareConfig, MakeRequest};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bigbox")]
#[command(about = "Build and flash Marlin firmware for BigBox printers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/WebSocket server
    Serve {
        /// Host address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "5000")]
        port: u16,
    },

    /// Merge a profile, build the firmware and flash it
    Make {
        /// Serial port of the board
        #[arg(short, long)]
        port: String,

        /// Profile id
        #[arg(long)]
        profile: String,

        /// Look the profile up among the shipped defaults
        #[arg(long)]
        default: bool,
    },

    /// Check that the toolchain packages are installed
    CheckDeps,

    /// Install the toolchain packages
    InstallDeps,

    /// List firmware profiles
    Profiles,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => serve::execute(config, host, port).await?,

        Commands::Make {
            port,
            profile,
            default,
        } => {
            let request = MakeRequest {
                port,
                profile_id: profile,
                is_default: default,
            };
            make::execute(config, request).await?;
        }

        Commands::CheckDeps => deps::check(&config).await?,

        Commands::InstallDeps => deps::install(&config).await?,

        Commands::Profiles => profiles::list(&config)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<FirmwareConfig> {
    match path {
        Some(path) => {
            tracing::debug!("Loading configuration from {}", path.display());
            Ok(FirmwareConfig::load(path)?)
        }
        None => Ok(FirmwareConfig::default()),
    }
}
