//! pages CLI - build, clean and serve a static front-end project.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pages_pipeline::{Config, CONFIG_FILE};
use pages_server::DEFAULT_PORT;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "pages")]
#[command(about = "Compile, optimize and serve static front-end projects")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config override file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project into the dist directory
    Build,

    /// Remove the temp and dist directories
    Clean,

    /// Compile, then serve with live reload
    Develop {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Open the browser once the server is up
        #[arg(long)]
        open: bool,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let root = std::env::current_dir().context("Failed to resolve the working directory")?;

    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(&root.join(&cli.config), yes)?;
        }
        Commands::Build => {
            commands::build::run(Config::load_from(&cli.config, root)).await?;
        }
        Commands::Clean => {
            commands::clean::run(Config::load_from(&cli.config, root)).await?;
        }
        Commands::Develop { port, open } => {
            commands::develop::run(Config::load_from(&cli.config, root), port, open).await?;
        }
    }

    Ok(())
}
