//! plughost binary.
//!
//! ```text
//! plughost [--conf <path>] [run [--watch]]   load plugins and serve until Ctrl-C
//! plughost [--conf <path>] plan              print discovery result and load order
//! plughost [--conf <path>] check             validate configuration
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use plughost::config::load_config;
use plughost::plugin::PluginManager;
use plughost::plugins::builtin_factory;
use plughost::Bootstrap;

#[derive(Parser)]
#[command(name = "plughost")]
#[command(about = "Configuration-driven plugin host", long_about = None)]
struct Cli {
    /// Configuration file, or directory of *.toml files.
    #[arg(short, long, default_value = "configs")]
    conf: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load plugins and run until interrupted
    Run {
        /// Reload configuration on change
        #[arg(long)]
        watch: bool,
    },
    /// Print which plugins the configuration activates and their load order
    Plan,
    /// Validate the configuration and exit
    Check,
}

#[derive(Serialize)]
struct Plan<'a> {
    activated: &'a [String],
    load_order: Vec<PlanEntry<'a>>,
}

#[derive(Serialize)]
struct PlanEntry<'a> {
    name: &'a str,
    weight: i32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run { watch: false }) {
        Commands::Run { watch } => {
            Bootstrap::new(builtin_factory())
                .watch_config(watch)
                .run(&cli.conf, shutdown_signal())
                .await?;
        }
        Commands::Plan => {
            let config = load_config(&cli.conf)?;
            let mut manager = PluginManager::new();
            let activated = manager.discover(&config, &builtin_factory());
            let plan = Plan {
                activated: &activated,
                load_order: manager
                    .load_order()
                    .into_iter()
                    .map(|(name, weight)| PlanEntry { name, weight })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Check => {
            load_config(&cli.conf)?;
            println!("{}: configuration OK", cli.conf.display());
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C, shutting down");
    }
}
