pub mod actions;
pub mod area;
pub mod config;
pub mod data;
pub mod error;
pub mod render;
pub mod server;
pub mod store;
pub mod types;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the drawing session API and the page assets
    Serve {
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Report the total polygon area of a GeoJSON file
    Area {
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the registered actions and their parameters
    Actions {
        /// Include actions hidden from the user
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_or_default(config.as_deref())?;
            server::start_server(app_config).await?;
        }
        Commands::Area { input, json } => {
            println!("{}", area_command(input, *json)?);
        }
        Commands::Actions { all } => {
            println!("{}", actions_command(*all)?);
        }
    }

    Ok(())
}

fn area_command(input: &Path, json: bool) -> anyhow::Result<String> {
    let mut features = store::FeatureStore::new();
    features.apply_upserts(data::load_features(input)?);

    let report = area::aggregate(&features.snapshot());
    for skipped in &report.skipped {
        tracing::warn!("Skipped feature {}: {}", skipped.id, skipped.reason);
    }

    if json {
        Ok(serde_json::to_string_pretty(&report)?)
    } else {
        Ok(render::area_summary(&report))
    }
}

fn actions_command(all: bool) -> anyhow::Result<String> {
    let specs: Vec<_> = if all {
        actions::ACTIONS.iter().collect()
    } else {
        actions::user_facing().collect()
    };
    Ok(serde_json::to_string_pretty(&specs)?)
}
