mod pricing;
mod runtime;
mod seed;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tunda-cli")]
#[command(about = "Tunda delivery fee and address tooling")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Load regions, landmarks and default delivery settings into the database.
    /// With no flags, all three are seeded.
    Seed {
        #[arg(long)]
        regions: bool,
        #[arg(long)]
        landmarks: bool,
        #[arg(long)]
        settings: bool,
    },
    /// Compute a delivery fee for a JSON request file
    Quote {
        /// Path to a `{cart_items, delivery_address}` JSON document
        file: PathBuf,
        /// Use the YAML seed files and default settings instead of the database
        #[arg(long)]
        offline: bool,
    },
    /// Resolve a free-text address to coordinates
    Geocode {
        address: String,
        #[arg(long)]
        sub_county_id: Option<i64>,
        #[arg(long)]
        county_id: Option<i64>,
        #[arg(long)]
        offline: bool,
    },
    /// Print the delivery settings a quote would use
    Settings {
        #[arg(long)]
        offline: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("tunda-cli ready; run with --help to list commands");
        return Ok(());
    };

    let config = tunda_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match command {
        Commands::Db { command } => {
            let pool = runtime::connect(&config).await?;
            match command {
                DbCommands::Ping => {
                    tunda_db::ping(&pool).await?;
                    println!("database reachable");
                }
                DbCommands::Migrate => {
                    let applied = tunda_db::run_migrations(&pool).await?;
                    println!("migrations up to date ({applied} applied)");
                }
            }
        }
        Commands::Seed {
            regions,
            landmarks,
            settings,
        } => {
            let pool = runtime::connect(&config).await?;
            let targets = seed::SeedTargets::from_flags(regions, landmarks, settings);
            seed::run_seed(&pool, &config, targets).await?;
        }
        Commands::Quote { file, offline } => {
            let engine = runtime::build_engine(&config, offline).await?;
            pricing::run_quote(&engine, &file).await?;
        }
        Commands::Geocode {
            address,
            sub_county_id,
            county_id,
            offline,
        } => {
            let engine = runtime::build_engine(&config, offline).await?;
            pricing::run_geocode(&engine, &address, sub_county_id, county_id).await?;
        }
        Commands::Settings { offline } => {
            let engine = runtime::build_engine(&config, offline).await?;
            pricing::run_settings(&engine).await?;
        }
    }

    Ok(())
}
