#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Entry point for the flood dispatch server and its maintenance commands.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use floodguard_config::FloodguardConfig;
use floodguard_dispatch::sinks::LogBroadcaster;
use floodguard_jobs::LogPushDelivery;
use floodguard_models::GeoPoint;
use floodguard_server::{AppState, ServerError, parse_point, run_server};

#[derive(Parser)]
#[command(name = "floodguard_server", about = "Flood emergency dispatch server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the REST API and run background jobs (default)
    Serve,
    /// Run one risk refresh against live weather and print the zone table
    Refresh {
        /// Comma-separated zone IDs to refresh. All zones when omitted.
        #[arg(long)]
        zones: Option<String>,
    },
    /// Resolve a safe route between two points
    Route {
        /// Start point as "lat,lon"
        #[arg(long, value_parser = parse_point)]
        from: GeoPoint,
        /// End point as "lat,lon"
        #[arg(long, value_parser = parse_point)]
        to: GeoPoint,
    },
}

fn live_state(config: &FloodguardConfig) -> Result<AppState, ServerError> {
    AppState::with_live_providers(config, Arc::new(LogPushDelivery), Arc::new(LogBroadcaster))
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();
    let config = FloodguardConfig::load()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await?,
        Commands::Refresh { zones } => {
            let state = live_state(&config)?;
            state.pipeline.seed().await?;

            let ids: Option<Vec<String>> = zones.map(|s| {
                s.split(',')
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect()
            });
            let updated = state.pipeline.refresh(ids.as_deref()).await?;

            println!(
                "{:<18} {:<28} {:>6} {:>9}  LEVEL",
                "ID", "NAME", "SCORE", "RAIN(mm)"
            );
            println!("{}", "-".repeat(75));
            for zone in state.store.list_zones().await? {
                println!(
                    "{:<18} {:<28} {:>6.2} {:>9.1}  {}",
                    zone.id,
                    zone.name,
                    zone.risk_score,
                    zone.predicted_rainfall_mm,
                    zone.risk_level()
                );
            }
            println!("\n{updated} zone(s) refreshed");
            state.scheduler.stop().await;
        }
        Commands::Route { from, to } => {
            let state = live_state(&config)?;
            state.pipeline.seed().await?;
            state.pipeline.refresh(None).await?;

            let route = state.resolver.resolve(from, to).await?;
            println!(
                "{} route: {:.2} km, ~{:.0} min, avg risk {:.2}, {} waypoints",
                route.source,
                route.distance_km,
                route.estimated_minutes,
                route.avg_risk_score,
                route.waypoints.len()
            );
            state.scheduler.stop().await;
        }
    }

    Ok(())
}
