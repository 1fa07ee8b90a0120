//! # Warband Sim
//!
//! Headless driver for the Warband movement core.
//!
//! Spawns two opposing warbands and a player on an open field, runs the
//! movement core against a straight-line executor and a toy combat resolver,
//! and prints a JSON report of how the run ended.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod combat;
mod config;
mod executor;
mod scenario;
mod timing;

#[cfg(test)]
mod e2e_tests;

use anyhow::Result;
use config::SimConfig;
use scenario::Scenario;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("warband=info".parse()?))
        .init();

    info!("Warband sim starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1) {
        Some(path) => SimConfig::load_from(path),
        None => SimConfig::default(),
    };
    config.movement.check()?;

    let mut scenario = Scenario::new(config)?;
    let report = scenario.run();
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("Warband sim finished");
    Ok(())
}
