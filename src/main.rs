mod api;
mod config;
mod error;
mod models;
mod poller;
mod sink;

use anyhow::{Context, Result};
use api::{RadarClient, RadarSource};
use clap::Parser;
use config::{Config, Overrides};
use poller::{CycleOutcome, Poller};
use sink::CsvSink;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Record radar positions of one transit line to CSV")]
struct Args {
    /// Load settings from a YAML file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Product type to track (e.g. bus, tram)
    #[arg(long)]
    product: Option<String>,
    /// Line name to track, matched exactly
    #[arg(long)]
    line: Option<String>,
    /// CSV output file
    #[arg(long)]
    output: Option<PathBuf>,
    /// Seconds to sleep between polls
    #[arg(long)]
    interval: Option<u64>,
    /// Run a single poll cycle and exit
    #[arg(long, default_value_t = false)]
    once: bool,
    /// Print every movement in one radar response and exit without writing
    #[arg(long, default_value_t = false)]
    inspect: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let base = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let config = base.with_overrides(Overrides {
        product: args.product,
        line: args.line,
        output: args.output,
        interval_secs: args.interval,
    });
    config.validate().context("invalid configuration")?;

    let client = RadarClient::new(&config)?;
    tracing::info!(url = client.url(), "Radar client ready");

    if args.inspect {
        return inspect(&client).await;
    }

    let sink = CsvSink::new(&config.output);
    sink.ensure_initialized()
        .with_context(|| format!("initializing {}", config.output.display()))?;

    println!("Start tracking {} {}", config.line.product, config.line.name);
    println!("Saving to: {}", sink.path().display());

    let mut poller = Poller::new(&config, client, sink);

    if args.once {
        let outcome = poller.tick().await;
        let stats = poller.stats();
        return match outcome {
            CycleOutcome::Failed(e) => Err(e).context("poll cycle failed"),
            CycleOutcome::Saved(rows) => {
                tracing::info!(rows, total_rows = stats.rows_written, "Single cycle finished");
                Ok(())
            }
            CycleOutcome::NoMatch => {
                tracing::info!(empty_cycles = stats.empty_cycles, "Single cycle finished");
                Ok(())
            }
        };
    }

    poller.run().await;
    Ok(())
}

/// Dump one radar snapshot, all lines included
async fn inspect(client: &RadarClient) -> Result<()> {
    let response = client.fetch().await.context("fetching radar snapshot")?;

    println!("Number of movements: {}", response.movements.len());

    for (i, movement) in response.movements.iter().enumerate() {
        println!("\n--- Movement {} ---", i);
        match &movement.line {
            Some(line) => {
                println!("  Product: {:?}", line.product);
                println!("  Line: {:?}", line.name);
            }
            None => println!("  Line data: NONE"),
        }
        println!("  Trip ID: {:?}", movement.trip_id);
        println!("  Direction: {:?}", movement.direction);
        match &movement.location {
            Some(loc) => println!("  Position: {:?}, {:?}", loc.latitude, loc.longitude),
            None => println!("  Position: NONE"),
        }
        println!("  Heading: {:?}", movement.heading);
        println!("  Speed: {:?}", movement.speed);
    }

    Ok(())
}
