//! # News Tail
//!
//! A continuous ingestion loop that polls a news search API, validates each
//! returned article into a canonical record, and forwards every record to a
//! partitioned event stream.
//!
//! ## Usage
//!
//! ```sh
//! NEWSAPI_KEY=... news_tail --query technology --sink kinesis --stream-name news-articles
//! ```
//!
//! ## Architecture
//!
//! Each cycle runs three stages in order:
//! 1. **Fetching**: one search request for the configured query
//! 2. **Validation**: each raw item becomes a [`models::Record`] or is rejected
//! 3. **Publishing**: each record is written to the stream, keyed by its id
//!
//! Failed items are skipped. A failed cycle makes the loop wait a shorter
//! backoff interval before trying again. The loop runs until interrupted.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cadence;
mod cli;
mod config;
mod error;
mod fetch;
mod models;
mod pipeline;
mod publish;
mod sinks;
mod utils;
mod validate;

use cadence::TokioSleeper;
use cli::Cli;
use config::Config;
use fetch::NewsApiClient;
use pipeline::Pipeline;
use publish::Publisher;
use sinks::Sink;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // .env may carry RUST_LOG, so load it before the subscriber
    let dotenv = dotenvy::dotenv();

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "news_tail starting up");

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Ignoring unreadable .env file"),
    }

    // Parse CLI
    let config = match Config::from_cli(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration; refusing to start");
            return Err(e.into());
        }
    };
    debug!(?config, "Configuration loaded");

    // --- Clients live for the whole process ---
    let source = NewsApiClient::new(
        config.api_base.clone(),
        config.api_key.clone(),
        config.request_timeout,
    )?;
    let sink = match Sink::connect(&config.sink).await {
        Ok(sink) => sink,
        Err(e) => {
            error!(error = %e, "Failed to set up stream sink");
            return Err(e.into());
        }
    };

    let mut pipeline = Pipeline::new(
        source,
        Publisher::new(sink),
        config.query.clone(),
        config.cadence.clone(),
        TokioSleeper,
    );

    tokio::select! {
        _ = pipeline.run() => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received");
        }
    }

    let totals = pipeline.totals();
    info!(
        cycles = totals.cycles,
        failed_cycles = totals.failed_cycles,
        published = totals.published,
        rejected = totals.rejected,
        publish_failed = totals.publish_failed,
        state = %pipeline.state(),
        "news_tail stopped"
    );

    Ok(())
}
