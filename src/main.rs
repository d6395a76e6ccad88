//! This file defines the pickup-explorer binary entry point.

use pickup_explorer::app;
use pickup_explorer::cli::{self, CommandLineArgs};
use pickup_explorer::error::{log_error_chain, ExplorerError};
use pickup_explorer::metrics;
use pickup_explorer::server;
use pickup_explorer::tracing;

use std::process::exit;

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse();
    tracing::init_tracing();
    if let Err(err) = run(&args).await {
        log_error_chain(&err);
        exit(1)
    }
}

/// Load the dataset and serve until shutdown.
async fn run(args: &CommandLineArgs) -> Result<(), ExplorerError> {
    args.validate()?;
    metrics::register_metrics();
    app::init(args)?;
    let service = app::service(args)?;
    server::serve(args, service).await;
    Ok(())
}
