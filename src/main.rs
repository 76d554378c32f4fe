use std::process::ExitCode;

use batchpipe::Orchestrator;
use batchpipe::cli::Args;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(code = e.error_code(), error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    println!("batchpipe {}", env!("CARGO_PKG_VERSION"));
    println!(
        "Fetching {} items with {} I/O workers, transforming with up to {} CPU workers",
        config.fetch.item_count, config.fetch.io_workers, config.process.cpu_workers
    );

    let orchestrator = match Orchestrator::with_defaults(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!(code = e.error_code(), error = %e, "Failed to start");
            return ExitCode::FAILURE;
        }
    };

    let cancel = orchestrator.cancel_token();
    let signals = tokio::spawn(batchpipe::cancel_on_signal(cancel.clone()));

    let outcome = orchestrator.run().await;
    cancel.cancel();
    let _ = signals.await;

    match outcome {
        Ok(report) => {
            println!();
            println!("{}", report.fetch);
            println!();
            println!("{}", report.process);
            println!();
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(code = e.error_code(), error = %e, "Run aborted");
            ExitCode::FAILURE
        }
    }
}
