//! Grasshopper - AST-aware AI code completion language server
//!
//! stdout carries the protocol; every log line goes to stderr.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grasshopper::app::App;
use grasshopper::cli::Cli;

fn main() {
    let cli = Cli::parse();

    // Use RUST_LOG=grasshopper=debug or --log-level for verbose output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(cli.log_filter())
                .unwrap_or_else(|_| Cli::DEFAULT_LOG_FILTER.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(false)
                .compact(),
        )
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {}", e);
            std::process::exit(2);
        }
    };

    match runtime.block_on(async_main(cli)) {
        Ok(code) => {
            // Blocking backend calls may still be parked on the pool
            runtime.shutdown_background();
            std::process::exit(code);
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(cli: Cli) -> anyhow::Result<i32> {
    if cli.stdio {
        tracing::debug!("--stdio given; stdio is the only transport");
    }

    let app = App::load(cli.config.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize: {}", e))?;

    let server = app.into_server();
    Ok(server.run(tokio::io::stdin(), tokio::io::stdout()).await)
}
