//! d20 server binary.
//!
//! # Usage
//!
//! ```bash
//! # Serve a table on port 8080
//! d20-server --config table.json
//!
//! # Bind elsewhere and serve a front end
//! d20-server --host 127.0.0.1 --port 3000 --config table.json --static-dir ./static
//! ```

use std::path::PathBuf;

use clap::Parser;
use d20_core::HubConfig;
use d20_server::{Server, ServerRuntimeConfig, TableConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// d20 table server
#[derive(Parser, Debug)]
#[command(name = "d20-server")]
#[command(about = "Shared dice table with a live results feed")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind to
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Path to the table configuration (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Directory to serve under /static
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Events buffered per live observer
    #[arg(long, default_value = "1")]
    observer_queue: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("d20 server starting");

    let table = TableConfig::from_file(&args.config)?;
    tracing::info!("Loaded table configuration from {}", args.config.display());

    let config = ServerRuntimeConfig {
        bind_address: format!("{}:{}", args.host, args.port),
        table,
        static_dir: args.static_dir,
        hub: HubConfig { queue_capacity: args.observer_queue },
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
