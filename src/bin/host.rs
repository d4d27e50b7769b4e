//! # vbatt-host
//!
//! Host-side telemetry logger: connects to the device (retrying forever),
//! reassembles line-delimited records from the TCP stream, and appends each
//! one to the CSV log with a UTC capture timestamp.
//!
//! Configuration comes from the TOML file named by `VBATT_LINK_CONFIG`
//! (default `config.toml`); a missing file means compiled-in defaults. A
//! storage failure on the log file is fatal with a diagnostic; connection
//! trouble never is.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use vbatt_link::client::{policy_from_delay_ms, TelemetryClient};
use vbatt_link::config::Config;
use vbatt_link::sink::CsvSink;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("vbatt-host v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::var("VBATT_LINK_CONFIG")
        .unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load_or_default(&config_path)?;
    info!(
        "config: {} (device {}, log {})",
        config_path, config.host.server_addr, config.host.out_csv
    );

    let mut sink = CsvSink::open(&config.host.out_csv)?;
    let client = TelemetryClient::new(
        config.host.server_addr.clone(),
        policy_from_delay_ms(config.host.reconnect_delay_ms),
    );
    info!("Press Ctrl+C to exit");

    // Handle Ctrl+C for graceful shutdown
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down...");
            signal_token.cancel();
        }
    });

    client.run(&mut sink, token).await?;
    info!("logger stopped");
    Ok(())
}
