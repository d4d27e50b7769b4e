//! # vbatt-device
//!
//! Device-side telemetry server: samples the (simulated) battery ADC and
//! streams one calibrated reading per interval to whichever single client is
//! connected.
//!
//! Configuration comes from the TOML file named by `VBATT_LINK_CONFIG`
//! (default `config.toml`); a missing file means compiled-in defaults. A
//! listener-level failure is fatal by design: restarting the process is the
//! supervisor's job, not this binary's.

use anyhow::Result;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use vbatt_link::config::Config;
use vbatt_link::device::sampler::SensorSampler;
use vbatt_link::device::{NullLed, SimulatedSensor};
use vbatt_link::server::TelemetryServer;

/// Simulated pack voltage when running without hardware
const SIMULATED_PACK_VOLTS: f64 = 4.2;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("vbatt-device v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::var("VBATT_LINK_CONFIG")
        .unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load_or_default(&config_path)?;
    info!("config: {} (listen port {})", config_path, config.device.listen_port);

    let sensor = SimulatedSensor::new(
        SIMULATED_PACK_VOLTS,
        config.calibration.adc_scale,
        config.calibration.divider_scale,
    );
    let sampler = SensorSampler::new(sensor, config.calibration.clone(), config.device.sample_count);
    let mut server = TelemetryServer::new(sampler, NullLed, config.device.clone());

    let listener = TcpListener::bind(("0.0.0.0", config.device.listen_port)).await?;
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

    server.run(listener, token).await?;
    info!("server stopped");
    Ok(())
}
