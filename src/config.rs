//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Both binaries share one file: `vbatt-device` reads the `[device]` and
//! `[calibration]` tables, `vbatt-host` reads `[host]`. Every field has a
//! compiled-in default, so a missing file or an empty table is valid.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub host: HostConfig,
}

/// Device-side sampler/server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    /// TCP port the telemetry server listens on
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Settle delay after a client connects, before any reads are trusted
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Raw reads discarded after the settle delay
    #[serde(default = "default_discard_samples")]
    pub discard_samples: u32,

    /// Spacing between discarded warmup reads
    #[serde(default = "default_discard_spacing_ms")]
    pub discard_spacing_ms: u64,

    /// Interval between streamed records
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Raw reads averaged per record
    #[serde(default = "default_sample_count")]
    pub sample_count: u32,

    /// Heartbeat LED on-time after each sent record
    #[serde(default = "default_heartbeat_blink_ms")]
    pub heartbeat_blink_ms: u64,
}

/// Calibration scale factors, applied in two stages: raw ADC counts to volts
/// at the pin, then the divider ratio and per-unit gain correction.
///
/// Passed explicitly to the sampler so per-unit calibration is a config edit,
/// not a redeploy.
#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationConfig {
    /// Volts per 12-bit ADC count (full scale / 4095)
    #[serde(default = "default_adc_scale")]
    pub adc_scale: f64,

    /// Voltage-divider ratio from battery to ADC pin
    #[serde(default = "default_divider_scale")]
    pub divider_scale: f64,

    /// Per-unit gain correction measured against a reference meter
    #[serde(default = "default_gain")]
    pub gain: f64,
}

/// Host-side client/logger configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HostConfig {
    /// Device address to connect to, `host:port`
    #[serde(default = "default_server_addr")]
    pub server_addr: String,

    /// Output CSV path
    #[serde(default = "default_out_csv")]
    pub out_csv: String,

    /// Delay between failed connection attempts
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

// Default value functions
fn default_listen_port() -> u16 { 5007 }
fn default_settle_ms() -> u64 { 2000 }
fn default_discard_samples() -> u32 { 8 }
fn default_discard_spacing_ms() -> u64 { 20 }
fn default_sample_interval_ms() -> u64 { 1000 }
fn default_sample_count() -> u32 { 32 }
fn default_heartbeat_blink_ms() -> u64 { 60 }

fn default_adc_scale() -> f64 { 3.3 / 4095.0 }
fn default_divider_scale() -> f64 { 3.0 }
fn default_gain() -> f64 { 1.0 }

fn default_server_addr() -> String { "192.168.1.50:5007".to_string() }
fn default_out_csv() -> String { "vbatt_log.csv".to_string() }
fn default_reconnect_delay_ms() -> u64 { 2000 }

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            settle_ms: default_settle_ms(),
            discard_samples: default_discard_samples(),
            discard_spacing_ms: default_discard_spacing_ms(),
            sample_interval_ms: default_sample_interval_ms(),
            sample_count: default_sample_count(),
            heartbeat_blink_ms: default_heartbeat_blink_ms(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            adc_scale: default_adc_scale(),
            divider_scale: default_divider_scale(),
            gain: default_gain(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            server_addr: default_server_addr(),
            out_csv: default_out_csv(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when the file exists, otherwise fall back to the
    /// compiled-in defaults. Both binaries use this so a bare checkout runs
    /// without any config file.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.device.sample_count == 0 {
            return Err(crate::error::VbattLinkError::Config(
                toml::de::Error::custom("device sample_count must be at least 1")
            ));
        }

        if self.device.sample_interval_ms == 0 {
            return Err(crate::error::VbattLinkError::Config(
                toml::de::Error::custom("device sample_interval_ms must be non-zero")
            ));
        }

        if self.calibration.adc_scale <= 0.0 || self.calibration.divider_scale <= 0.0 {
            return Err(crate::error::VbattLinkError::Config(
                toml::de::Error::custom("calibration scale factors must be positive")
            ));
        }

        if self.host.server_addr.is_empty() {
            return Err(crate::error::VbattLinkError::Config(
                toml::de::Error::custom("host server_addr cannot be empty")
            ));
        }

        if self.host.out_csv.is_empty() {
            return Err(crate::error::VbattLinkError::Config(
                toml::de::Error::custom("host out_csv cannot be empty")
            ));
        }

        Ok(())
    }
}
