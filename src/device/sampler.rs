//! # Sensor Sampler
//!
//! Turns noisy raw ADC reads into one calibrated battery-voltage value.
//!
//! Each call averages a fixed number of raw reads for stability, then applies
//! the two-stage calibration chain: counts → volts at the ADC pin, then the
//! divider ratio and per-unit gain correction back to pack volts.

use crate::config::CalibrationConfig;
use crate::device::Sensor;
use crate::error::Result;

/// Averaging sampler over an injected raw sensor.
pub struct SensorSampler<S: Sensor> {
    sensor: S,
    calibration: CalibrationConfig,
    sample_count: u32,
}

impl<S: Sensor> SensorSampler<S> {
    /// # Arguments
    ///
    /// * `sensor` - Raw sensor driver
    /// * `calibration` - Scale factors for this unit
    /// * `sample_count` - Raw reads averaged per sample (must be >= 1)
    #[must_use]
    pub fn new(sensor: S, calibration: CalibrationConfig, sample_count: u32) -> Self {
        Self {
            sensor,
            calibration,
            sample_count: sample_count.max(1),
        }
    }

    /// Produce one calibrated value.
    ///
    /// Hardware reads are 16-bit; each is shifted down to the ADC's native
    /// 12 bits before averaging, matching the front-end resolution.
    ///
    /// # Errors
    ///
    /// Propagates the first raw-read failure; a partial average is never
    /// reported as a real value.
    pub fn sample(&mut self) -> Result<f64> {
        let mut acc: f64 = 0.0;
        for _ in 0..self.sample_count {
            acc += (self.sensor.read_raw()? >> 4) as f64;
        }
        let raw = acc / self.sample_count as f64;

        let v_adc = raw * self.calibration.adc_scale;
        let v_batt = v_adc * self.calibration.divider_scale * self.calibration.gain;
        Ok(v_batt)
    }

    /// Read and drop one raw value (warmup discard)
    ///
    /// # Errors
    ///
    /// Propagates raw-read failures.
    pub fn discard_one(&mut self) -> Result<()> {
        let _ = self.sensor.read_raw()?;
        Ok(())
    }
}
