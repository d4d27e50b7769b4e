//! # Device Driver Module
//!
//! Hardware seams for the device side: the raw ADC sensor and the heartbeat
//! LED. Both are traits injected into the session handler rather than
//! module-level singletons, so the server loop can run against fakes in tests
//! and against a simulated pack on a dev machine.

pub mod sampler;

use rand::Rng;

use crate::error::Result;

/// Raw sensor read access.
///
/// Readings are 16-bit ADC counts as delivered by the hardware; the sampler
/// owns down-shifting and calibration. Reads can fail: a flaky I2C bus or a
/// disconnected front-end surfaces as an `Err`, never as a fabricated value.
pub trait Sensor: Send {
    /// Read one raw 16-bit sample
    fn read_raw(&mut self) -> Result<u16>;
}

/// Heartbeat indicator.
///
/// Purely observational; the server blinks it after each sent record. Setting
/// the LED must never block or fail, so the trait is infallible.
pub trait StatusLed: Send {
    fn set(&mut self, on: bool);
}

/// Simulated battery pack for running `vbatt-device` without hardware.
///
/// Produces ADC counts for a nominal voltage with a little uniform noise,
/// discharging very slowly so logs look plausible.
pub struct SimulatedSensor {
    /// Battery volts currently simulated
    volts: f64,
    /// Volts lost per raw read (slow discharge)
    droop_per_read: f64,
    /// Peak-to-peak noise in volts
    noise: f64,
    /// Inverse of the calibration chain, volts back to 16-bit counts
    counts_per_volt: f64,
}

impl SimulatedSensor {
    #[must_use]
    pub fn new(volts: f64, adc_scale: f64, divider_scale: f64) -> Self {
        // read_raw reports 16-bit counts; the sampler shifts to 12 bits
        // before applying adc_scale, so pre-multiply by 16 here
        let counts_per_volt = 16.0 / (adc_scale * divider_scale);
        Self {
            volts,
            droop_per_read: 1e-6,
            noise: 0.01,
            counts_per_volt,
        }
    }
}

impl Sensor for SimulatedSensor {
    fn read_raw(&mut self) -> Result<u16> {
        let mut rng = rand::thread_rng();
        let jitter = rng.gen_range(-self.noise..=self.noise);
        self.volts = (self.volts - self.droop_per_read).max(0.0);
        let counts = ((self.volts + jitter) * self.counts_per_volt).round();
        Ok(counts.clamp(0.0, u16::MAX as f64) as u16)
    }
}

/// No-op heartbeat for headless runs and tests
#[derive(Debug, Default)]
pub struct NullLed;

impl StatusLed for NullLed {
    fn set(&mut self, _on: bool) {}
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::VbattLinkError;
    use std::sync::{Arc, Mutex};

    /// Mock sensor replaying a fixed sequence of raw counts
    #[derive(Clone)]
    pub struct MockSensor {
        readings: Arc<Mutex<Vec<u16>>>,
        pub read_count: Arc<Mutex<usize>>,
        pub fail_after: Arc<Mutex<Option<usize>>>,
    }

    impl MockSensor {
        pub fn new(readings: Vec<u16>) -> Self {
            Self {
                readings: Arc::new(Mutex::new(readings)),
                read_count: Arc::new(Mutex::new(0)),
                fail_after: Arc::new(Mutex::new(None)),
            }
        }

        /// Constant-output sensor
        pub fn steady(raw: u16) -> Self {
            Self::new(vec![raw])
        }

        pub fn set_fail_after(&self, reads: usize) {
            *self.fail_after.lock().unwrap() = Some(reads);
        }

        pub fn reads(&self) -> usize {
            *self.read_count.lock().unwrap()
        }
    }

    impl Sensor for MockSensor {
        fn read_raw(&mut self) -> Result<u16> {
            let mut count = self.read_count.lock().unwrap();
            if let Some(limit) = *self.fail_after.lock().unwrap() {
                if *count >= limit {
                    return Err(VbattLinkError::Sensor("mock front-end fault".to_string()));
                }
            }
            let readings = self.readings.lock().unwrap();
            let raw = readings[*count % readings.len()];
            *count += 1;
            Ok(raw)
        }
    }

    /// Mock LED recording every transition
    #[derive(Clone)]
    pub struct MockLed {
        pub transitions: Arc<Mutex<Vec<bool>>>,
    }

    impl MockLed {
        pub fn new() -> Self {
            Self {
                transitions: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn history(&self) -> Vec<bool> {
            self.transitions.lock().unwrap().clone()
        }
    }

    impl StatusLed for MockLed {
        fn set(&mut self, on: bool) {
            self.transitions.lock().unwrap().push(on);
        }
    }
}
