//! Trait abstraction over the IMU driver to enable testing and bench use.
//!
//! The hardware interrupt does nothing but raise a "data ready" flag; the
//! acquisition loop polls that flag and performs the actual read outside
//! interrupt context. This seam models exactly that: `data_ready` is the
//! flag poll, `read_sample` the decode.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::sample::Sample;

#[cfg(test)]
use mockall::automock;

/// Source of IMU samples
#[cfg_attr(test, automock)]
pub trait ImuSource: Send {
    /// Whether a new sample is ready to be read this cycle
    fn data_ready(&mut self) -> bool;

    /// Read the pending sample
    ///
    /// # Errors
    ///
    /// Returns `Acquisition` if the sensor could not be read; the caller
    /// treats this as "no sample this cycle" and keeps polling.
    fn read_sample(&mut self) -> Result<Sample>;
}

/// Simulated IMU producing plausible motion without hardware.
///
/// Orientation performs a slow random walk, acceleration and angular rate
/// are small zero-centered noise. Always has data ready, so the acquisition
/// loop runs at its full polling cadence.
pub struct SimulatedImu {
    rng: StdRng,
    yaw: f32,
    pitch: f32,
    roll: f32,
}

impl SimulatedImu {
    /// Create a simulated source with an OS-seeded generator
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create a simulated source from a specific generator (deterministic in tests)
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
        }
    }

    fn walk(&mut self, value: f32) -> f32 {
        let step: f32 = self.rng.gen_range(-0.02..0.02);
        (value + step).clamp(-std::f32::consts::PI, std::f32::consts::PI)
    }
}

impl Default for SimulatedImu {
    fn default() -> Self {
        Self::new()
    }
}

impl ImuSource for SimulatedImu {
    fn data_ready(&mut self) -> bool {
        true
    }

    fn read_sample(&mut self) -> Result<Sample> {
        self.yaw = self.walk(self.yaw);
        self.pitch = self.walk(self.pitch);
        self.roll = self.walk(self.roll);

        Ok(Sample {
            yaw: self.yaw,
            pitch: self.pitch,
            roll: self.roll,
            accel_x: self.rng.gen_range(-0.5..0.5),
            accel_y: self.rng.gen_range(-0.5..0.5),
            accel_z: self.rng.gen_range(-0.5..0.5),
            gyro_x: self.rng.gen_range(-1.0..1.0),
            gyro_y: self.rng.gen_range(-1.0..1.0),
            gyro_z: self.rng.gen_range(-1.0..1.0),
        })
    }
}
