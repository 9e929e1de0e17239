//! # Sample Module
//!
//! The motion sample data unit and its serialized forms.
//!
//! This module handles:
//! - The fixed-layout [`Sample`] value (orientation, linear acceleration, angular rate)
//! - The JSON object form shared by the live stream and recording materialization
//! - The binary on-disk record layout (see [`codec`])
//! - The sensor source seam (see [`source`])

pub mod codec;
pub mod source;

use serde::{Deserialize, Serialize};

/// One motion measurement from the IMU.
///
/// Orientation comes from the sensor's onboard fusion engine as yaw/pitch/roll
/// in radians; acceleration has the gravity component removed. A `Sample` is
/// passed by value through the pipeline and owns nothing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    /// Yaw in radians
    pub yaw: f32,
    /// Pitch in radians
    pub pitch: f32,
    /// Roll in radians
    pub roll: f32,

    /// Linear acceleration X in m/s² (gravity removed)
    pub accel_x: f32,
    /// Linear acceleration Y in m/s² (gravity removed)
    pub accel_y: f32,
    /// Linear acceleration Z in m/s² (gravity removed)
    pub accel_z: f32,

    /// Angular rate X in rad/s
    pub gyro_x: f32,
    /// Angular rate Y in rad/s
    pub gyro_y: f32,
    /// Angular rate Z in rad/s
    pub gyro_z: f32,
}

/// JSON object form of a [`Sample`].
///
/// This is the single wire representation used both for live stream events
/// and for materialized recordings, so the two are textually identical for
/// the same sample. Orientation is converted to degrees here and nowhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleJson {
    /// Yaw, pitch, roll in degrees
    pub ypr: [f32; 3],
    /// Linear acceleration in m/s² (gravity removed)
    pub accel: [f32; 3],
    /// Angular rate in rad/s
    pub gyro: [f32; 3],
}

impl Sample {
    /// Convert to the JSON object form.
    ///
    /// Yaw/pitch/roll are converted from radians to degrees exactly once,
    /// at this serialization boundary.
    ///
    /// # Examples
    ///
    /// ```
    /// use imu_bridge::sample::Sample;
    ///
    /// let sample = Sample { yaw: std::f32::consts::PI, ..Sample::default() };
    /// let json = sample.to_json();
    /// assert!((json.ypr[0] - 180.0).abs() < 1e-3);
    /// ```
    pub fn to_json(&self) -> SampleJson {
        SampleJson {
            ypr: [
                self.yaw.to_degrees(),
                self.pitch.to_degrees(),
                self.roll.to_degrees(),
            ],
            accel: [self.accel_x, self.accel_y, self.accel_z],
            gyro: [self.gyro_x, self.gyro_y, self.gyro_z],
        }
    }
}
