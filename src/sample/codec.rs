//! # Sample Binary Codec
//!
//! Encodes and decodes the fixed-size on-disk record layout.
//!
//! A recording file is a plain sequence of these records with no header and
//! no checksum; end of file is end of stream. The layout is nine `f32`
//! little-endian values in declaration order (yaw, pitch, roll, accel x/y/z,
//! gyro x/y/z), so a record is exactly [`RECORD_SIZE`] bytes regardless of
//! platform padding rules.

use std::io::Read;

use crate::error::{ImuBridgeError, Result};
use crate::sample::Sample;

/// Size of one binary sample record in bytes (9 × f32)
pub const RECORD_SIZE: usize = 36;

/// Encode a sample into its fixed binary record layout
///
/// # Arguments
///
/// * `sample` - The sample to encode
///
/// # Returns
///
/// * `[u8; RECORD_SIZE]` - The 36-byte little-endian record
///
/// # Examples
///
/// ```
/// use imu_bridge::sample::Sample;
/// use imu_bridge::sample::codec::{encode_sample, RECORD_SIZE};
///
/// let record = encode_sample(&Sample::default());
/// assert_eq!(record.len(), RECORD_SIZE);
/// ```
pub fn encode_sample(sample: &Sample) -> [u8; RECORD_SIZE] {
    let fields = [
        sample.yaw,
        sample.pitch,
        sample.roll,
        sample.accel_x,
        sample.accel_y,
        sample.accel_z,
        sample.gyro_x,
        sample.gyro_y,
        sample.gyro_z,
    ];

    let mut record = [0u8; RECORD_SIZE];
    for (i, value) in fields.iter().enumerate() {
        record[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }
    record
}

/// Decode a fixed binary record back into a sample
///
/// # Arguments
///
/// * `record` - A full 36-byte record
pub fn decode_sample(record: &[u8; RECORD_SIZE]) -> Sample {
    let field = |i: usize| {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&record[i * 4..i * 4 + 4]);
        f32::from_le_bytes(bytes)
    };

    Sample {
        yaw: field(0),
        pitch: field(1),
        roll: field(2),
        accel_x: field(3),
        accel_y: field(4),
        accel_z: field(5),
        gyro_x: field(6),
        gyro_y: field(7),
        gyro_z: field(8),
    }
}

/// Read the next record from a reader.
///
/// Returns `Ok(None)` at a clean end of file. A file ending partway through
/// a record is corrupt (the writer only ever appends whole records).
///
/// # Errors
///
/// Returns `Storage` on read failure and `CorruptRecording` on a partial
/// trailing record.
pub fn read_sample<R: Read>(reader: &mut R) -> Result<Option<Sample>> {
    let mut record = [0u8; RECORD_SIZE];
    let mut filled = 0;

    while filled < RECORD_SIZE {
        let n = reader.read(&mut record[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ImuBridgeError::CorruptRecording(format!(
                "trailing partial record of {} bytes",
                filled
            )));
        }
        filled += n;
    }

    Ok(Some(decode_sample(&record)))
}
