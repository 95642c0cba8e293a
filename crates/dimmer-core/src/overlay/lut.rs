//! Gamescope color lookup tables.
//!
//! Gamescope reads LUTs as raw arrays of little-endian `u16` quadruples
//! `(r, g, b, 0)`. Dimming is a linear scale of every channel, so the
//! shaper (1D) LUT carries the brightness and the 3D LUT stays identity.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};

/// Number of entries in the shaper LUT.
pub const LUT1D_SIZE: usize = 4096;

/// Edge length of the 3D LUT cube.
pub const LUT3D_SIZE: usize = 17;

/// Bytes per LUT entry (four `u16`).
pub const ENTRY_BYTES: usize = 8;

fn quantize(x: f64) -> u16 {
    (x * 65535.0).round_ties_even() as u16
}

fn check_level(brightness: f64) -> Result<()> {
    if (0.0..=1.0).contains(&brightness) {
        Ok(())
    } else {
        Err(Error::InvalidLevel(brightness))
    }
}

fn push_entry(out: &mut Vec<u8>, r: u16, g: u16, b: u16) {
    for channel in [r, g, b, 0] {
        out.extend_from_slice(&channel.to_le_bytes());
    }
}

/// Build a shaper LUT that scales every channel by `brightness`.
pub fn encode_lut1d(brightness: f64) -> Result<Vec<u8>> {
    check_level(brightness)?;
    let scale = |i: usize| quantize(i as f64 / (LUT1D_SIZE - 1) as f64 * brightness);

    let mut out = Vec::with_capacity(LUT1D_SIZE * ENTRY_BYTES);
    for i in 0..LUT1D_SIZE {
        let v = scale(i);
        push_entry(&mut out, v, v, v);
    }
    Ok(out)
}

/// Build a 3D LUT scaled by `brightness`, blue varying slowest.
pub fn encode_lut3d(brightness: f64) -> Result<Vec<u8>> {
    check_level(brightness)?;
    let scale = |i: usize| quantize(i as f64 / (LUT3D_SIZE - 1) as f64 * brightness);

    let mut out = Vec::with_capacity(LUT3D_SIZE.pow(3) * ENTRY_BYTES);
    for b in 0..LUT3D_SIZE {
        for g in 0..LUT3D_SIZE {
            for r in 0..LUT3D_SIZE {
                push_entry(&mut out, scale(r), scale(g), scale(b));
            }
        }
    }
    Ok(out)
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}

pub fn write_lut1d(path: &Path, brightness: f64) -> Result<()> {
    write_bytes(path, &encode_lut1d(brightness)?)
}

pub fn write_lut3d(path: &Path, brightness: f64) -> Result<()> {
    write_bytes(path, &encode_lut3d(brightness)?)
}
