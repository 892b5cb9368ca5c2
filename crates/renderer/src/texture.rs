//! Wind vectors to RGBA pixels.
//!
//! Each cell becomes one pixel:
//!
//! | channel | value                         | input range |
//! |---------|-------------------------------|-------------|
//! | R       | x component of the unit vector | -1..1       |
//! | G       | y component of the unit vector | -1..1       |
//! | B       | speed (m/s)                   | 0..30       |
//! | A       | 255                           |             |
//!
//! Rows run north to south and columns west to east from -180°, matching
//! the grid layout, so the texture maps directly onto an equirectangular
//! globe.

use rayon::prelude::*;
use tracing::debug;
use wind_common::WindGrid;

use crate::error::{RenderError, RenderResult};

/// Speed mapped to full blue.
pub const MAX_SPEED: f64 = 30.0;

/// Split a vector into its magnitude and unit vector.
///
/// A zero vector has no direction; it decomposes to `(0, 0, 0)` instead of
/// NaN so calm cells render as the midpoint color.
pub fn decompose(u: f64, v: f64) -> (f64, f64, f64) {
    let s = (u * u + v * v).sqrt();
    if s == 0.0 {
        return (0.0, 0.0, 0.0);
    }
    (s, u / s, v / s)
}

/// Clamp `value` to `[in_min, in_max]` and map it linearly onto
/// `[out_min, out_max]`.
pub fn map_value(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    if value < in_min {
        return out_min;
    }
    if value > in_max {
        return out_max;
    }
    (value - in_min) / (in_max - in_min) * (out_max - out_min) + out_min
}

#[inline]
fn pixel(uv: [f32; 2]) -> [u8; 4] {
    let (s, x, y) = decompose(f64::from(uv[0]), f64::from(uv[1]));
    [
        map_value(x, -1.0, 1.0, 0.0, 255.0) as u8,
        map_value(y, -1.0, 1.0, 0.0, 255.0) as u8,
        map_value(s, 0.0, MAX_SPEED, 0.0, 255.0) as u8,
        255,
    ]
}

/// An RGBA8 image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindTexture {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl WindTexture {
    /// Render every cell of `grid`.
    pub fn from_grid(grid: &WindGrid) -> Self {
        let width = grid.lng_dim();
        let height = grid.lat_dim();
        let mut pixels = vec![0u8; width * height * 4];

        pixels
            .par_chunks_mut(width * 4)
            .zip(grid.values().par_chunks(width))
            .for_each(|(row, cells)| {
                for (out, uv) in row.chunks_exact_mut(4).zip(cells) {
                    out.copy_from_slice(&pixel(*uv));
                }
            });

        debug!(width, height, "Generated wind texture");
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Wrap raw RGBA bytes.
    pub fn from_rgba(width: usize, height: usize, pixels: Vec<u8>) -> RenderResult<Self> {
        if pixels.len() != width * height * 4 {
            return Err(RenderError::Dimensions {
                width,
                height,
                len: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.pixels[i..i + 4]);
        Some(px)
    }

    /// The pixels without the alpha channel.
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(self.width * self.height * 3);
        for px in self.pixels.chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
        }
        rgb
    }
}
