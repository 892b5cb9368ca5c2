//! Image rendering for wind field textures.
//!
//! Turns a [`wind_common::WindGrid`] into an RGBA texture where each pixel
//! encodes the wind direction and speed of one grid cell, then encodes it:
//! - PNG (lossless RGBA)
//! - JPEG (quality 100, alpha dropped)

pub mod error;
pub mod jpeg;
pub mod png;
pub mod texture;

pub use error::{RenderError, RenderResult};
pub use jpeg::encode_jpeg;
pub use png::create_png;
pub use texture::{decompose, map_value, WindTexture, MAX_SPEED};
