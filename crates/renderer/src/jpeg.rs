//! JPEG encoding of wind textures.
//!
//! JPEG has no alpha channel. The texture is always opaque, so alpha is
//! dropped rather than composited.

use image::codecs::jpeg::JpegEncoder;
use image::ColorType;

use crate::error::RenderResult;
use crate::texture::WindTexture;

/// Highest quality; the texture is data, not a photo.
pub const JPEG_QUALITY: u8 = 100;

pub fn encode_jpeg(texture: &WindTexture) -> RenderResult<Vec<u8>> {
    let rgb = texture.to_rgb();
    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    encoder.encode(
        &rgb,
        texture.width() as u32,
        texture.height() as u32,
        ColorType::Rgb8,
    )?;
    Ok(jpeg)
}
