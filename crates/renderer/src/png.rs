//! PNG encoding for RGBA image data (color type 6).
//!
//! The wind texture has far more than 256 distinct colors, so there is no
//! indexed mode; rows are written unfiltered and zlib-compressed.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::RenderResult;
use crate::texture::WindTexture;

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Encode `texture` as an 8-bit RGBA PNG.
///
/// The output depends only on the pixels, so identical textures produce
/// identical bytes (and ETags).
pub fn create_png(texture: &WindTexture) -> RenderResult<Vec<u8>> {
    let (width, height) = (texture.width(), texture.height());
    let mut png = Vec::new();
    png.extend_from_slice(&SIGNATURE);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(6); // color type (RGBA)
    ihdr.push(0); // compression method
    ihdr.push(0); // filter method
    ihdr.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr);

    let idat = deflate_rows(texture.as_rgba(), width * 4)?;
    write_chunk(&mut png, b"IDAT", &idat);

    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut crc = crc32fast::Hasher::new();
    crc.update(chunk_type);
    crc.update(data);
    png.extend_from_slice(&crc.finalize().to_be_bytes());
}

/// Prefix every scanline with filter type 0 (none) and deflate.
fn deflate_rows(pixels: &[u8], stride: usize) -> RenderResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    for row in pixels.chunks_exact(stride) {
        encoder.write_all(&[0])?;
        encoder.write_all(row)?;
    }
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture() -> WindTexture {
        let mut pixels = Vec::new();
        for y in 0..3u8 {
            for x in 0..4u8 {
                pixels.extend_from_slice(&[x * 60, y * 100, x ^ y, 255]);
            }
        }
        WindTexture::from_rgba(4, 3, pixels).unwrap()
    }

    #[test]
    fn test_png_structure() {
        let png = create_png(&texture()).unwrap();
        assert_eq!(&png[0..8], &SIGNATURE);
        // IHDR length and type
        assert_eq!(&png[8..16], &[0, 0, 0, 13, b'I', b'H', b'D', b'R']);
        assert_eq!(&png[16..20], &4u32.to_be_bytes());
        assert_eq!(&png[20..24], &3u32.to_be_bytes());
        assert_eq!(png[25], 6);
        assert_eq!(&png[png.len() - 8..png.len() - 4], b"IEND");
    }

    #[test]
    fn test_chunk_crc() {
        let mut out = Vec::new();
        write_chunk(&mut out, b"IEND", &[]);
        // well-known CRC of an empty IEND chunk
        assert_eq!(&out[8..], &[0xAE, 0x42, 0x60, 0x82]);
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(create_png(&texture()).unwrap(), create_png(&texture()).unwrap());
    }
}
