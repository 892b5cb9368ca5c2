//! The rendered wind field served to clients.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use gfs_fetch::FetchOutcome;
use renderer::{create_png, encode_jpeg, WindTexture};
use sha2::{Digest, Sha256};
use tracing::info;
use wind_common::{Cycle, WindResult};

/// Output formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Match an extension including the leading dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".jpg" => Some(ImageFormat::Jpeg),
            ".png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

/// Encoded image bytes and their strong ETag.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Bytes,
    pub etag: String,
}

impl EncodedImage {
    pub fn new(data: Vec<u8>) -> Self {
        let etag = format!("\"{}\"", hex::encode(Sha256::digest(&data)));
        Self {
            data: Bytes::from(data),
            etag,
        }
    }
}

/// One immutable generation of the wind field.
#[derive(Debug, Clone)]
pub struct WindArtifact {
    pub png: EncodedImage,
    pub jpg: EncodedImage,
    /// When the update that produced this started
    pub updated: DateTime<Utc>,
    pub cycle: Cycle,
    /// GFS object path the data came from
    pub source: String,
    /// Unpublished cycles skipped to get here
    pub fallbacks: u32,
    /// Fetch attempts it took, including the successful one
    pub attempts: u32,
}

impl WindArtifact {
    /// Render and encode a fetched grid. CPU-bound; call from a blocking
    /// context.
    pub fn render(outcome: FetchOutcome, updated: DateTime<Utc>) -> WindResult<Self> {
        let texture = WindTexture::from_grid(&outcome.grid);
        info!(
            width = texture.width(),
            height = texture.height(),
            "Generated image, encoding"
        );
        let png = EncodedImage::new(create_png(&texture)?);
        let jpg = EncodedImage::new(encode_jpeg(&texture)?);
        Ok(Self {
            png,
            jpg,
            updated,
            cycle: outcome.cycle,
            source: outcome.source,
            fallbacks: outcome.fallbacks,
            attempts: outcome.attempts,
        })
    }

    pub fn image(&self, format: ImageFormat) -> &EncodedImage {
        match format {
            ImageFormat::Jpeg => &self.jpg,
            ImageFormat::Png => &self.png,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etag_is_quoted_sha256() {
        let image = EncodedImage::new(b"abc".to_vec());
        assert_eq!(
            image.etag,
            "\"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad\""
        );
        assert_eq!(image.data.as_ref(), b"abc");
    }

    #[test]
    fn test_formats() {
        assert_eq!(ImageFormat::from_extension(".jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension(".png"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension(".jpeg"), None);
        assert_eq!(ImageFormat::from_extension("."), None);
        assert_eq!(ImageFormat::Png.content_type(), "image/png");
    }
}
