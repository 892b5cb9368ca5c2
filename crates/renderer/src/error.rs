use thiserror::Error;
use wind_common::WindError;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("pixel buffer of {len} bytes does not match {width}x{height} RGBA")]
    Dimensions {
        width: usize,
        height: usize,
        len: usize,
    },

    #[error("encode png: {0}")]
    Png(#[from] std::io::Error),

    #[error("encode jpeg: {0}")]
    Jpeg(#[from] image::ImageError),
}

impl From<RenderError> for WindError {
    fn from(err: RenderError) -> Self {
        WindError::Render(err.to_string())
    }
}
