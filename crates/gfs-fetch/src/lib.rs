//! GFS wind data acquisition.
//!
//! Locates the newest published GFS analysis on an S3-style mirror and pulls
//! only the two wind components out of it:
//! - `.idx` sidecar parsing to find byte offsets ([`index`])
//! - HTTP Range requests for the GRIB messages ([`range`])
//! - decoding through an external `gribber` process ([`decoder`])
//! - cycle fallback and per-cycle retries ([`engine`])

pub mod config;
pub mod decoder;
pub mod engine;
pub mod index;
pub mod path;
pub mod range;

pub use config::{normalize_mirror, FetchConfig, DEFAULT_MIRROR};
pub use decoder::{Decoder, DecoderTable, GribberDecoder, PointSink};
pub use engine::{FetchEngine, FetchOutcome};
pub use index::{parse_index, ByteRange, IndexReader};
pub use path::gfs_path;
pub use range::{RangeFetcher, GRIB_MAGIC};

/// Build the HTTP client shared by the index reader and range fetcher.
pub fn http_client() -> wind_common::WindResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(30))
        .pool_max_idle_per_host(4)
        .tcp_nodelay(true)
        .build()
        .map_err(|e| wind_common::WindError::Internal(format!("Failed to create HTTP client: {e}")))
}

pub(crate) fn transient(err: reqwest::Error) -> wind_common::FetchError {
    wind_common::FetchError::Transient(err.to_string())
}
