//! Partial GRIB downloads via HTTP Range requests.

use bytes::Bytes;
use reqwest::{header, Client, StatusCode};
use tracing::{debug, instrument};
use wind_common::{FetchError, FetchResult};

use crate::index::ByteRange;
use crate::transient;

/// Every GRIB message starts with these four bytes.
pub const GRIB_MAGIC: &[u8; 4] = b"GRIB";

/// Downloads byte ranges of a remote GRIB file.
#[derive(Debug, Clone)]
pub struct RangeFetcher {
    client: Client,
}

impl RangeFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetch `range` of `base`. The server must answer with 206 Partial
    /// Content; a 200 means it ignored the range and is rejected.
    #[instrument(skip(self), fields(url = %base, range = %range))]
    pub async fn fetch(&self, base: &str, range: ByteRange) -> FetchResult<Bytes> {
        let response = self
            .client
            .get(base)
            .header(header::RANGE, range.header_value())
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("get grib: {e}")))?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {}
            StatusCode::NOT_FOUND => {
                return Err(FetchError::NotFound(format!("get grib: {base}")));
            }
            StatusCode::OK => {
                return Err(FetchError::Transient(
                    "get grib: server did not accept range request".to_string(),
                ));
            }
            status => {
                return Err(FetchError::Transient(format!(
                    "get grib: response status {status}"
                )));
            }
        }

        let body = response.bytes().await.map_err(transient)?;
        if !body.starts_with(GRIB_MAGIC) {
            return Err(FetchError::Transient(
                "get grib: response does not start with grib magic".to_string(),
            ));
        }
        debug!(bytes = body.len(), "Fetched grib message");
        Ok(body)
    }
}
