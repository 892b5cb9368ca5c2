//! GRIB `.idx` sidecar files.
//!
//! NOAA publishes a small text index next to every GRIB2 file. Each line
//! describes one message:
//!
//! ```text
//! 1:0:d=2024010100:PRMSL:mean sea level:anl:
//! 2:990253:d=2024010100:CLWMR:1 hybrid level:anl:
//! ```
//!
//! Field 1 is the byte offset of the message and fields 3/4 are the parameter
//! code and level. A message ends one byte before the next one starts; the
//! last message runs to the end of the file.

use std::fmt;

use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};
use wind_common::{ComponentSpec, FetchError, FetchResult};

use crate::transient;

const INDEX_FIELDS: usize = 7;

/// Byte span of one GRIB message, inclusive on both ends.
///
/// `end == 0` means the message runs to the end of the file.
/// [`ByteRange::ZERO`] marks a component missing from the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub const ZERO: ByteRange = ByteRange { start: 0, end: 0 };

    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn is_open_ended(&self) -> bool {
        self.end == 0
    }

    /// Value for the HTTP `Range` header.
    pub fn header_value(&self) -> String {
        if self.is_open_ended() {
            format!("bytes={}-", self.start)
        } else {
            format!("bytes={}-{}", self.start, self.end)
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_open_ended() {
            write!(f, "[{}, EOF]", self.start)
        } else {
            write!(f, "[{}, {}]", self.start, self.end)
        }
    }
}

/// Resolve the byte range of each requested component from index text.
///
/// The returned vector is parallel to `components`; components absent from
/// the index get [`ByteRange::ZERO`].
pub fn parse_index(text: &str, components: &[ComponentSpec]) -> FetchResult<Vec<ByteRange>> {
    let mut ranges = vec![ByteRange::ZERO; components.len()];
    let mut current: Option<usize> = None;

    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() != INDEX_FIELDS {
            return Err(FetchError::Malformed(format!(
                "unexpected number of fields in line {line:?}"
            )));
        }
        let offset: u64 = fields[1].parse().map_err(|e| {
            FetchError::Malformed(format!("invalid offset {:?}: {e}", fields[1]))
        })?;

        if let Some(i) = current.take() {
            if offset <= ranges[i].start {
                return Err(FetchError::Malformed(format!(
                    "offset {offset} in line {line:?} does not follow {}",
                    ranges[i].start
                )));
            }
            ranges[i].end = offset - 1;
        }

        for (i, component) in components.iter().enumerate() {
            if component.matches(fields[3], fields[4]) {
                current = Some(i);
                ranges[i] = ByteRange::new(offset, 0);
            }
        }
    }

    Ok(ranges)
}

/// Fetches and parses `.idx` files.
#[derive(Debug, Clone)]
pub struct IndexReader {
    client: Client,
}

impl IndexReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetch `{base}.idx` and resolve `components` in it.
    ///
    /// A 404 is reported as [`FetchError::NotFound`] so the caller can fall
    /// back to an earlier cycle.
    #[instrument(skip(self, components), fields(url = %base))]
    pub async fn fetch(
        &self,
        base: &str,
        components: &[ComponentSpec],
    ) -> FetchResult<Vec<ByteRange>> {
        let url = format!("{base}.idx");
        let response = self.client.get(&url).send().await.map_err(transient)?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound(url)),
            status => {
                return Err(FetchError::Transient(format!("response status {status}")));
            }
        }

        let text = response.text().await.map_err(transient)?;
        let ranges = parse_index(&text, components)?;
        debug!(?ranges, "Resolved grib index");
        Ok(ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wind() -> [ComponentSpec; 2] {
        ComponentSpec::wind("850 mb")
    }

    #[test]
    fn test_two_records_then_eof() {
        let text = "1:100:d=2024010100:UGRD:850 mb:anl:\n2:500:d=2024010100:VGRD:850 mb:anl:";
        let ranges = parse_index(text, &wind()).unwrap();
        assert_eq!(ranges[0], ByteRange::new(100, 499));
        assert_eq!(ranges[1], ByteRange::new(500, 0));
        assert!(ranges[1].is_open_ended());
    }

    #[test]
    fn test_match_closed_by_unmatched_record() {
        let text = "\
1:0:d=2024010100:PRMSL:mean sea level:anl:
2:1000:d=2024010100:UGRD:850 mb:anl:
3:2000:d=2024010100:VGRD:850 mb:anl:
4:3000:d=2024010100:UGRD:800 mb:anl:
5:4000:d=2024010100:TMP:850 mb:anl:
";
        let ranges = parse_index(text, &wind()).unwrap();
        assert_eq!(ranges, vec![ByteRange::new(1000, 1999), ByteRange::new(2000, 2999)]);
    }

    #[test]
    fn test_missing_component_is_zero() {
        let text = "1:0:d=2024010100:UGRD:500 mb:anl:\n2:10:d=2024010100:UGRD:850 mb:anl:\n";
        let ranges = parse_index(text, &wind()).unwrap();
        assert_eq!(ranges[0], ByteRange::new(10, 0));
        assert!(ranges[1].is_zero());
    }

    #[test]
    fn test_empty_lines_and_crlf_are_skipped() {
        let text = "1:100:d=x:UGRD:850 mb:anl:\r\n\r\n\n2:200:d=x:VGRD:850 mb:anl:\r\n";
        let ranges = parse_index(text, &wind()).unwrap();
        assert_eq!(ranges, vec![ByteRange::new(100, 199), ByteRange::new(200, 0)]);
    }

    #[test]
    fn test_wrong_field_count_is_fatal() {
        let text = "1:100:d=x:UGRD:850 mb:anl\n";
        assert!(matches!(parse_index(text, &wind()), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn test_non_numeric_offset_is_fatal() {
        let text = "1:abc:d=x:UGRD:850 mb:anl:\n";
        let err = parse_index(text, &wind()).unwrap_err();
        assert!(err.to_string().contains("invalid offset \"abc\""));
    }

    #[test]
    fn test_non_increasing_offset_is_fatal() {
        let text = "1:100:d=x:UGRD:850 mb:anl:\n2:100:d=x:VGRD:850 mb:anl:\n";
        assert!(matches!(parse_index(text, &wind()), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn test_header_values() {
        assert_eq!(ByteRange::new(100, 499).header_value(), "bytes=100-499");
        assert_eq!(ByteRange::new(500, 0).header_value(), "bytes=500-");
        assert_eq!(ByteRange::new(500, 0).to_string(), "[500, EOF]");
    }
}
