//! Fetch engine configuration.

use std::time::Duration;

use reqwest::Url;
use wind_common::{WindError, WindResult};

/// Public NOAA GFS bucket.
pub const DEFAULT_MIRROR: &str = "https://noaa-gfs-bdp-pds.s3.amazonaws.com/";

/// Configuration for [`crate::FetchEngine`].
///
/// `None` limits mean "no limit".
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// GFS mirror root
    pub mirror: Url,
    /// Grid precision in degrees
    pub precision: f64,
    /// Vertical level of the wind components (e.g., "850 mb")
    pub level: String,
    /// Total time budget for one update, across all cycles and retries
    pub timeout: Option<Duration>,
    /// Time budget for a single attempt at one cycle
    pub fetch_timeout: Option<Duration>,
    /// How many earlier cycles to try when the current one is not published
    pub max_prev_cycles: Option<u32>,
    /// How many times to retry a cycle that exists but failed to fetch
    pub max_retry: Option<u32>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mirror: Url::parse(DEFAULT_MIRROR).expect("default mirror is a valid URL"),
            precision: 0.25,
            level: "850 mb".to_string(),
            timeout: Some(Duration::from_secs(100)),
            fetch_timeout: Some(Duration::from_secs(20)),
            max_prev_cycles: Some(3 * 4), // 3 days
            max_retry: Some(3),
        }
    }
}

/// Parse a mirror URL, requiring an absolute http(s) URL and ensuring the
/// path ends in `/` so object paths can be joined onto it.
pub fn normalize_mirror(raw: &str) -> WindResult<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| WindError::InvalidConfig(format!("invalid gfs url {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(WindError::InvalidConfig(format!(
            "invalid gfs url {raw:?}: not an absolute http(s) url"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_trailing_slash() {
        let url = normalize_mirror("https://mirror.example.com/noaa/gfs").unwrap();
        assert_eq!(url.as_str(), "https://mirror.example.com/noaa/gfs/");

        let url = normalize_mirror("http://127.0.0.1:9000").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/");
    }

    #[test]
    fn test_normalize_rejects_relative_and_other_schemes() {
        assert!(matches!(
            normalize_mirror("noaa-gfs-bdp-pds/"),
            Err(WindError::InvalidConfig(_))
        ));
        assert!(matches!(
            normalize_mirror("ftp://example.com/gfs/"),
            Err(WindError::InvalidConfig(_))
        ));
        assert!(matches!(
            normalize_mirror("mailto:someone@example.com"),
            Err(WindError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert_eq!(config.mirror.as_str(), DEFAULT_MIRROR);
        assert_eq!(config.level, "850 mb");
        assert_eq!(config.max_prev_cycles, Some(12));
        assert_eq!(config.max_retry, Some(3));
    }
}
