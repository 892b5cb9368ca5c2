//! Command-line and environment configuration.
//!
//! Every option can also be set through a `WINDY_*` environment variable
//! (or a `.env` file). Numeric overrides follow one convention: `0` keeps
//! the built-in default and a negative value removes the limit.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::HeaderName;
use clap::Parser;
use gfs_fetch::{normalize_mirror, FetchConfig};

/// How long a request waits for a running update before serving old data.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// A numeric override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit<T> {
    Default,
    Unlimited,
    Set(T),
}

impl<T> Limit<T> {
    /// `None` means no limit.
    pub fn resolve(self, default: T) -> Option<T> {
        match self {
            Limit::Default => Some(default),
            Limit::Unlimited => None,
            Limit::Set(value) => Some(value),
        }
    }
}

impl Limit<Duration> {
    /// Interpret signed (fractional) seconds.
    pub fn from_secs(secs: f64) -> Self {
        if secs == 0.0 || secs.is_nan() {
            return Limit::Default;
        }
        if secs < 0.0 {
            return Limit::Unlimited;
        }
        Duration::try_from_secs_f64(secs).map_or(Limit::Unlimited, Limit::Set)
    }
}

impl Limit<u32> {
    pub fn from_count(count: i64) -> Self {
        match count {
            0 => Limit::Default,
            n if n < 0 => Limit::Unlimited,
            n => Limit::Set(u32::try_from(n).unwrap_or(u32::MAX)),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "windy")]
#[command(about = "Generates and serves GFS wind field textures")]
pub struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080", env = "WINDY_LISTEN")]
    pub listen: String,

    /// Log level or filter directive (e.g. "debug", "windy=debug,info")
    #[arg(long, default_value = "info", env = "WINDY_LOG_LEVEL")]
    pub log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "WINDY_LOG_JSON")]
    pub log_json: bool,

    /// Path to the gribber executable (github.com/noritada/grib-rs)
    #[arg(long, default_value = "gribber", env = "WINDY_GRIBBER")]
    pub gribber: PathBuf,

    /// Seconds to wait for a running update before serving old data (negative for no limit)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true, env = "WINDY_RESPONSE_TIMEOUT")]
    pub response_timeout: f64,

    /// Trusted header containing the client address (e.g. X-Forwarded-For)
    #[arg(long, env = "WINDY_PROXY_HEADER")]
    pub proxy_header: Option<String>,

    /// GFS forecast data mirror
    #[arg(long, env = "WINDY_GFS")]
    pub gfs: Option<String>,

    /// GFS lng/lat grid precision in degrees
    #[arg(long, default_value_t = 0.0, env = "WINDY_GFS_PRECISION")]
    pub gfs_precision: f64,

    /// GFS wind level (e.g. "850 mb")
    #[arg(long, env = "WINDY_GFS_LEVEL")]
    pub gfs_level: Option<String>,

    /// Seconds to spend on one update in total (negative for no limit)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true, env = "WINDY_TIMEOUT")]
    pub timeout: f64,

    /// Seconds to spend fetching a single cycle (negative for no limit)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true, env = "WINDY_FETCH_TIMEOUT")]
    pub fetch_timeout: f64,

    /// Previous cycles to try when the current one isn't published (negative for no limit)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true, env = "WINDY_MAX_PREV_CYCLES")]
    pub max_prev_cycles: i64,

    /// Retries of a cycle that exists but failed to fetch (negative for no limit)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true, env = "WINDY_MAX_RETRY")]
    pub max_retry: i64,

    /// Write wind_field.jpg and wind_field.png to the current directory and exit
    #[arg(long, env = "WINDY_ONCE")]
    pub once: bool,
}

impl Args {
    /// Resolve the fetch engine settings, applying defaults.
    pub fn fetch_config(&self) -> Result<FetchConfig> {
        let defaults = FetchConfig::default();
        let mirror = match self.gfs.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => normalize_mirror(raw).context("invalid --gfs")?,
            None => defaults.mirror,
        };
        let precision = if self.gfs_precision == 0.0 {
            defaults.precision
        } else {
            self.gfs_precision
        };
        let level = match self.gfs_level.as_deref().map(str::trim) {
            Some(level) if !level.is_empty() => level.to_string(),
            _ => defaults.level,
        };

        Ok(FetchConfig {
            mirror,
            precision,
            level,
            timeout: Limit::from_secs(self.timeout).resolve(Duration::from_secs(100)),
            fetch_timeout: Limit::from_secs(self.fetch_timeout).resolve(Duration::from_secs(20)),
            max_prev_cycles: Limit::from_count(self.max_prev_cycles).resolve(3 * 4),
            max_retry: Limit::from_count(self.max_retry).resolve(3),
        })
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        Limit::from_secs(self.response_timeout).resolve(DEFAULT_RESPONSE_TIMEOUT)
    }

    pub fn proxy_header(&self) -> Result<Option<HeaderName>> {
        match self.proxy_header.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => HeaderName::from_bytes(name.as_bytes())
                .map(Some)
                .with_context(|| format!("invalid --proxy-header {name:?}")),
            _ => Ok(None),
        }
    }
}
