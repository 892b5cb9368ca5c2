//! Cycle fallback and retry loop around a single wind grid fetch.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use reqwest::{Client, Url};
use tracing::{info, instrument, warn};
use wind_common::{
    ComponentSpec, Cycle, FetchError, Precision, WindError, WindGrid, WindResult, WIND_COMPONENTS,
};

use crate::config::{normalize_mirror, FetchConfig};
use crate::decoder::Decoder;
use crate::index::IndexReader;
use crate::path::gfs_path;
use crate::range::RangeFetcher;

/// A successfully fetched wind grid and where it came from.
#[derive(Debug)]
pub struct FetchOutcome {
    pub grid: WindGrid,
    /// Cycle the data belongs to
    pub cycle: Cycle,
    /// Object path relative to the mirror root
    pub source: String,
    /// How many cycles were skipped because they were not published
    pub fallbacks: u32,
    /// Total fetch attempts, including the successful one
    pub attempts: u32,
}

/// Finds and fetches the newest available GFS wind grid.
pub struct FetchEngine {
    mirror: Url,
    precision: Precision,
    components: [ComponentSpec; WIND_COMPONENTS],
    timeout: Option<Duration>,
    fetch_timeout: Option<Duration>,
    max_prev_cycles: Option<u32>,
    max_retry: Option<u32>,
    index: IndexReader,
    ranges: RangeFetcher,
    decoder: Arc<dyn Decoder>,
}

impl FetchEngine {
    pub fn new(config: FetchConfig, decoder: Arc<dyn Decoder>) -> WindResult<Self> {
        Self::with_client(config, decoder, crate::http_client()?)
    }

    /// Build an engine on an existing HTTP client. The configuration is
    /// validated here, before any I/O.
    pub fn with_client(
        config: FetchConfig,
        decoder: Arc<dyn Decoder>,
        client: Client,
    ) -> WindResult<Self> {
        let precision = Precision::new(config.precision)?;
        let mirror = normalize_mirror(config.mirror.as_str())?;
        let level = config.level.trim();
        if level.is_empty() {
            return Err(WindError::InvalidConfig("gfs level must not be empty".to_string()));
        }

        Ok(Self {
            mirror,
            precision,
            components: ComponentSpec::wind(level),
            timeout: config.timeout,
            fetch_timeout: config.fetch_timeout,
            max_prev_cycles: config.max_prev_cycles,
            max_retry: config.max_retry,
            index: IndexReader::new(client.clone()),
            ranges: RangeFetcher::new(client),
            decoder,
        })
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn mirror(&self) -> &Url {
        &self.mirror
    }

    pub fn components(&self) -> &[ComponentSpec] {
        &self.components
    }

    /// Fetch the grid for the cycle containing `now`, walking back through
    /// earlier cycles while they are not published yet.
    ///
    /// Fails with [`WindError::Timeout`] once the overall update budget is
    /// spent, with [`WindError::NoData`] after `max_prev_cycles` fallbacks,
    /// and with [`WindError::RetriesExhausted`] after `max_retry` failed
    /// retries of one cycle.
    pub async fn fetch_latest(&self, now: DateTime<Utc>) -> WindResult<FetchOutcome> {
        let start = Cycle::of(now);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.walk_cycles(start))
                .await
                .map_err(|_| WindError::Timeout(limit))?,
            None => self.walk_cycles(start).await,
        }
    }

    async fn walk_cycles(&self, start: Cycle) -> WindResult<FetchOutcome> {
        let mut cycle = start;
        let mut prev: u32 = 0;
        let mut attempts: u32 = 0;

        'cycle: loop {
            let source = gfs_path(cycle, self.precision);
            let url = self.mirror.join(&source).map_err(|e| {
                WindError::Internal(format!("failed to generate gfs url for {source:?}: {e}"))
            })?;

            let mut retry: u32 = 0;
            loop {
                attempts += 1;
                info!(prev, retry, url = %url, "Attempting to fetch wind data");

                let err = match self.attempt(url.as_str()).await {
                    Ok(grid) => {
                        info!(
                            path = %source,
                            cycle = %cycle,
                            prec = self.precision.degrees(),
                            level = %self.components[0].level,
                            lat = grid.lat_dim(),
                            lng = grid.lng_dim(),
                            "Got wind data"
                        );
                        return Ok(FetchOutcome {
                            grid,
                            cycle,
                            source,
                            fallbacks: prev,
                            attempts,
                        });
                    }
                    Err(err) => err,
                };

                if let WindError::InvalidConfig(_) = err {
                    return Err(err);
                }

                if err.is_not_found() {
                    warn!(gfs_cycle = %cycle, prev, error = %err, "No gfs data found");
                    if within(prev, self.max_prev_cycles) {
                        counter!("windy_cycle_fallbacks_total").increment(1);
                        prev += 1;
                        cycle = cycle.previous();
                        continue 'cycle;
                    }
                    return Err(WindError::NoData { cycle, prev });
                }

                warn!(gfs_cycle = %cycle, attempt = retry, error = %err, "Failed to get gfs data");
                if within(retry, self.max_retry) {
                    counter!("windy_fetch_retries_total").increment(1);
                    retry += 1;
                    continue;
                }
                return Err(WindError::RetriesExhausted {
                    retries: retry,
                    last: Box::new(err),
                });
            }
        }
    }

    /// One attempt at one cycle, bounded by the per-attempt timeout.
    async fn attempt(&self, base: &str) -> WindResult<WindGrid> {
        bounded(self.fetch_timeout, self.fetch_grid(base)).await
    }

    /// Fetch both wind components of the GRIB file at `base` into one grid.
    ///
    /// The index is read once. A component missing from it is a hard error
    /// rather than a reason to fall back, since the file itself exists.
    #[instrument(skip(self), fields(precision = %self.precision))]
    pub async fn fetch_grid(&self, base: &str) -> WindResult<WindGrid> {
        let ranges = self
            .index
            .fetch(base, &self.components)
            .await
            .map_err(|e| WindError::fetch("read grib index", e))?;

        for (spec, range) in self.components.iter().zip(&ranges) {
            if range.is_zero() {
                return Err(WindError::ComponentNotFound {
                    description: spec.description(),
                    component: spec.to_string(),
                    path: base.to_string(),
                });
            }
        }

        let mut grid = WindGrid::new(self.precision);
        for (i, (spec, range)) in self.components.iter().zip(ranges).enumerate() {
            let data = self
                .ranges
                .fetch(base, range)
                .await
                .map_err(|e| WindError::fetch(format!("fetch {} grib", spec.description()), e))?;

            let mut sink = |lat: f64, lng: f64, value: f64| grid.set(i, lat, lng, value);
            self.decoder.decode(data, &mut sink).await?;
            grid.verify_complete(i, spec)?;
        }
        Ok(grid)
    }
}

fn within(n: u32, limit: Option<u32>) -> bool {
    limit.map_or(true, |max| n < max)
}

async fn bounded<T>(
    limit: Option<Duration>,
    work: impl Future<Output = WindResult<T>>,
) -> WindResult<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
            Err(WindError::fetch(
                "fetch cycle",
                FetchError::Transient(format!("attempt timed out after {limit:?}")),
            ))
        }),
        None => work.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::decoder::PointSink;

    struct NoopDecoder;

    #[async_trait]
    impl Decoder for NoopDecoder {
        async fn decode(&self, _data: Bytes, _sink: &mut PointSink<'_>) -> WindResult<()> {
            Ok(())
        }
    }

    fn engine(config: FetchConfig) -> WindResult<FetchEngine> {
        FetchEngine::with_client(config, Arc::new(NoopDecoder), Client::new())
    }

    #[test]
    fn test_within_limits() {
        assert!(within(0, Some(3)));
        assert!(within(2, Some(3)));
        assert!(!within(3, Some(3)));
        assert!(!within(0, Some(0)));
        assert!(within(u32::MAX - 1, None));
    }

    #[test]
    fn test_invalid_precision_rejected_before_io() {
        let config = FetchConfig {
            precision: 0.123,
            ..FetchConfig::default()
        };
        assert!(matches!(engine(config), Err(WindError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_level_rejected() {
        let config = FetchConfig {
            level: "  ".to_string(),
            ..FetchConfig::default()
        };
        assert!(matches!(engine(config), Err(WindError::InvalidConfig(_))));
    }

    #[test]
    fn test_components_follow_level() {
        let config = FetchConfig {
            level: "500 mb".to_string(),
            ..FetchConfig::default()
        };
        let engine = engine(config).unwrap();
        let names: Vec<String> = engine.components().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, ["UGRD@500 mb", "VGRD@500 mb"]);
        assert_eq!(engine.precision().hundredths(), 25);
    }

    #[tokio::test]
    async fn test_bounded_attempt_expiry_is_transient() {
        let err = bounded(Some(Duration::from_millis(10)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), wind_common::ErrorKind::Transient);
        assert!(!err.is_not_found());
    }
}
