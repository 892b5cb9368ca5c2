//! Background refresh of the wind field.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gfs_fetch::FetchEngine;
use metrics::{counter, histogram};
use tokio::sync::broadcast;
use tracing::{error, info};
use wind_cache::{RefreshError, ResultCache};
use wind_common::ErrorKind;

use crate::artifact::WindArtifact;

/// Time between the end of one update and the start of the next.
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Periodically fetches and renders the latest wind field into the cache.
#[derive(Clone)]
pub struct Updater {
    engine: Arc<FetchEngine>,
    cache: Arc<ResultCache<WindArtifact>>,
    interval: Duration,
}

impl Updater {
    pub fn new(engine: Arc<FetchEngine>, cache: Arc<ResultCache<WindArtifact>>) -> Self {
        Self {
            engine,
            cache,
            interval: UPDATE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one update, storing the result (or error) in the cache.
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        let started = Instant::now();
        let engine = self.engine.clone();
        let result = self
            .cache
            .update_with(async move {
                let updated = Utc::now();
                let outcome = engine.fetch_latest(updated).await?;
                tokio::task::spawn_blocking(move || WindArtifact::render(outcome, updated))
                    .await
                    .map_err(|e| {
                        if e.is_panic() {
                            RefreshError::Panicked(format!("render: {e}").into())
                        } else {
                            RefreshError::new(ErrorKind::InternalFault, format!("render: {e}"))
                        }
                    })?
                    .map_err(RefreshError::from)
            })
            .await;

        histogram!("windy_refresh_duration_seconds").record(started.elapsed().as_secs_f64());
        let label = match &result {
            Ok(()) => "ok",
            Err(e) => e.kind().as_str(),
        };
        counter!("windy_refresh_total", "result" => label).increment(1);
        result
    }

    /// Update immediately, then again [`UPDATE_INTERVAL`] after each update
    /// finishes, until `shutdown` fires.
    ///
    /// Each update runs in its own task. On shutdown the loop returns without
    /// waiting for it; the update stops at its own deadline.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(interval = ?self.interval, "Starting update worker");

        loop {
            info!("Updating wind field");
            let attempt = {
                let this = self.clone();
                tokio::spawn(async move { this.refresh().await })
            };

            tokio::select! {
                _ = shutdown.recv() => break,
                joined = attempt => match joined {
                    Ok(Ok(())) => {
                        if let Some(read) = self.cache.peek() {
                            if let Some(artifact) = read.value {
                                info!(
                                    cycle = %artifact.cycle,
                                    source = %artifact.source,
                                    fallbacks = artifact.fallbacks,
                                    attempts = artifact.attempts,
                                    "Updated wind field"
                                );
                            }
                        }
                    }
                    Ok(Err(e)) => error!(error = %e, kind = e.kind().as_str(), "Failed to update wind field"),
                    Err(e) => error!(error = %e, "Update task failed"),
                },
            }

            info!(r#in = ?self.interval, "Scheduled next update");
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Update worker stopped");
    }
}
