//! Windy wind field service.
//!
//! Fetches the latest GFS wind analysis every hour, renders it as an RGBA
//! texture and serves it as `/wind_field.{jpg,png}`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use gfs_fetch::{FetchEngine, GribberDecoder};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use wind_cache::ResultCache;

use windy::{router, AppState, Args, Updater};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    let config = args.fetch_config()?;
    let proxy_header = args.proxy_header()?;
    info!(
        gribber = %args.gribber.display(),
        gfs = %config.mirror,
        gfs_precision = config.precision,
        gfs_level = %config.level,
        timeout = ?config.timeout,
        fetch_timeout = ?config.fetch_timeout,
        max_prev_cycles = ?config.max_prev_cycles,
        max_retry = ?config.max_retry,
        response_timeout = ?args.response_timeout(),
        proxy_header = ?proxy_header,
        "Starting windy"
    );

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder, metrics disabled");
            None
        }
    };

    let decoder = Arc::new(GribberDecoder::new(args.gribber.clone()));
    let engine = Arc::new(FetchEngine::new(config, decoder).context("invalid fetch configuration")?);
    let cache = Arc::new(ResultCache::new());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let worker = tokio::spawn(Updater::new(engine, cache.clone()).run(shutdown_tx.subscribe()));

    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received interrupt, shutting down");
            shutdown_tx.send(()).ok();

            tokio::signal::ctrl_c().await.ok();
            warn!("Received second interrupt, exiting immediately");
            std::process::exit(130);
        });
    }

    if args.once {
        info!("Waiting for wind field");
        let mut shutdown = shutdown_tx.subscribe();
        let read = tokio::select! {
            read = cache.get(None) => read?,
            _ = shutdown.recv() => bail!("interrupted before the wind field was ready"),
        };
        if let Some(err) = read.error {
            error!(error = %err, "Failed to get wind field images");
            bail!("failed to get wind field images: {err}");
        }
        let Some(artifact) = read.value else {
            bail!("no wind field available");
        };
        tokio::fs::write("wind_field.jpg", &artifact.jpg.data)
            .await
            .context("save wind_field.jpg")?;
        tokio::fs::write("wind_field.png", &artifact.png.data)
            .await
            .context("save wind_field.png")?;
        info!("Saved images");
        shutdown_tx.send(()).ok();
        worker.await.ok();
        return Ok(());
    }

    let state = Arc::new(AppState {
        cache,
        response_timeout: args.response_timeout(),
        metrics,
        proxy_header,
    });
    let app = router(state);

    let addr: SocketAddr = args.listen.parse().context("invalid --listen address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("listen on {addr}"))?;
    info!(address = %addr, "Serving http");

    let mut shutdown = shutdown_tx.subscribe();
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            shutdown.recv().await.ok();
        })
        .await?;

    worker.await.ok();
    info!("Stopped");
    Ok(())
}

fn init_tracing(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid --log-level")?;

    let builder = fmt().with_env_filter(filter).with_target(true);
    let installed = if args.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("initialize tracing: {e}"))
}
