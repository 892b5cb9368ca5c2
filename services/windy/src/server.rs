//! HTTP surface: wind field images, health and metrics.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, Extension},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Json, Redirect, Response},
    routing::{any, get},
    Router,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info_span, warn, Span};
use wind_cache::{CacheRead, ResultCache};

use crate::artifact::{ImageFormat, WindArtifact};

/// Where `/` points.
pub const PROJECT_URL: &str = "https://github.com/pgaskin/windy";

/// Filename prefixes served as the wind field.
pub const FILE_PREFIXES: [&str; 2] = ["wind_field.", "wind_cache."];

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

const X_GFS_SOURCE: HeaderName = HeaderName::from_static("x-gfs-source");
const X_GFS_CYCLE: HeaderName = HeaderName::from_static("x-gfs-cycle");
const X_GFS_REFRESH_ERROR: HeaderName = HeaderName::from_static("x-gfs-refresh-error");

/// Shared state for all handlers.
pub struct AppState {
    pub cache: Arc<ResultCache<WindArtifact>>,
    /// How long a request waits for a running update (`None` waits forever)
    pub response_timeout: Option<Duration>,
    pub metrics: Option<PrometheusHandle>,
    /// Trusted header carrying the client address, for request logs
    pub proxy_header: Option<HeaderName>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let proxy_header = state.proxy_header.clone();
    Router::new()
        .route("/", any(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(wind_handler)
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http().make_span_with(request_span(proxy_header)))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}

async fn root_handler() -> Redirect {
    Redirect::temporary(PROJECT_URL)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    has_data: bool,
    updating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cycle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

/// GET /health - liveness plus a summary of the cached data
async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> Json<HealthResponse> {
    let read = state.cache.peek();
    let artifact = read.as_ref().and_then(|r| r.value.clone());
    Json(HealthResponse {
        status: "ok",
        has_data: artifact.is_some(),
        updating: state.cache.is_updating(),
        cycle: artifact.as_ref().map(|a| a.cycle.to_string()),
        updated: artifact.as_ref().map(|a| a.updated.to_rfc3339()),
        last_error: read.and_then(|r| r.error).map(|e| e.to_string()),
    })
}

/// GET /metrics - Prometheus metrics endpoint
async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

/// Serves `/wind_field.{jpg,png}` and `/wind_cache.{jpg,png}`.
async fn wind_handler(
    Extension(state): Extension<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let Some(name) = wind_file_name(uri.path()) else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };
    if method != Method::GET && method != Method::HEAD {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "HEAD, GET")],
            "Method Not Allowed",
        )
            .into_response();
    }

    debug!(
        %method,
        path = uri.path(),
        if_none_match = ?headers.get(header::IF_NONE_MATCH),
        if_modified_since = ?headers.get(header::IF_MODIFIED_SINCE),
        "Handle wind field request"
    );

    let mut out = HeaderMap::new();
    set(&mut out, header::DATE, &http_date(Utc::now()));

    let read = match state.cache.get(state.response_timeout).await {
        Ok(read) => read,
        Err(_) => CacheRead {
            value: None,
            error: None,
            stale: true,
        },
    };
    if let Some(err) = &read.error {
        set(&mut out, X_GFS_REFRESH_ERROR, &header_safe(&err.to_string()));
    }
    let Some(artifact) = read.value else {
        counter!("windy_http_requests_total", "status" => "503").increment(1);
        let body = match &read.error {
            None => "Initial data update not complete yet.".to_string(),
            Some(err) => format!("No data available (last error: {err})."),
        };
        return (StatusCode::SERVICE_UNAVAILABLE, out, body).into_response();
    };

    set(&mut out, X_GFS_SOURCE, &artifact.source);
    set(&mut out, X_GFS_CYCLE, &artifact.cycle.to_string());
    set(&mut out, header::LAST_MODIFIED, &http_date(artifact.updated));

    let ext = name.rfind('.').map_or("", |i| &name[i..]);
    let Some(format) = ImageFormat::from_extension(ext) else {
        return (
            StatusCode::NOT_FOUND,
            out,
            format!("No image available for extension {ext}."),
        )
            .into_response();
    };
    let image = artifact.image(format);
    set(&mut out, header::ETAG, &image.etag);

    if not_modified(&headers, &image.etag, artifact.updated) {
        counter!("windy_http_requests_total", "status" => "304").increment(1);
        return (StatusCode::NOT_MODIFIED, out).into_response();
    }

    counter!("windy_http_requests_total", "status" => "200").increment(1);
    set(&mut out, header::CONTENT_TYPE, format.content_type());
    out.insert(header::CONTENT_LENGTH, HeaderValue::from(image.data.len()));
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from(image.data.clone())
    };
    (StatusCode::OK, out, body).into_response()
}

fn request_span(proxy_header: Option<HeaderName>) -> impl Fn(&Request<Body>) -> Span + Clone {
    move |req: &Request<Body>| {
        let remote = remote_addr(req, proxy_header.as_ref());
        info_span!(
            "request",
            method = %req.method(),
            uri = %req.uri(),
            remote_addr = ?remote,
        )
    }
}

/// The client address: the peer, or the first entry of the trusted proxy
/// header when that parses. A bare IP keeps the peer's port.
fn remote_addr<B>(req: &Request<B>, proxy_header: Option<&HeaderName>) -> Option<SocketAddr> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let Some(name) = proxy_header else {
        return peer;
    };
    let forwarded = req
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let Some(value) = forwarded else {
        return peer;
    };

    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Some(addr);
    }
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(SocketAddr::new(ip, peer.map_or(0, |p| p.port())));
    }
    warn!(header = %name, value, "Failed to parse proxy remote address header");
    peer
}

/// The requested filename if the path is a wind field file.
fn wind_file_name(path: &str) -> Option<&str> {
    let name = path.strip_prefix('/')?;
    if name.contains('/') {
        return None;
    }
    FILE_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
        .then_some(name)
}

fn set(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

/// Header values can't carry control characters.
fn header_safe(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

pub fn http_date(t: DateTime<Utc>) -> String {
    t.format(HTTP_DATE).to_string()
}

fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s.trim(), HTTP_DATE)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Conditional GET. `If-None-Match` takes precedence over
/// `If-Modified-Since`; dates compare at second precision.
fn not_modified(headers: &HeaderMap, etag: &str, updated: DateTime<Utc>) -> bool {
    if let Some(value) = headers.get(header::IF_NONE_MATCH) {
        return value
            .to_str()
            .map(|list| etag_matches(list, etag))
            .unwrap_or(false);
    }
    headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date)
        .map_or(false, |since| updated.timestamp() <= since.timestamp())
}

/// Weak comparison against a comma-separated `If-None-Match` list.
fn etag_matches(list: &str, etag: &str) -> bool {
    let etag = etag.trim_start_matches("W/");
    list.split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == etag)
}
