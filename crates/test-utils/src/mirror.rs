//! An in-process GFS mirror.
//!
//! Serves published files and their `.idx` sidecars over HTTP on an
//! ephemeral port, with byte-range support and injectable failures.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Response, StatusCode, Uri},
    Router,
};
use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::generators::{wind_file, wind_file_without_v};

#[derive(Default)]
struct MirrorState {
    objects: Mutex<HashMap<String, Bytes>>,
    requests: Mutex<Vec<String>>,
    fail_next: AtomicU32,
    ignore_range: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

/// Running mock mirror. The server stops when this is dropped.
pub struct MockMirror {
    addr: SocketAddr,
    state: Arc<MirrorState>,
    task: JoinHandle<()>,
}

impl MockMirror {
    /// Bind to `127.0.0.1:0` and start serving.
    pub async fn start() -> std::io::Result<Self> {
        let state = Arc::new(MirrorState::default());
        let app = Router::new().fallback(serve_object).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(Self { addr, state, task })
    }

    /// Mirror root, with a trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Publish `file` at `path` and `index` at `{path}.idx`.
    pub fn publish(&self, path: &str, file: Vec<u8>, index: String) {
        let mut objects = lock(&self.state.objects);
        objects.insert(path.to_string(), Bytes::from(file));
        objects.insert(format!("{path}.idx"), Bytes::from(index));
    }

    /// Publish a wind file for `level` at `path`.
    pub fn publish_wind(&self, path: &str, level: &str) {
        let (file, index) = wind_file(level);
        self.publish(path, file, index);
    }

    /// Publish a file whose index lacks the V component.
    pub fn publish_wind_without_v(&self, path: &str, level: &str) {
        let (file, index) = wind_file_without_v(level);
        self.publish(path, file, index);
    }

    /// Answer the next `n` requests with 503.
    pub fn fail_next(&self, n: u32) {
        self.state.fail_next.store(n, Ordering::SeqCst);
    }

    /// Answer range requests with the whole object and a 200.
    pub fn ignore_range(&self, ignore: bool) {
        self.state.ignore_range.store(ignore, Ordering::SeqCst);
    }

    /// Delay every response.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *lock(&self.state.delay) = delay;
    }

    /// Paths requested so far, in order, without the leading slash.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.state.requests).clone()
    }
}

impl Drop for MockMirror {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

async fn serve_object(
    State(state): State<Arc<MirrorState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response<Body> {
    let path = uri.path().trim_start_matches('/').to_string();
    lock(&state.requests).push(path.clone());

    let delay = *lock(&state.delay);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let failing = state
        .fail_next
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return status(StatusCode::SERVICE_UNAVAILABLE);
    }

    let Some(object) = lock(&state.objects).get(&path).cloned() else {
        return status(StatusCode::NOT_FOUND);
    };

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range);
    match range {
        Some((start, end)) if !state.ignore_range.load(Ordering::SeqCst) => {
            let len = object.len() as u64;
            let end = end.unwrap_or(len.saturating_sub(1)).min(len.saturating_sub(1));
            if start > end {
                return status(StatusCode::RANGE_NOT_SATISFIABLE);
            }
            debug!(%path, start, end, "Serving range");
            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_RANGE, format!("bytes {start}-{end}/{len}"))
                .body(Body::from(object.slice(start as usize..=end as usize)))
                .unwrap_or_else(|_| status(StatusCode::INTERNAL_SERVER_ERROR))
        }
        _ => Response::new(Body::from(object)),
    }
}

fn status(code: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = code;
    response
}

/// Parse `bytes=S-` or `bytes=S-E`.
fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    let start = start.parse().ok()?;
    let end = if end.is_empty() {
        None
    } else {
        Some(end.parse().ok()?)
    };
    Some((start, end))
}
