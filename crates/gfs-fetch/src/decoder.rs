//! GRIB message decoding.
//!
//! Decoding is delegated to an external tool behind the [`Decoder`] trait.
//! The production implementation runs [gribber] on a temporary copy of the
//! message and parses its tabular output:
//!
//! ```text
//! Latitude  Longitude  Value
//! 90.00     0.00       -3.21
//! ...
//! ```
//!
//! [gribber]: https://github.com/noritada/grib-rs

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, instrument};
use wind_common::{FetchError, FetchResult, WindError, WindResult};

/// Receives `(lat, lng, value)` for every decoded grid point.
pub type PointSink<'a> = dyn FnMut(f64, f64, f64) -> WindResult<()> + Send + 'a;

/// Turns one GRIB message into grid points.
#[async_trait]
pub trait Decoder: Send + Sync {
    /// Decode `data`, calling `sink` once per point. An error returned by the
    /// sink aborts decoding and is passed through.
    async fn decode(&self, data: Bytes, sink: &mut PointSink<'_>) -> WindResult<()>;
}

const HEADER: [&str; 3] = ["Latitude", "Longitude", "Value"];

/// Line parser for the decoder's `Latitude Longitude Value` table.
#[derive(Debug, Default)]
pub struct DecoderTable {
    lines: usize,
    rows: usize,
}

impl DecoderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one output line. The first line must be the header; each
    /// following line yields one point.
    pub fn feed(&mut self, line: &str) -> FetchResult<Option<(f64, f64, f64)>> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        self.lines += 1;
        if self.lines == 1 {
            for (i, expected) in HEADER.iter().enumerate() {
                if fields.get(i) != Some(expected) {
                    return Err(FetchError::Malformed(format!(
                        "expected field {i}:{expected:?}, got {fields:?}"
                    )));
                }
            }
            return Ok(None);
        }
        if fields.is_empty() {
            return Ok(None);
        }
        let parse = |i: usize, name: &str| -> FetchResult<f64> {
            let raw = fields.get(i).copied().unwrap_or("");
            raw.parse()
                .map_err(|e| FetchError::Malformed(format!("failed to parse {name} {raw:?}: {e}")))
        };
        let lat = parse(0, "latitude")?;
        let lng = parse(1, "longitude")?;
        let value = parse(2, "value")?;
        self.rows += 1;
        Ok(Some((lat, lng, value)))
    }

    /// Number of data rows seen so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Check that the output contained data.
    pub fn finish(&self) -> FetchResult<usize> {
        if self.rows == 0 {
            return Err(FetchError::Malformed("no data returned".to_string()));
        }
        Ok(self.rows)
    }
}

/// Runs `gribber decode <file> 0.0` as a subprocess.
#[derive(Debug, Clone)]
pub struct GribberDecoder {
    program: PathBuf,
}

impl GribberDecoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn fail(&self, error: FetchError) -> WindError {
        WindError::fetch(format!("decode with {}", self.program.display()), error)
    }
}

impl Default for GribberDecoder {
    fn default() -> Self {
        Self::new("gribber")
    }
}

#[async_trait]
impl Decoder for GribberDecoder {
    #[instrument(skip_all, fields(program = %self.program.display(), bytes = data.len()))]
    async fn decode(&self, data: Bytes, sink: &mut PointSink<'_>) -> WindResult<()> {
        let io = |e: std::io::Error| self.fail(FetchError::Transient(format!("make temp file: {e}")));

        // Removed when dropped, whichever way this function exits.
        let staged = tempfile::Builder::new()
            .prefix("gribber-")
            .tempfile()
            .map_err(io)?;
        tokio::fs::write(staged.path(), &data).await.map_err(io)?;

        let mut child = Command::new(&self.program)
            .arg("decode")
            .arg(staged.path())
            .arg("0.0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                let hint = if e.kind() == IoErrorKind::NotFound {
                    "find gribber executable"
                } else {
                    "start gribber"
                };
                self.fail(FetchError::Transient(format!("{hint}: {e}")))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WindError::Internal("decoder stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| WindError::Internal("decoder stderr not captured".to_string()))?;
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut table = DecoderTable::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| self.fail(FetchError::Transient(format!("read output: {e}"))))?
        {
            let point = table.feed(&line).map_err(|e| self.fail(e))?;
            if let Some((lat, lng, value)) = point {
                sink(lat, lng, value)?;
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| self.fail(FetchError::Transient(format!("wait: {e}"))))?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(self.fail(FetchError::Transient(format!(
                "{status} (stderr: {:?})",
                stderr.trim()
            ))));
        }
        let rows = table.finish().map_err(|e| {
            self.fail(FetchError::Malformed(format!("{e} (stderr: {:?})", stderr.trim())))
        })?;
        debug!(rows, "Decoded grib message");
        Ok(())
    }
}
