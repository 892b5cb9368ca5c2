//! In-process stand-in for the `gribber` decoder.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use gfs_fetch::{Decoder, PointSink};
use wind_common::{FetchError, WindError, WindResult};

use crate::generators::grid_points;

/// How the fake decoder misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeFault {
    #[default]
    None,
    /// Emit the first point twice
    Duplicate,
    /// Leave out the last point
    Missing,
    /// Print only the table header
    Empty,
}

/// Decodes [`crate::synthetic_message`] payloads into a full grid of
/// constant values: `u` for UGRD and `v` for VGRD.
#[derive(Debug, Clone)]
pub struct FakeDecoder {
    precision: f64,
    u: f64,
    v: f64,
    fault: DecodeFault,
    fail_first: u32,
    calls: Arc<AtomicU32>,
}

impl FakeDecoder {
    pub fn new(precision: f64) -> Self {
        Self {
            precision,
            u: 3.0,
            v: -4.0,
            fault: DecodeFault::None,
            fail_first: 0,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn with_wind(mut self, u: f64, v: f64) -> Self {
        self.u = u;
        self.v = v;
        self
    }

    pub fn with_fault(mut self, fault: DecodeFault) -> Self {
        self.fault = fault;
        self
    }

    /// Fail the first `n` decode calls as if the process exited non-zero.
    pub fn fail_first(mut self, n: u32) -> Self {
        self.fail_first = n;
        self
    }

    /// Number of decode calls so far, across clones.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn field_value(&self, data: &[u8]) -> Result<f64, FetchError> {
        let header = data
            .strip_prefix(b"GRIB")
            .ok_or_else(|| FetchError::Malformed("missing grib magic".to_string()))?;
        let code: Vec<u8> = header.iter().take_while(|b| **b != b':').copied().collect();
        match code.as_slice() {
            b"UGRD" => Ok(self.u),
            b"VGRD" => Ok(self.v),
            other => Err(FetchError::Malformed(format!(
                "unexpected field {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

#[async_trait]
impl Decoder for FakeDecoder {
    async fn decode(&self, data: Bytes, sink: &mut PointSink<'_>) -> WindResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = |e: FetchError| WindError::fetch("decode with fake gribber", e);
        if call < self.fail_first {
            return Err(fail(FetchError::Transient("exit status: 1".to_string())));
        }

        let value = self.field_value(&data).map_err(fail)?;
        let mut points = grid_points(self.precision);
        match self.fault {
            DecodeFault::None => {}
            DecodeFault::Duplicate => points.push(points[0]),
            DecodeFault::Missing => {
                points.pop();
            }
            DecodeFault::Empty => points.clear(),
        }
        if points.is_empty() {
            return Err(fail(FetchError::Malformed("no data returned".to_string())));
        }

        for (lat, lng) in points {
            sink(lat, lng, value)?;
        }
        Ok(())
    }
}
