//! Regular global lat/lng grids for wind data.
//!
//! Rows run from 90°N (row 0) to 90°S, columns from 180°W eastwards, so a
//! grid with precision `p` is `180/p + 1` rows by `360/p` columns.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ComponentSpec, WindError, WindResult, WIND_COMPONENTS};

/// A validated grid precision with at most two decimal places that divides
/// 180° evenly, so both the pole-to-pole rows and the 360° columns come out
/// whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Precision {
    hundredths: u32,
}

impl Precision {
    /// Validate a precision in degrees.
    pub fn new(degrees: f64) -> WindResult<Self> {
        if !degrees.is_finite() || degrees <= 0.0 {
            return Err(WindError::InvalidConfig(format!(
                "precision must be positive, got {degrees}"
            )));
        }
        let scaled = degrees * 100.0;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > 1e-9 {
            return Err(WindError::InvalidConfig(
                "precision must be at most two decimal places".to_string(),
            ));
        }
        if rounded > f64::from(18000u32) {
            return Err(WindError::InvalidConfig(format!(
                "precision {degrees} exceeds 180 degrees"
            )));
        }
        Self::from_hundredths(rounded as u32)
    }

    /// Validate a precision given in hundredths of a degree.
    pub fn from_hundredths(hundredths: u32) -> WindResult<Self> {
        if hundredths == 0 || 18000 % hundredths != 0 {
            return Err(WindError::InvalidConfig(
                "precision must divide 180 degrees evenly".to_string(),
            ));
        }
        Ok(Self { hundredths })
    }

    pub fn hundredths(&self) -> u32 {
        self.hundredths
    }

    pub fn degrees(&self) -> f64 {
        f64::from(self.hundredths) / 100.0
    }

    /// Number of latitude rows (both poles included).
    pub fn lat_dim(&self) -> usize {
        (18000 / self.hundredths) as usize + 1
    }

    /// Number of longitude columns.
    pub fn lng_dim(&self) -> usize {
        (36000 / self.hundredths) as usize
    }

    /// Resolution token used in GFS file names (e.g., `0p25`).
    pub fn path_token(&self) -> String {
        format!("{}p{:02}", self.hundredths / 100, self.hundredths % 100)
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.degrees())
    }
}

/// A global grid of wind vectors, filled one component at a time.
///
/// Every cell must be written exactly once per component: a second write is a
/// [`WindError::DuplicatePoint`], and [`WindGrid::verify_complete`] rejects a
/// component with missing cells.
#[derive(Debug, Clone)]
pub struct WindGrid {
    precision: Precision,
    lat_dim: usize,
    lng_dim: usize,
    values: Vec<[f32; WIND_COMPONENTS]>,
    written: Vec<[bool; WIND_COMPONENTS]>,
    counts: [usize; WIND_COMPONENTS],
}

impl WindGrid {
    pub fn new(precision: Precision) -> Self {
        let lat_dim = precision.lat_dim();
        let lng_dim = precision.lng_dim();
        Self {
            precision,
            lat_dim,
            lng_dim,
            values: vec![[0.0; WIND_COMPONENTS]; lat_dim * lng_dim],
            written: vec![[false; WIND_COMPONENTS]; lat_dim * lng_dim],
            counts: [0; WIND_COMPONENTS],
        }
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn lat_dim(&self) -> usize {
        self.lat_dim
    }

    pub fn lng_dim(&self) -> usize {
        self.lng_dim
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.lat_dim * self.lng_dim
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map a decoded point to its `(lat_idx, lng_idx)` cell.
    ///
    /// Longitudes in the 0–360 convention are folded into −180–180 first.
    pub fn cell_of(&self, lat: f64, lng: f64) -> WindResult<(usize, usize)> {
        let out_of_bounds = || WindError::PointOutOfBounds {
            lat,
            lng,
            lat_dim: self.lat_dim,
            lng_dim: self.lng_dim,
        };
        let prec = self.precision.degrees();
        let lng = (lng + 180.0).rem_euclid(360.0) - 180.0;
        let lat_idx = ((-lat + 90.0) / prec).round();
        let lng_idx = ((lng + 180.0) / prec).round();
        if !(lat_idx >= 0.0 && lng_idx >= 0.0) {
            return Err(out_of_bounds());
        }
        let (lat_idx, lng_idx) = (lat_idx as usize, lng_idx as usize);
        if lat_idx >= self.lat_dim || lng_idx >= self.lng_dim {
            return Err(out_of_bounds());
        }
        Ok((lat_idx, lng_idx))
    }

    /// Record one decoded value for `component` (0 = U, 1 = V).
    pub fn set(&mut self, component: usize, lat: f64, lng: f64, value: f64) -> WindResult<()> {
        if component >= WIND_COMPONENTS {
            return Err(WindError::Internal(format!(
                "component index {component} out of range"
            )));
        }
        let (lat_idx, lng_idx) = self.cell_of(lat, lng)?;
        let idx = lat_idx * self.lng_dim + lng_idx;
        if self.written[idx][component] {
            return Err(WindError::DuplicatePoint {
                lat,
                lng,
                lat_idx,
                lng_idx,
            });
        }
        self.values[idx][component] = value as f32;
        self.written[idx][component] = true;
        self.counts[component] += 1;
        Ok(())
    }

    /// Number of distinct cells written for `component`.
    pub fn count(&self, component: usize) -> usize {
        self.counts.get(component).copied().unwrap_or(0)
    }

    /// Fail unless every cell of `component` has been written.
    pub fn verify_complete(&self, component: usize, spec: &ComponentSpec) -> WindResult<()> {
        let got = self.count(component);
        if got != self.len() {
            return Err(WindError::IncompleteGrid {
                component: spec.to_string(),
                expected: self.len(),
                lat_dim: self.lat_dim,
                lng_dim: self.lng_dim,
                precision: self.precision.degrees(),
                got,
            });
        }
        Ok(())
    }

    /// The `[u, v]` vector at a cell.
    pub fn get(&self, lat_idx: usize, lng_idx: usize) -> Option<[f32; WIND_COMPONENTS]> {
        if lat_idx >= self.lat_dim || lng_idx >= self.lng_dim {
            return None;
        }
        Some(self.values[lat_idx * self.lng_dim + lng_idx])
    }

    /// Row-major cell values, north to south.
    pub fn values(&self) -> &[[f32; WIND_COMPONENTS]] {
        &self.values
    }
}
