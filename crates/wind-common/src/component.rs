//! GRIB field identities.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of scalar components in a wind vector (U and V).
pub const WIND_COMPONENTS: usize = 2;

/// One scalar field at one vertical level, as named in a GRIB `.idx` file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Parameter code (e.g., "UGRD")
    pub code: String,
    /// Level label (e.g., "850 mb")
    pub level: String,
}

impl ComponentSpec {
    pub fn new(code: impl Into<String>, level: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            level: level.into(),
        }
    }

    /// The U (west-east) and V (south-north) wind components at `level`.
    pub fn wind(level: &str) -> [ComponentSpec; WIND_COMPONENTS] {
        [Self::new("UGRD", level), Self::new("VGRD", level)]
    }

    /// Human-readable field name for diagnostics.
    pub fn description(&self) -> &'static str {
        match self.code.as_str() {
            "UGRD" => "wind u-component",
            "VGRD" => "wind v-component",
            _ => "field",
        }
    }

    /// Whether an index record's code and level fields identify this component.
    pub fn matches(&self, code: &str, level: &str) -> bool {
        self.code == code && self.level == level
    }
}

impl fmt::Display for ComponentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.code, self.level)
    }
}
