//! GFS object paths on the NOAA open-data bucket layout.

use wind_common::{Cycle, Precision};

const MODEL: &str = "gfs";
/// Atmospheric products
const COLLECTION: &str = "atmos";
/// Most common parameters
const VARIANT: &str = "pgrb2";
/// Analysis (forecast hour 0)
const FORECAST: &str = "anl";

/// Path of the GFS analysis file for `cycle`, relative to the mirror root.
///
/// e.g. `gfs.20240101/06/atmos/gfs.t06z.pgrb2.0p25.anl`
pub fn gfs_path(cycle: Cycle, precision: Precision) -> String {
    format!(
        "{MODEL}.{date}/{hour:02}/{COLLECTION}/{MODEL}.t{hour:02}z.{VARIANT}.{res}.{FORECAST}",
        date = cycle.date_token(),
        hour = cycle.hour(),
        res = precision.path_token(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gfs_path_quarter_degree() {
        let cycle = Cycle::from_ymdh(2024, 1, 1, 6).unwrap();
        let p = Precision::new(0.25).unwrap();
        assert_eq!(
            gfs_path(cycle, p),
            "gfs.20240101/06/atmos/gfs.t06z.pgrb2.0p25.anl"
        );
    }

    #[test]
    fn test_gfs_path_one_degree_midnight() {
        let cycle = Cycle::from_ymdh(2023, 12, 31, 23).unwrap();
        let p = Precision::new(1.0).unwrap();
        assert_eq!(
            gfs_path(cycle, p),
            "gfs.20231231/18/atmos/gfs.t18z.pgrb2.1p00.anl"
        );
    }
}
