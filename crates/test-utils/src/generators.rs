//! Synthetic GRIB files and indexes.
//!
//! The messages are not real GRIB2; they carry just enough for
//! [`crate::FakeDecoder`] to know which field it was handed:
//!
//! ```text
//! GRIB<code>:<level>\n<filler>
//! ```

/// Reference date written into every index line.
pub const INDEX_DATE: &str = "2024010100";

const FILLER_LEN: usize = 64;

/// A fake GRIB message for one field.
///
/// Messages for different fields have different lengths so byte-range
/// mistakes show up as the wrong field being decoded.
pub fn synthetic_message(code: &str, level: &str) -> Vec<u8> {
    let mut data = format!("GRIB{code}:{level}\n").into_bytes();
    let filler = FILLER_LEN + code.len() * 3 + level.len();
    data.extend(std::iter::repeat(b'7').take(filler));
    data
}

/// Concatenate one message per `(code, level)` record and build the
/// matching `.idx` text.
///
/// # Example
///
/// ```
/// use test_utils::synthetic_file;
///
/// let (file, index) = synthetic_file(&[("UGRD", "850 mb"), ("VGRD", "850 mb")]);
/// assert!(file.starts_with(b"GRIBUGRD:850 mb"));
/// assert_eq!(index.lines().count(), 2);
/// assert!(index.starts_with("1:0:d=2024010100:UGRD:850 mb:anl:"));
/// ```
pub fn synthetic_file(records: &[(&str, &str)]) -> (Vec<u8>, String) {
    let mut file = Vec::new();
    let mut index = String::new();
    for (n, (code, level)) in records.iter().enumerate() {
        index.push_str(&index_line(n + 1, file.len() as u64, code, level));
        index.push('\n');
        file.extend(synthetic_message(code, level));
    }
    (file, index)
}

/// One `.idx` line with the standard seven fields.
pub fn index_line(n: usize, offset: u64, code: &str, level: &str) -> String {
    format!("{n}:{offset}:d={INDEX_DATE}:{code}:{level}:anl:")
}

/// A GFS-like file with the wind pair at `level` surrounded by unrelated
/// fields, so both closed and open-ended ranges are exercised.
pub fn wind_file(level: &str) -> (Vec<u8>, String) {
    synthetic_file(&[
        ("PRMSL", "mean sea level"),
        ("UGRD", level),
        ("TMP", level),
        ("VGRD", level),
    ])
}

/// Like [`wind_file`] but without the V component.
pub fn wind_file_without_v(level: &str) -> (Vec<u8>, String) {
    synthetic_file(&[("PRMSL", "mean sea level"), ("UGRD", level), ("TMP", level)])
}

/// Every grid point at `precision` degrees, in the decoder's 0–360
/// longitude convention, north to south.
pub fn grid_points(precision: f64) -> Vec<(f64, f64)> {
    let steps = |span: f64| (span / precision).round() as usize;
    let mut points = Vec::new();
    for i in 0..=steps(180.0) {
        for j in 0..steps(360.0) {
            points.push((90.0 - i as f64 * precision, j as f64 * precision));
        }
    }
    points
}
