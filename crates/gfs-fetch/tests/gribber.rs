//! Subprocess decoder tests using shell scripts in place of `gribber`.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use gfs_fetch::{Decoder, GribberDecoder};
use wind_common::{ErrorKind, WindResult};

fn script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("gribber");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

async fn decode(decoder: &GribberDecoder) -> WindResult<Vec<(f64, f64, f64)>> {
    let mut points = Vec::new();
    let mut sink = |lat: f64, lng: f64, value: f64| -> WindResult<()> {
        points.push((lat, lng, value));
        Ok(())
    };
    decoder
        .decode(Bytes::from_static(b"GRIB fake"), &mut sink)
        .await?;
    Ok(points)
}

#[tokio::test]
async fn test_decodes_table_and_removes_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let seen = dir.path().join("seen");
    let program = script(
        dir.path(),
        &format!(
            "[ \"$1\" = decode ] && [ \"$3\" = 0.0 ] || exit 2\n\
             echo \"$2\" > {seen}\n\
             head -c 4 \"$2\" | grep -q GRIB || exit 3\n\
             echo 'Latitude Longitude Value'\n\
             echo '90.0 0.0 1.5'\n\
             echo '-90.0 359.75 -2'",
            seen = seen.display()
        ),
    );

    let points = decode(&GribberDecoder::new(program)).await.unwrap();
    assert_eq!(points, vec![(90.0, 0.0, 1.5), (-90.0, 359.75, -2.0)]);

    let staged = std::fs::read_to_string(&seen).unwrap();
    let staged = Path::new(staged.trim());
    assert!(staged
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("gribber-"));
    assert!(!staged.exists(), "temp file left behind");
}

/// Path the script recorded as its input file.
fn staged_path(seen: &Path) -> PathBuf {
    PathBuf::from(std::fs::read_to_string(seen).unwrap().trim())
}

#[tokio::test]
async fn test_failed_decode_removes_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let seen = dir.path().join("seen");
    let program = script(
        dir.path(),
        &format!("echo \"$2\" > {}\nexit 1", seen.display()),
    );

    let err = decode(&GribberDecoder::new(program)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert!(!staged_path(&seen).exists(), "temp file left behind");
}

#[tokio::test]
async fn test_cancelled_decode_removes_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let seen = dir.path().join("seen");
    let program = script(
        dir.path(),
        &format!("echo \"$2\" > {}\nexec sleep 30", seen.display()),
    );

    let decoder = GribberDecoder::new(program);
    let cancelled = tokio::time::timeout(Duration::from_millis(500), decode(&decoder)).await;
    assert!(cancelled.is_err(), "decode finished before the deadline");

    let staged = staged_path(&seen);
    assert!(staged
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("gribber-"));
    assert!(!staged.exists(), "temp file left behind");
}

#[tokio::test]
async fn test_non_zero_exit_includes_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(dir.path(), "echo 'bad grib message' >&2\nexit 1");

    let err = decode(&GribberDecoder::new(program)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert!(err.to_string().contains("bad grib message"), "{err}");
}

#[tokio::test]
async fn test_bad_header_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(dir.path(), "echo 'Lat Lon Val'");

    let err = decode(&GribberDecoder::new(program)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalFault);
}

#[tokio::test]
async fn test_header_only_is_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let program = script(dir.path(), "echo 'Latitude Longitude Value'");

    let err = decode(&GribberDecoder::new(program)).await.unwrap_err();
    assert!(err.to_string().contains("no data returned"), "{err}");
}

#[tokio::test]
async fn test_missing_executable() {
    let dir = tempfile::tempdir().unwrap();
    let decoder = GribberDecoder::new(dir.path().join("does-not-exist"));

    let err = decode(&decoder).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert!(err.to_string().contains("find gribber executable"), "{err}");
}
