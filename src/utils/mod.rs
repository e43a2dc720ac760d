//! Utility functions and helpers

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{HarnessError, Result};

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS`
pub fn now_iso8601() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    iso8601_from_unix(secs)
}

/// Format seconds since the epoch as a UTC ISO-8601 timestamp
pub fn iso8601_from_unix(secs: u64) -> String {
    let day_secs = (secs % 86400) as u32;
    let (hour, minute, second) = (day_secs / 3600, (day_secs % 3600) / 60, day_secs % 60);
    // Civil date from days since 1970-01-01 (Howard Hinnant, public domain)
    let z = (secs / 86400) as i64 + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = i64::from(yoe) + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    format!("{y:04}-{m:02}-{d:02}T{hour:02}:{minute:02}:{second:02}")
}

/// Render a float for a results column: integral values keep one decimal
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Matrix name recorded in results: the file stem of the matrix path
pub fn matrix_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            HarnessError::input(format!("cannot derive a matrix name from {}", path.display()))
        })
}

/// Dataset recorded in results: name of the directory holding the matrix
///
/// Falls back to an empty string when the matrix sits at a filesystem root
/// or in the current directory without a parent component.
pub fn dataset_name(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Replace `path` with `contents` via a sibling temp file and rename
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| HarnessError::config(format!("invalid output path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp.{}", file_name, std::process::id()));
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
