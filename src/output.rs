//! Output formatting and persistence for series, grids and style dictionaries.
//!
//! Supports CSV append for series and JSON files (optionally gzip) for
//! everything the map workflow needs to reload.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::series::TimeSeries;
use csv::WriterBuilder;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Logs a series summary at debug level.
pub fn print_summary(series: &TimeSeries) {
    let first = series.points.iter().next();
    let last = series.points.iter().next_back();
    debug!(
        location = %series.location,
        filter = %series.filter,
        label = %series.label,
        points = series.points.len(),
        first = ?first,
        last = ?last,
        "Series"
    );
}

/// Appends every point of `series` as rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_series(path: &str, series: &[TimeSeries]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV records");

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for s in series {
        for record in s.records() {
            writer.serialize(record)?;
        }
    }
    writer.flush()?;

    Ok(())
}

fn is_gzip(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

/// Writes `value` as JSON. Paths ending in `.gz` are gzip-compressed.
pub fn save_json(path: impl AsRef<Path>, value: &impl Serialize) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let writer = BufWriter::new(file);

    if is_gzip(path) {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        serde_json::to_writer(&mut encoder, value)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = writer;
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
    }

    info!(path = %path.display(), "Saved JSON");
    Ok(())
}

/// Reads a file written by [`save_json`].
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let text = read_text(path.as_ref())?;
    Ok(serde_json::from_str(&text)?)
}

/// Reads a text file, transparently decompressing `.gz`.
pub fn read_text(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut text = String::new();
    if is_gzip(path) {
        GzDecoder::new(BufReader::new(file)).read_to_string(&mut text)?;
    } else {
        BufReader::new(file).read_to_string(&mut text)?;
    }
    Ok(text)
}

/// Appends `.gz` to `path` unless it already ends with it.
pub fn with_gzip_suffix(path: &str) -> String {
    if path.ends_with(".gz") {
        path.to_string()
    } else {
        format!("{path}.gz")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn sample_series() -> TimeSeries {
        let mut points = BTreeMap::new();
        points.insert(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), 1.0);
        points.insert(NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(), 2.5);
        TimeSeries::new("Heidelberg", "building=*", "").with_points(points)
    }

    #[test]
    fn test_print_summary_does_not_panic() {
        print_summary(&sample_series());
        print_summary(&TimeSeries::default());
    }

    #[test]
    fn test_append_series_creates_file() {
        let path = temp_path("ohsome_trends_test_create.csv");
        let _ = fs::remove_file(&path); // clean up any prior run

        append_series(&path, &[sample_series()]).unwrap();

        assert!(Path::new(&path).exists());
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("2020-02-01"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_series_writes_header_once() {
        let path = temp_path("ohsome_trends_test_header.csv");
        let _ = fs::remove_file(&path);

        append_series(&path, &[sample_series()]).unwrap();
        append_series(&path, &[sample_series()]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("timestamp")).count();
        assert_eq!(header_count, 1);
        // 1 header + 2 points per append
        assert_eq!(content.lines().count(), 5);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_gzip_json_is_compressed_and_readable() {
        let path = temp_path("ohsome_trends_test_style.json.gz");
        let _ = fs::remove_file(&path);

        let value = serde_json::json!({ "building=*": { "2020-01-01": { "3": 1.0 } } });
        save_json(&path, &value).unwrap();

        let raw = fs::read(&path).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);

        let loaded: serde_json::Value = load_json(&path).unwrap();
        assert_eq!(loaded, value);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_with_gzip_suffix() {
        assert_eq!(with_gzip_suffix("style.json"), "style.json.gz");
        assert_eq!(with_gzip_suffix("style.json.gz"), "style.json.gz");
    }
}
