//! Test utilities for rp66-rs
//!
//! Provides synthetic DLIS images for unit and integration tests, and
//! discovery of real sample files for tests that want them.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

pub mod image;

pub use image::{
    AttrValue, SetBuilder, TapeImage, explicit_record, fdata, file_header, implicit_record,
    segments, storage_unit_label, visible_record, visible_records,
};

/// Environment variable pointing at a directory of sample DLIS files
pub const SAMPLE_DATA_ENV: &str = "RP66_SAMPLE_DATA";

/// Write `bytes` to a temporary file that lives as long as the handle
pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap_or_else(|e| panic!("temp file: {e}"));
    file.write_all(bytes)
        .unwrap_or_else(|e| panic!("temp file write: {e}"));
    file.flush().unwrap_or_else(|e| panic!("temp file flush: {e}"));
    file
}

/// Locate the sample data directory
///
/// Checks the environment variable first, then a few common locations.
pub fn find_sample_data() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(SAMPLE_DATA_ENV) {
        let path = PathBuf::from(shellexpand::tilde(&path).to_string());
        if is_valid_sample_dir(&path) {
            return Some(path);
        }
    }

    ["~/dlis", "~/data/dlis", "/opt/dlis"]
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).to_string()))
        .find(|p| is_valid_sample_dir(p))
}

/// DLIS files directly inside `dir`, sorted by name
pub fn sample_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| is_dlis_file(p))
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

fn is_dlis_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("dlis"))
}

/// Check if a directory holds at least one DLIS file
pub fn is_valid_sample_dir(path: &Path) -> bool {
    path.is_dir() && !sample_files(path).is_empty()
}

/// Get the sample data directory or skip the test with a message
#[macro_export]
macro_rules! require_sample_data {
    () => {
        match $crate::find_sample_data() {
            Some(path) => path,
            None => {
                println!(
                    "Skipping test - no sample DLIS files, set {} to a directory of .dlis files",
                    $crate::SAMPLE_DATA_ENV
                );
                return;
            }
        }
    };
}
