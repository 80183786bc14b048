#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Smoke tests against real DLIS files
//!
//! Skipped unless `RP66_SAMPLE_DATA` (or a default location) holds `.dlis`
//! files.

use rp66_core::{LoadConfig, Matcher, TypeRegistry, load_with};
use test_utils::{require_sample_data, sample_files};

#[test]
fn sample_files_segment_and_link() {
    let dir = require_sample_data!();
    let config = LoadConfig::default().with_link_on_load(true);
    let registry = TypeRegistry::default();

    for path in sample_files(&dir) {
        let files = match load_with(&path, &config, &registry) {
            Ok(files) => files,
            Err(e) => {
                println!("{}: {e}", path.display());
                continue;
            }
        };
        println!("{}: {} logical files", path.display(), files.len());

        for file in &files {
            let headers = file.find("FILE-HEADER", None, Matcher::Exact).unwrap();
            assert!(headers.len() <= 1, "{}: several file headers", path.display());
            for frame in file.find("FRAME", None, Matcher::Exact).unwrap() {
                let slots = frame.linked("CHANNELS");
                assert_eq!(slots.len(), frame.values("CHANNELS").len());
            }
        }
    }
}
