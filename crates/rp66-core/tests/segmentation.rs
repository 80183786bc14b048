#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for splitting physical files into logical files
//!
//! Images are synthesized with `test-utils`: unframed and tape framed,
//! with and without storage unit labels, file marks and broken tails.

use pretty_assertions::assert_eq;
use rp66_core::{
    Fingerprint, LoadConfig, Mark, Matcher, MemorySource, ObjectName, Segmenter, TypeRegistry,
    load, load_with,
};
use test_utils::{
    AttrValue, SetBuilder, TapeImage, explicit_record, fdata, file_header, segments,
    storage_unit_label, visible_record, visible_records, write_temp,
};

/// Segments of one logical file: header, channels, a frame and its data
fn logical_file_segments(id: &str, channels: &[&str]) -> Vec<Vec<u8>> {
    let mut channel_set = SetBuilder::named("CHANNEL", "0")
        .template("LONG-NAME")
        .template("UNITS");
    for name in channels {
        channel_set = channel_set
            .object(1, 0, name)
            .value(&AttrValue::ascii(name))
            .value(&AttrValue::idents(&["m"]));
    }

    let refs: Vec<(u32, u8, &str)> = channels.iter().map(|c| (1, 0, *c)).collect();
    let frame_set = SetBuilder::named("FRAME", "0")
        .template("CHANNELS")
        .object(1, 0, "F1")
        .value(&AttrValue::obnames(&refs))
        .build();

    vec![
        file_header("1", id),
        explicit_record(3, &channel_set.build()),
        explicit_record(4, &frame_set),
        fdata(1, 0, "F1", 1, &[0u8; 16]),
        fdata(1, 0, "F1", 2, &[0u8; 16]),
    ]
}

fn logical_file(id: &str, channels: &[&str]) -> Vec<u8> {
    visible_records(&logical_file_segments(id, channels), 8192)
}

fn with_label(sequence: u32, body: &[u8]) -> Vec<u8> {
    let mut out = storage_unit_label(sequence, "TEST STORAGE SET");
    out.extend_from_slice(body);
    out
}

fn segmenter(bytes: Vec<u8>) -> Segmenter<MemorySource> {
    Segmenter::new(
        MemorySource::new(bytes),
        LoadConfig::default(),
        TypeRegistry::default(),
    )
    .unwrap()
}

fn frame() -> Fingerprint {
    Fingerprint::new("FRAME", &ObjectName::new(1, 0, "F1"))
}

#[test]
fn single_unframed_logical_file() {
    let bytes = with_label(1, &logical_file("LF1", &["GR", "SP"]));
    let file = write_temp(&bytes);

    let files = load(file.path()).unwrap();
    assert_eq!(files.len(), 1);

    let lf = &files[0];
    assert!(!lf.is_broken());
    assert_eq!(lf.offset(), Mark::at(80));
    assert_eq!(lf.storage_unit_label().unwrap().sequence_number, Some(1));
    assert_eq!(lf.types(), vec!["CHANNEL", "FILE-HEADER", "FRAME"]);
    assert_eq!(lf.find("CHANNEL", None, Matcher::Exact).unwrap().len(), 2);
    assert_eq!(lf.fdata(&frame()).len(), 2);
}

#[test]
fn next_offset_reaches_end_of_unframed_file() {
    let bytes = with_label(1, &logical_file("LF1", &["GR"]));
    let len = bytes.len() as u64;
    let mut seg = segmenter(bytes);

    assert!(!seg.is_framed());
    assert!(seg.next_logical_file().unwrap().is_some());
    assert!(seg.next_logical_file().unwrap().is_none());
    assert!(seg.is_done());
    assert_eq!(seg.next_offset(), Mark::at(len));
}

#[test]
fn file_headers_split_an_unframed_file() {
    let mut body = logical_file("LF1", &["GR"]);
    body.extend(logical_file("LF2", &["SP", "DT"]));
    body.extend(logical_file("LF3", &["RHOB"]));
    let files: Vec<_> = segmenter(with_label(1, &body))
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(files.len(), 3);
    let counts: Vec<usize> = files
        .iter()
        .map(|f| f.find("CHANNEL", None, Matcher::Exact).unwrap().len())
        .collect();
    assert_eq!(counts, vec![1, 2, 1]);

    // Every file after the first carries the label read at the start
    assert!(files.iter().all(|f| f.storage_unit_label().is_some()));
    for pair in files.windows(2) {
        assert!(pair[0].offset() < pair[1].offset());
    }
}

#[test]
fn tape_segments_yield_one_logical_file_each() {
    let image = TapeImage::new()
        .record(&with_label(1, &logical_file("LF1", &["GR"])))
        .record(&logical_file("LF2", &["SP"]))
        .record(&logical_file("LF3", &["DT"]))
        .finish();
    let len = image.len() as u64;

    let mut seg = segmenter(image);
    assert!(seg.is_framed());

    let mut ids = Vec::new();
    while let Some(lf) = seg.next_logical_file().unwrap() {
        let header = lf.object("FILE-HEADER", "0", None, None).unwrap();
        ids.push(header.values("ID")[0].as_text().unwrap().to_string());
    }
    assert_eq!(ids, vec!["LF1", "LF2", "LF3"]);
    assert_eq!(seg.next_offset(), Mark::at(len));
}

#[test]
fn file_marks_end_logical_files() {
    let image = TapeImage::new()
        .record(&with_label(1, &logical_file("LF1", &["GR"])))
        .file_mark()
        .record(&logical_file("LF2", &["SP"]))
        .file_mark()
        .finish();
    let len = image.len() as u64;

    let mut seg = segmenter(image);
    let mut count = 0;
    while seg.next_logical_file().unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 2);
    assert_eq!(seg.next_offset(), Mark::at(len));
}

#[test]
fn consecutive_file_marks_are_skipped() {
    let image = TapeImage::new()
        .record(&with_label(1, &logical_file("LF1", &["GR"])))
        .file_mark()
        .file_mark()
        .file_mark()
        .record(&logical_file("LF2", &["SP"]))
        .finish();

    let files: Vec<_> = segmenter(image).collect::<Result<_, _>>().unwrap();
    assert_eq!(files.len(), 2);
}

#[test]
fn small_tape_records_split_visible_records() {
    let mut body = logical_file("LF1", &["GR", "SP"]);
    body.extend(logical_file("LF2", &["DT"]));
    let plain = with_label(1, &body);
    let framed = TapeImage::new().records(&plain, 50).finish();

    let plain_files: Vec<_> = segmenter(plain).collect::<Result<_, _>>().unwrap();
    let framed_files: Vec<_> = segmenter(framed).collect::<Result<_, _>>().unwrap();
    assert_eq!(plain_files.len(), 2);
    assert_eq!(framed_files.len(), 2);

    for (a, b) in plain_files.iter().zip(&framed_files) {
        let names = |f: &rp66_core::LogicalFile<_>| -> Vec<String> {
            f.find("CHANNEL", None, Matcher::Exact)
                .unwrap()
                .iter()
                .map(|c| c.name().to_string())
                .collect()
        };
        assert_eq!(names(a), names(b));
        assert_eq!(a.fdata(&frame()), b.fdata(&frame()));
    }
}

#[test]
fn records_split_across_segments_and_visible_records() {
    let channel_set = SetBuilder::named("CHANNEL", "0")
        .template("LONG-NAME")
        .object(1, 0, "GR")
        .value(&AttrValue::ascii("Gamma ray, a rather long description"))
        .object(1, 0, "SP")
        .value(&AttrValue::ascii("Spontaneous potential"))
        .build();
    let mut segs = vec![file_header("1", "SPLIT")];
    segs.extend(segments(3, true, &channel_set, 24));
    let bytes = with_label(1, &visible_records(&segs, 64));

    let files: Vec<_> = segmenter(bytes).collect::<Result<_, _>>().unwrap();
    assert_eq!(files.len(), 1);
    let gr = files[0].object("CHANNEL", "GR", None, None).unwrap();
    assert_eq!(
        gr.values("LONG-NAME")[0].as_text(),
        Some("Gamma ray, a rather long description")
    );
}

#[test]
fn missing_storage_unit_label_is_tolerated() {
    let files: Vec<_> = segmenter(logical_file("LF1", &["GR"]))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].storage_unit_label().is_none());
}

#[test]
fn later_storage_unit_label_replaces_the_first() {
    let image = TapeImage::new()
        .record(&with_label(1, &logical_file("LF1", &["GR"])))
        .file_mark()
        .record(&with_label(2, &logical_file("LF2", &["SP"])))
        .finish();

    let files: Vec<_> = segmenter(image).collect::<Result<_, _>>().unwrap();
    assert_eq!(files.len(), 2);
    let sequence = |i: usize| files[i].storage_unit_label().unwrap().sequence_number;
    assert_eq!(sequence(0), Some(1));
    assert_eq!(sequence(1), Some(2));
}

#[test]
fn broken_trailing_record_stops_segmentation() {
    let mut body = logical_file("LF1", &["GR", "SP"]);
    // Segment claims 64 bytes, the visible record only holds 16
    body.extend(visible_record(&[
        0x00, 0x40, 0x80, 0x03, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    ]));

    let mut seg = segmenter(with_label(1, &body));
    let lf = seg.next_logical_file().unwrap().unwrap();
    assert!(lf.is_broken());
    assert_eq!(lf.find("CHANNEL", None, Matcher::Exact).unwrap().len(), 2);
    assert!(seg.is_done());
    assert!(seg.next_logical_file().unwrap().is_none());
}

#[test]
fn file_header_inside_visible_record_stops_segmentation() {
    let mut segs = logical_file_segments("LF1", &["GR"]);
    segs.extend(logical_file_segments("LF2", &["SP"]));
    // Both logical files packed into a single visible record
    let mut seg = segmenter(with_label(1, &visible_records(&segs, 8192)));

    let mut offsets = vec![seg.next_offset()];
    let mut files = Vec::new();
    while let Some(lf) = seg.next_logical_file().unwrap() {
        offsets.push(seg.next_offset());
        files.push(lf);
        assert!(files.len() <= 2, "segmentation did not terminate");
    }

    assert_eq!(files.len(), 1);
    assert!(files[0].is_broken());
    let channels = files[0].find("CHANNEL", None, Matcher::Exact).unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].name(), "GR");
    assert!(seg.is_done());
    assert!(offsets.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn no_visible_record_is_fatal() {
    let mut seg = segmenter(with_label(1, &[0u8; 300]));
    assert!(seg.next_logical_file().is_err());
    assert!(seg.next_logical_file().unwrap().is_none());
}

#[test]
fn update_and_encrypted_records_are_not_pooled() {
    let update = SetBuilder::new("CHANNEL")
        .template("LONG-NAME")
        .object(1, 0, "GR")
        .value(&AttrValue::ascii("changed"))
        .build();
    let mut segs = logical_file_segments("LF1", &["GR"]);
    segs.push(explicit_record(7, &update));
    segs.push(test_utils::image::segment(3, 0x80 | 0x10, &update));

    let files: Vec<_> = segmenter(with_label(1, &visible_records(&segs, 8192)))
        .collect::<Result<_, _>>()
        .unwrap();
    let gr = files[0].object("CHANNEL", "GR", None, None).unwrap();
    assert_eq!(gr.values("LONG-NAME")[0].as_text(), Some("GR"));
}

#[test]
fn frame_data_can_be_read_back() {
    let bytes = with_label(1, &logical_file("LF1", &["GR"]));
    let mut files: Vec<_> = segmenter(bytes).collect::<Result<_, _>>().unwrap();
    let records = files[0].read_fdata(&frame()).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| !r.explicit && r.record_type == 0));
}

#[test]
fn link_on_load_resolves_immediately() {
    let bytes = with_label(1, &logical_file("LF1", &["GR", "SP"]));
    let file = write_temp(&bytes);
    let config = LoadConfig::default().with_link_on_load(true);

    let files = load_with(file.path(), &config, &TypeRegistry::default()).unwrap();
    let frame = files[0].object("FRAME", "F1", None, None).unwrap();
    let channels = frame.linked("CHANNELS");
    assert_eq!(channels.len(), 2);
    assert!(channels.iter().all(Option::is_some));
}

#[test]
fn logical_files_are_independent() {
    let mut body = logical_file("LF1", &["GR"]);
    body.extend(logical_file("LF2", &["SP"]));
    let mut files: Vec<_> = segmenter(with_label(1, &body))
        .collect::<Result<_, _>>()
        .unwrap();

    let second = files.pop().unwrap();
    files.pop().unwrap().close();
    assert_eq!(second.find("CHANNEL", Some("SP"), Matcher::Exact).unwrap().len(), 1);
}
