//! Synthetic DLIS byte images
//!
//! Builders for the pieces of a DLIS file, from EFLR bodies up to
//! tape-framed physical files.

use binrw::BinWrite;
use binrw::io::Cursor;
use rp66_formats::repcode::{ASCII, FDOUBL, IDENT, OBJREF, OBNAME, SLONG, USHORT};
use rp66_formats::segment::SegmentAttributes;
use rp66_formats::tif::{TAPE_FILE_MARK, TAPE_RECORD, TapeMark};

/// Encode an IDENT
pub fn ident(out: &mut Vec<u8>, s: &str) {
    out.push(s.len() as u8);
    out.extend_from_slice(s.as_bytes());
}

/// Encode a UVARI
pub fn uvari(out: &mut Vec<u8>, v: u32) {
    if v < 0x80 {
        out.push(v as u8);
    } else if v < 0x4000 {
        out.extend_from_slice(&((v as u16) | 0x8000).to_be_bytes());
    } else {
        out.extend_from_slice(&(v | 0xC000_0000).to_be_bytes());
    }
}

/// Encode an ASCII string
pub fn ascii(out: &mut Vec<u8>, s: &str) {
    uvari(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

/// Encode an OBNAME
pub fn obname(out: &mut Vec<u8>, origin: u32, copy: u8, id: &str) {
    uvari(out, origin);
    out.push(copy);
    ident(out, id);
}

/// Attribute values of one representation code
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// IDENT values
    Idents(Vec<String>),
    /// ASCII values
    Ascii(Vec<String>),
    /// OBNAME values: origin, copy, identifier
    ObNames(Vec<(u32, u8, String)>),
    /// OBJREF values: type, origin, copy, identifier
    ObjRefs(Vec<(String, u32, u8, String)>),
    /// SLONG values
    Slongs(Vec<i32>),
    /// FDOUBL values
    Fdoubls(Vec<f64>),
    /// USHORT values
    Ushorts(Vec<u8>),
}

impl AttrValue {
    /// IDENT values
    pub fn idents(values: &[&str]) -> Self {
        Self::Idents(values.iter().map(ToString::to_string).collect())
    }

    /// One ASCII value
    pub fn ascii(value: &str) -> Self {
        Self::Ascii(vec![value.to_string()])
    }

    /// OBNAME values
    pub fn obnames(values: &[(u32, u8, &str)]) -> Self {
        Self::ObNames(
            values
                .iter()
                .map(|(o, c, id)| (*o, *c, (*id).to_string()))
                .collect(),
        )
    }

    /// OBJREF values
    pub fn objrefs(values: &[(&str, u32, u8, &str)]) -> Self {
        Self::ObjRefs(
            values
                .iter()
                .map(|(t, o, c, id)| ((*t).to_string(), *o, *c, (*id).to_string()))
                .collect(),
        )
    }

    fn reprc(&self) -> u8 {
        match self {
            Self::Idents(_) => IDENT,
            Self::Ascii(_) => ASCII,
            Self::ObNames(_) => OBNAME,
            Self::ObjRefs(_) => OBJREF,
            Self::Slongs(_) => SLONG,
            Self::Fdoubls(_) => FDOUBL,
            Self::Ushorts(_) => USHORT,
        }
    }

    fn count(&self) -> usize {
        match self {
            Self::Idents(v) | Self::Ascii(v) => v.len(),
            Self::ObNames(v) => v.len(),
            Self::ObjRefs(v) => v.len(),
            Self::Slongs(v) => v.len(),
            Self::Fdoubls(v) => v.len(),
            Self::Ushorts(v) => v.len(),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Idents(v) => v.iter().for_each(|s| ident(out, s)),
            Self::Ascii(v) => v.iter().for_each(|s| ascii(out, s)),
            Self::ObNames(v) => v.iter().for_each(|(o, c, id)| obname(out, *o, *c, id)),
            Self::ObjRefs(v) => v.iter().for_each(|(t, o, c, id)| {
                ident(out, t);
                obname(out, *o, *c, id);
            }),
            Self::Slongs(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_be_bytes())),
            Self::Fdoubls(v) => v.iter().for_each(|x| out.extend_from_slice(&x.to_be_bytes())),
            Self::Ushorts(v) => out.extend_from_slice(v),
        }
    }
}

/// Builder for an EFLR body: set, template, objects
#[derive(Debug, Clone)]
pub struct SetBuilder {
    body: Vec<u8>,
}

impl SetBuilder {
    /// Set of `set_type` without a name
    pub fn new(set_type: &str) -> Self {
        let mut body = vec![0xF0];
        ident(&mut body, set_type);
        Self { body }
    }

    /// Set of `set_type` with a name
    pub fn named(set_type: &str, name: &str) -> Self {
        let mut body = vec![0xF8];
        ident(&mut body, set_type);
        ident(&mut body, name);
        Self { body }
    }

    /// Template attribute with only a label
    pub fn template(mut self, label: &str) -> Self {
        self.body.push(0x30);
        ident(&mut self.body, label);
        self
    }

    /// Invariant template attribute with a value
    pub fn invariant(mut self, label: &str, value: &AttrValue) -> Self {
        self.body.push(0x5D);
        ident(&mut self.body, label);
        self.push_value(value);
        self
    }

    /// Start an object
    pub fn object(mut self, origin: u32, copy: u8, id: &str) -> Self {
        self.body.push(0x70);
        obname(&mut self.body, origin, copy, id);
        self
    }

    /// Next attribute of the current object, with count and code
    pub fn value(mut self, value: &AttrValue) -> Self {
        self.body.push(0x2D);
        self.push_value(value);
        self
    }

    /// Next attribute of the current object is absent
    pub fn absent(mut self) -> Self {
        self.body.push(0x00);
        self
    }

    fn push_value(&mut self, value: &AttrValue) {
        uvari(&mut self.body, value.count() as u32);
        self.body.push(value.reprc());
        value.encode(&mut self.body);
    }

    /// Encoded body
    pub fn build(self) -> Vec<u8> {
        self.body
    }
}

/// Split a record body into segments of at most `chunk` body bytes
///
/// Every segment is padded to an even length of at least 16 bytes.
pub fn segments(record_type: u8, explicit: bool, body: &[u8], chunk: usize) -> Vec<Vec<u8>> {
    let chunks: Vec<&[u8]> = if body.is_empty() {
        vec![&[]]
    } else {
        body.chunks(chunk.max(1)).collect()
    };
    let last = chunks.len() - 1;
    chunks
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let mut attributes = if explicit { SegmentAttributes::EXPLICIT } else { 0 };
            if i > 0 {
                attributes |= SegmentAttributes::PREDECESSOR;
            }
            if i < last {
                attributes |= SegmentAttributes::SUCCESSOR;
            }
            segment(record_type, attributes, part)
        })
        .collect()
}

/// One segment with header and padding
pub fn segment(record_type: u8, mut attributes: u8, body: &[u8]) -> Vec<u8> {
    let mut data = body.to_vec();
    let mut pad = 0usize;
    while data.len() + pad < 12 || (data.len() + pad) % 2 != 0 {
        pad += 1;
    }
    if pad > 0 {
        attributes |= SegmentAttributes::PADDING;
        data.extend(std::iter::repeat_n(0u8, pad - 1));
        data.push(pad as u8);
    }
    let mut out = ((data.len() + 4) as u16).to_be_bytes().to_vec();
    out.push(attributes);
    out.push(record_type);
    out.extend(data);
    out
}

/// Single-segment explicitly formatted record
pub fn explicit_record(record_type: u8, body: &[u8]) -> Vec<u8> {
    segment(record_type, SegmentAttributes::EXPLICIT, body)
}

/// Single-segment indirectly formatted record
pub fn implicit_record(record_type: u8, body: &[u8]) -> Vec<u8> {
    segment(record_type, 0, body)
}

/// FILE-HEADER record
pub fn file_header(sequence: &str, id: &str) -> Vec<u8> {
    let body = SetBuilder::named("FILE-HEADER", "0")
        .template("SEQUENCE-NUMBER")
        .template("ID")
        .object(0, 0, "0")
        .value(&AttrValue::ascii(sequence))
        .value(&AttrValue::ascii(id))
        .build();
    explicit_record(0, &body)
}

/// FDATA record for a frame
pub fn fdata(origin: u32, copy: u8, frame: &str, frame_number: u32, samples: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    obname(&mut body, origin, copy, frame);
    uvari(&mut body, frame_number);
    body.extend_from_slice(samples);
    implicit_record(0, &body)
}

/// Pack segments into visible records of at most `max_length` bytes
///
/// Segments are never split; a segment larger than the limit gets a
/// visible record of its own.
pub fn visible_records(segments: &[Vec<u8>], max_length: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    for segment in segments {
        if !current.is_empty() && current.len() + segment.len() + 4 > max_length {
            out.extend(visible_record(&current));
            current.clear();
        }
        current.extend_from_slice(segment);
    }
    if !current.is_empty() {
        out.extend(visible_record(&current));
    }
    out
}

/// One visible record around `body`
pub fn visible_record(body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 4) as u16).to_be_bytes().to_vec();
    out.extend_from_slice(&[0xFF, 0x01]);
    out.extend_from_slice(body);
    out
}

/// Storage unit label
pub fn storage_unit_label(sequence: u32, storage_set: &str) -> Vec<u8> {
    let mut out = format!("{sequence:>4}V1.00RECORD 8192").into_bytes();
    out.extend_from_slice(format!("{storage_set:<60}").as_bytes());
    out.truncate(80);
    out
}

/// Tape image builder
#[derive(Debug, Default)]
pub struct TapeImage {
    out: Vec<u8>,
    prev: u32,
}

impl TapeImage {
    /// Empty image
    pub fn new() -> Self {
        Self::default()
    }

    fn mark(&mut self, kind: u32, length: usize) {
        let here = self.out.len() as u32;
        let mut cursor = Cursor::new(Vec::new());
        TapeMark {
            kind,
            prev: self.prev,
            next: here + 12 + length as u32,
        }
        .write(&mut cursor)
        .unwrap_or_else(|e| panic!("tape mark encoding failed: {e}"));
        self.out.extend(cursor.into_inner());
        self.prev = here;
    }

    /// Append one tape record
    pub fn record(mut self, data: &[u8]) -> Self {
        self.mark(TAPE_RECORD, data.len());
        self.out.extend_from_slice(data);
        self
    }

    /// Append `data` split into tape records of at most `chunk` bytes
    pub fn records(mut self, data: &[u8], chunk: usize) -> Self {
        for part in data.chunks(chunk.max(1)) {
            self = self.record(part);
        }
        self
    }

    /// Append a file mark
    pub fn file_mark(mut self) -> Self {
        self.mark(TAPE_FILE_MARK, 0);
        self
    }

    /// Finished image
    pub fn finish(self) -> Vec<u8> {
        self.out
    }
}
