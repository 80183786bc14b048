//! Logical record extraction
//!
//! A logical record is reassembled from its segments: segment headers and
//! trailers are dropped and the bodies concatenated.

use binrw::io::{Read, Seek};
use tracing::{debug, warn};

use crate::error::{FormatError, FormatResult};
use crate::segment::{SegmentHeader, read_segment_header};
use crate::visible::Rp66Stream;

/// EFLR type: FILE-HEADER, opens a logical file
pub const FILE_HEADER: u8 = 0;
/// EFLR type: ORIGIN
pub const ORIGIN: u8 = 1;
/// EFLR type: AXIS
pub const AXIS: u8 = 2;
/// EFLR type: CHANNEL
pub const CHANNEL: u8 = 3;
/// EFLR type: FRAME
pub const FRAME: u8 = 4;
/// EFLR type: static data
pub const STATIC: u8 = 5;
/// EFLR type: textual data
pub const SCRIPT: u8 = 6;
/// EFLR type: UPDATE
pub const UPDATE: u8 = 7;
/// EFLR type: unformatted data identifier
pub const UDI: u8 = 8;
/// EFLR type: LONG-NAME
pub const LONG_NAME: u8 = 9;
/// EFLR type: specification
pub const SPECIFICATION: u8 = 10;
/// EFLR type: dictionary
pub const DICTIONARY: u8 = 11;

/// IFLR type: frame data
pub const FDATA: u8 = 0;
/// IFLR type: unformatted data
pub const NOFORM: u8 = 1;
/// IFLR type: end of data
pub const END_OF_DATA: u8 = 127;

/// One reassembled logical record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Logical offset of the first segment header
    pub offset: u64,
    /// Logical record type
    pub record_type: u8,
    /// Explicitly formatted
    pub explicit: bool,
    /// Body is encrypted and cannot be interpreted
    pub encrypted: bool,
    /// Concatenated segment bodies, trailers removed
    pub body: Vec<u8>,
}

fn truncated(offset: u64) -> FormatError {
    FormatError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        format!("record at offset {offset} ends before its last segment"),
    ))
}

fn read_segment_body<R: Read + Seek>(
    stream: &mut Rp66Stream<R>,
    header: &SegmentHeader,
    body: &mut Vec<u8>,
) -> FormatResult<()> {
    let mut segment = vec![0u8; header.body_length()];
    stream.read_exact(&mut segment)?;
    let trailer = header.trailer_length(&segment)?;
    segment.truncate(segment.len() - trailer);
    body.extend_from_slice(&segment);
    Ok(())
}

/// Read the logical record starting at logical `offset`
pub fn read_record<R: Read + Seek>(stream: &mut Rp66Stream<R>, offset: u64) -> FormatResult<RawRecord> {
    stream.seek(offset)?;
    let first = read_segment_header(stream)?
        .ok_or_else(|| truncated(offset))?
        .validate()?;

    let mut body = Vec::with_capacity(first.body_length());
    read_segment_body(stream, &first, &mut body)?;

    let mut header = first;
    while header.attributes.has_successor() {
        header = read_segment_header(stream)?
            .ok_or_else(|| truncated(offset))?
            .validate()?;
        if header.record_type != first.record_type {
            debug!(
                "Segment type {} differs from record type {} at offset {offset}",
                header.record_type, first.record_type
            );
        }
        read_segment_body(stream, &header, &mut body)?;
    }

    Ok(RawRecord {
        offset,
        record_type: first.record_type,
        explicit: first.attributes.is_explicit(),
        encrypted: first.attributes.is_encrypted(),
        body,
    })
}

/// Read every record at `offsets`
///
/// A record that cannot be reassembled is logged and left out; non
/// structural errors abort.
pub fn extract_records<R: Read + Seek>(
    stream: &mut Rp66Stream<R>,
    offsets: &[u64],
) -> FormatResult<Vec<RawRecord>> {
    let mut records = Vec::with_capacity(offsets.len());
    for &offset in offsets {
        match read_record(stream, offset) {
            Ok(record) => records.push(record),
            Err(e) if e.is_structural() => {
                warn!("Skipping unreadable record at offset {offset}: {e}");
            }
            Err(e) => return Err(e),
        }
    }
    debug!("Extracted {} of {} records", records.len(), offsets.len());
    Ok(records)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::offsets::{RecordEnd, find_record_offsets};
    use crate::stream::{Mark, PhysicalStream};
    use binrw::io::Cursor;
    use pretty_assertions::assert_eq;

    fn segment(attributes: u8, record_type: u8, body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 4) as u16).to_be_bytes().to_vec();
        out.push(attributes);
        out.push(record_type);
        out.extend_from_slice(body);
        out
    }

    fn visible(body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 4) as u16).to_be_bytes().to_vec();
        out.extend_from_slice(&[0xFF, 0x01]);
        out.extend_from_slice(body);
        out
    }

    fn open(data: Vec<u8>) -> Rp66Stream<Cursor<Vec<u8>>> {
        let physical = PhysicalStream::open(Cursor::new(data), false, Mark::at(0)).unwrap();
        Rp66Stream::open(physical, Mark::at(0)).unwrap()
    }

    #[test]
    fn single_segment_records() {
        let mut body = segment(0x80, CHANNEL, &[1u8; 12]);
        body.extend(segment(0x00, FDATA, &[2u8; 20]));
        let mut s = open(visible(&body));

        let index = find_record_offsets(&mut s).unwrap();
        assert_eq!(index.explicits, vec![0]);
        assert_eq!(index.implicits, vec![16]);
        assert!(!index.broken);
        assert!(matches!(index.end, RecordEnd::Eof(_)));

        let records = extract_records(&mut s, &index.explicits).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_type, CHANNEL);
        assert!(records[0].explicit);
        assert_eq!(records[0].body, vec![1u8; 12]);
    }

    #[test]
    fn segments_across_visible_records_are_joined() {
        let first = segment(0x80 | 0x20, FRAME, &[1u8; 12]);
        let second = segment(0x80 | 0x40 | 0x01, FRAME, &[2, 2, 2, 2, 2, 2, 2, 2, 2, 0, 0, 3]);
        let mut data = visible(&first);
        data.extend(visible(&second));
        let mut s = open(data);

        let index = find_record_offsets(&mut s).unwrap();
        assert_eq!(index.explicits, vec![0]);

        let record = read_record(&mut s, 0).unwrap();
        let mut expected = vec![1u8; 12];
        expected.extend_from_slice(&[2u8; 9]);
        assert_eq!(record.body, expected);
    }

    #[test]
    fn file_header_after_first_record_is_boundary() {
        let mut data = visible(&segment(0x80, FILE_HEADER, &[0u8; 12]));
        data.extend(visible(&segment(0x80, ORIGIN, &[0u8; 12])));
        let second_file = data.len() as u64;
        data.extend(visible(&segment(0x80, FILE_HEADER, &[0u8; 12])));
        let mut s = open(data);

        let index = find_record_offsets(&mut s).unwrap();
        assert_eq!(index.explicits, vec![0, 16]);
        assert_eq!(index.end, RecordEnd::Boundary(Mark::at(second_file)));
    }

    #[test]
    fn file_header_inside_visible_record_is_broken() {
        let mut body = segment(0x80, FILE_HEADER, &[0u8; 12]);
        body.extend(segment(0x80, ORIGIN, &[0u8; 12]));
        body.extend(segment(0x80, FILE_HEADER, &[0u8; 12]));
        body.extend(segment(0x80, ORIGIN, &[0u8; 12]));
        let mut s = open(visible(&body));

        let index = find_record_offsets(&mut s).unwrap();
        assert_eq!(index.explicits, vec![0, 16]);
        assert!(index.broken);
        match index.end {
            RecordEnd::Broken(mark) => assert!(mark > Mark::at(0)),
            other => panic!("expected a broken end, got {other:?}"),
        }
    }

    #[test]
    fn truncated_trailing_record_is_broken() {
        let mut body = segment(0x80, ORIGIN, &[0u8; 12]);
        let mut tail = segment(0x80, CHANNEL, &[0u8; 40]);
        tail.truncate(20);
        body.extend(tail);
        let mut s = open(visible(&body));

        let index = find_record_offsets(&mut s).unwrap();
        assert_eq!(index.explicits, vec![0]);
        assert!(index.broken);
        assert!(matches!(index.end, RecordEnd::Broken(_)));
    }

    #[test]
    fn leading_continuation_segment_is_broken() {
        let mut s = open(visible(&segment(0x80 | 0x40, CHANNEL, &[0u8; 12])));
        let index = find_record_offsets(&mut s).unwrap();
        assert!(index.is_empty());
        assert!(index.broken);
    }

    #[test]
    fn encrypted_flag_is_kept() {
        let mut s = open(visible(&segment(0x80 | 0x10, CHANNEL, &[9u8; 12])));
        let record = read_record(&mut s, 0).unwrap();
        assert!(record.encrypted);
        assert_eq!(record.body.len(), 12);
    }
}
