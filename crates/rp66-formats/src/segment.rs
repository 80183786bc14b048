//! Logical record segments
//!
//! A logical record is split into one or more segments, each with a 4-byte
//! header (length, attributes, record type) and an optional trailer made of
//! pad bytes, a checksum and a trailing length.

use binrw::io::{Cursor, Read};
use binrw::{BinRead, BinWrite};

use crate::error::{FormatError, FormatResult};

/// Size of a segment header
pub const SEGMENT_HEADER_SIZE: u16 = 4;

/// Smallest legal segment, header included
pub const MIN_SEGMENT_LENGTH: u16 = 16;

/// Segment attribute bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentAttributes(pub u8);

impl SegmentAttributes {
    /// Explicitly formatted logical record
    pub const EXPLICIT: u8 = 0x80;
    /// Not the first segment of the record
    pub const PREDECESSOR: u8 = 0x40;
    /// Not the last segment of the record
    pub const SUCCESSOR: u8 = 0x20;
    /// Body is encrypted
    pub const ENCRYPTED: u8 = 0x10;
    /// Encryption packet present
    pub const ENCRYPTION_PACKET: u8 = 0x08;
    /// Checksum present in the trailer
    pub const CHECKSUM: u8 = 0x04;
    /// Trailing length present in the trailer
    pub const TRAILING_LENGTH: u8 = 0x02;
    /// Pad bytes present
    pub const PADDING: u8 = 0x01;

    const fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    /// Explicitly formatted (EFLR) rather than indirectly formatted (IFLR)
    pub const fn is_explicit(self) -> bool {
        self.has(Self::EXPLICIT)
    }

    /// Continues a previous segment
    pub const fn has_predecessor(self) -> bool {
        self.has(Self::PREDECESSOR)
    }

    /// Continued by a following segment
    pub const fn has_successor(self) -> bool {
        self.has(Self::SUCCESSOR)
    }

    /// Body encrypted
    pub const fn is_encrypted(self) -> bool {
        self.has(Self::ENCRYPTED)
    }

    /// Encryption packet present
    pub const fn has_encryption_packet(self) -> bool {
        self.has(Self::ENCRYPTION_PACKET)
    }

    /// Checksum present
    pub const fn has_checksum(self) -> bool {
        self.has(Self::CHECKSUM)
    }

    /// Trailing length present
    pub const fn has_trailing_length(self) -> bool {
        self.has(Self::TRAILING_LENGTH)
    }

    /// Pad bytes present
    pub const fn has_padding(self) -> bool {
        self.has(Self::PADDING)
    }
}

/// Logical record segment header
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct SegmentHeader {
    /// Segment length including this header
    pub length: u16,
    /// Attribute bits
    #[br(map = |x: u8| SegmentAttributes(x))]
    #[bw(map = |a: &SegmentAttributes| a.0)]
    pub attributes: SegmentAttributes,
    /// Logical record type
    pub record_type: u8,
}

impl SegmentHeader {
    /// Bytes following the header
    pub fn body_length(&self) -> usize {
        usize::from(self.length.saturating_sub(SEGMENT_HEADER_SIZE))
    }

    /// Check the length is legal
    pub fn validate(self) -> FormatResult<Self> {
        if self.length < MIN_SEGMENT_LENGTH {
            return Err(FormatError::InvalidSegment(format!(
                "length {} below minimum {MIN_SEGMENT_LENGTH}",
                self.length
            )));
        }
        Ok(self)
    }

    /// Number of trailing bytes to drop from `body`
    ///
    /// Pad bytes are counted by the last pad byte; checksum and trailing
    /// length are two bytes each and sit after the padding.
    pub fn trailer_length(&self, body: &[u8]) -> FormatResult<usize> {
        let mut trailer = 0;
        if self.attributes.has_trailing_length() {
            trailer += 2;
        }
        if self.attributes.has_checksum() {
            trailer += 2;
        }
        if self.attributes.has_padding() && !self.attributes.is_encrypted() {
            let pad_at = body.len().checked_sub(trailer + 1).ok_or_else(|| {
                FormatError::InvalidSegment("padding flag set on empty segment".to_string())
            })?;
            trailer += usize::from(body[pad_at]);
        }
        if trailer > body.len() {
            return Err(FormatError::InvalidSegment(format!(
                "trailer of {trailer} bytes exceeds segment body of {} bytes",
                body.len()
            )));
        }
        Ok(trailer)
    }
}

/// Read a segment header
///
/// Returns `None` at a clean end of stream; a partial header is an
/// `UnexpectedEof` error.
pub fn read_segment_header<R: Read>(reader: &mut R) -> FormatResult<Option<SegmentHeader>> {
    let mut bytes = [0u8; SEGMENT_HEADER_SIZE as usize];
    let mut filled = 0;
    while filled < bytes.len() {
        let n = reader.read(&mut bytes[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    match filled {
        0 => Ok(None),
        4 => Ok(Some(SegmentHeader::read(&mut Cursor::new(&bytes[..]))?)),
        _ => Err(FormatError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "segment header truncated",
        ))),
    }
}
