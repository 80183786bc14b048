//! Tape Image Format (TIF) framing
//!
//! TIF emulates magnetic tape on disk. Every physical segment is preceded by
//! a 12-byte little-endian tape mark holding its type and the offsets of the
//! previous and next tape marks. A tape mark of type 1 is a file mark and
//! carries no data.

use binrw::io::{Read, Seek, SeekFrom};
use binrw::{BinRead, BinWrite};

use crate::error::{FormatError, FormatResult};

/// Size of a tape mark header
pub const TAPE_MARK_SIZE: u64 = 12;

/// Tape mark type for a data segment
pub const TAPE_RECORD: u32 = 0;

/// Tape mark type for a file mark
pub const TAPE_FILE_MARK: u32 = 1;

/// TIF tape mark header
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct TapeMark {
    /// Mark type: 0 data segment, 1 file mark
    pub kind: u32,
    /// Offset of the previous tape mark
    pub prev: u32,
    /// Offset of the next tape mark
    pub next: u32,
}

impl TapeMark {
    /// Check the mark is consistent with the offset it was read at
    pub fn is_valid(&self, offset: u64) -> bool {
        if self.kind != TAPE_RECORD && self.kind != TAPE_FILE_MARK {
            return false;
        }
        if u64::from(self.next) < offset + TAPE_MARK_SIZE {
            return false;
        }
        if offset == 0 {
            return self.prev == 0;
        }
        u64::from(self.prev) < offset
    }

    /// Whether this is a file mark
    pub fn is_file_mark(&self) -> bool {
        self.kind == TAPE_FILE_MARK
    }

    /// Number of data bytes following this mark
    pub fn data_length(&self, offset: u64) -> u64 {
        u64::from(self.next).saturating_sub(offset + TAPE_MARK_SIZE)
    }

    /// Validate against an offset, producing a descriptive error
    pub fn validate(&self, offset: u64) -> FormatResult<()> {
        if self.is_valid(offset) {
            Ok(())
        } else {
            Err(FormatError::InvalidTapeMark {
                offset,
                kind: self.kind,
                prev: self.prev,
                next: self.next,
            })
        }
    }
}

/// Read a tape mark at the reader's current position
///
/// Returns `None` when the reader is exactly at end of file. A partial
/// header is an `UnexpectedEof` error.
pub fn read_tape_mark<R: Read>(reader: &mut R) -> FormatResult<Option<TapeMark>> {
    let mut buf = [0u8; TAPE_MARK_SIZE as usize];
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    match filled {
        0 => Ok(None),
        12 => Ok(Some(TapeMark::read(&mut binrw::io::Cursor::new(&buf[..]))?)),
        _ => Err(FormatError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("tape mark truncated after {filled} bytes"),
        ))),
    }
}

/// Probe for a valid tape mark at the reader's current position
///
/// The reader is restored to where it was.
pub fn detect_tape_mark<R: Read + Seek>(reader: &mut R) -> FormatResult<Option<TapeMark>> {
    let start = reader.stream_position()?;
    let probe = read_tape_mark(reader);
    reader.seek(SeekFrom::Start(start))?;

    match probe {
        Ok(Some(mark)) if mark.is_valid(start) => Ok(Some(mark)),
        Ok(_) => Ok(None),
        Err(e) if e.is_structural() => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::BinWrite;
    use binrw::io::Cursor;

    fn encode(mark: TapeMark) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        mark.write(&mut cursor).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn first_mark_requires_zero_prev() {
        let mark = TapeMark {
            kind: TAPE_RECORD,
            prev: 0,
            next: 100,
        };
        assert!(mark.is_valid(0));

        let bad = TapeMark { prev: 4, ..mark };
        assert!(!bad.is_valid(0));
    }

    #[test]
    fn next_must_point_past_header() {
        let mark = TapeMark {
            kind: TAPE_RECORD,
            prev: 0,
            next: 8,
        };
        assert!(!mark.is_valid(0));
    }

    #[test]
    fn unknown_kind_is_invalid() {
        let mark = TapeMark {
            kind: 7,
            prev: 0,
            next: 100,
        };
        assert!(!mark.is_valid(0));
    }

    #[test]
    fn detect_restores_position() {
        let mut data = encode(TapeMark {
            kind: TAPE_RECORD,
            prev: 0,
            next: 20,
        });
        data.extend_from_slice(&[0u8; 8]);
        let mut cursor = Cursor::new(data);

        let mark = detect_tape_mark(&mut cursor).unwrap();
        assert_eq!(mark.map(|m| m.next), Some(20));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn detect_rejects_plain_data() {
        // Storage unit label bytes are not a tape mark
        let mut cursor = Cursor::new(b"   1V1.00RECORD 8192".to_vec());
        assert!(detect_tape_mark(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn detect_on_short_file() {
        let mut cursor = Cursor::new(vec![0u8; 5]);
        assert!(detect_tape_mark(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn tape_mark_is_little_endian() {
        let bytes = encode(TapeMark {
            kind: TAPE_FILE_MARK,
            prev: 0x10,
            next: 0x20,
        });
        assert_eq!(
            bytes,
            vec![1, 0, 0, 0, 0x10, 0, 0, 0, 0x20, 0, 0, 0]
        );
    }
}
