//! Storage Unit Label
//!
//! The SUL is a fixed 80-byte ASCII record at the very start of a storage
//! unit, before the first visible record.
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Storage unit sequence number |
//! | 4 | 5 | DLIS version, `V1.00` |
//! | 9 | 6 | Storage unit structure, `RECORD` |
//! | 15 | 5 | Maximum record length |
//! | 20 | 60 | Storage set identifier |

use binrw::io::{Read, Seek};
use serde::Serialize;

use crate::error::FormatResult;
use crate::stream::PhysicalStream;

/// Size of the storage unit label
pub const SUL_SIZE: usize = 80;

/// Minimum number of bytes needed to recognise a label
const SIGNATURE_LEN: usize = 15;

/// Parsed storage unit label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageUnitLabel {
    /// Storage unit sequence number
    pub sequence_number: Option<u32>,
    /// DLIS version string, e.g. `V1.00`
    pub version: String,
    /// Storage unit structure, normally `RECORD`
    pub structure: String,
    /// Maximum visible record length, 0 meaning undefined
    pub max_record_length: Option<u32>,
    /// Storage set identifier
    pub storage_set_id: String,
}

impl StorageUnitLabel {
    /// Whether `bytes` start with something shaped like a label
    pub fn looks_like_label(bytes: &[u8]) -> bool {
        bytes.len() >= SIGNATURE_LEN && &bytes[4..7] == b"V1." && &bytes[9..15] == b"RECORD"
    }

    /// Parse a complete 80-byte label
    ///
    /// Numeric fields are parsed leniently: blanks or garbage become `None`.
    pub fn parse(bytes: &[u8; SUL_SIZE]) -> Self {
        let field = |range: std::ops::Range<usize>| {
            String::from_utf8_lossy(&bytes[range]).trim().to_string()
        };
        let number = |range: std::ops::Range<usize>| field(range).parse::<u32>().ok();

        Self {
            sequence_number: number(0..4),
            version: field(4..9),
            structure: field(9..15),
            max_record_length: number(15..20),
            storage_set_id: field(20..80),
        }
    }
}

/// Outcome of probing for a storage unit label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SulProbe {
    /// A complete label was read and consumed
    Found(StorageUnitLabel),
    /// A label signature was found but fewer than 80 bytes are available
    Truncated(usize),
    /// No label at this position
    Missing,
}

/// Probe for a storage unit label at the stream's current position
///
/// A found label is consumed. On any other outcome the stream is left where
/// it was.
pub fn find_storage_unit_label<R: Read + Seek>(
    stream: &mut PhysicalStream<R>,
) -> FormatResult<SulProbe> {
    let start = stream.mark();
    let mut buf = [0u8; SUL_SIZE];
    let mut filled = 0;
    while filled < SUL_SIZE {
        let n = stream.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled == SUL_SIZE && StorageUnitLabel::looks_like_label(&buf) {
        return Ok(SulProbe::Found(StorageUnitLabel::parse(&buf)));
    }

    stream.reposition(start)?;
    if filled < SUL_SIZE && StorageUnitLabel::looks_like_label(&buf[..filled]) {
        return Ok(SulProbe::Truncated(filled));
    }
    Ok(SulProbe::Missing)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stream::Mark;
    use binrw::io::Cursor;

    fn label() -> Vec<u8> {
        let mut bytes = b"   1V1.00RECORD 8192".to_vec();
        bytes.extend_from_slice(format!("{:<60}", "Default Storage Set").as_bytes());
        bytes
    }

    #[test]
    fn parse_fields() {
        let bytes: [u8; SUL_SIZE] = label().try_into().unwrap();
        let sul = StorageUnitLabel::parse(&bytes);
        assert_eq!(sul.sequence_number, Some(1));
        assert_eq!(sul.version, "V1.00");
        assert_eq!(sul.structure, "RECORD");
        assert_eq!(sul.max_record_length, Some(8192));
        assert_eq!(sul.storage_set_id, "Default Storage Set");
    }

    #[test]
    fn found_label_is_consumed() {
        let mut data = label();
        data.extend_from_slice(&[0xAA, 0xBB]);
        let mut s = PhysicalStream::open(Cursor::new(data), false, Mark::at(0)).unwrap();
        assert!(matches!(
            find_storage_unit_label(&mut s).unwrap(),
            SulProbe::Found(_)
        ));
        assert_eq!(s.mark(), Mark::at(80));
    }

    #[test]
    fn missing_label_leaves_position() {
        let data = vec![0u8; 120];
        let mut s = PhysicalStream::open(Cursor::new(data), false, Mark::at(0)).unwrap();
        assert_eq!(find_storage_unit_label(&mut s).unwrap(), SulProbe::Missing);
        assert_eq!(s.mark(), Mark::at(0));
    }

    #[test]
    fn short_label_is_truncated() {
        let data = label()[..40].to_vec();
        let mut s = PhysicalStream::open(Cursor::new(data), false, Mark::at(0)).unwrap();
        assert_eq!(
            find_storage_unit_label(&mut s).unwrap(),
            SulProbe::Truncated(40)
        );
        assert_eq!(s.mark(), Mark::at(0));
    }

    #[test]
    fn blank_numbers_are_none() {
        let mut bytes = label();
        bytes[0..4].copy_from_slice(b"    ");
        bytes[15..20].copy_from_slice(b"  x  ");
        let bytes: [u8; SUL_SIZE] = bytes.try_into().unwrap();
        let sul = StorageUnitLabel::parse(&bytes);
        assert_eq!(sul.sequence_number, None);
        assert_eq!(sul.max_record_length, None);
    }
}
