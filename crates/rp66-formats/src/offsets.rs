//! Logical record offset discovery
//!
//! One pass over a protocol stream collects the logical offset of every
//! explicitly formatted record (metadata) and every indirectly formatted
//! record (sample data), stopping at the next logical file boundary.

use binrw::io::{Read, Seek};
use tracing::{debug, warn};

use crate::error::{FormatError, FormatResult};
use crate::record::FILE_HEADER;
use crate::segment::read_segment_header;
use crate::stream::{EofState, Mark};
use crate::visible::Rp66Stream;

/// Where and why an offset scan stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordEnd {
    /// A FILE-HEADER opened the next logical file in the visible record at `Mark`
    Boundary(Mark),
    /// A tape file mark ended the logical file
    FileMark(Mark),
    /// The physical file ended
    Eof(Mark),
    /// The remaining bytes are not a valid record
    Broken(Mark),
}

impl RecordEnd {
    /// Position the next logical file must be opened at
    pub fn resume(&self) -> Mark {
        match *self {
            Self::Boundary(m) | Self::FileMark(m) | Self::Eof(m) | Self::Broken(m) => m,
        }
    }
}

/// Record offsets of one logical file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIndex {
    /// Offsets of explicitly formatted records
    pub explicits: Vec<u64>,
    /// Offsets of indirectly formatted records
    pub implicits: Vec<u64>,
    /// Trailing bytes could not be interpreted as a record
    pub broken: bool,
    /// Why the scan stopped
    pub end: RecordEnd,
}

impl RecordIndex {
    /// Total number of records found
    pub fn len(&self) -> usize {
        self.explicits.len() + self.implicits.len()
    }

    /// Whether no records were found
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

enum Step {
    Record { offset: u64, explicit: bool },
    Boundary(Mark),
    End,
}

/// Scan forward collecting record offsets until the next logical file
pub fn find_record_offsets<R: Read + Seek>(
    stream: &mut Rp66Stream<R>,
) -> FormatResult<RecordIndex> {
    let mut explicits = Vec::new();
    let mut implicits = Vec::new();

    loop {
        let first = explicits.is_empty() && implicits.is_empty();
        match next_record(stream, first) {
            Ok(Step::Record { offset, explicit }) => {
                if explicit {
                    explicits.push(offset);
                } else {
                    implicits.push(offset);
                }
            }
            Ok(Step::Boundary(mark)) => {
                debug!(
                    "Logical file boundary after {} records",
                    explicits.len() + implicits.len()
                );
                return Ok(RecordIndex {
                    explicits,
                    implicits,
                    broken: false,
                    end: RecordEnd::Boundary(mark),
                });
            }
            Ok(Step::End) => {
                let mark = stream.physical_mark();
                let end = match stream.eof_state() {
                    EofState::LogicalEof => RecordEnd::FileMark(mark),
                    _ => RecordEnd::Eof(mark),
                };
                return Ok(RecordIndex {
                    explicits,
                    implicits,
                    broken: false,
                    end,
                });
            }
            Err(e) if e.is_structural() => {
                warn!(
                    "Broken record at logical offset {}, {} records kept: {e}",
                    stream.tell(),
                    explicits.len() + implicits.len()
                );
                return Ok(RecordIndex {
                    explicits,
                    implicits,
                    broken: true,
                    end: RecordEnd::Broken(stream.physical_mark()),
                });
            }
            Err(e) => return Err(e),
        }
    }
}

fn next_record<R: Read + Seek>(stream: &mut Rp66Stream<R>, first: bool) -> FormatResult<Step> {
    if !stream.fill()? {
        return Ok(Step::End);
    }
    let offset = stream.tell();
    let visible = stream.visible_position();

    let Some(header) = read_segment_header(stream)? else {
        return Ok(Step::End);
    };
    let header = header.validate()?;

    if header.attributes.has_predecessor() {
        return Err(FormatError::InvalidSegment(format!(
            "record at offset {offset} starts with a continuation segment"
        )));
    }

    if header.attributes.is_explicit() && header.record_type == FILE_HEADER && !first {
        if let Some(position) = visible {
            // The next logical file can only be opened at a visible record
            if !position.at_start {
                return Err(FormatError::InvalidSegment(format!(
                    "FILE-HEADER at offset {offset} does not start a visible record"
                )));
            }
            return Ok(Step::Boundary(position.mark));
        }
    }

    let explicit = header.attributes.is_explicit();
    let mut segment = header;
    loop {
        stream.skip(segment.body_length() as u64)?;
        if !segment.attributes.has_successor() {
            break;
        }
        let next = read_segment_header(stream)?.ok_or_else(|| {
            FormatError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("record at offset {offset} ends before its last segment"),
            ))
        })?;
        let next = next.validate()?;
        if !next.attributes.has_predecessor() {
            return Err(FormatError::InvalidSegment(format!(
                "record at offset {offset} continues with a segment lacking the predecessor bit"
            )));
        }
        segment = next;
    }

    Ok(Step::Record { offset, explicit })
}
