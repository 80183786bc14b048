//! Visible records and the protocol-aware stream
//!
//! Logical record segments are packed into visible records, each starting
//! with a 4-byte header: a big-endian length (header included), a 0xFF pad
//! byte and the format version 1. [`Rp66Stream`] strips those headers and
//! exposes the segment bytes as one contiguous logical stream.

use binrw::io::{Cursor, Read, Seek};
use binrw::{BinRead, BinWrite};
use tracing::debug;

use crate::error::{FormatError, FormatResult};
use crate::stream::{EofState, Mark, PhysicalStream};

/// Size of a visible record header
pub const VISIBLE_HEADER_SIZE: u64 = 4;

/// Smallest legal visible record
pub const MIN_VISIBLE_LENGTH: u16 = 20;

/// Default number of bytes searched for the first visible record
pub const DEFAULT_SEARCH_LIMIT: usize = 200;

/// Visible record header
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct VisibleRecordHeader {
    /// Record length including this header
    pub length: u16,
    /// Padding byte, always 0xFF
    pub pad: u8,
    /// Format version, always 1
    pub version: u8,
}

impl VisibleRecordHeader {
    /// Decode a header from 4 bytes
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            length: u16::from_be_bytes([bytes[0], bytes[1]]),
            pad: bytes[2],
            version: bytes[3],
        }
    }

    /// Check pad byte, version and minimum length
    pub fn is_valid(&self) -> bool {
        self.pad == 0xFF && self.version == 1 && self.length >= MIN_VISIBLE_LENGTH
    }

    /// Bytes following the header
    pub fn body_length(&self) -> u64 {
        u64::from(self.length).saturating_sub(VISIBLE_HEADER_SIZE)
    }

    fn validate(self) -> FormatResult<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(FormatError::InvalidVisibleRecord {
                length: self.length,
                pad: self.pad,
                version: self.version,
            })
        }
    }
}

/// Locate the next visible record header within `search_limit` bytes
///
/// On success the stream is positioned on the header and its mark returned.
pub fn find_visible_record<R: Read + Seek>(
    stream: &mut PhysicalStream<R>,
    search_limit: usize,
) -> FormatResult<Mark> {
    let start = stream.physical_tell();
    let mut window: Vec<(Mark, u8)> = Vec::with_capacity(search_limit + 4);

    while window.len() < search_limit + 4 {
        let mark = stream.mark();
        let mut byte = [0u8; 1];
        if stream.read(&mut byte)? == 0 {
            break;
        }
        window.push((mark, byte[0]));

        if let [.., (mark, a), (_, b), (_, c), (_, d)] = window.as_slice() {
            if VisibleRecordHeader::from_bytes([*a, *b, *c, *d]).is_valid() {
                let mark = *mark;
                stream.reposition(mark)?;
                debug!("Visible record at offset {} (+{})", mark.offset, mark.skip);
                return Ok(mark);
            }
        }
    }

    Err(FormatError::VisibleRecordNotFound {
        offset: start,
        searched: window.len(),
    })
}

/// Index entry for a visible record the stream has passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VisibleEntry {
    /// Logical offset of the first body byte
    logical: u64,
    /// Physical position of the header
    mark: Mark,
    /// Body length
    length: u64,
}

/// Position of the stream relative to the current visible record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisiblePosition {
    /// Physical position of the visible record header
    pub mark: Mark,
    /// Whether no body byte of the record has been consumed yet
    pub at_start: bool,
}

/// Protocol-aware stream: visible record headers removed
///
/// Logical offsets count body bytes from the first visible record the
/// stream was opened at.
#[derive(Debug)]
pub struct Rp66Stream<R> {
    physical: PhysicalStream<R>,
    origin: Mark,
    index: Vec<VisibleEntry>,
    current: Option<VisibleEntry>,
    tell: u64,
    remaining: u64,
}

impl<R: Read + Seek> Rp66Stream<R> {
    /// Open on the visible record header at `origin`
    pub fn open(mut physical: PhysicalStream<R>, origin: Mark) -> FormatResult<Self> {
        physical.reposition(origin)?;
        Ok(Self {
            physical,
            origin,
            index: Vec::new(),
            current: None,
            tell: 0,
            remaining: 0,
        })
    }

    /// Mark of the first visible record
    pub fn origin(&self) -> Mark {
        self.origin
    }

    /// Logical offset of the next unread byte
    pub fn tell(&self) -> u64 {
        self.tell
    }

    /// End-of-file state of the physical stream
    pub fn eof_state(&self) -> EofState {
        self.physical.state()
    }

    /// Resumable physical position of the next unread byte
    pub fn physical_mark(&self) -> Mark {
        self.physical.mark()
    }

    /// Whether the physical stream is tape framed
    pub fn is_framed(&self) -> bool {
        self.physical.is_framed()
    }

    /// The visible record holding the next unread byte
    ///
    /// Only meaningful after a successful [`fill`](Self::fill).
    pub fn visible_position(&self) -> Option<VisiblePosition> {
        self.current.map(|entry| VisiblePosition {
            mark: entry.mark,
            at_start: self.remaining == entry.length,
        })
    }

    /// Make sure a body byte is available, reading the next header if needed
    ///
    /// Returns `false` on a clean end of stream at a visible record boundary.
    pub fn fill(&mut self) -> std::io::Result<bool> {
        while self.remaining == 0 {
            if !self.next_visible_record()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn next_visible_record(&mut self) -> std::io::Result<bool> {
        let mark = self.physical.mark();
        let mut bytes = [0u8; VISIBLE_HEADER_SIZE as usize];
        let mut filled = 0;
        while filled < bytes.len() {
            let n = self.physical.read(&mut bytes[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        match filled {
            0 => return Ok(false),
            4 => {}
            _ => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("visible record header truncated at offset {}", mark.offset),
                ));
            }
        }

        let header = VisibleRecordHeader::read(&mut Cursor::new(&bytes[..]))
            .map_err(|e| FormatError::from(e).into_io())?
            .validate()
            .map_err(FormatError::into_io)?;

        let entry = VisibleEntry {
            logical: self.tell,
            mark,
            length: header.body_length(),
        };
        if self.index.last().is_none_or(|last| last.logical < entry.logical) {
            self.index.push(entry);
        }
        self.current = Some(entry);
        self.remaining = entry.length;
        Ok(true)
    }

    /// Consume `n` logical bytes
    pub fn skip(&mut self, mut n: u64) -> std::io::Result<()> {
        let mut scratch = [0u8; 4096];
        while n > 0 {
            let want = scratch.len().min(usize::try_from(n).unwrap_or(usize::MAX));
            let got = self.read(&mut scratch[..want])?;
            if got == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("stream ended {n} bytes short of skip target"),
                ));
            }
            n -= got as u64;
        }
        Ok(())
    }

    /// Move to a logical offset
    ///
    /// Visible records already passed are reopened directly; anything
    /// beyond them is reached by reading forward.
    pub fn seek(&mut self, logical: u64) -> FormatResult<()> {
        let slot = self.index.partition_point(|e| e.logical <= logical);
        let (mark, base) = match slot.checked_sub(1).map(|i| self.index[i]) {
            Some(entry) => (entry.mark, entry.logical),
            None => (self.origin, 0),
        };

        self.physical.reposition(mark)?;
        self.tell = base;
        self.remaining = 0;
        self.current = None;
        self.fill()?;
        self.skip(logical - base)?;
        Ok(())
    }
}

impl<R: Read + Seek> Read for Rp66Stream<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() || !self.fill()? {
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.physical.read(&mut buf[..want])?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "visible record truncated, {} bytes missing",
                    self.remaining
                ),
            ));
        }
        self.remaining -= n as u64;
        self.tell += n as u64;
        Ok(n)
    }
}
