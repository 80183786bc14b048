//! Physical byte streams with optional tape-image framing
//!
//! [`PhysicalStream`] hides TIF framing from everything above it. Reads in a
//! framed stream skip data tape marks transparently; a file mark ends the
//! stream with an in-band [`EofState::LogicalEof`] rather than a true end of
//! file. Positions are exchanged as [`Mark`]s so a stream can be reopened
//! exactly where a previous one stopped.

use binrw::io::{Read, Seek, SeekFrom};
use serde::Serialize;

use crate::error::{FormatError, FormatResult};
use crate::tif::{self, TAPE_MARK_SIZE};

/// Resumable physical position
///
/// Unframed: `offset` is the byte offset and `skip` is always 0.
/// Framed: `offset` is the offset of the tape mark opening the segment and
/// `skip` counts data bytes already consumed in that segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Mark {
    /// Physical offset
    pub offset: u64,
    /// Data bytes to skip after the tape mark at `offset`
    pub skip: u64,
}

impl Mark {
    /// Mark at a plain byte offset
    pub const fn at(offset: u64) -> Self {
        Self { offset, skip: 0 }
    }
}

/// Why a stream stopped producing bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EofState {
    /// More data may follow
    Open,
    /// A file mark was reached
    LogicalEof,
    /// The underlying file is exhausted
    PhysicalEof,
}

/// Result of peeking one byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peek {
    /// Next byte
    Data(u8),
    /// A file mark is next
    LogicalEof,
    /// Nothing follows
    PhysicalEof,
}

#[derive(Debug, Clone, Copy)]
enum Framing {
    Plain {
        position: u64,
    },
    Tape {
        /// Offset of the tape mark opening the current segment
        segment: u64,
        /// Offset of the next tape mark
        next: u64,
        /// Data bytes consumed in the current segment
        consumed: u64,
    },
}

/// Byte stream over a physical file, optionally tape-image framed
#[derive(Debug)]
pub struct PhysicalStream<R> {
    inner: R,
    framing: Framing,
    state: EofState,
}

impl<R: Read + Seek> PhysicalStream<R> {
    /// Open a stream positioned at `mark`
    pub fn open(inner: R, framed: bool, mark: Mark) -> FormatResult<Self> {
        let framing = if framed {
            Framing::Tape {
                segment: mark.offset,
                next: mark.offset,
                consumed: 0,
            }
        } else {
            Framing::Plain {
                position: mark.offset,
            }
        };
        let mut stream = Self {
            inner,
            framing,
            state: EofState::Open,
        };
        stream.reposition(mark)?;
        Ok(stream)
    }

    /// Whether tape-image framing is active
    pub fn is_framed(&self) -> bool {
        matches!(self.framing, Framing::Tape { .. })
    }

    /// Why the stream last stopped producing bytes
    pub fn state(&self) -> EofState {
        self.state
    }

    /// Resumable position of the next unread byte
    pub fn mark(&self) -> Mark {
        match self.framing {
            Framing::Plain { position } => Mark::at(position),
            Framing::Tape {
                segment,
                next,
                consumed,
            } => {
                if segment + TAPE_MARK_SIZE + consumed >= next {
                    // Segment exhausted, the next open reads the next tape mark
                    Mark::at(next)
                } else {
                    Mark {
                        offset: segment,
                        skip: consumed,
                    }
                }
            }
        }
    }

    /// Physical offset of the next unread byte
    pub fn physical_tell(&self) -> u64 {
        match self.framing {
            Framing::Plain { position } => position,
            Framing::Tape {
                segment, consumed, ..
            } => segment + TAPE_MARK_SIZE + consumed,
        }
    }

    /// Move to `mark`, clearing any end-of-file state
    pub fn reposition(&mut self, mark: Mark) -> FormatResult<()> {
        self.state = EofState::Open;
        match &mut self.framing {
            Framing::Plain { position } => {
                let target = mark.offset + mark.skip;
                self.inner.seek(SeekFrom::Start(target))?;
                *position = target;
            }
            Framing::Tape {
                segment,
                next,
                consumed,
            } => {
                self.inner.seek(SeekFrom::Start(mark.offset))?;
                let Some(tape_mark) = tif::read_tape_mark(&mut self.inner)? else {
                    *segment = mark.offset;
                    *next = mark.offset;
                    *consumed = 0;
                    self.state = EofState::PhysicalEof;
                    return Ok(());
                };
                tape_mark.validate(mark.offset)?;

                let length = tape_mark.data_length(mark.offset);
                *segment = mark.offset;
                *next = u64::from(tape_mark.next);

                if tape_mark.is_file_mark() {
                    *consumed = length;
                    self.state = EofState::LogicalEof;
                    return Ok(());
                }

                if mark.skip > length {
                    return Err(FormatError::SegmentOverrun {
                        offset: mark.offset,
                        skip: mark.skip,
                        length,
                    });
                }
                if mark.skip > 0 {
                    self.inner.seek(SeekFrom::Current(mark.skip as i64))?;
                }
                *consumed = mark.skip;
            }
        }
        Ok(())
    }

    /// Look at the next byte without consuming it
    pub fn peek(&mut self) -> FormatResult<Peek> {
        let mark = self.mark();
        let mut byte = [0u8; 1];
        if self.read(&mut byte)? == 0 {
            return Ok(match self.state {
                EofState::LogicalEof => Peek::LogicalEof,
                _ => Peek::PhysicalEof,
            });
        }
        self.reposition(mark)?;
        Ok(Peek::Data(byte[0]))
    }

    /// Release the underlying reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> Read for PhysicalStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() || self.state != EofState::Open {
            return Ok(0);
        }

        let Self {
            inner,
            framing,
            state,
        } = self;

        match framing {
            Framing::Plain { position } => {
                let n = inner.read(buf)?;
                if n == 0 {
                    *state = EofState::PhysicalEof;
                }
                *position += n as u64;
                Ok(n)
            }
            Framing::Tape {
                segment,
                next,
                consumed,
            } => loop {
                let remaining = next.saturating_sub(*segment + TAPE_MARK_SIZE + *consumed);
                if remaining == 0 {
                    let at = *next;
                    let Some(tape_mark) = tif::read_tape_mark(inner).map_err(FormatError::into_io)?
                    else {
                        *state = EofState::PhysicalEof;
                        return Ok(0);
                    };
                    tape_mark.validate(at).map_err(FormatError::into_io)?;

                    *segment = at;
                    *next = u64::from(tape_mark.next);
                    *consumed = 0;

                    if tape_mark.is_file_mark() {
                        *consumed = tape_mark.data_length(at);
                        *state = EofState::LogicalEof;
                        return Ok(0);
                    }
                    continue;
                }

                let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
                let n = inner.read(&mut buf[..want])?;
                if n == 0 {
                    // Segment shorter than its tape mark claims
                    *state = EofState::PhysicalEof;
                    return Ok(0);
                }
                *consumed += n as u64;
                return Ok(n);
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tif::{TAPE_FILE_MARK, TAPE_RECORD, TapeMark};
    use binrw::BinWrite;
    use binrw::io::Cursor;

    /// Frame `segments` (None = file mark) into a tape image
    fn tape(segments: &[Option<&[u8]>]) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        let mut prev = 0u32;
        for segment in segments {
            let here = out.get_ref().len() as u32;
            let data = segment.unwrap_or(&[]);
            TapeMark {
                kind: if segment.is_some() {
                    TAPE_RECORD
                } else {
                    TAPE_FILE_MARK
                },
                prev,
                next: here + 12 + data.len() as u32,
            }
            .write(&mut out)
            .unwrap();
            out.get_mut().extend_from_slice(data);
            out.set_position(out.get_ref().len() as u64);
            prev = here;
        }
        out.into_inner()
    }

    fn read_all<R: Read>(r: &mut R) -> Vec<u8> {
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn plain_stream_reads_through() {
        let mut s = PhysicalStream::open(Cursor::new(b"abcdef".to_vec()), false, Mark::at(2)).unwrap();
        assert_eq!(read_all(&mut s), b"cdef");
        assert_eq!(s.state(), EofState::PhysicalEof);
        assert_eq!(s.mark(), Mark::at(6));
    }

    #[test]
    fn framed_stream_skips_record_marks() {
        let image = tape(&[Some(b"abc"), Some(b"de")]);
        let mut s = PhysicalStream::open(Cursor::new(image.clone()), true, Mark::at(0)).unwrap();
        assert_eq!(read_all(&mut s), b"abcde");
        assert_eq!(s.state(), EofState::PhysicalEof);
        assert_eq!(s.mark(), Mark::at(image.len() as u64));
    }

    #[test]
    fn file_mark_is_logical_eof() {
        let image = tape(&[Some(b"abc"), None, Some(b"xyz")]);
        let mut s = PhysicalStream::open(Cursor::new(image), true, Mark::at(0)).unwrap();
        assert_eq!(read_all(&mut s), b"abc");
        assert_eq!(s.state(), EofState::LogicalEof);

        // Reopening after the file mark continues with the next segment
        let resume = s.mark();
        assert_eq!(resume, Mark::at(27));
        let inner = s.into_inner();
        let mut s = PhysicalStream::open(inner, true, resume).unwrap();
        assert_eq!(read_all(&mut s), b"xyz");
    }

    #[test]
    fn mark_inside_segment_resumes() {
        let image = tape(&[Some(b"abcdef")]);
        let mut s = PhysicalStream::open(Cursor::new(image), true, Mark::at(0)).unwrap();
        let mut two = [0u8; 2];
        s.read_exact(&mut two).unwrap();
        let mark = s.mark();
        assert_eq!(mark, Mark { offset: 0, skip: 2 });

        let mut s = PhysicalStream::open(s.into_inner(), true, mark).unwrap();
        assert_eq!(read_all(&mut s), b"cdef");
    }

    #[test]
    fn peek_does_not_consume() {
        let image = tape(&[Some(b"q")]);
        let mut s = PhysicalStream::open(Cursor::new(image), true, Mark::at(0)).unwrap();
        assert_eq!(s.peek().unwrap(), Peek::Data(b'q'));
        assert_eq!(s.peek().unwrap(), Peek::Data(b'q'));
        assert_eq!(read_all(&mut s), b"q");
        assert_eq!(s.peek().unwrap(), Peek::PhysicalEof);
    }

    #[test]
    fn peek_reports_file_mark() {
        let image = tape(&[None]);
        let mut s = PhysicalStream::open(Cursor::new(image), true, Mark::at(0)).unwrap();
        assert_eq!(s.peek().unwrap(), Peek::LogicalEof);
        assert_eq!(s.mark(), Mark::at(12));
    }

    #[test]
    fn invalid_tape_mark_is_invalid_data() {
        let mut image = tape(&[Some(b"abc")]);
        image.extend_from_slice(&[9u8; 12]);
        let mut s = PhysicalStream::open(Cursor::new(image), true, Mark::at(0)).unwrap();
        let mut out = Vec::new();
        let err = s.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn skip_beyond_segment_fails() {
        let image = tape(&[Some(b"abc")]);
        let err = PhysicalStream::open(Cursor::new(image), true, Mark { offset: 0, skip: 9 })
            .unwrap_err();
        assert!(matches!(err, FormatError::SegmentOverrun { .. }));
    }
}
