//! Error types for low-level RP66 decoding

use thiserror::Error;

/// Result type for low-level decoding operations
pub type FormatResult<T> = Result<T, FormatError>;

/// Errors raised while decoding framing, records and sets
#[derive(Debug, Error)]
pub enum FormatError {
    /// Tape mark header failed validation
    #[error("invalid tape mark at offset {offset}: type={kind}, prev={prev}, next={next}")]
    InvalidTapeMark {
        /// Physical offset of the tape mark
        offset: u64,
        /// Tape mark type field
        kind: u32,
        /// Offset of the previous tape mark
        prev: u32,
        /// Offset of the next tape mark
        next: u32,
    },

    /// Tape mark skip points outside the segment it belongs to
    #[error("resume position {skip} is outside tape segment at offset {offset} ({length} bytes)")]
    SegmentOverrun {
        /// Offset of the segment's tape mark
        offset: u64,
        /// Requested skip into the segment data
        skip: u64,
        /// Length of the segment data
        length: u64,
    },

    /// No visible record header within the search window
    #[error("no visible record found within {searched} bytes of offset {offset}")]
    VisibleRecordNotFound {
        /// Physical offset the search started at
        offset: u64,
        /// Number of bytes examined
        searched: usize,
    },

    /// Visible record header is malformed
    #[error("invalid visible record header: length={length}, pad=0x{pad:02X}, version={version}")]
    InvalidVisibleRecord {
        /// Declared record length
        length: u16,
        /// Padding byte (expected 0xFF)
        pad: u8,
        /// Format version (expected 1)
        version: u8,
    },

    /// Logical record segment header or trailer is malformed
    #[error("invalid logical record segment: {0}")]
    InvalidSegment(String),

    /// Unknown representation code
    #[error("unknown representation code: {0}")]
    UnknownRepresentationCode(u8),

    /// Not enough bytes to decode a value
    #[error("truncated data: needed {needed} bytes at position {position}, {available} available")]
    Truncated {
        /// Bytes needed
        needed: usize,
        /// Position in the record body
        position: usize,
        /// Bytes available
        available: usize,
    },

    /// Component with an unexpected role in a set
    #[error("unexpected {role} component in {context}")]
    UnexpectedComponent {
        /// Component role name
        role: &'static str,
        /// Where it was found
        context: &'static str,
    },

    /// Set component without the mandatory type
    #[error("set component has no type")]
    MissingSetType,

    /// Template attribute without the mandatory label
    #[error("template attribute {0} has no label")]
    MissingLabel(usize),

    /// Object component without the mandatory name
    #[error("object component has no name")]
    MissingObjectName,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl FormatError {
    /// Check if this error means the data is structurally unusable
    ///
    /// Truncation and malformed framing are structural, anything else from
    /// the operating system is not.
    pub fn is_structural(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData
            ),
            Self::BinRw(binrw::Error::Io(e)) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData
            ),
            _ => true,
        }
    }

    /// Wrap this error into an `InvalidData` I/O error
    pub fn into_io(self) -> std::io::Error {
        match self {
            Self::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}
