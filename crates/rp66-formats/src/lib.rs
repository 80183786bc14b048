//! Low-level decoding for RP66 v1 (DLIS) well-log files
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::cast_precision_loss)] // Float decoding of integer fields
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Many RP66 terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::float_cmp)] // Binary format requirements
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! This crate reads the layers of a DLIS file from the outside in:
//!
//! - **TIF**: optional tape-image framing with 12-byte tape marks
//! - **Storage Unit Label**: 80-byte ASCII label at the start of the file
//! - **Visible records**: 4-byte headers packing logical record segments
//! - **Logical records**: segments with attribute bits and trailers
//! - **EFLR**: explicitly formatted records holding metadata object sets
//! - **IFLR**: indirectly formatted records holding frame data
//!
//! Each layer exposes the probes the segmentation engine needs: detect a
//! tape mark, find the storage unit label, find the first visible record,
//! find every record offset up to the next logical file, and decode records
//! into object sets or a format-data index.
//!
//! # Positions
//!
//! Positions inside a tape-framed file are not plain byte offsets. They are
//! exchanged as [`Mark`]s that name the tape segment and the number of data
//! bytes already consumed in it, so a stream can be reopened exactly where a
//! previous one stopped.

#![warn(missing_docs)]

pub mod eflr;
pub mod error;
pub mod fdata;
pub mod object;
/// Logical record offset discovery
pub mod offsets;
pub mod record;
/// Representation codes
pub mod repcode;
pub mod segment;
/// Physical streams and resumable positions
pub mod stream;
pub mod sul;
pub mod tif;
pub mod visible;

pub use eflr::{parse_object_sets, parse_set};
pub use error::{FormatError, FormatResult};
pub use fdata::{FormatDataIndex, build_format_data_index};
pub use object::{Attribute, Fingerprint, ObjectName, ObjectSet, RawObject, SetRole};
pub use offsets::{RecordEnd, RecordIndex, find_record_offsets};
pub use record::{RawRecord, extract_records, read_record};
pub use repcode::Value;
pub use stream::{EofState, Mark, Peek, PhysicalStream};
pub use sul::{StorageUnitLabel, SulProbe, find_storage_unit_label};
pub use tif::{TapeMark, detect_tape_mark};
pub use visible::{Rp66Stream, find_visible_record};
