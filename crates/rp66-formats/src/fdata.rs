//! Format-data index
//!
//! Every FDATA record starts with the name of the FRAME it belongs to. The
//! index groups sample record offsets by that frame's fingerprint so the
//! frame's samples can be read later without rescanning.

use std::collections::HashMap;

use binrw::io::{Read, Seek};
use tracing::{debug, warn};

use crate::error::FormatResult;
use crate::object::Fingerprint;
use crate::record::{FDATA, read_record};
use crate::repcode::BodyReader;
use crate::visible::Rp66Stream;

/// Object type owning FDATA records
pub const FRAME_TYPE: &str = "FRAME";

/// Frame fingerprint to FDATA record offsets, in file order
pub type FormatDataIndex = HashMap<Fingerprint, Vec<u64>>;

/// Group the implicit records at `implicits` by owning frame
///
/// Records of other IFLR types, encrypted records and records whose frame
/// name cannot be decoded are left out.
pub fn build_format_data_index<R: Read + Seek>(
    stream: &mut Rp66Stream<R>,
    implicits: &[u64],
) -> FormatResult<FormatDataIndex> {
    let mut index = FormatDataIndex::new();
    for &offset in implicits {
        let record = match read_record(stream, offset) {
            Ok(record) => record,
            Err(e) if e.is_structural() => {
                warn!("Skipping unreadable sample record at offset {offset}: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };
        if record.explicit || record.encrypted || record.record_type != FDATA {
            continue;
        }

        match BodyReader::new(&record.body).obname() {
            Ok(name) => index
                .entry(Fingerprint::new(FRAME_TYPE, &name))
                .or_default()
                .push(offset),
            Err(e) => warn!("FDATA record at offset {offset} has no frame name: {e}"),
        }
    }
    debug!(
        "Indexed {} sample records across {} frames",
        index.values().map(Vec::len).sum::<usize>(),
        index.len()
    );
    Ok(index)
}
