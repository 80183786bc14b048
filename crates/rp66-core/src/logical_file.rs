//! Logical files

use std::fs::File;
use std::io::{Read, Seek};
use std::rc::Rc;

use rp66_formats::{
    Fingerprint, FormatDataIndex, Mark, RawRecord, Rp66Stream, StorageUnitLabel, read_record,
};
use tracing::debug;

use crate::error::Result;
use crate::link::LinkReport;
use crate::matcher::Matcher;
use crate::pool::ObjectPool;
use crate::typed::TypedObject;

/// One independent logical file of a physical file
///
/// Owns its own stream handle, opened at its first visible record. Handles
/// are never shared between logical files.
#[derive(Debug)]
pub struct LogicalFile<R = File> {
    stream: Rp66Stream<R>,
    offset: Mark,
    storage_unit_label: Option<StorageUnitLabel>,
    pool: ObjectPool,
    fdata: FormatDataIndex,
    broken: bool,
}

impl<R: Read + Seek> LogicalFile<R> {
    pub(crate) fn new(
        stream: Rp66Stream<R>,
        storage_unit_label: Option<StorageUnitLabel>,
        pool: ObjectPool,
        fdata: FormatDataIndex,
        broken: bool,
    ) -> Self {
        Self {
            offset: stream.origin(),
            stream,
            storage_unit_label,
            pool,
            fdata,
            broken,
        }
    }

    /// Physical position of the first visible record
    pub fn offset(&self) -> Mark {
        self.offset
    }

    /// Storage unit label in effect when this file was read
    pub fn storage_unit_label(&self) -> Option<&StorageUnitLabel> {
        self.storage_unit_label.as_ref()
    }

    /// Whether trailing bytes could not be interpreted as records
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Object pool
    pub fn pool(&self) -> &ObjectPool {
        &self.pool
    }

    /// Object pool, mutable
    pub fn pool_mut(&mut self) -> &mut ObjectPool {
        &mut self.pool
    }

    /// Objects matching a type and optional name
    pub fn find(
        &self,
        object_type: &str,
        name: Option<&str>,
        matcher: Matcher,
    ) -> Result<Vec<Rc<TypedObject>>> {
        self.pool.find(object_type, name, matcher)
    }

    /// Exactly one object
    pub fn object(
        &self,
        object_type: &str,
        name: &str,
        origin: Option<u32>,
        copy: Option<u8>,
    ) -> Result<Rc<TypedObject>> {
        self.pool.object(object_type, name, origin, copy)
    }

    /// Object types present
    pub fn types(&self) -> Vec<String> {
        self.pool.types().into_iter().collect()
    }

    /// Enable or disable the object cache
    ///
    /// Linking caches every object regardless of this setting; see
    /// [`ObjectPool::cache_metadata`].
    pub fn cache_metadata(&mut self, enabled: bool) {
        self.pool.cache_metadata(enabled);
    }

    /// Resolve references between objects
    pub fn link(&self) -> LinkReport {
        self.pool.link()
    }

    /// Frame data record offsets grouped by frame
    pub fn format_data_index(&self) -> &FormatDataIndex {
        &self.fdata
    }

    /// Frame data record offsets of one frame
    pub fn fdata(&self, frame: &Fingerprint) -> &[u64] {
        self.fdata.get(frame).map_or(&[][..], Vec::as_slice)
    }

    /// Read the frame data records of one frame
    pub fn read_fdata(&mut self, frame: &Fingerprint) -> Result<Vec<RawRecord>> {
        let offsets = self.fdata.get(frame).cloned().unwrap_or_default();
        let mut records = Vec::with_capacity(offsets.len());
        for offset in offsets {
            records.push(read_record(&mut self.stream, offset)?);
        }
        Ok(records)
    }

    /// Release the stream handle
    pub fn close(self) {
        debug!(
            "Closing logical file at offset {} (+{})",
            self.offset.offset, self.offset.skip
        );
    }
}
