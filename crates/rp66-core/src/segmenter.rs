//! Segmentation of a physical file into logical files
//!
//! The segmenter walks a physical file once. Every logical file gets a
//! fresh handle from a [`StreamSource`], opened at the [`Mark`] where the
//! previous logical file stopped:
//!
//! 1. Open a stream at the next mark, tape framed if the file starts with
//!    a valid tape mark.
//! 2. A file mark at this position is tape padding: step over it and start
//!    again. Physical end of file ends the run.
//! 3. Probe for a storage unit label. One is expected before the first
//!    logical file only.
//! 4. Check for a file mark or end of file again.
//! 5. Find the first visible record and open the protocol stream there.
//! 6. Collect record offsets up to the next logical file.
//! 7. Parse the metadata records, index the frame data and emit.

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rp66_formats::{
    FormatError, Mark, Peek, PhysicalStream, Rp66Stream, StorageUnitLabel, SulProbe,
    build_format_data_index, detect_tape_mark, extract_records, find_record_offsets,
    find_storage_unit_label, find_visible_record, parse_object_sets,
};
use tracing::{debug, error, info, warn};

use crate::config::LoadConfig;
use crate::error::Result;
use crate::logical_file::LogicalFile;
use crate::pool::ObjectPool;
use crate::schema::TypeRegistry;

/// Something that can open independent readers over the same bytes
pub trait StreamSource {
    /// Reader type handed to each logical file
    type Reader: Read + Seek;

    /// Open a new reader positioned at the start
    fn open(&mut self) -> std::io::Result<Self::Reader>;
}

/// A file on disk, reopened for every logical file
#[derive(Debug, Clone)]
pub struct PathSource(PathBuf);

impl PathSource {
    /// Source over the file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self(path.as_ref().to_path_buf())
    }
}

impl StreamSource for PathSource {
    type Reader = File;

    fn open(&mut self) -> std::io::Result<File> {
        File::open(&self.0)
    }
}

/// Bytes in memory, shared between logical files
#[derive(Debug, Clone)]
pub struct MemorySource(Arc<[u8]>);

impl MemorySource {
    /// Source over `bytes`
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }
}

impl StreamSource for MemorySource {
    type Reader = Cursor<Arc<[u8]>>;

    fn open(&mut self) -> std::io::Result<Self::Reader> {
        Ok(Cursor::new(Arc::clone(&self.0)))
    }
}

enum Probe {
    Data,
    FileMark(Mark),
    End,
}

/// Splits a physical file into logical files
#[derive(Debug)]
pub struct Segmenter<S> {
    source: S,
    config: LoadConfig,
    registry: TypeRegistry,
    next: Mark,
    framed: bool,
    storage_unit_label: Option<StorageUnitLabel>,
    emitted: usize,
    done: bool,
}

impl<S: StreamSource> Segmenter<S> {
    /// Start segmenting, probing the start of the file for tape framing
    pub fn new(mut source: S, config: LoadConfig, registry: TypeRegistry) -> Result<Self> {
        let mut probe = source.open()?;
        let framed = detect_tape_mark(&mut probe)?.is_some();
        debug!("Physical file is {}", if framed { "tape framed" } else { "unframed" });
        Ok(Self {
            source,
            config,
            registry,
            next: Mark::at(0),
            framed,
            storage_unit_label: None,
            emitted: 0,
            done: false,
        })
    }

    /// Whether the file is tape framed
    pub fn is_framed(&self) -> bool {
        self.framed
    }

    /// Position the next logical file will be opened at
    pub fn next_offset(&self) -> Mark {
        self.next
    }

    /// Whether segmentation has finished
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Storage unit label read so far
    pub fn storage_unit_label(&self) -> Option<&StorageUnitLabel> {
        self.storage_unit_label.as_ref()
    }

    /// Read the next logical file
    ///
    /// Returns `Ok(None)` once the file is exhausted. An error ends the run.
    pub fn next_logical_file(&mut self) -> Result<Option<LogicalFile<S::Reader>>> {
        if self.done {
            return Ok(None);
        }
        let result = self.step();
        if result.is_err() {
            self.done = true;
        }
        result
    }

    fn check_eof(physical: &mut PhysicalStream<S::Reader>) -> Result<Probe> {
        Ok(match physical.peek()? {
            Peek::Data(_) => Probe::Data,
            Peek::LogicalEof => Probe::FileMark(physical.mark()),
            Peek::PhysicalEof => Probe::End,
        })
    }

    fn step(&mut self) -> Result<Option<LogicalFile<S::Reader>>> {
        loop {
            if self.done {
                return Ok(None);
            }

            let reader = self.source.open()?;
            let mut physical = PhysicalStream::open(reader, self.framed, self.next)?;

            match Self::check_eof(&mut physical)? {
                Probe::Data => {}
                Probe::FileMark(mark) => {
                    debug!("File mark before offset {}, skipping", mark.offset);
                    self.next = mark;
                    continue;
                }
                Probe::End => {
                    self.next = physical.mark();
                    self.done = true;
                    return Ok(None);
                }
            }

            self.locate_storage_unit_label(&mut physical)?;

            match Self::check_eof(&mut physical)? {
                Probe::Data => {}
                Probe::FileMark(mark) => {
                    self.next = mark;
                    continue;
                }
                Probe::End => {
                    self.next = physical.mark();
                    self.done = true;
                    return Ok(None);
                }
            }

            let start = physical.mark();
            let origin = match find_visible_record(
                &mut physical,
                self.config.visible_record_search_limit,
            ) {
                Ok(origin) => origin,
                Err(e @ FormatError::VisibleRecordNotFound { .. }) => {
                    if self.emitted == 0 {
                        return Err(e.into());
                    }
                    warn!("Trailing bytes after logical file {} ignored: {e}", self.emitted);
                    self.next = start;
                    self.done = true;
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

            let mut stream = Rp66Stream::open(physical, origin)?;
            let index = find_record_offsets(&mut stream)?;
            self.next = index.end.resume();
            if self.next <= origin {
                warn!(
                    "Logical file at offset {} does not advance the read position, stopping",
                    origin.offset
                );
                self.done = true;
            }
            if index.broken {
                warn!(
                    "Logical file at offset {} ends in a broken record, stopping after it",
                    origin.offset
                );
                self.done = true;
            }

            if index.is_empty() {
                debug!("Empty logical file at offset {}, skipping", origin.offset);
                continue;
            }

            let records = extract_records(&mut stream, &index.explicits)?;
            let sets = parse_object_sets(&records);
            let fdata = build_format_data_index(&mut stream, &index.implicits)?;

            let mut pool = ObjectPool::new(sets, self.registry.clone());
            pool.cache_metadata(self.config.cache_metadata);

            let file = LogicalFile::new(
                stream,
                self.storage_unit_label.clone(),
                pool,
                fdata,
                index.broken,
            );
            if self.config.link_on_load {
                file.link();
            }

            self.emitted += 1;
            info!(
                "Logical file {} at offset {}: {} metadata records, {} frame data records",
                self.emitted,
                origin.offset,
                index.explicits.len(),
                index.implicits.len()
            );
            return Ok(Some(file));
        }
    }

    fn locate_storage_unit_label(&mut self, physical: &mut PhysicalStream<S::Reader>) -> Result<()> {
        let first = self.emitted == 0 && self.storage_unit_label.is_none();
        match find_storage_unit_label(physical)? {
            SulProbe::Found(label) => {
                if !first {
                    warn!(
                        "Storage unit label after logical file {}, replacing the previous one",
                        self.emitted
                    );
                }
                debug!("Storage unit label: {:?}", label);
                self.storage_unit_label = Some(label);
            }
            SulProbe::Truncated(available) => {
                info!("Storage unit label truncated to {available} bytes, ignored");
            }
            SulProbe::Missing => {
                if first {
                    error!("No storage unit label at the start of the file");
                }
            }
        }
        Ok(())
    }
}

impl<S: StreamSource> Iterator for Segmenter<S> {
    type Item = Result<LogicalFile<S::Reader>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_logical_file().transpose()
    }
}

/// Load every logical file of the file at `path` with default settings
pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<LogicalFile>> {
    load_with(path, &LoadConfig::default(), &TypeRegistry::default())
}

/// Load every logical file of the file at `path`
pub fn load_with<P: AsRef<Path>>(
    path: P,
    config: &LoadConfig,
    registry: &TypeRegistry,
) -> Result<Vec<LogicalFile>> {
    let path = path.as_ref();
    info!("Loading {}", path.display());
    Segmenter::new(PathSource::new(path), config.clone(), registry.clone())?.collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_opens_independent_readers() {
        let mut source = MemorySource::new(vec![1u8, 2, 3]);
        let mut a = source.open().unwrap();
        let mut b = source.open().unwrap();
        let mut byte = [0u8; 1];
        a.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], 1);
        b.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], 1);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let mut segmenter =
            Segmenter::new(MemorySource::new(Vec::new()), LoadConfig::default(), TypeRegistry::default())
                .unwrap();
        assert!(segmenter.next_logical_file().unwrap().is_none());
        assert!(segmenter.is_done());
        assert!(!segmenter.is_framed());
    }

    #[test]
    fn garbage_without_visible_record_is_an_error() {
        let mut segmenter = Segmenter::new(
            MemorySource::new(vec![0u8; 400]),
            LoadConfig::default(),
            TypeRegistry::default(),
        )
        .unwrap();
        assert!(segmenter.next_logical_file().is_err());
        assert!(segmenter.is_done());
    }
}
