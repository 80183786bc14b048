//! Logical file segmentation and object pool for RP66 v1 (DLIS) files
//!
//! A physical DLIS file bundles independent logical files, optionally inside
//! a tape-image envelope. This crate splits the physical file into
//! [`LogicalFile`]s and gives each one an [`ObjectPool`]: a type and name
//! indexed view over its metadata objects, with promotion to typed objects,
//! caching and reference linking.
//!
//! # Example
//!
//! ```rust,no_run
//! use rp66_core::{Matcher, load};
//!
//! # fn example() -> rp66_core::Result<()> {
//! for file in load("example.dlis")? {
//!     file.link();
//!     for frame in file.find("FRAME", None, Matcher::Exact)? {
//!         let channels = frame.linked("CHANNELS");
//!         println!("{}: {} channels", frame.fingerprint(), channels.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Error handling
//!
//! Only failures that leave nothing to return are errors. A missing storage
//! unit label, a broken trailing record or a dangling reference are logged
//! through `tracing` and surfaced as flags or empty results.

#![warn(missing_docs)]

pub mod config;
pub mod error;
/// Reference resolution
pub mod link;
pub mod logical_file;
pub mod matcher;
pub mod pool;
pub mod schema;
pub mod segmenter;
/// Typed objects
pub mod typed;

pub use config::LoadConfig;
pub use error::{Error, Result};
pub use link::{DanglingReference, LinkReport};
pub use logical_file::LogicalFile;
pub use matcher::{CompiledMatcher, Matcher};
pub use pool::ObjectPool;
pub use schema::{FieldKind, FieldSpec, Schema, TypeRegistry};
pub use segmenter::{MemorySource, PathSource, Segmenter, StreamSource, load, load_with};
pub use typed::{Link, Shape, TypedObject};

pub use rp66_formats::{Fingerprint, Mark, ObjectName, StorageUnitLabel, Value};
