//! # emx-assetbox
//!
//! Ship auxiliary files (templates, static assets, fixtures) inside a compiled
//! binary and read them back through named boxes.
//!
//! Two independent mechanisms produce the same [`AssetBox`] model:
//!
//! ## Appended Archive
//!
//! A zip archive appended to an already-built executable. At runtime the
//! executable inspects itself, finds the archive and indexes it:
//!
//! ```text
//! [ executable bytes ][ local entries ][ central directory ][ end record ]
//! ```
//!
//! The first path segment of every archive entry is the box name, the rest
//! is the path inside the box. Entries whose comment is `dir` are
//! directories. File content is verified against the recorded size and
//! CRC-32; a corrupt entry stays listed but reads as unreadable.
//!
//! See [`ArchiveWriter`] / [`append_boxes`] for producing such an archive and
//! [`appended_boxes`] for reading it.
//!
//! ## Embedded Source
//!
//! A build-time [`Generator`] renders Rust source that rebuilds each box from
//! literals. File content is written either as a byte-string literal or,
//! with compression enabled, as zlib + Ascii85 text:
//!
//! ```text
//! pub fn register_boxes(
//!     registry: &mut ::emx_assetbox::BoxRegistry,
//! ) -> Result<(), ::emx_assetbox::EmbedError> {
//!     registry.register(box_0_assets()?)?;
//!     Ok(())
//! }
//! ```
//!
//! Names and content go through a reversible tag escaper before they touch
//! the template, so files containing template delimiters cannot corrupt the
//! generated structure.

pub mod appended;
pub mod appender;
pub mod archive;
pub mod codec;
pub mod embedded;
pub mod escape;
pub mod generator;
pub mod source;

pub use appended::{appended_boxes, AppendedArchive, EntryReadError, LocateError};
pub use appender::{append_boxes, ArchiveWriter};
pub use archive::{
    AssetBox, BoxRegistry, Content, Entry, EntryError, EntryKind, RegistryError,
};
pub use codec::{CodecError, ContentMode};
pub use embedded::{EmbedError, EmbeddedBoxBuilder, NodeId};
pub use generator::{Generator, GeneratorConfig};
pub use source::{BoxLayout, BoxSource, SourceDir, SourceFile};
