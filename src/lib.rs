//! Compound File Binary container engine
//!
//! A reader/writer for the Microsoft Compound File Binary format (OLE2 /
//! structured storage), the hierarchical "filesystem within a file" used
//! as the outer envelope of legacy Office documents, including
//! password-protected OOXML spreadsheets.
//!
//! A document presents a tree of named streams and storages backed by a
//! single seekable byte image. Stream reads and writes are translated into
//! sector allocations, chain traversals and directory updates across the
//! five persistent structures of the format:
//!
//! - the 512-byte [`header`]
//! - the master sector allocation table (MSAT / DIFAT)
//! - the sector allocation table (SAT) and its short-sector twin (SSAT)
//! - the directory of 128-byte entries, and
//! - the per-storage red-black child trees encoded in those entries.
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header (512 bytes)                           │
//! │  - magic D0 CF 11 E0 A1 B1 1A E1             │
//! │  - sector-size powers, chain heads           │
//! │  - first 109 MSAT entries inline             │
//! ├──────────────────────────────────────────────┤
//! │ Sector 0..n (512 bytes each)                 │
//! │  - SAT / SSAT slabs                          │
//! │  - directory sectors (4 entries each)        │
//! │  - stream payload                            │
//! │  - mini-stream container (8 × 64-byte short  │
//! │    sectors per big sector)                   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use compound_rs::{CompoundDocument, EntryType};
//! use std::io::{Cursor, Read, Write};
//!
//! # fn main() -> compound_rs::Result<()> {
//! let mut doc = CompoundDocument::create(Cursor::new(Vec::new()))?;
//! let mut stream = doc.open_write_stream("/EncryptedPackage")?;
//! stream.write_all(&[0xAB; 65]).map_err(compound_rs::CompoundError::Io)?;
//! stream.close()?;
//! let image = doc.into_inner();
//!
//! let mut doc = CompoundDocument::open(image)?;
//! assert!(doc.contains("/EncryptedPackage", EntryType::UserStream));
//! let mut payload = Vec::new();
//! doc.open_read_stream("/EncryptedPackage")?
//!     .read_to_end(&mut payload)
//!     .map_err(compound_rs::CompoundError::Io)?;
//! assert_eq!(payload, vec![0xAB; 65]);
//! # Ok(())
//! # }
//! ```
//!
//! One document instance owns one byte image exclusively; streams borrow
//! the document and cannot outlive it. Concurrent access is not supported.

pub mod binary;
pub mod directory;
pub mod document;
pub mod error;
pub mod header;
pub mod io;
pub mod sector;
pub mod stream;
pub(crate) mod tree;

pub use directory::{DirectoryEntry, DirectoryId, EntryType};
pub use document::CompoundDocument;
pub use error::{CompoundError, Result};
pub use header::Header;
pub use io::ByteImage;
pub use sector::SectorId;
pub use stream::{ReadStream, WriteStream};
