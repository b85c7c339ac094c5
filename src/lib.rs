//! A library for reading and writing ZIP archives one entry at a time.
//!
//! An archive is opened on a [`ZipStore`] in one of four [`OpenMode`]s. Its entries are walked
//! with a cursor ([`ZipArchive::go_to_first_file`], [`ZipArchive::go_to_next_file`],
//! [`ZipArchive::set_current_file`]) and accessed through a [`ZipFile`] stream, which reads the
//! current entry or writes a new one.
//!
//! Supported features:
//!
//! * stored and deflated entries
//! * traditional PKWARE encryption (ZipCrypto)
//! * ZIP64 archives and entries
//! * archives with data prepended, such as self-extracting executables
//! * entry names in any code page, selected per archive
//!
//! Multi-disk archives are not supported.
//!
//! ```
//! use std::io::Cursor;
//! use zipio::{CaseSensitivity, FileOptions, NewFileInfo, OpenMode, ZipArchive, ZipFile};
//!
//! let mut archive = ZipArchive::open(Cursor::new(Vec::new()), OpenMode::Create)?;
//! let mut file = ZipFile::new(&mut archive);
//! file.open_write(NewFileInfo::new("docs/readme.txt"), None, FileOptions::default())?;
//! file.write(b"read me")?;
//! file.close()?;
//! drop(file);
//! archive.set_comment("an example")?;
//! let store = archive.into_inner()?;
//!
//! let mut archive = ZipArchive::open(store, OpenMode::Unzip)?;
//! assert_eq!(archive.comment(), "an example");
//! let mut file = ZipFile::new(&mut archive);
//! file.open_read_by_name("DOCS/README.TXT", CaseSensitivity::Insensitive, None)?;
//! assert_eq!(file.read_all()?, b"read me");
//! # Ok::<(), zipio::result::ZipError>(())
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use crate::archive::{ArchiveConfig, CaseSensitivity, OpenMode, ZipArchive};
pub use crate::codec::FileNameCodec;
pub use crate::compression::CompressionMethod;
pub use crate::cp437::FromCp437;
pub use crate::file::ZipFile;
pub use crate::store::{ReadOnlyStore, ZipStore};
pub use crate::types::{DateTime, FileInfo, FileInfo64, System};
pub use crate::write::{FileOptions, NewFileInfo};

mod archive;
mod codec;
mod compression;
mod cp437;
mod crc32;
pub mod dir;
mod extra_fields;
mod file;
mod read;
pub mod result;
mod spec;
mod store;
mod types;
mod write;
mod zipcrypto;
