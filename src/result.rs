//! Errors reported by archives and entry streams.

use displaydoc::Display;
use std::borrow::Cow;
use std::io;
use std::num::TryFromIntError;
use thiserror::Error;

pub type ZipResult<T> = Result<T, ZipError>;

/// Everything that can go wrong while reading or writing an archive.
///
/// Converts into [`io::Error`] so that entry streams can implement [`io::Read`] and
/// [`io::Write`].
#[derive(Debug, Display, Error)]
#[non_exhaustive]
pub enum ZipError {
    /// i/o error: {0}
    Io(#[from] io::Error),

    /// invalid Zip archive: {0}
    InvalidArchive(Cow<'static, str>),

    /// unsupported Zip archive: {0}
    UnsupportedArchive(Cow<'static, str>),

    /// corrupt compressed data: {0}
    Codec(Cow<'static, str>),

    /// incorrect or missing password for {filename}
    InvalidPassword {
        /// Name of the entry that could not be decrypted.
        filename: Box<str>,
    },

    /// checksum mismatch: expected {expected:#010x}, computed {actual:#010x}
    Integrity {
        /// CRC-32 recorded in the central directory.
        expected: u32,
        /// CRC-32 of the bytes actually produced.
        actual: u32,
    },

    /// operation not valid in the current state: {0}
    InvalidState(Cow<'static, str>),

    /// specified file not found in archive: {0}
    FileNotFound(Box<str>),
}

impl ZipError {
    /// Whether this error is a structural problem with the archive container.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_)
        )
    }
}

pub(crate) fn invalid_archive<T, M: Into<Cow<'static, str>>>(message: M) -> ZipResult<T> {
    Err(ZipError::InvalidArchive(message.into()))
}

pub(crate) fn unsupported_zip_error<T, M: Into<Cow<'static, str>>>(message: M) -> ZipResult<T> {
    Err(ZipError::UnsupportedArchive(message.into()))
}

pub(crate) fn invalid_state<T, M: Into<Cow<'static, str>>>(message: M) -> ZipResult<T> {
    Err(ZipError::InvalidState(message.into()))
}

macro_rules! invalid {
    ($fmt_string:literal) => {
        {
            return crate::result::invalid_archive($fmt_string);
        }
    };
    ($fmt_string:literal, $($param:expr),+) => {
        {
            return crate::result::invalid_archive(format!($fmt_string, $($param),+));
        }
    };
}
pub(crate) use invalid;

impl From<ZipError> for io::Error {
    fn from(err: ZipError) -> io::Error {
        let kind = match &err {
            ZipError::Io(err) => err.kind(),
            ZipError::InvalidArchive(_) => io::ErrorKind::InvalidData,
            ZipError::UnsupportedArchive(_) => io::ErrorKind::Unsupported,
            ZipError::Codec(_) => io::ErrorKind::InvalidData,
            ZipError::InvalidPassword { .. } => io::ErrorKind::InvalidInput,
            ZipError::Integrity { .. } => io::ErrorKind::InvalidData,
            ZipError::InvalidState(_) => io::ErrorKind::Other,
            ZipError::FileNotFound(_) => io::ErrorKind::NotFound,
        };

        io::Error::new(kind, err)
    }
}

/// date and time outside the MS-DOS range (1980-2107)
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeRangeError;

impl From<TryFromIntError> for DateTimeRangeError {
    fn from(_: TryFromIntError) -> Self {
        DateTimeRangeError
    }
}
