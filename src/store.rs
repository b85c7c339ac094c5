//! Byte stores an archive can live in.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// Addressable byte storage backing a [`crate::ZipArchive`].
///
/// Reading only needs `Read + Seek`; wrap such sources in [`ReadOnlyStore`]. Writing also
/// needs to cut the store down to the end of the archive, since a rewritten central directory
/// can be shorter than what it replaces.
pub trait ZipStore: Read + Write + Seek {
    /// Shorten (or extend) the store to `len` bytes.
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Total length of the store. The current position is preserved.
    fn size(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let len = self.seek(SeekFrom::End(0))?;
        if pos != len {
            self.seek(SeekFrom::Start(pos))?;
        }
        Ok(len)
    }

    /// Whether writes can succeed at all.
    fn is_writable(&self) -> bool {
        true
    }
}

impl ZipStore for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

impl ZipStore for Cursor<Vec<u8>> {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len).map_err(io::Error::other)?;
        self.get_mut().resize(len, 0);
        Ok(())
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }
}

impl<T: ZipStore + ?Sized> ZipStore for &mut T {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        (**self).truncate(len)
    }

    fn size(&mut self) -> io::Result<u64> {
        (**self).size()
    }

    fn is_writable(&self) -> bool {
        (**self).is_writable()
    }
}

/// Adapter exposing any `Read + Seek` source as a store that rejects writes.
///
/// ```
/// use std::io::Cursor;
/// use zipio::{OpenMode, ReadOnlyStore, ZipArchive};
///
/// let bytes: &[u8] = &[0x50, 0x4b, 0x05, 0x06, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
/// let archive = ZipArchive::open(ReadOnlyStore::new(Cursor::new(bytes)), OpenMode::Unzip).unwrap();
/// assert_eq!(archive.entries_count(), 0);
/// ```
#[derive(Debug)]
pub struct ReadOnlyStore<R> {
    inner: R,
}

impl<R: Read + Seek> ReadOnlyStore<R> {
    pub fn new(inner: R) -> Self {
        ReadOnlyStore { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

fn read_only() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "store is read-only")
}

impl<R: Read> Read for ReadOnlyStore<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Seek> Seek for ReadOnlyStore<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl<R> Write for ReadOnlyStore<R> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(read_only())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<R: Read + Seek> ZipStore for ReadOnlyStore<R> {
    fn truncate(&mut self, _len: u64) -> io::Result<()> {
        Err(read_only())
    }

    fn is_writable(&self) -> bool {
        false
    }
}
