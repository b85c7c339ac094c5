//! Types and helpers for writing entries and the central directory.

use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use crate::compression::{CompressionMethod, DEFAULT_COMPRESSION_LEVEL};
use crate::extra_fields::{UsedExtraField, Zip64ExtendedInformation, strip_field};
use crate::result::{ZipError, ZipResult};
use crate::spec::{self, Block, EndRecord, Zip64EndBlock, Zip64LocatorBlock};
use crate::types::{DateTime, VERSION_ZIP64, ZipFileData, ZipLocalEntryBlock, ffi};

/// Metadata for an entry about to be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewFileInfo {
    /// Name inside the archive. Use `/` as the separator; a trailing `/` marks a directory.
    pub name: String,
    /// Modification time.
    pub date_time: DateTime,
    pub internal_attr: u16,
    pub external_attr: u32,
    pub comment: String,
    /// Extra field written to the local header.
    pub extra_local: Vec<u8>,
    /// Extra field written to the central directory.
    pub extra_global: Vec<u8>,
}

impl NewFileInfo {
    /// Entry named `name`, stamped with the current time and default permissions.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let mode = if name.ends_with('/') {
            ffi::S_IFDIR | 0o755
        } else {
            ffi::S_IFREG | 0o644
        };
        NewFileInfo {
            name,
            date_time: DateTime::now(),
            internal_attr: 0,
            external_attr: 0,
            comment: String::new(),
            extra_local: Vec::new(),
            extra_global: Vec::new(),
        }
        .with_unix_mode(mode)
    }

    /// Entry named `name` carrying the modification time and permissions of the file at `path`.
    pub fn from_path(name: impl Into<String>, path: impl AsRef<Path>) -> io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let mut info = NewFileInfo::new(name);
        #[cfg(feature = "time")]
        {
            let modified = time::OffsetDateTime::from(metadata.modified()?);
            info.date_time = DateTime::try_from(modified).unwrap_or_default();
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            info = info.with_unix_mode(metadata.permissions().mode());
        }
        #[cfg(not(unix))]
        if metadata.permissions().readonly() {
            info.external_attr |= 0x01;
        }
        Ok(info)
    }

    /// Set the unix mode (file type and permission bits) stored in the external attributes.
    ///
    /// The DOS directory and read-only bits are derived from it.
    pub fn with_unix_mode(mut self, mode: u32) -> Self {
        let mut mode = mode & 0o177777;
        if mode & 0o170000 == 0 {
            mode |= if self.name.ends_with('/') {
                ffi::S_IFDIR
            } else {
                ffi::S_IFREG
            };
        }
        let mut dos = 0;
        if mode & 0o170000 == ffi::S_IFDIR {
            dos |= 0x10;
        }
        if mode & 0o222 == 0 {
            dos |= 0x01;
        }
        self.external_attr = (mode << 16) | dos;
        self
    }

    pub fn with_date_time(mut self, date_time: DateTime) -> Self {
        self.date_time = date_time;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// How an entry's data is stored.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FileOptions {
    pub(crate) compression_method: CompressionMethod,
    pub(crate) compression_level: Option<u32>,
    pub(crate) large_file: bool,
}

impl Default for FileOptions {
    /// Deflate at the default level, without forced zip64 fields.
    fn default() -> Self {
        FileOptions {
            compression_method: CompressionMethod::Deflated,
            compression_level: None,
            large_file: false,
        }
    }
}

impl FileOptions {
    /// Set the compression method for the new file
    ///
    /// The default is `CompressionMethod::Deflated`.
    #[must_use]
    pub const fn compression_method(mut self, method: CompressionMethod) -> Self {
        self.compression_method = method;
        self
    }

    /// Set the compression level for the new file
    ///
    /// `None` value specifies default compression level. Range is 0 to 9; ignored for stored
    /// entries.
    #[must_use]
    pub const fn compression_level(mut self, level: Option<u32>) -> Self {
        self.compression_level = level;
        self
    }

    /// Set whether the new file's compressed and uncompressed size is known to be too large
    /// for 32-bit fields. When set, zip64 fields are written for this entry whatever its
    /// final size. Archives opened with zip64 enabled do this for every entry.
    #[must_use]
    pub const fn large_file(mut self, large: bool) -> Self {
        self.large_file = large;
        self
    }

    pub(crate) fn level(&self) -> u32 {
        self.compression_level.unwrap_or(DEFAULT_COMPRESSION_LEVEL)
    }
}

/// Write the local header of `file` at the writer's position, with whatever CRC and sizes
/// `file` holds so far. Returns the number of bytes written.
pub(crate) fn write_local_file_header<T: Write>(
    writer: &mut T,
    file: &ZipFileData,
) -> ZipResult<u64> {
    let block = file.local_block()?;
    block.write(writer)?;
    writer.write_all(&file.file_name_raw)?;
    let mut written = ZipLocalEntryBlock::SIZE + file.file_name_raw.len();
    if file.large_file {
        let zip64 =
            Zip64ExtendedInformation::local_header(file.uncompressed_size, file.compressed_size)
                .serialize();
        writer.write_all(&zip64)?;
        written += zip64.len();
    }
    writer.write_all(&file.local_extra_field)?;
    written += file.local_extra_field.len();
    Ok(written as u64)
}

/// Rewrite CRC and sizes in a local header written by [`write_local_file_header`].
pub(crate) fn update_local_file_header<T: Write + Seek>(
    writer: &mut T,
    file: &ZipFileData,
    header_abs: u64,
) -> ZipResult<()> {
    writer.seek(SeekFrom::Start(header_abs + ZipLocalEntryBlock::CRC32_OFFSET))?;
    writer.write_all(&file.crc32.to_le_bytes())?;
    if file.large_file {
        writer.write_all(&(spec::ZIP64_BYTES_THR as u32).to_le_bytes())?;
        writer.write_all(&(spec::ZIP64_BYTES_THR as u32).to_le_bytes())?;
        // Skip the lengths and the zip64 block's own header.
        let zip64_data = header_abs
            + ZipLocalEntryBlock::SIZE as u64
            + file.file_name_raw.len() as u64
            + 4;
        writer.seek(SeekFrom::Start(zip64_data))?;
        writer.write_all(&file.uncompressed_size.to_le_bytes())?;
        writer.write_all(&file.compressed_size.to_le_bytes())?;
    } else {
        if file.compressed_size >= spec::ZIP64_BYTES_THR
            || file.uncompressed_size >= spec::ZIP64_BYTES_THR
        {
            return Err(ZipError::InvalidArchive(
                "Large file option has not been set".into(),
            ));
        }
        writer.write_all(&(file.compressed_size as u32).to_le_bytes())?;
        writer.write_all(&(file.uncompressed_size as u32).to_le_bytes())?;
    }
    Ok(())
}

/// Write the data descriptor that follows data whose header has flag bit 3 set.
pub(crate) fn write_data_descriptor<T: Write>(writer: &mut T, file: &ZipFileData) -> ZipResult<u64> {
    let mut out = Vec::with_capacity(24);
    out.extend(spec::DATA_DESCRIPTOR_SIGNATURE.to_le_bytes());
    out.extend(file.crc32.to_le_bytes());
    if file.large_file {
        out.extend(file.compressed_size.to_le_bytes());
        out.extend(file.uncompressed_size.to_le_bytes());
    } else {
        out.extend((file.compressed_size as u32).to_le_bytes());
        out.extend((file.uncompressed_size as u32).to_le_bytes());
    }
    writer.write_all(&out)?;
    Ok(out.len() as u64)
}

fn write_central_directory_header<T: Write>(writer: &mut T, file: &ZipFileData) -> ZipResult<()> {
    let zip64 = Zip64ExtendedInformation::central_header(
        file.uncompressed_size,
        file.compressed_size,
        file.header_start,
        file.large_file,
    );
    let mut extra_field = zip64.map(|z| z.serialize().into_vec()).unwrap_or_default();
    extra_field.extend(strip_field(
        &file.extra_field,
        UsedExtraField::Zip64ExtendedInfo,
    ));
    let extra_field_length = u16::try_from(extra_field.len())
        .map_err(|_| ZipError::InvalidArchive("Extra data field is too large".into()))?;

    let block = file.block(extra_field_length)?;
    block.write(writer)?;
    writer.write_all(&file.file_name_raw)?;
    writer.write_all(&extra_field)?;
    writer.write_all(&file.file_comment_raw)?;
    Ok(())
}

/// Write the central directory and end records at `directory_abs`.
///
/// Offsets are recorded relative to `archive_offset`. Returns the absolute end of the archive.
pub(crate) fn write_central_directory<T: Write + Seek>(
    writer: &mut T,
    files: &[ZipFileData],
    comment: &[u8],
    archive_offset: u64,
    directory_abs: u64,
    force_zip64: bool,
) -> ZipResult<u64> {
    writer.seek(SeekFrom::Start(directory_abs))?;
    let mut buffered = io::BufWriter::new(&mut *writer);
    for file in files {
        write_central_directory_header(&mut buffered, file)?;
    }
    buffered.flush()?;
    drop(buffered);
    let directory_end = writer.stream_position()?;

    let central_directory_offset = directory_abs - archive_offset;
    let central_directory_size = directory_end - directory_abs;
    let number_of_files = files.len();
    let is64 = force_zip64
        || number_of_files >= spec::ZIP64_ENTRY_THR
        || central_directory_size >= spec::ZIP64_BYTES_THR
        || central_directory_offset >= spec::ZIP64_BYTES_THR;

    if is64 {
        Zip64EndBlock::new(
            VERSION_ZIP64,
            number_of_files as u64,
            central_directory_size,
            central_directory_offset,
        )
        .write(writer)?;
        Zip64LocatorBlock::new(directory_end - archive_offset).write(writer)?;
    }
    EndRecord::new(
        number_of_files,
        central_directory_size,
        central_directory_offset,
        comment,
    )?
    .write(writer)?;
    Ok(writer.stream_position()?)
}
