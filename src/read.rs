//! Locating and parsing the central directory of an existing archive.

use std::io::{self, Read, Seek, SeekFrom};

use crate::codec::{FileNameCodec, decode_with_flag};
use crate::compression::CompressionMethod;
use crate::extra_fields::{ExtraFieldIter, UsedExtraField, Zip64ExtendedInformation};
use crate::result::{ZipError, ZipResult, invalid, unsupported_zip_error};
use crate::spec::{self, Block, EndRecord, Zip64EndBlock, Zip64LocatorBlock};
use crate::types::{DateTime, System, ZipCentralEntryBlock, ZipFileData, ZipLocalEntryBlock, flags};

/// Where the central directory lives and how big it is.
#[derive(Debug)]
pub(crate) struct CentralDirectoryInfo {
    /// Bytes in front of the archive, added to every recorded offset.
    pub(crate) archive_offset: u64,
    /// Absolute position of the first central directory record.
    pub(crate) directory_start: u64,
    pub(crate) directory_size: u64,
    pub(crate) number_of_files: usize,
    pub(crate) comment: Box<[u8]>,
    pub(crate) is_zip64: bool,
}

/// Text codecs used while decoding the central directory.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct Codecs {
    pub(crate) file_name: FileNameCodec,
    pub(crate) comment: FileNameCodec,
}

pub(crate) fn find_central_directory<R: Read + Seek>(
    reader: &mut R,
) -> ZipResult<CentralDirectoryInfo> {
    let (footer, cde_start_pos) = EndRecord::find(reader)?;
    log::debug!("end of central directory record at {cde_start_pos}");

    let (disk, directory_disk) = (footer.block.disk_number, footer.block.directory_disk);
    if disk != directory_disk {
        return unsupported_zip_error("Support for multi-disk files is not implemented");
    }

    let info = match get_directory_info_zip64(reader, cde_start_pos)? {
        Some(info64) => info64,
        None => {
            if footer.needs_zip64() {
                log::debug!("saturated end record without a zip64 locator; using 32-bit values");
            }
            get_directory_info_zip32(reader, &footer, cde_start_pos)?
        }
    };
    if info.archive_offset > 0 {
        log::warn!(
            "{} bytes of data precede the archive; offsets are shifted",
            info.archive_offset
        );
    }
    Ok(CentralDirectoryInfo {
        comment: footer.comment,
        ..info
    })
}

fn get_directory_info_zip32<R: Read + Seek>(
    reader: &mut R,
    footer: &EndRecord,
    cde_start_pos: u64,
) -> ZipResult<CentralDirectoryInfo> {
    let directory_size = u64::from(footer.block.directory_size);
    let directory_offset = u64::from(footer.block.directory_offset);
    let entries_on_disk = footer.block.entries_on_disk;
    // Some zip files have data prepended to them, resulting in the offsets all being too
    // small. Get the amount of error by comparing the actual file position we found the CDE
    // at with the offset recorded in the CDE.
    let offset = cde_start_pos
        .checked_sub(directory_size)
        .and_then(|x| x.checked_sub(directory_offset))
        .ok_or(ZipError::InvalidArchive(
            "Invalid central directory size or offset".into(),
        ))?;
    let archive_offset = detect_archive_offset(
        reader,
        offset,
        directory_offset,
        entries_on_disk > 0,
    )?;

    Ok(CentralDirectoryInfo {
        archive_offset,
        directory_start: directory_offset + archive_offset,
        directory_size,
        number_of_files: usize::from(entries_on_disk),
        comment: Box::default(),
        is_zip64: false,
    })
}

/// Reads the zip64 locator and end record if the 32-bit end record is preceded by one.
fn get_directory_info_zip64<R: Read + Seek>(
    reader: &mut R,
    cde_start_pos: u64,
) -> ZipResult<Option<CentralDirectoryInfo>> {
    // The ZIP64 locator if present will have its signature 20 bytes in front of the standard
    // footer.
    let Some(locator_pos) = cde_start_pos.checked_sub(Zip64LocatorBlock::SIZE as u64) else {
        return Ok(None);
    };
    reader.seek(SeekFrom::Start(locator_pos))?;
    let Ok(locator64) = Zip64LocatorBlock::parse(reader) else {
        return Ok(None);
    };
    let end_offset = locator64.end_offset;
    if locator64.disk_count > 1 {
        return unsupported_zip_error("Support for multi-disk files is not implemented");
    }

    // The zip64 end record normally sits right in front of the locator; finding it there tells
    // us how much data was prepended. Failing that, trust the recorded offset.
    let candidates = [
        locator_pos.checked_sub(Zip64EndBlock::SIZE as u64),
        Some(end_offset),
    ];
    for footer_pos in candidates.into_iter().flatten() {
        reader.seek(SeekFrom::Start(footer_pos))?;
        let Ok(footer64) = Zip64EndBlock::parse(reader) else {
            continue;
        };
        let Some(offset) = footer_pos.checked_sub(end_offset) else {
            continue;
        };
        let Zip64EndBlock {
            disk_number,
            directory_disk,
            entries_on_disk,
            entries,
            directory_size,
            directory_offset,
            ..
        } = footer64;
        if disk_number != directory_disk {
            return unsupported_zip_error("Support for multi-disk files is not implemented");
        }
        if entries_on_disk > entries {
            invalid!("ZIP64 footer indicates more files on this disk than in the whole archive");
        }
        let directory_end = directory_offset.checked_add(directory_size).ok_or(
            ZipError::InvalidArchive("Invalid central directory size or offset".into()),
        )?;
        if directory_end > end_offset {
            invalid!("Central directory overlaps the ZIP64 end record");
        }
        let archive_offset =
            detect_archive_offset(reader, offset, directory_offset, entries_on_disk > 0)?;
        let number_of_files = usize::try_from(entries_on_disk)
            .map_err(|_| ZipError::InvalidArchive("Too many entries".into()))?;
        log::debug!("zip64 end record at {footer_pos}");
        return Ok(Some(CentralDirectoryInfo {
            archive_offset,
            directory_start: directory_offset + archive_offset,
            directory_size,
            number_of_files,
            comment: Box::default(),
            is_zip64: true,
        }));
    }
    invalid!("ZIP64 locator points to a missing end record")
}

/// Check whether the archive offset makes sense by peeking at the directory start. If it
/// doesn't, fall back to using no archive offset. This supports zips with the central
/// directory entries somewhere other than directly preceding the end of central directory.
fn detect_archive_offset<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    directory_offset: u64,
    has_files: bool,
) -> ZipResult<u64> {
    if offset == 0 || !has_files {
        return Ok(offset);
    }
    let Some(start) = offset.checked_add(directory_offset) else {
        return Ok(0);
    };
    reader.seek(SeekFrom::Start(start))?;
    let mut buf = [0; 4];
    match reader.read_exact(&mut buf) {
        Ok(()) if spec::Magic::from_le_bytes(buf) == spec::CENTRAL_DIRECTORY_HEADER_SIGNATURE => {
            Ok(offset)
        }
        Ok(()) => Ok(0),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Read every record of the central directory, in stored order.
pub(crate) fn read_central_directory<R: Read + Seek>(
    reader: &mut R,
    info: &CentralDirectoryInfo,
    codecs: Codecs,
) -> ZipResult<Vec<ZipFileData>> {
    let min_record = ZipCentralEntryBlock::SIZE as u64;
    if (info.number_of_files as u64).saturating_mul(min_record) > info.directory_size {
        invalid!(
            "Central directory of {} bytes cannot hold {} entries",
            info.directory_size,
            info.number_of_files
        );
    }
    reader.seek(SeekFrom::Start(info.directory_start))?;
    let mut files = Vec::with_capacity(info.number_of_files);
    for _ in 0..info.number_of_files {
        files.push(central_header_to_zip_file(reader, info.archive_offset, codecs)?);
    }
    Ok(files)
}

fn read_variable_length_byte_field<R: Read>(reader: &mut R, len: usize) -> io::Result<Box<[u8]>> {
    let mut data = vec![0; len].into_boxed_slice();
    reader.read_exact(&mut data)?;
    Ok(data)
}

/// Parse a central directory entry to collect the information for the file.
pub(crate) fn central_header_to_zip_file<R: Read>(
    reader: &mut R,
    archive_offset: u64,
    codecs: Codecs,
) -> ZipResult<ZipFileData> {
    let ZipCentralEntryBlock {
        // magic,
        version_made_by,
        version_to_extract,
        flags,
        compression_method,
        last_mod_time,
        last_mod_date,
        crc32,
        compressed_size,
        uncompressed_size,
        file_name_length,
        extra_field_length,
        file_comment_length,
        disk_number,
        internal_file_attributes,
        external_file_attributes,
        offset,
        ..
    } = ZipCentralEntryBlock::parse(reader)?;

    let is_utf8 = flags & flags::UTF8 != 0;
    let file_name_raw = read_variable_length_byte_field(reader, file_name_length as usize)?;
    let extra_field = read_variable_length_byte_field(reader, extra_field_length as usize)?;
    let file_comment_raw = read_variable_length_byte_field(reader, file_comment_length as usize)?;

    let mut result = ZipFileData {
        system: System::from((version_made_by >> 8) as u8),
        /* NB: this strips the top 8 bits! */
        version_made_by: version_made_by as u8,
        version_needed: version_to_extract,
        flags,
        compression_method: CompressionMethod::parse_from_u16(compression_method),
        last_modified_time: DateTime::from_msdos(last_mod_date, last_mod_time),
        crc32,
        compressed_size: compressed_size.into(),
        uncompressed_size: uncompressed_size.into(),
        file_name: decode_with_flag(codecs.file_name, &file_name_raw, is_utf8).into(),
        file_name_raw,
        extra_field,
        local_extra_field: Box::default(),
        file_comment: decode_with_flag(codecs.comment, &file_comment_raw, is_utf8).into(),
        file_comment_raw,
        header_start: offset.into(),
        disk_number_start: disk_number.into(),
        internal_attributes: internal_file_attributes,
        external_attributes: external_file_attributes,
        large_file: false,
    };
    parse_extra_field(&mut result)?;

    // Offsets are kept relative to the archive start; make sure the absolute one exists.
    if result.header_start.checked_add(archive_offset).is_none() {
        invalid!("Archive header is too large");
    }

    Ok(result)
}

/// Fold a zip64 extended information block into the entry's saturated fields.
pub(crate) fn parse_extra_field(file: &mut ZipFileData) -> ZipResult<()> {
    let zip64 = ExtraFieldIter::new(&file.extra_field)
        .filter_map(Result::ok)
        .find(|(kind, _)| *kind == UsedExtraField::Zip64ExtendedInfo as u16)
        .map(|(_, data)| data);
    let Some(data) = zip64 else {
        return Ok(());
    };
    let all = data.len() >= 24;
    let block = Zip64ExtendedInformation::parse(
        data,
        all || file.uncompressed_size == spec::ZIP64_BYTES_THR,
        all || file.compressed_size == spec::ZIP64_BYTES_THR,
        all || file.header_start == spec::ZIP64_BYTES_THR,
        data.len() >= 28 || file.disk_number_start == u32::from(u16::MAX),
    )?;
    file.large_file = true;
    if let Some(size) = block.uncompressed_size {
        file.uncompressed_size = size;
    }
    if let Some(size) = block.compressed_size {
        file.compressed_size = size;
    }
    if let Some(start) = block.header_start {
        file.header_start = start;
    }
    if let Some(disk) = block.disk_start {
        file.disk_number_start = disk;
    }
    Ok(())
}

/// Absolute position of the entry's data, read from its local header.
pub(crate) fn find_data_start(
    data: &ZipFileData,
    archive_offset: u64,
    reader: &mut (impl Read + Seek),
) -> ZipResult<u64> {
    let header_start = data.header_start + archive_offset;
    // Go to start of data.
    reader.seek(SeekFrom::Start(header_start))?;

    // Parse static-sized fields and check the magic value.
    let block = ZipLocalEntryBlock::parse(reader)?;

    // Calculate the end of the local header from the fields we just parsed.
    let variable_fields_len =
        // Each of these fields must be converted to u64 before adding, as the result may
        // easily overflow a u16.
        block.file_name_length as u64 + block.extra_field_length as u64;
    Ok(header_start + ZipLocalEntryBlock::SIZE as u64 + variable_fields_len)
}
