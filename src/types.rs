//! Types that specify what is contained in a ZIP.
use crate::compression::CompressionMethod;
use crate::result::{DateTimeRangeError, ZipError, ZipResult};
use crate::spec::{self, le_block};

#[cfg(feature = "time")]
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, error::ComponentRange};

pub(crate) mod ffi {
    pub const S_IFDIR: u32 = 0o0040000;
    pub const S_IFREG: u32 = 0o0100000;
}

/// General purpose bit flags.
pub(crate) mod flags {
    pub const ENCRYPTED: u16 = 1 << 0;
    pub const DATA_DESCRIPTOR: u16 = 1 << 3;
    pub const UTF8: u16 = 1 << 11;
}

/// Version needed to extract: plain stored entries.
pub(crate) const VERSION_STORED: u16 = 10;
/// Version needed to extract: deflate or traditional encryption.
pub(crate) const VERSION_DEFLATE: u16 = 20;
/// Version needed to extract: zip64 extensions.
pub(crate) const VERSION_ZIP64: u16 = 45;

/// Host system that produced an entry, from the high byte of "version made by".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum System {
    Dos,
    Unix,
    Unknown(u8),
}

impl From<u8> for System {
    fn from(system: u8) -> Self {
        match system {
            0 => System::Dos,
            3 => System::Unix,
            other => System::Unknown(other),
        }
    }
}

impl From<System> for u8 {
    fn from(system: System) -> Self {
        match system {
            System::Dos => 0,
            System::Unix => 3,
            System::Unknown(other) => other,
        }
    }
}

impl System {
    /// The system entries written on this platform claim.
    pub(crate) const fn native() -> Self {
        if cfg!(windows) { System::Dos } else { System::Unix }
    }
}

/// Modification time as MS-DOS stores it: local time from 1980 through 2107, with seconds
/// rounded down to an even number.
///
/// Set with [`crate::NewFileInfo::with_date_time`], read back from
/// [`crate::FileInfo64::date_time`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateTime {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

/// Base year of the MS-DOS calendar.
const DOS_EPOCH: u16 = 1980;
const DOS_LAST_YEAR: u16 = DOS_EPOCH + 127;

/// 1980-01-01 00:00:00, the earliest representable moment.
impl Default for DateTime {
    fn default() -> DateTime {
        DateTime {
            year: DOS_EPOCH,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl DateTime {
    /// Unpack the date and time words of a header. Out-of-range fields are kept as found.
    pub const fn from_msdos(datepart: u16, timepart: u16) -> DateTime {
        DateTime {
            year: DOS_EPOCH + (datepart >> 9),
            month: ((datepart >> 5) & 0x0f) as u8,
            day: (datepart & 0x1f) as u8,
            hour: (timepart >> 11) as u8,
            minute: ((timepart >> 5) & 0x3f) as u8,
            second: ((timepart & 0x1f) * 2) as u8,
        }
    }

    /// Validate and build a timestamp. A leap second (60) is accepted.
    pub fn from_date_and_time(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<DateTime, DateTimeRangeError> {
        let in_range = (DOS_EPOCH..=DOS_LAST_YEAR).contains(&year)
            && (1..=12).contains(&month)
            && (1..=31).contains(&day)
            && hour < 24
            && minute < 60
            && second <= 60;
        if !in_range {
            return Err(DateTimeRangeError);
        }
        Ok(DateTime {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    /// The current UTC time, or the default time if it can't be represented.
    #[cfg(feature = "time")]
    pub fn now() -> DateTime {
        DateTime::try_from(OffsetDateTime::now_utc()).unwrap_or_default()
    }

    /// Without the `time` feature there is no calendar to convert the clock with.
    #[cfg(not(feature = "time"))]
    pub fn now() -> DateTime {
        DateTime::default()
    }

    /// Time word: hours in bits 11-15, minutes in 5-10, seconds / 2 in 0-4.
    pub const fn timepart(&self) -> u16 {
        ((self.hour as u16) << 11) | ((self.minute as u16) << 5) | (self.second as u16 / 2)
    }

    /// Date word: years since 1980 in bits 9-15, month in 5-8, day in 0-4.
    pub const fn datepart(&self) -> u16 {
        ((self.year - DOS_EPOCH) << 9) | ((self.month as u16) << 5) | self.day as u16
    }

    /// Interpret as UTC. Fails for values read from a header that name no real date.
    #[cfg(feature = "time")]
    pub fn to_time(&self) -> Result<OffsetDateTime, ComponentRange> {
        let month = Month::try_from(self.month)?;
        let date = Date::from_calendar_date(i32::from(self.year), month, self.day)?;
        let time = Time::from_hms(self.hour, self.minute, self.second)?;
        Ok(PrimitiveDateTime::new(date, time).assume_utc())
    }

    pub const fn year(&self) -> u16 {
        self.year
    }

    /// 1 through 12 unless read from a damaged header.
    pub const fn month(&self) -> u8 {
        self.month
    }

    pub const fn day(&self) -> u8 {
        self.day
    }

    pub const fn hour(&self) -> u8 {
        self.hour
    }

    pub const fn minute(&self) -> u8 {
        self.minute
    }

    pub const fn second(&self) -> u8 {
        self.second
    }
}

#[cfg(feature = "time")]
impl TryFrom<OffsetDateTime> for DateTime {
    type Error = DateTimeRangeError;

    fn try_from(dt: OffsetDateTime) -> Result<Self, Self::Error> {
        DateTime::from_date_and_time(
            u16::try_from(dt.year())?,
            u8::from(dt.month()),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
        )
    }
}

/// Metadata of one entry, as stored in the central directory.
///
/// Sizes and offsets are always kept at 64 bits; zip64 extra fields are folded in on read and
/// generated on write.
#[derive(Debug, Clone)]
pub(crate) struct ZipFileData {
    /// Compatibility of the file attribute information
    pub system: System,
    /// Zip format version, low byte of "version made by"
    pub version_made_by: u8,
    /// Version needed to extract
    pub version_needed: u16,
    /// General purpose bit flags
    pub flags: u16,
    /// Compression method used to store the file
    pub compression_method: CompressionMethod,
    /// Last modified time. This will only have a 2 second precision.
    pub last_modified_time: DateTime,
    /// CRC32 checksum
    pub crc32: u32,
    /// Size of the file in the ZIP
    pub compressed_size: u64,
    /// Size of the file when extracted
    pub uncompressed_size: u64,
    /// Name of the file, decoded with the archive's codec
    pub file_name: Box<str>,
    /// Raw file name, as stored
    pub file_name_raw: Box<[u8]>,
    /// Central directory extra field, as stored
    pub extra_field: Box<[u8]>,
    /// Local header extra field supplied by the writer, without any zip64 block
    pub local_extra_field: Box<[u8]>,
    /// File comment, decoded with the archive's comment codec
    pub file_comment: Box<str>,
    /// Raw file comment, as stored
    pub file_comment_raw: Box<[u8]>,
    /// Specifies where the local header of the file starts
    pub header_start: u64,
    pub disk_number_start: u32,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    /// Sizes are (or must be) written through zip64 extra fields
    pub large_file: bool,
}

impl ZipFileData {
    pub fn encrypted(&self) -> bool {
        self.flags & flags::ENCRYPTED != 0
    }

    pub fn using_data_descriptor(&self) -> bool {
        self.flags & flags::DATA_DESCRIPTOR != 0
    }

    pub fn info64(&self) -> FileInfo64 {
        FileInfo64 {
            name: self.file_name.to_string(),
            version_created: (u16::from(u8::from(self.system)) << 8)
                | u16::from(self.version_made_by),
            version_needed: self.version_needed,
            flags: self.flags,
            method: self.compression_method.to_u16(),
            date_time: self.last_modified_time,
            crc: self.crc32,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            disk_number_start: self.disk_number_start,
            internal_attr: self.internal_attributes,
            external_attr: self.external_attributes,
            comment: self.file_comment.to_string(),
            extra: self.extra_field.to_vec(),
        }
    }

    pub(crate) fn local_block(&self) -> ZipResult<ZipLocalEntryBlock> {
        let (compressed_size, uncompressed_size) = if self.large_file {
            (spec::ZIP64_BYTES_THR as u32, spec::ZIP64_BYTES_THR as u32)
        } else {
            (
                narrow(self.compressed_size, "Compressed size")?,
                narrow(self.uncompressed_size, "Uncompressed size")?,
            )
        };
        let mut extra_field_length = self.local_extra_field.len();
        if self.large_file {
            extra_field_length += 20;
        }
        let extra_field_length = u16::try_from(extra_field_length)
            .map_err(|_| ZipError::InvalidArchive("Extra data field is too large".into()))?;
        Ok(ZipLocalEntryBlock {
            magic: spec::LOCAL_FILE_HEADER_SIGNATURE,
            version_made_by: self.version_needed,
            flags: self.flags,
            compression_method: self.compression_method.to_u16(),
            last_mod_time: self.last_modified_time.timepart(),
            last_mod_date: self.last_modified_time.datepart(),
            crc32: self.crc32,
            compressed_size,
            uncompressed_size,
            file_name_length: u16::try_from(self.file_name_raw.len())
                .map_err(|_| ZipError::InvalidArchive("File name is too long".into()))?,
            extra_field_length,
        })
    }

    pub(crate) fn block(&self, extra_field_length: u16) -> ZipResult<ZipCentralEntryBlock> {
        let saturate = |value: u64, forced: bool| -> u32 {
            if forced || value >= spec::ZIP64_BYTES_THR {
                spec::ZIP64_BYTES_THR as u32
            } else {
                value as u32
            }
        };
        Ok(ZipCentralEntryBlock {
            magic: spec::CENTRAL_DIRECTORY_HEADER_SIGNATURE,
            version_made_by: (u16::from(u8::from(self.system)) << 8)
                | u16::from(self.version_made_by),
            version_to_extract: self.version_needed,
            flags: self.flags,
            compression_method: self.compression_method.to_u16(),
            last_mod_time: self.last_modified_time.timepart(),
            last_mod_date: self.last_modified_time.datepart(),
            crc32: self.crc32,
            compressed_size: saturate(self.compressed_size, self.large_file),
            uncompressed_size: saturate(self.uncompressed_size, self.large_file),
            file_name_length: u16::try_from(self.file_name_raw.len())
                .map_err(|_| ZipError::InvalidArchive("File name is too long".into()))?,
            extra_field_length,
            file_comment_length: u16::try_from(self.file_comment_raw.len())
                .map_err(|_| ZipError::InvalidArchive("File comment is too long".into()))?,
            disk_number: 0,
            internal_file_attributes: self.internal_attributes,
            external_file_attributes: self.external_attributes,
            offset: saturate(self.header_start, self.large_file),
        })
    }
}

fn narrow(value: u64, what: &'static str) -> ZipResult<u32> {
    u32::try_from(value)
        .ok()
        .filter(|&v| u64::from(v) < spec::ZIP64_BYTES_THR)
        .ok_or_else(|| ZipError::InvalidArchive(format!("{what} requires zip64").into()))
}

/// Everything the central directory knows about an entry, with 64-bit sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo64 {
    /// Decoded file name.
    pub name: String,
    /// Version made by, including the host system in the high byte.
    pub version_created: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flags.
    pub flags: u16,
    /// Compression method.
    pub method: u16,
    /// Last modification time.
    pub date_time: DateTime,
    /// CRC-32 of the uncompressed data.
    pub crc: u32,
    /// Compressed size, including any encryption header.
    pub compressed_size: u64,
    /// Uncompressed size.
    pub uncompressed_size: u64,
    /// Disk number start.
    pub disk_number_start: u32,
    /// Internal file attributes.
    pub internal_attr: u16,
    /// External file attributes.
    pub external_attr: u32,
    /// Decoded entry comment.
    pub comment: String,
    /// Central directory extra field.
    pub extra: Vec<u8>,
}

impl FileInfo64 {
    /// Whether the entry is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.flags & flags::ENCRYPTED != 0
    }

    /// Whether the entry is a directory, going by the trailing slash of its name.
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/') || self.name.ends_with('\\')
    }

    /// Unix file type and permission bits, if the entry was produced on a Unix-like system.
    pub fn unix_mode(&self) -> Option<u32> {
        let mode = self.external_attr >> 16;
        match System::from((self.version_created >> 8) as u8) {
            System::Unix if mode != 0 => Some(mode),
            _ => None,
        }
    }

    /// The 32-bit view of this entry. Sizes that don't fit saturate at `0xFFFFFFFF`, the same
    /// value the zip format itself stores for them.
    pub fn to_info32(&self) -> FileInfo {
        FileInfo::from(self)
    }
}

/// The 32-bit view of [`FileInfo64`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub version_created: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub date_time: DateTime,
    pub crc: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub disk_number_start: u16,
    pub internal_attr: u16,
    pub external_attr: u32,
    pub comment: String,
    pub extra: Vec<u8>,
}

impl From<&FileInfo64> for FileInfo {
    fn from(info: &FileInfo64) -> Self {
        let saturate = |value: u64| u32::try_from(value).unwrap_or(u32::MAX);
        FileInfo {
            name: info.name.clone(),
            version_created: info.version_created,
            version_needed: info.version_needed,
            flags: info.flags,
            method: info.method,
            date_time: info.date_time,
            crc: info.crc,
            compressed_size: saturate(info.compressed_size),
            uncompressed_size: saturate(info.uncompressed_size),
            disk_number_start: u16::try_from(info.disk_number_start).unwrap_or(u16::MAX),
            internal_attr: info.internal_attr,
            external_attr: info.external_attr,
            comment: info.comment.clone(),
            extra: info.extra.clone(),
        }
    }
}

le_block! {
    pub(crate) struct ZipCentralEntryBlock = spec::CENTRAL_DIRECTORY_HEADER_SIGNATURE, "central directory header" {
        version_made_by: u16,
        version_to_extract: u16,
        flags: u16,
        compression_method: u16,
        last_mod_time: u16,
        last_mod_date: u16,
        crc32: u32,
        compressed_size: u32,
        uncompressed_size: u32,
        file_name_length: u16,
        extra_field_length: u16,
        file_comment_length: u16,
        disk_number: u16,
        internal_file_attributes: u16,
        external_file_attributes: u32,
        offset: u32,
    }
}

le_block! {
    pub(crate) struct ZipLocalEntryBlock = spec::LOCAL_FILE_HEADER_SIGNATURE, "local file header" {
        version_made_by: u16,
        flags: u16,
        compression_method: u16,
        last_mod_time: u16,
        last_mod_date: u16,
        crc32: u32,
        compressed_size: u32,
        uncompressed_size: u32,
        file_name_length: u16,
        extra_field_length: u16,
    }
}

impl ZipLocalEntryBlock {
    /// Offset of the CRC-32 field from the start of the header, for back-patching.
    pub(crate) const CRC32_OFFSET: u64 = 14;
}
