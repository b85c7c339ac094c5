//! Fixed-size records of the zip container and the search for the end of central directory.

use crate::result::{ZipError, ZipResult};
use memchr::memmem::FinderRev;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::mem;

pub type Magic = u32;

pub const LOCAL_FILE_HEADER_SIGNATURE: Magic = 0x04034b50;
pub const CENTRAL_DIRECTORY_HEADER_SIGNATURE: Magic = 0x02014b50;
pub const DATA_DESCRIPTOR_SIGNATURE: Magic = 0x08074b50;
pub(crate) const CENTRAL_DIRECTORY_END_SIGNATURE: Magic = 0x06054b50;
pub const ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE: Magic = 0x06064b50;
pub(crate) const ZIP64_CENTRAL_DIRECTORY_END_LOCATOR_SIGNATURE: Magic = 0x07064b50;

pub const ZIP64_BYTES_THR: u64 = u32::MAX as u64;
pub const ZIP64_ENTRY_THR: usize = u16::MAX as usize;

/// Largest comment the end of central directory record can announce.
const MAX_COMMENT_LEN: u64 = u16::MAX as u64;

/// Integer that a block stores little-endian.
pub(crate) trait LeInt: Copy {
    fn take(bytes: &mut &[u8]) -> Self;
    fn put(self, out: &mut Vec<u8>);
}

macro_rules! le_int {
    ($($ty:ty),+) => {$(
        impl LeInt for $ty {
            fn take(bytes: &mut &[u8]) -> Self {
                let (head, rest) = bytes.split_at(mem::size_of::<$ty>());
                *bytes = rest;
                let mut raw = [0u8; mem::size_of::<$ty>()];
                raw.copy_from_slice(head);
                <$ty>::from_le_bytes(raw)
            }

            fn put(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    )+};
}
le_int!(u16, u32, u64);

/// A record with a fixed layout that starts with a signature.
///
/// Implementors are declared with [`le_block!`], which keeps the struct `#[repr(packed)]` so that
/// `size_of` is the on-disk size.
pub(crate) trait Block: Sized + Copy {
    const MAGIC: Magic;
    /// Record name used in error messages.
    const WHAT: &'static str;
    const SIZE: usize = mem::size_of::<Self>();

    fn magic(&self) -> Magic;

    /// Decode from exactly `SIZE` bytes.
    fn decode(bytes: &[u8]) -> Self;

    fn encode(&self, out: &mut Vec<u8>);

    fn parse<R: Read>(reader: &mut R) -> ZipResult<Self> {
        let mut raw = vec![0u8; Self::SIZE];
        reader.read_exact(&mut raw)?;
        let block = Self::decode(&raw);
        if block.magic() != Self::MAGIC {
            return Err(ZipError::InvalidArchive(
                format!("Invalid {} signature", Self::WHAT).into(),
            ));
        }
        Ok(block)
    }

    fn write<W: Write>(&self, writer: &mut W) -> ZipResult<()> {
        let mut out = Vec::with_capacity(Self::SIZE);
        self.encode(&mut out);
        writer.write_all(&out)?;
        Ok(())
    }
}

/// Declare a packed record whose first field is its signature, together with its [`Block`]
/// implementation. Field order is the on-disk order.
macro_rules! le_block {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident = $magic:expr, $what:literal {
            $($field:ident: $ty:ty,)+
        }
    ) => {
        $(#[$attr])*
        #[derive(Copy, Clone, Debug)]
        #[repr(packed)]
        $vis struct $name {
            pub magic: $crate::spec::Magic,
            $(pub $field: $ty,)+
        }

        impl $crate::spec::Block for $name {
            const MAGIC: $crate::spec::Magic = $magic;
            const WHAT: &'static str = $what;

            fn magic(&self) -> $crate::spec::Magic {
                self.magic
            }

            fn decode(mut bytes: &[u8]) -> Self {
                use $crate::spec::LeInt;
                assert_eq!(bytes.len(), <Self as $crate::spec::Block>::SIZE);
                Self {
                    magic: LeInt::take(&mut bytes),
                    $($field: LeInt::take(&mut bytes),)+
                }
            }

            fn encode(&self, out: &mut Vec<u8>) {
                use $crate::spec::LeInt;
                LeInt::put({ self.magic }, out);
                $(LeInt::put({ self.$field }, out);)+
            }
        }
    };
}
pub(crate) use le_block;

le_block! {
    pub(crate) struct EndRecordBlock = CENTRAL_DIRECTORY_END_SIGNATURE, "end of central directory" {
        disk_number: u16,
        directory_disk: u16,
        entries_on_disk: u16,
        entries: u16,
        directory_size: u32,
        directory_offset: u32,
        comment_len: u16,
    }
}

le_block! {
    pub(crate) struct Zip64LocatorBlock = ZIP64_CENTRAL_DIRECTORY_END_LOCATOR_SIGNATURE, "zip64 locator" {
        directory_disk: u32,
        end_offset: u64,
        disk_count: u32,
    }
}

impl Zip64LocatorBlock {
    pub fn new(end_offset: u64) -> Self {
        Self {
            magic: Self::MAGIC,
            directory_disk: 0,
            end_offset,
            disk_count: 1,
        }
    }
}

le_block! {
    pub(crate) struct Zip64EndBlock = ZIP64_CENTRAL_DIRECTORY_END_SIGNATURE, "zip64 end of central directory" {
        record_size: u64,
        version_made_by: u16,
        version_needed: u16,
        disk_number: u32,
        directory_disk: u32,
        entries_on_disk: u64,
        entries: u64,
        directory_size: u64,
        directory_offset: u64,
    }
}

impl Zip64EndBlock {
    /// `record_size` counts neither the signature nor itself.
    const RECORD_SIZE: u64 = (Self::SIZE - 12) as u64;

    pub fn new(version: u16, entries: u64, directory_size: u64, directory_offset: u64) -> Self {
        Self {
            magic: Self::MAGIC,
            record_size: Self::RECORD_SIZE,
            version_made_by: version,
            version_needed: version,
            disk_number: 0,
            directory_disk: 0,
            entries_on_disk: entries,
            entries,
            directory_size,
            directory_offset,
        }
    }
}

/// The 32-bit end of central directory record with its trailing archive comment.
#[derive(Debug)]
pub(crate) struct EndRecord {
    pub block: EndRecordBlock,
    pub comment: Box<[u8]>,
}

impl EndRecord {
    /// Build a single-disk record; values that don't fit are saturated.
    pub fn new(
        entries: usize,
        directory_size: u64,
        directory_offset: u64,
        comment: &[u8],
    ) -> ZipResult<Self> {
        let comment_len = u16::try_from(comment.len())
            .map_err(|_| ZipError::InvalidArchive("Archive comment is too long".into()))?;
        let entries = entries.min(ZIP64_ENTRY_THR) as u16;
        Ok(Self {
            block: EndRecordBlock {
                magic: EndRecordBlock::MAGIC,
                disk_number: 0,
                directory_disk: 0,
                entries_on_disk: entries,
                entries,
                directory_size: directory_size.min(ZIP64_BYTES_THR) as u32,
                directory_offset: directory_offset.min(ZIP64_BYTES_THR) as u32,
                comment_len,
            },
            comment: comment.into(),
        })
    }

    pub fn parse<R: Read>(reader: &mut R) -> ZipResult<Self> {
        let block = EndRecordBlock::parse(reader)?;
        let mut comment = vec![0u8; usize::from(block.comment_len)];
        reader.read_exact(&mut comment)?;
        Ok(Self {
            block,
            comment: comment.into_boxed_slice(),
        })
    }

    /// Scan backward from the end of `reader` for the record and return it with its position.
    ///
    /// Only the comment follows the record, so the search stops `MAX_COMMENT_LEN` bytes
    /// before the end. A signature whose announced comment would overrun the store is skipped,
    /// which rejects signatures that merely occur inside a comment.
    pub fn find<R: Read + Seek>(reader: &mut R) -> ZipResult<(Self, u64)> {
        const WINDOW: u64 = 512;
        let block_len = EndRecordBlock::SIZE as u64;

        let store_len = reader.seek(SeekFrom::End(0))?;
        if store_len < block_len {
            return Err(ZipError::InvalidArchive("Invalid zip header".into()));
        }
        let floor = store_len.saturating_sub(block_len + MAX_COMMENT_LEN);
        let signature = EndRecordBlock::MAGIC.to_le_bytes();
        let finder = FinderRev::new(&signature);

        let mut window = [0u8; WINDOW as usize];
        let mut start = store_len.saturating_sub(WINDOW).max(floor);
        loop {
            let len = (store_len - start).min(WINDOW) as usize;
            reader.seek(SeekFrom::Start(start))?;
            reader.read_exact(&mut window[..len])?;

            for hit in finder.rfind_iter(&window[..len]) {
                let pos = start + hit as u64;
                if pos + block_len > store_len {
                    continue;
                }
                reader.seek(SeekFrom::Start(pos))?;
                let Ok(block) = EndRecordBlock::parse(reader) else {
                    continue;
                };
                if pos + block_len + u64::from(block.comment_len) > store_len {
                    continue;
                }
                reader.seek(SeekFrom::Start(pos))?;
                return Ok((Self::parse(reader)?, pos));
            }
            if start == floor {
                break;
            }
            // windows overlap by the signature length minus one
            start = start
                .saturating_sub(WINDOW - signature.len() as u64 + 1)
                .max(floor);
        }
        Err(ZipError::InvalidArchive(
            "Could not find central directory end".into(),
        ))
    }

    /// Whether any field is saturated, meaning the real value lives in the zip64 record.
    pub fn needs_zip64(&self) -> bool {
        let b = &self.block;
        let (entries, on_disk) = (b.entries, b.entries_on_disk);
        let (size, offset) = (b.directory_size, b.directory_offset);
        entries == u16::MAX
            || on_disk == u16::MAX
            || u64::from(size) == ZIP64_BYTES_THR
            || u64::from(offset) == ZIP64_BYTES_THR
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> ZipResult<()> {
        self.block.write(writer)?;
        writer.write_all(&self.comment)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    le_block! {
        #[derive(PartialEq, Eq)]
        struct TestBlock = 0x01111, "test" {
            file_name_length: u16,
        }
    }

    #[test]
    fn block_serde() {
        let block = TestBlock {
            magic: 0x01111,
            file_name_length: 3,
        };
        let mut c = Cursor::new(Vec::new());
        block.write(&mut c).unwrap();
        assert_eq!(c.get_ref(), &[0x11, 0x10, 0, 0, 3, 0]);
        c.set_position(0);
        assert_eq!(TestBlock::parse(&mut c).unwrap(), block);
    }

    #[test]
    fn wrong_signature_names_the_record() {
        let err = EndRecordBlock::parse(&mut Cursor::new(vec![0u8; 22])).unwrap_err();
        match err {
            ZipError::InvalidArchive(msg) => assert!(msg.contains("end of central directory")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn block_sizes() {
        assert_eq!(EndRecordBlock::SIZE, 22);
        assert_eq!(Zip64LocatorBlock::SIZE, 20);
        assert_eq!(Zip64EndBlock::SIZE, 56);
    }

    fn end_record(comment: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        EndRecord::new(0, 0, 0, comment)
            .unwrap()
            .write(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn finds_end_record_behind_comment() {
        let mut data = vec![0u8; 1000];
        let record_pos = data.len() as u64;
        data.extend(end_record(&[b'x'; 700]));
        let (end, pos) = EndRecord::find(&mut Cursor::new(data)).unwrap();
        assert_eq!(pos, record_pos);
        assert_eq!(end.comment.len(), 700);
    }

    #[test]
    fn signature_straddling_windows() {
        // record starts 2 bytes before the last 512-byte window
        let comment = vec![b'c'; 512 - 22 + 2];
        let mut data = vec![0u8; 300];
        data.extend(end_record(&comment));
        let (end, pos) = EndRecord::find(&mut Cursor::new(data)).unwrap();
        assert_eq!(pos, 300);
        assert_eq!(end.comment.len(), comment.len());
    }

    #[test]
    fn ignores_signature_inside_comment() {
        // a fake record in the comment whose own comment would overrun the store
        let mut fake = end_record(b"");
        fake[20] = 0xff;
        fake[21] = 0x00;
        let data = end_record(&fake);
        let (end, pos) = EndRecord::find(&mut Cursor::new(data)).unwrap();
        assert_eq!(pos, 0);
        assert_eq!(&*end.comment, &fake[..]);
    }

    #[test]
    fn missing_end_record() {
        for data in [vec![0u8; 100], vec![0u8; 3]] {
            let err = EndRecord::find(&mut Cursor::new(data)).unwrap_err();
            assert!(matches!(err, ZipError::InvalidArchive(_)));
        }
    }

    #[test]
    fn saturated_values() {
        let end = EndRecord::new(70_000, 10, 5_000_000_000, b"").unwrap();
        assert!(end.needs_zip64());
        assert_eq!({ end.block.entries }, u16::MAX);
        assert!(!EndRecord::new(3, 10, 20, b"").unwrap().needs_zip64());
        assert!(EndRecord::new(0, 0, 0, &[0u8; 70_000]).is_err());
    }

    #[test]
    fn zip64_end_record_layout() {
        let mut out = Vec::new();
        Zip64EndBlock::new(45, 3, 100, 5_000_000_000)
            .write(&mut out)
            .unwrap();
        assert_eq!(out.len(), 56);
        assert_eq!(&out[4..12], &44u64.to_le_bytes());
        let parsed = Zip64EndBlock::parse(&mut Cursor::new(out)).unwrap();
        assert_eq!({ parsed.directory_offset }, 5_000_000_000);
        assert_eq!({ parsed.entries }, 3);
    }
}
