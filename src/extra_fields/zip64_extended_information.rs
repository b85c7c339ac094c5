//! 4.5.3 -Zip64 Extended Information Extra Field (0x0001)
//!
//! | Value                  | Size    | Description                                  |
//! | ---------------------- | ------- | -------------------------------------------- |
//! | `0x0001`               | 2 bytes | Tag for this "extra" block type              |
//! | Size                   | 2 bytes | Size of this "extra" block                   |
//! | Original Size          | 8 bytes | Original uncompressed file size              |
//! | Compressed Size        | 8 bytes | Size of compressed data                      |
//! | Relative Header Offset | 8 bytes | Offset of local header record                |
//! | Disk Start Number      | 4 bytes | Number of the disk on which this file starts |
//!
//! Each value is only present when the matching header field is saturated, in the order above.

use core::mem;

use super::UsedExtraField;
use crate::result::{ZipError, ZipResult};
use crate::spec::ZIP64_BYTES_THR;

/// Zip64 extended information extra field
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Zip64ExtendedInformation {
    pub(crate) uncompressed_size: Option<u64>,
    pub(crate) compressed_size: Option<u64>,
    pub(crate) header_start: Option<u64>,
    pub(crate) disk_start: Option<u32>,
}

impl Zip64ExtendedInformation {
    const MAGIC: UsedExtraField = UsedExtraField::Zip64ExtendedInfo;

    /// The local header MUST include BOTH original and compressed file size fields.
    pub(crate) fn local_header(uncompressed_size: u64, compressed_size: u64) -> Self {
        Self {
            uncompressed_size: Some(uncompressed_size),
            compressed_size: Some(compressed_size),
            ..Self::default()
        }
    }

    /// Block for a central directory record, or `None` if every value fits in 32 bits and
    /// `force` is off.
    pub(crate) fn central_header(
        uncompressed_size: u64,
        compressed_size: u64,
        header_start: u64,
        force: bool,
    ) -> Option<Self> {
        let pick = |value: u64| (force || value >= ZIP64_BYTES_THR).then_some(value);
        let block = Self {
            uncompressed_size: pick(uncompressed_size),
            compressed_size: pick(compressed_size),
            header_start: pick(header_start),
            disk_start: None,
        };
        if block == Self::default() {
            // no info added
            None
        } else {
            Some(block)
        }
    }

    /// Reads the values flagged as saturated in the owning header out of the block's data.
    pub(crate) fn parse(
        data: &[u8],
        uncompressed_size: bool,
        compressed_size: bool,
        header_start: bool,
        disk_start: bool,
    ) -> ZipResult<Self> {
        let mut remaining = data;
        let mut take_u64 = |wanted: bool| -> ZipResult<Option<u64>> {
            if !wanted {
                return Ok(None);
            }
            let Some((value, rest)) = remaining.split_first_chunk::<8>() else {
                return Err(ZipError::InvalidArchive(
                    "ZIP64 extra-data field is the wrong length".into(),
                ));
            };
            remaining = rest;
            Ok(Some(u64::from_le_bytes(*value)))
        };
        let uncompressed_size = take_u64(uncompressed_size)?;
        let compressed_size = take_u64(compressed_size)?;
        let header_start = take_u64(header_start)?;
        let disk_start = if disk_start {
            match remaining.split_first_chunk::<4>() {
                Some((value, _)) => Some(u32::from_le_bytes(*value)),
                None => {
                    return Err(ZipError::InvalidArchive(
                        "ZIP64 extra-data field is the wrong length".into(),
                    ));
                }
            }
        } else {
            None
        };
        Ok(Self {
            uncompressed_size,
            compressed_size,
            header_start,
            disk_start,
        })
    }

    fn data_size(&self) -> usize {
        [
            self.uncompressed_size,
            self.compressed_size,
            self.header_start,
        ]
        .iter()
        .flatten()
        .count()
            * mem::size_of::<u64>()
            + self.disk_start.map_or(0, |_| mem::size_of::<u32>())
    }

    /// Get the full size of the block
    pub(crate) fn full_size(&self) -> usize {
        self.data_size() + mem::size_of::<UsedExtraField>() + mem::size_of::<u16>()
    }

    /// Serialize the block
    pub(crate) fn serialize(&self) -> Box<[u8]> {
        let full_size = self.full_size();
        let mut ret = Vec::with_capacity(full_size);
        ret.extend(Self::MAGIC.to_le_bytes());
        ret.extend((self.data_size() as u16).to_le_bytes());
        for value in [
            self.uncompressed_size,
            self.compressed_size,
            self.header_start,
        ]
        .into_iter()
        .flatten()
        {
            ret.extend(value.to_le_bytes());
        }
        if let Some(disk_start) = self.disk_start {
            ret.extend(disk_start.to_le_bytes());
        }
        debug_assert_eq!(ret.len(), full_size);

        ret.into_boxed_slice()
    }
}
