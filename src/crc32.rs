//! Helper module to compute a CRC32 checksum

use crc32fast::Hasher;

use crate::result::{ZipError, ZipResult};

/// Running CRC-32 of an entry's uncompressed bytes, optionally checked against a stored value.
#[derive(Clone, Debug)]
pub(crate) struct Crc32Check {
    hasher: Hasher,
    check: Option<u32>,
}

impl Crc32Check {
    /// Accumulate only; used while writing.
    pub(crate) fn new() -> Self {
        Crc32Check {
            hasher: Hasher::new(),
            check: None,
        }
    }

    /// Accumulate and compare with `checksum` once the data is exhausted.
    pub(crate) fn expecting(checksum: u32) -> Self {
        Crc32Check {
            hasher: Hasher::new(),
            check: Some(checksum),
        }
    }

    pub(crate) fn update(&mut self, buf: &[u8]) {
        self.hasher.update(buf);
    }

    pub(crate) fn value(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    pub(crate) fn check_matches(&self) -> ZipResult<()> {
        let actual = self.value();
        match self.check {
            Some(expected) if expected != actual => Err(ZipError::Integrity { expected, actual }),
            _ => Ok(()),
        }
    }
}
