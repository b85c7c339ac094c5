//! Implementation of the ZipCrypto algorithm
//!
//! The following paper was used to implement the ZipCrypto algorithm:
//! [https://courses.cs.ut.ee/MTAT.07.022/2015_fall/uploads/Main/dmitri-report-f15-16.pdf](https://courses.cs.ut.ee/MTAT.07.022/2015_fall/uploads/Main/dmitri-report-f15-16.pdf)
//!
//! Both directions work in place on caller buffers, one byte of key state per byte of data.

use std::fmt::{Debug, Formatter};
use std::num::Wrapping;

use crate::result::{ZipError, ZipResult};

/// Length of the encryption header preceding the encrypted data.
pub(crate) const HEADER_LEN: usize = 12;

const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut k = 0;
        while k < 8 {
            crc = if crc & 1 != 0 {
                0xedb88320 ^ (crc >> 1)
            } else {
                crc >> 1
            };
            k += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// A container to hold the current key state
#[derive(Clone, Copy, Hash, Ord, PartialOrd, Eq, PartialEq)]
pub(crate) struct ZipCryptoKeys {
    key_0: Wrapping<u32>,
    key_1: Wrapping<u32>,
    key_2: Wrapping<u32>,
}

impl Debug for ZipCryptoKeys {
    #[allow(unreachable_code)]
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        #[cfg(not(test))]
        {
            use std::collections::hash_map::DefaultHasher;
            use std::hash::{Hash, Hasher};
            let mut t = DefaultHasher::new();
            self.hash(&mut t);
            return f.write_fmt(format_args!("ZipCryptoKeys(hash {})", t.finish()));
        }
        #[cfg(test)]
        return f.write_fmt(format_args!(
            "ZipCryptoKeys({:#10x},{:#10x},{:#10x})",
            self.key_0, self.key_1, self.key_2
        ));
    }
}

impl ZipCryptoKeys {
    const fn new() -> ZipCryptoKeys {
        ZipCryptoKeys {
            key_0: Wrapping(0x12345678),
            key_1: Wrapping(0x23456789),
            key_2: Wrapping(0x34567890),
        }
    }

    /// Keys after absorbing every byte of `password`.
    pub(crate) fn derive(password: &[u8]) -> ZipCryptoKeys {
        let mut keys = ZipCryptoKeys::new();
        for &byte in password {
            keys.update(byte);
        }
        keys
    }

    fn update(&mut self, input: u8) {
        self.key_0 = ZipCryptoKeys::crc32(self.key_0, input);
        self.key_1 =
            (self.key_1 + (self.key_0 & Wrapping(0xff))) * Wrapping(0x08088405) + Wrapping(1);
        self.key_2 = ZipCryptoKeys::crc32(self.key_2, (self.key_1 >> 24).0 as u8);
    }

    fn stream_byte(&mut self) -> u8 {
        let temp: Wrapping<u16> = Wrapping(self.key_2.0 as u16) | Wrapping(3);
        ((temp * (temp ^ Wrapping(1))) >> 8).0 as u8
    }

    fn decrypt_byte(&mut self, cipher_byte: u8) -> u8 {
        let plain_byte: u8 = self.stream_byte() ^ cipher_byte;
        self.update(plain_byte);
        plain_byte
    }

    fn encrypt_byte(&mut self, plain_byte: u8) -> u8 {
        let cipher_byte: u8 = self.stream_byte() ^ plain_byte;
        self.update(plain_byte);
        cipher_byte
    }

    pub(crate) fn decrypt(&mut self, buf: &mut [u8]) {
        for byte in buf {
            *byte = self.decrypt_byte(*byte);
        }
    }

    pub(crate) fn encrypt(&mut self, buf: &mut [u8]) {
        for byte in buf {
            *byte = self.encrypt_byte(*byte);
        }
    }

    fn crc32(crc: Wrapping<u32>, input: u8) -> Wrapping<u32> {
        (crc >> 8) ^ Wrapping(CRC32_TABLE[((crc & Wrapping(0xff)).0 as u8 ^ input) as usize])
    }
}

/// The bytes the last two decrypted header bytes must equal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ZipCryptoValidator {
    /// High 16 bits of the entry's CRC-32, as PKZIP writes it.
    PkzipCrc32(u32),
    /// The DOS time field, used by Info-ZIP when sizes and CRC trail the data (flag bit 3).
    InfoZipMsdosTime(u16),
}

impl ZipCryptoValidator {
    fn check_bytes(self) -> [u8; 2] {
        match self {
            ZipCryptoValidator::PkzipCrc32(crc32) => [(crc32 >> 16) as u8, (crc32 >> 24) as u8],
            ZipCryptoValidator::InfoZipMsdosTime(time) => [time as u8, (time >> 8) as u8],
        }
    }
}

/// Decrypt and check an encryption header, returning the keys to decrypt the data with.
///
/// The check compares two bytes, so a wrong password slips through only about once in 65536
/// attempts; the CRC-32 validation at the end of the entry catches those.
pub(crate) fn open_header(
    password: &[u8],
    mut header: [u8; HEADER_LEN],
    validator: ZipCryptoValidator,
    filename: &str,
) -> ZipResult<ZipCryptoKeys> {
    let mut keys = ZipCryptoKeys::derive(password);
    keys.decrypt(&mut header);
    if header[HEADER_LEN - 2..] != validator.check_bytes() {
        return Err(ZipError::InvalidPassword {
            filename: filename.into(),
        });
    }
    Ok(keys)
}

/// Build an encrypted header for a new entry, returning it with the keys for the data.
pub(crate) fn seal_header(
    password: &[u8],
    validator: ZipCryptoValidator,
) -> ZipResult<([u8; HEADER_LEN], ZipCryptoKeys)> {
    let mut header = [0u8; HEADER_LEN];
    getrandom::fill(&mut header[..HEADER_LEN - 2])
        .map_err(|e| ZipError::Io(std::io::Error::other(e)))?;
    header[HEADER_LEN - 2..].copy_from_slice(&validator.check_bytes());
    let mut keys = ZipCryptoKeys::derive(password);
    keys.encrypt(&mut header);
    Ok((header, keys))
}
