//! Types for extra fields

mod zip64_extended_information;

pub(crate) use zip64_extended_information::Zip64ExtendedInformation;

use crate::result::{ZipError, ZipResult};

/// Extra field used in this crate
#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum UsedExtraField {
    /// ZIP64 extended information extra field
    Zip64ExtendedInfo = 0x0001,
}

impl UsedExtraField {
    pub(crate) const fn to_le_bytes(self) -> [u8; 2] {
        (self as u16).to_le_bytes()
    }
}

/// Walks the `(header id, data)` records of an extra field.
#[derive(Debug, Clone)]
pub(crate) struct ExtraFieldIter<'a> {
    remaining: &'a [u8],
}

impl<'a> ExtraFieldIter<'a> {
    pub(crate) fn new(extra_field: &'a [u8]) -> Self {
        Self {
            remaining: extra_field,
        }
    }
}

impl<'a> Iterator for ExtraFieldIter<'a> {
    type Item = ZipResult<(u16, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        if self.remaining.len() < 4 {
            self.remaining = &[];
            return Some(Err(ZipError::InvalidArchive(
                "Truncated extra field header".into(),
            )));
        }
        let kind = u16::from_le_bytes([self.remaining[0], self.remaining[1]]);
        let len = u16::from_le_bytes([self.remaining[2], self.remaining[3]]) as usize;
        let rest = &self.remaining[4..];
        if rest.len() < len {
            self.remaining = &[];
            return Some(Err(ZipError::InvalidArchive(
                "Extra field record overruns the extra field".into(),
            )));
        }
        let (data, rest) = rest.split_at(len);
        self.remaining = rest;
        Some(Ok((kind, data)))
    }
}

/// Copy of `extra_field` without the records whose id is `kind`.
///
/// Malformed trailing bytes are dropped.
pub(crate) fn strip_field(extra_field: &[u8], kind: UsedExtraField) -> Vec<u8> {
    let mut out = Vec::with_capacity(extra_field.len());
    for record in ExtraFieldIter::new(extra_field) {
        let Ok((id, data)) = record else {
            break;
        };
        if id == kind as u16 {
            continue;
        }
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&(data.len() as u16).to_le_bytes());
        out.extend_from_slice(data);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn iterate_records() {
        let extra = [0x01, 0x00, 0x02, 0x00, 0xaa, 0xbb, 0x55, 0x54, 0x00, 0x00];
        let records: Vec<_> = ExtraFieldIter::new(&extra)
            .collect::<ZipResult<_>>()
            .unwrap();
        assert_eq!(records, vec![(0x0001, &[0xaa, 0xbb][..]), (0x5455, &[][..])]);
    }

    #[test]
    fn overrun_is_an_error() {
        let extra = [0x01, 0x00, 0x09, 0x00, 0xaa];
        let mut iter = ExtraFieldIter::new(&extra);
        assert!(matches!(iter.next(), Some(Err(ZipError::InvalidArchive(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn strip_zip64() {
        let extra = [0x55, 0x54, 0x01, 0x00, 0x07, 0x01, 0x00, 0x02, 0x00, 0xaa, 0xbb];
        assert_eq!(
            strip_field(&extra, UsedExtraField::Zip64ExtendedInfo),
            vec![0x55, 0x54, 0x01, 0x00, 0x07]
        );
    }
}
