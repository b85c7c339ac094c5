//! Possible ZIP compression methods, and the incremental codecs behind them.

use std::fmt;

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::result::{ZipError, ZipResult};

/// Identifies the storage format used to compress a file within a ZIP archive.
///
/// Each file's compression method is stored alongside it, allowing the
/// contents to be read without context.
///
/// Only stored and deflated entries can be read or written; every other method is reported
/// as [`CompressionMethod::Unsupported`] and rejected when a stream is opened on it.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[non_exhaustive]
pub enum CompressionMethod {
    /// Store the file as is
    Stored,
    /// Compress the file using Deflate
    #[default]
    Deflated,
    /// Unsupported compression method
    Unsupported(u16),
}

impl CompressionMethod {
    pub const STORE: u16 = 0;
    pub const DEFLATE: u16 = 8;

    /// Converts a u16 to its corresponding CompressionMethod
    pub const fn parse_from_u16(val: u16) -> Self {
        match val {
            Self::STORE => CompressionMethod::Stored,
            Self::DEFLATE => CompressionMethod::Deflated,
            v => CompressionMethod::Unsupported(v),
        }
    }

    /// Converts a CompressionMethod to a u16
    pub const fn to_u16(self) -> u16 {
        match self {
            CompressionMethod::Stored => Self::STORE,
            CompressionMethod::Deflated => Self::DEFLATE,
            CompressionMethod::Unsupported(v) => v,
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Just duplicate what the Debug format looks like, i.e, the enum key:
        write!(f, "{self:?}")
    }
}

/// Level used when [`crate::FileOptions`] doesn't name one, matching zlib.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Progress of one [`EntryDecoder::decode`] call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct DecodeStep {
    pub consumed: usize,
    pub produced: usize,
    /// The codec saw the end of its stream. Always false for stored data, whose end is only
    /// known from the entry size.
    pub stream_end: bool,
}

/// Decompressor fed with chunks of an entry's (decrypted) data.
///
/// State persists across calls, so a read of any size continues exactly where the previous
/// one stopped.
pub(crate) enum EntryDecoder {
    Stored,
    Deflated(Box<Decompress>),
}

impl fmt::Debug for EntryDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryDecoder::Stored => f.write_str("EntryDecoder::Stored"),
            EntryDecoder::Deflated(d) => f
                .debug_struct("EntryDecoder::Deflated")
                .field("total_in", &d.total_in())
                .field("total_out", &d.total_out())
                .finish(),
        }
    }
}

impl EntryDecoder {
    pub(crate) fn new(method: CompressionMethod) -> ZipResult<Self> {
        match method {
            CompressionMethod::Stored => Ok(EntryDecoder::Stored),
            CompressionMethod::Deflated => {
                Ok(EntryDecoder::Deflated(Box::new(Decompress::new(false))))
            }
            CompressionMethod::Unsupported(m) => Err(ZipError::UnsupportedArchive(
                format!("Compression method {m} not supported").into(),
            )),
        }
    }

    /// Decode as much of `input` into `out` as fits.
    pub(crate) fn decode(&mut self, input: &[u8], out: &mut [u8]) -> ZipResult<DecodeStep> {
        match self {
            EntryDecoder::Stored => {
                let n = input.len().min(out.len());
                out[..n].copy_from_slice(&input[..n]);
                Ok(DecodeStep {
                    consumed: n,
                    produced: n,
                    stream_end: false,
                })
            }
            EntryDecoder::Deflated(d) => {
                let before_in = d.total_in();
                let before_out = d.total_out();
                let status = d
                    .decompress(input, out, FlushDecompress::None)
                    .map_err(|e| ZipError::Codec(format!("deflate: {e}").into()))?;
                let step = DecodeStep {
                    consumed: (d.total_in() - before_in) as usize,
                    produced: (d.total_out() - before_out) as usize,
                    stream_end: status == Status::StreamEnd,
                };
                log::trace!("inflate {step:?}");
                Ok(step)
            }
        }
    }
}

/// Compressor for an entry being written. Output is appended to a caller-provided buffer.
pub(crate) enum EntryEncoder {
    Stored,
    Deflated(Box<Compress>),
}

impl fmt::Debug for EntryEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryEncoder::Stored => f.write_str("EntryEncoder::Stored"),
            EntryEncoder::Deflated(c) => f
                .debug_struct("EntryEncoder::Deflated")
                .field("total_in", &c.total_in())
                .field("total_out", &c.total_out())
                .finish(),
        }
    }
}

impl EntryEncoder {
    const CHUNK: usize = 16 * 1024;

    pub(crate) fn new(method: CompressionMethod, level: u32) -> ZipResult<Self> {
        match method {
            CompressionMethod::Stored => Ok(EntryEncoder::Stored),
            CompressionMethod::Deflated => {
                if level > 9 {
                    return Err(ZipError::UnsupportedArchive(
                        format!("Compression level {level} out of range 0..=9").into(),
                    ));
                }
                Ok(EntryEncoder::Deflated(Box::new(Compress::new(
                    Compression::new(level),
                    false,
                ))))
            }
            CompressionMethod::Unsupported(m) => Err(ZipError::UnsupportedArchive(
                format!("Compression method {m} not supported").into(),
            )),
        }
    }

    pub(crate) fn encode(&mut self, mut input: &[u8], out: &mut Vec<u8>) -> ZipResult<()> {
        match self {
            EntryEncoder::Stored => {
                out.extend_from_slice(input);
                Ok(())
            }
            EntryEncoder::Deflated(c) => {
                while !input.is_empty() {
                    out.reserve(Self::CHUNK);
                    let before = c.total_in();
                    c.compress_vec(input, out, FlushCompress::None)
                        .map_err(|e| ZipError::Codec(format!("deflate: {e}").into()))?;
                    let consumed = (c.total_in() - before) as usize;
                    input = &input[consumed..];
                }
                Ok(())
            }
        }
    }

    /// Flush everything the codec still holds. The encoder must not be used afterwards.
    pub(crate) fn finish(&mut self, out: &mut Vec<u8>) -> ZipResult<()> {
        match self {
            EntryEncoder::Stored => Ok(()),
            EntryEncoder::Deflated(c) => loop {
                out.reserve(Self::CHUNK);
                let status = c
                    .compress_vec(&[], out, FlushCompress::Finish)
                    .map_err(|e| ZipError::Codec(format!("deflate: {e}").into()))?;
                if status == Status::StreamEnd {
                    return Ok(());
                }
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn from_eq_to() {
        for v in 0..(u16::MAX as u32 + 1) {
            let from = CompressionMethod::parse_from_u16(v as u16);
            let to = from.to_u16() as u32;
            assert_eq!(v, to);
        }
    }

    #[test]
    fn to_display_fmt() {
        assert_eq!(format!("{}", CompressionMethod::Stored), "Stored");
        assert_eq!(format!("{}", CompressionMethod::Unsupported(12)), "Unsupported(12)");
    }

    fn deflate(data: &[u8], level: u32) -> Vec<u8> {
        let mut encoder = EntryEncoder::new(CompressionMethod::Deflated, level).unwrap();
        let mut out = Vec::new();
        for chunk in data.chunks(1000) {
            encoder.encode(chunk, &mut out).unwrap();
        }
        encoder.finish(&mut out).unwrap();
        out
    }

    #[test]
    fn decode_one_byte_at_a_time() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let compressed = deflate(&data, DEFAULT_COMPRESSION_LEVEL);
        assert!(compressed.len() < data.len());

        let mut decoder = EntryDecoder::new(CompressionMethod::Deflated).unwrap();
        let mut input = &compressed[..];
        let mut output = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let step = decoder.decode(input, &mut byte).unwrap();
            input = &input[step.consumed..];
            output.extend_from_slice(&byte[..step.produced]);
            if step.stream_end {
                break;
            }
            assert!(step.consumed > 0 || step.produced > 0, "decoder stalled");
        }
        assert_eq!(output, data);
    }

    #[test]
    fn level_zero_still_deflates() {
        let compressed = deflate(b"hello hello hello", 0);
        let mut decoder = EntryDecoder::new(CompressionMethod::Deflated).unwrap();
        let mut out = [0u8; 64];
        let step = decoder.decode(&compressed, &mut out).unwrap();
        assert!(step.stream_end);
        assert_eq!(&out[..step.produced], b"hello hello hello");
    }

    #[test]
    fn corrupt_input_is_a_codec_error() {
        let mut decoder = EntryDecoder::new(CompressionMethod::Deflated).unwrap();
        let mut out = [0u8; 64];
        /* Block type 3 is reserved. */
        let err = decoder.decode(&[0xff, 0xff, 0xff, 0xff], &mut out).unwrap_err();
        assert!(matches!(err, ZipError::Codec(_)));
    }

    #[test]
    fn stored_is_a_copy() {
        let mut decoder = EntryDecoder::new(CompressionMethod::Stored).unwrap();
        let mut out = [0u8; 3];
        let step = decoder.decode(b"abcdef", &mut out).unwrap();
        assert_eq!(step.produced, 3);
        assert_eq!(&out, b"abc");
    }

    #[test]
    fn unsupported_methods() {
        assert!(matches!(
            EntryDecoder::new(CompressionMethod::Unsupported(12)),
            Err(ZipError::UnsupportedArchive(_))
        ));
        assert!(EntryEncoder::new(CompressionMethod::Deflated, 10).is_err());
    }
}
