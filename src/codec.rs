//! Text codecs for entry names and comments.
//!
//! Zip archives store names as raw bytes. General purpose flag bit 11 marks UTF-8; without it the
//! bytes are in whatever code page the writer used, traditionally IBM codepage 437. Archives
//! produced on localized systems often use the OEM code page instead (e.g. `IBM866` for
//! Cyrillic), which is why the codec is chosen per archive.

use std::borrow::Cow;
use std::fmt;

use encoding_rs::Encoding;

use crate::cp437::{FromCp437, to_cp437};

/// Codec used for entry names and comments that are not flagged as UTF-8.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub enum FileNameCodec {
    /// IBM codepage 437, the zip default.
    #[default]
    Cp437,
    /// UTF-8. Names written with this codec are flagged as UTF-8.
    Utf8,
    /// Any other encoding known to the WHATWG Encoding Standard.
    Encoding(&'static Encoding),
}

impl FileNameCodec {
    /// Look up a codec by label, e.g. `"IBM866"`, `"windows-1251"`, `"utf-8"` or `"cp437"`.
    ///
    /// Labels are matched case-insensitively. Returns `None` for unknown labels.
    pub fn for_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "cp437" | "ibm437" | "437" | "ibm-437" | "cp-437" => Some(Self::Cp437),
            "utf8" | "utf-8" => Some(Self::Utf8),
            _ => Encoding::for_label(normalized.as_bytes()).map(|encoding| {
                if encoding == encoding_rs::UTF_8 {
                    Self::Utf8
                } else {
                    Self::Encoding(encoding)
                }
            }),
        }
    }

    /// Whether names encoded with this codec must carry the UTF-8 flag.
    pub fn is_utf8(&self) -> bool {
        matches!(self, Self::Utf8)
    }

    /// Name of the codec, as accepted by [`FileNameCodec::for_label`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cp437 => "IBM437",
            Self::Utf8 => "UTF-8",
            Self::Encoding(encoding) => encoding.name(),
        }
    }

    /// Decode raw bytes. Malformed input is replaced rather than rejected.
    pub fn decode<'a>(&self, raw: &'a [u8]) -> Cow<'a, str> {
        match self {
            Self::Cp437 => raw.from_cp437(),
            Self::Utf8 => String::from_utf8_lossy(raw),
            Self::Encoding(encoding) => encoding.decode_without_bom_handling(raw).0,
        }
    }

    /// Encode text. The flag reports whether some characters had no representation and were
    /// replaced.
    pub fn encode<'a>(&self, text: &'a str) -> (Cow<'a, [u8]>, bool) {
        match self {
            Self::Cp437 => to_cp437(text),
            Self::Utf8 => (Cow::Borrowed(text.as_bytes()), false),
            Self::Encoding(encoding) => {
                let (bytes, _, lossy) = encoding.encode(text);
                (bytes, lossy)
            }
        }
    }
}

impl fmt::Debug for FileNameCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileNameCodec({})", self.name())
    }
}

/// Decode a name or comment according to its flags.
pub(crate) fn decode_with_flag<'a>(
    codec: FileNameCodec,
    raw: &'a [u8],
    is_utf8: bool,
) -> Cow<'a, str> {
    if is_utf8 {
        String::from_utf8_lossy(raw)
    } else {
        codec.decode(raw)
    }
}

/// Encode a name or comment for writing. Returns the bytes and whether bit 11 must be set.
///
/// With the default codec, ASCII stays unflagged, text cp437 can represent is written as cp437
/// and anything else falls back to flagged UTF-8.
pub(crate) fn encode_for_header(
    codec: FileNameCodec,
    explicit: bool,
    force_utf8: bool,
    text: &str,
) -> (Vec<u8>, bool) {
    if force_utf8 || codec.is_utf8() {
        return (text.as_bytes().to_vec(), !text.is_ascii());
    }
    if !explicit {
        if text.is_ascii() {
            return (text.as_bytes().to_vec(), false);
        }
        let (bytes, lossy) = codec.encode(text);
        if lossy {
            return (text.as_bytes().to_vec(), true);
        }
        return (bytes.into_owned(), false);
    }
    let (bytes, lossy) = codec.encode(text);
    if lossy {
        log::warn!(
            "{text:?} is not representable in {}; replacement characters written",
            codec.name()
        );
    }
    (bytes.into_owned(), false)
}
