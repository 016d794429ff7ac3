//! Byte-encoding detection for plain-text books.
//!
//! Detection is a strict, whole-buffer trial decode over a fixed candidate
//! list. The first encoding that decodes every byte wins; when nothing fits we
//! fall back to UTF-8 instead of failing.

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::{debug, warn};

/// Encodings a plain-text book may be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    #[default]
    Utf8,
    Gb18030,
    Big5,
    Gb2312,
    Ascii,
    Utf16Le,
}

/// Detection order. UTF-8 first, then the legacy CJK multi-byte encodings,
/// then plain ASCII and finally UTF-16.
pub const CANDIDATES: [TextEncoding; 6] = [
    TextEncoding::Utf8,
    TextEncoding::Gb18030,
    TextEncoding::Big5,
    TextEncoding::Gb2312,
    TextEncoding::Ascii,
    TextEncoding::Utf16Le,
];

impl TextEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Gb18030 => "gb18030",
            TextEncoding::Big5 => "big5",
            TextEncoding::Gb2312 => "gb2312",
            TextEncoding::Ascii => "ascii",
            TextEncoding::Utf16Le => "utf-16le",
        }
    }

    /// Width in bytes of one code unit; line terminators are one code unit.
    pub fn code_unit_len(&self) -> usize {
        match self {
            TextEncoding::Utf16Le => 2,
            _ => 1,
        }
    }

    fn codec(&self) -> &'static Encoding {
        match self {
            TextEncoding::Utf8 | TextEncoding::Ascii => encoding_rs::UTF_8,
            TextEncoding::Gb18030 => encoding_rs::GB18030,
            TextEncoding::Big5 => encoding_rs::BIG5,
            // encoding_rs folds GB2312 into its GBK superset.
            TextEncoding::Gb2312 => encoding_rs::GBK,
            TextEncoding::Utf16Le => encoding_rs::UTF_16LE,
        }
    }

    /// Decode `bytes` without replacement characters. A leading byte order
    /// mark is dropped from the result.
    pub fn decode_strict<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        if *self == TextEncoding::Ascii {
            if !bytes.is_ascii() {
                return None;
            }
            return std::str::from_utf8(bytes).ok().map(Cow::Borrowed);
        }
        self.codec()
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(strip_bom)
    }

    /// Decode `bytes`, substituting U+FFFD for malformed sequences.
    pub fn decode_lossy<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        let (text, _malformed) = self.codec().decode_without_bom_handling(bytes);
        strip_bom(text)
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "gb18030" => Ok(TextEncoding::Gb18030),
            "big5" => Ok(TextEncoding::Big5),
            "gb2312" | "gbk" => Ok(TextEncoding::Gb2312),
            "ascii" | "us-ascii" => Ok(TextEncoding::Ascii),
            "utf-16le" | "utf-16" | "unicode" => Ok(TextEncoding::Utf16Le),
            _ => Err("unknown text encoding"),
        }
    }
}

fn strip_bom(text: Cow<'_, str>) -> Cow<'_, str> {
    const BOM: char = '\u{feff}';
    match text {
        Cow::Borrowed(s) => Cow::Borrowed(s.strip_prefix(BOM).unwrap_or(s)),
        Cow::Owned(s) => {
            if s.starts_with(BOM) {
                Cow::Owned(s[BOM.len_utf8()..].to_string())
            } else {
                Cow::Owned(s)
            }
        }
    }
}

/// Return the first candidate that strictly decodes the whole buffer, or
/// UTF-8 when none does.
pub fn detect(bytes: &[u8]) -> TextEncoding {
    for candidate in CANDIDATES {
        if candidate.decode_strict(bytes).is_some() {
            debug!(encoding = %candidate, bytes = bytes.len(), "Detected text encoding");
            return candidate;
        }
    }
    warn!(
        bytes = bytes.len(),
        "No candidate encoding decoded the buffer; defaulting to utf-8"
    );
    TextEncoding::Utf8
}

/// Candidates to try when decoding a slice: the recorded encoding first, then
/// the detection order without repeats.
pub fn fallback_order(recorded: TextEncoding) -> impl Iterator<Item = TextEncoding> {
    std::iter::once(recorded).chain(CANDIDATES.into_iter().filter(move |c| *c != recorded))
}
