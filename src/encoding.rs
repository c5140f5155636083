//! Byte-order-mark sniffing.

/// Text encoding announced by a file's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    Utf7,
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32,
    /// No marker found.
    #[default]
    Ascii,
}

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf7 => "utf-7",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
            TextEncoding::Utf32 => "utf-32",
            TextEncoding::Ascii => "ascii",
        }
    }

    /// Decode a matched span. Invalid sequences are replaced, never rejected.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf16Le => decode_utf16(bytes, u16::from_le_bytes),
            TextEncoding::Utf16Be => decode_utf16(bytes, u16::from_be_bytes),
            TextEncoding::Utf32 => bytes
                .chunks(4)
                .map(|chunk| {
                    let mut unit = [0u8; 4];
                    unit[..chunk.len()].copy_from_slice(chunk);
                    char::from_u32(u32::from_be_bytes(unit)).unwrap_or(char::REPLACEMENT_CHARACTER)
                })
                .collect(),
            TextEncoding::Utf7 | TextEncoding::Utf8 | TextEncoding::Ascii => {
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks(2).map(|pair| match pair {
        [a, b] => unit([*a, *b]),
        _ => 0xFFFD,
    });
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Inspect up to the first four bytes and return the announced encoding and
/// the length of its marker. Scanning resumes at that offset.
///
/// ```
/// use multigrep::encoding::{detect, TextEncoding};
///
/// assert_eq!(detect(b"\xEF\xBB\xBFhi"), (TextEncoding::Utf8, 3));
/// assert_eq!(detect(b"plain"), (TextEncoding::Ascii, 0));
/// ```
pub fn detect(bytes: &[u8]) -> (TextEncoding, usize) {
    match bytes {
        [0x2B, 0x2F, 0x76, ..] => (TextEncoding::Utf7, 3),
        [0xEF, 0xBB, 0xBF, ..] => (TextEncoding::Utf8, 3),
        [0xFF, 0xFE, ..] => (TextEncoding::Utf16Le, 2),
        [0xFE, 0xFF, ..] => (TextEncoding::Utf16Be, 2),
        [0x00, 0x00, 0xFE, 0xFF, ..] => (TextEncoding::Utf32, 4),
        _ => (TextEncoding::Ascii, 0),
    }
}
