//! Byte-to-text decoding of assembled frames.

use encoding_rs::{Encoding, SHIFT_JIS};

/// The character substituted for undecodable input.
pub const REPLACEMENT_CHAR: char = char::REPLACEMENT_CHARACTER;

/// Decodes frame bytes with a fixed charset, never failing.
///
/// Malformed sequences become U+FFFD; when a different `error_char` is
/// configured every U+FFFD in the result is swapped for it, including any the
/// scanner sent literally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDecoder {
    encoding: &'static Encoding,
    error_char: char,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(SHIFT_JIS, REPLACEMENT_CHAR)
    }
}

impl FrameDecoder {
    pub fn new(encoding: &'static Encoding, error_char: char) -> Self {
        Self {
            encoding,
            error_char,
        }
    }

    /// Build a decoder from a WHATWG encoding label such as `"shift_jis"`.
    ///
    /// Returns `None` for labels `encoding_rs` does not know.
    pub fn for_label(label: &str, error_char: char) -> Option<Self> {
        Encoding::for_label(label.trim().as_bytes()).map(|enc| Self::new(enc, error_char))
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn error_char(&self) -> char {
        self.error_char
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, _had_errors) = self.encoding.decode_without_bom_handling(bytes);
        if self.error_char != REPLACEMENT_CHAR && text.contains(REPLACEMENT_CHAR) {
            let mut buf = [0u8; 4];
            text.replace(REPLACEMENT_CHAR, self.error_char.encode_utf8(&mut buf))
        } else {
            text.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ascii_passes_through() {
        let decoder = FrameDecoder::default();
        assert_eq!(decoder.decode(b"HELLO\n"), "HELLO\n");
    }

    #[test]
    fn test_shift_jis_kana_and_kanji() {
        // "テスト漢字" in Shift-JIS
        let bytes = [0x83, 0x65, 0x83, 0x58, 0x83, 0x67, 0x8A, 0xBF, 0x8E, 0x9A];
        assert_eq!(FrameDecoder::default().decode(&bytes), "テスト漢字");
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        // 0x81 starts a double-byte sequence; 0x20 cannot trail it.
        let decoded = FrameDecoder::default().decode(b"A\x81 B");
        assert!(decoded.starts_with('A'));
        assert!(decoded.ends_with(" B"));
        assert!(decoded.contains(REPLACEMENT_CHAR));
    }

    #[test]
    fn test_custom_error_char() {
        let decoder = FrameDecoder::new(SHIFT_JIS, '?');
        let decoded = decoder.decode(b"A\xA0B");
        assert_eq!(decoded, "A?B");
    }

    #[test]
    fn test_truncated_trailing_lead_byte() {
        let decoder = FrameDecoder::new(SHIFT_JIS, '#');
        assert_eq!(decoder.decode(b"OK\x83"), "OK#");
    }

    #[test]
    fn test_for_label() {
        let decoder = FrameDecoder::for_label("utf-8", REPLACEMENT_CHAR).unwrap();
        assert_eq!(decoder.encoding(), encoding_rs::UTF_8);
        assert_eq!(decoder.decode("héllo".as_bytes()), "héllo");

        assert_eq!(
            FrameDecoder::for_label("Shift_JIS", REPLACEMENT_CHAR)
                .unwrap()
                .encoding(),
            SHIFT_JIS
        );
        assert!(FrameDecoder::for_label("klingon", REPLACEMENT_CHAR).is_none());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(FrameDecoder::default().decode(b""), "");
    }
}
