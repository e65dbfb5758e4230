//! BIFF string codec
//!
//! BIFF8 stores text in a handful of related layouts:
//!
//! - **Short form**: an option byte followed by the characters; the caller
//!   supplies the byte count (sheet names and similar fixed slots).
//! - **Long form** (`XLUnicodeRichExtendedString`):
//!
//!   ```text
//!   [cch: u16][flags: u8]{[cRun: u16]}{[cbExtRst: u32]}[chars]{[rgRun: 4 * cRun]}{[ExtRst: cbExtRst]}
//!   ```
//!
//! - **Legacy** (BIFF5/BIFF7): a 16-bit byte count and code-page bytes.
//!
//! Bit 0 of the option byte selects compressed characters (one byte each,
//! high byte implied zero) or expanded UTF-16LE. Rich-text runs and the
//! phonetic block are skipped: they are counted in the consumed length but
//! not modelled.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::{Mutex, OnceLock};

use bitflags::bitflags;
use encoding_rs::{
    BIG5, EUC_KR, Encoding, GBK, SHIFT_JIS, UTF_8, WINDOWS_874, WINDOWS_1250, WINDOWS_1251,
    WINDOWS_1252, WINDOWS_1253, WINDOWS_1254, WINDOWS_1255, WINDOWS_1256, WINDOWS_1257,
    WINDOWS_1258,
};

use crate::common::binary;
use crate::xls::error::{XlsError, XlsResult};
use crate::xls::settings::{Settings, StringMode};

/// Largest character count a 16-bit count field can carry
pub const MAX_STRING_CHARS: usize = u16::MAX as usize;

/// Bytes per rich-text formatting run (`FormatRun`: ich + ifnt)
const RICH_TEXT_RUN_LEN: usize = 4;

bitflags! {
    /// Option byte of a BIFF8 unicode string
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StringFlags: u8 {
        /// Characters are stored as two bytes each
        const HIGH_BYTE = 0x01;
        /// A phonetic (ExtRst) block is attached
        const PHONETIC = 0x04;
        /// A rich-text run table is attached
        const RICH_TEXT = 0x08;
    }
}

/// A long-form string together with the sub-encoding it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedString {
    pub text: String,
    /// One byte per character on disk
    pub compressed: bool,
    /// Rich-text run count, when the run table was present
    pub rich_text_runs: Option<u16>,
    /// Phonetic block size in bytes, when the block was present
    pub phonetic_size: Option<u32>,
    /// Bytes consumed from the decode offset, optional blocks included
    pub consumed: usize,
}

impl DecodedString {
    fn empty() -> Self {
        DecodedString {
            text: String::new(),
            compressed: false,
            rich_text_runs: None,
            phonetic_size: None,
            consumed: 2,
        }
    }
}

fn malformed(offset: usize, reason: impl Into<String>) -> XlsError {
    XlsError::MalformedString {
        offset,
        reason: reason.into(),
    }
}

fn decode_chars(data: &[u8], compressed: bool, offset: usize) -> XlsResult<String> {
    if compressed {
        return Ok(data.iter().copied().map(char::from).collect());
    }

    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| malformed(offset, format!("invalid UTF-16: {e}")))
}

/// Decode a short-form string: option byte plus characters, no count.
///
/// The character count is implied by `bytes.len()`; an odd trailing byte
/// in expanded form is ignored.
pub fn decode_short_form(bytes: &[u8]) -> XlsResult<String> {
    let Some((&option, chars)) = bytes.split_first() else {
        return Err(malformed(0, "missing option byte"));
    };

    let flags = StringFlags::from_bits_truncate(option);
    if flags.contains(StringFlags::HIGH_BYTE) {
        let even = chars.len() & !1;
        decode_chars(&chars[..even], false, 1)
    } else {
        decode_chars(chars, true, 1)
    }
}

/// Decode a long-form string starting at `offset`.
///
/// A zero character count returns an empty string after consuming only the
/// count field: some producers write no option byte for empty strings, so
/// nothing after the count may be read.
pub fn decode_long_form(bytes: &[u8], offset: usize) -> XlsResult<DecodedString> {
    let count = binary::read_u16_le(bytes, offset)
        .map_err(|_| malformed(offset, "missing character count"))? as usize;
    if count == 0 {
        return Ok(DecodedString::empty());
    }

    let option = binary::read_u8(bytes, offset + 2)
        .map_err(|_| malformed(offset + 2, "missing option byte"))?;
    let flags = StringFlags::from_bits_truncate(option);
    let mut pos = offset + 3;

    let rich_text_runs = if flags.contains(StringFlags::RICH_TEXT) {
        let runs = binary::read_u16_le(bytes, pos)
            .map_err(|_| malformed(pos, "missing rich-text run count"))?;
        pos += 2;
        Some(runs)
    } else {
        None
    };

    let phonetic_size = if flags.contains(StringFlags::PHONETIC) {
        let size = binary::read_u32_le(bytes, pos)
            .map_err(|_| malformed(pos, "missing phonetic block size"))?;
        pos += 4;
        Some(size)
    } else {
        None
    };

    let compressed = !flags.contains(StringFlags::HIGH_BYTE);
    let char_bytes = if compressed { count } else { count * 2 };
    let chars = bytes.get(pos..pos + char_bytes).ok_or_else(|| {
        malformed(
            pos,
            format!(
                "{count} characters need {char_bytes} bytes, {} available",
                bytes.len().saturating_sub(pos)
            ),
        )
    })?;
    let text = decode_chars(chars, compressed, pos)?;
    pos += char_bytes;

    // Optional blocks trail the characters; a short tail is tolerated.
    let trailing = rich_text_runs.map_or(0, |runs| runs as usize * RICH_TEXT_RUN_LEN)
        + phonetic_size.map_or(0, |size| size as usize);
    let trailing = trailing.min(bytes.len() - pos);

    Ok(DecodedString {
        text,
        compressed,
        rich_text_runs,
        phonetic_size,
        consumed: pos + trailing - offset,
    })
}

fn utf16_units(text: &str) -> XlsResult<Vec<u16>> {
    let units: Vec<u16> = text.encode_utf16().collect();
    if units.len() > MAX_STRING_CHARS {
        return Err(XlsError::Encoding(format!(
            "string of {} UTF-16 units exceeds the {MAX_STRING_CHARS} character limit",
            units.len()
        )));
    }
    Ok(units)
}

fn push_chars(out: &mut Vec<u8>, units: &[u16], compressed: bool) {
    if compressed {
        out.extend(units.iter().map(|&u| u as u8));
    } else {
        for unit in units {
            out.extend_from_slice(&unit.to_le_bytes());
        }
    }
}

fn use_compressed(units: &[u16], mode: StringMode) -> bool {
    match mode {
        StringMode::Canonical => false,
        StringMode::LegacyCompressed => units.iter().all(|&u| u <= 0xFF),
    }
}

/// Encode a long-form string. No rich-text or phonetic blocks are emitted.
///
/// The empty string is the bare count field `[00 00]`, the same two bytes
/// [`decode_long_form`] consumes for it.
pub fn encode_long_form(text: &str, mode: StringMode) -> XlsResult<Vec<u8>> {
    let units = utf16_units(text)?;
    if units.is_empty() {
        return Ok(vec![0x00, 0x00]);
    }
    let compressed = use_compressed(&units, mode);
    let flags = if compressed {
        StringFlags::empty()
    } else {
        StringFlags::HIGH_BYTE
    };

    let width = if compressed { 1 } else { 2 };
    let mut out = Vec::with_capacity(3 + units.len() * width);
    out.extend_from_slice(&(units.len() as u16).to_le_bytes());
    out.push(flags.bits());
    push_chars(&mut out, &units, compressed);
    Ok(out)
}

/// Encode a short-form string: option byte plus characters.
pub fn encode_short_form(text: &str, mode: StringMode) -> XlsResult<Vec<u8>> {
    let units = utf16_units(text)?;
    let compressed = use_compressed(&units, mode);
    let flags = if compressed {
        StringFlags::empty()
    } else {
        StringFlags::HIGH_BYTE
    };

    let mut out = Vec::with_capacity(1 + units.len() * 2);
    out.push(flags.bits());
    push_chars(&mut out, &units, compressed);
    Ok(out)
}

/// Map a Windows code page to an `encoding_rs` encoding.
pub(crate) fn encoding_for_codepage(codepage: u16) -> Option<&'static Encoding> {
    Some(match codepage {
        874 => WINDOWS_874,
        932 => SHIFT_JIS,
        936 => GBK,
        949 => EUC_KR,
        950 => BIG5,
        1250 => WINDOWS_1250,
        1251 => WINDOWS_1251,
        1252 => WINDOWS_1252,
        1253 => WINDOWS_1253,
        1254 => WINDOWS_1254,
        1255 => WINDOWS_1255,
        1256 => WINDOWS_1256,
        1257 => WINDOWS_1257,
        1258 => WINDOWS_1258,
        65001 => UTF_8,
        _ => return None,
    })
}

fn warn_unsupported_codepage(codepage: u16) {
    static WARNED: OnceLock<Mutex<BTreeSet<u16>>> = OnceLock::new();

    let warned = WARNED.get_or_init(|| Mutex::new(BTreeSet::new()));
    let mut warned = match warned.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    if warned.insert(codepage) {
        log::warn!("unsupported code page {codepage}; treating 8-bit text as Latin-1");
    }
}

/// Decode code-page bytes to text.
///
/// Unknown code pages fall back to a byte-to-Unicode mapping so ASCII
/// survives intact.
pub fn decode_codepage(bytes: &[u8], codepage: u16) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    if let Some(encoding) = encoding_for_codepage(codepage) {
        let (text, _, _) = encoding.decode(bytes);
        return text.into_owned();
    }

    warn_unsupported_codepage(codepage);
    bytes.iter().copied().map(char::from).collect()
}

/// Encode text to code-page bytes, failing on unmappable characters.
pub fn encode_codepage(text: &str, codepage: u16) -> XlsResult<Vec<u8>> {
    let bytes: Cow<'_, [u8]> = match encoding_for_codepage(codepage) {
        Some(encoding) => {
            let (bytes, _, had_errors) = encoding.encode(text);
            if had_errors {
                return Err(XlsError::Encoding(format!(
                    "text is not representable in code page {codepage}"
                )));
            }
            bytes
        },
        None => {
            warn_unsupported_codepage(codepage);
            let mut bytes = Vec::with_capacity(text.len());
            for ch in text.chars() {
                let byte = u8::try_from(u32::from(ch)).map_err(|_| {
                    XlsError::Encoding(format!(
                        "character {ch:?} is not representable in code page {codepage}"
                    ))
                })?;
                bytes.push(byte);
            }
            Cow::Owned(bytes)
        },
    };

    Ok(bytes.into_owned())
}

/// Decode a legacy (BIFF5/BIFF7) string: `[len: u16][len code-page bytes]`.
///
/// Returns the text and the number of bytes consumed.
pub fn decode_legacy(bytes: &[u8], offset: usize, codepage: u16) -> XlsResult<(String, usize)> {
    let len = binary::read_u16_le(bytes, offset)
        .map_err(|_| malformed(offset, "missing byte count"))? as usize;
    if len == 0 {
        return Ok((String::new(), 2));
    }

    let start = offset + 2;
    let data = bytes.get(start..start + len).ok_or_else(|| {
        malformed(
            start,
            format!(
                "{len} bytes declared, {} available",
                bytes.len().saturating_sub(start)
            ),
        )
    })?;
    Ok((decode_codepage(data, codepage), 2 + len))
}

/// Encode a legacy (BIFF5/BIFF7) string: `[len: u16][code-page bytes]`.
pub fn encode_legacy(text: &str, codepage: u16) -> XlsResult<Vec<u8>> {
    let data = encode_codepage(text, codepage)?;
    let len = u16::try_from(data.len()).map_err(|_| {
        XlsError::Encoding(format!(
            "legacy string of {} bytes exceeds the 16-bit length field",
            data.len()
        ))
    })?;

    let mut out = Vec::with_capacity(2 + data.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&data);
    Ok(out)
}

/// String encoder bound to a set of workbook [`Settings`].
///
/// With `lossy_strings` on, text that cannot be encoded is replaced by the
/// empty string and a warning is logged, so a file can always be produced.
/// With it off, the encoding error is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringCodec {
    mode: StringMode,
    codepage: u16,
    lossy: bool,
}

impl StringCodec {
    pub fn new(settings: &Settings) -> Self {
        StringCodec {
            mode: settings.string_mode,
            codepage: settings.codepage,
            lossy: settings.lossy_strings,
        }
    }

    pub fn mode(&self) -> StringMode {
        self.mode
    }

    pub fn codepage(&self) -> u16 {
        self.codepage
    }

    /// Encode a long-form string, applying the empty-string fallback.
    pub fn encode_long(&self, text: &str) -> XlsResult<Vec<u8>> {
        self.or_empty(encode_long_form(text, self.mode), || {
            encode_long_form("", self.mode)
        })
    }

    /// Encode a short-form string, applying the empty-string fallback.
    pub fn encode_short(&self, text: &str) -> XlsResult<Vec<u8>> {
        self.or_empty(encode_short_form(text, self.mode), || {
            encode_short_form("", self.mode)
        })
    }

    /// Encode a legacy code-page string, applying the empty-string fallback.
    pub fn encode_legacy(&self, text: &str) -> XlsResult<Vec<u8>> {
        self.or_empty(encode_legacy(text, self.codepage), || {
            encode_legacy("", self.codepage)
        })
    }

    pub(crate) fn or_empty(
        &self,
        result: XlsResult<Vec<u8>>,
        empty: impl FnOnce() -> XlsResult<Vec<u8>>,
    ) -> XlsResult<Vec<u8>> {
        match result {
            Err(XlsError::Encoding(reason)) if self.lossy => {
                log::warn!("writing empty text in place of unencodable string: {reason}");
                empty()
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_count_consumes_only_count_field() {
        // Garbage after the count must not be read.
        let bytes = [0x00, 0x00, 0xFF, 0xEE, 0xDD];
        let decoded = decode_long_form(&bytes, 0).unwrap();
        assert_eq!(decoded.text, "");
        assert_eq!(decoded.consumed, 2);

        let decoded = decode_long_form(&[0x00, 0x00], 0).unwrap();
        assert_eq!(decoded.consumed, 2);
    }

    #[test]
    fn test_decode_compressed_long_form() {
        let bytes = [0x03, 0x00, 0x00, b'a', b'b', 0xE9];
        let decoded = decode_long_form(&bytes, 0).unwrap();
        assert_eq!(decoded.text, "ab\u{e9}");
        assert!(decoded.compressed);
        assert_eq!(decoded.consumed, 6);
    }

    #[test]
    fn test_decode_expanded_long_form_at_offset() {
        let mut bytes = vec![0xAA, 0xBB];
        bytes.extend_from_slice(&[0x02, 0x00, 0x01]);
        bytes.extend_from_slice(&0x4E2Du16.to_le_bytes());
        bytes.extend_from_slice(&0x6587u16.to_le_bytes());

        let decoded = decode_long_form(&bytes, 2).unwrap();
        assert_eq!(decoded.text, "\u{4e2d}\u{6587}");
        assert!(!decoded.compressed);
        assert_eq!(decoded.consumed, 7);
    }

    #[test]
    fn test_decode_skips_rich_text_and_phonetic_blocks() {
        let mut bytes = vec![0x02, 0x00, 0x0C];
        bytes.extend_from_slice(&1u16.to_le_bytes()); // cRun
        bytes.extend_from_slice(&3u32.to_le_bytes()); // cbExtRst
        bytes.extend_from_slice(b"hi");
        bytes.extend_from_slice(&[0, 0, 1, 0]); // one run
        bytes.extend_from_slice(&[9, 9, 9]); // phonetic block
        bytes.push(0x77); // next field

        let decoded = decode_long_form(&bytes, 0).unwrap();
        assert_eq!(decoded.text, "hi");
        assert_eq!(decoded.rich_text_runs, Some(1));
        assert_eq!(decoded.phonetic_size, Some(3));
        assert_eq!(decoded.consumed, bytes.len() - 1);
    }

    #[test]
    fn test_truncated_trailing_blocks_are_tolerated() {
        let mut bytes = vec![0x01, 0x00, 0x08];
        bytes.extend_from_slice(&5u16.to_le_bytes());
        bytes.push(b'x');
        bytes.extend_from_slice(&[0, 0]);

        let decoded = decode_long_form(&bytes, 0).unwrap();
        assert_eq!(decoded.text, "x");
        assert_eq!(decoded.consumed, bytes.len());
    }

    #[test]
    fn test_short_character_data_is_malformed() {
        let bytes = [0x05, 0x00, 0x01, b'a', 0x00];
        let err = decode_long_form(&bytes, 0).unwrap_err();
        assert!(matches!(err, XlsError::MalformedString { offset: 3, .. }));

        let err = decode_long_form(&[0x05, 0x00], 0).unwrap_err();
        assert!(matches!(err, XlsError::MalformedString { offset: 2, .. }));
    }

    #[test]
    fn test_lone_surrogate_is_malformed() {
        let bytes = [0x01, 0x00, 0x01, 0x00, 0xD8];
        assert!(matches!(
            decode_long_form(&bytes, 0),
            Err(XlsError::MalformedString { .. })
        ));
    }

    #[test]
    fn test_short_form() {
        assert_eq!(decode_short_form(&[0x00, b'S', b'1']).unwrap(), "S1");
        assert_eq!(decode_short_form(&[0x01, b'S', 0x00, b'2', 0x00]).unwrap(), "S2");
        assert!(decode_short_form(&[]).is_err());

        let bytes = encode_short_form("Tab", StringMode::Canonical).unwrap();
        assert_eq!(bytes, vec![0x01, b'T', 0, b'a', 0, b'b', 0]);
        assert_eq!(decode_short_form(&bytes).unwrap(), "Tab");
    }

    #[test]
    fn test_canonical_encoding_is_expanded() {
        let bytes = encode_long_form("ab", StringMode::Canonical).unwrap();
        assert_eq!(bytes, vec![0x02, 0x00, 0x01, b'a', 0x00, b'b', 0x00]);
    }

    #[test]
    fn test_legacy_mode_compresses_latin1_only() {
        let bytes = encode_long_form("caf\u{e9}", StringMode::LegacyCompressed).unwrap();
        assert_eq!(bytes, vec![0x04, 0x00, 0x00, b'c', b'a', b'f', 0xE9]);

        let bytes = encode_long_form("\u{20ac}", StringMode::LegacyCompressed).unwrap();
        assert_eq!(bytes, vec![0x01, 0x00, 0x01, 0xAC, 0x20]);
    }

    #[test]
    fn test_count_is_in_utf16_units() {
        let bytes = encode_long_form("\u{1F600}", StringMode::Canonical).unwrap();
        assert_eq!(&bytes[..2], &[0x02, 0x00]);
        assert_eq!(decode_long_form(&bytes, 0).unwrap().text, "\u{1F600}");
    }

    #[test]
    fn test_oversized_string_falls_back_to_empty() {
        let text = "x".repeat(MAX_STRING_CHARS + 1);
        assert!(matches!(
            encode_long_form(&text, StringMode::Canonical),
            Err(XlsError::Encoding(_))
        ));

        let lossy = StringCodec::new(&Settings::default());
        assert_eq!(lossy.encode_long(&text).unwrap(), vec![0x00, 0x00]);

        let strict = StringCodec::new(&Settings::default().with_lossy_strings(false));
        assert!(strict.encode_long(&text).is_err());
    }

    #[test]
    fn test_legacy_codepage_round_trip() {
        let bytes = encode_legacy("caf\u{e9} \u{20ac}", 1252).unwrap();
        assert_eq!(bytes, vec![0x06, 0x00, b'c', b'a', b'f', 0xE9, b' ', 0x80]);

        let (text, consumed) = decode_legacy(&bytes, 0, 1252).unwrap();
        assert_eq!(text, "caf\u{e9} \u{20ac}");
        assert_eq!(consumed, 8);
    }

    #[test]
    fn test_unmappable_legacy_text_degrades_to_empty() {
        assert!(matches!(
            encode_legacy("\u{4e2d}", 1252),
            Err(XlsError::Encoding(_))
        ));

        let codec = StringCodec::new(&Settings::default());
        assert_eq!(codec.encode_legacy("\u{4e2d}").unwrap(), vec![0x00, 0x00]);
    }

    #[test]
    fn test_unknown_codepage_uses_byte_mapping() {
        assert_eq!(decode_codepage(&[b'A', 0xE9], 9999), "A\u{e9}");
        assert_eq!(encode_codepage("A\u{e9}", 9999).unwrap(), vec![b'A', 0xE9]);
        assert!(encode_codepage("\u{20ac}", 9999).is_err());
    }

    #[test]
    fn test_empty_long_form_keeps_following_fields_aligned() {
        for mode in [StringMode::Canonical, StringMode::LegacyCompressed] {
            let mut bytes = encode_long_form("", mode).unwrap();
            assert_eq!(bytes, vec![0x00, 0x00]);
            bytes.extend_from_slice(&encode_long_form("ab", mode).unwrap());

            let first = decode_long_form(&bytes, 0).unwrap();
            assert_eq!(first.text, "");
            let second = decode_long_form(&bytes, first.consumed).unwrap();
            assert_eq!(second.text, "ab");
            assert_eq!(first.consumed + second.consumed, bytes.len());
        }
    }

    proptest! {
        #[test]
        fn prop_long_form_round_trip(text in "\\PC{0,64}", legacy in any::<bool>()) {
            let mode = if legacy { StringMode::LegacyCompressed } else { StringMode::Canonical };
            let bytes = encode_long_form(&text, mode).unwrap();
            let decoded = decode_long_form(&bytes, 0).unwrap();
            prop_assert_eq!(&decoded.text, &text);
            prop_assert_eq!(decoded.consumed, bytes.len());
        }
    }
}
