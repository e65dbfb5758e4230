//! Workbook-level settings shared by sheets, readers and writers.

use serde::{Deserialize, Serialize};

use crate::xls::records::FormatVersion;

/// How newly authored strings are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StringMode {
    /// Always expanded UTF-16 with no optional blocks.
    #[default]
    Canonical,
    /// Compressed (one byte per character) whenever every code unit fits
    /// in a byte, as older producers write it.
    LegacyCompressed,
}

/// Settings for reading, writing and editing worksheets.
///
/// # Examples
///
/// ```rust
/// use loquat::xls::{Settings, StringMode};
///
/// let settings = Settings::new()
///     .with_formula_adjust(false)
///     .with_string_mode(StringMode::LegacyCompressed);
/// assert!(!settings.formula_adjust);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Forward row/column pivots to the sheet's formula adjuster
    pub formula_adjust: bool,
    /// Layout used when encoding strings
    pub string_mode: StringMode,
    /// Replace unencodable text with an empty string instead of failing
    pub lossy_strings: bool,
    /// Windows code page for legacy 8-bit text
    pub codepage: u16,
    /// Payload layout written by `SheetWriter`; readers fall back to it when
    /// BOF carries no known version
    pub format_version: FormatVersion,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            formula_adjust: true,
            string_mode: StringMode::Canonical,
            lossy_strings: true,
            codepage: 1252,
            format_version: FormatVersion::Current,
        }
    }
}

impl Settings {
    /// Create settings with default values.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_formula_adjust(mut self, enabled: bool) -> Self {
        self.formula_adjust = enabled;
        self
    }

    #[inline]
    pub fn with_string_mode(mut self, mode: StringMode) -> Self {
        self.string_mode = mode;
        self
    }

    /// Set whether unencodable text degrades to an empty string.
    ///
    /// Turning this off makes writers return the encoding error instead.
    #[inline]
    pub fn with_lossy_strings(mut self, lossy: bool) -> Self {
        self.lossy_strings = lossy;
        self
    }

    #[inline]
    pub fn with_codepage(mut self, codepage: u16) -> Self {
        self.codepage = codepage;
        self
    }

    #[inline]
    pub fn with_format_version(mut self, version: FormatVersion) -> Self {
        self.format_version = version;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.formula_adjust);
        assert!(settings.lossy_strings);
        assert_eq!(settings.string_mode, StringMode::Canonical);
        assert_eq!(settings.codepage, 1252);
        assert_eq!(settings.format_version, FormatVersion::Current);
    }

    #[test]
    fn test_builder_chain() {
        let settings = Settings::new()
            .with_lossy_strings(false)
            .with_codepage(1251)
            .with_format_version(FormatVersion::Legacy);
        assert!(!settings.lossy_strings);
        assert_eq!(settings.codepage, 1251);
        assert_eq!(settings.format_version, FormatVersion::Legacy);
    }

    #[test]
    fn test_yaml_round_trip() {
        let settings = Settings::new()
            .with_formula_adjust(false)
            .with_string_mode(StringMode::LegacyCompressed)
            .with_codepage(1251)
            .with_format_version(FormatVersion::Legacy);
        let yaml = serde_saphyr::to_string(&settings).unwrap();
        let parsed: Settings = serde_saphyr::from_str(&yaml).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let parsed: Settings = serde_saphyr::from_str("codepage: 932\n").unwrap();
        assert_eq!(parsed, Settings::default().with_codepage(932));
    }
}
