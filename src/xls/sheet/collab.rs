//! Collaborators the sheet engine talks to but does not own: the style
//! registry and the formula/named-range adjuster.

use std::fmt;

use crate::xls::error::{XlsError, XlsResult};

/// Index of an XF (extended format) record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleHandle(pub u16);

impl StyleHandle {
    /// The default cell XF every BIFF8 workbook carries at index 15
    pub const DEFAULT: StyleHandle = StyleHandle(15);

    #[inline]
    pub fn index(self) -> u16 {
        self.0
    }
}

impl Default for StyleHandle {
    fn default() -> Self {
        StyleHandle::DEFAULT
    }
}

/// Horizontal alignment stored in an XF record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HorizontalAlignment {
    #[default]
    General,
    Left,
    Center,
    Right,
    Fill,
    Justify,
}

/// Cell formatting as seen by the registry.
///
/// The engine never inspects these fields; it only hands the style to a
/// [`StyleRegistry`] and stores the handle it gets back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CellStyle {
    /// Index into the workbook font table
    pub font_index: u16,
    /// Index into the number format table
    pub format_index: u16,
    pub alignment: HorizontalAlignment,
    pub wrap: bool,
    pub locked: bool,
}

/// Hands out XF indices for cell styles.
pub trait StyleRegistry {
    /// Return the handle for `style`, registering it first if needed.
    ///
    /// Fails with [`XlsError::StyleTableFull`] when no index is left.
    fn register_style_if_absent(&mut self, style: &CellStyle) -> XlsResult<StyleHandle>;
}

/// First XF index available to user styles; 0..=20 are built-in.
pub const FIRST_USER_XF: u16 = 21;

/// Largest XF count Excel 97-2003 accepts
pub const MAX_XF_RECORDS: usize = 4050;

/// In-memory style registry that deduplicates equal styles.
#[derive(Debug, Clone)]
pub struct StyleTable {
    styles: Vec<CellStyle>,
    limit: usize,
}

impl Default for StyleTable {
    fn default() -> Self {
        StyleTable::new()
    }
}

impl StyleTable {
    pub fn new() -> Self {
        Self::with_limit(MAX_XF_RECORDS)
    }

    /// A table that holds at most `limit` XF records, built-ins included.
    pub fn with_limit(limit: usize) -> Self {
        StyleTable {
            styles: Vec::new(),
            limit,
        }
    }

    /// Registered user styles in XF order
    pub fn styles(&self) -> &[CellStyle] {
        &self.styles
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn get(&self, handle: StyleHandle) -> Option<&CellStyle> {
        let slot = handle.0.checked_sub(FIRST_USER_XF)?;
        self.styles.get(slot as usize)
    }
}

impl StyleRegistry for StyleTable {
    fn register_style_if_absent(&mut self, style: &CellStyle) -> XlsResult<StyleHandle> {
        if let Some(pos) = self.styles.iter().position(|s| s == style) {
            return Ok(StyleHandle(FIRST_USER_XF + pos as u16));
        }

        let next = FIRST_USER_XF as usize + self.styles.len();
        if next >= self.limit {
            return Err(XlsError::StyleTableFull { limit: self.limit });
        }

        self.styles.push(style.clone());
        Ok(StyleHandle(next as u16))
    }
}

/// Receives row/column pivots so formulas and named ranges can follow them.
///
/// Notifications are fire-and-forget: the sheet does not wait on or read
/// anything back from the adjuster.
pub trait FormulaAdjuster: fmt::Debug {
    fn row_inserted(&mut self, sheet: &str, row: u32);
    fn row_removed(&mut self, sheet: &str, row: u32);
    fn column_inserted(&mut self, sheet: &str, col: u32);
    fn column_removed(&mut self, sheet: &str, col: u32);
}

/// Adjuster that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFormulaAdjust;

impl FormulaAdjuster for NoFormulaAdjust {
    fn row_inserted(&mut self, _sheet: &str, _row: u32) {}
    fn row_removed(&mut self, _sheet: &str, _row: u32) {}
    fn column_inserted(&mut self, _sheet: &str, _col: u32) {}
    fn column_removed(&mut self, _sheet: &str, _col: u32) {}
}
