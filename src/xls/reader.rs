//! Worksheet substream reader
//!
//! Rebuilds a [`Worksheet`] from the records written by
//! [`SheetWriter`](crate::xls::writer::SheetWriter) or by another producer.
//! The payload layout is taken from the BOF record; records the reader does
//! not model are skipped. Damage confined to one cell (an unreadable label
//! string, a column past the sheet) is reported as a [`DecodeWarning`] and
//! the rest of the sheet still loads. Framing errors abort the read.

use crate::common::binary;
use crate::xls::error::XlsResult;
use crate::xls::page_breaks::PageBreaks;
use crate::xls::range::CellArea;
use crate::xls::records::{FormatVersion, Record, RecordCursor, types};
use crate::xls::settings::Settings;
use crate::xls::sheet::{
    Cell, CellValue, ColumnInfo, MAX_COLUMNS, MAX_OUTLINE_LEVEL, MergedRange, StyleHandle,
    Worksheet,
};
use crate::xls::strings::{decode_legacy, decode_long_form};
use crate::xls::writer::{colinfo_flags, row_flags};

/// Problem in one record that did not stop the sheet from loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeWarning {
    pub record_type: u16,
    /// Offset of the record header in the stream
    pub offset: usize,
    pub message: String,
}

/// A sheet read back from a record stream.
#[derive(Debug)]
pub struct LoadedSheet {
    pub sheet: Worksheet,
    pub warnings: Vec<DecodeWarning>,
}

/// Reads a worksheet substream into a [`Worksheet`].
#[derive(Debug, Clone, Default)]
pub struct SheetReader {
    settings: Settings,
}

/// Parsing state for one substream
struct SheetState {
    sheet: Worksheet,
    version: FormatVersion,
    codepage: u16,
    bounds: Option<(u32, u32)>,
    warnings: Vec<DecodeWarning>,
}

impl SheetState {
    fn warn(&mut self, record: &Record, message: impl Into<String>) {
        let message = message.into();
        log::warn!(
            "{}: record 0x{:04X} at offset {}: {}",
            self.sheet.name(),
            record.record_type(),
            record.offset,
            message
        );
        self.warnings.push(DecodeWarning {
            record_type: record.record_type(),
            offset: record.offset,
            message,
        });
    }
}

impl SheetReader {
    /// Reader using `settings` for the sheet it builds.
    ///
    /// `settings.format_version` is only used when the stream has no
    /// recognizable BOF record.
    pub fn new(settings: Settings) -> Self {
        SheetReader { settings }
    }

    /// Read a substream held in memory.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use loquat::xls::sheet::{Cell, Worksheet};
    /// use loquat::xls::{Settings, SheetReader, SheetWriter};
    ///
    /// let mut sheet = Worksheet::new("Data", Settings::default());
    /// sheet.add_cell(1, 2, Cell::label("total")).unwrap();
    /// let bytes = SheetWriter::new(&sheet).to_bytes().unwrap();
    ///
    /// let loaded = SheetReader::default().read("Data", &bytes).unwrap();
    /// assert!(loaded.warnings.is_empty());
    /// assert_eq!(loaded.sheet.cell(1, 2), Some(&Cell::label("total")));
    /// ```
    pub fn read(&self, name: &str, bytes: &[u8]) -> XlsResult<LoadedSheet> {
        self.read_records(name, RecordCursor::new(bytes))
    }

    /// Read a substream from already framed records, stopping at EOF.
    pub fn read_records<I>(&self, name: &str, records: I) -> XlsResult<LoadedSheet>
    where
        I: IntoIterator<Item = XlsResult<Record>>,
    {
        let mut state = SheetState {
            sheet: Worksheet::new(name, self.settings.clone()),
            version: self.settings.format_version,
            codepage: self.settings.codepage,
            bounds: None,
            warnings: Vec::new(),
        };

        let mut saw_eof = false;
        for record in records {
            let record = record?;
            if record.record_type() == types::EOF {
                saw_eof = true;
                break;
            }
            Self::apply_record(&mut state, &record)
                .map_err(|e| e.in_record(record.record_type(), record.offset))?;
        }

        if !saw_eof {
            log::debug!("{name}: substream ended without EOF");
        }
        if let Some((num_rows, num_columns)) = state.bounds {
            state.sheet.extend_bounds(num_rows, num_columns);
        }
        state.sheet.set_format_version(state.version);

        Ok(LoadedSheet {
            sheet: state.sheet,
            warnings: state.warnings,
        })
    }

    fn apply_record(state: &mut SheetState, record: &Record) -> XlsResult<()> {
        let data = &record.data;
        match record.record_type() {
            types::BOF => {
                let version = binary::read_u16_le(data, 0)?;
                match FormatVersion::from_bof_version(version) {
                    Some(detected) => state.version = detected,
                    None => state.warn(
                        record,
                        format!(
                            "unknown BOF version 0x{version:04X}, reading as {:?}",
                            state.version
                        ),
                    ),
                }
            },
            types::DIMENSIONS => {
                let (num_rows, num_columns) = match state.version {
                    FormatVersion::Current => (
                        binary::read_u32_le(data, 4)?,
                        binary::read_u16_le(data, 10)? as u32,
                    ),
                    FormatVersion::Legacy => (
                        binary::read_u16_le(data, 2)? as u32,
                        binary::read_u16_le(data, 6)? as u32,
                    ),
                };
                state.bounds = Some((num_rows, num_columns));
            },
            types::ROW => Self::read_row(state, data)?,
            types::COLINFO => Self::read_colinfo(state, record)?,
            types::BLANK | types::NUMBER | types::LABEL | types::BOOLERR => {
                Self::read_cell(state, record)?
            },
            types::HORIZONTALPAGEBREAKS | types::VERTICALPAGEBREAKS => {
                let breaks = PageBreaks::from_record(record, state.version)?;
                state.sheet.set_page_breaks(breaks);
            },
            types::MERGEDCELLS => {
                let count = binary::read_u16_le(data, 0)? as usize;
                for i in 0..count {
                    let pos = 2 + i * 8;
                    let first_row = binary::read_u16_le(data, pos)? as u32;
                    let last_row = binary::read_u16_le(data, pos + 2)? as u32;
                    let first_col = binary::read_u16_le(data, pos + 4)? as u32;
                    let last_col = binary::read_u16_le(data, pos + 6)? as u32;
                    let area = CellArea::new(first_row, first_col, last_row, last_col);
                    state.sheet.add_merged_range(MergedRange::new(area));
                }
            },
            other => log::debug!("skipping record 0x{other:04X} at offset {}", record.offset),
        }
        Ok(())
    }

    fn read_row(state: &mut SheetState, data: &[u8]) -> XlsResult<()> {
        let index = binary::read_u16_le(data, 0)? as u32;
        let height = binary::read_u16_le(data, 6)?;
        let flags = binary::read_u16_le(data, 12)?;
        let xf = binary::read_u16_le(data, 14)?;

        state.sheet.restore_row(index, |row| {
            row.height = (flags & row_flags::CUSTOM_HEIGHT != 0).then_some(height & 0x7FFF);
            row.hidden = flags & row_flags::HIDDEN != 0;
            row.collapsed = flags & row_flags::COLLAPSED != 0;
            row.outline_level =
                ((flags & row_flags::OUTLINE_LEVEL_MASK) as u8).min(MAX_OUTLINE_LEVEL);
            row.style = (flags & row_flags::HAS_STYLE != 0).then_some(StyleHandle(xf & 0x0FFF));
        })
    }

    fn read_colinfo(state: &mut SheetState, record: &Record) -> XlsResult<()> {
        let data = &record.data;
        let first = binary::read_u16_le(data, 0)? as u32;
        let last = binary::read_u16_le(data, 2)? as u32;
        let width = binary::read_u16_le(data, 4)?;
        let xf = binary::read_u16_le(data, 6)?;
        let options = binary::read_u16_le(data, 8)?;

        if first >= MAX_COLUMNS {
            state.warn(record, format!("column {first} is past the last column"));
            return Ok(());
        }

        let level = (options & colinfo_flags::OUTLINE_LEVEL_MASK) >> colinfo_flags::OUTLINE_SHIFT;
        for column in first..=last.min(MAX_COLUMNS - 1) {
            state.sheet.restore_column_info(ColumnInfo {
                column,
                width,
                style: StyleHandle(xf),
                hidden: options & colinfo_flags::HIDDEN != 0,
                outline_level: level as u8,
                collapsed: options & colinfo_flags::COLLAPSED != 0,
            });
        }
        Ok(())
    }

    fn read_cell(state: &mut SheetState, record: &Record) -> XlsResult<()> {
        let data = &record.data;
        let row = binary::read_u16_le(data, 0)? as u32;
        let col = binary::read_u16_le(data, 2)? as u32;
        let style = StyleHandle(binary::read_u16_le(data, 4)?);

        let value = match record.record_type() {
            types::NUMBER => CellValue::Number(binary::read_f64_le(data, 6)?),
            types::BOOLERR => {
                let value = binary::read_u8(data, 6)?;
                if binary::read_u8(data, 7)? == 0 {
                    CellValue::Boolean(value != 0)
                } else {
                    CellValue::Error(value)
                }
            },
            types::LABEL => {
                let text = match state.version {
                    FormatVersion::Current => decode_long_form(data, 6).map(|s| s.text),
                    FormatVersion::Legacy => decode_legacy(data, 6, state.codepage).map(|(s, _)| s),
                };
                match text {
                    Ok(text) => CellValue::Label(text),
                    Err(e) => {
                        state.warn(record, format!("unreadable label at ({row}, {col}): {e}"));
                        CellValue::Label(String::new())
                    },
                }
            },
            _ => CellValue::Blank,
        };

        if col >= MAX_COLUMNS {
            state.warn(record, format!("cell ({row}, {col}) is past the last column"));
            return Ok(());
        }
        state.sheet.add_cell(row, col, Cell::new(value).with_style(style))?;
        Ok(())
    }
}
