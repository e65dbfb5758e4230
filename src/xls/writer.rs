//! Worksheet substream writer
//!
//! Turns a settled [`Worksheet`] into the records of one worksheet
//! substream:
//!
//! ```text
//! BOF, [HORIZONTALPAGEBREAKS], [VERTICALPAGEBREAKS], COLINFO*, DIMENSIONS,
//! ROW*, (BLANK | NUMBER | LABEL | BOOLERR)*, [MERGEDCELLS*], EOF
//! ```
//!
//! Page break records are omitted when the list is empty. Hyperlink,
//! data-validation and conditional-format records are not written: their
//! payloads carry formulas and monikers owned by other components.

use std::io::Write;

use crate::xls::error::{XlsError, XlsResult};
use crate::xls::records::{FormatVersion, MAX_RECORD_DATA_LEN, Record, types};
use crate::xls::sheet::{
    Cell, CellValue, ColumnInfo, DEFAULT_ROW_HEIGHT, MergedRange, RowRecord, StyleHandle,
    Worksheet,
};
use crate::xls::strings::{StringCodec, encode_legacy, encode_long_form};

/// Most ranges one MERGEDCELLS record may carry
pub const MAX_MERGED_RANGES_PER_RECORD: usize = 1027;

/// Build identifier written into BOF
const BOF_BUILD: u16 = 0x0DBB;
/// Build year written into BOF
const BOF_YEAR: u16 = 0x07CC;

/// Bytes in front of the string in a LABEL record: row, column, XF
const LABEL_HEADER_LEN: usize = 6;

pub(crate) mod row_flags {
    pub const OUTLINE_LEVEL_MASK: u16 = 0x0007;
    pub const COLLAPSED: u16 = 0x0010;
    pub const HIDDEN: u16 = 0x0020;
    pub const CUSTOM_HEIGHT: u16 = 0x0040;
    pub const HAS_STYLE: u16 = 0x0080;
    /// Reserved bit that must always be set
    pub const RESERVED: u16 = 0x0100;
}

pub(crate) mod colinfo_flags {
    pub const HIDDEN: u16 = 0x0001;
    pub const OUTLINE_SHIFT: u16 = 8;
    pub const OUTLINE_LEVEL_MASK: u16 = 0x0700;
    pub const COLLAPSED: u16 = 0x1000;
}

fn row_u16(row: u32, record: &str) -> XlsResult<u16> {
    u16::try_from(row).map_err(|_| {
        XlsError::InvalidData(format!(
            "Row index {row} exceeds BIFF limit 65535 for {record} record"
        ))
    })
}

fn col_u16(col: u32, record: &str) -> XlsResult<u16> {
    u16::try_from(col).map_err(|_| {
        XlsError::InvalidData(format!(
            "Column index {col} exceeds BIFF limit 65535 for {record} record"
        ))
    })
}

/// BOF record opening a worksheet substream
///
/// Record type: 0x0809
pub fn bof_record(version: FormatVersion) -> Record {
    let mut data = Vec::with_capacity(16);
    data.extend_from_slice(&version.bof_version().to_le_bytes());
    data.extend_from_slice(&types::BOF_WORKSHEET.to_le_bytes());
    data.extend_from_slice(&BOF_BUILD.to_le_bytes());
    data.extend_from_slice(&BOF_YEAR.to_le_bytes());
    if version == FormatVersion::Current {
        // File history flags, lowest BIFF version
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0x0000_0006u32.to_le_bytes());
    }
    Record::new(types::BOF, data)
}

/// DIMENSIONS record: first used row/column and one past the last
///
/// Record type: 0x0200
pub fn dimensions_record(
    version: FormatVersion,
    first_row: u32,
    last_row: u32,
    first_col: u32,
    last_col: u32,
) -> XlsResult<Record> {
    let mut data = Vec::with_capacity(14);
    match version {
        FormatVersion::Current => {
            data.extend_from_slice(&first_row.to_le_bytes());
            data.extend_from_slice(&last_row.to_le_bytes());
        },
        FormatVersion::Legacy => {
            // BIFF7 holds 16-bit row bounds; 65536 clamps to the field.
            data.extend_from_slice(&row_u16(first_row, "DIMENSIONS")?.to_le_bytes());
            data.extend_from_slice(&(last_row.min(u16::MAX as u32) as u16).to_le_bytes());
        },
    }
    data.extend_from_slice(&col_u16(first_col, "DIMENSIONS")?.to_le_bytes());
    data.extend_from_slice(&col_u16(last_col, "DIMENSIONS")?.to_le_bytes());

    // Reserved (must be 0)
    data.extend_from_slice(&0u16.to_le_bytes());
    Ok(Record::new(types::DIMENSIONS, data))
}

/// COLINFO record for a single column
///
/// Record type: 0x007D
pub fn colinfo_record(info: &ColumnInfo) -> XlsResult<Record> {
    let col = col_u16(info.column, "COLINFO")?;
    let mut options = (u16::from(info.outline_level) << colinfo_flags::OUTLINE_SHIFT)
        & colinfo_flags::OUTLINE_LEVEL_MASK;
    if info.hidden {
        options |= colinfo_flags::HIDDEN;
    }
    if info.collapsed {
        options |= colinfo_flags::COLLAPSED;
    }

    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&col.to_le_bytes());
    data.extend_from_slice(&col.to_le_bytes());
    data.extend_from_slice(&info.width.to_le_bytes());
    data.extend_from_slice(&info.style.index().to_le_bytes());
    data.extend_from_slice(&options.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    Ok(Record::new(types::COLINFO, data))
}

/// ROW record
///
/// Record type: 0x0208
pub fn row_record(row: &RowRecord) -> XlsResult<Record> {
    let index = row_u16(row.index(), "ROW")?;
    let (first_col, last_col) = row.column_span().unwrap_or((0, 0));

    let mut flags = row_flags::RESERVED
        | (u16::from(row.outline_level) & row_flags::OUTLINE_LEVEL_MASK);
    if row.collapsed {
        flags |= row_flags::COLLAPSED;
    }
    if row.hidden {
        flags |= row_flags::HIDDEN;
    }
    if row.height.is_some() {
        flags |= row_flags::CUSTOM_HEIGHT;
    }
    if row.style.is_some() {
        flags |= row_flags::HAS_STYLE;
    }
    let xf = row.style.unwrap_or(StyleHandle::DEFAULT).index() & 0x0FFF;

    let mut data = Vec::with_capacity(16);
    data.extend_from_slice(&index.to_le_bytes());
    data.extend_from_slice(&col_u16(first_col, "ROW")?.to_le_bytes());
    data.extend_from_slice(&col_u16(last_col, "ROW")?.to_le_bytes());
    data.extend_from_slice(&(row.height.unwrap_or(DEFAULT_ROW_HEIGHT) & 0x7FFF).to_le_bytes());
    // Reserved, unused
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&flags.to_le_bytes());
    data.extend_from_slice(&xf.to_le_bytes());
    Ok(Record::new(types::ROW, data))
}

fn cell_header(row: u32, col: u32, style: StyleHandle, record: &str) -> XlsResult<Vec<u8>> {
    let mut data = Vec::with_capacity(16);
    data.extend_from_slice(&row_u16(row, record)?.to_le_bytes());
    data.extend_from_slice(&col_u16(col, record)?.to_le_bytes());
    data.extend_from_slice(&style.index().to_le_bytes());
    Ok(data)
}

/// MERGEDCELLS records, split every [`MAX_MERGED_RANGES_PER_RECORD`] ranges
///
/// Record type: 0x00E5
pub fn mergedcells_records(ranges: &[MergedRange]) -> XlsResult<Vec<Record>> {
    let mut records = Vec::with_capacity(ranges.len().div_ceil(MAX_MERGED_RANGES_PER_RECORD));

    for chunk in ranges.chunks(MAX_MERGED_RANGES_PER_RECORD) {
        let mut data = Vec::with_capacity(2 + chunk.len() * 8);
        data.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
        for range in chunk {
            let area = range.area;
            data.extend_from_slice(&row_u16(area.first_row, "MERGEDCELLS")?.to_le_bytes());
            data.extend_from_slice(&row_u16(area.last_row, "MERGEDCELLS")?.to_le_bytes());
            data.extend_from_slice(&col_u16(area.first_col, "MERGEDCELLS")?.to_le_bytes());
            data.extend_from_slice(&col_u16(area.last_col, "MERGEDCELLS")?.to_le_bytes());
        }
        records.push(Record::new(types::MERGEDCELLS, data));
    }

    Ok(records)
}

/// Writes one worksheet substream.
#[derive(Debug, Clone, Copy)]
pub struct SheetWriter<'a> {
    sheet: &'a Worksheet,
    version: FormatVersion,
    codec: StringCodec,
}

impl<'a> SheetWriter<'a> {
    /// Writer using the sheet's own settings.
    pub fn new(sheet: &'a Worksheet) -> Self {
        let settings = sheet.settings();
        SheetWriter {
            sheet,
            version: settings.format_version,
            codec: StringCodec::new(settings),
        }
    }

    /// Override the payload layout.
    pub fn with_version(mut self, version: FormatVersion) -> Self {
        self.version = version;
        self
    }

    /// The substream as records, in write order.
    pub fn records(&self) -> XlsResult<Vec<Record>> {
        let sheet = self.sheet;
        let mut records = vec![bof_record(self.version)];

        for breaks in [sheet.row_page_breaks(), sheet.column_page_breaks()] {
            if !breaks.is_empty() {
                records.push(breaks.to_record(self.version)?);
            }
        }

        let mut infos: Vec<&ColumnInfo> = sheet.column_infos().iter().collect();
        infos.sort_by_key(|info| info.column);
        for info in infos {
            records.push(colinfo_record(info)?);
        }

        records.push(self.dimensions()?);

        for row in sheet.rows() {
            records.push(row_record(row)?);
        }
        for row in sheet.rows() {
            for (col, cell) in row.cells() {
                records.push(self.cell_record(row.index(), col, cell)?);
            }
        }

        if !sheet.merged_cells().is_empty() {
            match self.version {
                FormatVersion::Current => {
                    records.extend(mergedcells_records(sheet.merged_cells())?);
                },
                FormatVersion::Legacy => log::debug!(
                    "{}: {} merged ranges not written, BIFF7 has no MERGEDCELLS",
                    sheet.name(),
                    sheet.merged_cells().len()
                ),
            }
        }

        records.push(Record::new(types::EOF, Vec::new()));
        Ok(records)
    }

    /// Serialize the substream into `writer`, returning the bytes written.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> XlsResult<usize> {
        let mut written = 0;
        for record in self.records()? {
            record.write_to(writer)?;
            written += record.encoded_len();
        }
        Ok(written)
    }

    /// Serialize the substream into a new buffer.
    pub fn to_bytes(&self) -> XlsResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    fn dimensions(&self) -> XlsResult<Record> {
        let sheet = self.sheet;
        let first_row = sheet
            .rows()
            .find(|row| row.cell_count() > 0)
            .map_or(0, RowRecord::index);
        let first_col = sheet
            .rows()
            .filter_map(|row| row.column_span())
            .map(|(first, _)| first)
            .min()
            .unwrap_or(0);

        dimensions_record(
            self.version,
            first_row,
            sheet.num_rows(),
            first_col,
            sheet.num_columns(),
        )
    }

    fn cell_record(&self, row: u32, col: u32, cell: &Cell) -> XlsResult<Record> {
        match &cell.value {
            CellValue::Blank => Ok(Record::new(
                types::BLANK,
                cell_header(row, col, cell.style, "BLANK")?,
            )),
            CellValue::Number(value) => {
                let mut data = cell_header(row, col, cell.style, "NUMBER")?;
                data.extend_from_slice(&value.to_le_bytes());
                Ok(Record::new(types::NUMBER, data))
            },
            CellValue::Boolean(value) => {
                let mut data = cell_header(row, col, cell.style, "BOOLERR")?;
                data.extend_from_slice(&[u8::from(*value), 0]);
                Ok(Record::new(types::BOOLERR, data))
            },
            CellValue::Error(code) => {
                let mut data = cell_header(row, col, cell.style, "BOOLERR")?;
                data.extend_from_slice(&[*code, 1]);
                Ok(Record::new(types::BOOLERR, data))
            },
            CellValue::Label(text) => {
                let mut data = cell_header(row, col, cell.style, "LABEL")?;
                data.extend_from_slice(&self.label_string(text)?);
                Ok(Record::new(types::LABEL, data))
            },
        }
    }

    /// LABEL string, degraded to empty text when it cannot be written.
    fn label_string(&self, text: &str) -> XlsResult<Vec<u8>> {
        let max = MAX_RECORD_DATA_LEN - LABEL_HEADER_LEN;
        let limited = |encoded: XlsResult<Vec<u8>>| {
            encoded.and_then(|bytes| {
                if bytes.len() > max {
                    Err(XlsError::Encoding(format!(
                        "label of {} bytes does not fit in one LABEL record",
                        bytes.len()
                    )))
                } else {
                    Ok(bytes)
                }
            })
        };

        match self.version {
            FormatVersion::Current => self.codec.or_empty(
                limited(encode_long_form(text, self.codec.mode())),
                || encode_long_form("", self.codec.mode()),
            ),
            FormatVersion::Legacy => self.codec.or_empty(
                limited(encode_legacy(text, self.codec.codepage())),
                || encode_legacy("", self.codec.codepage()),
            ),
        }
    }
}
