//! BIFF (.xls) worksheet records and the worksheet mutation engine
//!
//! This module covers one worksheet substream of a legacy Excel file: the
//! record framing, the string encodings used inside record payloads, page
//! break records, and an in-memory [`Worksheet`] whose rows and columns can
//! be inserted and removed while every coordinate-addressed structure on
//! the sheet (cells, merged ranges, hyperlinks, page breaks, validations,
//! conditional formats, column formatting, drawings) follows the edit.
//!
//! Both BIFF8 (Excel 97 and later) and the older BIFF5/BIFF7 payload
//! layouts are read and written; see [`FormatVersion`].

/// Error types
pub mod error;

/// Manual page break records
pub mod page_breaks;

/// Coordinate ranges and cell areas
pub mod range;

/// Substream reader
pub mod reader;

/// Record framing
pub mod records;

/// Reader, writer and editing settings
pub mod settings;

/// Worksheet model
pub mod sheet;

/// Row/column pivots and shiftable collections
pub mod shift;

/// String encodings
pub mod strings;

/// Substream writer
pub mod writer;

pub use error::{XlsError, XlsResult};
pub use page_breaks::PageBreaks;
pub use range::{CellArea, CoordinateRange};
pub use reader::{DecodeWarning, LoadedSheet, SheetReader};
pub use records::{FormatVersion, Record, RecordCursor, RecordHeader, RecordIter};
pub use settings::{Settings, StringMode};
pub use sheet::Worksheet;
pub use shift::{Axis, ShiftKind, ShiftPivot};
pub use strings::StringCodec;
pub use writer::SheetWriter;
