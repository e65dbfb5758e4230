//! Loquat - BIFF (.xls) worksheet records and structural editing
//!
//! Loquat reads and writes the record stream of a legacy Excel worksheet
//! and keeps an editable model of it. Inserting or removing a row or a
//! column moves cells, merged ranges, hyperlinks, page breaks, data
//! validations, conditional formats, column formatting and drawings
//! together, and tells an optional formula collaborator about the move.
//!
//! # Example
//!
//! ```rust
//! use loquat::xls::sheet::{Cell, Worksheet};
//! use loquat::xls::{Settings, SheetReader, SheetWriter};
//!
//! # fn main() -> Result<(), loquat::xls::XlsError> {
//! let mut sheet = Worksheet::new("Sheet1", Settings::default());
//! sheet.add_cell(0, 0, Cell::label("Region"))?;
//! sheet.add_cell(1, 0, Cell::number(12.5))?;
//! sheet.merge_cells(0, 0, 0, 3)?;
//! sheet.add_row_page_break(1);
//!
//! // Push everything from row 1 down by one.
//! sheet.insert_row(1)?;
//! assert_eq!(sheet.cell(2, 0), Some(&Cell::number(12.5)));
//! assert_eq!(sheet.row_page_breaks().anchors(), vec![2]);
//!
//! let bytes = SheetWriter::new(&sheet).to_bytes()?;
//! let loaded = SheetReader::default().read("Sheet1", &bytes)?;
//! assert_eq!(loaded.sheet.cell(2, 0), Some(&Cell::number(12.5)));
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod xls;
