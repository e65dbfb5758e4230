//! Worksheet model and the row/column mutation engine.
//!
//! A [`Worksheet`] keeps every coordinate-addressed structure of a sheet in
//! its own collection: the row store, page breaks, merged ranges,
//! hyperlinks, data validations, conditional formats, column formatting, the
//! autosized-column set and floating drawings. None of them knows where row
//! or column `n` went after an edit. Instead each structural edit becomes a
//! single [`ShiftPivot`] which the sheet replays on every collection in a
//! fixed order (see [`Worksheet::insert_row`]).
//!
//! # Examples
//!
//! ```rust
//! use loquat::xls::sheet::{Cell, Worksheet};
//! use loquat::xls::Settings;
//!
//! let mut sheet = Worksheet::new("Sheet1", Settings::default());
//! sheet.add_cell(0, 0, Cell::label("header")).unwrap();
//! sheet.add_cell(10, 0, Cell::number(42.0)).unwrap();
//! sheet.add_row_page_break(5);
//!
//! sheet.insert_row(3).unwrap();
//! assert_eq!(sheet.row_page_breaks().anchors(), vec![6]);
//! assert_eq!(sheet.cell(11, 0), Some(&Cell::number(42.0)));
//! ```

mod collab;
mod column;
mod regions;
mod row;


pub use collab::{
    CellStyle, FIRST_USER_XF, FormulaAdjuster, HorizontalAlignment, MAX_XF_RECORDS,
    NoFormulaAdjust, StyleHandle, StyleRegistry, StyleTable,
};
pub use column::{CellView, ColumnInfo, ColumnSet, DEFAULT_COLUMN_WIDTH};
pub use regions::{
    ConditionalFormat, DataValidation, Drawing, Hyperlink, MergedRange, ValidationOperator,
    ValidationType,
};
pub use row::{Cell, CellValue, DEFAULT_ROW_HEIGHT, MAX_OUTLINE_LEVEL, RowRecord, RowStore};

use crate::xls::error::{XlsError, XlsResult};
use crate::xls::page_breaks::PageBreaks;
use crate::xls::range::CellArea;
use crate::xls::records::FormatVersion;
use crate::xls::settings::Settings;
use crate::xls::shift::{Axis, RegionList, ShiftKind, ShiftPivot, Shiftable};

/// Row ceiling of a BIFF8 sheet
pub const MAX_ROWS: u32 = 65_536;

/// Column ceiling of a BIFF8 sheet
pub const MAX_COLUMNS: u32 = 256;

/// In-memory worksheet.
///
/// `num_rows` and `num_columns` are one past the largest occupied index.
/// The sheet assumes exclusive access for the duration of each call; share
/// it across threads only behind external synchronization.
#[derive(Debug)]
pub struct Worksheet {
    name: String,
    settings: Settings,
    rows: RowStore,
    num_rows: u32,
    num_columns: u32,
    row_breaks: PageBreaks,
    column_breaks: PageBreaks,
    merged: RegionList<MergedRange>,
    hyperlinks: RegionList<Hyperlink>,
    validations: RegionList<DataValidation>,
    conditional_formats: RegionList<ConditionalFormat>,
    column_infos: RegionList<ColumnInfo>,
    autosized: ColumnSet,
    drawings: RegionList<Drawing>,
    max_row_outline_level: u8,
    max_column_outline_level: u8,
    formula_adjuster: Box<dyn FormulaAdjuster>,
}

fn check_row(row: u32) -> XlsResult<()> {
    if row >= MAX_ROWS {
        return Err(XlsError::CapacityExceeded {
            axis: Axis::Row,
            limit: MAX_ROWS,
        });
    }
    Ok(())
}

fn check_column(col: u32) -> XlsResult<()> {
    if col >= MAX_COLUMNS {
        return Err(XlsError::CapacityExceeded {
            axis: Axis::Column,
            limit: MAX_COLUMNS,
        });
    }
    Ok(())
}

impl Worksheet {
    pub fn new(name: impl Into<String>, settings: Settings) -> Self {
        Worksheet {
            name: name.into(),
            settings,
            rows: RowStore::new(),
            num_rows: 0,
            num_columns: 0,
            row_breaks: PageBreaks::new(Axis::Row),
            column_breaks: PageBreaks::new(Axis::Column),
            merged: RegionList::new(),
            hyperlinks: RegionList::new(),
            validations: RegionList::new(),
            conditional_formats: RegionList::new(),
            column_infos: RegionList::new(),
            autosized: ColumnSet::new(),
            drawings: RegionList::new(),
            max_row_outline_level: 0,
            max_column_outline_level: 0,
            formula_adjuster: Box::new(NoFormulaAdjust),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Install the collaborator notified of row/column pivots.
    pub fn set_formula_adjuster(&mut self, adjuster: Box<dyn FormulaAdjuster>) {
        self.formula_adjuster = adjuster;
    }

    #[inline]
    pub fn num_rows(&self) -> u32 {
        self.num_rows
    }

    #[inline]
    pub fn num_columns(&self) -> u32 {
        self.num_columns
    }

    fn grow_to(&mut self, row: u32, col: Option<u32>) {
        self.num_rows = self.num_rows.max(row + 1);
        if let Some(col) = col {
            self.num_columns = self.num_columns.max(col + 1);
        }
    }

    // ----- Cells -----

    /// Place `cell` at `(row, col)`, replacing any cell already there.
    pub fn add_cell(&mut self, row: u32, col: u32, cell: Cell) -> XlsResult<Option<Cell>> {
        check_row(row)?;
        check_column(col)?;

        let previous = self.rows.get_or_create(row).set_cell(col, cell);
        self.grow_to(row, Some(col));
        Ok(previous)
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.rows.get(row)?.cell(col)
    }

    /// Remove the cell at `(row, col)`. Sheet bounds do not shrink.
    pub fn remove_cell(&mut self, row: u32, col: u32) -> Option<Cell> {
        self.rows.get_mut(row)?.take_cell(col)
    }

    pub fn row(&self, row: u32) -> Option<&RowRecord> {
        self.rows.get(row)
    }

    /// Existing rows in index order
    pub fn rows(&self) -> impl Iterator<Item = &RowRecord> {
        self.rows.iter()
    }

    // ----- Structural edits -----

    /// Replay `pivot` on every coordinate-addressed collection.
    ///
    /// Order: row store, hyperlinks, data validations, merged ranges, row
    /// breaks, column breaks, conditional formats, column formatting,
    /// autosized columns, drawings. Collections ignore pivots along an axis
    /// they are not indexed by.
    fn apply_pivot(&mut self, pivot: ShiftPivot) {
        let collections: [&mut dyn Shiftable; 10] = [
            &mut self.rows,
            &mut self.hyperlinks,
            &mut self.validations,
            &mut self.merged,
            &mut self.row_breaks,
            &mut self.column_breaks,
            &mut self.conditional_formats,
            &mut self.column_infos,
            &mut self.autosized,
            &mut self.drawings,
        ];
        for collection in collections {
            collection.apply_shift(pivot);
        }
    }

    fn notify_adjuster(&mut self, pivot: ShiftPivot) {
        if !self.settings.formula_adjust {
            return;
        }

        let adjuster = &mut self.formula_adjuster;
        match (pivot.axis, pivot.kind) {
            (Axis::Row, ShiftKind::Insert) => adjuster.row_inserted(&self.name, pivot.index),
            (Axis::Row, ShiftKind::Remove) => adjuster.row_removed(&self.name, pivot.index),
            (Axis::Column, ShiftKind::Insert) => {
                adjuster.column_inserted(&self.name, pivot.index)
            },
            (Axis::Column, ShiftKind::Remove) => adjuster.column_removed(&self.name, pivot.index),
        }
    }

    /// Insert a blank row at `row`, moving everything at or below it down.
    ///
    /// Fails with [`XlsError::CapacityExceeded`] without touching the sheet
    /// when it already has [`MAX_ROWS`] rows. A row at or past `num_rows`
    /// has nothing below it to move, so the call succeeds without changes.
    ///
    /// Otherwise the pivot is replayed on the row store, hyperlinks, data
    /// validations, merged ranges, page breaks, conditional formats, column
    /// formatting, autosized columns and drawings, in that order. The
    /// formula adjuster is then notified if `Settings::formula_adjust` is
    /// on, and `num_rows` grows by one.
    pub fn insert_row(&mut self, row: u32) -> XlsResult<()> {
        if self.num_rows >= MAX_ROWS {
            return Err(XlsError::CapacityExceeded {
                axis: Axis::Row,
                limit: MAX_ROWS,
            });
        }
        if row >= self.num_rows {
            return Ok(());
        }

        let pivot = ShiftPivot::insert_row(row);
        self.apply_pivot(pivot);
        self.notify_adjuster(pivot);
        self.num_rows += 1;

        log::debug!("{}: inserted row {row}, now {} rows", self.name, self.num_rows);
        Ok(())
    }

    /// Remove row `row`, moving everything below it up.
    ///
    /// Regions that covered only this row are deleted. A row past the end
    /// of the sheet changes nothing locally but is still forwarded to the
    /// formula adjuster, so references to it can be fixed up.
    pub fn remove_row(&mut self, row: u32) {
        let pivot = ShiftPivot::remove_row(row);
        if row >= self.num_rows {
            self.notify_adjuster(pivot);
            return;
        }

        self.apply_pivot(pivot);
        self.notify_adjuster(pivot);
        self.num_rows -= 1;

        log::debug!("{}: removed row {row}, now {} rows", self.name, self.num_rows);
    }

    /// Insert a blank column at `col`, moving everything at or right of it.
    ///
    /// A column at or past `num_columns` is a no-op. Unlike rows, this is
    /// checked before the capacity: only an in-range insert into a full
    /// sheet fails with [`XlsError::CapacityExceeded`].
    pub fn insert_column(&mut self, col: u32) -> XlsResult<()> {
        if col >= self.num_columns {
            return Ok(());
        }
        if self.num_columns >= MAX_COLUMNS {
            return Err(XlsError::CapacityExceeded {
                axis: Axis::Column,
                limit: MAX_COLUMNS,
            });
        }

        let pivot = ShiftPivot::insert_column(col);
        self.apply_pivot(pivot);
        self.notify_adjuster(pivot);
        self.num_columns += 1;

        log::debug!("{}: inserted column {col}, now {} columns", self.name, self.num_columns);
        Ok(())
    }

    /// Remove column `col`, moving everything right of it left.
    ///
    /// A column at or past `num_columns` is a no-op. Unlike
    /// [`Worksheet::remove_row`], such a pivot is not forwarded to the
    /// formula adjuster either.
    pub fn remove_column(&mut self, col: u32) {
        if col >= self.num_columns {
            return;
        }

        let pivot = ShiftPivot::remove_column(col);
        self.apply_pivot(pivot);
        self.notify_adjuster(pivot);
        self.num_columns -= 1;

        log::debug!("{}: removed column {col}, now {} columns", self.name, self.num_columns);
    }

    // ----- Page breaks -----

    /// Force a page break above `row`. A break already there is kept.
    pub fn add_row_page_break(&mut self, row: u32) -> bool {
        self.row_breaks.add_break(row)
    }

    /// Force a page break left of `col`. A break already there is kept.
    pub fn add_column_page_break(&mut self, col: u32) -> bool {
        self.column_breaks.add_break(col)
    }

    pub fn row_page_breaks(&self) -> &PageBreaks {
        &self.row_breaks
    }

    pub fn column_page_breaks(&self) -> &PageBreaks {
        &self.column_breaks
    }

    pub fn clear_row_page_breaks(&mut self) {
        self.row_breaks.clear();
    }

    pub fn clear_column_page_breaks(&mut self) {
        self.column_breaks.clear();
    }

    pub(crate) fn set_page_breaks(&mut self, breaks: PageBreaks) {
        match breaks.axis() {
            Axis::Row => self.row_breaks = breaks,
            Axis::Column => self.column_breaks = breaks,
        }
    }

    // ----- Merged cells -----

    /// Merge the block between two corners.
    ///
    /// Corners given in the wrong order are swapped, with a warning. When
    /// the block reaches past the current bounds a blank cell is placed at
    /// its bottom-right corner so the sheet covers it. A block whose
    /// top-left cell already starts a merged range is not added again.
    pub fn merge_cells(
        &mut self,
        first_row: u32,
        first_col: u32,
        last_row: u32,
        last_col: u32,
    ) -> XlsResult<CellArea> {
        if last_row < first_row || last_col < first_col {
            log::warn!(
                "merge corners ({first_row}, {first_col}) and ({last_row}, {last_col}) are inverted"
            );
        }
        let area = CellArea::new(first_row, first_col, last_row, last_col);

        if area.last_row >= self.num_rows || area.last_col >= self.num_columns {
            check_row(area.last_row)?;
            check_column(area.last_col)?;
            if self.cell(area.last_row, area.last_col).is_none() {
                self.add_cell(area.last_row, area.last_col, Cell::blank())?;
            }
        }

        self.merged.add(MergedRange::new(area));
        Ok(area)
    }

    /// Unmerge a block previously returned by [`Worksheet::merge_cells`].
    pub fn unmerge_cells(&mut self, area: &CellArea) -> bool {
        match self.merged.get(&area.top_left()) {
            Some(range) if range.area == *area => {
                self.merged.remove(&area.top_left());
                true
            },
            _ => false,
        }
    }

    pub fn merged_cells(&self) -> &[MergedRange] {
        self.merged.as_slice()
    }

    pub(crate) fn add_merged_range(&mut self, range: MergedRange) {
        self.merged.add(range);
    }

    // ----- Hyperlinks, validations, conditional formats, drawings -----

    pub fn add_hyperlink(&mut self, link: Hyperlink) -> bool {
        self.hyperlinks.add(link)
    }

    /// Remove the hyperlink whose range starts at `(row, col)`.
    pub fn remove_hyperlink(&mut self, row: u32, col: u32) -> Option<Hyperlink> {
        self.hyperlinks.remove(&(row, col))
    }

    pub fn hyperlinks(&self) -> &[Hyperlink] {
        self.hyperlinks.as_slice()
    }

    pub fn add_data_validation(&mut self, validation: DataValidation) -> bool {
        self.validations.add(validation)
    }

    pub fn remove_data_validation(&mut self, area: &CellArea) -> Option<DataValidation> {
        self.validations.remove(area)
    }

    pub fn data_validations(&self) -> &[DataValidation] {
        self.validations.as_slice()
    }

    pub fn add_conditional_format(&mut self, format: ConditionalFormat) -> bool {
        self.conditional_formats.add(format)
    }

    pub fn remove_conditional_format(&mut self, area: &CellArea) -> Option<ConditionalFormat> {
        self.conditional_formats.remove(area)
    }

    pub fn conditional_formats(&self) -> &[ConditionalFormat] {
        self.conditional_formats.as_slice()
    }

    pub fn add_drawing(&mut self, drawing: Drawing) -> bool {
        self.drawings.add(drawing)
    }

    pub fn remove_drawing(&mut self, id: u32) -> Option<Drawing> {
        self.drawings.remove(&id)
    }

    pub fn drawings(&self) -> &[Drawing] {
        self.drawings.as_slice()
    }

    // ----- Row and column views -----

    fn resolve_style(
        registry: &mut dyn StyleRegistry,
        style: Option<&CellStyle>,
    ) -> XlsResult<Option<StyleHandle>> {
        let Some(style) = style else {
            return Ok(None);
        };
        match registry.register_style_if_absent(style) {
            Ok(handle) => Ok(Some(handle)),
            Err(XlsError::StyleTableFull { limit }) => {
                log::warn!("style table full ({limit} entries); using the default style");
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    /// Set width, visibility and style of column `col`.
    ///
    /// Replaces any earlier view of the column but keeps its outline state.
    pub fn set_column_view(
        &mut self,
        col: u32,
        view: &CellView,
        registry: &mut dyn StyleRegistry,
    ) -> XlsResult<()> {
        check_column(col)?;
        let style = Self::resolve_style(registry, view.style.as_ref())?;

        if view.autosize {
            self.autosized.insert(col);
        }

        let mut info = ColumnInfo::new(col);
        if let Some(old) = self.column_infos.remove(&col) {
            info.outline_level = old.outline_level;
            info.collapsed = old.collapsed;
        }
        info.width = view.size.unwrap_or(DEFAULT_COLUMN_WIDTH);
        info.style = style.unwrap_or_default();
        info.hidden = view.hidden;
        self.column_infos.add(info);
        Ok(())
    }

    /// Set height, visibility and style of row `row`.
    pub fn set_row_view(
        &mut self,
        row: u32,
        view: &CellView,
        registry: &mut dyn StyleRegistry,
    ) -> XlsResult<()> {
        check_row(row)?;
        let style = Self::resolve_style(registry, view.style.as_ref())?;

        let record = self.rows.get_or_create(row);
        record.height = view.size;
        record.hidden = view.hidden;
        record.style = style;
        self.grow_to(row, None);
        Ok(())
    }

    pub fn column_info(&self, col: u32) -> Option<&ColumnInfo> {
        self.column_infos.get(&col)
    }

    pub fn column_infos(&self) -> &[ColumnInfo] {
        self.column_infos.as_slice()
    }

    pub(crate) fn restore_column_info(&mut self, info: ColumnInfo) {
        self.max_column_outline_level = self.max_column_outline_level.max(info.outline_level);
        self.column_infos.remove(&info.column);
        self.column_infos.add(info);
    }

    pub fn autosized_columns(&self) -> &ColumnSet {
        &self.autosized
    }

    // ----- Outline groups -----

    /// Group rows `first..=last` one outline level deeper.
    pub fn set_row_group(&mut self, first: u32, last: u32, collapsed: bool) -> XlsResult<()> {
        if last < first {
            log::warn!("row group {first}..={last} is inverted; nothing grouped");
            return Ok(());
        }
        check_row(last)?;

        for index in first..=last {
            let row = self.rows.get_or_create(index);
            row.increment_outline_level();
            row.collapsed = collapsed;
            self.max_row_outline_level = self.max_row_outline_level.max(row.outline_level);
        }
        self.grow_to(last, None);
        Ok(())
    }

    /// Lift rows `first..=last` one outline level. Rows past the sheet are ignored.
    pub fn unset_row_group(&mut self, first: u32, last: u32) {
        if last < first {
            log::warn!("row group {first}..={last} is inverted; nothing ungrouped");
            return;
        }
        if last >= self.num_rows {
            log::warn!("row {last} is past the sheet bounds");
        }

        for index in first..=last.min(self.num_rows.saturating_sub(1)) {
            if let Some(row) = self.rows.get_mut(index) {
                row.decrement_outline_level();
            }
        }
        self.max_row_outline_level = self
            .rows
            .iter()
            .map(|row| row.outline_level)
            .max()
            .unwrap_or(0);
    }

    /// Group columns `first..=last` one outline level deeper.
    pub fn set_column_group(&mut self, first: u32, last: u32, collapsed: bool) -> XlsResult<()> {
        if last < first {
            log::warn!("column group {first}..={last} is inverted; nothing grouped");
            return Ok(());
        }
        check_column(last)?;

        for col in first..=last {
            let mut info = self
                .column_infos
                .remove(&col)
                .unwrap_or_else(|| ColumnInfo::new(col));
            info.increment_outline_level();
            info.collapsed = collapsed;
            self.max_column_outline_level = self.max_column_outline_level.max(info.outline_level);
            self.column_infos.add(info);
        }
        Ok(())
    }

    /// Lift columns `first..=last` one outline level.
    pub fn unset_column_group(&mut self, first: u32, last: u32) {
        if last < first {
            log::warn!("column group {first}..={last} is inverted; nothing ungrouped");
            return;
        }

        for col in first..=last {
            if let Some(mut info) = self.column_infos.remove(&col) {
                info.decrement_outline_level();
                self.column_infos.add(info);
            }
        }
        self.max_column_outline_level = self
            .column_infos
            .iter()
            .map(|info| info.outline_level)
            .max()
            .unwrap_or(0);
    }

    pub fn max_row_outline_level(&self) -> u8 {
        self.max_row_outline_level
    }

    pub fn max_column_outline_level(&self) -> u8 {
        self.max_column_outline_level
    }

    // ----- Reader support -----

    /// Apply ROW record properties to row `index`.
    pub(crate) fn restore_row(
        &mut self,
        index: u32,
        apply: impl FnOnce(&mut RowRecord),
    ) -> XlsResult<()> {
        check_row(index)?;
        let row = self.rows.get_or_create(index);
        apply(row);
        self.max_row_outline_level = self.max_row_outline_level.max(row.outline_level);
        self.grow_to(index, None);
        Ok(())
    }

    /// Extend the bounds to at least `num_rows` x `num_columns`.
    pub(crate) fn extend_bounds(&mut self, num_rows: u32, num_columns: u32) {
        self.num_rows = self.num_rows.max(num_rows.min(MAX_ROWS));
        self.num_columns = self.num_columns.max(num_columns.min(MAX_COLUMNS));
    }

    /// Record the payload layout detected from the substream's BOF.
    pub(crate) fn set_format_version(&mut self, version: FormatVersion) {
        self.settings.format_version = version;
    }
}
