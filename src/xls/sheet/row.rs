//! Row records and the cells they hold.

use std::collections::BTreeMap;

use super::MAX_COLUMNS;
use super::collab::StyleHandle;
use crate::xls::shift::{Axis, ShiftKind, ShiftPivot, Shiftable};

/// Row height written when a row has no explicit height, in twips
pub const DEFAULT_ROW_HEIGHT: u16 = 0x00FF;

/// Highest outline level BIFF can store (3 bits)
pub const MAX_OUTLINE_LEVEL: u8 = 7;

/// Value of a single cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// A formatted cell with no content
    #[default]
    Blank,
    Number(f64),
    Label(String),
    Boolean(bool),
    /// Error code as stored in BOOLERR (e.g. 0x07 for `#DIV/0!`)
    Error(u8),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub value: CellValue,
    pub style: StyleHandle,
}

impl Cell {
    pub fn new(value: CellValue) -> Self {
        Cell {
            value,
            style: StyleHandle::DEFAULT,
        }
    }

    pub fn with_style(mut self, style: StyleHandle) -> Self {
        self.style = style;
        self
    }

    pub fn blank() -> Self {
        Self::new(CellValue::Blank)
    }

    pub fn number(value: f64) -> Self {
        Self::new(CellValue::Number(value))
    }

    pub fn label(text: impl Into<String>) -> Self {
        Self::new(CellValue::Label(text.into()))
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(CellValue::Boolean(value))
    }
}

/// One row: its own formatting plus the cells in it, keyed by column.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    index: u32,
    cells: BTreeMap<u32, Cell>,
    /// Explicit height in twips
    pub height: Option<u16>,
    pub hidden: bool,
    pub outline_level: u8,
    pub collapsed: bool,
    /// Row-level default style
    pub style: Option<StyleHandle>,
}

impl RowRecord {
    pub fn new(index: u32) -> Self {
        RowRecord {
            index,
            cells: BTreeMap::new(),
            height: None,
            hidden: false,
            outline_level: 0,
            collapsed: false,
            style: None,
        }
    }

    /// Current row number
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn cell(&self, col: u32) -> Option<&Cell> {
        self.cells.get(&col)
    }

    pub fn cells(&self) -> impl Iterator<Item = (u32, &Cell)> {
        self.cells.iter().map(|(&col, cell)| (col, cell))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// `(first, last + 1)` of the occupied columns
    pub fn column_span(&self) -> Option<(u32, u32)> {
        let first = *self.cells.keys().next()?;
        let last = *self.cells.keys().next_back()?;
        Some((first, last + 1))
    }

    pub(crate) fn set_cell(&mut self, col: u32, cell: Cell) -> Option<Cell> {
        self.cells.insert(col, cell)
    }

    pub(crate) fn take_cell(&mut self, col: u32) -> Option<Cell> {
        self.cells.remove(&col)
    }

    pub fn increment_outline_level(&mut self) {
        self.outline_level = (self.outline_level + 1).min(MAX_OUTLINE_LEVEL);
    }

    pub fn decrement_outline_level(&mut self) {
        self.outline_level = self.outline_level.saturating_sub(1);
    }

    fn shift_columns(&mut self, pivot: ShiftPivot) {
        let cells = std::mem::take(&mut self.cells);
        self.cells = cells
            .into_iter()
            .filter_map(|(col, cell)| {
                let col = pivot.shift_index(col)?;
                (col < MAX_COLUMNS).then_some((col, cell))
            })
            .collect();
    }
}

/// Rows of a sheet addressed by position.
///
/// Slot `i` holds row `i` or `None` if that row was never touched. A row
/// pivot moves the slots; a column pivot moves the cells inside each row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowStore {
    rows: Vec<Option<RowRecord>>,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: u32) -> Option<&RowRecord> {
        self.rows.get(index as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, index: u32) -> Option<&mut RowRecord> {
        self.rows.get_mut(index as usize)?.as_mut()
    }

    /// Row `index`, created empty if it does not exist yet.
    pub fn get_or_create(&mut self, index: u32) -> &mut RowRecord {
        let slot = index as usize;
        if slot >= self.rows.len() {
            self.rows.resize_with(slot + 1, || None);
        }
        self.rows[slot].get_or_insert_with(|| RowRecord::new(index))
    }

    /// Existing rows in index order
    pub fn iter(&self) -> impl Iterator<Item = &RowRecord> {
        self.rows.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RowRecord> {
        self.rows.iter_mut().flatten()
    }

    /// Number of slots, existing or not
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn renumber_from(&mut self, start: usize) {
        for (slot, row) in self.rows.iter_mut().enumerate().skip(start) {
            if let Some(row) = row {
                row.index = slot as u32;
            }
        }
    }
}

impl Shiftable for RowStore {
    fn apply_shift(&mut self, pivot: ShiftPivot) {
        match pivot.axis {
            Axis::Row => {
                let at = pivot.index as usize;
                if at >= self.rows.len() {
                    return;
                }
                match pivot.kind {
                    ShiftKind::Insert => self.rows.insert(at, None),
                    ShiftKind::Remove => {
                        self.rows.remove(at);
                    },
                }
                self.renumber_from(at);
            },
            Axis::Column => {
                for row in self.iter_mut() {
                    row.shift_columns(pivot);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(rows: &[u32]) -> RowStore {
        let mut store = RowStore::new();
        for &r in rows {
            store.get_or_create(r).set_cell(0, Cell::number(r as f64));
        }
        store
    }

    fn indices(store: &RowStore) -> Vec<u32> {
        store.iter().map(RowRecord::index).collect()
    }

    #[test]
    fn test_insert_moves_rows_at_and_after_pivot() {
        let mut store = store_with(&[1, 3, 4]);
        store.apply_shift(ShiftPivot::insert_row(3));
        assert_eq!(indices(&store), vec![1, 4, 5]);
        assert!(store.get(3).is_none());
        assert_eq!(store.get(4).unwrap().cell(0), Some(&Cell::number(3.0)));
    }

    #[test]
    fn test_remove_drops_row_and_renumbers() {
        let mut store = store_with(&[1, 3, 4]);
        store.apply_shift(ShiftPivot::remove_row(3));
        assert_eq!(indices(&store), vec![1, 3]);
        assert_eq!(store.get(3).unwrap().cell(0), Some(&Cell::number(4.0)));
    }

    #[test]
    fn test_pivot_past_last_slot_is_ignored() {
        let mut store = store_with(&[0, 2]);
        store.apply_shift(ShiftPivot::insert_row(10));
        store.apply_shift(ShiftPivot::remove_row(10));
        assert_eq!(indices(&store), vec![0, 2]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_column_pivot_moves_cells() {
        let mut store = RowStore::new();
        let row = store.get_or_create(0);
        row.set_cell(1, Cell::label("b"));
        row.set_cell(4, Cell::label("e"));
        row.set_cell(MAX_COLUMNS - 1, Cell::label("last"));

        store.apply_shift(ShiftPivot::insert_column(2));
        let row = store.get(0).unwrap();
        let cols: Vec<u32> = row.cells().map(|(c, _)| c).collect();
        assert_eq!(cols, vec![1, 5]);

        store.apply_shift(ShiftPivot::remove_column(1));
        let cols: Vec<u32> = store.get(0).unwrap().cells().map(|(c, _)| c).collect();
        assert_eq!(cols, vec![4]);
    }

    #[test]
    fn test_outline_level_is_clamped() {
        let mut row = RowRecord::new(0);
        for _ in 0..10 {
            row.increment_outline_level();
        }
        assert_eq!(row.outline_level, MAX_OUTLINE_LEVEL);
        row.outline_level = 0;
        row.decrement_outline_level();
        assert_eq!(row.outline_level, 0);
    }
}
