//! Per-column formatting (COLINFO) and the autosized-column set.

use std::collections::BTreeSet;

use super::MAX_COLUMNS;
use super::collab::{CellStyle, StyleHandle};
use super::row::MAX_OUTLINE_LEVEL;
use crate::xls::shift::{Axis, Region, ShiftPivot, Shiftable};

/// Column width written when no size is given, in 1/256 of a character
pub const DEFAULT_COLUMN_WIDTH: u16 = 2275;

/// Size, visibility and style requested for a row or a column.
///
/// `size` is a column width in 1/256 of a character or a row height in
/// twips, depending on where the view is applied.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CellView {
    pub size: Option<u16>,
    pub hidden: bool,
    /// Columns only: fit the width to the content when the sheet is written
    pub autosize: bool,
    pub style: Option<CellStyle>,
}

impl CellView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, size: u16) -> Self {
        self.size = Some(size);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn autosize(mut self, autosize: bool) -> Self {
        self.autosize = autosize;
        self
    }

    pub fn with_style(mut self, style: CellStyle) -> Self {
        self.style = Some(style);
        self
    }
}

/// Formatting of a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub column: u32,
    /// Width in 1/256 of a character
    pub width: u16,
    pub style: StyleHandle,
    pub hidden: bool,
    pub outline_level: u8,
    pub collapsed: bool,
}

impl ColumnInfo {
    pub fn new(column: u32) -> Self {
        ColumnInfo {
            column,
            width: DEFAULT_COLUMN_WIDTH,
            style: StyleHandle::DEFAULT,
            hidden: false,
            outline_level: 0,
            collapsed: false,
        }
    }

    pub fn increment_outline_level(&mut self) {
        self.outline_level = (self.outline_level + 1).min(MAX_OUTLINE_LEVEL);
    }

    pub fn decrement_outline_level(&mut self) {
        self.outline_level = self.outline_level.saturating_sub(1);
    }
}

impl Region for ColumnInfo {
    type Key = u32;

    fn key(&self) -> u32 {
        self.column
    }

    /// Columns pushed past the last column are dropped.
    fn shifted(&self, pivot: ShiftPivot) -> Option<Self> {
        if pivot.axis != Axis::Column {
            return Some(self.clone());
        }
        let column = pivot.shift_index(self.column)?;
        (column < MAX_COLUMNS).then(|| ColumnInfo {
            column,
            ..self.clone()
        })
    }
}

/// Set of column indices, renumbered by column pivots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet(BTreeSet<u32>);

impl ColumnSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, col: u32) -> bool {
        self.0.insert(col)
    }

    pub fn remove(&mut self, col: u32) -> bool {
        self.0.remove(&col)
    }

    pub fn contains(&self, col: u32) -> bool {
        self.0.contains(&col)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Shiftable for ColumnSet {
    fn apply_shift(&mut self, pivot: ShiftPivot) {
        if pivot.axis != Axis::Column {
            return;
        }
        self.0 = self
            .0
            .iter()
            .filter_map(|&col| pivot.shift_index(col))
            .filter(|&col| col < MAX_COLUMNS)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xls::shift::RegionList;

    #[test]
    fn test_column_info_follows_column_pivots_only() {
        let info = ColumnInfo::new(3);
        assert_eq!(info.shifted(ShiftPivot::insert_row(0)), Some(info.clone()));
        assert_eq!(info.shifted(ShiftPivot::insert_column(3)).map(|i| i.column), Some(4));
        assert_eq!(info.shifted(ShiftPivot::remove_column(3)), None);
    }

    #[test]
    fn test_last_column_info_falls_off_on_insert() {
        let mut infos = RegionList::new();
        infos.add(ColumnInfo::new(2));
        infos.add(ColumnInfo::new(MAX_COLUMNS - 1));
        infos.apply_shift(ShiftPivot::insert_column(0));
        let cols: Vec<u32> = infos.iter().map(|i| i.column).collect();
        assert_eq!(cols, vec![3]);
    }

    #[test]
    fn test_autosized_set_is_rebuilt() {
        let mut set = ColumnSet::new();
        set.insert(1);
        set.insert(4);
        set.insert(6);

        set.apply_shift(ShiftPivot::insert_column(4));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 5, 7]);

        set.apply_shift(ShiftPivot::remove_column(5));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 6]);

        set.apply_shift(ShiftPivot::remove_row(0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_view_builder() {
        let view = CellView::new().with_size(512).hidden(true).autosize(true);
        assert_eq!(view.size, Some(512));
        assert!(view.hidden && view.autosize);
        assert!(view.style.is_none());
    }
}
