//! Coordinate-anchored values shared by the region lists.

use crate::xls::shift::{Axis, Region, ShiftPivot};

/// Largest row index in a BIFF8 sheet, used as the end of full-width spans
pub const MAX_SPAN_INDEX: u32 = u16::MAX as u32;

/// A break or region anchored at `anchor`, valid across the perpendicular
/// span `[span_first, span_last]`.
///
/// The anchor is the identity: two ranges with the same anchor are the same
/// entry as far as deduplication and shifting are concerned. Shifting only
/// ever touches the anchor; the span belongs to the other axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordinateRange {
    anchor: u32,
    span_first: u32,
    span_last: u32,
}

impl CoordinateRange {
    /// Build a range; the span bounds are swapped if given inverted.
    pub fn new(anchor: u32, span_first: u32, span_last: u32) -> Self {
        let (span_first, span_last) = if span_first <= span_last {
            (span_first, span_last)
        } else {
            (span_last, span_first)
        };
        CoordinateRange {
            anchor,
            span_first,
            span_last,
        }
    }

    /// A range spanning the whole perpendicular axis.
    pub fn full_span(anchor: u32) -> Self {
        Self::new(anchor, 0, MAX_SPAN_INDEX)
    }

    #[inline]
    pub fn anchor(&self) -> u32 {
        self.anchor
    }

    #[inline]
    pub fn span_first(&self) -> u32 {
        self.span_first
    }

    #[inline]
    pub fn span_last(&self) -> u32 {
        self.span_last
    }

    /// Same span, new anchor
    pub fn with_anchor(self, anchor: u32) -> Self {
        CoordinateRange { anchor, ..self }
    }
}

impl Region for CoordinateRange {
    type Key = u32;

    fn key(&self) -> u32 {
        self.anchor
    }

    fn shifted(&self, pivot: ShiftPivot) -> Option<Self> {
        pivot.shift_index(self.anchor).map(|a| self.with_anchor(a))
    }
}

/// An inclusive rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellArea {
    pub first_row: u32,
    pub last_row: u32,
    pub first_col: u32,
    pub last_col: u32,
}

impl CellArea {
    /// Build an area from two corners in any order.
    pub fn new(first_row: u32, first_col: u32, last_row: u32, last_col: u32) -> Self {
        CellArea {
            first_row: first_row.min(last_row),
            last_row: first_row.max(last_row),
            first_col: first_col.min(last_col),
            last_col: first_col.max(last_col),
        }
    }

    /// A one-cell area
    pub fn cell(row: u32, col: u32) -> Self {
        Self::new(row, col, row, col)
    }

    /// Top-left corner as `(row, col)`
    pub fn top_left(&self) -> (u32, u32) {
        (self.first_row, self.first_col)
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }

    pub fn intersects(&self, other: &CellArea) -> bool {
        self.first_row <= other.last_row
            && other.first_row <= self.last_row
            && self.first_col <= other.last_col
            && other.first_col <= self.last_col
    }

    /// Apply `pivot` along its axis using the span rule.
    pub fn shifted(&self, pivot: ShiftPivot) -> Option<Self> {
        match pivot.axis {
            Axis::Row => {
                let (first_row, last_row) = pivot.shift_span(self.first_row, self.last_row)?;
                Some(CellArea {
                    first_row,
                    last_row,
                    ..*self
                })
            },
            Axis::Column => {
                let (first_col, last_col) = pivot.shift_span(self.first_col, self.last_col)?;
                Some(CellArea {
                    first_col,
                    last_col,
                    ..*self
                })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xls::shift::ShiftPivot;

    #[test]
    fn test_inverted_span_is_normalized() {
        let range = CoordinateRange::new(3, 10, 2);
        assert_eq!(range.span_first(), 2);
        assert_eq!(range.span_last(), 10);
    }

    #[test]
    fn test_shift_moves_anchor_only() {
        let range = CoordinateRange::new(6, 1, 4);
        let moved = range.shifted(ShiftPivot::insert_row(2)).unwrap();
        assert_eq!(moved, CoordinateRange::new(7, 1, 4));
        assert_eq!(range.anchor(), 6);
        assert!(range.shifted(ShiftPivot::remove_row(6)).is_none());
    }

    #[test]
    fn test_area_shifts_along_pivot_axis() {
        let area = CellArea::new(2, 1, 4, 3);

        let grown = area.shifted(ShiftPivot::insert_row(3)).unwrap();
        assert_eq!((grown.first_row, grown.last_row), (2, 5));
        assert_eq!((grown.first_col, grown.last_col), (1, 3));

        let moved = area.shifted(ShiftPivot::insert_column(0)).unwrap();
        assert_eq!((moved.first_col, moved.last_col), (2, 4));

        let shrunk = area.shifted(ShiftPivot::remove_column(1)).unwrap();
        assert_eq!((shrunk.first_col, shrunk.last_col), (1, 2));
    }

    #[test]
    fn test_single_row_area_is_deleted_at_pivot() {
        let area = CellArea::new(7, 0, 7, 5);
        assert!(area.shifted(ShiftPivot::remove_row(7)).is_none());
        assert!(area.shifted(ShiftPivot::remove_column(2)).is_some());
    }

    #[test]
    fn test_area_geometry() {
        let area = CellArea::new(4, 4, 1, 1);
        assert_eq!(area.top_left(), (1, 1));
        assert!(area.contains(4, 1));
        assert!(!area.contains(5, 1));
        assert!(area.intersects(&CellArea::cell(4, 4)));
        assert!(!area.intersects(&CellArea::cell(0, 0)));
    }
}
