//! Row/column index shifting
//!
//! Every coordinate-addressed collection of a worksheet implements
//! [`Shiftable`]. A structural edit builds one [`ShiftPivot`] and replays it
//! on each collection, so all of them renumber against the same pivot.
//!
//! Two shift rules exist:
//!
//! - **Point** (an index that identifies an entry, such as a page break
//!   anchor): insert moves indices `>= pivot` up by one; remove deletes the
//!   entry at the pivot and moves indices `> pivot` down by one.
//! - **Span** (an inclusive `[first, last]` range along the pivot axis):
//!   insert at or before `first` moves the span, insert inside it grows it;
//!   remove deletes a single-index span at the pivot, moves a span that
//!   starts after the pivot and shrinks one that contains it.

use std::fmt;

/// Sheet axis a pivot runs along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Row,
    Column,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Row => f.write_str("row"),
            Axis::Column => f.write_str("column"),
        }
    }
}

/// Direction of a structural edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftKind {
    Insert,
    Remove,
}

/// A single structural edit: insert or remove one row or column at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShiftPivot {
    pub axis: Axis,
    pub index: u32,
    pub kind: ShiftKind,
}

impl ShiftPivot {
    pub fn new(axis: Axis, index: u32, kind: ShiftKind) -> Self {
        ShiftPivot { axis, index, kind }
    }

    pub fn insert_row(index: u32) -> Self {
        Self::new(Axis::Row, index, ShiftKind::Insert)
    }

    pub fn remove_row(index: u32) -> Self {
        Self::new(Axis::Row, index, ShiftKind::Remove)
    }

    pub fn insert_column(index: u32) -> Self {
        Self::new(Axis::Column, index, ShiftKind::Insert)
    }

    pub fn remove_column(index: u32) -> Self {
        Self::new(Axis::Column, index, ShiftKind::Remove)
    }

    /// The edit that undoes this one
    pub fn inverse(self) -> Self {
        let kind = match self.kind {
            ShiftKind::Insert => ShiftKind::Remove,
            ShiftKind::Remove => ShiftKind::Insert,
        };
        ShiftPivot { kind, ..self }
    }

    /// Apply the point rule to `index`.
    ///
    /// Returns `None` when a remove deletes the index itself.
    pub fn shift_index(self, index: u32) -> Option<u32> {
        match self.kind {
            ShiftKind::Insert if index >= self.index => Some(index.saturating_add(1)),
            ShiftKind::Insert => Some(index),
            ShiftKind::Remove if index == self.index => None,
            ShiftKind::Remove if index > self.index => Some(index - 1),
            ShiftKind::Remove => Some(index),
        }
    }

    /// Apply the span rule to the inclusive range `[first, last]`.
    ///
    /// Returns `None` when a remove deletes a span that covers only the pivot.
    pub fn shift_span(self, first: u32, last: u32) -> Option<(u32, u32)> {
        let p = self.index;
        match self.kind {
            ShiftKind::Insert => {
                if first >= p {
                    Some((first.saturating_add(1), last.saturating_add(1)))
                } else if last >= p {
                    Some((first, last.saturating_add(1)))
                } else {
                    Some((first, last))
                }
            },
            ShiftKind::Remove => {
                if first == p && last == p {
                    None
                } else if first > p {
                    Some((first - 1, last - 1))
                } else if last >= p {
                    Some((first, last - 1))
                } else {
                    Some((first, last))
                }
            },
        }
    }
}

/// An entry that can be renumbered by a pivot.
pub trait Region: Sized {
    /// Identity used for first-writer-wins deduplication
    type Key: PartialEq;

    fn key(&self) -> Self::Key;

    /// The entry after applying `pivot`, or `None` if the edit deletes it.
    fn shifted(&self, pivot: ShiftPivot) -> Option<Self>;
}

/// A collection that renumbers its entries in place.
pub trait Shiftable {
    fn apply_shift(&mut self, pivot: ShiftPivot);
}

/// Pure shift: the entries that survive `pivot`, renumbered, in their
/// original relative order.
///
/// A removal can land two spans on the same key (`5..=6` and `6..=6` both
/// become `5..=5` when row 5 goes). The earlier entry keeps the key and the
/// later one is dropped, the same rule [`RegionList::add`] applies.
pub fn shift<T: Region>(items: &[T], pivot: ShiftPivot) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items.iter().filter_map(|item| item.shifted(pivot)) {
        let key = item.key();
        if out.iter().any(|kept| kept.key() == key) {
            log::debug!("dropping region that collapsed onto an earlier one after {pivot:?}");
            continue;
        }
        out.push(item);
    }
    out
}

/// Ordered list of regions with unique keys.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionList<T> {
    items: Vec<T>,
}

impl<T> Default for RegionList<T> {
    fn default() -> Self {
        RegionList { items: Vec::new() }
    }
}

impl<T: Region> RegionList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `item` unless an entry with the same key already exists.
    ///
    /// Returns `true` if the item was added. The first entry for a key wins.
    pub fn add(&mut self, item: T) -> bool {
        let key = item.key();
        if self.items.iter().any(|existing| existing.key() == key) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Remove the entry with `key`, returning it.
    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        let pos = self.items.iter().position(|item| item.key() == *key)?;
        Some(self.items.remove(pos))
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.items.iter().find(|item| item.key() == *key)
    }

    pub fn contains(&self, key: &T::Key) -> bool {
        self.get(key).is_some()
    }

    pub fn retain(&mut self, f: impl FnMut(&T) -> bool) {
        self.items.retain(f);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T> RegionList<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: Region> Shiftable for RegionList<T> {
    fn apply_shift(&mut self, pivot: ShiftPivot) {
        self.items = shift(&self.items, pivot);
    }
}

impl<T: Region> FromIterator<T> for RegionList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = RegionList::new();
        for item in iter {
            list.add(item);
        }
        list
    }
}

impl<'a, T> IntoIterator for &'a RegionList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
