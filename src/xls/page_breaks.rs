//! HORIZONTALPAGEBREAKS / VERTICALPAGEBREAKS
//!
//! BIFF8 payload:
//!
//! ```text
//! [count: u16] count * ([anchor: u16][span_first: u16][span_last: u16])
//! ```
//!
//! BIFF7 entries are a bare two-byte anchor; they read back as spanning
//! the whole perpendicular axis.

use crate::common::binary;
use crate::xls::error::{XlsError, XlsResult};
use crate::xls::range::CoordinateRange;
use crate::xls::records::{FormatVersion, MAX_RECORD_DATA_LEN, Record, types};
use crate::xls::shift::{Axis, RegionList, ShiftPivot, Shiftable};

/// Manual page breaks along one axis.
///
/// Row breaks (`Axis::Row`) are anchored at the first row below the break;
/// column breaks at the first column right of it.
#[derive(Debug, Clone, PartialEq)]
pub struct PageBreaks {
    axis: Axis,
    breaks: RegionList<CoordinateRange>,
}

impl PageBreaks {
    pub fn new(axis: Axis) -> Self {
        PageBreaks {
            axis,
            breaks: RegionList::new(),
        }
    }

    #[inline]
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Record type carrying breaks along `axis`
    pub fn record_type_for(axis: Axis) -> u16 {
        match axis {
            Axis::Row => types::HORIZONTALPAGEBREAKS,
            Axis::Column => types::VERTICALPAGEBREAKS,
        }
    }

    /// Add a full-span break at `anchor`. A break already there is kept.
    pub fn add_break(&mut self, anchor: u32) -> bool {
        self.add(CoordinateRange::full_span(anchor))
    }

    /// Add a break with an explicit span. A break already at the anchor is kept.
    pub fn add(&mut self, range: CoordinateRange) -> bool {
        self.breaks.add(range)
    }

    pub fn remove_break(&mut self, anchor: u32) -> Option<CoordinateRange> {
        self.breaks.remove(&anchor)
    }

    /// Break anchors in insertion order
    pub fn anchors(&self) -> Vec<u32> {
        self.breaks.iter().map(CoordinateRange::anchor).collect()
    }

    pub fn ranges(&self) -> &[CoordinateRange] {
        self.breaks.as_slice()
    }

    pub fn len(&self) -> usize {
        self.breaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breaks.is_empty()
    }

    pub fn clear(&mut self) {
        self.breaks.clear();
    }

    /// Serialize to a page break record.
    ///
    /// Fails if an anchor or span does not fit the 16-bit fields, or if the
    /// list is too long for one record.
    pub fn to_record(&self, version: FormatVersion) -> XlsResult<Record> {
        let entry_len = match version {
            FormatVersion::Legacy => 2,
            FormatVersion::Current => 6,
        };
        let len = 2 + self.breaks.len() * entry_len;
        if len > MAX_RECORD_DATA_LEN {
            return Err(XlsError::InvalidData(format!(
                "{} page breaks do not fit in one record",
                self.breaks.len()
            )));
        }

        let mut data = Vec::with_capacity(len);
        data.extend_from_slice(&(self.breaks.len() as u16).to_le_bytes());
        for range in &self.breaks {
            data.extend_from_slice(&field(range.anchor())?.to_le_bytes());
            if version == FormatVersion::Current {
                data.extend_from_slice(&field(range.span_first())?.to_le_bytes());
                data.extend_from_slice(&field(range.span_last())?.to_le_bytes());
            }
        }

        Ok(Record::new(Self::record_type_for(self.axis), data))
    }

    /// Parse a page break record; the axis follows from the record type.
    pub fn from_record(record: &Record, version: FormatVersion) -> XlsResult<Self> {
        let axis = match record.record_type() {
            types::HORIZONTALPAGEBREAKS => Axis::Row,
            types::VERTICALPAGEBREAKS => Axis::Column,
            other => {
                return Err(XlsError::InvalidRecord {
                    record_type: other,
                    offset: record.offset,
                    message: "not a page break record".to_string(),
                });
            },
        };

        Self::parse(&record.data, axis, version)
            .map_err(|e| e.in_record(record.record_type(), record.offset))
    }

    fn parse(data: &[u8], axis: Axis, version: FormatVersion) -> XlsResult<Self> {
        let count = binary::read_u16_le(data, 0)? as usize;
        let mut breaks = PageBreaks::new(axis);
        let mut pos = 2;

        for _ in 0..count {
            let anchor = binary::read_u16_le(data, pos)? as u32;
            let range = match version {
                FormatVersion::Legacy => {
                    pos += 2;
                    CoordinateRange::full_span(anchor)
                },
                FormatVersion::Current => {
                    let first = binary::read_u16_le(data, pos + 2)? as u32;
                    let last = binary::read_u16_le(data, pos + 4)? as u32;
                    pos += 6;
                    CoordinateRange::new(anchor, first, last)
                },
            };
            breaks.add(range);
        }

        Ok(breaks)
    }
}

fn field(value: u32) -> XlsResult<u16> {
    u16::try_from(value)
        .map_err(|_| XlsError::InvalidData(format!("page break index {value} exceeds 65535")))
}

impl Shiftable for PageBreaks {
    /// Pivots along the other axis leave the breaks alone.
    fn apply_shift(&mut self, pivot: ShiftPivot) {
        if pivot.axis == self.axis {
            self.breaks.apply_shift(pivot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_two_row_breaks_encode_exactly() {
        let mut breaks = PageBreaks::new(Axis::Row);
        breaks.add_break(13);
        breaks.add_break(18);

        let bytes = breaks.to_record(FormatVersion::Current).unwrap().encode();
        assert_eq!(
            bytes,
            vec![
                0x1B, 0x00, 0x0E, 0x00, // header
                0x02, 0x00, // count
                0x0D, 0x00, 0x00, 0x00, 0xFF, 0xFF, // row 13
                0x12, 0x00, 0x00, 0x00, 0xFF, 0xFF, // row 18
            ]
        );
    }

    #[test]
    fn test_duplicate_break_keeps_first_span() {
        let mut breaks = PageBreaks::new(Axis::Column);
        assert!(breaks.add(CoordinateRange::new(4, 0, 10)));
        assert!(!breaks.add_break(4));
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks.ranges()[0].span_last(), 10);
    }

    #[test]
    fn test_insert_and_remove_follow_pivot() {
        let mut breaks = PageBreaks::new(Axis::Row);
        breaks.add_break(5);
        breaks.add_break(6);

        breaks.apply_shift(ShiftPivot::insert_row(6));
        assert_eq!(breaks.anchors(), vec![5, 7]);
        breaks.apply_shift(ShiftPivot::insert_row(0));
        assert_eq!(breaks.anchors(), vec![6, 8]);

        // Column pivots do not touch row breaks.
        breaks.apply_shift(ShiftPivot::remove_column(0));
        assert_eq!(breaks.anchors(), vec![6, 8]);

        breaks.apply_shift(ShiftPivot::remove_row(6));
        assert_eq!(breaks.anchors(), vec![7]);
    }

    #[test]
    fn test_legacy_entries_read_as_full_span() {
        let record = Record::new(types::VERTICALPAGEBREAKS, vec![0x02, 0x00, 0x03, 0x00, 0x09, 0x00]);
        let breaks = PageBreaks::from_record(&record, FormatVersion::Legacy).unwrap();
        assert_eq!(breaks.axis(), Axis::Column);
        assert_eq!(breaks.anchors(), vec![3, 9]);
        assert_eq!(breaks.ranges()[1], CoordinateRange::full_span(9));

        let again = breaks.to_record(FormatVersion::Legacy).unwrap();
        assert_eq!(again.data, record.data);
    }

    #[test]
    fn test_short_payload_names_record() {
        let mut record = Record::new(types::HORIZONTALPAGEBREAKS, vec![0x02, 0x00, 0x01, 0x00]);
        record.offset = 96;
        match PageBreaks::from_record(&record, FormatVersion::Current) {
            Err(XlsError::InvalidRecord {
                record_type,
                offset,
                ..
            }) => {
                assert_eq!(record_type, types::HORIZONTALPAGEBREAKS);
                assert_eq!(offset, 96);
            },
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_record_type_is_rejected() {
        let record = Record::new(types::EOF, Vec::new());
        assert!(PageBreaks::from_record(&record, FormatVersion::Current).is_err());
    }

    #[test]
    fn test_oversized_anchor_fails_to_encode() {
        let mut breaks = PageBreaks::new(Axis::Row);
        breaks.add_break(70_000);
        assert!(matches!(
            breaks.to_record(FormatVersion::Current),
            Err(XlsError::InvalidData(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_record_round_trip(
            entries in prop::collection::btree_map(0u32..=0xFFFF, (0u32..=0xFFFF, 0u32..=0xFFFF), 0..64),
            vertical in any::<bool>(),
        ) {
            let axis = if vertical { Axis::Column } else { Axis::Row };
            let mut breaks = PageBreaks::new(axis);
            for (anchor, (a, b)) in entries {
                breaks.add(CoordinateRange::new(anchor, a, b));
            }

            let record = breaks.to_record(FormatVersion::Current).unwrap();
            let decoded = PageBreaks::from_record(&record, FormatVersion::Current).unwrap();
            prop_assert_eq!(&decoded, &breaks);
            prop_assert_eq!(decoded.to_record(FormatVersion::Current).unwrap(), record);
        }
    }
}
