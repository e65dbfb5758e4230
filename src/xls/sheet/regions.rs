//! Rectangular regions and floating drawings attached to a sheet.
//!
//! Merged ranges and hyperlinks are identified by their top-left cell;
//! data validations and conditional formats by the whole area. All four
//! shift as spans along the pivot axis, so a region covering only the
//! removed row or column disappears. Drawings are positioned in row/column
//! units rather than anchored to an index and are never deleted by a pivot.

use super::{MAX_COLUMNS, MAX_ROWS};
use crate::xls::range::CellArea;
use crate::xls::shift::{Axis, Region, ShiftKind, ShiftPivot};

/// A block of cells displayed as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergedRange {
    pub area: CellArea,
}

impl MergedRange {
    pub fn new(area: CellArea) -> Self {
        MergedRange { area }
    }
}

impl Region for MergedRange {
    type Key = (u32, u32);

    fn key(&self) -> (u32, u32) {
        self.area.top_left()
    }

    fn shifted(&self, pivot: ShiftPivot) -> Option<Self> {
        self.area.shifted(pivot).map(MergedRange::new)
    }
}

/// A link attached to a cell range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperlink {
    pub area: CellArea,
    /// URL, file path or in-workbook location
    pub target: String,
    pub description: Option<String>,
}

impl Hyperlink {
    pub fn new(area: CellArea, target: impl Into<String>) -> Self {
        Hyperlink {
            area,
            target: target.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Region for Hyperlink {
    type Key = (u32, u32);

    fn key(&self) -> (u32, u32) {
        self.area.top_left()
    }

    fn shifted(&self, pivot: ShiftPivot) -> Option<Self> {
        let area = self.area.shifted(pivot)?;
        Some(Hyperlink {
            area,
            ..self.clone()
        })
    }
}

/// Comparison operators for numeric validations (DV operator codes 0..7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOperator {
    Between,
    NotBetween,
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

/// What a validated cell may contain.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationType {
    /// Integer constraint
    Whole {
        operator: ValidationOperator,
        value1: i64,
        value2: Option<i64>,
    },
    /// Decimal constraint
    Decimal {
        operator: ValidationOperator,
        value1: f64,
        value2: Option<f64>,
    },
    /// Explicit list of allowed values
    List { values: Vec<String> },
    /// Formula that must evaluate to TRUE, without a leading `=`.
    ///
    /// The text is owned by the formula collaborator and is not adjusted
    /// when rows or columns move.
    Custom { formula: String },
}

/// Data validation rule over a cell range.
#[derive(Debug, Clone, PartialEq)]
pub struct DataValidation {
    pub area: CellArea,
    pub validation_type: ValidationType,
    pub allow_blank: bool,
    pub input_message: Option<String>,
    pub error_message: Option<String>,
}

impl DataValidation {
    pub fn new(area: CellArea, validation_type: ValidationType) -> Self {
        DataValidation {
            area,
            validation_type,
            allow_blank: true,
            input_message: None,
            error_message: None,
        }
    }
}

impl Region for DataValidation {
    type Key = CellArea;

    fn key(&self) -> CellArea {
        self.area
    }

    fn shifted(&self, pivot: ShiftPivot) -> Option<Self> {
        let area = self.area.shifted(pivot)?;
        Some(DataValidation {
            area,
            ..self.clone()
        })
    }
}

/// Conditional formatting over a cell range.
///
/// Each rule is a formula (without a leading `=`) that turns the format on
/// when it evaluates to TRUE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalFormat {
    pub area: CellArea,
    pub rules: Vec<String>,
}

impl ConditionalFormat {
    pub fn new(area: CellArea, rule: impl Into<String>) -> Self {
        ConditionalFormat {
            area,
            rules: vec![rule.into()],
        }
    }
}

impl Region for ConditionalFormat {
    type Key = CellArea;

    fn key(&self) -> CellArea {
        self.area
    }

    fn shifted(&self, pivot: ShiftPivot) -> Option<Self> {
        let area = self.area.shifted(pivot)?;
        Some(ConditionalFormat {
            area,
            rules: self.rules.clone(),
        })
    }
}

/// A floating image or shape, positioned in row/column units.
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    pub id: u32,
    /// Left edge, in columns
    pub x: f64,
    /// Top edge, in rows
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Drawing {
    pub fn new(id: u32, x: f64, y: f64, width: f64, height: f64) -> Self {
        Drawing {
            id,
            x,
            y,
            width,
            height,
        }
    }
}

impl Region for Drawing {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }

    /// Moves by one unit when the pivot is at or before the drawing's edge.
    ///
    /// An insert that would push the bottom edge off the sheet leaves the
    /// drawing where it is; a remove never moves it above row/column 0.
    fn shifted(&self, pivot: ShiftPivot) -> Option<Self> {
        let p = f64::from(pivot.index);
        let mut moved = self.clone();
        let (pos, extent, limit) = match pivot.axis {
            Axis::Row => (&mut moved.y, self.height, MAX_ROWS),
            Axis::Column => (&mut moved.x, self.width, MAX_COLUMNS),
        };

        if *pos >= p {
            match pivot.kind {
                ShiftKind::Insert => {
                    if *pos + extent + 1.0 < f64::from(limit) {
                        *pos += 1.0;
                    }
                },
                ShiftKind::Remove => *pos = (*pos - 1.0).max(0.0),
            }
        }
        Some(moved)
    }
}
