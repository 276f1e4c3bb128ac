use crate::element::{BreakClass, Element};
use crate::error::CreaseError;
use crate::types::{ColIndex, Pt, RowIndex};

/// Border model of the owning table. Under the collapsing model only half
/// of each border width is charged to the cell on either side of the
/// shared edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderModel {
    Separate,
    Collapse,
}

/// Column progression direction of the table's writing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDirection {
    LeftToRight,
    RightToLeft,
}

/// Identifies the primary grid unit a fragment belongs to: the row the
/// cell originates in and its starting column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub row: RowIndex,
    pub col: ColIndex,
}

/// One grid cell's resolved metadata and content, consumed read-only.
/// Borders and paddings arrive already resolved against the table's border
/// model by the front end; the engine only halves borders for the
/// collapsing model.
#[derive(Debug, Clone)]
pub struct GridCell {
    col: ColIndex,
    col_span: usize,
    row_span: usize,
    border_before: Pt,
    border_after: Pt,
    padding_before: Pt,
    padding_after: Pt,
    keep_together: bool,
    keep_with_next: bool,
    elements: Vec<Element>,
}

impl GridCell {
    pub fn new(col: ColIndex, elements: Vec<Element>) -> Self {
        Self {
            col,
            col_span: 1,
            row_span: 1,
            border_before: Pt::ZERO,
            border_after: Pt::ZERO,
            padding_before: Pt::ZERO,
            padding_after: Pt::ZERO,
            keep_together: false,
            keep_with_next: false,
            elements,
        }
    }

    pub fn with_row_span(mut self, rows: usize) -> Self {
        self.row_span = rows;
        self
    }

    pub fn with_col_span(mut self, cols: usize) -> Self {
        self.col_span = cols;
        self
    }

    pub fn with_borders(mut self, before: Pt, after: Pt) -> Self {
        self.border_before = before;
        self.border_after = after;
        self
    }

    pub fn with_padding(mut self, before: Pt, after: Pt) -> Self {
        self.padding_before = before;
        self.padding_after = after;
        self
    }

    pub fn with_keep_together(mut self, keep: bool) -> Self {
        self.keep_together = keep;
        self
    }

    pub fn with_keep_with_next(mut self, keep: bool) -> Self {
        self.keep_with_next = keep;
        self
    }

    pub fn col(&self) -> ColIndex {
        self.col
    }

    pub fn col_span(&self) -> usize {
        self.col_span
    }

    pub fn row_span(&self) -> usize {
        self.row_span
    }

    pub fn keep_together(&self) -> bool {
        self.keep_together
    }

    pub fn keep_with_next(&self) -> bool {
        self.keep_with_next
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Border charged before the cell's content under the given model.
    pub fn border_before(&self, model: BorderModel) -> Pt {
        match model {
            BorderModel::Separate => self.border_before,
            BorderModel::Collapse => self.border_before * 0.5,
        }
    }

    /// Border charged after the cell's content under the given model.
    pub fn border_after(&self, model: BorderModel) -> Pt {
        match model {
            BorderModel::Separate => self.border_after,
            BorderModel::Collapse => self.border_after * 0.5,
        }
    }

    pub fn padding_before(&self) -> Pt {
        self.padding_before
    }

    pub fn padding_after(&self) -> Pt {
        self.padding_after
    }
}

/// One row of the group: its height figures, keep constraints, forced
/// breaks around it, and the cells that originate on it. Natural height is
/// produced by an earlier measuring phase and consumed as-is here.
#[derive(Debug, Clone)]
pub struct RowProfile {
    natural_height: Pt,
    explicit_height: Option<Pt>,
    keep_together: bool,
    keep_with_next: bool,
    keep_with_previous: bool,
    break_before: BreakClass,
    break_after: BreakClass,
    cells: Vec<GridCell>,
}

impl RowProfile {
    pub fn new(natural_height: Pt) -> Self {
        Self {
            natural_height,
            explicit_height: None,
            keep_together: false,
            keep_with_next: false,
            keep_with_previous: false,
            break_before: BreakClass::Auto,
            break_after: BreakClass::Auto,
            cells: Vec::new(),
        }
    }

    pub fn with_explicit_height(mut self, height: Pt) -> Self {
        self.explicit_height = Some(height);
        self
    }

    pub fn with_keep_together(mut self, keep: bool) -> Self {
        self.keep_together = keep;
        self
    }

    pub fn with_keep_with_next(mut self, keep: bool) -> Self {
        self.keep_with_next = keep;
        self
    }

    pub fn with_keep_with_previous(mut self, keep: bool) -> Self {
        self.keep_with_previous = keep;
        self
    }

    pub fn with_break_before(mut self, class: BreakClass) -> Self {
        self.break_before = class;
        self
    }

    pub fn with_break_after(mut self, class: BreakClass) -> Self {
        self.break_after = class;
        self
    }

    pub fn with_cell(mut self, cell: GridCell) -> Self {
        self.cells.push(cell);
        self
    }

    pub fn natural_height(&self) -> Pt {
        self.natural_height
    }

    pub fn explicit_height(&self) -> Option<Pt> {
        self.explicit_height
    }

    pub fn keep_together(&self) -> bool {
        self.keep_together
    }

    pub fn keep_with_next(&self) -> bool {
        self.keep_with_next
    }

    pub fn keep_with_previous(&self) -> bool {
        self.keep_with_previous
    }

    pub fn break_before(&self) -> BreakClass {
        self.break_before
    }

    pub fn break_after(&self) -> BreakClass {
        self.break_after
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }
}

/// The rows being assembled together because at least one cell spans
/// across them (or a single row with no spanning at all).
#[derive(Debug, Clone)]
pub struct RowGroup {
    rows: Vec<RowProfile>,
}

impl RowGroup {
    pub fn new(rows: Vec<RowProfile>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[RowProfile] {
        &self.rows
    }

    pub fn row(&self, index: RowIndex) -> &RowProfile {
        &self.rows[index.0]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total natural extent of the group, the baseline against which steps
    /// split into box and penalty portions.
    pub fn total_natural_height(&self) -> Pt {
        self.rows.iter().map(RowProfile::natural_height).sum()
    }

    /// Front-end contract check, run before any cursor is constructed.
    /// Spans must stay inside the group and never be zero.
    pub fn validate(&self) -> Result<(), CreaseError> {
        if self.rows.is_empty() {
            return Err(CreaseError::EmptyRowGroup);
        }
        for (row_index, row) in self.rows.iter().enumerate() {
            for cell in &row.cells {
                if cell.row_span == 0 || cell.col_span == 0 {
                    return Err(CreaseError::ZeroSpan {
                        row: RowIndex(row_index),
                        col: cell.col,
                    });
                }
                if row_index + cell.row_span > self.rows.len() {
                    return Err(CreaseError::SpanOutOfBounds {
                        row: RowIndex(row_index),
                        col: cell.col,
                        span: cell.row_span,
                        rows: self.rows.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A content fragment produced by one step: the owning grid unit plus the
/// inclusive element range the step consumed from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPart {
    pub cell: CellRef,
    pub start: usize,
    pub end: usize,
}
