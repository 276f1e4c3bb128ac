use std::cell::Cell;
use std::sync::Arc;

use crate::debug::DebugLogger;
use crate::grid::ColumnDirection;
use crate::types::{ColIndex, Pt};

/// Declared width of a column: an absolute part plus a proportional factor
/// resolved against the table's distribution unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnWidth {
    pub fixed: Pt,
    pub factor: f32,
}

impl ColumnWidth {
    pub fn fixed(width: Pt) -> Self {
        Self {
            fixed: width,
            factor: 0.0,
        }
    }

    pub fn proportional(factor: f32) -> Self {
        Self {
            fixed: Pt::ZERO,
            factor,
        }
    }

    pub fn mixed(fixed: Pt, factor: f32) -> Self {
        Self { fixed, factor }
    }
}

/// One declared column: an optional explicit 1-based position, a repeat
/// count, and the width shared by every repetition.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    number: Option<usize>,
    repeat: usize,
    width: ColumnWidth,
}

impl ColumnSpec {
    pub fn new(width: ColumnWidth) -> Self {
        Self {
            number: None,
            repeat: 1,
            width,
        }
    }

    pub fn at(mut self, number: usize) -> Self {
        self.number = Some(number);
        self
    }

    pub fn repeated(mut self, count: usize) -> Self {
        self.repeat = count.max(1);
        self
    }
}

/// Declared column layout of one table, expanded from the specs once and
/// then resolved against a content width per layout pass.
#[derive(Debug, Clone)]
pub struct ColumnGeometry {
    declared: Vec<ColumnWidth>,
}

impl ColumnGeometry {
    /// Expands repeats and explicit positions into a flat declared list.
    /// Gaps left by explicit positions are filled by repeating the nearest
    /// preceding declared column (or the first declared one for a leading
    /// gap).
    pub fn new(specs: &[ColumnSpec]) -> Self {
        let mut slots: Vec<Option<ColumnWidth>> = Vec::new();
        let mut cursor = 1usize;
        for spec in specs {
            if let Some(number) = spec.number {
                cursor = number.max(1);
            }
            for _ in 0..spec.repeat {
                while cursor > slots.len() {
                    slots.push(None);
                }
                slots[cursor - 1] = Some(spec.width);
                cursor += 1;
            }
        }
        let mut declared = Vec::with_capacity(slots.len());
        let first = slots.iter().flatten().next().copied();
        let mut previous: Option<ColumnWidth> = None;
        for slot in slots {
            let width = match slot {
                Some(width) => {
                    previous = Some(width);
                    width
                }
                None => previous.or(first).unwrap_or(ColumnWidth::proportional(1.0)),
            };
            declared.push(width);
        }
        Self { declared }
    }

    pub fn declared_count(&self) -> usize {
        self.declared.len()
    }

    /// Resolves proportional parts against the content area width. The
    /// distribution unit divides the leftover space by the summed factors;
    /// when the absolute parts already meet or exceed the content area the
    /// unit is zero and proportional columns collapse, which is reported
    /// as a diagnostic, not an error.
    pub fn resolve(
        &self,
        content_width: Pt,
        debug: Option<Arc<DebugLogger>>,
    ) -> ResolvedColumns {
        let fixed_sum: Pt = self.declared.iter().map(|w| w.fixed).sum();
        let factor_sum: f32 = self.declared.iter().map(|w| w.factor).sum();
        let unit = if factor_sum > 0.0 {
            if fixed_sum < content_width {
                (content_width - fixed_sum) / factor_sum
            } else {
                if let Some(debug) = debug.as_ref() {
                    debug.log_json(
                        "{\"type\":\"columns.no_distributable_space\",\
                         \"detail\":\"absolute widths consume the content area\"}",
                    );
                    debug.increment("columns.no_distributable_space", 1);
                }
                Pt::ZERO
            }
        } else {
            Pt::ZERO
        };
        let widths = self
            .declared
            .iter()
            .map(|w| w.fixed + unit * w.factor)
            .collect();
        ResolvedColumns {
            widths,
            unit,
            max_referenced: Cell::new(0),
            debug,
        }
    }
}

/// Resolved per-pass widths. Queries are pure functions of the resolved
/// state; out-of-range references follow the last-column leniency policy
/// and are surfaced once per geometry as a diagnostic.
pub struct ResolvedColumns {
    widths: Vec<Pt>,
    unit: Pt,
    max_referenced: Cell<usize>,
    debug: Option<Arc<DebugLogger>>,
}

impl ResolvedColumns {
    pub fn count(&self) -> usize {
        self.widths.len()
    }

    pub fn unit(&self) -> Pt {
        self.unit
    }

    /// Width of the column at the given 1-based index. An index beyond the
    /// declared columns reuses the last declared column's width.
    pub fn width_at(&self, col: ColIndex) -> Pt {
        let index = col.0.max(1);
        if index > self.widths.len() {
            if index > self.max_referenced.get() {
                self.max_referenced.set(index);
                if let Some(debug) = self.debug.as_ref() {
                    debug.log_json(&format!(
                        "{{\"type\":\"columns.out_of_range\",\"column\":{},\"declared\":{}}}",
                        index,
                        self.widths.len()
                    ));
                    debug.increment("columns.out_of_range", 1);
                }
            }
            return self.widths.last().copied().unwrap_or(Pt::ZERO);
        }
        self.widths[index - 1]
    }

    /// Offset of the column's leading edge irrespective of writing mode:
    /// the sum of the widths before it (left-to-right) or after its span
    /// (right-to-left).
    pub fn x_offset(&self, col: ColIndex, span: usize, direction: ColumnDirection) -> Pt {
        let span = span.max(1);
        match direction {
            ColumnDirection::LeftToRight => {
                let mut offset = Pt::ZERO;
                for index in 1..col.0.max(1) {
                    offset += self.width_at(ColIndex(index));
                }
                offset
            }
            ColumnDirection::RightToLeft => {
                let mut offset = Pt::ZERO;
                for index in (col.0 + span)..=self.widths.len() {
                    offset += self.width_at(ColIndex(index));
                }
                offset
            }
        }
    }

    /// Sum of all column widths, counting out-of-range references that
    /// have been observed so far at the last column's width.
    pub fn sum_widths(&self) -> Pt {
        let mut sum: Pt = self.widths.iter().sum();
        let referenced = self.max_referenced.get();
        if referenced > self.widths.len() {
            let extra = referenced - self.widths.len();
            sum += self.widths.last().copied().unwrap_or(Pt::ZERO) * (extra as i32);
        }
        sum
    }
}

impl std::fmt::Debug for ResolvedColumns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedColumns")
            .field("widths", &self.widths)
            .field("unit", &self.unit)
            .finish()
    }
}
