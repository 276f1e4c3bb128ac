use crate::element::{BreakClass, Element, fits_unbroken, natural_length};
use crate::grid::{BorderModel, CellPart, CellRef, GridCell, RowProfile};
use crate::types::{Pt, RowIndex};

/// Content a cursor walks over, decided once at construction. A cell whose
/// row has already been ruled unbreakable carries a single synthetic box
/// instead of its element sequence; the original range is remembered so
/// fragments still reference the true content.
#[derive(Debug, Clone, Copy)]
enum CellContent<'a> {
    Fragmentable(&'a [Element]),
    Unbreakable { length: Pt, original_len: usize },
}

/// Per-cell breaking state machine. One cursor lives from the row its cell
/// originates in until the cell's last spanned row is exhausted; the step
/// coordinator drives it through `next_step`/`commit` rounds and extracts
/// one fragment per committed window.
///
/// Candidate step lengths are cumulative from the top of the row-group:
/// the prior-rows offset plus all committed content plus the open window
/// (and its closing penalty, if any) plus the cell's borders and paddings.
/// That keeps candidates comparable across cells that started on
/// different rows.
pub struct CellCursor<'a> {
    origin: CellRef,
    content: CellContent<'a>,
    end_row: RowIndex,
    current_row: RowIndex,
    border_before: Pt,
    border_after: Pt,
    padding_before: Pt,
    padding_after: Pt,
    prior_rows_length: Pt,
    total_length: Pt,
    window_start: usize,
    window_end: Option<usize>,
    consumed: usize,
    accumulated: Pt,
    pending_penalty: Pt,
    committed: Option<Pt>,
    window_committed: bool,
    keep_with_next_flag: bool,
}

impl<'a> CellCursor<'a> {
    /// Builds the cursor for a cell originating on `origin_row`.
    /// `prior_rows_length` is the accumulated extent of the group's rows
    /// before that row, and `table_keep_together` carries the table-level
    /// keep constraint down to the unbreakable-substitution decision.
    pub fn new(
        origin_row: RowIndex,
        cell: &'a GridCell,
        row: &'a RowProfile,
        prior_rows_length: Pt,
        model: BorderModel,
        table_keep_together: bool,
    ) -> CellCursor<'a> {
        let elements = cell.elements();
        let keep_unbroken =
            cell.keep_together() || row.keep_together() || table_keep_together;
        // Substitution only applies when this cursor is the cell's one and
        // only row segment; a spanning cell's keep is honored by the
        // coordinator's step penalties instead.
        let content = if cell.row_span() == 1 {
            match row.explicit_height() {
                Some(height) if fits_unbroken(elements, height) || keep_unbroken => {
                    CellContent::Unbreakable {
                        length: height,
                        original_len: elements.len(),
                    }
                }
                None if keep_unbroken => CellContent::Unbreakable {
                    length: row.natural_height(),
                    original_len: elements.len(),
                },
                _ => CellContent::Fragmentable(elements),
            }
        } else {
            CellContent::Fragmentable(elements)
        };
        let content_length = match content {
            CellContent::Fragmentable(elements) => natural_length(elements),
            CellContent::Unbreakable { length, .. } => length,
        };
        CellCursor {
            origin: CellRef {
                row: origin_row,
                col: cell.col(),
            },
            content,
            end_row: RowIndex(origin_row.0 + cell.row_span() - 1),
            current_row: origin_row,
            border_before: cell.border_before(model),
            border_after: cell.border_after(model),
            padding_before: cell.padding_before(),
            padding_after: cell.padding_after(),
            prior_rows_length,
            total_length: prior_rows_length + content_length,
            window_start: 0,
            window_end: None,
            consumed: 0,
            accumulated: Pt::ZERO,
            pending_penalty: Pt::ZERO,
            committed: None,
            window_committed: false,
            keep_with_next_flag: cell.keep_with_next() || row.keep_with_next(),
        }
    }

    fn content_len(&self) -> usize {
        match self.content {
            CellContent::Fragmentable(elements) => elements.len(),
            CellContent::Unbreakable { .. } => 1,
        }
    }

    fn element_at(&self, index: usize) -> Element {
        match self.content {
            CellContent::Fragmentable(elements) => elements[index],
            CellContent::Unbreakable { length, .. } => Element::Box { length },
        }
    }

    fn edges_extent(&self) -> Pt {
        self.border_before + self.border_after + self.padding_before + self.padding_after
    }

    fn committed_content(&self) -> Pt {
        self.committed.unwrap_or(Pt::ZERO)
    }

    fn window_open(&self) -> bool {
        self.window_end.is_some() && !self.window_committed
    }

    fn candidate(&self) -> Pt {
        self.prior_rows_length
            + self.committed_content()
            + self.accumulated
            + self.pending_penalty
            + self.edges_extent()
    }

    pub fn grid_ref(&self) -> CellRef {
        self.origin
    }

    pub fn ends_on_row(&self, row: RowIndex) -> bool {
        row == self.end_row
    }

    /// The coordinator advanced to the next row while this cursor is still
    /// live (its cell spans further down).
    pub fn next_row_starts(&mut self) {
        self.current_row = self.current_row.next();
    }

    /// Extent this cursor still needs below the current step, counted only
    /// on the row the cell ends on. Zero for other rows and once all
    /// content has been committed.
    pub fn remaining_height(&self, active_row: RowIndex) -> Pt {
        if active_row != self.end_row {
            return Pt::ZERO;
        }
        if self.consumed >= self.content_len() && !self.window_open() {
            return Pt::ZERO;
        }
        let content_total = self.total_length - self.prior_rows_length;
        content_total - self.committed_content() + self.edges_extent()
    }

    /// Candidate length of the next shared break this cursor can offer,
    /// or `None` once its content is exhausted. Repeated calls without an
    /// intervening accepted `commit` return the same candidate; after an
    /// accepted commit the window advances past the break and the scan
    /// resumes at the next legal break.
    pub fn next_step(&mut self) -> Option<Pt> {
        if self.window_committed {
            self.window_start = self.consumed;
            self.window_end = None;
            self.accumulated = Pt::ZERO;
            self.pending_penalty = Pt::ZERO;
            self.window_committed = false;
        }
        let len = self.content_len();
        if self.window_end.is_none() {
            if self.window_start >= len {
                return None;
            }
            self.scan();
        }
        Some(self.candidate())
    }

    /// Scans forward from the window start for the next legal break,
    /// accumulating box and glue lengths on the way. A closing penalty's
    /// own length is held aside; it is only charged if the step really
    /// ends there. Running off the end closes the window at the last
    /// element (the end of the cell is always a break opportunity).
    fn scan(&mut self) {
        let len = self.content_len();
        let mut index = self.window_start;
        while index < len {
            match self.element_at(index) {
                Element::Penalty { length, cost, .. } => {
                    if cost.allows_break() {
                        self.window_end = Some(index);
                        self.pending_penalty = length;
                        return;
                    }
                }
                Element::Glue { length, .. } => {
                    self.accumulated += length;
                    if index > 0 && self.element_at(index - 1).is_box() {
                        self.window_end = Some(index);
                        return;
                    }
                }
                Element::Box { length } => {
                    self.accumulated += length;
                }
            }
            index += 1;
        }
        self.window_end = Some(len - 1);
    }

    /// Applies the coordinator's chosen step. Accepts the pending window
    /// when its own candidate fits within the chosen length; the return
    /// value is `true` only in the infeasible case where even this
    /// cursor's fixed overhead (prior rows plus borders and paddings)
    /// exceeds the chosen length, which the coordinator must resolve by
    /// enlarging the step.
    pub fn commit(&mut self, chosen: Pt) -> bool {
        if self.window_committed || self.window_end.is_none() {
            return false;
        }
        if self.candidate() <= chosen {
            self.accept_window();
            return false;
        }
        self.prior_rows_length + self.edges_extent() > chosen
    }

    fn accept_window(&mut self) {
        let len = self.content_len();
        let end = self.window_end.expect("commit on an unscanned window");
        let mut new_committed = self.committed_content() + self.accumulated;
        // Trailing glue and penalties right after the break never become
        // visible content; consume them now so they don't count towards
        // what's left. Consumed glue still counts as committed length,
        // keeping the cursor's totals conserved.
        let mut next = end + 1;
        while next < len {
            match self.element_at(next) {
                Element::Glue { length, .. } => {
                    new_committed += length;
                    next += 1;
                }
                Element::Penalty { .. } => {
                    next += 1;
                }
                Element::Box { .. } => break,
            }
        }
        self.committed = Some(new_committed);
        self.consumed = next;
        self.window_committed = true;
    }

    /// True while this cursor is the one actively producing a fragment for
    /// the step that was just committed.
    pub fn contributes_content(&self) -> bool {
        self.window_committed && self.window_end.is_some()
    }

    pub fn has_started(&self) -> bool {
        self.committed.is_some()
    }

    /// A cursor is finished once its content is exhausted and the group
    /// has reached the last row its cell spans. Content running out early
    /// never finishes a spanning cell before its end row.
    pub fn is_finished(&self) -> bool {
        self.consumed >= self.content_len()
            && !self.window_open()
            && self.current_row >= self.end_row
    }

    /// Fragment for the just-committed window. A substituted fixed-height
    /// cell reports its original element range so downstream consumers see
    /// the true content, never the synthetic box.
    pub fn extract_fragment(&self) -> CellPart {
        debug_assert!(self.window_committed, "no committed window to extract");
        match self.content {
            CellContent::Unbreakable { original_len, .. } => CellPart {
                cell: self.origin,
                start: 0,
                end: original_len.saturating_sub(1),
            },
            CellContent::Fragmentable(_) => CellPart {
                cell: self.origin,
                start: self.window_start,
                end: self.window_end.expect("no committed window to extract"),
            },
        }
    }

    /// True when the just-committed window ends in a forced penalty.
    pub fn ends_with_forced_break(&self) -> bool {
        if !self.window_committed {
            return false;
        }
        match self.window_end.map(|end| self.element_at(end)) {
            Some(Element::Penalty { cost, .. }) => cost.is_forced(),
            _ => false,
        }
    }

    /// Break class of the penalty ending the just-committed window. Only
    /// meaningful after `ends_with_forced_break` returned true; calling it
    /// on a window that did not end in a penalty is a caller protocol
    /// violation.
    pub fn last_break_class(&self) -> BreakClass {
        assert!(self.window_committed, "no committed window");
        let end = self.window_end.expect("no committed window");
        match self.element_at(end) {
            Element::Penalty { class, .. } => class,
            _ => panic!("committed window does not end in a penalty"),
        }
    }

    /// True once the cell's final content has been committed and the cell
    /// or its row asked to be kept with what follows.
    pub fn keep_with_next_requested(&self) -> bool {
        self.keep_with_next_flag && self.committed.is_some() && self.consumed >= self.content_len()
    }

    #[cfg(test)]
    pub(crate) fn committed_length(&self) -> Option<Pt> {
        self.committed
    }

    #[cfg(test)]
    pub(crate) fn window_bounds(&self) -> (usize, Option<usize>) {
        (self.window_start, self.window_end)
    }
}

impl std::fmt::Debug for CellCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellCursor")
            .field("origin", &self.origin)
            .field("end_row", &self.end_row)
            .field("window", &(self.window_start, self.window_end))
            .field("committed", &self.committed)
            .finish()
    }
}
