use smallvec::SmallVec;

use crate::cell::CellCursor;
use crate::element::BreakClass;
use crate::grid::{BorderModel, CellPart, RowGroup};
use crate::types::{Pt, RowIndex};

fn step_debug_enabled() -> bool {
    static ENABLED: std::sync::OnceLock<bool> = std::sync::OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var("CREASE_STEP_DEBUG")
            .ok()
            .map(|v| {
                let v = v.trim();
                v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
            })
            .unwrap_or(false)
    })
}

/// One shared break across every cursor active in the row-group: the
/// fragments it produced, where it sits, and what breaking there costs.
#[derive(Debug, Clone)]
pub struct Step {
    /// Fragments contributed by the cursors that committed this step.
    pub parts: Vec<CellPart>,
    /// Row that was active when the step was emitted.
    pub row: RowIndex,
    /// Cumulative extent from the top of the row-group to this break.
    pub total_length: Pt,
    /// Extent of the active row consumed through this step.
    pub row_height: Pt,
    /// Content newly placed by this step.
    pub box_length: Pt,
    /// Cost of actually breaking here: trailing borders/paddings plus any
    /// repeated header/footer extents.
    pub penalty_length: Pt,
    /// Breaking after this step is forbidden by a keep constraint.
    pub keep_with_next: bool,
    /// Forced break propagated from a cell or row; `Auto` means none.
    pub break_class: BreakClass,
}

/// Coordinator configuration threaded down from the engine handle.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StepperConfig {
    pub border_model: BorderModel,
    pub table_keep_together: bool,
    pub repeated_header_extent: Pt,
    pub repeated_footer_extent: Pt,
}

/// Drives the cursors of one row-group through lock-step breaking rounds:
/// every round asks each live cursor for its next candidate break, commits
/// the smallest one to all of them, and collects the fragments of the
/// cursors that placed content. Cursors are introduced as their row starts
/// and retired once their cell's last spanned row is done.
pub(crate) struct RowGroupStepper<'a> {
    group: &'a RowGroup,
    config: StepperConfig,
    active: SmallVec<[CellCursor<'a>; 4]>,
    current_row: RowIndex,
    prior_rows_length: Pt,
    total_height: Pt,
    cumulated_box: Pt,
}

impl<'a> RowGroupStepper<'a> {
    pub fn new(group: &'a RowGroup, config: StepperConfig) -> RowGroupStepper<'a> {
        let mut stepper = RowGroupStepper {
            group,
            config,
            active: SmallVec::new(),
            current_row: RowIndex(0),
            prior_rows_length: Pt::ZERO,
            total_height: group.total_natural_height(),
            cumulated_box: Pt::ZERO,
        };
        stepper.activate_row(RowIndex(0));
        stepper
    }

    fn activate_row(&mut self, row_index: RowIndex) {
        let row = self.group.row(row_index);
        for cell in row.cells() {
            self.active.push(CellCursor::new(
                row_index,
                cell,
                row,
                self.prior_rows_length,
                self.config.border_model,
                self.config.table_keep_together,
            ));
        }
    }

    fn switch_to_next_row(&mut self) {
        self.prior_rows_length += self.group.row(self.current_row).natural_height();
        self.current_row = self.current_row.next();
        for cursor in &mut self.active {
            cursor.next_row_starts();
        }
        if step_debug_enabled() {
            eprintln!(
                "[step.debug] switching to row {} prior_len={}",
                self.current_row, self.prior_rows_length
            );
        }
        self.activate_row(self.current_row);
    }

    /// Extent that may still arrive below the current break: what the
    /// current row's unfinished cells still hold, plus all rows after the
    /// active one. Feeds the penalty portion of each step.
    fn max_remaining_height(&self) -> Pt {
        let mut max = Pt::ZERO;
        for cursor in &self.active {
            max = max.max(cursor.remaining_height(self.current_row));
        }
        let mut total = max;
        for row in &self.group.rows()[self.current_row.0 + 1..] {
            total += row.natural_height();
        }
        total
    }

    /// Picks the smallest candidate across all live cursors. `None` once
    /// no cursor has anything further to offer on the current row.
    fn choose_step(&mut self) -> Option<Pt> {
        let mut chosen: Option<Pt> = None;
        for cursor in &mut self.active {
            if let Some(candidate) = cursor.next_step() {
                chosen = Some(match chosen {
                    Some(current) => current.min(candidate),
                    None => candidate,
                });
            }
        }
        chosen
    }

    /// Broadcasts the chosen length. A cursor reporting infeasibility
    /// (even its fixed overhead does not fit) enlarges the step to its own
    /// candidate and the broadcast is re-run, so content is never
    /// truncated to honor a too-small minimum.
    fn commit_step(&mut self, mut chosen: Pt) -> Pt {
        let mut enlarge_to = chosen;
        let mut overflowed = false;
        for cursor in &mut self.active {
            if cursor.commit(chosen) {
                overflowed = true;
                if let Some(candidate) = cursor.next_step() {
                    enlarge_to = enlarge_to.max(candidate);
                }
            }
        }
        if overflowed {
            if step_debug_enabled() {
                eprintln!(
                    "[step.debug] step {} infeasible, enlarging to {}",
                    chosen, enlarge_to
                );
            }
            chosen = enlarge_to;
            for cursor in &mut self.active {
                cursor.commit(chosen);
            }
        }
        chosen
    }

    /// Runs the full breaking pass and returns the ordered step sequence.
    pub fn run(mut self) -> Vec<Step> {
        let mut steps = Vec::new();
        loop {
            let Some(candidate) = self.choose_step() else {
                if self.current_row.0 + 1 < self.group.len() {
                    self.switch_to_next_row();
                    continue;
                }
                break;
            };
            let chosen = self.commit_step(candidate);

            let mut parts: SmallVec<[CellPart; 4]> = SmallVec::new();
            let mut keep = self.config.table_keep_together;
            let mut break_class = BreakClass::Auto;
            for cursor in &self.active {
                if cursor.contributes_content() {
                    parts.push(cursor.extract_fragment());
                    if cursor.ends_with_forced_break() {
                        break_class = break_class.stronger(cursor.last_break_class());
                    }
                }
                keep |= cursor.keep_with_next_requested();
            }

            let current_row = self.current_row;
            self.active
                .retain(|cursor| !(cursor.ends_on_row(current_row) && cursor.is_finished()));
            let row_completed = !self
                .active
                .iter()
                .any(|cursor| cursor.ends_on_row(current_row));

            let row = self.group.row(self.current_row);
            if row_completed {
                keep |= row.keep_with_next();
                break_class = break_class.stronger(row.break_after());
                if self.current_row.0 + 1 < self.group.len() {
                    let next = self.group.row(self.current_row.next());
                    keep |= next.keep_with_previous();
                    break_class = break_class.stronger(next.break_before());
                }
            } else if row.keep_together() {
                keep = true;
            }
            // A forced break overrides any keep.
            if break_class.is_forced() {
                keep = false;
            }

            let max_remaining = self.max_remaining_height();
            let raw_penalty = (chosen + max_remaining - self.total_height).max(Pt::ZERO);
            let penalty_length = raw_penalty
                + self.config.repeated_header_extent
                + self.config.repeated_footer_extent;
            let box_length = (chosen - self.cumulated_box - raw_penalty).max(Pt::ZERO);
            self.cumulated_box += box_length;

            if step_debug_enabled() {
                eprintln!(
                    "[step.debug] row={} step={} box={} penalty={} parts={} keep={} class={:?}",
                    self.current_row,
                    chosen,
                    box_length,
                    penalty_length,
                    parts.len(),
                    keep,
                    break_class
                );
            }

            steps.push(Step {
                parts: parts.into_vec(),
                row: self.current_row,
                total_length: chosen,
                row_height: (chosen - self.prior_rows_length).max(Pt::ZERO),
                box_length,
                penalty_length,
                keep_with_next: keep,
                break_class,
            });

            if row_completed && self.current_row.0 + 1 < self.group.len() {
                self.switch_to_next_row();
            }
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Cost, Element};
    use crate::grid::{GridCell, RowProfile};
    use crate::types::ColIndex;

    fn pt(v: i32) -> Pt {
        Pt::from_i32(v)
    }

    fn config() -> StepperConfig {
        StepperConfig {
            border_model: BorderModel::Separate,
            table_keep_together: false,
            repeated_header_extent: Pt::ZERO,
            repeated_footer_extent: Pt::ZERO,
        }
    }

    fn breakable(lengths: &[i32]) -> Vec<Element> {
        let mut elements = Vec::new();
        for (i, len) in lengths.iter().enumerate() {
            if i > 0 {
                elements.push(Element::penalty(Pt::ZERO, Cost::Breakable(0)));
            }
            elements.push(Element::boxed(pt(*len)));
        }
        elements
    }

    #[test]
    fn single_cell_produces_one_step_per_break() {
        let group = RowGroup::new(vec![
            RowProfile::new(pt(160)).with_cell(GridCell::new(
                ColIndex(1),
                vec![
                    Element::boxed(pt(100)),
                    Element::glue(pt(10), pt(5), pt(5)),
                    Element::boxed(pt(50)),
                ],
            )),
        ]);
        let steps = RowGroupStepper::new(&group, config()).run();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].total_length, pt(110));
        assert_eq!(steps[1].total_length, pt(160));
        assert_eq!(steps[0].parts, vec![CellPart {
            cell: crate::grid::CellRef {
                row: RowIndex(0),
                col: ColIndex(1),
            },
            start: 0,
            end: 1,
        }]);
        assert_eq!(steps[1].parts[0].start, 2);
        assert_eq!(steps[1].parts[0].end, 2);
    }

    #[test]
    fn minimum_candidate_wins_and_lagging_cursor_waits() {
        let group = RowGroup::new(vec![
            RowProfile::new(pt(160))
                .with_cell(GridCell::new(ColIndex(1), breakable(&[80, 80])))
                .with_cell(GridCell::new(ColIndex(2), breakable(&[120, 40]))),
        ]);
        let steps = RowGroupStepper::new(&group, config()).run();
        // Breaks interleave at cumulative 80, 120, 160.
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].total_length, pt(80));
        assert_eq!(steps[0].parts.len(), 1);
        assert_eq!(steps[0].parts[0].cell.col, ColIndex(1));
        assert_eq!(steps[1].total_length, pt(120));
        assert_eq!(steps[1].parts.len(), 1);
        assert_eq!(steps[1].parts[0].cell.col, ColIndex(2));
        assert_eq!(steps[2].total_length, pt(160));
        assert_eq!(steps[2].parts.len(), 2);
    }

    #[test]
    fn length_conservation_across_all_steps() {
        let group = RowGroup::new(vec![
            RowProfile::new(pt(160))
                .with_cell(GridCell::new(ColIndex(1), breakable(&[50, 50, 60])))
                .with_cell(GridCell::new(ColIndex(2), breakable(&[70, 90]))),
        ]);
        let steps = RowGroupStepper::new(&group, config()).run();
        let last = steps.last().unwrap();
        assert_eq!(last.total_length, pt(160));
        // The box portions of all steps add back up to the group extent.
        let boxed: Pt = steps.iter().map(|s| s.box_length).sum();
        assert_eq!(boxed, pt(160));
    }

    #[test]
    fn spanning_cell_survives_across_rows() {
        let group = RowGroup::new(vec![
            RowProfile::new(pt(40))
                .with_cell(GridCell::new(ColIndex(1), breakable(&[40])))
                .with_cell(GridCell::new(ColIndex(2), breakable(&[40, 40])).with_row_span(2)),
            RowProfile::new(pt(40)).with_cell(GridCell::new(ColIndex(1), breakable(&[40]))),
        ]);
        let steps = RowGroupStepper::new(&group, config()).run();
        let last = steps.last().unwrap();
        assert_eq!(last.total_length, pt(80));
        assert_eq!(last.row, RowIndex(1));
        // The spanning cell's tail lands in the second row's steps.
        assert!(
            steps
                .iter()
                .filter(|s| s.row == RowIndex(1))
                .flat_map(|s| s.parts.iter())
                .any(|p| p.cell.col == ColIndex(2))
        );
    }

    #[test]
    fn forced_break_in_cell_forces_group_break() {
        let group = RowGroup::new(vec![
            RowProfile::new(pt(80)).with_cell(GridCell::new(
                ColIndex(1),
                vec![
                    Element::boxed(pt(40)),
                    Element::forced_break(Pt::ZERO, BreakClass::Page),
                    Element::boxed(pt(40)),
                ],
            )),
        ]);
        let steps = RowGroupStepper::new(&group, config()).run();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].break_class, BreakClass::Page);
        assert!(!steps[0].keep_with_next);
        assert_eq!(steps[1].break_class, BreakClass::Auto);
    }

    #[test]
    fn row_keeps_mark_intermediate_steps() {
        // The spanning cell offers a break inside the first row; the row's
        // keep-together must forbid taking it.
        let group = RowGroup::new(vec![
            RowProfile::new(pt(40))
                .with_keep_together(true)
                .with_cell(GridCell::new(ColIndex(1), breakable(&[20, 60])).with_row_span(2))
                .with_cell(GridCell::new(ColIndex(2), breakable(&[40]))),
            RowProfile::new(pt(40)),
        ]);
        let steps = RowGroupStepper::new(&group, config()).run();
        assert_eq!(steps.len(), 3);
        // Breaking inside the kept row is forbidden; after it is fine.
        assert!(steps[0].keep_with_next);
        assert!(!steps[1].keep_with_next);
    }

    #[test]
    fn keep_together_row_collapses_to_one_step() {
        let group = RowGroup::new(vec![
            RowProfile::new(pt(80))
                .with_keep_together(true)
                .with_cell(GridCell::new(ColIndex(1), breakable(&[40, 40]))),
        ]);
        let steps = RowGroupStepper::new(&group, config()).run();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].total_length, pt(80));
    }

    #[test]
    fn keep_with_next_row_holds_the_row_boundary() {
        let group = RowGroup::new(vec![
            RowProfile::new(pt(40))
                .with_keep_with_next(true)
                .with_cell(GridCell::new(ColIndex(1), breakable(&[40]))),
            RowProfile::new(pt(40)).with_cell(GridCell::new(ColIndex(1), breakable(&[40]))),
        ]);
        let steps = RowGroupStepper::new(&group, config()).run();
        assert_eq!(steps.len(), 2);
        assert!(steps[0].keep_with_next);
        assert!(!steps[1].keep_with_next);
    }

    #[test]
    fn repeated_header_inflates_step_penalties() {
        let group = RowGroup::new(vec![
            RowProfile::new(pt(80)).with_cell(GridCell::new(ColIndex(1), breakable(&[40, 40]))),
        ]);
        let mut cfg = config();
        cfg.repeated_header_extent = pt(25);
        let steps = RowGroupStepper::new(&group, cfg).run();
        assert!(steps.iter().all(|s| s.penalty_length >= pt(25)));
    }

    #[test]
    fn row_heights_track_row_local_extent() {
        let group = RowGroup::new(vec![
            RowProfile::new(pt(40)).with_cell(GridCell::new(ColIndex(1), breakable(&[40]))),
            RowProfile::new(pt(60)).with_cell(GridCell::new(ColIndex(1), breakable(&[30, 30]))),
        ]);
        let steps = RowGroupStepper::new(&group, config()).run();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].row_height, pt(40));
        assert_eq!(steps[1].row_height, pt(30));
        assert_eq!(steps[2].row_height, pt(60));
    }

    #[test]
    fn empty_trailing_row_still_advances() {
        let group = RowGroup::new(vec![
            RowProfile::new(pt(40)).with_cell(GridCell::new(ColIndex(1), breakable(&[40]))),
            RowProfile::new(pt(20)),
        ]);
        let steps = RowGroupStepper::new(&group, config()).run();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].total_length, pt(40));
    }
}
