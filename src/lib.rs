mod cell;
mod columns;
mod debug;
mod element;
mod error;
mod grid;
mod perf;
mod stepper;
mod types;

pub use cell::CellCursor;
pub use columns::{ColumnGeometry, ColumnSpec, ColumnWidth, ResolvedColumns};
pub use debug::DebugLogger;
pub use element::{BreakClass, Cost, Element, is_legal_break, natural_length};
pub use error::CreaseError;
pub use grid::{
    BorderModel, CellPart, CellRef, ColumnDirection, GridCell, RowGroup, RowProfile,
};
pub use stepper::Step;
pub use types::{ColIndex, Pt, RowIndex};

use perf::PerfLogger;
use stepper::{RowGroupStepper, StepperConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Engine handle for one document's table fragmentation. Holds the
/// table-level configuration every row-group pass shares and the optional
/// diagnostic sinks. Row-groups are fragmented independently and
/// sequentially; run one engine per document for parallelism.
pub struct Crease {
    border_model: BorderModel,
    column_direction: ColumnDirection,
    table_keep_together: bool,
    repeated_header_extent: Pt,
    repeated_footer_extent: Pt,
    omit_header_at_break: bool,
    omit_footer_at_break: bool,
    debug: Option<Arc<DebugLogger>>,
    perf: Option<Arc<PerfLogger>>,
    group_counter: AtomicUsize,
}

impl Crease {
    pub fn builder() -> CreaseBuilder {
        CreaseBuilder::new()
    }

    /// Fragments one row-group into its ordered step sequence. The group
    /// is checked against the front-end contract first; fragmentation
    /// itself never fails, it only enlarges infeasible steps.
    pub fn fragment_row_group(&self, group: &RowGroup) -> Result<Vec<Step>, CreaseError> {
        group.validate()?;
        let ordinal = self.group_counter.fetch_add(1, Ordering::Relaxed);
        let start = self.perf.as_ref().map(|_| Instant::now());

        let config = StepperConfig {
            border_model: self.border_model,
            table_keep_together: self.table_keep_together,
            repeated_header_extent: if self.omit_header_at_break {
                Pt::ZERO
            } else {
                self.repeated_header_extent
            },
            repeated_footer_extent: if self.omit_footer_at_break {
                Pt::ZERO
            } else {
                self.repeated_footer_extent
            },
        };
        let steps = RowGroupStepper::new(group, config).run();

        if let (Some(perf), Some(start)) = (self.perf.as_deref(), start) {
            perf.log_span_ms(
                "fragment.row_group",
                Some(ordinal),
                start.elapsed().as_secs_f64() * 1000.0,
            );
            perf.log_counts(
                "fragment.row_group",
                Some(ordinal),
                &[
                    ("rows", group.len() as u64),
                    ("steps", steps.len() as u64),
                ],
            );
        }
        if let Some(debug) = self.debug.as_deref() {
            debug.increment("fragment.row_groups", 1);
            debug.increment("fragment.steps", steps.len() as u64);
        }
        Ok(steps)
    }

    /// Resolves a table's declared columns against its content area width.
    /// Done once per table layout pass, up front.
    pub fn resolve_columns(
        &self,
        geometry: &ColumnGeometry,
        content_width: Pt,
    ) -> ResolvedColumns {
        geometry.resolve(content_width, self.debug.clone())
    }

    /// Horizontal offset of a cell under the engine's configured column
    /// progression direction.
    pub fn column_x_offset(&self, columns: &ResolvedColumns, col: ColIndex, span: usize) -> Pt {
        columns.x_offset(col, span, self.column_direction)
    }

    pub fn column_direction(&self) -> ColumnDirection {
        self.column_direction
    }

    /// Flushes the diagnostic sinks, emitting the counter summary.
    pub fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = self.debug.as_deref() {
            logger.emit_summary(context);
            logger.flush();
        }
        if let Some(perf) = self.perf.as_deref() {
            perf.flush();
        }
    }
}

#[derive(Clone)]
pub struct CreaseBuilder {
    border_model: BorderModel,
    column_direction: ColumnDirection,
    table_keep_together: bool,
    repeated_header_extent: Pt,
    repeated_footer_extent: Pt,
    omit_header_at_break: bool,
    omit_footer_at_break: bool,
    debug_path: Option<std::path::PathBuf>,
    perf_path: Option<std::path::PathBuf>,
}

impl CreaseBuilder {
    pub fn new() -> Self {
        Self {
            border_model: BorderModel::Separate,
            column_direction: ColumnDirection::LeftToRight,
            table_keep_together: false,
            repeated_header_extent: Pt::ZERO,
            repeated_footer_extent: Pt::ZERO,
            omit_header_at_break: false,
            omit_footer_at_break: false,
            debug_path: None,
            perf_path: None,
        }
    }

    pub fn border_model(mut self, model: BorderModel) -> Self {
        self.border_model = model;
        self
    }

    pub fn column_direction(mut self, direction: ColumnDirection) -> Self {
        self.column_direction = direction;
        self
    }

    pub fn table_keep_together(mut self, keep: bool) -> Self {
        self.table_keep_together = keep;
        self
    }

    // Net height of the header rows repeated after each break. Charged to
    // every step's penalty unless omission is requested.
    pub fn repeated_header_extent(mut self, extent: Pt) -> Self {
        self.repeated_header_extent = extent;
        self
    }

    pub fn repeated_footer_extent(mut self, extent: Pt) -> Self {
        self.repeated_footer_extent = extent;
        self
    }

    pub fn omit_header_at_break(mut self, omit: bool) -> Self {
        self.omit_header_at_break = omit;
        self
    }

    pub fn omit_footer_at_break(mut self, omit: bool) -> Self {
        self.omit_footer_at_break = omit;
        self
    }

    pub fn debug_log_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn perf_log_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Crease, CreaseError> {
        if self.repeated_header_extent < Pt::ZERO {
            return Err(CreaseError::InvalidConfiguration(
                "repeated_header_extent must not be negative".to_string(),
            ));
        }
        if self.repeated_footer_extent < Pt::ZERO {
            return Err(CreaseError::InvalidConfiguration(
                "repeated_footer_extent must not be negative".to_string(),
            ));
        }
        let debug = match self.debug_path.as_ref() {
            Some(path) => Some(Arc::new(DebugLogger::new(path)?)),
            None => None,
        };
        let perf = match self.perf_path.as_ref() {
            Some(path) => Some(Arc::new(PerfLogger::new(path)?)),
            None => None,
        };
        Ok(Crease {
            border_model: self.border_model,
            column_direction: self.column_direction,
            table_keep_together: self.table_keep_together,
            repeated_header_extent: self.repeated_header_extent,
            repeated_footer_extent: self.repeated_footer_extent,
            omit_header_at_break: self.omit_header_at_break,
            omit_footer_at_break: self.omit_footer_at_break,
            debug,
            perf,
            group_counter: AtomicUsize::new(0),
        })
    }
}

impl Default for CreaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn pt(v: i32) -> Pt {
        Pt::from_i32(v)
    }

    fn temp_log_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!(
            "crease_{tag}_{}_{}.jsonl",
            std::process::id(),
            nanos
        ))
    }

    fn two_part_cell(col: usize) -> GridCell {
        GridCell::new(
            ColIndex(col),
            vec![
                Element::boxed(pt(100)),
                Element::glue(pt(10), pt(5), pt(5)),
                Element::boxed(pt(50)),
            ],
        )
    }

    #[test]
    fn builder_rejects_negative_header_extent() {
        let err = match Crease::builder()
            .repeated_header_extent(Pt::from_f32(-1.0))
            .build()
        {
            Ok(_) => panic!("negative header extent should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, CreaseError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("repeated_header_extent"));
    }

    #[test]
    fn builder_rejects_negative_footer_extent() {
        let err = match Crease::builder()
            .repeated_footer_extent(Pt::from_f32(-0.5))
            .build()
        {
            Ok(_) => panic!("negative footer extent should fail"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("repeated_footer_extent"));
    }

    #[test]
    fn fragment_rejects_contract_violations() {
        let engine = Crease::builder().build().expect("engine");
        let group = RowGroup::new(vec![
            RowProfile::new(pt(20))
                .with_cell(GridCell::new(ColIndex(1), Vec::new()).with_row_span(4)),
        ]);
        let err = engine.fragment_row_group(&group).unwrap_err();
        assert!(matches!(err, CreaseError::SpanOutOfBounds { .. }));
    }

    #[test]
    fn single_cell_group_breaks_at_each_legal_point() {
        let engine = Crease::builder().build().expect("engine");
        let group = RowGroup::new(vec![
            RowProfile::new(pt(160)).with_cell(two_part_cell(1)),
        ]);
        let steps = engine.fragment_row_group(&group).expect("steps");
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].total_length, pt(110));
        assert_eq!(steps[1].total_length, pt(160));
    }

    #[test]
    fn explicit_height_group_yields_one_step_spanning_original_content() {
        let engine = Crease::builder().build().expect("engine");
        let group = RowGroup::new(vec![
            RowProfile::new(pt(200))
                .with_explicit_height(pt(200))
                .with_cell(two_part_cell(1)),
        ]);
        let steps = engine.fragment_row_group(&group).expect("steps");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].total_length, pt(200));
        assert_eq!(steps[0].parts.len(), 1);
        assert_eq!(steps[0].parts[0].start, 0);
        assert_eq!(steps[0].parts[0].end, 2);
    }

    #[test]
    fn three_row_span_walks_every_row() {
        let engine = Crease::builder().build().expect("engine");
        let group = RowGroup::new(vec![
            RowProfile::new(pt(40))
                .with_cell(GridCell::new(ColIndex(1), vec![Element::boxed(pt(40))]))
                .with_cell(
                    GridCell::new(
                        ColIndex(2),
                        vec![
                            Element::boxed(pt(40)),
                            Element::penalty(Pt::ZERO, Cost::Breakable(0)),
                            Element::boxed(pt(40)),
                            Element::penalty(Pt::ZERO, Cost::Breakable(0)),
                            Element::boxed(pt(40)),
                        ],
                    )
                    .with_row_span(3),
                ),
            RowProfile::new(pt(40))
                .with_cell(GridCell::new(ColIndex(1), vec![Element::boxed(pt(40))])),
            RowProfile::new(pt(40))
                .with_cell(GridCell::new(ColIndex(1), vec![Element::boxed(pt(40))])),
        ]);
        let steps = engine.fragment_row_group(&group).expect("steps");
        let last = steps.last().expect("at least one step");
        assert_eq!(last.row, RowIndex(2));
        assert_eq!(last.total_length, pt(120));
        // The spanning cell contributes on every row it crosses.
        for row in 0..3 {
            assert!(
                steps
                    .iter()
                    .filter(|s| s.row == RowIndex(row))
                    .flat_map(|s| s.parts.iter())
                    .any(|p| p.cell.col == ColIndex(2)),
                "no spanning-cell part on row {row}"
            );
        }
    }

    #[test]
    fn collapse_model_halves_step_borders() {
        let cell = |col| {
            GridCell::new(ColIndex(col), vec![Element::boxed(pt(100))])
                .with_borders(pt(4), pt(4))
        };
        let separate = Crease::builder().build().expect("engine");
        let group = RowGroup::new(vec![RowProfile::new(pt(100)).with_cell(cell(1))]);
        let steps = separate.fragment_row_group(&group).expect("steps");
        assert_eq!(steps[0].total_length, pt(108));

        let collapse = Crease::builder()
            .border_model(BorderModel::Collapse)
            .build()
            .expect("engine");
        let steps = collapse.fragment_row_group(&group).expect("steps");
        assert_eq!(steps[0].total_length, pt(104));
    }

    #[test]
    fn out_of_range_column_is_lenient_and_logged() {
        let debug_path = temp_log_path("columns");
        let engine = Crease::builder()
            .debug_log_path(&debug_path)
            .build()
            .expect("engine");
        let geometry = ColumnGeometry::new(&[
            ColumnSpec::new(ColumnWidth::fixed(pt(100))),
            ColumnSpec::new(ColumnWidth::fixed(pt(50))),
        ]);
        let resolved = engine.resolve_columns(&geometry, pt(400));
        assert_eq!(resolved.width_at(ColIndex(5)), pt(50));
        engine.emit_debug_summary("test");
        let log = std::fs::read_to_string(&debug_path).expect("debug log");
        assert!(log.contains("columns.out_of_range"));
        let _ = std::fs::remove_file(&debug_path);
    }

    #[test]
    fn rtl_direction_flips_offsets() {
        let engine = Crease::builder()
            .column_direction(ColumnDirection::RightToLeft)
            .build()
            .expect("engine");
        let geometry = ColumnGeometry::new(&[
            ColumnSpec::new(ColumnWidth::fixed(pt(100))),
            ColumnSpec::new(ColumnWidth::fixed(pt(50))),
        ]);
        let resolved = engine.resolve_columns(&geometry, pt(150));
        assert_eq!(engine.column_x_offset(&resolved, ColIndex(1), 1), pt(50));
        assert_eq!(engine.column_x_offset(&resolved, ColIndex(2), 1), Pt::ZERO);
    }

    #[test]
    fn repeated_header_extent_flows_into_penalties() {
        let engine = Crease::builder()
            .repeated_header_extent(pt(30))
            .build()
            .expect("engine");
        let group = RowGroup::new(vec![
            RowProfile::new(pt(160)).with_cell(two_part_cell(1)),
        ]);
        let steps = engine.fragment_row_group(&group).expect("steps");
        assert!(steps.iter().all(|s| s.penalty_length >= pt(30)));

        let omitting = Crease::builder()
            .repeated_header_extent(pt(30))
            .omit_header_at_break(true)
            .build()
            .expect("engine");
        let steps = omitting.fragment_row_group(&group).expect("steps");
        assert!(steps.iter().any(|s| s.penalty_length < pt(30)));
    }

    #[test]
    fn perf_log_records_row_group_spans() {
        let perf_path = temp_log_path("perf");
        {
            let engine = Crease::builder()
                .perf_log_path(&perf_path)
                .build()
                .expect("engine");
            let group = RowGroup::new(vec![
                RowProfile::new(pt(160)).with_cell(two_part_cell(1)),
            ]);
            engine.fragment_row_group(&group).expect("steps");
            engine.emit_debug_summary("test");
            let log = std::fs::read_to_string(&perf_path).expect("perf log");
            assert!(log.contains("fragment.row_group"));
            assert!(log.contains("\"steps\":2"));
        }
        let _ = std::fs::remove_file(&perf_path);
        let hot = perf_path.with_file_name(
            perf_path
                .file_stem()
                .map(|s| format!("{}_hot.log", s.to_string_lossy()))
                .unwrap_or_default(),
        );
        let _ = std::fs::remove_file(&hot);
    }
}
