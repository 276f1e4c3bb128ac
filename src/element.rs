use crate::types::Pt;

/// Class of a forced break, ordered by scope. Merging two classes keeps the
/// wider one so a page-level break requested by any cell wins over a
/// column-level break requested by another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BreakClass {
    Auto,
    Column,
    Page,
    Region,
}

impl BreakClass {
    pub fn stronger(self, other: BreakClass) -> BreakClass {
        if self >= other { self } else { other }
    }

    pub fn is_forced(self) -> bool {
        !matches!(self, BreakClass::Auto)
    }
}

/// Break cost of a penalty element. A tagged type instead of integer
/// sentinels: `Never` and `Forced` cannot be confused with an ordinary
/// cost value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cost {
    Breakable(i32),
    Never,
    Forced,
}

impl Cost {
    pub fn allows_break(self) -> bool {
        !matches!(self, Cost::Never)
    }

    pub fn is_forced(self) -> bool {
        matches!(self, Cost::Forced)
    }
}

/// One atomic unit of a cell's formatted content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Element {
    /// Non-breakable content of fixed extent.
    Box { length: Pt },
    /// Breakable space. A break is legal at a glue only when the element
    /// before it is a box.
    Glue { length: Pt, stretch: Pt, shrink: Pt },
    /// Explicit candidate break. The length is charged to a step only when
    /// the step actually ends here.
    Penalty {
        length: Pt,
        cost: Cost,
        class: BreakClass,
    },
}

impl Element {
    pub fn boxed(length: Pt) -> Element {
        Element::Box { length }
    }

    pub fn glue(length: Pt, stretch: Pt, shrink: Pt) -> Element {
        Element::Glue {
            length,
            stretch,
            shrink,
        }
    }

    pub fn penalty(length: Pt, cost: Cost) -> Element {
        Element::Penalty {
            length,
            cost,
            class: BreakClass::Auto,
        }
    }

    pub fn forced_break(length: Pt, class: BreakClass) -> Element {
        Element::Penalty {
            length,
            cost: Cost::Forced,
            class,
        }
    }

    pub fn is_box(&self) -> bool {
        matches!(self, Element::Box { .. })
    }

    pub fn is_glue(&self) -> bool {
        matches!(self, Element::Glue { .. })
    }

    pub fn is_penalty(&self) -> bool {
        matches!(self, Element::Penalty { .. })
    }

    /// Extent this element occupies when the content is not broken at it.
    /// Penalty lengths only materialize at a break, so they report zero.
    pub fn flow_length(&self) -> Pt {
        match self {
            Element::Box { length } => *length,
            Element::Glue { length, .. } => *length,
            Element::Penalty { .. } => Pt::ZERO,
        }
    }
}

/// True when fragmentation is permitted at position `at`: either a penalty
/// whose cost allows breaking, or a glue directly preceded by a box.
pub fn is_legal_break(elements: &[Element], at: usize) -> bool {
    match elements.get(at) {
        Some(Element::Penalty { cost, .. }) => cost.allows_break(),
        Some(Element::Glue { .. }) => at > 0 && elements[at - 1].is_box(),
        _ => false,
    }
}

/// Length the sequence occupies when every legal break is ignored: the sum
/// of all box and glue lengths. An empty sequence is zero, not an error.
pub fn natural_length(elements: &[Element]) -> Pt {
    elements.iter().map(Element::flow_length).sum()
}

/// True when the sequence, taken unbroken, fits within `extent`. Mirrors
/// the fits-without-breaking test used to collapse a cell into a single
/// fixed-height box.
pub fn fits_unbroken(elements: &[Element], extent: Pt) -> bool {
    natural_length(elements) <= extent
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(v: i32) -> Pt {
        Pt::from_i32(v)
    }

    #[test]
    fn glue_break_requires_preceding_box() {
        let elements = [
            Element::glue(pt(5), Pt::ZERO, Pt::ZERO),
            Element::boxed(pt(100)),
            Element::glue(pt(10), pt(5), pt(5)),
            Element::glue(pt(10), Pt::ZERO, Pt::ZERO),
        ];
        assert!(!is_legal_break(&elements, 0));
        assert!(!is_legal_break(&elements, 1));
        assert!(is_legal_break(&elements, 2));
        assert!(!is_legal_break(&elements, 3));
    }

    #[test]
    fn penalty_legality_follows_cost() {
        let elements = [
            Element::boxed(pt(40)),
            Element::penalty(Pt::ZERO, Cost::Never),
            Element::boxed(pt(40)),
            Element::penalty(Pt::ZERO, Cost::Breakable(50)),
            Element::forced_break(Pt::ZERO, BreakClass::Page),
        ];
        assert!(!is_legal_break(&elements, 1));
        assert!(is_legal_break(&elements, 3));
        assert!(is_legal_break(&elements, 4));
    }

    #[test]
    fn empty_sequence_has_no_breaks_and_no_length() {
        assert!(!is_legal_break(&[], 0));
        assert_eq!(natural_length(&[]), Pt::ZERO);
    }

    #[test]
    fn natural_length_skips_penalty_lengths() {
        let elements = [
            Element::boxed(pt(100)),
            Element::penalty(pt(7), Cost::Breakable(0)),
            Element::glue(pt(10), pt(5), pt(5)),
            Element::boxed(pt(50)),
        ];
        assert_eq!(natural_length(&elements), pt(160));
        assert!(fits_unbroken(&elements, pt(160)));
        assert!(!fits_unbroken(&elements, pt(159)));
    }

    #[test]
    fn stronger_break_class_wins() {
        assert_eq!(
            BreakClass::Column.stronger(BreakClass::Page),
            BreakClass::Page
        );
        assert_eq!(
            BreakClass::Region.stronger(BreakClass::Auto),
            BreakClass::Region
        );
        assert!(!BreakClass::Auto.is_forced());
    }
}
