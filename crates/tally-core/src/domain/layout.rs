//! Layout catalog: the fixed set of multiviewer layout templates.
//!
//! Each card recalls its layout presets by a 1-based tally index.  The
//! catalog is the single place that maps an operator-facing layout key such
//! as `"6_SPLIT_L_UP"` to:
//!
//! - the number of input positions it consumes from the card's 9-input bank,
//! - the preset index pulsed over TSL 5.0,
//! - its grid geometry (named areas, column/row sizes, VIP cells) used by the
//!   UI to draw a preview.
//!
//! Positions are numbered left-to-right, top-to-bottom.  A *VIP* cell is a
//! larger, highlighted window.
//!
//! # Unknown names
//!
//! [`LayoutCatalog::tally_index_of`] never fails: an unknown key falls back to
//! index 1 (the 9-split preset).  The fallback is logged as a warning because
//! it usually means a typo in stored show data.

use serde::Serialize;
use tracing::warn;

/// Number of physical inputs shared by both sides of a card.
pub const BANK_SIZE: u8 = 9;

/// Tally index used when a layout name is not in the catalog.
pub const FALLBACK_TALLY_INDEX: u16 = 1;

/// Layout key that is never offered in side selectors.
pub const FULL_SCREEN: &str = "FULL_SCREEN";

/// One window of a layout grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutCell {
    /// 1-based input position this window shows.
    pub position: u8,
    /// CSS grid area name.
    pub area: &'static str,
    /// Highlighted, enlarged window.
    pub vip: bool,
}

/// An immutable layout template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDefinition {
    pub key: &'static str,
    pub name: &'static str,
    pub position_count: u8,
    pub tally_index: u16,
    /// CSS `grid-template-areas` value.
    pub template: &'static str,
    pub columns: &'static str,
    pub rows: &'static str,
    pub cells: &'static [LayoutCell],
}

impl LayoutDefinition {
    /// Returns the positions rendered as VIP windows.
    pub fn vip_positions(&self) -> impl Iterator<Item = u8> + '_ {
        self.cells.iter().filter(|c| c.vip).map(|c| c.position)
    }
}

const fn cell(position: u8, area: &'static str) -> LayoutCell {
    LayoutCell {
        position,
        area,
        vip: false,
    }
}

const fn vip(position: u8, area: &'static str) -> LayoutCell {
    LayoutCell {
        position,
        area,
        vip: true,
    }
}

/// The standard template set, in tally-index order.
pub static STANDARD_LAYOUTS: &[LayoutDefinition] = &[
    LayoutDefinition {
        key: "9_SPLIT",
        name: "9 SPLIT",
        position_count: 9,
        tally_index: 1,
        template: "\"p1 p2 p3\" \"p4 p5 p6\" \"p7 p8 p9\"",
        columns: "1fr 1fr 1fr",
        rows: "1fr 1fr 1fr",
        cells: &[
            cell(1, "p1"),
            cell(2, "p2"),
            cell(3, "p3"),
            cell(4, "p4"),
            cell(5, "p5"),
            cell(6, "p6"),
            cell(7, "p7"),
            cell(8, "p8"),
            cell(9, "p9"),
        ],
    },
    LayoutDefinition {
        key: "9_SPLIT_R",
        name: "9 SPLIT R",
        position_count: 9,
        tally_index: 2,
        template: "\"p1 p2 p3 p4 p5 p6\" \"p7 p9 p9 p9 p9 p9\" \"p8 p9 p9 p9 p9 p9\"",
        columns: "1fr 1fr 1fr 1fr 1fr 1fr",
        rows: "1fr 1fr 1fr",
        cells: &[
            cell(1, "p1"),
            cell(2, "p2"),
            cell(3, "p3"),
            cell(4, "p4"),
            cell(5, "p5"),
            cell(6, "p6"),
            cell(7, "p7"),
            cell(8, "p8"),
            vip(9, "p9"),
        ],
    },
    LayoutDefinition {
        key: "9_SPLIT_L",
        name: "9 SPLIT L",
        position_count: 9,
        tally_index: 3,
        template: "\"p1 p2 p3 p4 p5 p6\" \"p9 p9 p9 p9 p9 p7\" \"p9 p9 p9 p9 p9 p8\"",
        columns: "1fr 1fr 1fr 1fr 1fr 1fr",
        rows: "1fr 1fr 1fr",
        cells: &[
            cell(1, "p1"),
            cell(2, "p2"),
            cell(3, "p3"),
            cell(4, "p4"),
            cell(5, "p5"),
            cell(6, "p6"),
            cell(7, "p7"),
            cell(8, "p8"),
            vip(9, "p9"),
        ],
    },
    LayoutDefinition {
        key: "6_SPLIT_R",
        name: "6 SPLIT R",
        position_count: 6,
        tally_index: 4,
        template: "\"p1 p2 p3\" \"p4 p5 p5\" \"p6 p5 p5\"",
        columns: "1fr 1fr 1fr",
        rows: "1fr 1fr 1fr",
        cells: &[
            cell(1, "p1"),
            cell(2, "p2"),
            cell(3, "p3"),
            cell(4, "p4"),
            vip(5, "p5"),
            cell(6, "p6"),
        ],
    },
    LayoutDefinition {
        key: "6_SPLIT_L",
        name: "6 SPLIT L",
        position_count: 6,
        tally_index: 5,
        template: "\"p1 p2 p3\" \"p4 p4 p5\" \"p4 p4 p6\"",
        columns: "1fr 1fr 1fr",
        rows: "1fr 1fr 1fr",
        cells: &[
            cell(1, "p1"),
            cell(2, "p2"),
            cell(3, "p3"),
            vip(4, "p4"),
            cell(5, "p5"),
            cell(6, "p6"),
        ],
    },
    LayoutDefinition {
        key: "6_SPLIT_R_UP",
        name: "6 SPLIT R UP",
        position_count: 6,
        tally_index: 6,
        template: "\"p1 p2 p2\" \"p3 p2 p2\" \"p4 p5 p6\"",
        columns: "1fr 1fr 1fr",
        rows: "1fr 1fr 1fr",
        cells: &[
            cell(1, "p1"),
            vip(2, "p2"),
            cell(3, "p3"),
            cell(4, "p4"),
            cell(5, "p5"),
            cell(6, "p6"),
        ],
    },
    LayoutDefinition {
        key: "6_SPLIT_L_UP",
        name: "6 SPLIT L UP",
        position_count: 6,
        tally_index: 7,
        template: "\"p1 p1 p2\" \"p1 p1 p3\" \"p4 p5 p6\"",
        columns: "1fr 1fr 1fr",
        rows: "1fr 1fr 1fr",
        cells: &[
            vip(1, "p1"),
            cell(2, "p2"),
            cell(3, "p3"),
            cell(4, "p4"),
            cell(5, "p5"),
            cell(6, "p6"),
        ],
    },
    LayoutDefinition {
        key: "5_SPLIT",
        name: "5 SPLIT",
        position_count: 5,
        tally_index: 8,
        template: "\"p1 p1 p2 p2 p3 p3\" \"p4 p4 p4 p5 p5 p5\"",
        columns: "1fr 1fr 1fr 1fr 1fr 1fr",
        rows: "1fr 2fr",
        cells: &[
            cell(1, "p1"),
            cell(2, "p2"),
            cell(3, "p3"),
            vip(4, "p4"),
            vip(5, "p5"),
        ],
    },
    LayoutDefinition {
        key: "5_SPLIT_FLIP",
        name: "5 SPLIT FLIP",
        position_count: 5,
        tally_index: 9,
        template: "\"p1 p1 p1 p2 p2 p2\" \"p3 p3 p4 p4 p5 p5\"",
        columns: "1fr 1fr 1fr 1fr 1fr 1fr",
        rows: "2fr 1fr",
        cells: &[
            vip(1, "p1"),
            vip(2, "p2"),
            cell(3, "p3"),
            cell(4, "p4"),
            cell(5, "p5"),
        ],
    },
    LayoutDefinition {
        key: "4_SPLIT",
        name: "4 SPLIT",
        position_count: 4,
        tally_index: 10,
        template: "\"p1 p2\" \"p3 p4\"",
        columns: "1fr 1fr",
        rows: "1fr 1fr",
        cells: &[cell(1, "p1"), cell(2, "p2"), cell(3, "p3"), cell(4, "p4")],
    },
    LayoutDefinition {
        key: FULL_SCREEN,
        name: "FULL SCREEN",
        position_count: 1,
        tally_index: 11,
        template: "\"p1\"",
        columns: "1fr",
        rows: "1fr",
        cells: &[vip(1, "p1")],
    },
];

/// Read-only lookup over a set of layout templates.
#[derive(Debug, Clone, Copy)]
pub struct LayoutCatalog {
    layouts: &'static [LayoutDefinition],
}

impl Default for LayoutCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl LayoutCatalog {
    /// Returns the catalog of the eleven standard multiviewer layouts.
    pub fn standard() -> Self {
        Self {
            layouts: STANDARD_LAYOUTS,
        }
    }

    /// Returns every layout in tally-index order.
    pub fn all(&self) -> &'static [LayoutDefinition] {
        self.layouts
    }

    /// Looks up a layout by key (e.g. `"4_SPLIT"`).
    pub fn get(&self, key: &str) -> Option<&'static LayoutDefinition> {
        self.layouts.iter().find(|l| l.key == key)
    }

    /// Returns the number of input positions `key` consumes, if known.
    pub fn position_count_of(&self, key: &str) -> Option<u8> {
        self.get(key).map(|l| l.position_count)
    }

    /// Returns the tally index to pulse for `key`.
    ///
    /// Unknown keys fall back to [`FALLBACK_TALLY_INDEX`] and log a warning.
    pub fn tally_index_of(&self, key: &str) -> u16 {
        match self.get(key) {
            Some(layout) => layout.tally_index,
            None => {
                warn!(
                    layout = key,
                    "unknown layout name; falling back to tally index {FALLBACK_TALLY_INDEX}"
                );
                FALLBACK_TALLY_INDEX
            }
        }
    }

    /// Returns the selectable layouts that fit within `max_inputs` positions.
    ///
    /// `FULL_SCREEN` is not a selectable side layout and is always excluded.
    pub fn available_layouts_for(&self, max_inputs: u8) -> Vec<&'static LayoutDefinition> {
        self.layouts
            .iter()
            .filter(|l| l.key != FULL_SCREEN && l.position_count <= max_inputs)
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
