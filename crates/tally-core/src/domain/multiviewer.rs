//! Two-sided multiviewer cards sharing one 9-input bank.
//!
//! Every physical card drives two independent outputs, addressed as
//! `"<card>-1"` and `"<card>-2"`.  Both sides draw from the same nine
//! physical inputs: side 1 takes inputs `1..=n1` for its layout of `n1`
//! positions and side 2 takes the next `n2`, so
//!
//! ```text
//! n2 <= 9 - n1
//! ```
//!
//! must hold at all times.  Side 1 has priority: choosing a larger side-1
//! layout that breaks the invariant clears side 2's layout rather than
//! rejecting the edit.  Side 2 edits that do not fit are rejected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::card::{CardId, CARD_COUNT};
use crate::domain::layout::{LayoutCatalog, LayoutDefinition, BANK_SIZE};

/// Error type for multiviewer layout and source edits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("unknown layout: {0}")]
    UnknownLayout(String),

    #[error("layout needs {requested} inputs but only {available} are free on side 2")]
    ExceedsBank { requested: u8, available: u8 },

    #[error("display {0} has no layout assigned")]
    NoLayout(DisplayId),

    #[error("position {position} is outside the layout of display {display}")]
    InvalidPosition { display: DisplayId, position: u8 },

    #[error("invalid display id: '{0}'")]
    InvalidDisplayId(String),

    #[error("unknown card: {0}")]
    UnknownCard(CardId),
}

/// One of the two outputs of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    One,
    Two,
}

impl Side {
    fn number(self) -> u8 {
        match self {
            Side::One => 1,
            Side::Two => 2,
        }
    }

    /// Returns the other side of the same card.
    pub fn other(self) -> Side {
        match self {
            Side::One => Side::Two,
            Side::Two => Side::One,
        }
    }
}

/// Identifier of a logical display, e.g. `"4-2"` for card 4, side 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayId {
    pub card_id: CardId,
    pub side: Side,
}

impl DisplayId {
    pub fn new(card_id: CardId, side: Side) -> Self {
        Self { card_id, side }
    }

    /// Returns the display on the other side of the same card.
    pub fn paired(self) -> Self {
        Self::new(self.card_id, self.side.other())
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.card_id, self.side.number())
    }
}

// Display ids travel as their `"4-2"` string form in JSON and TOML.
impl Serialize for DisplayId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DisplayId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for DisplayId {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LayoutError::InvalidDisplayId(s.to_string());
        let (card, side) = s.split_once('-').ok_or_else(invalid)?;
        let card_id: CardId = card.parse().map_err(|_| invalid())?;
        if !(1..=CARD_COUNT).contains(&card_id) {
            return Err(invalid());
        }
        let side = match side {
            "1" => Side::One,
            "2" => Side::Two,
            _ => return Err(invalid()),
        };
        Ok(Self::new(card_id, side))
    }
}

/// Layout and source assignment of one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiviewerSide {
    /// Layout key, or `None` when the side is unused.
    pub layout: Option<String>,
    /// Source label per position (`BANK_SIZE` entries, empty when unassigned).
    pub inputs: Vec<String>,
}

impl MultiviewerSide {
    fn with_layout(layout: Option<&str>) -> Self {
        Self {
            layout: layout.map(str::to_string),
            inputs: vec![String::new(); usize::from(BANK_SIZE)],
        }
    }

    fn position_count(&self, catalog: &LayoutCatalog) -> u8 {
        self.layout
            .as_deref()
            .and_then(|key| catalog.position_count_of(key))
            .unwrap_or(0)
    }
}

/// Outcome of a successful [`MultiviewerCard::set_layout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutChange {
    /// Layout the edited side had before the change.
    pub previous: Option<String>,
    /// `true` when side 2 lost its layout because side 1 grew.
    pub side2_cleared: bool,
}

/// A physical card with its two sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiviewerCard {
    pub card_id: CardId,
    pub side1: MultiviewerSide,
    pub side2: MultiviewerSide,
}

impl MultiviewerCard {
    pub fn new(card_id: CardId, side1: Option<&str>, side2: Option<&str>) -> Self {
        Self {
            card_id,
            side1: MultiviewerSide::with_layout(side1),
            side2: MultiviewerSide::with_layout(side2),
        }
    }

    pub fn side(&self, side: Side) -> &MultiviewerSide {
        match side {
            Side::One => &self.side1,
            Side::Two => &self.side2,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut MultiviewerSide {
        match side {
            Side::One => &mut self.side1,
            Side::Two => &mut self.side2,
        }
    }

    /// Number of bank inputs left for side 2 given side 1's layout.
    pub fn available_inputs_for_side2(&self, catalog: &LayoutCatalog) -> u8 {
        BANK_SIZE - self.side1.position_count(catalog)
    }

    /// Layouts an operator may pick for `side` right now.
    pub fn available_layouts_for(
        &self,
        side: Side,
        catalog: &LayoutCatalog,
    ) -> Vec<&'static LayoutDefinition> {
        match side {
            Side::One => catalog.available_layouts_for(BANK_SIZE),
            Side::Two => catalog.available_layouts_for(self.available_inputs_for_side2(catalog)),
        }
    }

    /// Assigns `layout` (or clears it with `None`) on `side`.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::UnknownLayout`] if the key is not in the catalog.
    /// - [`LayoutError::ExceedsBank`] if a side-2 layout does not fit next to
    ///   side 1.
    pub fn set_layout(
        &mut self,
        side: Side,
        layout: Option<&str>,
        catalog: &LayoutCatalog,
    ) -> Result<LayoutChange, LayoutError> {
        let requested = match layout {
            Some(key) => catalog
                .position_count_of(key)
                .ok_or_else(|| LayoutError::UnknownLayout(key.to_string()))?,
            None => 0,
        };

        if side == Side::Two {
            let available = self.available_inputs_for_side2(catalog);
            if requested > available {
                return Err(LayoutError::ExceedsBank {
                    requested,
                    available,
                });
            }
        }

        let previous = std::mem::replace(
            &mut self.side_mut(side).layout,
            layout.map(str::to_string),
        );

        let mut side2_cleared = false;
        if side == Side::One
            && self.side2.layout.is_some()
            && self.side2.position_count(catalog) > BANK_SIZE - requested
        {
            self.side2.layout = None;
            side2_cleared = true;
        }

        Ok(LayoutChange {
            previous,
            side2_cleared,
        })
    }

    /// Labels the source shown at `position` (1-based) on `side`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::NoLayout`] if the side is unused, or
    /// [`LayoutError::InvalidPosition`] if the position is outside its layout.
    pub fn assign_source(
        &mut self,
        side: Side,
        position: u8,
        label: &str,
        catalog: &LayoutCatalog,
    ) -> Result<(), LayoutError> {
        let display = DisplayId::new(self.card_id, side);
        let count = self.side(side).position_count(catalog);
        if count == 0 {
            return Err(LayoutError::NoLayout(display));
        }
        if position == 0 || position > count {
            return Err(LayoutError::InvalidPosition { display, position });
        }
        self.side_mut(side).inputs[usize::from(position - 1)] = label.to_string();
        Ok(())
    }

    /// Physical bank input feeding `position` on `side`.
    ///
    /// Side 2 positions are offset by side 1's position count.  Returns `None`
    /// when the position is outside the side's layout.
    pub fn hardware_input(&self, side: Side, position: u8, catalog: &LayoutCatalog) -> Option<u8> {
        let count = self.side(side).position_count(catalog);
        if position == 0 || position > count {
            return None;
        }
        let offset = match side {
            Side::One => 0,
            Side::Two => self.side1.position_count(catalog),
        };
        Some(offset + position).filter(|&input| input <= BANK_SIZE)
    }
}

/// Default (side 1, side 2) layouts for cards that differ from a plain 9-split.
const DEFAULT_LAYOUTS: &[(CardId, &str, Option<&str>)] = &[
    (5, "5_SPLIT", Some("4_SPLIT")),
    (9, "4_SPLIT", Some("4_SPLIT")),
    (10, "9_SPLIT_L", None),
    (12, "9_SPLIT_R", None),
];

/// All cards of the installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiviewerBank {
    cards: Vec<MultiviewerCard>,
}

impl Default for MultiviewerBank {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl MultiviewerBank {
    /// Builds the 22-card bank with the installation's default layouts.
    pub fn with_defaults() -> Self {
        let cards = (1..=CARD_COUNT)
            .map(|card_id| {
                match DEFAULT_LAYOUTS.iter().find(|(id, _, _)| *id == card_id) {
                    Some((_, side1, side2)) => MultiviewerCard::new(card_id, Some(side1), *side2),
                    None => MultiviewerCard::new(card_id, Some("9_SPLIT"), None),
                }
            })
            .collect();
        Self { cards }
    }

    pub fn cards(&self) -> &[MultiviewerCard] {
        &self.cards
    }

    pub fn card(&self, card_id: CardId) -> Option<&MultiviewerCard> {
        self.cards.iter().find(|c| c.card_id == card_id)
    }

    /// Mutable access to a card.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownCard`] if `card_id` is not in the bank.
    pub fn card_mut(&mut self, card_id: CardId) -> Result<&mut MultiviewerCard, LayoutError> {
        self.cards
            .iter_mut()
            .find(|c| c.card_id == card_id)
            .ok_or(LayoutError::UnknownCard(card_id))
    }

    /// Current layout key of a display.
    pub fn layout_of(&self, display: DisplayId) -> Option<&str> {
        self.card(display.card_id)
            .and_then(|c| c.side(display.side).layout.as_deref())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
