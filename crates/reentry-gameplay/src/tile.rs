//! Numbered game pieces.

use reentry_common::CellCoord;
use serde::{Deserialize, Serialize};

/// Copy of a tile consumed by a merge, kept for the merge animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSource {
    /// Value of the consumed tile
    pub value: u32,
    /// Where the consumed tile started the move
    pub from: CellCoord,
}

/// A power-of-two tile occupying one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    value: u32,
    position: CellCoord,
    previous_position: Option<CellCoord>,
    merged_from: Option<[MergeSource; 2]>,
}

impl Tile {
    /// Creates a fresh tile with no history.
    #[must_use]
    pub const fn new(position: CellCoord, value: u32) -> Self {
        Self {
            value,
            position,
            previous_position: None,
            merged_from: None,
        }
    }

    /// Creates the product of merging `a` into `b` at `b`'s cell.
    #[must_use]
    pub fn merged(a: &Self, b: &Self) -> Self {
        let mut tile = Self::new(b.position, a.value + b.value);
        tile.merged_from = Some([a.as_source(), b.as_source()]);
        tile
    }

    /// Tile value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }

    /// Current cell.
    #[must_use]
    pub const fn position(&self) -> CellCoord {
        self.position
    }

    /// Cell the tile occupied before the last move, if it existed then.
    #[must_use]
    pub const fn previous_position(&self) -> Option<CellCoord> {
        self.previous_position
    }

    /// The two tiles this one was merged from during the last move.
    #[must_use]
    pub const fn merged_from(&self) -> Option<&[MergeSource; 2]> {
        self.merged_from.as_ref()
    }

    /// Whether this tile was produced by a merge during the current move.
    #[must_use]
    pub const fn is_merge_product(&self) -> bool {
        self.merged_from.is_some()
    }

    /// Records the current cell as the animation start and forgets merge history.
    pub fn save_position(&mut self) {
        self.previous_position = Some(self.position);
        self.merged_from = None;
    }

    /// Moves the tile to another cell. Grid bookkeeping is the caller's job.
    pub fn update_position(&mut self, position: CellCoord) {
        self.position = position;
    }

    fn as_source(&self) -> MergeSource {
        MergeSource {
            value: self.value,
            from: self.previous_position.unwrap_or(self.position),
        }
    }
}

/// Power-of-two exponent of a tile value (`2 -> 1`, `2048 -> 11`).
#[must_use]
pub fn tile_rank(value: u32) -> u32 {
    if value == 0 {
        0
    } else {
        31 - value.leading_zeros()
    }
}
