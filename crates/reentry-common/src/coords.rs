//! Cell coordinates on the square game board.

use serde::{Deserialize, Serialize};

/// Position of a cell on the board, `(0, 0)` being the top-left corner.
///
/// Coordinates are signed so that stepping off the edge of the board while
/// scanning for the farthest free cell yields an out-of-bounds coordinate
/// instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CellCoord {
    /// Column, growing to the right
    pub x: i32,
    /// Row, growing downwards
    pub y: i32,
}

impl CellCoord {
    /// Creates a new cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the coordinate shifted by a unit vector.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Checks whether the coordinate lies on a board of `size` x `size` cells.
    #[must_use]
    pub const fn within(self, size: usize) -> bool {
        let size = size as i32;
        self.x >= 0 && self.x < size && self.y >= 0 && self.y < size
    }

    /// Converts to a row-major linear index.
    ///
    /// Only meaningful when [`within`](Self::within) holds.
    #[must_use]
    pub const fn to_index(self, size: usize) -> usize {
        (self.y as usize) * size + (self.x as usize)
    }

    /// Creates from a row-major linear index.
    #[must_use]
    pub const fn from_index(index: usize, size: usize) -> Self {
        Self {
            x: (index % size) as i32,
            y: (index / size) as i32,
        }
    }
}

impl std::fmt::Display for CellCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_within_bounds() {
        assert!(CellCoord::new(0, 0).within(4));
        assert!(CellCoord::new(3, 3).within(4));
        assert!(!CellCoord::new(4, 0).within(4));
        assert!(!CellCoord::new(0, -1).within(4));
    }

    #[test]
    fn test_offset() {
        let coord = CellCoord::new(1, 1).offset(-1, 0);
        assert_eq!(coord, CellCoord::new(0, 1));
    }

    proptest! {
        #[test]
        fn index_roundtrip(index in 0usize..64, size in 1usize..9) {
            let index = index % (size * size);
            let coord = CellCoord::from_index(index, size);
            prop_assert!(coord.within(size));
            prop_assert_eq!(coord.to_index(size), index);
        }
    }
}
