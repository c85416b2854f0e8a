//! The square board and its cell-level operations.

use reentry_common::{CellCoord, StoreError, StoreResult};
use serde::{Deserialize, Serialize};

use crate::tile::Tile;

/// Default board edge length.
pub const DEFAULT_GRID_SIZE: usize = 4;

/// Supported board edge lengths.
pub const GRID_SIZE_RANGE: std::ops::RangeInclusive<usize> = 2..=8;

/// Serialized form of one occupied cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTile {
    /// Cell the tile occupies
    pub position: CellCoord,
    /// Tile value
    pub value: u32,
}

/// Serialized form of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSnapshot {
    /// Edge length
    pub size: usize,
    /// Row-major cells, `None` for empty
    pub cells: Vec<Option<SavedTile>>,
}

/// An N x N board holding at most one tile per cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    size: usize,
    cells: Vec<Option<Tile>>,
}

impl Grid {
    /// Creates an empty board.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(2);
        Self {
            size,
            cells: vec![None; size * size],
        }
    }

    /// Rebuilds a board from its snapshot, checking every invariant.
    pub fn from_snapshot(snapshot: &GridSnapshot) -> StoreResult<Self> {
        let expected_cells = GRID_SIZE_RANGE
            .contains(&snapshot.size)
            .then(|| snapshot.size.checked_mul(snapshot.size))
            .flatten();
        if expected_cells != Some(snapshot.cells.len()) {
            return Err(StoreError::Corrupted(format!(
                "grid of size {} has {} cells",
                snapshot.size,
                snapshot.cells.len()
            )));
        }

        let mut grid = Self::new(snapshot.size);
        for (index, cell) in snapshot.cells.iter().enumerate() {
            let Some(saved) = cell else { continue };
            let expected = CellCoord::from_index(index, snapshot.size);
            if saved.position != expected {
                return Err(StoreError::Corrupted(format!(
                    "tile at {} stored in slot {expected}",
                    saved.position
                )));
            }
            if saved.value < 2 || !saved.value.is_power_of_two() {
                return Err(StoreError::Corrupted(format!(
                    "tile value {} is not a power of two",
                    saved.value
                )));
            }
            grid.insert_tile(Tile::new(saved.position, saved.value));
        }
        Ok(grid)
    }

    /// Serializes the board.
    #[must_use]
    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            size: self.size,
            cells: self
                .cells
                .iter()
                .map(|cell| {
                    cell.map(|tile| SavedTile {
                        position: tile.position(),
                        value: tile.value(),
                    })
                })
                .collect(),
        }
    }

    /// Edge length.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Checks whether a coordinate lies on the board.
    #[must_use]
    pub const fn within_bounds(&self, cell: CellCoord) -> bool {
        cell.within(self.size)
    }

    /// Tile at a cell, `None` when empty or off the board.
    #[must_use]
    pub fn cell_content(&self, cell: CellCoord) -> Option<&Tile> {
        if self.within_bounds(cell) {
            self.cells[cell.to_index(self.size)].as_ref()
        } else {
            None
        }
    }

    /// Whether a cell is on the board and empty.
    #[must_use]
    pub fn cell_available(&self, cell: CellCoord) -> bool {
        self.within_bounds(cell) && self.cells[cell.to_index(self.size)].is_none()
    }

    /// Whether a cell holds a tile.
    #[must_use]
    pub fn cell_occupied(&self, cell: CellCoord) -> bool {
        self.cell_content(cell).is_some()
    }

    /// Every empty cell, row-major.
    #[must_use]
    pub fn available_cells(&self) -> Vec<CellCoord> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_none())
            .map(|(index, _)| CellCoord::from_index(index, self.size))
            .collect()
    }

    /// Whether at least one cell is empty.
    #[must_use]
    pub fn cells_available(&self) -> bool {
        self.cells.iter().any(Option::is_none)
    }

    /// Picks a uniformly random empty cell.
    pub fn random_available_cell(&self, rng: &mut fastrand::Rng) -> Option<CellCoord> {
        let cells = self.available_cells();
        if cells.is_empty() {
            None
        } else {
            Some(cells[rng.usize(..cells.len())])
        }
    }

    /// Places a tile at its own position, replacing whatever was there.
    ///
    /// Off-board tiles are ignored.
    pub fn insert_tile(&mut self, tile: Tile) {
        let cell = tile.position();
        if self.within_bounds(cell) {
            self.cells[cell.to_index(self.size)] = Some(tile);
        }
    }

    /// Takes the tile out of a cell.
    pub fn remove_tile(&mut self, cell: CellCoord) -> Option<Tile> {
        if self.within_bounds(cell) {
            self.cells[cell.to_index(self.size)].take()
        } else {
            None
        }
    }

    /// Removes every tile.
    pub fn clear(&mut self) {
        self.cells.fill(None);
    }

    /// Occupied tiles, row-major.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.cells.iter().flatten()
    }

    /// Mutable access to occupied tiles.
    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.cells.iter_mut().flatten()
    }

    /// Number of tiles on the board.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles().count()
    }

    /// Sum of all tile values.
    #[must_use]
    pub fn tile_sum(&self) -> u64 {
        self.tiles().map(|tile| u64::from(tile.value())).sum()
    }

    /// Largest tile value, 0 on an empty board.
    #[must_use]
    pub fn max_tile(&self) -> u32 {
        self.tiles().map(Tile::value).max().unwrap_or(0)
    }

    /// Whether any two 4-adjacent tiles share a value.
    #[must_use]
    pub fn has_adjacent_match(&self) -> bool {
        self.tiles().any(|tile| {
            let cell = tile.position();
            // Right and down neighbours cover every pair once.
            [(1, 0), (0, 1)].iter().any(|&(dx, dy)| {
                self.cell_content(cell.offset(dx, dy))
                    .is_some_and(|other| other.value() == tile.value())
            })
        })
    }

    /// Values as rows, `0` for empty cells. Handy for logs and tests.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<u32>> {
        self.cells
            .chunks(self.size)
            .map(|row| row.iter().map(|cell| cell.map_or(0, |t| t.value())).collect())
            .collect()
    }

    /// Builds a board from rows of values, `0` for empty cells.
    #[must_use]
    pub fn from_rows(rows: &[&[u32]]) -> Self {
        let mut grid = Self::new(rows.len());
        for (y, row) in rows.iter().enumerate() {
            for (x, &value) in row.iter().enumerate().take(grid.size) {
                if value > 0 {
                    grid.insert_tile(Tile::new(CellCoord::new(x as i32, y as i32), value));
                }
            }
        }
        grid
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_grid_is_empty() {
        let grid = Grid::new(4);
        assert_eq!(grid.available_cells().len(), 16);
        assert_eq!(grid.tile_count(), 0);
        assert_eq!(grid.max_tile(), 0);
    }

    #[test]
    fn test_insert_and_remove() {
        let mut grid = Grid::new(4);
        let cell = CellCoord::new(2, 1);
        grid.insert_tile(Tile::new(cell, 4));

        assert!(grid.cell_occupied(cell));
        assert!(!grid.cell_available(cell));
        assert_eq!(grid.cell_content(cell).map(Tile::value), Some(4));

        let removed = grid.remove_tile(cell).expect("tile present");
        assert_eq!(removed.value(), 4);
        assert!(grid.cell_available(cell));
    }

    #[test]
    fn test_out_of_bounds_is_never_available() {
        let grid = Grid::new(4);
        assert!(!grid.cell_available(CellCoord::new(-1, 0)));
        assert!(!grid.cell_available(CellCoord::new(0, 4)));
        assert!(grid.cell_content(CellCoord::new(9, 9)).is_none());
    }

    #[test]
    fn test_random_available_cell_on_full_board() {
        let grid = Grid::from_rows(&[&[2, 4], &[8, 16]]);
        let mut rng = fastrand::Rng::with_seed(1);
        assert!(grid.random_available_cell(&mut rng).is_none());
    }

    #[test]
    fn test_random_available_cell_picks_empty() {
        let grid = Grid::from_rows(&[&[2, 0], &[8, 16]]);
        let mut rng = fastrand::Rng::with_seed(7);
        assert_eq!(
            grid.random_available_cell(&mut rng),
            Some(CellCoord::new(1, 0))
        );
    }

    #[test]
    fn test_sum_and_max() {
        let grid = Grid::from_rows(&[&[2, 0, 0, 0], &[0, 64, 0, 0], &[0, 0, 0, 0], &[4, 0, 0, 2]]);
        assert_eq!(grid.tile_sum(), 72);
        assert_eq!(grid.max_tile(), 64);
    }

    #[test]
    fn test_adjacent_match() {
        let locked = Grid::from_rows(&[&[2, 4], &[4, 2]]);
        assert!(!locked.has_adjacent_match());

        let open = Grid::from_rows(&[&[2, 4], &[2, 8]]);
        assert!(open.has_adjacent_match());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let grid = Grid::from_rows(&[&[2, 0, 0, 0], &[0, 128, 0, 0], &[0, 0, 0, 0], &[0, 0, 0, 2048]]);
        let restored = Grid::from_snapshot(&grid.snapshot()).expect("valid snapshot");
        assert_eq!(restored.to_rows(), grid.to_rows());
    }

    #[test]
    fn test_snapshot_rejects_misplaced_tile() {
        let mut snapshot = Grid::new(2).snapshot();
        snapshot.cells[0] = Some(SavedTile {
            position: CellCoord::new(1, 1),
            value: 2,
        });
        assert!(matches!(
            Grid::from_snapshot(&snapshot),
            Err(StoreError::Corrupted(_))
        ));
    }

    #[test]
    fn test_snapshot_rejects_bad_value() {
        let mut snapshot = Grid::new(2).snapshot();
        snapshot.cells[3] = Some(SavedTile {
            position: CellCoord::new(1, 1),
            value: 6,
        });
        assert!(Grid::from_snapshot(&snapshot).is_err());
    }

    #[test]
    fn test_snapshot_rejects_unsupported_size() {
        let huge = GridSnapshot {
            size: usize::MAX,
            cells: vec![None; 1],
        };
        assert!(matches!(
            Grid::from_snapshot(&huge),
            Err(StoreError::Corrupted(_))
        ));

        let oversized = GridSnapshot {
            size: 9,
            cells: vec![None; 81],
        };
        assert!(Grid::from_snapshot(&oversized).is_err());
    }
}
