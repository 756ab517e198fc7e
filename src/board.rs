// Board occupancy grid
//
// The board is pure data: a width x height grid where every cell holds at most
// one occupant. Placing onto an occupied cell is reported as an error so that
// overlaps are detected rather than silently overwritten.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Coord, Direction, PlayerIndex};

/// Occupant of a single board cell
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    Empty,
    Wall,
    Apple,
    Snake(PlayerIndex),
}

impl Cell {
    /// Flat byte code used in snapshot occupancy arrays
    pub fn code(&self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Wall => 1,
            Cell::Apple => 2,
            Cell::Snake(player) => 3 + *player as u8,
        }
    }

    pub fn from_code(code: u8) -> Cell {
        match code {
            0 => Cell::Empty,
            1 => Cell::Wall,
            2 => Cell::Apple,
            n => Cell::Snake((n - 3) as PlayerIndex),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("cell ({}, {}) is outside the {width}x{height} board", .at.x, .at.y)]
    OutOfBounds { at: Coord, width: i32, height: i32 },
    #[error("cell ({}, {}) already holds {existing:?}, cannot place {incoming:?}", .at.x, .at.y)]
    Occupied {
        at: Coord,
        existing: Cell,
        incoming: Cell,
    },
}

/// Fixed-size occupancy grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    width: i32,
    height: i32,
    wrap: bool,
    cells: Vec<Cell>,
}

impl Board {
    pub fn new(width: i32, height: i32, wrap: bool) -> Self {
        Board {
            width,
            height,
            wrap,
            cells: vec![Cell::Empty; width.max(0) as usize * height.max(0) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn wraps(&self) -> bool {
        self.wrap
    }

    pub fn in_bounds(&self, coord: Coord) -> bool {
        coord.x >= 0 && coord.x < self.width && coord.y >= 0 && coord.y < self.height
    }

    fn index(&self, coord: Coord) -> Option<usize> {
        if self.in_bounds(coord) {
            Some((coord.y * self.width + coord.x) as usize)
        } else {
            None
        }
    }

    /// Returns the occupant of a cell, or None when the coordinate is off the board
    pub fn get(&self, coord: Coord) -> Option<Cell> {
        self.index(coord).map(|i| self.cells[i])
    }

    pub fn is_free(&self, coord: Coord) -> bool {
        matches!(self.get(coord), Some(Cell::Empty))
    }

    /// Places an occupant on an empty cell
    pub fn place(&mut self, coord: Coord, cell: Cell) -> Result<(), BoardError> {
        let idx = self.index(coord).ok_or(BoardError::OutOfBounds {
            at: coord,
            width: self.width,
            height: self.height,
        })?;

        let existing = self.cells[idx];
        if !existing.is_empty() {
            return Err(BoardError::Occupied {
                at: coord,
                existing,
                incoming: cell,
            });
        }

        self.cells[idx] = cell;
        Ok(())
    }

    /// Neighbor of `coord` in `dir`; wraps around edges in wrap mode,
    /// otherwise returns the off-board coordinate unchanged
    pub fn step(&self, coord: Coord, dir: Direction) -> Coord {
        let next = dir.apply(&coord);
        if self.wrap {
            wrap_coord(next, self.width, self.height)
        } else {
            next
        }
    }

    /// All currently empty cells in row-major order
    pub fn free_cells(&self) -> Vec<Coord> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_empty())
            .map(|(i, _)| Coord::new(i as i32 % self.width, i as i32 / self.width))
            .collect()
    }

    /// Row-major occupancy codes
    pub fn codes(&self) -> Vec<u8> {
        self.cells.iter().map(Cell::code).collect()
    }
}

/// Wraps a coordinate onto a torus of the given size
pub fn wrap_coord(coord: Coord, width: i32, height: i32) -> Coord {
    Coord {
        x: coord.x.rem_euclid(width),
        y: coord.y.rem_euclid(height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_rejects_occupied_cell() {
        let mut board = Board::new(5, 5, false);
        board.place(Coord::new(1, 1), Cell::Apple).unwrap();
        let err = board.place(Coord::new(1, 1), Cell::Snake(0)).unwrap_err();
        assert_eq!(
            err,
            BoardError::Occupied {
                at: Coord::new(1, 1),
                existing: Cell::Apple,
                incoming: Cell::Snake(0),
            }
        );
    }

    #[test]
    fn test_place_rejects_out_of_bounds() {
        let mut board = Board::new(5, 5, false);
        assert!(matches!(
            board.place(Coord::new(5, 0), Cell::Wall),
            Err(BoardError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_step_wraps_only_in_wrap_mode() {
        let walled = Board::new(5, 5, false);
        assert_eq!(walled.step(Coord::new(0, 2), Direction::Left), Coord::new(-1, 2));

        let wrapped = Board::new(5, 5, true);
        assert_eq!(wrapped.step(Coord::new(0, 2), Direction::Left), Coord::new(4, 2));
        assert_eq!(wrapped.step(Coord::new(2, 4), Direction::Down), Coord::new(2, 0));
    }

    #[test]
    fn test_free_cells_skip_occupied() {
        let mut board = Board::new(5, 5, false);
        board.place(Coord::new(0, 0), Cell::Wall).unwrap();
        board.place(Coord::new(1, 0), Cell::Snake(2)).unwrap();
        let free = board.free_cells();
        assert_eq!(free.len(), 23);
        assert_eq!(free[0], Coord::new(2, 0));
    }

    #[test]
    fn test_cell_codes() {
        for cell in [Cell::Empty, Cell::Wall, Cell::Apple, Cell::Snake(0), Cell::Snake(3)] {
            assert_eq!(Cell::from_code(cell.code()), cell);
        }
    }
}
