//! Fixed 6x6 boards, cursor coordinates and participant marks.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskError};

pub const GRID_SIZE: usize = 6;
pub const MAX_INDEX: usize = GRID_SIZE - 1;

/// A (row, col) pair on the board, always inside `[0,5]x[0,5]`.
///
/// Serializes as a `[row, col]` pair to match the behavioral data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(usize, usize)", into = "(usize, usize)")]
pub struct Coord {
    row: usize,
    col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Result<Self> {
        if row > MAX_INDEX || col > MAX_INDEX {
            return Err(TaskError::OutOfBounds(Coord { row, col }));
        }
        Ok(Self { row, col })
    }

    /// Apply a signed offset, saturating each axis at the board edge.
    pub fn offset_clamped(self, dr: i8, dc: i8) -> Self {
        Self {
            row: clamp_axis(self.row as i64 + dr as i64),
            col: clamp_axis(self.col as i64 + dc as i64),
        }
    }

    pub fn row(self) -> usize {
        self.row
    }

    pub fn col(self) -> usize {
        self.col
    }

    pub const ORIGIN: Coord = Coord { row: 0, col: 0 };

    /// The four corners a puzzle may start from.
    pub const CORNERS: [Coord; 4] = [
        Coord { row: 0, col: 0 },
        Coord { row: 0, col: MAX_INDEX },
        Coord { row: MAX_INDEX, col: 0 },
        Coord { row: MAX_INDEX, col: MAX_INDEX },
    ];
}

fn clamp_axis(v: i64) -> usize {
    v.clamp(0, MAX_INDEX as i64) as usize
}

impl TryFrom<(usize, usize)> for Coord {
    type Error = TaskError;

    fn try_from((row, col): (usize, usize)) -> Result<Self> {
        Coord::new(row, col)
    }
}

impl From<Coord> for (usize, usize) {
    fn from(c: Coord) -> Self {
        (c.row, c.col)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A 6x6 matrix, row-major. Shape is enforced by the type, so a definition
/// file with the wrong dimensions fails to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid<T>([[T; GRID_SIZE]; GRID_SIZE]);

impl<T: Copy> Grid<T> {
    pub fn filled(v: T) -> Self {
        Self([[v; GRID_SIZE]; GRID_SIZE])
    }

    pub const fn from_rows(rows: [[T; GRID_SIZE]; GRID_SIZE]) -> Self {
        Self(rows)
    }

    pub fn get(&self, at: Coord) -> T {
        self.0[at.row][at.col]
    }

    pub fn set(&mut self, at: Coord, v: T) {
        self.0[at.row][at.col] = v;
    }

    pub fn rows(&self) -> &[[T; GRID_SIZE]; GRID_SIZE] {
        &self.0
    }

    pub fn cells(&self) -> impl Iterator<Item = (Coord, T)> + '_ {
        self.0.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(move |(c, &v)| (Coord { row: r, col: c }, v))
        })
    }

    pub fn map<U: Copy>(&self, mut f: impl FnMut(T) -> U) -> Grid<U> {
        let mut out = [[f(self.0[0][0]); GRID_SIZE]; GRID_SIZE];
        for (r, row) in self.0.iter().enumerate() {
            for (c, &v) in row.iter().enumerate() {
                out[r][c] = f(v);
            }
        }
        Grid(out)
    }
}

impl Grid<u8> {
    /// Element-wise saturating sum.
    pub fn add(&self, other: &Grid<u8>) -> Grid<u8> {
        let mut out = *self;
        for (r, row) in out.0.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = v.saturating_add(other.0[r][c]);
            }
        }
        out
    }
}

/// Participant-placed marks for the puzzle in progress.
///
/// Snapshots are immutable: [`PuzzleState::with_mark`] returns a new value with
/// a bumped revision and leaves the original untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleState {
    marks: Grid<u8>,
    revision: u32,
}

impl PuzzleState {
    pub fn blank() -> Self {
        Self {
            marks: Grid::filled(0),
            revision: 0,
        }
    }

    pub fn with_mark(&self, at: Coord) -> Self {
        let mut marks = self.marks;
        marks.set(at, 1);
        Self {
            marks,
            revision: self.revision.wrapping_add(1),
        }
    }

    pub fn marks(&self) -> &Grid<u8> {
        &self.marks
    }

    pub fn is_marked(&self, at: Coord) -> bool {
        self.marks.get(at) != 0
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn is_blank(&self) -> bool {
        self.marks.cells().all(|(_, v)| v == 0)
    }

    pub fn mark_count(&self) -> usize {
        self.marks.cells().filter(|&(_, v)| v != 0).count()
    }
}

impl Default for PuzzleState {
    fn default() -> Self {
        Self::blank()
    }
}

impl Serialize for PuzzleState {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.marks.serialize(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_saturates_at_edges() {
        let c = Coord::new(0, 5).unwrap();
        assert_eq!(c.offset_clamped(-1, 1), c);
        let c = Coord::new(3, 3).unwrap();
        assert_eq!(c.offset_clamped(1, -1), Coord::new(4, 2).unwrap());
    }

    #[test]
    fn coord_rejects_out_of_range() {
        assert!(Coord::new(6, 0).is_err());
        assert!(serde_json::from_str::<Coord>("[2, 9]").is_err());
        let c: Coord = serde_json::from_str("[2, 4]").unwrap();
        assert_eq!(serde_json::to_string(&c).unwrap(), "[2,4]");
    }

    #[test]
    fn grid_requires_six_by_six() {
        let short = "[[0,0,0,0,0,0],[0,0,0,0,0,0]]";
        assert!(serde_json::from_str::<Grid<u8>>(short).is_err());
    }

    #[test]
    fn with_mark_leaves_original_untouched() {
        let before = PuzzleState::blank();
        let at = Coord::new(2, 3).unwrap();
        let after = before.with_mark(at);

        assert!(before.is_blank());
        assert!(after.is_marked(at));
        assert_eq!(after.mark_count(), 1);
        assert!(after.revision() > before.revision());
    }
}
