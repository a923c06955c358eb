//! The puzzle set a session draws from: teaching problems or mazes.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::board::{self, MazeBoard, Step, TeachingBoard};
use crate::error::{Result, TaskError};
use crate::grid::{Coord, PuzzleState};
use crate::keymap::KeyMap;
use crate::maze::MazeLayout;
use crate::problem::Problem;

#[derive(Debug, Clone, PartialEq)]
pub enum PuzzleSet {
    Teaching(Vec<Problem>),
    Maze(Vec<MazeLayout>),
}

#[derive(Debug, Clone, Copy)]
pub enum PuzzleRef<'a> {
    Teaching(&'a Problem),
    Maze(&'a MazeLayout),
}

impl PuzzleSet {
    pub fn load_teaching(path: &Path) -> Result<Self> {
        let problems: Vec<Problem> = read_definitions(path)?;
        for (i, p) in problems.iter().enumerate() {
            p.validate(i)?;
        }
        Ok(PuzzleSet::Teaching(problems))
    }

    pub fn load_mazes(path: &Path) -> Result<Self> {
        Ok(PuzzleSet::Maze(MazeLayout::load_all(path)?))
    }

    pub fn len(&self) -> usize {
        match self {
            PuzzleSet::Teaching(v) => v.len(),
            PuzzleSet::Maze(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<PuzzleRef<'_>> {
        match self {
            PuzzleSet::Teaching(v) => v.get(index).map(PuzzleRef::Teaching),
            PuzzleSet::Maze(v) => v.get(index).map(PuzzleRef::Maze),
        }
    }

    pub fn variant(&self) -> &'static str {
        match self {
            PuzzleSet::Teaching(_) => "teaching",
            PuzzleSet::Maze(_) => "maze",
        }
    }
}

impl PuzzleRef<'_> {
    /// Apply one key press under this puzzle's rules, given the marks made so far.
    pub fn step(
        self,
        state: &PuzzleState,
        keymap: &KeyMap,
        from: Coord,
        key: &str,
    ) -> Result<Step> {
        match self {
            PuzzleRef::Teaching(p) => {
                board::step(&TeachingBoard::new(p, state.marks()), keymap, from, key)
            }
            PuzzleRef::Maze(m) => board::step(&MazeBoard::new(m), keymap, from, key),
        }
    }

    /// Feedback value for the cell under the cursor.
    pub fn cell_value(self, state: &PuzzleState, at: Coord) -> u8 {
        match self {
            PuzzleRef::Teaching(p) => p.combined(state.marks()).get(at),
            PuzzleRef::Maze(m) => m.cell(at) as u8,
        }
    }

    pub fn check_order(self, order: &[String]) -> Result<()> {
        match self {
            PuzzleRef::Teaching(p) => p.check_order(order),
            PuzzleRef::Maze(_) => Ok(()),
        }
    }
}

pub(crate) fn read_definitions<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = fs::read_to_string(path).map_err(|e| {
        TaskError::MalformedPuzzle(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&text)
        .map_err(|e| TaskError::MalformedPuzzle(format!("{}: {e}", path.display())))
}
