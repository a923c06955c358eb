//! Cursor movement and win detection.
//!
//! [`step`] is the single move rule shared by the maze and teaching variants.
//! The variants differ only in which cells the cursor may enter and which
//! cell counts as a valid selection, expressed through [`Board`].

use tracing::debug;

use crate::error::Result;
use crate::grid::{Coord, Grid};
use crate::keymap::KeyMap;
use crate::maze::{MazeCell, MazeLayout};
use crate::problem::{Problem, UNREVEALED};

pub trait Board {
    /// Whether the cursor may occupy `at`.
    fn admits(&self, at: Coord) -> bool;

    /// Whether selecting `at` ends the trial.
    fn is_target(&self, at: Coord) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveEvent {
    Moved,
    /// Stopped by the board edge or a blocked cell.
    Bump,
    /// No offset (action or quit key) and not a selection.
    Held,
    Selected,
}

impl MoveEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            MoveEvent::Moved => "moved",
            MoveEvent::Bump => "bump",
            MoveEvent::Held => "held",
            MoveEvent::Selected => "selected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub to: Coord,
    pub terminal: bool,
    pub event: MoveEvent,
}

/// Apply one key press to the cursor at `from`.
///
/// A candidate the board does not admit is rejected and the win check then
/// runs against `from`.
pub fn step(board: &impl Board, keymap: &KeyMap, from: Coord, key: &str) -> Result<Step> {
    let effect = keymap.lookup(key)?.effect();

    let candidate = from.offset_clamped(effect.dr, effect.dc);
    let to = if board.admits(candidate) {
        candidate
    } else {
        from
    };

    let terminal = effect.action && board.is_target(to);
    let event = if terminal {
        MoveEvent::Selected
    } else if to != from {
        MoveEvent::Moved
    } else if effect.dr == 0 && effect.dc == 0 {
        MoveEvent::Held
    } else {
        MoveEvent::Bump
    };

    debug!(key, %from, %to, event = event.as_str(), "cursor step");
    Ok(Step { to, terminal, event })
}

/// Maze variant: blocked cells reject moves, the goal coordinate is the target.
#[derive(Debug, Clone, Copy)]
pub struct MazeBoard<'a> {
    layout: &'a MazeLayout,
}

impl<'a> MazeBoard<'a> {
    pub fn new(layout: &'a MazeLayout) -> Self {
        Self { layout }
    }
}

impl Board for MazeBoard<'_> {
    fn admits(&self, at: Coord) -> bool {
        self.layout.cell(at) != MazeCell::Blocked
    }

    fn is_target(&self, at: Coord) -> bool {
        at == self.layout.goal
    }
}

/// Teaching variant: the whole board is open. A cell is a target while it
/// belongs to the true hypothesis and has not been revealed yet.
#[derive(Debug, Clone, Copy)]
pub struct TeachingBoard {
    combined: Grid<u8>,
}

impl TeachingBoard {
    pub fn new(problem: &Problem, marks: &Grid<u8>) -> Self {
        Self {
            combined: problem.combined(marks),
        }
    }

    pub fn combined(&self) -> &Grid<u8> {
        &self.combined
    }
}

impl Board for TeachingBoard {
    fn admits(&self, _at: Coord) -> bool {
        true
    }

    fn is_target(&self, at: Coord) -> bool {
        self.combined.get(at) == UNREVEALED
    }
}
